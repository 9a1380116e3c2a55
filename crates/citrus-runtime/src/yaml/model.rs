//! Serde model of YAML test files.
//!
//! Every action entry is a map with a single key naming the action:
//!
//! ```yaml
//! name: hello-test
//! actions:
//!   - echo:
//!       message: "Hello ${user}"
//! ```

use core::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::test_case::TestStatus;

/// Scalar value kept as text, whatever its YAML type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scalar(pub String);

impl Scalar {
    /// The text.
    pub fn into_string(self) -> String {
        self.0
    }
}

struct ScalarVisitor;

impl Visitor<'_> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string, number or boolean")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Scalar, E> {
        Ok(Scalar(value.to_owned()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Scalar, E> {
        Ok(Scalar(value))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Scalar, E> {
        Ok(Scalar(value.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Scalar, E> {
        Ok(Scalar::default())
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// A whole test file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct YamlTest {
    /// Test name.
    pub name: String,
    /// Package used in reports.
    #[serde(default)]
    pub package: Option<String>,
    /// Author.
    #[serde(default)]
    pub author: Option<String>,
    /// Status, `FINAL` when absent.
    #[serde(default)]
    pub status: Option<TestStatus>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Groups used for filtering.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Test variables.
    #[serde(default)]
    pub variables: Vec<NameValue>,
    /// Endpoints registered for the test.
    #[serde(default)]
    pub endpoints: Vec<YamlEndpoint>,
    /// Templates applied by `applyTemplate`.
    #[serde(default)]
    pub templates: Vec<YamlTemplate>,
    /// Main actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
    /// Actions run after the test whatever its outcome.
    #[serde(default)]
    pub finally: Vec<YamlAction>,
}

/// `name`/`value` pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameValue {
    /// Name.
    pub name: String,
    /// Value.
    #[serde(default)]
    pub value: Scalar,
}

/// Entry with a name only.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Named {
    /// Name.
    pub name: String,
}

/// Endpoint declaration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum YamlEndpoint {
    /// One-way in-memory endpoint.
    Direct(DirectSpec),
    /// Request/reply in-memory endpoint.
    DirectSync(DirectSpec),
    /// HTTP endpoints.
    Http(HttpSpec),
}

/// Direct endpoint settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DirectSpec {
    /// Endpoint name.
    pub name: String,
    /// Queue name, the endpoint name when absent.
    #[serde(default)]
    pub queue: Option<String>,
    /// Timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// HTTP endpoint settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct HttpSpec {
    /// Client side endpoint.
    pub client: HttpClientSpec,
}

/// HTTP client settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct HttpClientSpec {
    /// Endpoint name.
    pub name: String,
    /// Base url.
    pub request_url: String,
    /// Default method.
    #[serde(default)]
    pub request_method: Option<String>,
    /// Default content type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Template declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct YamlTemplate {
    /// Template name.
    pub name: String,
    /// Parameters with default values.
    #[serde(default)]
    pub parameters: Vec<NameValue>,
    /// Whether the template shares the test context.
    #[serde(default)]
    pub global_context: Option<bool>,
    /// Template actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
}

/// One test action.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum YamlAction {
    /// Logs a message.
    Echo(MessageSpec),
    /// Pauses the test.
    Sleep(SleepSpec),
    /// Defines variables.
    CreateVariables(VariablesSpec),
    /// Logs variables.
    TraceVariables(TraceSpec),
    /// Fails the test.
    Fail(MessageSpec),
    /// Sends a message.
    Send(SendSpec),
    /// Receives and validates a message.
    Receive(ReceiveSpec),
    /// Drops queued messages.
    PurgeEndpoint(PurgeSpec),
    /// Stops timers.
    StopTimer(StopTimerSpec),
    /// Runs a template of the test.
    ApplyTemplate(ApplyTemplateSpec),
    /// Runs actions in order.
    Sequential(ContainerSpec),
    /// Runs actions concurrently.
    Parallel(ContainerSpec),
    /// Loops while a condition holds.
    Iterate(IterateSpec),
    /// Loops until a condition holds.
    Repeat(RepeatSpec),
    /// Retries failing actions.
    RepeatOnError(RepeatOnErrorSpec),
    /// Runs actions when a condition holds.
    Conditional(ConditionalSpec),
    /// Expects an action to fail.
    Assert(AssertSpec),
    /// Ignores failures.
    Catch(CatchSpec),
    /// Runs actions in the background.
    Async(AsyncSpec),
    /// Runs actions periodically.
    Timer(TimerSpec),
}

/// Action with an optional message.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageSpec {
    /// Message text.
    #[serde(default)]
    pub message: Option<Scalar>,
}

/// Sleep duration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SleepSpec {
    /// Milliseconds, may contain dynamic content.
    #[serde(default)]
    pub milliseconds: Option<Scalar>,
    /// Seconds.
    #[serde(default)]
    pub seconds: Option<f64>,
}

/// Variables to create.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariablesSpec {
    /// Variables.
    pub variables: Vec<NameValue>,
}

/// Variables to log.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceSpec {
    /// Variables, all when empty.
    #[serde(default)]
    pub variables: Vec<Named>,
}

/// Message content of send and receive.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct YamlMessage {
    /// Name the message is stored under.
    #[serde(default)]
    pub name: Option<String>,
    /// Message type, e.g. `JSON`.
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    /// Headers.
    #[serde(default)]
    pub headers: Vec<NameValue>,
    /// Payload.
    #[serde(default)]
    pub body: Option<BodySpec>,
    /// Data dictionary applied to the payload.
    #[serde(default)]
    pub data_dictionary: Option<String>,
}

/// Inline or file payload.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodySpec {
    /// Inline payload.
    #[serde(default)]
    pub data: Option<String>,
    /// Payload file.
    #[serde(default)]
    pub resource: Option<ResourceSpec>,
}

/// File reference.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    /// File path, relative to the working directory.
    pub file: String,
}

/// Variable extraction.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractSpec {
    /// Header values.
    #[serde(default)]
    pub header: Vec<HeaderExtract>,
    /// Payload values.
    #[serde(default)]
    pub body: Vec<BodyExtract>,
}

/// Header to variable.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderExtract {
    /// Header name.
    pub name: String,
    /// Target variable.
    pub variable: String,
}

/// Payload path to variable.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodyExtract {
    /// JSONPath expression when starting with `$`, XPath otherwise; the
    /// whole payload when absent.
    #[serde(default)]
    pub path: Option<String>,
    /// Target variable.
    pub variable: String,
}

/// Send action.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendSpec {
    /// Endpoint name or URI.
    pub endpoint: String,
    /// Sends in the background.
    #[serde(default)]
    pub fork: bool,
    /// Message to send.
    #[serde(default)]
    pub message: YamlMessage,
    /// Variables taken from the sent message.
    #[serde(default)]
    pub extract: Option<ExtractSpec>,
}

/// Message selector as expression or elements.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorSpec {
    /// Selector expression.
    #[serde(default)]
    pub value: Option<String>,
    /// Selector elements.
    #[serde(default)]
    pub element: Vec<NameValue>,
}

/// Path excluded from validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgnoreSpec {
    /// JSONPath expression when starting with `$`, XPath otherwise.
    pub path: String,
}

/// Namespace prefix declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceSpec {
    /// Prefix used in expressions.
    pub prefix: String,
    /// Namespace URI.
    pub value: String,
}

/// Explicit validation expressions.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ValidateSpec {
    /// Single JSONPath expression when starting with `$`, XPath otherwise.
    #[serde(default)]
    pub path: Option<String>,
    /// Expected value of `path`.
    #[serde(default)]
    pub value: Option<Scalar>,
    /// XPath result type of `path`, e.g. `boolean`.
    #[serde(default)]
    pub result_type: Option<String>,
    /// JSONPath expressions with expected values.
    #[serde(default)]
    pub json_path: Vec<JsonPathSpec>,
    /// XPath expressions with expected values.
    #[serde(default)]
    pub xpath: Vec<XPathSpec>,
}

/// JSONPath expression with expected value.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonPathSpec {
    /// Expression.
    pub expression: String,
    /// Expected value, may be a matcher expression.
    #[serde(default)]
    pub value: Scalar,
}

/// XPath expression with expected value.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct XPathSpec {
    /// Expression.
    pub expression: String,
    /// Expected value, may be a matcher expression.
    #[serde(default)]
    pub value: Scalar,
    /// Result type, e.g. `node-set`.
    #[serde(default)]
    pub result_type: Option<String>,
}

/// Receive action.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ReceiveSpec {
    /// Endpoint name or URI.
    pub endpoint: String,
    /// Timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Selector expression.
    #[serde(default)]
    pub select: Option<String>,
    /// Structured selector.
    #[serde(default)]
    pub selector: Option<SelectorSpec>,
    /// Expected message.
    #[serde(default)]
    pub message: YamlMessage,
    /// Paths excluded from validation.
    #[serde(default)]
    pub ignore: Vec<IgnoreSpec>,
    /// Namespace prefixes for XPath expressions.
    #[serde(default)]
    pub namespace: Vec<NamespaceSpec>,
    /// JSONPath and XPath validation.
    #[serde(default)]
    pub validate: Vec<ValidateSpec>,
    /// Validator name.
    #[serde(default)]
    pub validator: Option<String>,
    /// Comma separated validator names.
    #[serde(default)]
    pub validators: Option<String>,
    /// Header validator name.
    #[serde(default)]
    pub header_validator: Option<String>,
    /// Comma separated header validator names.
    #[serde(default)]
    pub header_validators: Option<String>,
    /// Variables taken from the received message.
    #[serde(default)]
    pub extract: Option<ExtractSpec>,
}

/// Purge action.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeSpec {
    /// Single endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Several endpoints.
    #[serde(default)]
    pub endpoints: Vec<Named>,
    /// Selector expression.
    #[serde(default)]
    pub selector: Option<String>,
}

/// Stop timer action.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopTimerSpec {
    /// Timer id, all timers when absent.
    #[serde(default)]
    pub id: Option<String>,
}

/// Template call.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyTemplateSpec {
    /// Template name.
    pub name: String,
    /// Parameter values.
    #[serde(default)]
    pub parameters: Vec<NameValue>,
}

/// Plain container.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerSpec {
    /// Nested actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
}

/// Iterate container.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IterateSpec {
    /// Loop condition.
    pub condition: String,
    /// Counter variable.
    #[serde(default)]
    pub index: Option<String>,
    /// First counter value.
    #[serde(default)]
    pub start: Option<i64>,
    /// Counter increment.
    #[serde(default)]
    pub step: Option<i64>,
    /// Nested actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
}

/// Repeat container.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeatSpec {
    /// Exit condition.
    pub until: String,
    /// Counter variable.
    #[serde(default)]
    pub index: Option<String>,
    /// First counter value.
    #[serde(default)]
    pub start: Option<i64>,
    /// Nested actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
}

/// Repeat on error container.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RepeatOnErrorSpec {
    /// Exit condition.
    pub until: String,
    /// Counter variable.
    #[serde(default)]
    pub index: Option<String>,
    /// First counter value.
    #[serde(default)]
    pub start: Option<i64>,
    /// Pause between attempts in milliseconds.
    #[serde(default)]
    pub auto_sleep: Option<u64>,
    /// Nested actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
}

/// Conditional container.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalSpec {
    /// Condition.
    pub when: String,
    /// Nested actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
}

/// Assert container.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssertSpec {
    /// Expected error kind.
    #[serde(default)]
    pub exception: Option<String>,
    /// Expected error message.
    #[serde(default)]
    pub message: Option<Scalar>,
    /// The single action expected to fail.
    pub when: Vec<YamlAction>,
}

/// Catch container.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatchSpec {
    /// Caught error kind.
    #[serde(default)]
    pub exception: Option<String>,
    /// Nested actions.
    pub when: Vec<YamlAction>,
}

/// Async container.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsyncSpec {
    /// Nested actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
    /// Run after success.
    #[serde(default)]
    pub success: Vec<YamlAction>,
    /// Run after failure.
    #[serde(default)]
    pub error: Vec<YamlAction>,
}

/// Timer container.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TimerSpec {
    /// Timer id.
    #[serde(default)]
    pub id: Option<String>,
    /// Interval in milliseconds.
    #[serde(default)]
    pub interval: Option<u64>,
    /// Delay in milliseconds.
    #[serde(default)]
    pub delay: Option<u64>,
    /// Number of runs.
    #[serde(default)]
    pub repeat_count: Option<u64>,
    /// Runs in the background.
    #[serde(default)]
    pub fork: bool,
    /// Nested actions.
    #[serde(default)]
    pub actions: Vec<YamlAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_actions() {
        let test: YamlTest = serde_yaml::from_str(
            r#"
name: model-test
variables:
  - name: count
    value: 3
  - name: enabled
    value: true
actions:
  - iterate:
      condition: "i lt= ${count}"
      actions:
        - echo:
            message: "Run ${i}"
  - sleep:
      milliseconds: 10
"#,
        )
        .unwrap();

        assert_eq!(test.variables[0].value, Scalar("3".to_owned()));
        assert_eq!(test.variables[1].value, Scalar("true".to_owned()));
        let YamlAction::Iterate(iterate) = &test.actions[0] else {
            panic!("expected iterate");
        };
        assert_eq!(iterate.actions.len(), 1);
        assert!(matches!(test.actions[1], YamlAction::Sleep(_)));
    }

    #[test]
    fn test_parse_xml_receive() {
        let action: YamlAction = serde_yaml::from_str(
            r#"
receive:
  endpoint: orders
  namespace:
    - prefix: ord
      value: urn:orders
  ignore:
    - path: /ord:order/ord:created
  validate:
    - path: /ord:order/@id
      value: "17"
      resultType: integer
    - xpath:
        - expression: //ord:item
          value: "[a, b]"
          resultType: node-set
  message:
    type: XML
    dataDictionary: orderDictionary
"#,
        )
        .unwrap();
        let YamlAction::Receive(receive) = action else {
            panic!("expected receive");
        };
        assert_eq!(receive.namespace[0].prefix, "ord");
        assert_eq!(receive.validate[0].result_type.as_deref(), Some("integer"));
        assert_eq!(receive.validate[1].xpath[0].result_type.as_deref(), Some("node-set"));
        assert_eq!(receive.message.data_dictionary.as_deref(), Some("orderDictionary"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let error = serde_yaml::from_str::<YamlTest>(
            r#"
name: broken
actions:
  - echo:
      text: "typo"
"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("text"));

        assert!(serde_yaml::from_str::<YamlTest>("name: x\nauthr: me\n").is_err());
        assert!(serde_yaml::from_str::<YamlTest>("name: x\nactions:\n  - explode: {}\n").is_err());
    }
}
