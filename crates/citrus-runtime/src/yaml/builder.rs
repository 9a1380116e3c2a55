//! Turns the YAML model into test actions.

use core::time::Duration;
use std::sync::Arc;

use indexmap::IndexMap;

use citrus_core::json_path::is_json_path_expression;
use citrus_core::{Error, MessageType, ValidationContext, VariableExtractor};
use citrus_endpoints::HttpClientConfig;

use crate::action::ActionRef;
use crate::actions::{
    CreateVariablesAction, EchoAction, FailAction, MessageTemplate, PurgeEndpointAction,
    ReceiveMessageAction, SelectorSource, SendMessageAction, SleepAction, TraceVariablesAction,
};
use crate::containers::{
    Assert, Async, Catch, Conditional, Iterate, Parallel, RepeatOnErrorUntilTrue,
    RepeatUntilTrue, Sequence, StopTimerAction, Template, Timer,
};
use crate::endpoint::EndpointDefinition;
use crate::test_case::TestCase;
use crate::yaml::LoadError;
use crate::yaml::model::{
    ApplyTemplateSpec, ExtractSpec, NameValue, ReceiveSpec, SelectorSpec, SendSpec, SleepSpec,
    TimerSpec, ValidateSpec, YamlAction, YamlEndpoint, YamlMessage, YamlTemplate, YamlTest,
};

type BuildResult<T> = Result<T, LoadError>;

fn name_values(values: Vec<NameValue>) -> IndexMap<String, String> {
    values
        .into_iter()
        .map(|entry| (entry.name, entry.value.into_string()))
        .collect()
}

fn split_names(single: Option<String>, list: Option<String>) -> Vec<String> {
    single
        .into_iter()
        .chain(list.iter().flat_map(|names| names.split(',').map(str::to_owned)))
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .collect()
}

fn extractors(spec: Option<ExtractSpec>) -> Vec<VariableExtractor> {
    let Some(spec) = spec else {
        return Vec::new();
    };
    let headers = spec
        .header
        .into_iter()
        .map(|entry| VariableExtractor::Header {
            header: entry.name,
            variable: entry.variable,
        });
    let body = spec.body.into_iter().map(|entry| match entry.path {
        Some(expression) if is_json_path_expression(&expression) => VariableExtractor::JsonPath {
            expression,
            variable: entry.variable,
        },
        Some(expression) => VariableExtractor::XPath {
            expression,
            variable: entry.variable,
        },
        None => VariableExtractor::Payload {
            variable: entry.variable,
        },
    });
    headers.chain(body).collect()
}

fn with_result_type(expression: String, result_type: Option<String>) -> String {
    match result_type {
        Some(result_type) => format!("{result_type}:{expression}"),
        None => expression,
    }
}

/// Splits validate entries into JSONPath and XPath expressions.
fn validate_expressions(
    specs: Vec<ValidateSpec>,
) -> (IndexMap<String, String>, IndexMap<String, String>) {
    let mut json_paths = IndexMap::new();
    let mut xpaths = IndexMap::new();
    for validate in specs {
        if let Some(path) = validate.path {
            let value = validate.value.unwrap_or_default().into_string();
            if is_json_path_expression(&path) {
                json_paths.insert(path, value);
            } else {
                xpaths.insert(with_result_type(path, validate.result_type), value);
            }
        }
        for json_path in validate.json_path {
            json_paths.insert(json_path.expression, json_path.value.into_string());
        }
        for xpath in validate.xpath {
            xpaths.insert(
                with_result_type(xpath.expression, xpath.result_type),
                xpath.value.into_string(),
            );
        }
    }
    (json_paths, xpaths)
}

fn endpoint(endpoint: YamlEndpoint) -> EndpointDefinition {
    match endpoint {
        YamlEndpoint::Direct(spec) => EndpointDefinition::Direct {
            queue: spec.queue.unwrap_or_else(|| spec.name.clone()),
            name: spec.name,
            timeout: spec.timeout.map(Duration::from_millis),
        },
        YamlEndpoint::DirectSync(spec) => EndpointDefinition::DirectSync {
            queue: spec.queue.unwrap_or_else(|| spec.name.clone()),
            name: spec.name,
            timeout: spec.timeout.map(Duration::from_millis),
        },
        YamlEndpoint::Http(spec) => {
            let client = spec.client;
            let mut config = HttpClientConfig::new(client.request_url);
            if let Some(method) = client.request_method {
                config = config.with_method(method);
            }
            if let Some(content_type) = client.content_type {
                config = config.with_content_type(content_type);
            }
            if let Some(timeout) = client.timeout {
                config = config.with_timeout(Duration::from_millis(timeout));
            }
            EndpointDefinition::HttpClient {
                name: client.name,
                config,
            }
        }
    }
}

/// Builds one test, resolving its templates first.
pub(crate) struct TestBuilder<'load> {
    origin: &'load str,
    json_strict: bool,
    templates: IndexMap<String, Template>,
}

impl<'load> TestBuilder<'load> {
    pub(crate) fn new(origin: &'load str, json_strict: bool) -> Self {
        Self {
            origin,
            json_strict,
            templates: IndexMap::new(),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> LoadError {
        LoadError::Invalid {
            origin: self.origin.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn build(mut self, test: YamlTest) -> BuildResult<TestCase> {
        for template in test.templates {
            let name = template.name.clone();
            let built = self.template(template)?;
            self.templates.insert(name, built);
        }

        let mut case = TestCase::new(test.name).with_groups(test.groups);
        if let Some(package) = test.package {
            case = case.with_package(package);
        }
        if let Some(author) = test.author {
            case = case.with_author(author);
        }
        if let Some(description) = test.description {
            case = case.with_description(description);
        }
        if let Some(status) = test.status {
            case = case.with_status(status);
        }
        for (name, value) in name_values(test.variables) {
            case = case.with_variable(name, value);
        }
        for declared in test.endpoints {
            case = case.with_endpoint(endpoint(declared));
        }

        case = case.with_actions(self.actions(test.actions)?);
        for action in self.actions(test.finally)? {
            case = case.with_finally(action);
        }
        Ok(case)
    }

    fn template(&self, template: YamlTemplate) -> BuildResult<Template> {
        let actions = self.actions(template.actions)?;
        Ok(Template::new(template.name, actions)
            .with_parameters(name_values(template.parameters))
            .with_global_context(template.global_context.unwrap_or(true)))
    }

    fn actions(&self, actions: Vec<YamlAction>) -> BuildResult<Vec<ActionRef>> {
        actions.into_iter().map(|action| self.action(action)).collect()
    }

    fn action(&self, action: YamlAction) -> BuildResult<ActionRef> {
        Ok(match action {
            YamlAction::Echo(spec) => Arc::new(
                spec.message
                    .map_or_else(EchoAction::timestamp, |message| EchoAction::new(message.into_string())),
            ),
            YamlAction::Sleep(spec) => Arc::new(self.sleep(spec)?),
            YamlAction::CreateVariables(spec) => {
                Arc::new(CreateVariablesAction::new(name_values(spec.variables)))
            }
            YamlAction::TraceVariables(spec) => Arc::new(TraceVariablesAction::new(
                spec.variables.into_iter().map(|entry| entry.name).collect(),
            )),
            YamlAction::Fail(spec) => Arc::new(
                spec.message
                    .map_or_else(FailAction::default, |message| FailAction::new(message.into_string())),
            ),
            YamlAction::Send(spec) => Arc::new(self.send(spec)?),
            YamlAction::Receive(spec) => Arc::new(self.receive(spec)?),
            YamlAction::PurgeEndpoint(spec) => {
                let endpoints: Vec<String> = spec
                    .endpoint
                    .into_iter()
                    .chain(spec.endpoints.into_iter().map(|entry| entry.name))
                    .collect();
                if endpoints.is_empty() {
                    return Err(self.invalid("purgeEndpoint requires at least one endpoint"));
                }
                let mut purge = PurgeEndpointAction::new(endpoints);
                if let Some(selector) = spec.selector {
                    purge = purge.with_selector(selector);
                }
                Arc::new(purge)
            }
            YamlAction::StopTimer(spec) => {
                Arc::new(spec.id.map_or_else(StopTimerAction::all, StopTimerAction::new))
            }
            YamlAction::ApplyTemplate(spec) => Arc::new(self.apply_template(spec)?),
            YamlAction::Sequential(spec) => Arc::new(Sequence::new(self.actions(spec.actions)?)),
            YamlAction::Parallel(spec) => Arc::new(Parallel::new(self.actions(spec.actions)?)),
            YamlAction::Iterate(spec) => {
                let mut iterate = Iterate::new(spec.condition, self.actions(spec.actions)?);
                if let Some(index) = spec.index {
                    iterate = iterate.with_index_name(index);
                }
                if let Some(start) = spec.start {
                    iterate = iterate.with_start(start);
                }
                if let Some(step) = spec.step {
                    iterate = iterate.with_step(step);
                }
                Arc::new(iterate)
            }
            YamlAction::Repeat(spec) => {
                let mut repeat = RepeatUntilTrue::new(spec.until, self.actions(spec.actions)?);
                if let Some(index) = spec.index {
                    repeat = repeat.with_index_name(index);
                }
                if let Some(start) = spec.start {
                    repeat = repeat.with_start(start);
                }
                Arc::new(repeat)
            }
            YamlAction::RepeatOnError(spec) => {
                let mut repeat = RepeatOnErrorUntilTrue::new(spec.until, self.actions(spec.actions)?);
                if let Some(index) = spec.index {
                    repeat = repeat.with_index_name(index);
                }
                if let Some(start) = spec.start {
                    repeat = repeat.with_start(start);
                }
                if let Some(auto_sleep) = spec.auto_sleep {
                    repeat = repeat.with_auto_sleep(Duration::from_millis(auto_sleep));
                }
                Arc::new(repeat)
            }
            YamlAction::Conditional(spec) => {
                Arc::new(Conditional::new(spec.when, self.actions(spec.actions)?))
            }
            YamlAction::Assert(spec) => {
                let [when] = <[YamlAction; 1]>::try_from(spec.when)
                    .map_err(|_| self.invalid("assert requires exactly one action in 'when'"))?;
                let mut assert = Assert::new(self.action(when)?);
                if let Some(kind) = spec.exception {
                    assert = assert.with_error_kind(kind);
                }
                if let Some(message) = spec.message {
                    assert = assert.with_message(message.into_string());
                }
                Arc::new(assert)
            }
            YamlAction::Catch(spec) => {
                let mut catch = Catch::new(self.actions(spec.when)?);
                if let Some(kind) = spec.exception {
                    catch = catch.with_error_kind(kind);
                }
                Arc::new(catch)
            }
            YamlAction::Async(spec) => Arc::new(
                Async::new(self.actions(spec.actions)?)
                    .with_success_actions(self.actions(spec.success)?)
                    .with_error_actions(self.actions(spec.error)?),
            ),
            YamlAction::Timer(spec) => Arc::new(self.timer(spec)?),
        })
    }

    fn sleep(&self, spec: SleepSpec) -> BuildResult<SleepAction> {
        match (spec.milliseconds, spec.seconds) {
            (Some(millis), None) => Ok(SleepAction::new(millis.into_string())),
            (None, Some(seconds)) if seconds.is_finite() && seconds >= 0.0 => {
                Ok(SleepAction::of(Duration::from_secs_f64(seconds)))
            }
            (None, Some(seconds)) => Err(self.invalid(format!("Invalid sleep time '{seconds}' seconds"))),
            (None, None) => Ok(SleepAction::default()),
            (Some(_), Some(_)) => Err(self.invalid("sleep sets both milliseconds and seconds")),
        }
    }

    fn message(&self, message: YamlMessage) -> BuildResult<MessageTemplate> {
        let mut template = MessageTemplate::new();
        if let Some(name) = message.name {
            template = template.with_name(name);
        }
        if let Some(message_type) = message.message_type {
            let parsed: MessageType = message_type
                .parse()
                .map_err(|error: Error| self.invalid(error.detail()))?;
            template = template.with_type(parsed);
        }
        for (name, value) in name_values(message.headers) {
            template = template.with_header(name, value);
        }
        if let Some(dictionary) = message.data_dictionary {
            template = template.with_data_dictionary(dictionary);
        }
        if let Some(body) = message.body {
            template = match (body.data, body.resource) {
                (Some(data), None) => template.with_body(data),
                (None, Some(resource)) => template.with_body_file(resource.file),
                (None, None) => template,
                (Some(_), Some(_)) => {
                    return Err(self.invalid("message body sets both data and resource"));
                }
            };
        }
        Ok(template)
    }

    fn send(&self, spec: SendSpec) -> BuildResult<SendMessageAction> {
        let mut send = SendMessageAction::new(spec.endpoint, self.message(spec.message)?)
            .with_fork(spec.fork);
        for extractor in extractors(spec.extract) {
            send = send.with_extractor(extractor);
        }
        Ok(send)
    }

    fn selector(spec: SelectorSpec) -> SelectorSource {
        match spec.value {
            Some(expression) => SelectorSource::Expression(expression),
            None => SelectorSource::Elements(name_values(spec.element)),
        }
    }

    fn receive(&self, spec: ReceiveSpec) -> BuildResult<ReceiveMessageAction> {
        let mut receive = ReceiveMessageAction::new(spec.endpoint, self.message(spec.message)?);
        if let Some(expression) = spec.select {
            receive = receive.with_selector(SelectorSource::Expression(expression));
        } else if let Some(selector) = spec.selector {
            receive = receive.with_selector(Self::selector(selector));
        }
        if let Some(timeout) = spec.timeout {
            receive = receive.with_timeout(Duration::from_millis(timeout));
        }

        let (json_ignores, xml_ignores): (Vec<String>, Vec<String>) = spec
            .ignore
            .into_iter()
            .map(|ignore| ignore.path)
            .partition(|path| is_json_path_expression(path));
        let namespaces: IndexMap<String, String> = spec
            .namespace
            .into_iter()
            .map(|namespace| (namespace.prefix, namespace.value))
            .collect();

        receive = receive
            .with_validation(ValidationContext::Json {
                strict: self.json_strict,
                ignore_expressions: json_ignores,
            })
            .with_validation(ValidationContext::Xml {
                ignore_expressions: xml_ignores,
                namespaces: namespaces.clone(),
            });

        let (json_paths, xpaths) = validate_expressions(spec.validate);
        if !json_paths.is_empty() {
            receive = receive.with_validation(ValidationContext::JsonPath {
                expressions: json_paths,
            });
        }
        if !xpaths.is_empty() {
            receive = receive.with_validation(ValidationContext::XPath {
                expressions: xpaths,
                namespaces,
            });
        }

        for validator in split_names(spec.validator, spec.validators) {
            receive = receive.with_validator(validator);
        }
        for validator in split_names(spec.header_validator, spec.header_validators) {
            receive = receive.with_header_validator(validator);
        }
        for extractor in extractors(spec.extract) {
            receive = receive.with_extractor(extractor);
        }
        Ok(receive)
    }

    fn apply_template(&self, spec: ApplyTemplateSpec) -> BuildResult<Template> {
        let template = self
            .templates
            .get(&spec.name)
            .ok_or_else(|| self.invalid(format!("Unknown template '{}'", spec.name)))?;
        Ok(template.clone().with_parameters(name_values(spec.parameters)))
    }

    fn timer(&self, spec: TimerSpec) -> BuildResult<Timer> {
        let mut timer = Timer::new(self.actions(spec.actions)?).with_fork(spec.fork);
        if let Some(id) = spec.id {
            timer = timer.with_id(id);
        }
        if let Some(interval) = spec.interval {
            timer = timer.with_interval(Duration::from_millis(interval));
        }
        if let Some(delay) = spec.delay {
            timer = timer.with_delay(Duration::from_millis(delay));
        }
        if let Some(repeat_count) = spec.repeat_count {
            timer = timer.with_repeat_count(repeat_count);
        }
        Ok(timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_names() {
        assert_eq!(
            split_names(Some("json".to_owned()), Some(" jsonPath , ,plaintext".to_owned())),
            vec!["json", "jsonPath", "plaintext"]
        );
        assert!(split_names(None, None).is_empty());
    }

    #[test]
    fn test_extractors() {
        let spec: ExtractSpec = serde_yaml::from_str(
            r"
header:
  - name: operation
    variable: op
body:
  - path: $.id
    variable: id
  - path: /order/@id
    variable: orderId
  - variable: payload
",
        )
        .unwrap();
        assert_eq!(
            extractors(Some(spec)),
            vec![
                VariableExtractor::Header {
                    header: "operation".to_owned(),
                    variable: "op".to_owned()
                },
                VariableExtractor::JsonPath {
                    expression: "$.id".to_owned(),
                    variable: "id".to_owned()
                },
                VariableExtractor::XPath {
                    expression: "/order/@id".to_owned(),
                    variable: "orderId".to_owned()
                },
                VariableExtractor::Payload {
                    variable: "payload".to_owned()
                },
            ]
        );
    }

    #[test]
    fn test_validate_expressions_split_by_language() {
        let specs: Vec<ValidateSpec> = serde_yaml::from_str(
            r#"
- path: $.id
  value: "7"
- path: /order/@id
  value: "7"
  resultType: integer
- jsonPath:
    - expression: $.name
      value: Ada
  xpath:
    - expression: count(//item)
      value: "2"
"#,
        )
        .unwrap();
        let (json_paths, xpaths) = validate_expressions(specs);
        assert_eq!(
            json_paths.into_iter().collect::<Vec<_>>(),
            vec![
                ("$.id".to_owned(), "7".to_owned()),
                ("$.name".to_owned(), "Ada".to_owned())
            ]
        );
        assert_eq!(
            xpaths.into_iter().collect::<Vec<_>>(),
            vec![
                ("integer:/order/@id".to_owned(), "7".to_owned()),
                ("count(//item)".to_owned(), "2".to_owned())
            ]
        );
    }

    #[test]
    fn test_direct_queue_defaults_to_name() {
        let declared: YamlEndpoint = serde_yaml::from_str("direct:\n  name: orders\n").unwrap();
        assert_eq!(
            endpoint(declared),
            EndpointDefinition::Direct {
                name: "orders".to_owned(),
                queue: "orders".to_owned(),
                timeout: None
            }
        );
    }
}
