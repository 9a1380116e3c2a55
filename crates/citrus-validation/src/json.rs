//! Structural comparison of JSON payloads.

use core::ptr;
use std::collections::HashSet;

use serde_json::Value as JsonValue;
use tracing::debug;

use citrus_core::json_path::{JsonPath, render};
use citrus_core::matcher::expression::{
    is_validation_matcher_expression, resolve_validation_matcher,
};
use citrus_core::settings::IGNORE_PLACEHOLDER;
use citrus_core::{
    Error, Message, MessageType, MessageValidator, Result, TestContext, ValidationContext,
};

/// Compares received and control JSON documents entry by entry.
///
/// Control values may be `@ignore@` or validation matcher expressions.
/// Strict mode requires equal entry counts and array sizes; otherwise
/// the received document may hold additional entries and array items
/// may appear in any order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTextMessageValidator;

impl JsonTextMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultJsonMessageValidator";
}

impl MessageValidator for JsonTextMessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Json && message.payload().is_json_like()
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()> {
        if control.payload().is_empty() {
            debug!("Skip JSON message validation as no control payload was defined");
            return Ok(());
        }
        if received.payload().is_empty() {
            return Err(Error::validation(
                "Expected message contents, but received empty message",
            ));
        }

        let (strict, ignore_expressions) = json_settings(contexts);
        let expected_text = context.replace_dynamic_content(&control.payload_text())?;
        let expected: JsonValue = serde_json::from_str(&expected_text).map_err(|error| {
            Error::validation(format!("Failed to parse control JSON payload: {error}"))
        })?;
        let actual: JsonValue = serde_json::from_str(&received.payload_text()).map_err(|error| {
            Error::validation(format!("Failed to parse received JSON payload: {error}"))
        })?;

        debug!("Start JSON message validation (strict: {strict})");
        compare_documents(&actual, &expected, strict, ignore_expressions, context)?;
        debug!("JSON message validation successful: All values OK");
        Ok(())
    }
}

/// Strictness and ignore expressions of the first JSON context; strict
/// with nothing ignored by default.
pub(crate) fn json_settings(contexts: &[ValidationContext]) -> (bool, &[String]) {
    contexts
        .iter()
        .find_map(|validation| match validation {
            ValidationContext::Json {
                strict,
                ignore_expressions,
            } => Some((*strict, ignore_expressions.as_slice())),
            _ => None,
        })
        .unwrap_or((true, &[]))
}

/// Compares two parsed documents, skipping received entries selected by
/// the JSONPath `ignore_expressions`.
pub(crate) fn compare_documents(
    actual: &JsonValue,
    expected: &JsonValue,
    strict: bool,
    ignore_expressions: &[String],
    context: &TestContext,
) -> Result<()> {
    let mut ignored = HashSet::new();
    for expression in ignore_expressions {
        let expression = context.replace_dynamic_content(expression)?;
        for value in JsonPath::parse(&expression)?.select(actual) {
            ignored.insert(ptr::from_ref(value));
        }
    }

    let comparison = Comparison {
        strict,
        ignored,
        context,
    };
    comparison.compare("$", actual, expected)
}

struct Comparison<'ctx> {
    strict: bool,
    ignored: HashSet<*const JsonValue>,
    context: &'ctx TestContext,
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl Comparison<'_> {
    fn compare(&self, key: &str, actual: &JsonValue, expected: &JsonValue) -> Result<()> {
        if self.ignored.contains(&ptr::from_ref(actual)) {
            debug!("JSON entry '{key}' is ignored by expression");
            return Ok(());
        }

        match (actual, expected) {
            (_, JsonValue::String(control)) if control.trim() == IGNORE_PLACEHOLDER => {
                debug!("JSON entry '{key}' is ignored");
                Ok(())
            }
            (_, JsonValue::String(control)) if is_validation_matcher_expression(control.trim()) => {
                let value = match actual {
                    JsonValue::Null => None,
                    other => Some(render(other)),
                };
                resolve_validation_matcher(key, value.as_deref(), control.trim(), self.context)
            }
            (JsonValue::Object(received), JsonValue::Object(control)) => {
                if self.strict && received.len() != control.len() {
                    return Err(Error::validation(format!(
                        "Number of entries is not equal in element: '{key}', expected '{}' but was '{}'",
                        control.len(),
                        received.len()
                    )));
                }
                for (name, control_value) in control {
                    let Some(received_value) = received.get(name) else {
                        return Err(Error::validation(format!("Missing JSON entry: '{name}'")));
                    };
                    self.compare(name, received_value, control_value)?;
                }
                Ok(())
            }
            (JsonValue::Array(received), JsonValue::Array(control)) => {
                self.compare_arrays(key, received, control)
            }
            (JsonValue::Object(_) | JsonValue::Array(_), _)
            | (_, JsonValue::Object(_) | JsonValue::Array(_)) => {
                Err(Error::validation(format!(
                    "Type mismatch for JSON entry '{key}', expected '{}' but was '{}'",
                    type_name(expected),
                    type_name(actual)
                )))
            }
            _ => {
                if actual == expected || render(actual) == render(expected) {
                    debug!("Validation successful for JSON entry '{key}' ({})", render(actual));
                    Ok(())
                } else {
                    Err(Error::validation(format!(
                        "Values not equal for entry: '{key}', expected '{}' but was '{}'",
                        render(expected),
                        render(actual)
                    )))
                }
            }
        }
    }

    fn compare_arrays(&self, key: &str, received: &[JsonValue], control: &[JsonValue]) -> Result<()> {
        if self.strict {
            if received.len() != control.len() {
                return Err(Error::validation(format!(
                    "JSON array size mismatch for entry '{key}', expected '{}' but was '{}'",
                    control.len(),
                    received.len()
                )));
            }
            for (index, (received_item, control_item)) in received.iter().zip(control).enumerate() {
                self.compare(&format!("{key}[{index}]"), received_item, control_item)?;
            }
            return Ok(());
        }

        for (index, control_item) in control.iter().enumerate() {
            let found = received
                .iter()
                .any(|received_item| self.compare(key, received_item, control_item).is_ok());
            if !found {
                return Err(Error::validation(format!(
                    "An item in '{key}' is missing, expected '{control_item}' at index {index} to be in '{}'",
                    JsonValue::Array(received.to_vec())
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use citrus_core::{TestContextFactory, ValidationMatcherRegistry};

    use super::*;
    use crate::matchers::default_matcher_library;

    fn context() -> TestContext {
        TestContextFactory::new()
            .with_matcher_registry(
                ValidationMatcherRegistry::new().with_library(default_matcher_library()),
            )
            .create_context()
    }

    fn validate(received: &str, control: &str, contexts: &[ValidationContext]) -> Result<()> {
        JsonTextMessageValidator.validate(
            &Message::new(received),
            &Message::new(control),
            &context(),
            contexts,
        )
    }

    #[test]
    fn test_equal_documents() {
        validate(
            r#"{"id": 1, "name": "foo", "tags": ["a", "b"], "nested": {"ok": true}}"#,
            r#"{"nested": {"ok": true}, "tags": ["a", "b"], "name": "foo", "id": 1}"#,
            &[],
        )
        .unwrap();
    }

    #[test]
    fn test_value_mismatch() {
        let error = validate(r#"{"name": "foo"}"#, r#"{"name": "bar"}"#, &[]).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Validation failed: Values not equal for entry: 'name', expected 'bar' but was 'foo'"
        );
    }

    #[test]
    fn test_missing_entry_and_strict_count() {
        let error = validate(r#"{"a": 1, "c": 2}"#, r#"{"a": 1, "b": 2}"#, &[]).unwrap_err();
        assert!(error.to_string().contains("Missing JSON entry: 'b'"));

        let extra = r#"{"a": 1, "b": 2}"#;
        assert!(validate(extra, r#"{"a": 1}"#, &[]).is_err());
        validate(extra, r#"{"a": 1}"#, &[ValidationContext::json(false)]).unwrap();
    }

    #[test]
    fn test_arrays() {
        assert!(validate("[1, 2, 3]", "[1, 2]", &[]).is_err());
        assert!(validate("[1, 2]", "[2, 1]", &[]).is_err());
        validate("[1, 2, 3]", "[3, 1]", &[ValidationContext::json(false)]).unwrap();
        assert!(validate("[1, 2]", "[4]", &[ValidationContext::json(false)]).is_err());
    }

    #[test]
    fn test_ignore_and_matchers() {
        validate(
            r#"{"id": "x-42", "created": "2024-01-01", "count": 7}"#,
            r#"{"id": "@startsWith('x-')@", "created": "@ignore@", "count": "@greaterThan(5)@"}"#,
            &[],
        )
        .unwrap();

        assert!(validate(r#"{"count": 3}"#, r#"{"count": "@greaterThan(5)@"}"#, &[]).is_err());
    }

    #[test]
    fn test_ignore_expressions() {
        let contexts = [ValidationContext::Json {
            strict: true,
            ignore_expressions: vec!["$.meta".to_owned(), "$.items[*].id".to_owned()],
        }];
        validate(
            r#"{"meta": {"ts": 1}, "items": [{"id": 9, "v": "a"}]}"#,
            r#"{"meta": {}, "items": [{"id": 0, "v": "a"}]}"#,
            &contexts,
        )
        .unwrap();
    }

    #[test]
    fn test_dynamic_control_and_type_mismatch() {
        let context = context();
        context.set_variable("name", "foo").unwrap();
        JsonTextMessageValidator
            .validate(
                &Message::new(r#"{"name": "foo"}"#),
                &Message::new(r#"{"name": "${name}"}"#),
                &context,
                &[],
            )
            .unwrap();

        let error = validate(r#"{"a": [1]}"#, r#"{"a": {"b": 1}}"#, &[]).unwrap_err();
        assert!(error.to_string().contains("Type mismatch for JSON entry 'a'"));
    }

    #[test]
    fn test_supports_only_json_payloads() {
        let validator = JsonTextMessageValidator;
        assert!(validator.supports_message_type(MessageType::Json, &Message::new(r#"{"a": 1}"#)));
        assert!(validator.supports_message_type(MessageType::Json, &Message::empty()));
        assert!(!validator.supports_message_type(MessageType::Json, &Message::new("<a/>")));
        assert!(!validator.supports_message_type(MessageType::Xml, &Message::new("{}")));
    }

    #[test]
    fn test_empty_payloads() {
        validate(r#"{"a": 1}"#, "", &[]).unwrap();
        assert!(validate("", r#"{"a": 1}"#, &[]).is_err());
        assert!(validate("not json", r#"{"a": 1}"#, &[]).is_err());
    }
}
