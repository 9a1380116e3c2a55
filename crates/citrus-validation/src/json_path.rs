//! Validation of JSON payloads through JSONPath expressions.

use serde_json::Value as JsonValue;
use tracing::debug;

use citrus_core::json_path::evaluate_as_string;
use citrus_core::matcher::expression::{
    is_validation_matcher_expression, resolve_validation_matcher,
};
use citrus_core::settings::IGNORE_PLACEHOLDER;
use citrus_core::{
    Error, Message, MessageType, MessageValidator, Result, TestContext, ValidationContext,
};

/// Evaluates each expression of the `JsonPath` validation contexts on the
/// received payload and compares the result with its expected value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathMessageValidator;

impl JsonPathMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultJsonPathMessageValidator";
}

impl MessageValidator for JsonPathMessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Json && message.payload().is_json_like()
    }

    fn validate(
        &self,
        received: &Message,
        _control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()> {
        let expressions: Vec<_> = contexts
            .iter()
            .filter_map(|validation| match validation {
                ValidationContext::JsonPath { expressions } => Some(expressions),
                _ => None,
            })
            .flatten()
            .collect();
        if expressions.is_empty() {
            return Ok(());
        }
        if received.payload().is_empty() {
            return Err(Error::validation(
                "Unable to validate message elements - receive message payload was empty",
            ));
        }

        let document: JsonValue = serde_json::from_str(&received.payload_text()).map_err(|error| {
            Error::validation(format!("Failed to parse received JSON payload: {error}"))
        })?;

        debug!("Start JSONPath element validation");
        for (expression, expected) in expressions {
            let expression = context.replace_dynamic_content(expression)?;
            let actual = evaluate_as_string(&document, &expression)?;

            if expected.trim() == IGNORE_PLACEHOLDER {
                debug!("Ignoring JSONPath element '{expression}'");
                continue;
            }
            if is_validation_matcher_expression(expected.trim()) {
                resolve_validation_matcher(&expression, Some(actual.as_str()), expected.trim(), context)?;
            } else {
                let expected = context.replace_dynamic_content(expected)?;
                if actual != expected {
                    return Err(Error::validation(format!(
                        "Values not equal for element '{expression}', expected '{expected}' but was '{actual}'"
                    )));
                }
            }
            debug!("Validating element: {expression}='{actual}': OK");
        }
        debug!("JSONPath element validation successful: All elements OK");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use citrus_core::{TestContextFactory, ValidationMatcherRegistry};

    use super::*;
    use crate::matchers::default_matcher_library;

    const PAYLOAD: &str = r#"{"user": {"name": "Ada", "age": 36}, "roles": ["admin", "dev"]}"#;

    fn context() -> TestContext {
        TestContextFactory::new()
            .with_matcher_registry(
                ValidationMatcherRegistry::new().with_library(default_matcher_library()),
            )
            .create_context()
    }

    fn json_path(entries: &[(&str, &str)]) -> ValidationContext {
        ValidationContext::JsonPath {
            expressions: entries
                .iter()
                .map(|(expression, expected)| ((*expression).to_owned(), (*expected).to_owned()))
                .collect::<IndexMap<_, _>>(),
        }
    }

    #[test]
    fn test_values_and_matchers() {
        let context = context();
        context.set_variable("name", "Ada").unwrap();
        let contexts = [json_path(&[
            ("$.user.name", "${name}"),
            ("$.user.age", "@greaterThan(30)@"),
            ("$.roles", r#"["admin","dev"]"#),
            ("$.roles.size()", "2"),
            ("$.user.ignored", IGNORE_PLACEHOLDER),
        ])];

        let error = JsonPathMessageValidator
            .validate(&Message::new(PAYLOAD), &Message::empty(), &context, &contexts)
            .unwrap_err();
        assert!(error.to_string().contains("No result for JSONPath expression"));

        let contexts = [json_path(&[
            ("$.user.name", "${name}"),
            ("$.user.age", "@greaterThan(30)@"),
            ("$.roles", r#"["admin","dev"]"#),
            ("$.roles.size()", "2"),
        ])];
        JsonPathMessageValidator
            .validate(&Message::new(PAYLOAD), &Message::empty(), &context, &contexts)
            .unwrap();
    }

    #[test]
    fn test_mismatch() {
        let error = JsonPathMessageValidator
            .validate(
                &Message::new(PAYLOAD),
                &Message::empty(),
                &context(),
                &[json_path(&[("$.user.name", "Bob")])],
            )
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Validation failed: Values not equal for element '$.user.name', expected 'Bob' but was 'Ada'"
        );
    }

    #[test]
    fn test_without_expressions_or_payload() {
        let validator = JsonPathMessageValidator;
        validator
            .validate(&Message::new("not json"), &Message::empty(), &context(), &[])
            .unwrap();
        assert!(
            validator
                .validate(
                    &Message::empty(),
                    &Message::empty(),
                    &context(),
                    &[json_path(&[("$.a", "1")])]
                )
                .is_err()
        );
    }
}
