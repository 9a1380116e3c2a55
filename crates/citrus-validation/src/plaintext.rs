//! Plain text payload validation with inline ignore and variable placeholders.

use std::sync::LazyLock;

use regex::{Match, Regex};
use tracing::debug;

use citrus_core::matcher::expression::{
    is_validation_matcher_expression, resolve_validation_matcher,
};
use citrus_core::{
    Error, Message, MessageType, MessageValidator, Result, TestContext, ValidationContext,
};

static IGNORE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@ignore(\((\d*)\))?@").ok());

static VARIABLE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@variable\('?([^')]*)'?\)@").ok());

/// Compares text payloads.
///
/// `@ignore@` in the control text skips the received word at the same
/// position, `@ignore(n)@` skips `n` characters and `@variable('name')@`
/// stores the received word in a test variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextMessageValidator;

impl PlainTextMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultPlaintextMessageValidator";
}

/// Received text starting at the char position of `byte_start` in `control`.
fn received_from<'text>(control: &str, byte_start: usize, received: &'text str) -> &'text str {
    let char_position = control[..byte_start].chars().count();
    received
        .char_indices()
        .nth(char_position)
        .map_or("", |(offset, _)| &received[offset..])
}

/// Leading run of word characters.
fn leading_word(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, character)| !(character.is_alphanumeric() || *character == '_'))
        .map_or(text.len(), |(offset, _)| offset);
    &text[..end]
}

fn leading_chars(text: &str, count: usize) -> &str {
    let end = text
        .char_indices()
        .nth(count)
        .map_or(text.len(), |(offset, _)| offset);
    &text[..end]
}

/// Replaces ignore placeholders with the received text they cover.
fn process_ignore_statements(control: &str, received: &str) -> Result<String> {
    let Some(pattern) = IGNORE_PATTERN.as_ref() else {
        return Ok(control.to_owned());
    };
    let mut control = control.to_owned();
    while let Some(captures) = pattern.captures(&control) {
        let Some(whole) = captures.get(0) else {
            break;
        };
        let range = whole.range();
        let remainder = received_from(&control, range.start, received);
        let actual = match captures.get(2).as_ref().map(Match::as_str) {
            Some(length) if !length.is_empty() => {
                let count = length.parse().map_err(|_| {
                    Error::InvalidExpression(format!("Invalid ignore length '{length}'"))
                })?;
                leading_chars(remainder, count)
            }
            _ => leading_word(remainder),
        }
        .to_owned();
        control.replace_range(range, &actual);
    }
    Ok(control)
}

/// Stores the received words behind variable placeholders and inlines them.
fn process_variable_statements(
    control: &str,
    received: &str,
    context: &TestContext,
) -> Result<String> {
    let Some(pattern) = VARIABLE_PATTERN.as_ref() else {
        return Ok(control.to_owned());
    };
    let mut control = control.to_owned();
    while let Some(captures) = pattern.captures(&control) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        let range = whole.range();
        let name = name.as_str().trim().to_owned();
        let actual = leading_word(received_from(&control, range.start, received)).to_owned();
        context.set_variable(&name, actual.as_str())?;
        control.replace_range(range, &actual);
    }
    Ok(control)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl MessageValidator for PlainTextMessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, message_type: MessageType, _message: &Message) -> bool {
        message_type == MessageType::Plaintext
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()> {
        if control.payload().is_empty() {
            debug!("Skip plaintext message validation as no control payload was defined");
            return Ok(());
        }

        let (ignore_whitespace, ignore_new_line_type) = contexts
            .iter()
            .find_map(|validation| match validation {
                ValidationContext::PlainText {
                    ignore_whitespace,
                    ignore_new_line_type,
                } => Some((*ignore_whitespace, *ignore_new_line_type)),
                _ => None,
            })
            .unwrap_or_default();

        let mut actual = received.payload_text().trim().to_owned();
        let mut expected = context.replace_dynamic_content(control.payload_text().trim())?;

        if is_validation_matcher_expression(&expected) {
            return resolve_validation_matcher("payload", Some(actual.as_str()), &expected, context);
        }

        expected = process_ignore_statements(&expected, &actual)?;
        expected = process_variable_statements(&expected, &actual, context)?;

        if ignore_new_line_type {
            actual = actual.replace("\r\n", "\n");
            expected = expected.replace("\r\n", "\n");
        }
        if ignore_whitespace {
            actual = normalize_whitespace(&actual);
            expected = normalize_whitespace(&expected);
        }

        if actual == expected {
            debug!("Plaintext validation successful: All values OK");
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Text values not equal, expected '{expected}' but was '{actual}'"
            )))
        }
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
        PlainTextMessageValidator.validate(
            &Message::new(received),
            &Message::new(control),
            &context(),
            contexts,
        )
    }

    #[test]
    fn test_equal_and_mismatch() {
        validate(" Hello World ", "Hello World", &[]).unwrap();
        let error = validate("Hello World", "Hello Citrus", &[]).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Validation failed: Text values not equal, expected 'Hello Citrus' but was 'Hello World'"
        );
    }

    #[test]
    fn test_ignore_placeholders() {
        validate("Order 4711 accepted", "Order @ignore@ accepted", &[]).unwrap();
        validate("Größe 12345 ok", "Größe @ignore(3)@45 ok", &[]).unwrap();
        validate("a-1 b-2", "a-@ignore@ b-@ignore@", &[]).unwrap();
        assert!(validate("Order 4711 rejected", "Order @ignore@ accepted", &[]).is_err());
    }

    #[test]
    fn test_variable_placeholder() {
        let context = context();
        PlainTextMessageValidator
            .validate(
                &Message::new("Your id is abc123."),
                &Message::new("Your id is @variable('id')@."),
                &context,
                &[],
            )
            .unwrap();
        assert_eq!(context.get_variable("id").unwrap(), "abc123");
    }

    #[test]
    fn test_whitespace_and_new_lines() {
        let loose = [ValidationContext::PlainText {
            ignore_whitespace: true,
            ignore_new_line_type: false,
        }];
        validate("a   b\n\tc", "a b c", &loose).unwrap();
        assert!(validate("a   b", "a b", &[]).is_err());

        let new_lines = [ValidationContext::PlainText {
            ignore_whitespace: false,
            ignore_new_line_type: true,
        }];
        validate("line1\r\nline2", "line1\nline2", &new_lines).unwrap();
        assert!(validate("line1\r\nline2", "line1\nline2", &[]).is_err());
    }

    #[test]
    fn test_matcher_payload() {
        validate("Hello World", "@startsWith('Hello')@", &[]).unwrap();
        assert!(validate("Bye", "@startsWith('Hello')@", &[]).is_err());
    }

    #[test]
    fn test_empty_control_skips() {
        validate("anything", "", &[]).unwrap();
    }
}
