use indexmap::IndexMap;
use tracing::debug;

use super::Message;
use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::json_path;
use crate::matcher::expression::{is_validation_matcher_expression, resolve_validation_matcher};

/// Key prefix selecting on a JSONPath evaluated against the payload.
pub const JSON_PATH_SELECTOR_PREFIX: &str = "jsonPath:";

/// Selects messages by header values or JSONPath results.
///
/// Parsed from `operation = 'sayHello' AND jsonPath:$.user = 'penny'` or built
/// from a map. Values may be validation matcher expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSelector {
    entries: IndexMap<String, String>,
}

impl MessageSelector {
    /// Parses a selector expression.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` if a clause is not `key = 'value'`.
    pub fn parse(expression: &str) -> Result<Self> {
        let mut entries = IndexMap::new();
        for clause in split_and(expression) {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let (key, value) = split_assignment(clause).ok_or_else(|| {
                Error::InvalidExpression(format!(
                    "Invalid message selector clause '{clause}' in '{expression}'"
                ))
            })?;
            let value = value.trim();
            let value = value
                .strip_prefix('\'')
                .and_then(|inner| inner.strip_suffix('\''))
                .unwrap_or(value);
            entries.insert(key.trim().to_owned(), value.to_owned());
        }

        if entries.is_empty() {
            return Err(Error::InvalidExpression(format!(
                "Empty message selector '{expression}'"
            )));
        }
        Ok(Self { entries })
    }

    /// Builds a selector from key/value pairs.
    pub fn from_map(entries: IndexMap<String, String>) -> Self {
        Self { entries }
    }

    /// Selector entries.
    pub fn entries(&self) -> &IndexMap<String, String> {
        &self.entries
    }

    /// Whether `message` satisfies every entry.
    pub fn matches(&self, message: &Message, context: &TestContext) -> bool {
        self.entries.iter().all(|(key, expected)| {
            let actual = if let Some(expression) = key.strip_prefix(JSON_PATH_SELECTOR_PREFIX) {
                json_path::evaluate_payload(&message.payload_text(), expression).ok()
            } else {
                message.header(key).map(|value| value.into_owned())
            };

            let Some(actual) = actual else {
                return false;
            };

            if is_validation_matcher_expression(expected) {
                let outcome = resolve_validation_matcher(key, Some(actual.as_str()), expected, context);
                if let Err(error) = &outcome {
                    debug!("Selector entry '{key}' rejected message: {error}");
                }
                outcome.is_ok()
            } else {
                &actual == expected
            }
        })
    }
}

/// Splits a clause at its top-level `=`, skipping comparison operators and
/// anything nested in quotes, brackets or parentheses.
fn split_assignment(clause: &str) -> Option<(&str, &str)> {
    let bytes = clause.as_bytes();
    let mut in_quote = false;
    let mut depth = 0_usize;
    for (index, &byte) in bytes.iter().enumerate() {
        match byte {
            b'\'' => in_quote = !in_quote,
            _ if in_quote => {}
            b'[' | b'(' => depth += 1,
            b']' | b')' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => {
                let operator_before = index > 0 && matches!(bytes[index - 1], b'=' | b'!' | b'<' | b'>');
                let operator_after = bytes.get(index + 1) == Some(&b'=');
                if !operator_before && !operator_after {
                    return Some((&clause[..index], &clause[index + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on top-level ` AND ` separators outside of quotes, case-insensitively.
fn split_and(expression: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let bytes = expression.as_bytes();
    let mut in_quote = false;
    let mut depth = 0_usize;
    let mut start = 0;
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'\'' {
            in_quote = !in_quote;
        } else if !in_quote && matches!(bytes[index], b'[' | b'(') {
            depth += 1;
        } else if !in_quote && matches!(bytes[index], b']' | b')') {
            depth = depth.saturating_sub(1);
        } else if !in_quote
            && depth == 0
            && index + 5 <= bytes.len()
            && bytes[index..index + 5].eq_ignore_ascii_case(b" and ")
        {
            clauses.push(&expression[start..index]);
            index += 5;
            start = index;
            continue;
        }
        index += 1;
    }
    clauses.push(&expression[start..]);
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        let selector = MessageSelector::parse("operation = 'sayHello' AND id='7'").unwrap();
        assert_eq!(selector.entries().len(), 2);
        assert_eq!(selector.entries()["operation"], "sayHello");
        assert_eq!(selector.entries()["id"], "7");

        let selector = MessageSelector::parse("text = 'rock and roll'").unwrap();
        assert_eq!(selector.entries()["text"], "rock and roll");
    }

    #[test]
    fn test_parse_invalid_selector() {
        assert!(MessageSelector::parse("operation").is_err());
        assert!(MessageSelector::parse("   ").is_err());
        assert!(MessageSelector::parse("status == 'ok'").is_err());
    }

    #[test]
    fn test_parse_json_path_filter_selector() {
        let selector =
            MessageSelector::parse(r#"jsonPath:$.items[?(@.id == 'a')].id = '["a"]' AND operation='x'"#)
                .unwrap();
        assert_eq!(selector.entries().len(), 2);
        assert_eq!(selector.entries()["jsonPath:$.items[?(@.id == 'a')].id"], r#"["a"]"#);
        assert_eq!(selector.entries()["operation"], "x");

        let context = TestContext::default();
        let message = Message::new(r#"{"items": [{"id": "a"}, {"id": "b"}]}"#).with_header("operation", "x");
        assert!(selector.matches(&message, &context));

        let other = Message::new(r#"{"items": [{"id": "b"}]}"#).with_header("operation", "x");
        assert!(!selector.matches(&other, &context));
    }

    #[test]
    fn test_matches_headers_and_json_path() {
        let context = TestContext::default();
        let message = Message::new(r#"{"user": "penny"}"#).with_header("operation", "greet");

        let selector =
            MessageSelector::parse("operation = 'greet' AND jsonPath:$.user = 'penny'").unwrap();
        assert!(selector.matches(&message, &context));

        let selector = MessageSelector::parse("operation = 'other'").unwrap();
        assert!(!selector.matches(&message, &context));

        let selector = MessageSelector::parse("missing = 'x'").unwrap();
        assert!(!selector.matches(&message, &context));
    }
}
