//! Containers grouping nested actions: sequences, loops, branches, error
//! handling, async execution, timers and templates.

/// Async container.
pub mod asynchronous;
/// Conditional, assert and catch containers.
pub mod branch;
/// Iterate, repeat and repeat-on-error loops.
pub mod iterate;
/// Sequential and parallel containers.
pub mod sequence;
/// Templates with parameters.
pub mod template;
/// Timer container and stop timer action.
pub mod timer;

use tracing::debug;

use citrus_core::boolean_parser;
use citrus_core::matcher::expression::{
    is_validation_matcher_expression, resolve_validation_matcher,
};
use citrus_core::{Error, Result, TestContext};

pub use asynchronous::Async;
pub use branch::{Assert, Catch, Conditional};
pub use iterate::{Iterate, RepeatOnErrorUntilTrue, RepeatUntilTrue};
pub use sequence::{Parallel, Sequence};
pub use template::Template;
pub use timer::{StopTimerAction, Timer};

/// Error kind matching every failure in `assert` and `catch`.
pub const ANY_ERROR_KIND: &str = "RuntimeError";

/// Whether `error` is of the `expected` kind; no kind matches everything.
pub(crate) fn matches_error_kind(expected: Option<&str>, error: &Error) -> bool {
    expected.is_none_or(|kind| kind == ANY_ERROR_KIND || kind == error.kind())
}

/// Replaces whole-word occurrences of `name` with `value`.
fn substitute_index(condition: &str, name: &str, value: &str) -> String {
    if name.is_empty() {
        return condition.to_owned();
    }
    let is_word = |ch: char| ch.is_alphanumeric() || ch == '_';
    let mut result = String::with_capacity(condition.len());
    let mut rest = condition;
    while let Some(position) = rest.find(name) {
        let before = rest[..position].chars().next_back();
        let after = rest[position + name.len()..].chars().next();
        let standalone = before.is_none_or(|ch| !is_word(ch)) && after.is_none_or(|ch| !is_word(ch));
        result.push_str(&rest[..position]);
        result.push_str(if standalone { value } else { name });
        rest = &rest[position + name.len()..];
    }
    result.push_str(rest);
    result
}

/// Evaluates a loop or branch condition.
///
/// A validation matcher expression is checked against the current index
/// (or an empty value outside loops) and yields false when the matcher
/// fails. Anything else has its dynamic content resolved, the index name
/// replaced by its value and is evaluated as a boolean expression.
///
/// # Errors
/// Returns resolution errors and malformed boolean expressions.
pub fn evaluate_condition(
    condition: &str,
    index: Option<(&str, i64)>,
    context: &TestContext,
) -> Result<bool> {
    let index_value = index.map(|(_, value)| value.to_string());

    if is_validation_matcher_expression(condition) {
        return match resolve_validation_matcher(
            "condition",
            Some(index_value.as_deref().unwrap_or_default()),
            condition,
            context,
        ) {
            Ok(()) => Ok(true),
            Err(error) if error.is_validation() => Ok(false),
            Err(error) => Err(error),
        };
    }

    let mut expression = context.replace_dynamic_content(condition)?;
    if let (Some((name, _)), Some(value)) = (index, index_value.as_deref()) {
        expression = substitute_index(&expression, name, value);
    }
    let result = boolean_parser::evaluate(&expression)?;
    debug!("Condition '{condition}' evaluated to {result}");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use citrus_core::TestContextFactory;
    use citrus_validation::default_matcher_registry;

    use super::*;

    fn context() -> TestContext {
        TestContextFactory::new()
            .with_matcher_registry(default_matcher_registry())
            .create_context()
    }

    #[test]
    fn test_substitute_index_whole_words() {
        assert_eq!(substitute_index("i lt= 5", "i", "3"), "3 lt= 5");
        assert_eq!(substitute_index("(i = 2) or (items = 1)", "i", "2"), "(2 = 2) or (items = 1)");
        assert_eq!(substitute_index("index gt 1", "i", "4"), "index gt 1");
    }

    #[test]
    fn test_boolean_condition_with_index() {
        let context = context();
        assert!(evaluate_condition("i lt= 5", Some(("i", 5)), &context).unwrap());
        assert!(!evaluate_condition("i lt= 5", Some(("i", 6)), &context).unwrap());

        context.set_variable("limit", "3").unwrap();
        assert!(evaluate_condition("i lt ${limit}", Some(("i", 2)), &context).unwrap());
        assert!(evaluate_condition("true", None, &context).unwrap());
    }

    #[test]
    fn test_matcher_condition() {
        let context = context();
        assert!(evaluate_condition("@greaterThan(3)@", Some(("i", 4)), &context).unwrap());
        assert!(!evaluate_condition("@greaterThan(3)@", Some(("i", 2)), &context).unwrap());
        assert!(evaluate_condition("@empty()@", None, &context).unwrap());
    }

    #[test]
    fn test_invalid_condition() {
        assert!(evaluate_condition("i lt", Some(("i", 1)), &context()).is_err());
    }

    #[test]
    fn test_error_kinds() {
        let error = Error::validation("x");
        assert!(matches_error_kind(None, &error));
        assert!(matches_error_kind(Some(ANY_ERROR_KIND), &error));
        assert!(matches_error_kind(Some("ValidationError"), &error));
        assert!(!matches_error_kind(Some("EndpointError"), &error));
    }
}
