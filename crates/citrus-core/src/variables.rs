//! Helpers for `${name}` variable expressions.

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::settings::{VARIABLE_ESCAPE, VARIABLE_PREFIX, VARIABLE_SUFFIX};

/// Whether the whole expression is a single variable reference like `${name}`.
pub fn is_variable_name(expression: &str) -> bool {
    expression.len() > VARIABLE_PREFIX.len() + VARIABLE_SUFFIX.len()
        && expression.starts_with(VARIABLE_PREFIX)
        && expression.ends_with(VARIABLE_SUFFIX)
        && find_variable_end(&expression[VARIABLE_PREFIX.len()..])
            == Some(expression.len() - VARIABLE_PREFIX.len() - VARIABLE_SUFFIX.len())
}

/// Strips `${` and `}` from a variable expression, leaving other text untouched.
pub fn cut_off_variables_prefix(expression: &str) -> &str {
    if expression.starts_with(VARIABLE_PREFIX) && expression.ends_with(VARIABLE_SUFFIX) {
        &expression[VARIABLE_PREFIX.len()..expression.len() - VARIABLE_SUFFIX.len()]
    } else {
        expression
    }
}

/// Whether a variable name is wrapped in `//` and must not be resolved.
pub fn is_escaped(name: &str) -> bool {
    name.len() >= 2 * VARIABLE_ESCAPE.len()
        && name.starts_with(VARIABLE_ESCAPE)
        && name.ends_with(VARIABLE_ESCAPE)
}

/// Removes the `//` escaping around a variable name.
pub fn cut_off_variables_escaping(name: &str) -> &str {
    if is_escaped(name) {
        &name[VARIABLE_ESCAPE.len()..name.len() - VARIABLE_ESCAPE.len()]
    } else {
        name
    }
}

/// Removes one pair of surrounding single quotes.
pub fn cut_off_single_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Byte offset of the `}` closing a variable whose name starts at `text[0]`.
///
/// Nested `${` openers are counted so `a_${b}}` closes at the last brace.
fn find_variable_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0_usize;
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index..].starts_with(VARIABLE_PREFIX.as_bytes()) {
            depth += 1;
            index += VARIABLE_PREFIX.len();
            continue;
        }
        if bytes[index..].starts_with(VARIABLE_SUFFIX.as_bytes()) {
            if depth == 0 {
                return Some(index);
            }
            depth -= 1;
        }
        index += 1;
    }
    None
}

/// Replaces every `${name}` in `text` with the variable value.
///
/// Nested references resolve inside out, so `${user_${id}}` first resolves
/// `id`. With `enable_quoting` every substituted value is wrapped in single
/// quotes.
///
/// # Errors
/// Returns `Error::NoSuchVariable` for unknown variables and
/// `Error::InvalidExpression` for an unterminated `${`.
pub fn replace_variables_in_string(
    text: &str,
    context: &TestContext,
    enable_quoting: bool,
) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(VARIABLE_PREFIX) {
        result.push_str(&rest[..start]);
        let after = &rest[start + VARIABLE_PREFIX.len()..];
        let end = find_variable_end(after).ok_or_else(|| {
            Error::InvalidExpression(format!(
                "Unterminated variable expression in '{text}'"
            ))
        })?;

        let raw_name = &after[..end];
        let value = if raw_name.contains(VARIABLE_PREFIX) && !is_escaped(raw_name) {
            let name = replace_variables_in_string(raw_name, context, false)?;
            context.get_variable(&name)?
        } else {
            context.get_variable(raw_name)?
        };

        if enable_quoting {
            result.push('\'');
            result.push_str(&value);
            result.push('\'');
        } else {
            result.push_str(&value);
        }
        rest = &after[end + VARIABLE_SUFFIX.len()..];
    }

    result.push_str(rest);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TestContext {
        let context = TestContext::default();
        context.set_variable("greeting", "Hello").unwrap();
        context.set_variable("name", "Citrus").unwrap();
        context.set_variable("id", "7").unwrap();
        context.set_variable("user_7", "penny").unwrap();
        context
    }

    #[test]
    fn test_is_variable_name() {
        assert!(is_variable_name("${foo}"));
        assert!(is_variable_name("${a_${b}}"));
        assert!(!is_variable_name("${foo} and ${bar}"));
        assert!(!is_variable_name("foo"));
        assert!(!is_variable_name("${}"));
    }

    #[test]
    fn test_cut_off_helpers() {
        assert_eq!(cut_off_variables_prefix("${foo}"), "foo");
        assert_eq!(cut_off_variables_prefix("foo"), "foo");
        assert_eq!(cut_off_variables_escaping("//foo//"), "foo");
        assert_eq!(cut_off_variables_escaping("foo"), "foo");
        assert_eq!(cut_off_single_quotes("'foo'"), "foo");
        assert_eq!(cut_off_single_quotes("'"), "'");
    }

    #[test]
    fn test_replace_variables() {
        let context = context();
        let replaced =
            replace_variables_in_string("${greeting} ${name}!", &context, false).unwrap();
        assert_eq!(replaced, "Hello Citrus!");

        let quoted = replace_variables_in_string("${greeting}", &context, true).unwrap();
        assert_eq!(quoted, "'Hello'");

        let untouched = replace_variables_in_string("no variables", &context, false).unwrap();
        assert_eq!(untouched, "no variables");
    }

    #[test]
    fn test_nested_variables() {
        let context = context();
        let replaced = replace_variables_in_string("user=${user_${id}}", &context, false).unwrap();
        assert_eq!(replaced, "user=penny");
    }

    #[test]
    fn test_escaped_variable_stays_literal() {
        let context = context();
        let replaced = replace_variables_in_string("${//greeting//}", &context, false).unwrap();
        assert_eq!(replaced, "${greeting}");
    }

    #[test]
    fn test_unknown_and_unterminated() {
        let context = context();
        let error = replace_variables_in_string("${unknown}", &context, false).unwrap_err();
        assert!(matches!(error, Error::NoSuchVariable(_)));

        let error = replace_variables_in_string("${greeting", &context, false).unwrap_err();
        assert!(matches!(error, Error::InvalidExpression(_)));
    }
}
