use tracing::debug;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::settings::{VALIDATION_MATCHER_PREFIX, VALIDATION_MATCHER_SUFFIX};

/// Parts of a matcher expression such as `@my:matches('[a-z]+')@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherExpression<'expr> {
    /// Library prefix including the colon, empty for the default library.
    pub prefix: &'expr str,
    /// Matcher name.
    pub name: &'expr str,
    /// Raw text between the parentheses.
    pub body: &'expr str,
}

/// Whether `expression` is delimited by `@` on both sides.
pub fn is_validation_matcher_expression(expression: &str) -> bool {
    expression.len() > VALIDATION_MATCHER_PREFIX.len()
        && expression.starts_with(VALIDATION_MATCHER_PREFIX)
        && expression.ends_with(VALIDATION_MATCHER_SUFFIX)
}

/// Splits an expression into prefix, name and argument body.
///
/// The `@` delimiters are optional here.
///
/// # Errors
/// Returns `Error::InvalidExpression` if the parenthesized body is missing.
pub fn parse_matcher_expression(expression: &str) -> Result<MatcherExpression<'_>> {
    let mut inner = expression.trim();
    if is_validation_matcher_expression(inner) {
        inner =
            &inner[VALIDATION_MATCHER_PREFIX.len()..inner.len() - VALIDATION_MATCHER_SUFFIX.len()];
    }
    let inner = inner.trim();
    if inner == "ignore" {
        return Ok(MatcherExpression {
            prefix: "",
            name: "ignore",
            body: "",
        });
    }

    let missing_body = || {
        Error::InvalidExpression(
            "Illegal syntax for validation matcher expression - missing validation value in '()' function body"
                .to_owned(),
        )
    };
    let open = inner.find('(').ok_or_else(missing_body)?;
    let close = inner
        .rfind(')')
        .filter(|close| *close > open)
        .ok_or_else(missing_body)?;

    let (prefix, name) = match inner[..open].find(':') {
        Some(colon) => (&inner[..=colon], &inner[colon + 1..open]),
        None => ("", &inner[..open]),
    };

    Ok(MatcherExpression {
        prefix,
        name: name.trim(),
        body: &inner[open + 1..close],
    })
}

/// Evaluates a matcher expression against the actual `value` of `field`.
///
/// Control values are extracted by the matcher, then have their variables
/// and functions resolved before the matcher runs.
///
/// # Errors
/// Returns lookup errors for unknown libraries or matchers, parse errors and
/// the `Error::Validation` raised by the matcher itself.
pub fn resolve_validation_matcher(
    field: &str,
    value: Option<&str>,
    expression: &str,
    context: &TestContext,
) -> Result<()> {
    let parsed = parse_matcher_expression(expression)?;

    let library = context.matcher_registry().library_for_prefix(parsed.prefix)?;
    let matcher = library.get_matcher(parsed.name)?;

    let control = matcher
        .extract_control_values(parsed.body)?
        .iter()
        .map(|control| context.replace_dynamic_content(control))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Validating field '{field}' with matcher {}{}({})",
        parsed.prefix,
        parsed.name,
        control.join(", ")
    );
    matcher.validate(field, value, &control, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContextFactory;
    use crate::matcher::{ValidationMatcherLibrary, ValidationMatcherRegistry};

    fn contains(
        field: &str,
        value: Option<&str>,
        control: &[String],
        _context: &TestContext,
    ) -> Result<()> {
        let value = value.unwrap_or_default();
        if control.iter().all(|expected| value.contains(expected.as_str())) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "{field} value '{value}' does not contain {control:?}"
            )))
        }
    }

    fn ignore(_: &str, _: Option<&str>, _: &[String], _: &TestContext) -> Result<()> {
        Ok(())
    }

    fn context() -> TestContext {
        let registry = ValidationMatcherRegistry::new()
            .with_library(
                ValidationMatcherLibrary::new("default", "")
                    .with_matcher("contains", contains)
                    .with_matcher("ignore", ignore),
            )
            .with_library(
                ValidationMatcherLibrary::new("custom", "my:").with_matcher("has", contains),
            );
        TestContextFactory::new()
            .with_matcher_registry(registry)
            .create_context()
    }

    #[test]
    fn test_is_validation_matcher_expression() {
        assert!(is_validation_matcher_expression("@contains('a')@"));
        assert!(is_validation_matcher_expression("@ignore@"));
        assert!(!is_validation_matcher_expression("@"));
        assert!(!is_validation_matcher_expression("contains('a')"));
    }

    #[test]
    fn test_parse_expression() {
        let parsed = parse_matcher_expression("@my:has('a, b', c)@").unwrap();
        assert_eq!(parsed.prefix, "my:");
        assert_eq!(parsed.name, "has");
        assert_eq!(parsed.body, "'a, b', c");

        let parsed = parse_matcher_expression("@matches('a:(b)')@").unwrap();
        assert_eq!(parsed.prefix, "");
        assert_eq!(parsed.name, "matches");
        assert_eq!(parsed.body, "'a:(b)'");

        let parsed = parse_matcher_expression("@ignore@").unwrap();
        assert_eq!(parsed.name, "ignore");

        let error = parse_matcher_expression("@contains@").unwrap_err();
        assert!(error.to_string().contains("missing validation value"));
    }

    #[test]
    fn test_resolve_with_variables_and_functions() {
        let context = context();
        context.set_variable("word", "World").unwrap();

        resolve_validation_matcher(
            "greeting",
            Some("Hello WORLD"),
            "@contains('Hello', citrus:upperCase('${word}'))@",
            &context,
        )
        .unwrap();

        let error =
            resolve_validation_matcher("greeting", Some("Hi"), "@contains('Hello')@", &context)
                .unwrap_err();
        assert!(error.is_validation());
    }

    #[test]
    fn test_prefixed_library_and_lookup_errors() {
        let context = context();
        resolve_validation_matcher("field", Some("abc"), "@my:has('b')@", &context).unwrap();
        resolve_validation_matcher("field", None, "@ignore@", &context).unwrap();

        assert!(matches!(
            resolve_validation_matcher("field", Some("abc"), "@other:has('b')@", &context),
            Err(Error::NoSuchMatcherLibrary(_))
        ));
        assert!(matches!(
            resolve_validation_matcher("field", Some("abc"), "@unknown('b')@", &context),
            Err(Error::NoSuchValidationMatcher(_))
        ));
        assert!(matches!(
            resolve_validation_matcher("field", Some("abc"), "@contains('b)@", &context),
            Err(Error::InvalidExpression(_))
        ));
    }
}
