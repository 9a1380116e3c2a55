//! `assertThat(...)` matcher evaluating nested Hamcrest style expressions.

use regex::Regex;
use serde_json::Value as JsonValue;

use citrus_core::parameters::split_parameters;
use citrus_core::{Error, Result, TestContext, ValidationMatcher};

/// A parsed Hamcrest expression such as `allOf(startsWith(a), not(endsWith(z)))`.
#[derive(Debug, Clone, PartialEq)]
enum Expression {
    EqualTo(String),
    EqualToIgnoringCase(String),
    EqualToIgnoringWhiteSpace(String),
    Not(Box<Self>),
    ContainsString(String),
    StartsWith(String),
    EndsWith(String),
    MatchesPattern(String),
    GreaterThan(f64),
    GreaterThanOrEqualTo(f64),
    LessThan(f64),
    LessThanOrEqualTo(f64),
    CloseTo(f64, f64),
    IsEmptyString,
    IsEmptyOrNullString,
    NullValue,
    NotNullValue,
    Anything,
    HasSize(usize),
    HasItem(Box<Self>),
    Contains(Vec<String>),
    IsOneOf(Vec<String>),
    AnyOf(Vec<Self>),
    AllOf(Vec<Self>),
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidExpression(message.into())
}

fn single(name: &str, arguments: &[String]) -> Result<String> {
    match arguments {
        [argument] => Ok(argument.clone()),
        _ => Err(invalid(format!(
            "Hamcrest matcher '{name}' expects exactly one argument, got {}",
            arguments.len()
        ))),
    }
}

fn number(name: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| invalid(format!("Hamcrest matcher '{name}' expects a number, got '{text}'")))
}

/// Splits `name(body)`; `None` for plain values.
fn call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    let name = text[..open].trim();
    if name.is_empty()
        || !name.chars().all(|character| character.is_ascii_alphanumeric())
        || !text.ends_with(')')
    {
        return None;
    }
    Some((name, &text[open + 1..text.len() - 1]))
}

/// Nested matcher if `text` is a call of a known matcher, otherwise `equalTo(text)`.
fn operand(text: &str) -> Result<Expression> {
    match call(text.trim()) {
        Some((name, _)) if is_known(name) => parse(text.trim()),
        _ => Ok(Expression::EqualTo(text.to_owned())),
    }
}

fn operands(arguments: &[String]) -> Result<Vec<Expression>> {
    arguments.iter().map(String::as_str).map(operand).collect()
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "equalTo"
            | "equalToIgnoringCase"
            | "equalToIgnoringWhiteSpace"
            | "is"
            | "not"
            | "containsString"
            | "startsWith"
            | "endsWith"
            | "matchesPattern"
            | "greaterThan"
            | "greaterThanOrEqualTo"
            | "lessThan"
            | "lessThanOrEqualTo"
            | "closeTo"
            | "isEmptyString"
            | "isEmptyOrNullString"
            | "nullValue"
            | "notNullValue"
            | "anything"
            | "hasSize"
            | "hasItem"
            | "contains"
            | "anyOf"
            | "allOf"
            | "isOneOf"
    )
}

fn parse(text: &str) -> Result<Expression> {
    let text = text.trim();
    let (name, body) = call(text)
        .ok_or_else(|| invalid(format!("Invalid Hamcrest expression '{text}'")))?;
    let arguments = split_parameters(body)?;

    Ok(match name {
        "equalTo" => Expression::EqualTo(single(name, &arguments)?),
        "equalToIgnoringCase" => Expression::EqualToIgnoringCase(single(name, &arguments)?),
        "equalToIgnoringWhiteSpace" => {
            Expression::EqualToIgnoringWhiteSpace(single(name, &arguments)?)
        }
        "is" => operand(&single(name, &arguments)?)?,
        "not" => Expression::Not(Box::new(operand(&single(name, &arguments)?)?)),
        "containsString" => Expression::ContainsString(single(name, &arguments)?),
        "startsWith" => Expression::StartsWith(single(name, &arguments)?),
        "endsWith" => Expression::EndsWith(single(name, &arguments)?),
        "matchesPattern" => Expression::MatchesPattern(single(name, &arguments)?),
        "greaterThan" => Expression::GreaterThan(number(name, &single(name, &arguments)?)?),
        "greaterThanOrEqualTo" => {
            Expression::GreaterThanOrEqualTo(number(name, &single(name, &arguments)?)?)
        }
        "lessThan" => Expression::LessThan(number(name, &single(name, &arguments)?)?),
        "lessThanOrEqualTo" => {
            Expression::LessThanOrEqualTo(number(name, &single(name, &arguments)?)?)
        }
        "closeTo" => match arguments.as_slice() {
            [value, delta] => Expression::CloseTo(number(name, value)?, number(name, delta)?),
            _ => return Err(invalid("Hamcrest matcher 'closeTo' expects a value and a delta")),
        },
        "isEmptyString" => Expression::IsEmptyString,
        "isEmptyOrNullString" => Expression::IsEmptyOrNullString,
        "nullValue" => Expression::NullValue,
        "notNullValue" => Expression::NotNullValue,
        "anything" => Expression::Anything,
        "hasSize" => {
            let size = single(name, &arguments)?;
            Expression::HasSize(size.trim().parse().map_err(|_| {
                invalid(format!("Hamcrest matcher 'hasSize' expects a size, got '{size}'"))
            })?)
        }
        "hasItem" => Expression::HasItem(Box::new(operand(&single(name, &arguments)?)?)),
        "contains" => Expression::Contains(arguments),
        "isOneOf" => Expression::IsOneOf(arguments),
        "anyOf" => Expression::AnyOf(operands(&arguments)?),
        "allOf" => Expression::AllOf(operands(&arguments)?),
        other => return Err(invalid(format!("Unsupported Hamcrest matcher '{other}'"))),
    })
}

/// Reads a collection value written as `[a, b]` or as a JSON array.
fn as_list(value: &str) -> Option<Vec<String>> {
    let trimmed = value.trim();
    if let Ok(JsonValue::Array(items)) = serde_json::from_str::<JsonValue>(trimmed) {
        return Some(
            items
                .into_iter()
                .map(|item| match item {
                    JsonValue::String(text) => text,
                    other => other.to_string(),
                })
                .collect(),
        );
    }
    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    split_parameters(inner).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn compare(value: Option<&str>, predicate: impl FnOnce(f64) -> bool) -> bool {
    value
        .and_then(|actual| actual.trim().parse::<f64>().ok())
        .is_some_and(predicate)
}

impl Expression {
    fn matches(&self, value: Option<&str>) -> Result<bool> {
        let text = value.unwrap_or_default();
        Ok(match self {
            Self::EqualTo(expected) => value == Some(expected.as_str()),
            Self::EqualToIgnoringCase(expected) => {
                value.is_some_and(|actual| actual.to_lowercase() == expected.to_lowercase())
            }
            Self::EqualToIgnoringWhiteSpace(expected) => {
                value.is_some_and(|actual| collapse_whitespace(actual) == collapse_whitespace(expected))
            }
            Self::Not(inner) => !inner.matches(value)?,
            Self::ContainsString(expected) => value.is_some_and(|actual| actual.contains(expected.as_str())),
            Self::StartsWith(expected) => value.is_some_and(|actual| actual.starts_with(expected.as_str())),
            Self::EndsWith(expected) => value.is_some_and(|actual| actual.ends_with(expected.as_str())),
            Self::MatchesPattern(pattern) => {
                let regex = Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|error| invalid(format!("Invalid pattern '{pattern}': {error}")))?;
                value.is_some_and(|actual| regex.is_match(actual))
            }
            Self::GreaterThan(limit) => compare(value, |actual| actual > *limit),
            Self::GreaterThanOrEqualTo(limit) => compare(value, |actual| actual >= *limit),
            Self::LessThan(limit) => compare(value, |actual| actual < *limit),
            Self::LessThanOrEqualTo(limit) => compare(value, |actual| actual <= *limit),
            Self::CloseTo(expected, delta) => {
                compare(value, |actual| (actual - expected).abs() <= *delta)
            }
            Self::IsEmptyString => value == Some(""),
            Self::IsEmptyOrNullString => value.is_none_or(str::is_empty),
            Self::NullValue => value.is_none_or(|actual| actual == "null"),
            Self::NotNullValue => value.is_some_and(|actual| actual != "null"),
            Self::Anything => true,
            Self::HasSize(size) => as_list(text)
                .map_or_else(|| text.chars().count(), |items| items.len())
                == *size,
            Self::HasItem(inner) => {
                let mut found = false;
                for item in as_list(text).unwrap_or_default() {
                    if inner.matches(Some(item.as_str()))? {
                        found = true;
                        break;
                    }
                }
                found
            }
            Self::Contains(expected) => as_list(text).is_some_and(|items| items == *expected),
            Self::IsOneOf(candidates) => value.is_some_and(|actual| {
                candidates.iter().any(|candidate| candidate == actual)
            }),
            Self::AnyOf(inner) => {
                for expression in inner {
                    if expression.matches(value)? {
                        return Ok(true);
                    }
                }
                false
            }
            Self::AllOf(inner) => {
                for expression in inner {
                    if !expression.matches(value)? {
                        return Ok(false);
                    }
                }
                true
            }
        })
    }
}

/// Matcher registered as `assertThat`. The whole argument body is one control value.
#[derive(Debug, Clone, Copy, Default)]
pub struct HamcrestValidationMatcher;

impl ValidationMatcher for HamcrestValidationMatcher {
    fn validate(
        &self,
        field: &str,
        value: Option<&str>,
        control: &[String],
        _context: &TestContext,
    ) -> Result<()> {
        let expression = control
            .first()
            .ok_or_else(|| invalid("Missing Hamcrest expression for assertThat"))?;
        if parse(expression)?.matches(value)? {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "assertThat failed for field '{field}'. Received value is '{}' and did not match '{expression}'",
                value.unwrap_or("null")
            )))
        }
    }

    fn extract_control_values(&self, expression: &str) -> Result<Vec<String>> {
        Ok(vec![expression.trim().to_owned()])
    }
}
