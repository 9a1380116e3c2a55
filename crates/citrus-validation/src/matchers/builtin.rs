use chrono::{Datelike as _, Weekday};
use regex::Regex;
use tracing::debug;

use citrus_core::dates::parse_date;
use citrus_core::{Error, Result, TestContext};

/// Pattern `dateRange` parses dates with unless one is given.
pub const DATE_RANGE_DEFAULT_PATTERN: &str = "dd-MM-yyyy";

/// Pattern `isWeekday` parses dates with unless one is given.
pub const WEEKDAY_DEFAULT_PATTERN: &str = "dd.MM.yyyy";

fn failure(matcher: &str, field: &str, value: Option<&str>, control: &str) -> Error {
    Error::validation(format!(
        "{matcher} failed for field '{field}'. Received value is '{}', control value is '{control}'",
        value.unwrap_or("null")
    ))
}

fn first<'control>(matcher: &str, control: &'control [String]) -> Result<&'control str> {
    control.first().map(String::as_str).ok_or_else(|| {
        Error::InvalidExpression(format!(
            "Missing control value for validation matcher '{matcher}'"
        ))
    })
}

fn check(
    matcher: &str,
    field: &str,
    value: Option<&str>,
    control: &[String],
    predicate: impl FnOnce(&str, &str) -> bool,
) -> Result<()> {
    let expected = first(matcher, control)?;
    match value {
        Some(actual) if predicate(actual, expected) => Ok(()),
        _ => Err(failure(matcher, field, value, expected)),
    }
}

fn parse_number(matcher: &str, text: &str) -> Result<f64> {
    text.trim().parse().map_err(|_| {
        Error::validation(format!("{matcher} can not parse '{text}' as a number"))
    })
}

pub fn equals_ignore_case(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("equalsIgnoreCase", field, value, control, |actual, expected| {
        actual.to_lowercase() == expected.to_lowercase()
    })
}

fn strip_new_lines(text: &str) -> String {
    text.replace("\r\n", "").replace('\n', "")
}

pub fn ignore_new_line(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("ignoreNewLine", field, value, control, |actual, expected| {
        strip_new_lines(actual) == strip_new_lines(expected)
    })
}

pub fn trim(field: &str, value: Option<&str>, control: &[String], _context: &TestContext) -> Result<()> {
    check("trim", field, value, control, |actual, expected| {
        actual.trim() == expected.trim()
    })
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|character| !character.is_whitespace()).collect()
}

pub fn trim_all_whitespaces(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("trimAllWhitespaces", field, value, control, |actual, expected| {
        strip_whitespace(actual) == strip_whitespace(expected)
    })
}

pub fn contains(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("contains", field, value, control, |actual, expected| {
        actual.contains(expected)
    })
}

pub fn contains_ignore_case(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("containsIgnoreCase", field, value, control, |actual, expected| {
        actual.to_lowercase().contains(&expected.to_lowercase())
    })
}

pub fn starts_with(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("startsWith", field, value, control, |actual, expected| {
        actual.starts_with(expected)
    })
}

pub fn ends_with(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("endsWith", field, value, control, |actual, expected| {
        actual.ends_with(expected)
    })
}

/// The whole value must match the regular expression.
pub fn matches(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    let pattern = first("matches", control)?;
    let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|error| {
        Error::InvalidExpression(format!("Invalid regular expression '{pattern}': {error}"))
    })?;
    check("matches", field, value, control, |actual, _| regex.is_match(actual))
}

pub fn matches_date_pattern(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    check("matchesDatePattern", field, value, control, |actual, pattern| {
        parse_date(actual, pattern).is_ok()
    })
}

pub fn is_number(
    field: &str,
    value: Option<&str>,
    _control: &[String],
    _context: &TestContext,
) -> Result<()> {
    match value {
        Some(actual) if actual.trim().parse::<f64>().is_ok() => Ok(()),
        _ => Err(failure("isNumber", field, value, "number")),
    }
}

pub fn lower_than(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    let expected = parse_number("lowerThan", first("lowerThan", control)?)?;
    let actual = parse_number("lowerThan", value.unwrap_or_default())?;
    if actual < expected {
        Ok(())
    } else {
        Err(failure("lowerThan", field, value, &control[0]))
    }
}

pub fn greater_than(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    let expected = parse_number("greaterThan", first("greaterThan", control)?)?;
    let actual = parse_number("greaterThan", value.unwrap_or_default())?;
    if actual > expected {
        Ok(())
    } else {
        Err(failure("greaterThan", field, value, &control[0]))
    }
}

fn parse_weekday(name: &str) -> Result<Weekday> {
    name.trim().parse().map_err(|_| {
        Error::InvalidExpression(format!("Unknown weekday '{name}' for isWeekday"))
    })
}

/// `isWeekday(MONDAY[, pattern])`.
pub fn is_weekday(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    let weekday = parse_weekday(first("isWeekday", control)?)?;
    let pattern = control
        .get(1)
        .map_or(WEEKDAY_DEFAULT_PATTERN, String::as_str);
    let date = parse_date(value.unwrap_or_default(), pattern)
        .map_err(|error| Error::validation(format!("isWeekday failed for field '{field}': {error}")))?;

    if date.weekday() == weekday {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "isWeekday failed for field '{field}'. Received value '{}' is a {}, expected {weekday}",
            value.unwrap_or_default(),
            date.weekday()
        )))
    }
}

/// Stores the value in the named variable, or in a variable named after the field.
pub fn variable(
    field: &str,
    value: Option<&str>,
    control: &[String],
    context: &TestContext,
) -> Result<()> {
    let name = control
        .first()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(field);
    debug!("Setting variable '{name}' from field '{field}'");
    context.set_variable(name, value.unwrap_or_default())
}

pub fn ignore(
    field: &str,
    _value: Option<&str>,
    _control: &[String],
    _context: &TestContext,
) -> Result<()> {
    debug!("Ignoring value of field '{field}'");
    Ok(())
}

pub fn string_length(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    let expected: usize = first("stringLength", control)?.trim().parse().map_err(|_| {
        Error::InvalidExpression(format!(
            "Invalid length '{}' for stringLength",
            control[0]
        ))
    })?;
    check("stringLength", field, value, control, |actual, _| {
        actual.chars().count() == expected
    })
}

/// `dateRange(from, to[, pattern])`, bounds inclusive.
pub fn date_range(
    field: &str,
    value: Option<&str>,
    control: &[String],
    _context: &TestContext,
) -> Result<()> {
    let (Some(from), Some(to)) = (control.first(), control.get(1)) else {
        return Err(Error::InvalidExpression(
            "dateRange requires a from and a to date".to_owned(),
        ));
    };
    let pattern = control
        .get(2)
        .map_or(DATE_RANGE_DEFAULT_PATTERN, String::as_str);

    let from = parse_date(from, pattern)?;
    let to = parse_date(to, pattern)?;
    let actual = parse_date(value.unwrap_or_default(), pattern)
        .map_err(|error| Error::validation(format!("dateRange failed for field '{field}': {error}")))?;

    if from <= actual && actual <= to {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "dateRange failed for field '{field}'. Received value '{}' is not between '{}' and '{}'",
            value.unwrap_or_default(),
            control[0],
            control[1]
        )))
    }
}

pub fn empty(
    field: &str,
    value: Option<&str>,
    _control: &[String],
    _context: &TestContext,
) -> Result<()> {
    if value.is_none_or(str::is_empty) {
        Ok(())
    } else {
        Err(failure("empty", field, value, ""))
    }
}

pub fn not_empty(
    field: &str,
    value: Option<&str>,
    _control: &[String],
    _context: &TestContext,
) -> Result<()> {
    if value.is_some_and(|actual| !actual.is_empty()) {
        Ok(())
    } else {
        Err(failure("notEmpty", field, value, "not empty"))
    }
}

fn is_null(value: Option<&str>) -> bool {
    value.is_none_or(|actual| actual == "null")
}

pub fn null(field: &str, value: Option<&str>, _control: &[String], _context: &TestContext) -> Result<()> {
    if is_null(value) {
        Ok(())
    } else {
        Err(failure("null", field, value, "null"))
    }
}

pub fn not_null(
    field: &str,
    value: Option<&str>,
    _control: &[String],
    _context: &TestContext,
) -> Result<()> {
    if is_null(value) {
        Err(failure("notNull", field, value, "not null"))
    } else {
        Ok(())
    }
}
