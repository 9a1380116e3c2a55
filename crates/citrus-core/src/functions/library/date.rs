use chrono::{Local, Utc};

use crate::context::TestContext;
use crate::dates::{DEFAULT_DATE_PATTERN, apply_offset, format_date, parse_date};
use crate::error::Result;
use crate::functions::parser::required_parameter;

/// `currentDate([pattern][, offset])`.
pub fn current_date(parameters: &[String], _context: &TestContext) -> Result<String> {
    let pattern = parameters
        .first()
        .map_or(DEFAULT_DATE_PATTERN, String::as_str);
    let mut date = Local::now();
    if let Some(offset) = parameters.get(1) {
        date = apply_offset(date, offset)?;
    }
    format_date(&date, pattern)
}

/// `changeDate(date, offset[, pattern])`, where the pattern applies to input and output.
pub fn change_date(parameters: &[String], _context: &TestContext) -> Result<String> {
    const USAGE: &str = "changeDate(date, offset[, pattern])";
    let value = required_parameter(parameters, 0, USAGE)?;
    let offset = required_parameter(parameters, 1, USAGE)?;
    let pattern = parameters
        .get(2)
        .map_or(DEFAULT_DATE_PATTERN, String::as_str);

    let date = apply_offset(parse_date(value, pattern)?, offset)?;
    format_date(&date, pattern)
}

/// Seconds since the epoch.
pub fn unix_timestamp(_parameters: &[String], _context: &TestContext) -> Result<String> {
    Ok(Utc::now().timestamp().to_string())
}
