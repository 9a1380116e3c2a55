//! Date patterns in `dd.MM.yyyy` notation and `+1d-2h` style offsets.

use core::fmt::Write as _;

use chrono::{
    DateTime, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone as _,
};
use regex::Regex;

use crate::error::{Error, Result};

/// Pattern used by `currentDate` and `changeDate` when none is given.
pub const DEFAULT_DATE_PATTERN: &str = "dd.MM.yyyy";

/// Converts a `yyyy-MM-dd'T'HH:mm:ss` style pattern into a chrono format string.
pub fn to_chrono_format(pattern: &str) -> String {
    let characters: Vec<char> = pattern.chars().collect();
    let mut format = String::with_capacity(pattern.len() * 2);
    let mut index = 0;

    while index < characters.len() {
        let character = characters[index];

        if character == '\'' {
            if characters.get(index + 1) == Some(&'\'') {
                format.push('\'');
                index += 2;
                continue;
            }
            index += 1;
            while index < characters.len() {
                if characters[index] == '\'' {
                    if characters.get(index + 1) == Some(&'\'') {
                        format.push('\'');
                        index += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut format, characters[index]);
                index += 1;
            }
            index += 1;
            continue;
        }

        let mut run = 1;
        while characters.get(index + run) == Some(&character) {
            run += 1;
        }

        let token = match (character, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('h', 1) => Some("%-I"),
            ('h', _) => Some("%I"),
            ('m', 1) => Some("%-M"),
            ('m', _) => Some("%M"),
            ('s', 1) => Some("%-S"),
            ('s', _) => Some("%S"),
            ('S', _) => Some("%3f"),
            ('a', _) => Some("%p"),
            ('E', 1..=3) => Some("%a"),
            ('E', _) => Some("%A"),
            ('Z', _) => Some("%z"),
            ('X', _) => Some("%:z"),
            _ => None,
        };

        match token {
            Some(token) => format.push_str(token),
            None => {
                for _ in 0..run {
                    push_literal(&mut format, character);
                }
            }
        }
        index += run;
    }

    format
}

fn push_literal(format: &mut String, character: char) {
    if character == '%' {
        format.push_str("%%");
    } else {
        format.push(character);
    }
}

/// Formats `date` with a `dd.MM.yyyy` style pattern.
///
/// # Errors
/// Returns `Error::InvalidFunctionUsage` if the pattern cannot be rendered.
pub fn format_date(date: &DateTime<Local>, pattern: &str) -> Result<String> {
    let mut rendered = String::new();
    write!(rendered, "{}", date.format(&to_chrono_format(pattern))).map_err(|_| {
        Error::InvalidFunctionUsage(format!("Unsupported date pattern '{pattern}'"))
    })?;
    Ok(rendered)
}

/// Parses `value` with a `dd.MM.yyyy` style pattern. Patterns without time
/// fields yield midnight in the local time zone.
///
/// # Errors
/// Returns `Error::InvalidFunctionUsage` if the value does not match the pattern.
pub fn parse_date(value: &str, pattern: &str) -> Result<DateTime<Local>> {
    let format = to_chrono_format(pattern);
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_str(value, &format) {
        return Ok(date.with_timezone(&Local));
    }

    let naive = NaiveDateTime::parse_from_str(value, &format)
        .or_else(|_| {
            NaiveDate::parse_from_str(value, &format).map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|error| {
            Error::InvalidFunctionUsage(format!(
                "Unable to parse date '{value}' with pattern '{pattern}': {error}"
            ))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::InvalidFunctionUsage(format!("Invalid local date '{value}'")))
}

/// Applies an offset such as `+1y`, `-2M`, `+3d+4h` or `-1m -30s` to `date`.
///
/// Units: `y` years, `M` months, `d` days, `h` hours, `m` minutes, `s` seconds.
///
/// # Errors
/// Returns `Error::InvalidFunctionUsage` for malformed offsets.
pub fn apply_offset(date: DateTime<Local>, offset: &str) -> Result<DateTime<Local>> {
    let invalid = || Error::InvalidFunctionUsage(format!("Invalid date offset '{offset}'"));
    let pattern = Regex::new(r"([+-]?)\s*(\d+)\s*([yMdhms])").map_err(|_| invalid())?;

    let compact: String = offset.chars().filter(|character| !character.is_whitespace()).collect();
    let matched_length: usize = pattern
        .find_iter(&compact)
        .map(|found| found.as_str().len())
        .sum();
    if compact.is_empty() || matched_length != compact.len() {
        return Err(invalid());
    }

    let mut result = date;
    for captures in pattern.captures_iter(&compact) {
        let negative = &captures[1] == "-";
        let amount: u32 = captures[2].parse().map_err(|_| invalid())?;
        result = match &captures[3] {
            "y" | "M" => {
                let months = Months::new(if &captures[3] == "y" {
                    amount.checked_mul(12).ok_or_else(invalid)?
                } else {
                    amount
                });
                if negative {
                    result.checked_sub_months(months)
                } else {
                    result.checked_add_months(months)
                }
                .ok_or_else(invalid)?
            }
            unit => {
                let delta = match unit {
                    "d" => TimeDelta::try_days(i64::from(amount)),
                    "h" => TimeDelta::try_hours(i64::from(amount)),
                    "m" => TimeDelta::try_minutes(i64::from(amount)),
                    _ => TimeDelta::try_seconds(i64::from(amount)),
                }
                .ok_or_else(invalid)?;
                if negative {
                    result.checked_sub_signed(delta)
                } else {
                    result.checked_add_signed(delta)
                }
                .ok_or_else(invalid)?
            }
        };
    }
    Ok(result)
}
