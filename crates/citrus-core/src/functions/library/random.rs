use rand::Rng as _;
use rand::seq::IndexedRandom as _;
use uuid::Uuid;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::functions::parser::required_parameter;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

fn parse_length(value: &str, usage: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        Error::InvalidFunctionUsage(format!("Invalid length '{value}' - usage: {usage}"))
    })
}

fn parse_flag(value: Option<&String>, default: bool) -> bool {
    value.map_or(default, |flag| flag.trim().eq_ignore_ascii_case("true"))
}

/// `randomNumber(length[, padding])`.
///
/// With padding (the default) a leading zero is replaced by a non zero digit
/// so the result keeps its length; without padding leading zeros are dropped.
pub fn random_number(parameters: &[String], _context: &TestContext) -> Result<String> {
    const USAGE: &str = "randomNumber(length[, padding])";
    let length = parse_length(required_parameter(parameters, 0, USAGE)?, USAGE)?;
    if length == 0 {
        return Err(Error::InvalidFunctionUsage(
            "Random number length must be greater than zero".to_owned(),
        ));
    }
    let padding = parse_flag(parameters.get(1), true);

    let mut rng = rand::rng();
    let mut digits: String = (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10_u8)))
        .collect();

    if padding {
        if digits.starts_with('0') {
            let replacement = char::from(b'0' + rng.random_range(1..10_u8));
            digits.replace_range(0..1, &replacement.to_string());
        }
    } else {
        let trimmed = digits.trim_start_matches('0');
        digits = if trimmed.is_empty() {
            "0".to_owned()
        } else {
            trimmed.to_owned()
        };
    }
    Ok(digits)
}

/// `randomString(length[, UPPERCASE|LOWERCASE|MIXED][, includeNumbers])`.
pub fn random_string(parameters: &[String], _context: &TestContext) -> Result<String> {
    const USAGE: &str = "randomString(length[, mode][, includeNumbers])";
    let length = parse_length(required_parameter(parameters, 0, USAGE)?, USAGE)?;
    let mode = parameters.get(1).map_or("MIXED", |mode| mode.trim());
    let include_numbers = parse_flag(parameters.get(2), false);

    let mut alphabet: Vec<u8> = match mode.to_ascii_uppercase().as_str() {
        "UPPERCASE" => UPPERCASE.to_vec(),
        "LOWERCASE" => LOWERCASE.to_vec(),
        "MIXED" => [UPPERCASE, LOWERCASE].concat(),
        other => {
            return Err(Error::InvalidFunctionUsage(format!(
                "Unknown random string mode '{other}' - usage: {USAGE}"
            )));
        }
    };
    if include_numbers {
        alphabet.extend_from_slice(DIGITS);
    }

    let mut rng = rand::rng();
    Ok((0..length)
        .filter_map(|_| alphabet.choose(&mut rng).copied().map(char::from))
        .collect())
}

pub fn random_uuid(_parameters: &[String], _context: &TestContext) -> Result<String> {
    Ok(Uuid::new_v4().to_string())
}

pub fn random_enum_value(parameters: &[String], _context: &TestContext) -> Result<String> {
    parameters
        .choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| {
            Error::InvalidFunctionUsage(
                "Missing function parameters - usage: randomEnumValue(value, ...)".to_owned(),
            )
        })
}
