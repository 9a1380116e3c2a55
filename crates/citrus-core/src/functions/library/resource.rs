use std::env as std_env;
use std::fs;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::functions::parser::required_parameter;
use crate::json_path::evaluate_payload;
use crate::variables::cut_off_single_quotes;

/// `env(name[, default])` reads an environment variable.
pub fn env(parameters: &[String], _context: &TestContext) -> Result<String> {
    let name = required_parameter(parameters, 0, "env(name[, default])")?;
    match std_env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => parameters.get(1).cloned().ok_or_else(|| {
            Error::InvalidFunctionUsage(format!(
                "Environment variable '{name}' is not set and no default was given"
            ))
        }),
    }
}

/// `readFile(path[, base64])`. Text content has its dynamic content resolved.
pub fn read_file(parameters: &[String], context: &TestContext) -> Result<String> {
    let path = required_parameter(parameters, 0, "readFile(path[, base64])")?;
    let base64 = parameters
        .get(1)
        .is_some_and(|flag| flag.trim().eq_ignore_ascii_case("true"));

    let bytes = fs::read(path).map_err(|error| {
        Error::InvalidFunctionUsage(format!("Failed to read file '{path}': {error}"))
    })?;
    if base64 {
        return Ok(STANDARD.encode(bytes));
    }

    let text = String::from_utf8(bytes).map_err(|error| {
        Error::InvalidFunctionUsage(format!("File '{path}' is not UTF-8 text: {error}"))
    })?;
    context.replace_dynamic_content(&text)
}

/// `jsonPath(json, expression)`.
pub fn json_path(parameters: &[String], _context: &TestContext) -> Result<String> {
    const USAGE: &str = "jsonPath(json, expression)";
    let json = required_parameter(parameters, 0, USAGE)?;
    let expression = required_parameter(parameters, 1, USAGE)?;
    evaluate_payload(json, expression)
}

/// `message(name)`, `message(name.body())` or `message(name.header('key'))`
/// reads a stored message.
pub fn message(parameters: &[String], context: &TestContext) -> Result<String> {
    let expression = required_parameter(parameters, 0, "message(name[.body()|.header(name)])")?;

    let (name, header) = if let Some(name) = expression.strip_suffix(".body()") {
        (name, None)
    } else if let Some((name, rest)) = expression.split_once(".header(") {
        let header = rest.strip_suffix(')').ok_or_else(|| {
            Error::InvalidFunctionUsage(format!("Invalid message expression '{expression}'"))
        })?;
        (name, Some(cut_off_single_quotes(header.trim())))
    } else {
        (expression, None)
    };

    let stored = context.message_store().get(name).ok_or_else(|| {
        Error::runtime(format!("Unable to find message '{name}' in message store"))
    })?;

    match header {
        Some(header) => stored
            .header(header)
            .map(|value| value.into_owned())
            .ok_or_else(|| {
                Error::runtime(format!("Message '{name}' has no header '{header}'"))
            }),
        None => Ok(stored.payload_text().into_owned()),
    }
}
