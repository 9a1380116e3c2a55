use tracing::debug;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::parameters::{find_closing_parenthesis, split_parameters};
use crate::variables::replace_variables_in_string;

/// Replaces every call of a registered function in `text` with its result.
///
/// Calls are located by library prefix; the argument list ends at the
/// balancing `)`, where parentheses inside single quotes are ignored. With
/// `enable_quoting` results are wrapped in single quotes.
///
/// # Errors
/// Returns errors raised while resolving a call.
pub fn replace_functions_in_string(
    text: &str,
    context: &TestContext,
    enable_quoting: bool,
) -> Result<String> {
    let mut result = text.to_owned();

    for library in context.function_registry().libraries() {
        let prefix = library.prefix();
        let mut search_from = 0;

        while let Some(offset) = result[search_from..].find(prefix) {
            let start = search_from + offset;
            let name_start = start + prefix.len();
            let name_length = result[name_start..]
                .find(|character: char| !(character.is_ascii_alphanumeric() || character == '_'))
                .unwrap_or(result.len() - name_start);
            let open = name_start + name_length;

            if name_length == 0 || !result[open..].starts_with('(') {
                search_from = name_start;
                continue;
            }
            let Some(close) = find_closing_parenthesis(&result, open) else {
                return Err(Error::InvalidFunctionUsage(format!(
                    "Missing closing parenthesis in function call '{}'",
                    &result[start..]
                )));
            };

            let value = resolve_function(&result[start..=close], context)?;
            let replacement = if enable_quoting {
                format!("'{value}'")
            } else {
                value
            };
            result.replace_range(start..=close, &replacement);
            search_from = start + replacement.len();
        }
    }

    Ok(result)
}

/// Resolves a single call such as `citrus:concat('a', ${b})`.
///
/// # Errors
/// Returns `Error::InvalidFunctionUsage` for malformed calls and lookup
/// errors for unknown libraries or functions.
pub fn resolve_function(expression: &str, context: &TestContext) -> Result<String> {
    let expression = expression.trim();
    let open = expression.find('(').ok_or_else(|| {
        Error::InvalidFunctionUsage(format!(
            "Missing function parameter list in '{expression}'"
        ))
    })?;
    if !expression.ends_with(')') {
        return Err(Error::InvalidFunctionUsage(format!(
            "Missing closing parenthesis in function call '{expression}'"
        )));
    }
    let colon = expression[..open].find(':').ok_or_else(|| {
        Error::InvalidFunctionUsage(format!(
            "Missing function library prefix in '{expression}'"
        ))
    })?;

    let prefix = &expression[..=colon];
    let name = &expression[colon + 1..open];
    let body = &expression[open + 1..expression.len() - 1];

    let library = context.function_registry().library_for_prefix(prefix)?;
    let function = library.get_function(name)?;

    let body = replace_variables_in_string(body, context, false)?;
    let body = replace_functions_in_string(&body, context, false)?;
    let parameters = split_parameters(&body)?;

    let value = function.execute(&parameters, context)?;
    debug!("Function {prefix}{name} resolved to '{value}'");
    Ok(value)
}

/// Returns the parameter at `index`, or an error naming the expected usage.
///
/// # Errors
/// Returns `Error::InvalidFunctionUsage` if the parameter is missing.
pub fn required_parameter<'param>(
    parameters: &'param [String],
    index: usize,
    usage: &str,
) -> Result<&'param str> {
    parameters.get(index).map(String::as_str).ok_or_else(|| {
        Error::InvalidFunctionUsage(format!(
            "Missing function parameters - usage: {usage}"
        ))
    })
}
