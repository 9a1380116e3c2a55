//! The `citrus:` function library.

/// Date and time functions.
mod date;
/// Arithmetic functions.
mod numeric;
/// Random value generators.
mod random;
/// Functions reading environment, files, JSON and stored messages.
mod resource;
/// String manipulation and encoding functions.
mod string;

use super::FunctionLibrary;
use crate::settings::DEFAULT_FUNCTION_PREFIX;

/// Name of the built-in function library.
pub const CITRUS_FUNCTION_LIBRARY: &str = "citrusFunctionLibrary";

/// Builds the built-in library registered under the `citrus:` prefix.
pub fn citrus_function_library() -> FunctionLibrary {
    FunctionLibrary::new(CITRUS_FUNCTION_LIBRARY, DEFAULT_FUNCTION_PREFIX)
        .with_function("concat", string::concat)
        .with_function("substring", string::substring)
        .with_function("stringLength", string::string_length)
        .with_function("translate", string::translate)
        .with_function("upperCase", string::upper_case)
        .with_function("lowerCase", string::lower_case)
        .with_function("encodeBase64", string::encode_base64)
        .with_function("decodeBase64", string::decode_base64)
        .with_function("urlEncode", string::url_encode)
        .with_function("urlDecode", string::url_decode)
        .with_function("escapeXml", string::escape_xml)
        .with_function("cdataSection", string::cdata_section)
        .with_function("average", numeric::average)
        .with_function("sum", numeric::sum)
        .with_function("max", numeric::max)
        .with_function("min", numeric::min)
        .with_function("absolute", numeric::absolute)
        .with_function("floor", numeric::floor)
        .with_function("ceiling", numeric::ceiling)
        .with_function("round", numeric::round)
        .with_function("randomNumber", random::random_number)
        .with_function("randomString", random::random_string)
        .with_function("randomUUID", random::random_uuid)
        .with_function("randomEnumValue", random::random_enum_value)
        .with_function("currentDate", date::current_date)
        .with_function("changeDate", date::change_date)
        .with_function("unixTimestamp", date::unix_timestamp)
        .with_function("env", resource::env)
        .with_function("readFile", resource::read_file)
        .with_function("jsonPath", resource::json_path)
        .with_function("message", resource::message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_contents() {
        let library = citrus_function_library();
        assert_eq!(library.prefix(), "citrus:");
        assert_eq!(library.name(), CITRUS_FUNCTION_LIBRARY);
        assert_eq!(library.function_names().count(), 31);
        assert!(library.knows_function("citrus:randomUUID()"));
    }
}
