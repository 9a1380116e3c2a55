use std::borrow::Cow;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::functions::parser::required_parameter;

pub fn concat(parameters: &[String], _context: &TestContext) -> Result<String> {
    Ok(parameters.concat())
}

/// `substring(text, begin[, end])` with character offsets.
pub fn substring(parameters: &[String], _context: &TestContext) -> Result<String> {
    const USAGE: &str = "substring(text, beginIndex[, endIndex])";
    let text = required_parameter(parameters, 0, USAGE)?;
    let begin = parse_index(required_parameter(parameters, 1, USAGE)?, USAGE)?;
    let length = text.chars().count();
    let end = match parameters.get(2) {
        Some(end) => parse_index(end, USAGE)?,
        None => length,
    };

    if begin > end || end > length {
        return Err(Error::InvalidFunctionUsage(format!(
            "Substring range {begin}..{end} out of bounds for '{text}'"
        )));
    }
    Ok(text.chars().skip(begin).take(end - begin).collect())
}

fn parse_index(value: &str, usage: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        Error::InvalidFunctionUsage(format!("Invalid index '{value}' - usage: {usage}"))
    })
}

pub fn string_length(parameters: &[String], _context: &TestContext) -> Result<String> {
    let text = required_parameter(parameters, 0, "stringLength(text)")?;
    Ok(text.chars().count().to_string())
}

/// `translate(text, regex, replacement)` replaces every match.
pub fn translate(parameters: &[String], _context: &TestContext) -> Result<String> {
    const USAGE: &str = "translate(text, regex, replacement)";
    let text = required_parameter(parameters, 0, USAGE)?;
    let pattern = required_parameter(parameters, 1, USAGE)?;
    let replacement = required_parameter(parameters, 2, USAGE)?;

    let regex = Regex::new(pattern).map_err(|error| {
        Error::InvalidFunctionUsage(format!("Invalid regular expression '{pattern}': {error}"))
    })?;
    Ok(regex.replace_all(text, replacement).into_owned())
}

pub fn upper_case(parameters: &[String], _context: &TestContext) -> Result<String> {
    Ok(required_parameter(parameters, 0, "upperCase(text)")?.to_uppercase())
}

pub fn lower_case(parameters: &[String], _context: &TestContext) -> Result<String> {
    Ok(required_parameter(parameters, 0, "lowerCase(text)")?.to_lowercase())
}

pub fn encode_base64(parameters: &[String], _context: &TestContext) -> Result<String> {
    let text = required_parameter(parameters, 0, "encodeBase64(text)")?;
    Ok(STANDARD.encode(text))
}

pub fn decode_base64(parameters: &[String], _context: &TestContext) -> Result<String> {
    let encoded = required_parameter(parameters, 0, "decodeBase64(text)")?;
    let bytes = STANDARD.decode(encoded.trim()).map_err(|error| {
        Error::InvalidFunctionUsage(format!("Invalid base64 value '{encoded}': {error}"))
    })?;
    String::from_utf8(bytes).map_err(|error| {
        Error::InvalidFunctionUsage(format!("Decoded base64 value is not UTF-8: {error}"))
    })
}

/// Percent encoding with spaces written as `+`.
pub fn url_encode(parameters: &[String], _context: &TestContext) -> Result<String> {
    let text = required_parameter(parameters, 0, "urlEncode(text)")?;
    Ok(urlencoding::encode(text).replace("%20", "+"))
}

/// Reverses [`url_encode`]. Malformed escapes are kept as written.
pub fn url_decode(parameters: &[String], _context: &TestContext) -> Result<String> {
    let text = required_parameter(parameters, 0, "urlDecode(text)")?;
    urlencoding::decode(&text.replace('+', " "))
        .map(Cow::into_owned)
        .map_err(|error| {
            Error::InvalidFunctionUsage(format!("Invalid url encoded value '{text}': {error}"))
        })
}

pub fn escape_xml(parameters: &[String], _context: &TestContext) -> Result<String> {
    let text = required_parameter(parameters, 0, "escapeXml(text)")?;
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    Ok(escaped)
}

pub fn cdata_section(parameters: &[String], _context: &TestContext) -> Result<String> {
    let text = required_parameter(parameters, 0, "cdataSection(text)")?;
    Ok(format!("<![CDATA[{text}]]>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(
        function: fn(&[String], &TestContext) -> Result<String>,
        parameters: &[&str],
    ) -> Result<String> {
        let parameters: Vec<String> = parameters.iter().map(|&value| value.to_owned()).collect();
        function(&parameters, &TestContext::default())
    }

    #[test]
    fn test_concat_and_case() {
        assert_eq!(call(concat, &["Hello", " ", "Citrus"]).unwrap(), "Hello Citrus");
        assert_eq!(call(concat, &[]).unwrap(), "");
        assert_eq!(call(upper_case, &["abc"]).unwrap(), "ABC");
        assert_eq!(call(lower_case, &["AbC"]).unwrap(), "abc");
        assert!(matches!(
            call(upper_case, &[]),
            Err(Error::InvalidFunctionUsage(_))
        ));
    }

    #[test]
    fn test_substring() {
        assert_eq!(call(substring, &["Hello Citrus", "6"]).unwrap(), "Citrus");
        assert_eq!(call(substring, &["Hello Citrus", "0", "5"]).unwrap(), "Hello");
        assert!(call(substring, &["Hello", "3", "10"]).is_err());
        assert!(call(substring, &["Hello", "x"]).is_err());
    }

    #[test]
    fn test_string_length_and_translate() {
        assert_eq!(call(string_length, &["Grüße"]).unwrap(), "5");
        assert_eq!(
            call(translate, &["Hello World", "o", "0"]).unwrap(),
            "Hell0 W0rld"
        );
        assert!(call(translate, &["text", "(", "x"]).is_err());
    }

    #[test]
    fn test_base64() {
        assert_eq!(call(encode_base64, &["foo"]).unwrap(), "Zm9v");
        assert_eq!(call(decode_base64, &["Zm9v"]).unwrap(), "foo");
        assert!(call(decode_base64, &["not base64!"]).is_err());
    }

    #[test]
    fn test_url_encoding() {
        assert_eq!(
            call(url_encode, &["a b&c=d/ü"]).unwrap(),
            "a+b%26c%3Dd%2F%C3%BC"
        );
        assert_eq!(call(url_decode, &["a+b%26c%3Dd%2F%C3%BC"]).unwrap(), "a b&c=d/ü");
        assert_eq!(call(url_encode, &["~user"]).unwrap(), "~user");
        assert_eq!(call(url_decode, &["100%"]).unwrap(), "100%");
        assert!(call(url_decode, &["%FF%FE"]).is_err());
    }

    #[test]
    fn test_xml_helpers() {
        assert_eq!(
            call(escape_xml, &["<a href=\"x\">&</a>"]).unwrap(),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
        assert_eq!(call(cdata_section, &["<x/>"]).unwrap(), "<![CDATA[<x/>]]>");
    }
}
