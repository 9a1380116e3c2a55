//! Splitting of parenthesized argument lists.
//!
//! Function calls and validation matcher expressions share the same argument
//! grammar: comma separated values, where commas inside single quotes or nested
//! brackets do not split, and surrounding single quotes are removed.

use crate::error::{Error, Result};

/// Splits an argument body such as `'a, b', 3, citrus:sum(1, 2)` into its values.
///
/// # Errors
/// Returns `Error::InvalidExpression` when a quote is never closed.
pub fn split_parameters(body: &str) -> Result<Vec<String>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parameters = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut depth = 0_usize;

    for character in body.chars() {
        match character {
            '\'' => {
                in_quote = !in_quote;
                current.push(character);
            }
            '(' | '[' | '{' if !in_quote => {
                depth += 1;
                current.push(character);
            }
            ')' | ']' | '}' if !in_quote => {
                depth = depth.saturating_sub(1);
                current.push(character);
            }
            ',' if !in_quote && depth == 0 => {
                parameters.push(unquote(&current));
                current.clear();
            }
            _ => current.push(character),
        }
    }

    if in_quote {
        return Err(Error::InvalidExpression(format!(
            "Missing closing quote in parameter list '{body}'"
        )));
    }

    parameters.push(unquote(&current));
    Ok(parameters)
}

/// Trims a raw parameter and removes one pair of surrounding single quotes.
fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Returns the index of the `)` that closes the `(` at `open`, skipping quoted text.
pub fn find_closing_parenthesis(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_quote = false;
    for (index, character) in text.char_indices().skip_while(|(index, _)| *index < open) {
        match character {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_and_quoted() {
        let params = split_parameters("'Hello', ' ', 'World'").unwrap();
        assert_eq!(params, vec!["Hello", " ", "World"]);

        let params = split_parameters("5, 10").unwrap();
        assert_eq!(params, vec!["5", "10"]);
    }

    #[test]
    fn test_split_respects_quotes_and_brackets() {
        let params = split_parameters("'a, b', '[0-9]{1,3}', foo(1, 2)").unwrap();
        assert_eq!(params, vec!["a, b", "[0-9]{1,3}", "foo(1, 2)"]);

        let params = split_parameters("[0-9]{1,3}").unwrap();
        assert_eq!(params, vec!["[0-9]{1,3}"]);
    }

    #[test]
    fn test_split_empty_body() {
        assert!(split_parameters("").unwrap().is_empty());
        assert!(split_parameters("   ").unwrap().is_empty());
        assert_eq!(split_parameters("''").unwrap(), vec![String::new()]);
    }

    #[test]
    fn test_unterminated_quote() {
        let error = split_parameters("'abc, def").unwrap_err();
        assert!(matches!(error, Error::InvalidExpression(_)));
    }

    #[test]
    fn test_find_closing_parenthesis() {
        let text = "citrus:concat('a)', citrus:upperCase(b)) tail";
        let open = text.find('(').unwrap();
        let close = find_closing_parenthesis(text, open).unwrap();
        assert_eq!(&text[..=close], "citrus:concat('a)', citrus:upperCase(b))");
        assert_eq!(find_closing_parenthesis("foo(bar", 3), None);
    }
}
