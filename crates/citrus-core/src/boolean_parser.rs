//! Evaluation of the small boolean language used by iterate, repeat and
//! conditional containers, e.g. `(i lt= 5) and (flag = true)` once `i` and
//! `flag` have been substituted.
//!
//! Comparison operators bind tighter than `and`, which binds tighter than `or`.

use tracing::debug;

use crate::error::{Error, Result};

const OPERATORS: &[&str] = &["lt", "lt=", "gt", "gt=", "<", "<=", ">", ">=", "="];
const LOGICAL_OPERATORS: &[&str] = &["and", "or"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Number(i64),
    Boolean(bool),
    Operator(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Number(i64),
    Boolean(bool),
}

impl Operand {
    fn as_bool(self, expression: &str) -> Result<bool> {
        match self {
            Self::Boolean(value) => Ok(value),
            Self::Number(0) => Ok(false),
            Self::Number(1) => Ok(true),
            Self::Number(other) => Err(Error::InvalidExpression(format!(
                "Expected boolean operand but found '{other}' in expression '{expression}'"
            ))),
        }
    }

    fn as_number(self, expression: &str) -> Result<i64> {
        match self {
            Self::Number(value) => Ok(value),
            Self::Boolean(value) => Err(Error::InvalidExpression(format!(
                "Expected numeric operand but found '{value}' in expression '{expression}'"
            ))),
        }
    }
}

/// Evaluates a boolean expression.
///
/// # Errors
/// Returns `Error::InvalidExpression` for unknown operators, type mismatches or
/// incomplete expressions.
pub fn evaluate(expression: &str) -> Result<bool> {
    let tokens = tokenize(expression)?;
    let mut parser = ExpressionParser {
        expression,
        tokens: &tokens,
        position: 0,
    };

    let value = parser.parse_or()?;
    if parser.position != tokens.len() {
        return Err(incomplete(expression));
    }
    let result = value.as_bool(expression)?;
    debug!("Boolean expression {expression} evaluates to {result}");
    Ok(result)
}

fn incomplete(expression: &str) -> Error {
    Error::InvalidExpression(format!(
        "Unable to parse boolean expression '{expression}'. Maybe expression is incomplete!"
    ))
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while let Some(&current) = chars.get(index) {
        match current {
            '(' => {
                tokens.push(Token::Open);
                index += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                index += 1;
            }
            ' ' => index += 1,
            digit if digit.is_ascii_digit() => {
                let start = index;
                while chars.get(index).is_some_and(char::is_ascii_digit) {
                    index += 1;
                }
                let literal: String = chars[start..index].iter().collect();
                let number = literal.parse().map_err(|_| {
                    Error::InvalidExpression(format!(
                        "Number '{literal}' out of range in expression '{expression}'"
                    ))
                })?;
                tokens.push(Token::Number(number));
            }
            _ => {
                let start = index;
                while chars
                    .get(index)
                    .is_some_and(|next| !next.is_ascii_digit() && !matches!(next, ' ' | '(' | ')'))
                {
                    index += 1;
                }
                let word: String = chars[start..index].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    operator
                        if OPERATORS.contains(&operator)
                            || LOGICAL_OPERATORS.contains(&operator) =>
                    {
                        Token::Operator(operator.to_owned())
                    }
                    _ => {
                        return Err(Error::InvalidExpression(format!(
                            "Unknown operator '{word}'"
                        )));
                    }
                });
            }
        }
    }

    Ok(tokens)
}

struct ExpressionParser<'src> {
    expression: &'src str,
    tokens: &'src [Token],
    position: usize,
}

impl ExpressionParser<'_> {
    fn next_operator_is(&self, candidates: &[&str]) -> Option<String> {
        match self.tokens.get(self.position) {
            Some(Token::Operator(operator)) if candidates.contains(&operator.as_str()) => {
                Some(operator.clone())
            }
            _ => None,
        }
    }

    fn parse_or(&mut self) -> Result<Operand> {
        let mut left = self.parse_and()?;
        while self.next_operator_is(&["or"]).is_some() {
            self.position += 1;
            let right = self.parse_and()?;
            let value = left.as_bool(self.expression)? || right.as_bool(self.expression)?;
            left = Operand::Boolean(value);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Operand> {
        let mut left = self.parse_comparison()?;
        while self.next_operator_is(&["and"]).is_some() {
            self.position += 1;
            let right = self.parse_comparison()?;
            let value = left.as_bool(self.expression)? && right.as_bool(self.expression)?;
            left = Operand::Boolean(value);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Operand> {
        let left = self.parse_primary()?;
        let Some(operator) = self.next_operator_is(OPERATORS) else {
            return Ok(left);
        };
        self.position += 1;
        let right = self.parse_primary()?;

        let result = if operator == "=" {
            match (left, right) {
                (Operand::Number(lhs), Operand::Number(rhs)) => lhs == rhs,
                (lhs, rhs) => lhs.as_bool(self.expression)? == rhs.as_bool(self.expression)?,
            }
        } else {
            let lhs = left.as_number(self.expression)?;
            let rhs = right.as_number(self.expression)?;
            match operator.as_str() {
                "lt" | "<" => lhs < rhs,
                "lt=" | "<=" => lhs <= rhs,
                "gt" | ">" => lhs > rhs,
                _ => lhs >= rhs,
            }
        };
        Ok(Operand::Boolean(result))
    }

    fn parse_primary(&mut self) -> Result<Operand> {
        let tokens = self.tokens;
        let token = tokens
            .get(self.position)
            .ok_or_else(|| incomplete(self.expression))?;
        self.position += 1;
        match token {
            Token::Number(value) => Ok(Operand::Number(*value)),
            Token::Boolean(value) => Ok(Operand::Boolean(*value)),
            Token::Open => {
                let inner = self.parse_or()?;
                match self.tokens.get(self.position) {
                    Some(Token::Close) => {
                        self.position += 1;
                        Ok(inner)
                    }
                    _ => Err(incomplete(self.expression)),
                }
            }
            Token::Close | Token::Operator(_) => Err(incomplete(self.expression)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparisons() {
        assert!(evaluate("1 lt 2").unwrap());
        assert!(evaluate("2 lt= 2").unwrap());
        assert!(!evaluate("3 < 2").unwrap());
        assert!(evaluate("3 gt 2").unwrap());
        assert!(evaluate("3 >= 3").unwrap());
        assert!(evaluate("5 = 5").unwrap());
        assert!(!evaluate("5 = 4").unwrap());
        assert!(evaluate("3<=4").unwrap());
    }

    #[test]
    fn test_boolean_values() {
        assert!(evaluate("true").unwrap());
        assert!(!evaluate("false").unwrap());
        assert!(evaluate("true = true").unwrap());
        assert!(!evaluate("true = false").unwrap());
    }

    #[test]
    fn test_logical_operators_and_precedence() {
        assert!(evaluate("1 lt 2 and 3 gt 2").unwrap());
        assert!(!evaluate("1 lt 2 and 3 lt 2").unwrap());
        assert!(evaluate("1 gt 2 or 3 gt 2").unwrap());
        assert!(evaluate("false and true or true").unwrap());
        assert!(!evaluate("false and (true or true)").unwrap());
        assert!(evaluate("(1 lt 2) and ((3 gt 2) or false)").unwrap());
    }

    #[test]
    fn test_unknown_operator() {
        let error = evaluate("1 foo 2").unwrap_err();
        assert_eq!(error.to_string(), "Unknown operator 'foo'");
    }

    #[test]
    fn test_incomplete_expression() {
        let error = evaluate("1 lt").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unable to parse boolean expression '1 lt'. Maybe expression is incomplete!"
        );
        assert!(evaluate("(1 lt 2").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("1 2").is_err());
    }

    #[test]
    fn test_type_mismatch() {
        assert!(evaluate("true lt 2").is_err());
        assert!(evaluate("5").is_err());
    }
}
