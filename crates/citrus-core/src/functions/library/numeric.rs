use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::functions::parser::required_parameter;

fn parse_number(value: &str) -> Result<f64> {
    value.trim().parse().map_err(|_| {
        Error::InvalidFunctionUsage(format!("Invalid numeric parameter '{value}'"))
    })
}

fn parse_all(parameters: &[String], usage: &str) -> Result<Vec<f64>> {
    if parameters.is_empty() {
        return Err(Error::InvalidFunctionUsage(format!(
            "Missing function parameters - usage: {usage}"
        )));
    }
    parameters.iter().map(|value| parse_number(value)).collect()
}

/// Renders a number without a trailing `.0` for whole values.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub fn average(parameters: &[String], _context: &TestContext) -> Result<String> {
    let values = parse_all(parameters, "average(number, ...)")?;
    Ok(format_number(values.iter().sum::<f64>() / values.len() as f64))
}

pub fn sum(parameters: &[String], _context: &TestContext) -> Result<String> {
    let values = parse_all(parameters, "sum(number, ...)")?;
    Ok(format_number(values.iter().sum()))
}

pub fn max(parameters: &[String], _context: &TestContext) -> Result<String> {
    let values = parse_all(parameters, "max(number, ...)")?;
    Ok(format_number(values.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

pub fn min(parameters: &[String], _context: &TestContext) -> Result<String> {
    let values = parse_all(parameters, "min(number, ...)")?;
    Ok(format_number(values.into_iter().fold(f64::INFINITY, f64::min)))
}

pub fn absolute(parameters: &[String], _context: &TestContext) -> Result<String> {
    let value = parse_number(required_parameter(parameters, 0, "absolute(number)")?)?;
    Ok(format_number(value.abs()))
}

pub fn floor(parameters: &[String], _context: &TestContext) -> Result<String> {
    let value = parse_number(required_parameter(parameters, 0, "floor(number)")?)?;
    Ok(format_number(value.floor()))
}

pub fn ceiling(parameters: &[String], _context: &TestContext) -> Result<String> {
    let value = parse_number(required_parameter(parameters, 0, "ceiling(number)")?)?;
    Ok(format_number(value.ceil()))
}

/// Rounds half up, so `-2.5` becomes `-2`.
pub fn round(parameters: &[String], _context: &TestContext) -> Result<String> {
    let value = parse_number(required_parameter(parameters, 0, "round(number)")?)?;
    Ok(format_number((value + 0.5).floor()))
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
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(2.25), "2.25");
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(call(sum, &["1", "2", "3.5"]).unwrap(), "6.5");
        assert_eq!(call(average, &["1", "2"]).unwrap(), "1.5");
        assert_eq!(call(max, &["1", "-2", "7"]).unwrap(), "7");
        assert_eq!(call(min, &["1", "-2", "7"]).unwrap(), "-2");
        assert!(matches!(call(sum, &[]), Err(Error::InvalidFunctionUsage(_))));
        assert!(call(sum, &["1", "two"]).is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(call(absolute, &["-4.2"]).unwrap(), "4.2");
        assert_eq!(call(floor, &["4.7"]).unwrap(), "4");
        assert_eq!(call(ceiling, &["4.2"]).unwrap(), "5");
        assert_eq!(call(round, &["4.5"]).unwrap(), "5");
        assert_eq!(call(round, &["-2.5"]).unwrap(), "-2");
    }
}
