//! JSONPath evaluation over `serde_json` values.
//!
//! Supports the subset of JSONPath used by message validation, variable
//! extraction and message selectors: `$`, `.key`, `['key']`, `[n]`, `[a:b]`,
//! `[*]`, `.*`, `..key`, filters such as `[?(@.name == 'x')]` and the trailing
//! functions `size()`, `length()`, `keySet()`, `values()` and `toString()`.

use serde_json::{Map, Value as JsonValue, from_str};

use crate::error::{Error, Result};

/// Comparison used inside a filter segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOperator {
    Equal,
    NotEqual,
    Lower,
    LowerOrEqual,
    Greater,
    GreaterOrEqual,
}

/// `[?(@.path op value)]`, or `[?(@.path)]` for an existence check.
#[derive(Debug, Clone, PartialEq)]
struct Filter {
    path: String,
    comparison: Option<(FilterOperator, JsonValue)>,
}

/// Trailing function of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathFunction {
    Size,
    KeySet,
    Values,
    ToString,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(Vec<String>),
    Index(Vec<i64>),
    Slice(Option<i64>, Option<i64>),
    Wildcard,
    Descendant(Option<String>),
    Filter(Filter),
}

/// A parsed JSONPath expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
    function: Option<PathFunction>,
}

impl JsonPath {
    /// Parses an expression starting with `$`.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` for malformed expressions.
    pub fn parse(expression: &str) -> Result<Self> {
        Parser::new(expression).parse()
    }

    /// Whether the expression can only ever select a single value.
    pub fn is_definite(&self) -> bool {
        self.segments.iter().all(|segment| match segment {
            Segment::Child(keys) => keys.len() == 1,
            Segment::Index(indices) => indices.len() == 1,
            Segment::Slice(..) | Segment::Wildcard | Segment::Descendant(_) | Segment::Filter(_) => {
                false
            }
        })
    }

    /// Selects all values matched by this path.
    pub fn select<'json>(&self, root: &'json JsonValue) -> Vec<&'json JsonValue> {
        let mut current = vec![root];
        for segment in &self.segments {
            current = apply_segment(segment, &current);
        }
        current
    }

    /// Evaluates the path including its trailing function.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` if the trailing function does not fit
    /// the selected value.
    pub fn evaluate(&self, root: &JsonValue) -> Result<Vec<JsonValue>> {
        let selected = self.select(root);
        let Some(function) = self.function else {
            return Ok(selected.into_iter().cloned().collect());
        };

        let target = if self.is_definite() {
            match selected.first() {
                Some(value) => (*value).clone(),
                None => return Ok(Vec::new()),
            }
        } else {
            JsonValue::Array(selected.into_iter().cloned().collect())
        };

        let result = match function {
            PathFunction::Size => match &target {
                JsonValue::Array(items) => JsonValue::from(items.len()),
                JsonValue::Object(entries) => JsonValue::from(entries.len()),
                JsonValue::String(text) => JsonValue::from(text.chars().count()),
                JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => {
                    return Err(Error::InvalidExpression(
                        "Function size() requires an array, object or string".to_owned(),
                    ));
                }
            },
            PathFunction::KeySet => match &target {
                JsonValue::Object(entries) => {
                    JsonValue::Array(entries.keys().cloned().map(JsonValue::String).collect())
                }
                _ => {
                    return Err(Error::InvalidExpression(
                        "Function keySet() requires an object".to_owned(),
                    ));
                }
            },
            PathFunction::Values => match &target {
                JsonValue::Object(entries) => JsonValue::Array(entries.values().cloned().collect()),
                JsonValue::Array(items) => JsonValue::Array(items.clone()),
                _ => {
                    return Err(Error::InvalidExpression(
                        "Function values() requires an object or array".to_owned(),
                    ));
                }
            },
            PathFunction::ToString => JsonValue::String(render(&target)),
        };
        Ok(vec![result])
    }
}

/// Whether an expression is meant as JSONPath.
pub fn is_json_path_expression(expression: &str) -> bool {
    expression.trim_start().starts_with('$')
}

/// Evaluates `expression` against `root`.
///
/// # Errors
/// Returns an error for malformed expressions.
pub fn evaluate(root: &JsonValue, expression: &str) -> Result<Vec<JsonValue>> {
    JsonPath::parse(expression)?.evaluate(root)
}

/// Evaluates `expression` and renders the result the way validators compare it.
///
/// A definite path yields the single value (strings unquoted); an indefinite
/// path yields a JSON array of all matches.
///
/// # Errors
/// Returns `Error::Validation` if a definite path matches nothing.
pub fn evaluate_as_string(root: &JsonValue, expression: &str) -> Result<String> {
    let path = JsonPath::parse(expression)?;
    let results = path.evaluate(root)?;
    if path.is_definite() || path.function.is_some() {
        results.first().map(render).ok_or_else(|| {
            Error::validation(format!(
                "No result for JSONPath expression: {expression}"
            ))
        })
    } else {
        Ok(JsonValue::Array(results).to_string())
    }
}

/// Parses `payload` as JSON and evaluates `expression` on it.
///
/// # Errors
/// Returns an error if the payload is not JSON or the path matches nothing.
pub fn evaluate_payload(payload: &str, expression: &str) -> Result<String> {
    let root: JsonValue = from_str(payload).map_err(|error| {
        Error::Runtime(format!(
            "Failed to parse JSON payload for JSONPath '{expression}': {error}"
        ))
    })?;
    evaluate_as_string(&root, expression)
}

/// Renders a value as text: strings without quotes, null as `null`, the rest as JSON.
pub fn render(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn apply_segment<'json>(segment: &Segment, current: &[&'json JsonValue]) -> Vec<&'json JsonValue> {
    let mut next = Vec::new();
    for value in current.iter().copied() {
        match segment {
            Segment::Child(keys) => {
                if let JsonValue::Object(entries) = value {
                    next.extend(keys.iter().filter_map(|key| entries.get(key)));
                }
            }
            Segment::Index(indices) => {
                if let JsonValue::Array(items) = value {
                    for index in indices {
                        if let Some(position) = resolve_index(*index, items.len())
                            && let Some(item) = items.get(position)
                        {
                            next.push(item);
                        }
                    }
                }
            }
            Segment::Slice(start, end) => {
                if let JsonValue::Array(items) = value {
                    let len = items.len();
                    let from = start.map_or(0, |start| clamp_index(start, len));
                    let to = end.map_or(len, |end| clamp_index(end, len));
                    if from < to {
                        next.extend(items[from..to].iter());
                    }
                }
            }
            Segment::Wildcard => match value {
                JsonValue::Object(entries) => next.extend(entries.values()),
                JsonValue::Array(items) => next.extend(items.iter()),
                _ => {}
            },
            Segment::Descendant(key) => collect_descendants(value, key.as_deref(), &mut next),
            Segment::Filter(filter) => {
                let candidates: Vec<&JsonValue> = match value {
                    JsonValue::Array(items) => items.iter().collect(),
                    JsonValue::Object(entries) => entries.values().collect(),
                    _ => Vec::new(),
                };
                next.extend(candidates.into_iter().filter(|item| filter_matches(filter, item)));
            }
        }
    }
    next
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        Some(index as usize)
    } else {
        len.checked_sub(index.unsigned_abs() as usize)
    }
}

fn clamp_index(index: i64, len: usize) -> usize {
    if index >= 0 {
        (index as usize).min(len)
    } else {
        len.saturating_sub(index.unsigned_abs() as usize)
    }
}

fn collect_descendants<'json>(
    value: &'json JsonValue,
    key: Option<&str>,
    out: &mut Vec<&'json JsonValue>,
) {
    match value {
        JsonValue::Object(entries) => {
            for (name, child) in entries {
                if key.is_none_or(|wanted| wanted == name) {
                    out.push(child);
                }
                collect_descendants(child, key, out);
            }
        }
        JsonValue::Array(items) => {
            for child in items {
                if key.is_none() {
                    out.push(child);
                }
                collect_descendants(child, key, out);
            }
        }
        _ => {}
    }
}

fn filter_matches(filter: &Filter, item: &JsonValue) -> bool {
    let Ok(path) = JsonPath::parse(&format!("${}", filter.path)) else {
        return false;
    };
    let selected = path.select(item);
    let Some(actual) = selected.first() else {
        return false;
    };
    let Some((operator, expected)) = &filter.comparison else {
        return true;
    };

    match operator {
        FilterOperator::Equal => loosely_equal(actual, expected),
        FilterOperator::NotEqual => !loosely_equal(actual, expected),
        FilterOperator::Lower
        | FilterOperator::LowerOrEqual
        | FilterOperator::Greater
        | FilterOperator::GreaterOrEqual => {
            let (Some(left), Some(right)) = (as_number(actual), as_number(expected)) else {
                return false;
            };
            match operator {
                FilterOperator::Lower => left < right,
                FilterOperator::LowerOrEqual => left <= right,
                FilterOperator::Greater => left > right,
                _ => left >= right,
            }
        }
    }
}

fn loosely_equal(actual: &JsonValue, expected: &JsonValue) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(left), Some(right)) if actual.is_number() && expected.is_number() => {
            (left - right).abs() < f64::EPSILON
        }
        _ => actual == expected,
    }
}

fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// Hand written recursive parser for the supported subset.
struct Parser<'expr> {
    expression: &'expr str,
    chars: Vec<char>,
    position: usize,
}

impl<'expr> Parser<'expr> {
    fn new(expression: &'expr str) -> Self {
        Self {
            expression,
            chars: expression.trim().chars().collect(),
            position: 0,
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::InvalidExpression(format!(
            "Invalid JSONPath expression '{}': {reason}",
            self.expression
        ))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn parse(mut self) -> Result<JsonPath> {
        if self.peek() != Some('$') {
            return Err(self.error("must start with '$'"));
        }
        self.position += 1;

        let mut segments = Vec::new();
        let mut function = None;
        while let Some(current) = self.peek() {
            if function.is_some() {
                return Err(self.error("function call must be the last segment"));
            }
            match current {
                '.' if self.peek_at(1) == Some('.') => {
                    self.position += 2;
                    if self.peek() == Some('*') {
                        self.position += 1;
                        segments.push(Segment::Descendant(None));
                    } else {
                        let name = self.read_name();
                        if name.is_empty() {
                            return Err(self.error("expected a name after '..'"));
                        }
                        segments.push(Segment::Descendant(Some(name)));
                    }
                }
                '.' => {
                    self.position += 1;
                    if self.peek() == Some('*') {
                        self.position += 1;
                        segments.push(Segment::Wildcard);
                        continue;
                    }
                    let name = self.read_name();
                    if name.is_empty() {
                        return Err(self.error("expected a name after '.'"));
                    }
                    if self.peek() == Some('(') && self.peek_at(1) == Some(')') {
                        self.position += 2;
                        function = Some(Self::function_for(&name).ok_or_else(|| {
                            self.error(&format!("unknown function '{name}()'"))
                        })?);
                    } else {
                        segments.push(Segment::Child(vec![name]));
                    }
                }
                '[' => {
                    self.position += 1;
                    segments.push(self.parse_bracket()?);
                }
                _ => return Err(self.error(&format!("unexpected character '{current}'"))),
            }
        }

        Ok(JsonPath { segments, function })
    }

    fn function_for(name: &str) -> Option<PathFunction> {
        match name {
            "size" | "length" => Some(PathFunction::Size),
            "keySet" => Some(PathFunction::KeySet),
            "values" => Some(PathFunction::Values),
            "toString" => Some(PathFunction::ToString),
            _ => None,
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(current) = self.peek() {
            if current.is_alphanumeric() || matches!(current, '_' | '-') {
                name.push(current);
                self.position += 1;
            } else {
                break;
            }
        }
        name
    }

    fn read_until_bracket_end(&mut self) -> Result<String> {
        let mut content = String::new();
        let mut quote: Option<char> = None;
        let mut depth = 0_usize;
        while let Some(current) = self.peek() {
            self.position += 1;
            match (current, quote) {
                ('\'' | '"', None) => quote = Some(current),
                (_, Some(open)) if current == open => quote = None,
                ('(', None) => depth += 1,
                (')', None) => depth = depth.saturating_sub(1),
                (']', None) if depth == 0 => return Ok(content),
                _ => {}
            }
            content.push(current);
        }
        Err(self.error("missing closing ']'"))
    }

    fn parse_bracket(&mut self) -> Result<Segment> {
        let content = self.read_until_bracket_end()?;
        let content = content.trim();

        if content == "*" {
            return Ok(Segment::Wildcard);
        }
        if let Some(filter) = content.strip_prefix('?') {
            return Ok(Segment::Filter(self.parse_filter(filter.trim())?));
        }
        if content.starts_with('\'') || content.starts_with('"') {
            let keys = content
                .split(',')
                .map(|key| key.trim().trim_matches(|quote| quote == '\'' || quote == '"'))
                .map(str::to_owned)
                .collect();
            return Ok(Segment::Child(keys));
        }
        if let Some((start, end)) = content.split_once(':') {
            let start = Self::parse_optional_index(start).map_err(|()| self.error("bad slice start"))?;
            let end = Self::parse_optional_index(end).map_err(|()| self.error("bad slice end"))?;
            return Ok(Segment::Slice(start, end));
        }

        let indices = content
            .split(',')
            .map(|index| index.trim().parse::<i64>())
            .collect::<core::result::Result<Vec<_>, _>>()
            .map_err(|_| self.error(&format!("invalid index '{content}'")))?;
        Ok(Segment::Index(indices))
    }

    fn parse_optional_index(raw: &str) -> core::result::Result<Option<i64>, ()> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            trimmed.parse().map(Some).map_err(|_| ())
        }
    }

    fn parse_filter(&self, filter: &str) -> Result<Filter> {
        const OPERATORS: [(&str, FilterOperator); 6] = [
            ("==", FilterOperator::Equal),
            ("!=", FilterOperator::NotEqual),
            ("<=", FilterOperator::LowerOrEqual),
            (">=", FilterOperator::GreaterOrEqual),
            ("<", FilterOperator::Lower),
            (">", FilterOperator::Greater),
        ];

        let inner = filter
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| self.error("filter must be wrapped in '?(...)'"))?
            .trim();
        let relative = inner
            .strip_prefix('@')
            .ok_or_else(|| self.error("filter must start with '@'"))?;

        for (token, operator) in OPERATORS {
            if let Some((path, value)) = relative.split_once(token) {
                return Ok(Filter {
                    path: path.trim().to_owned(),
                    comparison: Some((operator, Self::parse_literal(value.trim()))),
                });
            }
        }

        Ok(Filter {
            path: relative.trim().to_owned(),
            comparison: None,
        })
    }

    fn parse_literal(raw: &str) -> JsonValue {
        if raw.len() >= 2
            && ((raw.starts_with('\'') && raw.ends_with('\''))
                || (raw.starts_with('"') && raw.ends_with('"')))
        {
            return JsonValue::String(raw[1..raw.len() - 1].to_owned());
        }
        from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_owned()))
    }
}

/// Wraps a top level array so object based comparison can walk it.
pub fn wrap_array(value: JsonValue) -> JsonValue {
    if value.is_array() {
        let mut wrapper = Map::new();
        wrapper.insert("array".to_owned(), value);
        JsonValue::Object(wrapper)
    } else {
        value
    }
}
