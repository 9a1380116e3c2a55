//! XPath 1.0 evaluation over `roxmltree` documents.
//!
//! Covers location paths with all axes except `namespace`, predicates,
//! unions, arithmetic, comparisons and the core function library. Names
//! may be qualified by a prefix from the namespace context or inline as
//! `{uri}name`; unprefixed names match regardless of namespace.
//!
//! Expressions used by validation and extraction may carry a result type
//! prefix (`node:`, `node-set:`, `string:`, `number:`, `integer:`,
//! `boolean:`). Expressions without `/` or `(` are read as dot notation,
//! so `order.item` selects `/order/item` or the attribute `/order/@item`.

/// Expression evaluation.
mod eval;
/// Tokenizer and recursive descent parser.
mod parser;

use indexmap::IndexMap;
use roxmltree::{Document, Node};

use crate::error::{Error, Result};

pub use eval::{XPathNode, XPathValue, format_number, round_number};

use eval::{Evaluator, Focus};
use parser::Expr;

/// How the result of a prefixed expression is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    /// Value of the first selected node.
    Node,
    /// Values of all selected nodes.
    NodeSet,
    /// XPath `string()` of the result.
    String,
    /// Result as a decimal number, `2.0`.
    Number,
    /// Result rounded to an integer.
    Integer,
    /// XPath `boolean()` of the result.
    Boolean,
}

impl ResultType {
    const PREFIXES: [(&'static str, Self); 6] = [
        ("node-set:", Self::NodeSet),
        ("node:", Self::Node),
        ("string:", Self::String),
        ("number:", Self::Number),
        ("integer:", Self::Integer),
        ("boolean:", Self::Boolean),
    ];

    /// Splits a result type prefix off `expression`.
    pub fn split(expression: &str) -> (Option<Self>, &str) {
        let trimmed = expression.trim();
        Self::PREFIXES
            .iter()
            .find_map(|(prefix, result_type)| {
                trimmed
                    .strip_prefix(prefix)
                    .map(|rest| (Some(*result_type), rest.trim()))
            })
            .unwrap_or((None, trimmed))
    }
}

/// A parsed XPath expression.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    expression: String,
    expr: Expr,
}

impl XPath {
    /// Parses an XPath expression without result type prefix.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` for malformed expressions.
    pub fn parse(expression: &str) -> Result<Self> {
        Ok(Self {
            expression: expression.to_owned(),
            expr: parser::parse(expression)?,
        })
    }

    /// Source text of the expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluates the expression with `node` as context node.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` for unknown functions, undefined
    /// namespace prefixes or operands of the wrong type.
    pub fn evaluate<'a, 'input>(
        &self,
        node: Node<'a, 'input>,
        namespaces: &IndexMap<String, String>,
    ) -> Result<XPathValue<'a, 'input>> {
        Evaluator::new(&self.expression, namespaces).evaluate(&self.expr, Focus::on(XPathNode::Node(node)))
    }

    /// Evaluates the expression and requires a node-set result.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` if the result is not a node-set.
    pub fn select_nodes<'a, 'input>(
        &self,
        node: Node<'a, 'input>,
        namespaces: &IndexMap<String, String>,
    ) -> Result<Vec<XPathNode<'a, 'input>>> {
        match self.evaluate(node, namespaces)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(Error::InvalidExpression(format!(
                "XPath expression '{}' does not select nodes but yields {}",
                self.expression,
                other.string()
            ))),
        }
    }
}

/// Whether `expression` is XPath rather than dot notation.
pub fn is_xpath_expression(expression: &str) -> bool {
    let (_, path) = ResultType::split(expression);
    path.contains('/') || path.contains('(')
}

/// Turns dot notation into XPath; XPath expressions are returned unchanged.
pub fn normalize_expression(expression: &str) -> String {
    if is_xpath_expression(expression) {
        return expression.trim().to_owned();
    }
    let segments: Vec<&str> = expression.trim().split('.').collect();
    let element_path = format!("/{}", segments.join("/"));
    match segments.split_last() {
        Some((last, parents)) if !parents.is_empty() => {
            format!("{element_path} | /{}/@{last}", parents.join("/"))
        }
        _ => element_path,
    }
}

/// Parses an XML document. Documents with a DTD are rejected.
///
/// # Errors
/// Returns `Error::Runtime` if `text` is not well formed XML.
pub fn parse_document(text: &str) -> Result<Document<'_>> {
    Document::parse(text.trim())
        .map_err(|error| Error::runtime(format!("Failed to parse XML document: {error}")))
}

/// Namespace context of `document`: every prefix declared in it, overridden
/// by the `explicit` mappings.
pub fn namespace_context(
    document: &Document<'_>,
    explicit: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    let mut namespaces = IndexMap::new();
    for element in document.root().descendants().filter(Node::is_element) {
        for namespace in element.namespaces() {
            if let Some(prefix) = namespace.name()
                && prefix != "xml"
            {
                namespaces
                    .entry(prefix.to_owned())
                    .or_insert_with(|| namespace.uri().to_owned());
            }
        }
    }
    namespaces.extend(explicit.iter().map(|(prefix, uri)| (prefix.clone(), uri.clone())));
    namespaces
}

fn no_result(expression: &str) -> Error {
    Error::validation(format!("No result for XPath expression: '{expression}'"))
}

/// Evaluates a possibly prefixed or dot notation `expression` on the
/// document root and renders the result as text. Node-sets render as the
/// comma separated values of their nodes.
///
/// # Errors
/// Returns `Error::Validation` if a node result selects nothing and
/// `Error::InvalidExpression` for malformed expressions.
pub fn evaluate_as_string(
    document: &Document<'_>,
    expression: &str,
    namespaces: &IndexMap<String, String>,
) -> Result<String> {
    Ok(evaluate_as_values(document, expression, namespaces)?.join(","))
}

/// Like [`evaluate_as_string`] but keeps the values of a `node-set:`
/// result apart. Other results yield a single value.
///
/// # Errors
/// See [`evaluate_as_string`].
pub fn evaluate_as_values(
    document: &Document<'_>,
    expression: &str,
    namespaces: &IndexMap<String, String>,
) -> Result<Vec<String>> {
    let (result_type, path) = ResultType::split(expression);
    let path = normalize_expression(path);
    let value = XPath::parse(&path)?.evaluate(document.root(), namespaces)?;

    let rendered = match (result_type, value) {
        (Some(ResultType::NodeSet), XPathValue::NodeSet(nodes)) => {
            return Ok(nodes.iter().map(XPathNode::node_value).collect());
        }
        (None | Some(ResultType::Node), XPathValue::NodeSet(nodes)) => nodes
            .first()
            .map(XPathNode::node_value)
            .ok_or_else(|| no_result(expression))?,
        (Some(ResultType::Node | ResultType::NodeSet), other) => {
            return Err(Error::InvalidExpression(format!(
                "XPath expression '{expression}' does not select nodes but yields {}",
                other.string()
            )));
        }
        (Some(ResultType::String), XPathValue::NodeSet(nodes)) if nodes.is_empty() => {
            return Err(no_result(expression));
        }
        (None | Some(ResultType::String), other) => other.string(),
        (Some(ResultType::Number), other) => format!("{:?}", other.number()),
        (Some(ResultType::Integer), other) => format_number(round_number(other.number())),
        (Some(ResultType::Boolean), other) => other.boolean().to_string(),
    };
    Ok(vec![rendered])
}

/// Parses `payload` and evaluates `expression` with the namespaces the
/// payload declares.
///
/// # Errors
/// Returns an error if the payload is not XML or the expression fails.
pub fn evaluate_payload(payload: &str, expression: &str) -> Result<String> {
    let document = parse_document(payload)?;
    let namespaces = namespace_context(&document, &IndexMap::new());
    evaluate_as_string(&document, expression, &namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ord:order xmlns:ord="urn:orders" xmlns="urn:default" id="17" status="open">
    <ord:customer vip="true">Ada</ord:customer>
    <items>
        <item sku="a-1" price="10.5">Apple</item>
        <item sku="b-2" price="4">Pear</item>
        <item sku="c-3" price="2.5"><!-- free -->Plum</item>
    </items>
    <note/>
</ord:order>"#;

    fn eval(expression: &str) -> Result<String> {
        let document = parse_document(ORDER).unwrap();
        let namespaces = namespace_context(&document, &IndexMap::new());
        evaluate_as_string(&document, expression, &namespaces)
    }

    #[test]
    fn test_paths_and_attributes() {
        assert_eq!(eval("/ord:order/ord:customer").unwrap(), "Ada");
        assert_eq!(eval("//item[2]").unwrap(), "Pear");
        assert_eq!(eval("//item[last()]/@sku").unwrap(), "c-3");
        assert_eq!(eval("/ord:order/@status").unwrap(), "open");
        assert_eq!(eval("//item[@sku='b-2']/preceding-sibling::item").unwrap(), "Apple");
        assert_eq!(eval("//item[3]/text()").unwrap(), "Plum");
        assert_eq!(eval("//item[3]").unwrap(), "Plum");
        assert_eq!(eval("//note").unwrap(), "");
        assert_eq!(eval("//item/..").unwrap(), "\n        ");
        assert_eq!(eval("/{urn:orders}order/{urn:orders}customer/@vip").unwrap(), "true");
    }

    #[test]
    fn test_result_types() {
        assert_eq!(eval("node-set://item").unwrap(), "Apple,Pear,Plum");
        assert_eq!(eval("count(//item)").unwrap(), "3");
        assert_eq!(eval("number:count(//item)").unwrap(), "3.0");
        assert_eq!(eval("integer:sum(//item/@price)").unwrap(), "17");
        assert_eq!(eval("sum(//item/@price)").unwrap(), "17");
        assert_eq!(eval("boolean://item[@price > 10]").unwrap(), "true");
        assert_eq!(eval("boolean://missing").unwrap(), "false");
        assert_eq!(eval("string:/ord:order/ord:customer").unwrap(), "Ada");
        assert_eq!(eval("node-set://missing").unwrap(), "");
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("concat(//item[1], '-', //item[1]/@sku)").unwrap(), "Apple-a-1");
        assert_eq!(eval("name(/*)").unwrap(), "ord:order");
        assert_eq!(eval("local-name(/*)").unwrap(), "order");
        assert_eq!(eval("namespace-uri(//items)").unwrap(), "urn:default");
        assert_eq!(eval("substring('citrus', 2, 3)").unwrap(), "itr");
        assert_eq!(eval("substring-after('a=b', '=')").unwrap(), "b");
        assert_eq!(eval("translate('bar', 'abc', 'ABC')").unwrap(), "BAr");
        assert_eq!(eval("normalize-space('  a   b ')").unwrap(), "a b");
        assert_eq!(eval("string-length(//item[1])").unwrap(), "5");
        assert_eq!(eval("round(2.5) + floor(1.7) * 2 - 7 mod 4").unwrap(), "2");
        assert_eq!(eval("10 div 4").unwrap(), "2.5");
        assert_eq!(eval("not(//item[@price > 100])").unwrap(), "true");
        assert_eq!(eval("count(//item | //item[1] | //note)").unwrap(), "4");
        assert_eq!(eval("count(//comment())").unwrap(), "1");
    }

    #[test]
    fn test_dot_notation() {
        assert_eq!(normalize_expression("order.items"), "/order/items | /order/@items");
        assert_eq!(normalize_expression("order"), "/order");
        assert_eq!(normalize_expression("//order"), "//order");
        assert_eq!(eval("order.status").unwrap(), "open");
        assert_eq!(eval("order.items.item").unwrap(), "Apple");
    }

    #[test]
    fn test_errors() {
        let error = eval("//missing").unwrap_err();
        assert!(error.is_validation());
        assert_eq!(error.detail(), "No result for XPath expression: '//missing'");

        assert!(matches!(eval("/x:order"), Err(Error::InvalidExpression(_))));
        assert!(matches!(eval("unknown(1)"), Err(Error::InvalidExpression(_))));
        assert!(matches!(eval("node:count(//item)"), Err(Error::InvalidExpression(_))));
        assert!(parse_document("<open>").is_err());
        assert!(parse_document("<!DOCTYPE x [<!ENTITY e 'x'>]><x>&e;</x>").is_err());
    }

    #[test]
    fn test_select_nodes_and_payload() {
        let document = parse_document(ORDER).unwrap();
        let namespaces = namespace_context(&document, &IndexMap::new());
        let nodes = XPath::parse("//item/@sku | //items")
            .unwrap()
            .select_nodes(document.root(), &namespaces)
            .unwrap();
        assert_eq!(nodes.len(), 4);
        assert!(nodes[0].string_value().contains("Pear"));
        assert_eq!(nodes[1].string_value(), "a-1");
        assert_eq!(nodes[3].node_value(), "c-3");

        assert_eq!(evaluate_payload("<a><b>1</b><b>2</b></a>", "count(/a/b)").unwrap(), "2");
    }
}
