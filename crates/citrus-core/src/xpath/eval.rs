use core::cmp::Ordering;

use indexmap::IndexMap;
use roxmltree::{Attribute, Node, NodeId, NodeType};

use super::parser::{ArithmeticOperator, Axis, CompareOperator, Expr, NamespaceTest, NodeTest, Step};
use crate::error::{Error, Result};

/// Node of the XPath data model: a document node or an attribute of an element.
#[derive(Debug, Clone, Copy)]
pub enum XPathNode<'a, 'input> {
    /// Root, element, text, comment or processing instruction.
    Node(Node<'a, 'input>),
    /// The `index`-th attribute of `owner`.
    Attribute {
        /// Element carrying the attribute.
        owner: Node<'a, 'input>,
        /// Position among the attributes of `owner`.
        index: usize,
    },
}

impl<'a, 'input> XPathNode<'a, 'input> {
    /// Key sorting nodes into document order; attributes follow their element.
    pub fn order_key(&self) -> (NodeId, usize) {
        match self {
            Self::Node(node) => (node.id(), 0),
            Self::Attribute { owner, index } => (owner.id(), index + 1),
        }
    }

    fn attribute(&self) -> Option<Attribute<'a, 'input>> {
        match self {
            Self::Node(_) => None,
            Self::Attribute { owner, index } => owner.attributes().nth(*index),
        }
    }

    fn owner(&self) -> Node<'a, 'input> {
        match self {
            Self::Node(node) | Self::Attribute { owner: node, .. } => *node,
        }
    }

    /// XPath string value: concatenated descendant text for elements.
    pub fn string_value(&self) -> String {
        match self {
            Self::Node(node) => match node.node_type() {
                NodeType::Root | NodeType::Element => node
                    .descendants()
                    .filter(Node::is_text)
                    .filter_map(|text| text.text())
                    .collect(),
                NodeType::Text | NodeType::Comment => node.text().unwrap_or_default().to_owned(),
                NodeType::PI => node
                    .pi()
                    .and_then(|instruction| instruction.value)
                    .unwrap_or_default()
                    .to_owned(),
            },
            Self::Attribute { .. } => self
                .attribute()
                .map(|attribute| attribute.value().to_owned())
                .unwrap_or_default(),
        }
    }

    /// Value of the node itself: the first text child of an element, the
    /// value of an attribute or the content of a text node.
    pub fn node_value(&self) -> String {
        match self {
            Self::Node(node) if node.is_element() || node.is_root() => {
                node.children()
                    .find(Node::is_text)
                    .and_then(|text| text.text())
                    .unwrap_or_default()
                    .to_owned()
            }
            _ => self.string_value(),
        }
    }

    fn local_name(&self) -> String {
        match self {
            Self::Node(node) if node.is_element() => node.tag_name().name().to_owned(),
            Self::Node(node) => node
                .pi()
                .map(|instruction| instruction.target.to_owned())
                .unwrap_or_default(),
            Self::Attribute { .. } => self
                .attribute()
                .map(|attribute| attribute.name().to_owned())
                .unwrap_or_default(),
        }
    }

    fn namespace_uri(&self) -> Option<String> {
        match self {
            Self::Node(node) if node.is_element() => node.tag_name().namespace().map(str::to_owned),
            Self::Node(_) => None,
            Self::Attribute { .. } => self
                .attribute()
                .and_then(|attribute| attribute.namespace().map(str::to_owned)),
        }
    }

    fn qualified_name(&self) -> String {
        let local = self.local_name();
        self.namespace_uri()
            .and_then(|uri| self.owner().lookup_prefix(&uri).map(str::to_owned))
            .filter(|prefix| !prefix.is_empty())
            .map_or_else(|| local.clone(), |prefix| format!("{prefix}:{local}"))
    }
}

/// Result of an XPath expression.
#[derive(Debug, Clone)]
pub enum XPathValue<'a, 'input> {
    /// Nodes in document order.
    NodeSet(Vec<XPathNode<'a, 'input>>),
    /// Boolean result.
    Boolean(bool),
    /// Number result.
    Number(f64),
    /// String result.
    String(String),
}

impl XPathValue<'_, '_> {
    /// `boolean()` conversion.
    pub fn boolean(&self) -> bool {
        match self {
            Self::NodeSet(nodes) => !nodes.is_empty(),
            Self::Boolean(value) => *value,
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::String(text) => !text.is_empty(),
        }
    }

    /// `number()` conversion.
    pub fn number(&self) -> f64 {
        match self {
            Self::Number(number) => *number,
            Self::Boolean(value) => f64::from(u8::from(*value)),
            Self::NodeSet(_) | Self::String(_) => string_to_number(&self.string()),
        }
    }

    /// `string()` conversion; a node-set yields the value of its first node.
    pub fn string(&self) -> String {
        match self {
            Self::NodeSet(nodes) => nodes.first().map(XPathNode::string_value).unwrap_or_default(),
            Self::Boolean(value) => value.to_string(),
            Self::Number(number) => format_number(*number),
            Self::String(text) => text.clone(),
        }
    }
}

/// Formats a number the way XPath `string()` does: integers without a fraction.
pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_owned()
    } else if number.is_infinite() {
        if number > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if number == 0.0 {
        "0".to_owned()
    } else {
        number.to_string()
    }
}

fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !digits.is_empty()
        && digits != "."
        && digits.matches('.').count() <= 1
        && digits.chars().all(|character| character.is_ascii_digit() || character == '.');
    if well_formed {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Rounds half up, as XPath `round()` does.
pub fn round_number(number: f64) -> f64 {
    if number.is_nan() || number.is_infinite() {
        number
    } else {
        (number + 0.5).floor()
    }
}

fn numbers_equal(left: f64, right: f64) -> bool {
    left.partial_cmp(&right) == Some(Ordering::Equal)
}

/// Context node with its position in the current node list.
#[derive(Debug, Clone, Copy)]
pub struct Focus<'a, 'input> {
    node: XPathNode<'a, 'input>,
    position: usize,
    size: usize,
}

impl<'a, 'input> Focus<'a, 'input> {
    /// Focus on a single node.
    pub fn on(node: XPathNode<'a, 'input>) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
        }
    }
}

/// Evaluates expression trees with a fixed namespace context.
pub struct Evaluator<'ns> {
    expression: &'ns str,
    namespaces: &'ns IndexMap<String, String>,
}

impl<'ns> Evaluator<'ns> {
    pub fn new(expression: &'ns str, namespaces: &'ns IndexMap<String, String>) -> Self {
        Self {
            expression,
            namespaces,
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::InvalidExpression(format!(
            "Failed to evaluate XPath expression '{}': {reason}",
            self.expression
        ))
    }

    pub fn evaluate<'a, 'input>(
        &self,
        expr: &Expr,
        focus: Focus<'a, 'input>,
    ) -> Result<XPathValue<'a, 'input>> {
        Ok(match expr {
            Expr::Or(left, right) => XPathValue::Boolean(
                self.evaluate(left, focus)?.boolean() || self.evaluate(right, focus)?.boolean(),
            ),
            Expr::And(left, right) => XPathValue::Boolean(
                self.evaluate(left, focus)?.boolean() && self.evaluate(right, focus)?.boolean(),
            ),
            Expr::Compare(operator, left, right) => XPathValue::Boolean(compare(
                *operator,
                &self.evaluate(left, focus)?,
                &self.evaluate(right, focus)?,
            )),
            Expr::Arithmetic(operator, left, right) => {
                let left = self.evaluate(left, focus)?.number();
                let right = self.evaluate(right, focus)?.number();
                XPathValue::Number(match operator {
                    ArithmeticOperator::Add => left + right,
                    ArithmeticOperator::Subtract => left - right,
                    ArithmeticOperator::Multiply => left * right,
                    ArithmeticOperator::Divide => left / right,
                    ArithmeticOperator::Modulo => left % right,
                })
            }
            Expr::Negate(inner) => XPathValue::Number(-self.evaluate(inner, focus)?.number()),
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, focus)?;
                nodes.extend(self.node_set(right, focus)?);
                sort_document_order(&mut nodes);
                XPathValue::NodeSet(nodes)
            }
            Expr::Literal(text) => XPathValue::String(text.clone()),
            Expr::Number(number) => XPathValue::Number(*number),
            Expr::Function(name, arguments) => self.call(name, arguments, focus)?,
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    XPathNode::Node(focus.node.owner().document().root())
                } else {
                    focus.node
                };
                XPathValue::NodeSet(self.apply_steps(vec![start], steps)?)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.node_set(primary, focus)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                XPathValue::NodeSet(self.apply_steps(nodes, steps)?)
            }
        })
    }

    fn node_set<'a, 'input>(
        &self,
        expr: &Expr,
        focus: Focus<'a, 'input>,
    ) -> Result<Vec<XPathNode<'a, 'input>>> {
        match self.evaluate(expr, focus)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(self.error(&format!("expected a node-set but found {other:?}"))),
        }
    }

    fn apply_steps<'a, 'input>(
        &self,
        mut nodes: Vec<XPathNode<'a, 'input>>,
        steps: &[Step],
    ) -> Result<Vec<XPathNode<'a, 'input>>> {
        for step in steps {
            let mut selected = Vec::new();
            for node in &nodes {
                let mut candidates = Vec::new();
                for candidate in axis_nodes(*node, step.axis) {
                    if self.matches(candidate, step.axis, &step.test)? {
                        candidates.push(candidate);
                    }
                }
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                selected.extend(candidates);
            }
            sort_document_order(&mut selected);
            nodes = selected;
        }
        Ok(nodes)
    }

    fn filter<'a, 'input>(
        &self,
        candidates: Vec<XPathNode<'a, 'input>>,
        predicate: &Expr,
    ) -> Result<Vec<XPathNode<'a, 'input>>> {
        let size = candidates.len();
        let mut kept = Vec::new();
        for (index, candidate) in candidates.into_iter().enumerate() {
            let focus = Focus {
                node: candidate,
                position: index + 1,
                size,
            };
            let keep = match self.evaluate(predicate, focus)? {
                XPathValue::Number(number) => numbers_equal((index + 1) as f64, number),
                other => other.boolean(),
            };
            if keep {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }

    fn matches(&self, candidate: XPathNode<'_, '_>, axis: Axis, test: &NodeTest) -> Result<bool> {
        let XPathNode::Node(node) = candidate else {
            return match test {
                NodeTest::Node => Ok(true),
                NodeTest::Name { namespace, local } if axis == Axis::Attribute => {
                    self.name_matches(candidate, namespace, local.as_deref())
                }
                _ => Ok(false),
            };
        };
        match test {
            NodeTest::Node => Ok(true),
            NodeTest::Text => Ok(node.is_text()),
            NodeTest::Comment => Ok(node.is_comment()),
            NodeTest::ProcessingInstruction => Ok(node.is_pi()),
            NodeTest::Name { namespace, local } => {
                if axis == Axis::Attribute || !node.is_element() {
                    return Ok(false);
                }
                self.name_matches(candidate, namespace, local.as_deref())
            }
        }
    }

    fn name_matches(
        &self,
        candidate: XPathNode<'_, '_>,
        namespace: &NamespaceTest,
        local: Option<&str>,
    ) -> Result<bool> {
        if local.is_some_and(|expected_local| expected_local != candidate.local_name()) {
            return Ok(false);
        }
        let expected = match namespace {
            NamespaceTest::Any => return Ok(true),
            NamespaceTest::Prefix(prefix) => self.namespaces.get(prefix).ok_or_else(|| {
                self.error(&format!("undefined namespace prefix '{prefix}'"))
            })?,
            NamespaceTest::Uri(uri) => uri,
        };
        Ok(candidate.namespace_uri().as_deref() == Some(expected.as_str()))
    }

    fn argument<'a, 'input>(
        &self,
        arguments: &[Expr],
        index: usize,
        focus: Focus<'a, 'input>,
    ) -> Result<Option<XPathValue<'a, 'input>>> {
        arguments
            .get(index)
            .map(|argument| self.evaluate(argument, focus))
            .transpose()
    }

    fn string_argument(&self, arguments: &[Expr], index: usize, focus: Focus<'_, '_>) -> Result<String> {
        Ok(match self.argument(arguments, index, focus)? {
            Some(value) => value.string(),
            None => focus.node.string_value(),
        })
    }

    fn number_argument(&self, arguments: &[Expr], index: usize, focus: Focus<'_, '_>) -> Result<f64> {
        Ok(match self.argument(arguments, index, focus)? {
            Some(value) => value.number(),
            None => string_to_number(&focus.node.string_value()),
        })
    }

    /// First node of the optional node-set argument, or the context node.
    fn node_argument<'a, 'input>(
        &self,
        arguments: &[Expr],
        focus: Focus<'a, 'input>,
    ) -> Result<Option<XPathNode<'a, 'input>>> {
        match arguments.first() {
            Some(argument) => Ok(self.node_set(argument, focus)?.first().copied()),
            None => Ok(Some(focus.node)),
        }
    }

    fn check_arity(&self, name: &str, arguments: &[Expr], min: usize, max: usize) -> Result<()> {
        if (min..=max).contains(&arguments.len()) {
            Ok(())
        } else {
            Err(self.error(&format!(
                "function {name}() takes {min} to {max} arguments but got {}",
                arguments.len()
            )))
        }
    }

    fn call<'a, 'input>(
        &self,
        name: &str,
        arguments: &[Expr],
        focus: Focus<'a, 'input>,
    ) -> Result<XPathValue<'a, 'input>> {
        let (min, max) = match name {
            "last" | "position" | "true" | "false" => (0, 0),
            "count" | "sum" | "boolean" | "not" | "floor" | "ceiling" | "round" => (1, 1),
            "name" | "local-name" | "namespace-uri" | "string" | "string-length"
            | "normalize-space" | "number" => (0, 1),
            "starts-with" | "contains" | "substring-before" | "substring-after" => (2, 2),
            "substring" => (2, 3),
            "translate" => (3, 3),
            "concat" => (2, usize::MAX),
            _ => return Err(self.error(&format!("unknown function {name}()"))),
        };
        self.check_arity(name, arguments, min, max)?;

        let string = |index| self.string_argument(arguments, index, focus);
        let number = |index| self.number_argument(arguments, index, focus);
        Ok(match name {
            "last" => XPathValue::Number(focus.size as f64),
            "position" => XPathValue::Number(focus.position as f64),
            "true" => XPathValue::Boolean(true),
            "false" => XPathValue::Boolean(false),
            "count" => XPathValue::Number(self.node_set(&arguments[0], focus)?.len() as f64),
            "sum" => XPathValue::Number(
                self.node_set(&arguments[0], focus)?
                    .iter()
                    .map(|node| string_to_number(&node.string_value()))
                    .sum(),
            ),
            "boolean" => XPathValue::Boolean(self.evaluate(&arguments[0], focus)?.boolean()),
            "not" => XPathValue::Boolean(!self.evaluate(&arguments[0], focus)?.boolean()),
            "floor" => XPathValue::Number(number(0)?.floor()),
            "ceiling" => XPathValue::Number(number(0)?.ceil()),
            "round" => XPathValue::Number(round_number(number(0)?)),
            "number" => XPathValue::Number(number(0)?),
            "name" | "local-name" | "namespace-uri" => {
                let node = self.node_argument(arguments, focus)?;
                XPathValue::String(node.map_or_else(String::new, |node| match name {
                    "name" => node.qualified_name(),
                    "local-name" => node.local_name(),
                    _ => node.namespace_uri().unwrap_or_default(),
                }))
            }
            "string" => XPathValue::String(string(0)?),
            "string-length" => XPathValue::Number(string(0)?.chars().count() as f64),
            "normalize-space" => {
                XPathValue::String(string(0)?.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            "concat" => XPathValue::String(
                (0..arguments.len())
                    .map(string)
                    .collect::<Result<String>>()?,
            ),
            "starts-with" => XPathValue::Boolean(string(0)?.starts_with(&string(1)?)),
            "contains" => XPathValue::Boolean(string(0)?.contains(&string(1)?)),
            "substring-before" => {
                let text = string(0)?;
                let pattern = string(1)?;
                XPathValue::String(
                    text.split_once(pattern.as_str())
                        .map(|(before, _)| before.to_owned())
                        .unwrap_or_default(),
                )
            }
            "substring-after" => {
                let text = string(0)?;
                let pattern = string(1)?;
                XPathValue::String(
                    text.split_once(pattern.as_str())
                        .map(|(_, after)| after.to_owned())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                let text = string(0)?;
                let start = round_number(number(1)?);
                let length = if arguments.len() == 3 {
                    Some(round_number(number(2)?))
                } else {
                    None
                };
                XPathValue::String(
                    text.chars()
                        .enumerate()
                        .filter(|(index, _)| {
                            let position = (index + 1) as f64;
                            position >= start && length.is_none_or(|length| position < start + length)
                        })
                        .map(|(_, character)| character)
                        .collect(),
                )
            }
            _ => {
                let text = string(0)?;
                let from: Vec<char> = string(1)?.chars().collect();
                let to: Vec<char> = string(2)?.chars().collect();
                XPathValue::String(
                    text.chars()
                        .filter_map(|character| {
                            from.iter()
                                .position(|candidate| *candidate == character)
                                .map_or(Some(character), |index| to.get(index).copied())
                        })
                        .collect(),
                )
            }
        })
    }
}

fn sort_document_order(nodes: &mut Vec<XPathNode<'_, '_>>) {
    nodes.sort_by_key(|node| {
        let (id, index) = node.order_key();
        (id.get(), index)
    });
    nodes.dedup_by_key(|node| node.order_key());
}

fn axis_nodes<'a, 'input>(node: XPathNode<'a, 'input>, axis: Axis) -> Vec<XPathNode<'a, 'input>> {
    let XPathNode::Node(current) = node else {
        let owner = node.owner();
        return match axis {
            Axis::Parent => vec![XPathNode::Node(owner)],
            Axis::Ancestor => wrap(owner.ancestors()),
            Axis::AncestorOrSelf => {
                let mut nodes = vec![node];
                nodes.extend(wrap(owner.ancestors()));
                nodes
            }
            Axis::SelfNode => vec![node],
            Axis::Following => {
                let root = owner.document().root();
                wrap(root.descendants().filter(|candidate| candidate.id().get() > owner.id().get()))
            }
            Axis::Preceding => preceding(owner),
            Axis::Child
            | Axis::Descendant
            | Axis::DescendantOrSelf
            | Axis::Attribute
            | Axis::FollowingSibling
            | Axis::PrecedingSibling => Vec::new(),
        };
    };

    match axis {
        Axis::Child => wrap(current.children()),
        Axis::Descendant => wrap(current.descendants().skip(1)),
        Axis::DescendantOrSelf => wrap(current.descendants()),
        Axis::Parent => wrap(current.parent().into_iter()),
        Axis::Ancestor => wrap(current.ancestors().skip(1)),
        Axis::AncestorOrSelf => wrap(current.ancestors()),
        Axis::Attribute if current.is_element() => (0..current.attributes().count())
            .map(|index| XPathNode::Attribute {
                owner: current,
                index,
            })
            .collect(),
        Axis::Attribute => Vec::new(),
        Axis::SelfNode => vec![node],
        Axis::FollowingSibling => wrap(current.next_siblings().skip(1)),
        Axis::PrecedingSibling => wrap(current.prev_siblings().skip(1)),
        Axis::Following => {
            let last = current.descendants().last().unwrap_or(current).id();
            let root = current.document().root();
            wrap(root.descendants().filter(|candidate| candidate.id().get() > last.get()))
        }
        Axis::Preceding => preceding(current),
    }
}

fn wrap<'a, 'input>(nodes: impl Iterator<Item = Node<'a, 'input>>) -> Vec<XPathNode<'a, 'input>> {
    nodes.map(XPathNode::Node).collect()
}

/// Nodes before `node` that are not its ancestors, nearest first.
fn preceding<'a, 'input>(node: Node<'a, 'input>) -> Vec<XPathNode<'a, 'input>> {
    let root = node.document().root();
    let mut nodes: Vec<_> = root
        .descendants()
        .filter(|candidate| {
            candidate.id().get() < node.id().get() && !node.ancestors().any(|ancestor| ancestor == *candidate)
        })
        .map(XPathNode::Node)
        .collect();
    nodes.reverse();
    nodes
}

fn compare(operator: CompareOperator, left: &XPathValue<'_, '_>, right: &XPathValue<'_, '_>) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(left_nodes), XPathValue::NodeSet(right_nodes)) => {
            left_nodes.iter().any(|left_node| {
                let left_value = XPathValue::String(left_node.string_value());
                right_nodes.iter().any(|right_node| {
                    compare_atomic(operator, &left_value, &XPathValue::String(right_node.string_value()))
                })
            })
        }
        (XPathValue::NodeSet(nodes), XPathValue::Boolean(_)) => {
            compare_atomic(operator, &XPathValue::Boolean(!nodes.is_empty()), right)
        }
        (XPathValue::Boolean(_), XPathValue::NodeSet(nodes)) => {
            compare_atomic(operator, left, &XPathValue::Boolean(!nodes.is_empty()))
        }
        (XPathValue::NodeSet(nodes), _) => nodes.iter().any(|node| {
            compare_atomic(operator, &XPathValue::String(node.string_value()), right)
        }),
        (_, XPathValue::NodeSet(nodes)) => nodes.iter().any(|node| {
            compare_atomic(operator, left, &XPathValue::String(node.string_value()))
        }),
        _ => compare_atomic(operator, left, right),
    }
}

fn compare_atomic(operator: CompareOperator, left: &XPathValue<'_, '_>, right: &XPathValue<'_, '_>) -> bool {
    let equal = || match (left, right) {
        (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => left.boolean() == right.boolean(),
        (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
            numbers_equal(left.number(), right.number())
        }
        _ => left.string() == right.string(),
    };
    match operator {
        CompareOperator::Equal => equal(),
        CompareOperator::NotEqual => !equal(),
        CompareOperator::Less => left.number() < right.number(),
        CompareOperator::LessOrEqual => left.number() <= right.number(),
        CompareOperator::Greater => left.number() > right.number(),
        CompareOperator::GreaterOrEqual => left.number() >= right.number(),
    }
}
