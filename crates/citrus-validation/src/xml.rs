//! Structural comparison of XML payloads.

use std::collections::HashSet;

use indexmap::IndexMap;
use roxmltree::{Document, Node, NodeId};
use tracing::debug;

use citrus_core::matcher::expression::{
    is_validation_matcher_expression, resolve_validation_matcher,
};
use citrus_core::settings::IGNORE_PLACEHOLDER;
use citrus_core::xpath::{XPath, XPathNode, namespace_context, normalize_expression, parse_document};
use citrus_core::{
    Error, Message, MessageType, MessageValidator, Result, TestContext, ValidationContext,
};

/// Compares received and control XML documents node by node.
///
/// Comments, processing instructions and whitespace only text are skipped.
/// Element text and attribute values in the control document may be
/// `@ignore@` or validation matcher expressions, and the `Xml` validation
/// context names received nodes to skip entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomXmlMessageValidator;

impl DomXmlMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultXmlMessageValidator";
}

fn xml_settings(contexts: &[ValidationContext]) -> (&[String], IndexMap<String, String>) {
    for validation in contexts {
        if let ValidationContext::Xml {
            ignore_expressions,
            namespaces,
        } = validation
        {
            return (ignore_expressions.as_slice(), namespaces.clone());
        }
    }
    (&[], IndexMap::new())
}

fn parse<'a>(text: &'a str, side: &str) -> Result<Document<'a>> {
    parse_document(text).map_err(|error| {
        Error::validation(format!("Failed to parse {side} XML payload: {}", error.detail()))
    })
}

impl MessageValidator for DomXmlMessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Xml && message.payload().is_xml_like()
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()> {
        validate_header_data(received, control, context)?;

        if control.payload().is_empty() {
            debug!("Skip XML message validation as no control payload was defined");
            return Ok(());
        }
        if received.payload().is_empty() {
            return Err(Error::validation(
                "Expected message contents, but received empty message",
            ));
        }

        let (ignore_expressions, explicit) = xml_settings(contexts);
        let expected_text = context.replace_dynamic_content(&control.payload_text())?;
        let received_text = received.payload_text();
        let expected = parse(&expected_text, "control")?;
        let actual = parse(&received_text, "received")?;

        let namespaces = namespace_context(&actual, &explicit);
        let mut ignored = HashSet::new();
        for expression in ignore_expressions {
            let expression = normalize_expression(&context.replace_dynamic_content(expression)?);
            for node in XPath::parse(&expression)?.select_nodes(actual.root(), &namespaces)? {
                ignored.insert(node.order_key());
            }
        }

        debug!("Start XML message validation");
        let comparison = DomComparison { ignored, context };
        comparison.compare_element(actual.root_element(), expected.root_element())?;
        debug!("XML message validation successful: All values OK");
        Ok(())
    }
}

/// Compares the raw header data fragments of both messages. XML fragments
/// are compared structurally, anything else as trimmed text.
fn validate_header_data(received: &Message, control: &Message, context: &TestContext) -> Result<()> {
    let expected = control.header_data();
    if expected.is_empty() {
        return Ok(());
    }
    let actual = received.header_data();
    if expected.len() > actual.len() {
        return Err(Error::validation(format!(
            "Failed to validate header data XML fragments - found {} header fragments, expected {}",
            actual.len(),
            expected.len()
        )));
    }

    let comparison = DomComparison {
        ignored: HashSet::new(),
        context,
    };
    for (received_fragment, control_fragment) in actual.iter().zip(expected) {
        let control_fragment = context.replace_dynamic_content(control_fragment)?;
        if control_fragment.trim().starts_with('<') {
            let expected_document = parse(&control_fragment, "control header data")?;
            let actual_document = parse(received_fragment, "received header data")?;
            comparison.compare_element(
                actual_document.root_element(),
                expected_document.root_element(),
            )?;
        } else if received_fragment.trim() != control_fragment.trim() {
            return Err(Error::validation(format!(
                "Header data not equal, expected '{}' but was '{}'",
                control_fragment.trim(),
                received_fragment.trim()
            )));
        }
    }
    debug!("Validation of header data fragments successful");
    Ok(())
}

struct DomComparison<'ctx> {
    ignored: HashSet<(NodeId, usize)>,
    context: &'ctx TestContext,
}

/// Non blank text directly inside `element`, trimmed.
fn own_text(element: Node<'_, '_>) -> String {
    element
        .children()
        .filter(Node::is_text)
        .filter_map(|text| text.text())
        .collect::<String>()
        .trim()
        .to_owned()
}

fn child_elements<'a, 'input>(element: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    element.children().filter(Node::is_element).collect()
}

/// Namespace URI and local part of a `prefix:local` value, resolved on `element`.
fn resolve_qname(element: Node<'_, '_>, value: &str) -> Option<(String, String)> {
    let (prefix, local) = value.split_once(':')?;
    element
        .namespaces()
        .find(|namespace| namespace.name() == Some(prefix))
        .map(|namespace| (namespace.uri().to_owned(), local.to_owned()))
}

impl DomComparison<'_> {
    fn compare_element(&self, received: Node<'_, '_>, control: Node<'_, '_>) -> Result<()> {
        let name = control.tag_name().name();
        if received.tag_name().name() != name {
            return Err(Error::validation(format!(
                "Element names not equal, expected '{name}' but was '{}'",
                received.tag_name().name()
            )));
        }
        if received.tag_name().namespace() != control.tag_name().namespace() {
            return Err(Error::validation(format!(
                "Element namespace not equal for element '{name}', expected '{}' but was '{}'",
                control.tag_name().namespace().unwrap_or_default(),
                received.tag_name().namespace().unwrap_or_default()
            )));
        }

        let control_text = own_text(control);
        if control_text == IGNORE_PLACEHOLDER
            || self.ignored.contains(&XPathNode::Node(received).order_key())
        {
            debug!("Element '{name}' is ignored");
            return Ok(());
        }

        self.compare_attributes(name, received, control)?;

        let received_text = own_text(received);
        if is_validation_matcher_expression(&control_text) {
            return resolve_validation_matcher(name, Some(received_text.as_str()), &control_text, self.context);
        }
        if received_text != control_text {
            return Err(Error::validation(format!(
                "Node value not equal for element '{name}', expected '{control_text}' but was '{received_text}'"
            )));
        }

        let received_children = child_elements(received);
        let control_children = child_elements(control);
        if received_children.len() != control_children.len() {
            return Err(Error::validation(format!(
                "Number of child elements not equal for element '{name}', expected '{}' but was '{}'",
                control_children.len(),
                received_children.len()
            )));
        }
        for (received_child, control_child) in received_children.into_iter().zip(control_children) {
            self.compare_element(received_child, control_child)?;
        }
        debug!("Validation successful for element '{name}'");
        Ok(())
    }

    fn compare_attributes(&self, name: &str, received: Node<'_, '_>, control: Node<'_, '_>) -> Result<()> {
        let received_count = received.attributes().count();
        let control_count = control.attributes().count();
        if received_count != control_count {
            return Err(Error::validation(format!(
                "Number of attributes not equal for element '{name}', expected '{control_count}' but was '{received_count}'"
            )));
        }

        for control_attribute in control.attributes() {
            let attribute_name = control_attribute.name();
            let Some((index, received_attribute)) = received.attributes().enumerate().find(|(_, attribute)| {
                attribute.name() == attribute_name && attribute.namespace() == control_attribute.namespace()
            }) else {
                return Err(Error::validation(format!(
                    "Attribute validation failed for element '{name}', unknown attribute {attribute_name}"
                )));
            };

            let key = XPathNode::Attribute {
                owner: received,
                index,
            }
            .order_key();
            let expected = control_attribute.value().trim();
            if expected == IGNORE_PLACEHOLDER || self.ignored.contains(&key) {
                debug!("Attribute '{attribute_name}' of element '{name}' is ignored");
                continue;
            }
            let actual = received_attribute.value().trim();
            if is_validation_matcher_expression(expected) {
                resolve_validation_matcher(attribute_name, Some(actual), expected, self.context)?;
                continue;
            }

            let equal = match (resolve_qname(received, actual), resolve_qname(control, expected)) {
                (Some(actual_qname), Some(expected_qname)) => actual_qname == expected_qname,
                _ => actual == expected,
            };
            if !equal {
                return Err(Error::validation(format!(
                    "Values not equal for attribute '{attribute_name}', expected '{expected}' but was '{actual}'"
                )));
            }
            debug!("Validation successful for attribute '{attribute_name}' of element '{name}'");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use citrus_core::{TestContextFactory, ValidationMatcherRegistry};

    use super::*;
    use crate::matchers::default_matcher_library;

    const RECEIVED: &str = r#"<?xml version="1.0"?>
<o:order xmlns:o="urn:orders" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" id="17" created="2024-05-01">
    <!-- generated -->
    <o:customer vip="true">Ada</o:customer>
    <o:item sku="a-1" xsi:type="o:Fruit">apple</o:item>
    <o:meta><o:trace>abc</o:trace></o:meta>
</o:order>"#;

    fn context() -> TestContext {
        TestContextFactory::new()
            .with_matcher_registry(
                ValidationMatcherRegistry::new().with_library(default_matcher_library()),
            )
            .create_context()
    }

    fn validate(received: &str, control: &str, contexts: &[ValidationContext]) -> Result<()> {
        DomXmlMessageValidator.validate(
            &Message::new(received),
            &Message::new(control),
            &context(),
            contexts,
        )
    }

    fn control(replace: &str, with: &str) -> String {
        RECEIVED.replace("<!-- generated -->", "").replace(replace, with)
    }

    #[test]
    fn test_equal_documents() {
        let control = r#"<order xmlns="urn:orders" xmlns:i="http://www.w3.org/2001/XMLSchema-instance" created="2024-05-01" id="17"><customer vip="true"> Ada </customer><item xmlns:fr="urn:orders" i:type="fr:Fruit" sku="a-1">apple</item><meta><trace>abc</trace></meta></order>"#;
        validate(RECEIVED, control, &[]).unwrap();
    }

    #[test]
    fn test_element_mismatches() {
        let error = validate(RECEIVED, &control("<o:customer vip=\"true\">Ada</o:customer>", "<o:client vip=\"true\">Ada</o:client>"), &[])
            .unwrap_err();
        assert_eq!(
            error.detail(),
            "Element names not equal, expected 'client' but was 'customer'"
        );

        let error = validate(RECEIVED, &control(">Ada<", ">Bob<"), &[]).unwrap_err();
        assert_eq!(
            error.detail(),
            "Node value not equal for element 'customer', expected 'Bob' but was 'Ada'"
        );

        let error = validate(RECEIVED, &control("<o:trace>abc</o:trace>", ""), &[]).unwrap_err();
        assert_eq!(
            error.detail(),
            "Number of child elements not equal for element 'meta', expected '0' but was '1'"
        );

        let error = validate(RECEIVED, &control("xmlns:o=\"urn:orders\"", "xmlns:o=\"urn:other\""), &[]).unwrap_err();
        assert!(error.detail().starts_with("Element namespace not equal for element 'order'"));
    }

    #[test]
    fn test_attribute_mismatches() {
        let error = validate(RECEIVED, &control(" vip=\"true\"", ""), &[]).unwrap_err();
        assert_eq!(
            error.detail(),
            "Number of attributes not equal for element 'customer', expected '0' but was '1'"
        );

        let error = validate(RECEIVED, &control("vip=", "gold="), &[]).unwrap_err();
        assert_eq!(
            error.detail(),
            "Attribute validation failed for element 'customer', unknown attribute gold"
        );

        let error = validate(RECEIVED, &control("sku=\"a-1\"", "sku=\"b-2\""), &[]).unwrap_err();
        assert_eq!(
            error.detail(),
            "Values not equal for attribute 'sku', expected 'b-2' but was 'a-1'"
        );

        let error = validate(RECEIVED, &control("o:Fruit", "xsi:Fruit"), &[]).unwrap_err();
        assert!(error.detail().contains("attribute 'type'"));
    }

    #[test]
    fn test_ignore_placeholders_and_matchers() {
        let control = control("2024-05-01", "@ignore@")
            .replace("<o:trace>abc</o:trace>", "@ignore@")
            .replace(">Ada<", ">@startsWith('A')@<")
            .replace("id=\"17\"", "id=\"@greaterThan(10)@\"");
        validate(RECEIVED, &control, &[]).unwrap();

        let failing = control.replace("@startsWith('A')@", "@startsWith('B')@");
        assert!(validate(RECEIVED, &failing, &[]).unwrap_err().is_validation());
    }

    #[test]
    fn test_ignore_expressions() {
        let control = control("2024-05-01", "1999-01-01").replace("abc", "xyz");
        assert!(validate(RECEIVED, &control, &[]).is_err());

        let contexts = [ValidationContext::Xml {
            ignore_expressions: vec!["//x:meta".to_owned(), "order.created".to_owned()],
            namespaces: [("x".to_owned(), "urn:orders".to_owned())].into_iter().collect(),
        }];
        validate(RECEIVED, &control, &contexts).unwrap();
    }

    #[test]
    fn test_dynamic_control() {
        let context = context();
        context.set_variable("customer", "Ada").unwrap();
        DomXmlMessageValidator
            .validate(
                &Message::new(RECEIVED),
                &Message::new(control(">Ada<", ">${customer}<")),
                &context,
                &[ValidationContext::xml()],
            )
            .unwrap();
    }

    #[test]
    fn test_header_data() {
        let received = Message::new("<a/>").with_header_data("<auth user=\"ada\"><token>t</token></auth>");
        let control = Message::new("<a/>").with_header_data("<auth user=\"ada\"><token>@ignore@</token></auth>");
        DomXmlMessageValidator.validate(&received, &control, &context(), &[]).unwrap();

        let control = control.with_header_data("<second/>");
        let error = DomXmlMessageValidator
            .validate(&received, &control, &context(), &[])
            .unwrap_err();
        assert_eq!(
            error.detail(),
            "Failed to validate header data XML fragments - found 1 header fragments, expected 2"
        );
    }

    #[test]
    fn test_empty_and_invalid_payloads() {
        validate(RECEIVED, "", &[]).unwrap();
        assert!(validate("", "<a/>", &[]).is_err());
        let error = validate("<a>", "<a/>", &[]).unwrap_err();
        assert!(error.detail().starts_with("Failed to parse received XML payload"));

        let validator = DomXmlMessageValidator;
        assert!(validator.supports_message_type(MessageType::Xml, &Message::new("<a/>")));
        assert!(!validator.supports_message_type(MessageType::Xml, &Message::new("{}")));
        assert!(!validator.supports_message_type(MessageType::Json, &Message::new("<a/>")));
    }
}
