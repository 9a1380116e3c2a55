//! Validation of XML payloads through XPath expressions.

use indexmap::IndexMap;
use tracing::debug;

use citrus_core::matcher::expression::{
    is_validation_matcher_expression, resolve_validation_matcher,
};
use citrus_core::settings::IGNORE_PLACEHOLDER;
use citrus_core::xpath::{evaluate_as_string, namespace_context, parse_document};
use citrus_core::{
    Error, Message, MessageType, MessageValidator, Result, TestContext, ValidationContext,
};

/// Evaluates each expression of the `XPath` validation contexts on the
/// received payload and compares the result with its expected value.
///
/// Expressions may carry a result type prefix such as `node-set:` or use
/// dot notation. A node-set expected value may be written as `[a, b]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XpathMessageValidator;

impl XpathMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultXPathMessageValidator";
}

fn strip_brackets(value: &str) -> String {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .map_or_else(
            || trimmed.to_owned(),
            |inner| {
                inner
                    .split(',')
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join(",")
            },
        )
}

impl MessageValidator for XpathMessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Xml && message.payload().is_xml_like()
    }

    fn validate(
        &self,
        received: &Message,
        _control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()> {
        let mut expressions = Vec::new();
        let mut explicit = IndexMap::new();
        for validation in contexts {
            if let ValidationContext::XPath {
                expressions: entries,
                namespaces,
            } = validation
            {
                expressions.extend(entries);
                explicit.extend(namespaces.iter().map(|(prefix, uri)| (prefix.clone(), uri.clone())));
            }
        }
        if expressions.is_empty() {
            return Ok(());
        }
        if received.payload().is_empty() {
            return Err(Error::validation(
                "Unable to validate message elements - receive message payload was empty",
            ));
        }

        let payload = received.payload_text();
        let document = parse_document(&payload)
            .map_err(|error| Error::validation(format!("Failed to parse received XML payload: {}", error.detail())))?;
        let namespaces = namespace_context(&document, &explicit);

        debug!("Start XPath element validation");
        for (expression, expected) in expressions {
            let expression = context.replace_dynamic_content(expression)?;
            let actual = evaluate_as_string(&document, &expression, &namespaces)?;

            if expected.trim() == IGNORE_PLACEHOLDER {
                debug!("Ignoring XPath element '{expression}'");
                continue;
            }
            if is_validation_matcher_expression(expected.trim()) {
                resolve_validation_matcher(&expression, Some(actual.as_str()), expected.trim(), context)?;
            } else {
                let expected = context.replace_dynamic_content(expected)?;
                if actual != expected && actual != strip_brackets(&expected) {
                    return Err(Error::validation(format!(
                        "Values not equal for element '{expression}', expected '{expected}' but was '{actual}'"
                    )));
                }
            }
            debug!("Validating element: {expression}='{actual}': OK");
        }
        debug!("XPath element validation successful: All elements OK");
        Ok(())
    }
}
