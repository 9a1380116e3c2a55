//! Copies values out of messages into test variables.

use tracing::debug;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::{json_path, xpath};

/// One value to extract from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableExtractor {
    /// Header value.
    Header {
        /// Header name, may contain dynamic content.
        header: String,
        /// Target variable.
        variable: String,
    },
    /// JSONPath result on the payload.
    JsonPath {
        /// JSONPath expression, may contain dynamic content.
        expression: String,
        /// Target variable.
        variable: String,
    },
    /// XPath result on an XML payload, using the namespaces it declares.
    XPath {
        /// XPath or dot notation expression, may contain dynamic content.
        expression: String,
        /// Target variable.
        variable: String,
    },
    /// Whole payload text.
    Payload {
        /// Target variable.
        variable: String,
    },
}

impl VariableExtractor {
    /// Target variable name.
    pub fn variable(&self) -> &str {
        match self {
            Self::Header { variable, .. }
            | Self::JsonPath { variable, .. }
            | Self::XPath { variable, .. }
            | Self::Payload { variable } => variable,
        }
    }

    /// Extracts the value from `message` and stores it in `context`.
    ///
    /// # Errors
    /// Returns `Error::Runtime` if the header is missing or the expression yields nothing.
    pub fn extract(&self, message: &Message, context: &TestContext) -> Result<()> {
        let value = match self {
            Self::Header { header, .. } => {
                let header = context.replace_dynamic_content(header)?;
                message
                    .header(&header)
                    .map(|value| value.into_owned())
                    .ok_or_else(|| {
                        Error::runtime(format!(
                            "Failed to extract variable from message - missing header '{header}'"
                        ))
                    })?
            }
            Self::JsonPath { expression, .. } => {
                let expression = context.replace_dynamic_content(expression)?;
                json_path::evaluate_payload(&message.payload_text(), &expression).map_err(
                    |error| {
                        Error::runtime(format!(
                            "Failed to extract variable for JSONPath '{expression}': {error}"
                        ))
                    },
                )?
            }
            Self::XPath { expression, .. } => {
                let expression = context.replace_dynamic_content(expression)?;
                xpath::evaluate_payload(&message.payload_text(), &expression).map_err(|error| {
                    Error::runtime(format!(
                        "Failed to extract variable for XPath '{expression}': {}",
                        error.detail()
                    ))
                })?
            }
            Self::Payload { .. } => message.payload_text().into_owned(),
        };

        debug!("Extracted variable '{}' = '{value}'", self.variable());
        context.set_variable(self.variable(), value)
    }
}

/// Runs all extractors in order.
///
/// # Errors
/// Returns the first extraction error.
pub fn extract_variables(
    extractors: &[VariableExtractor],
    message: &Message,
    context: &TestContext,
) -> Result<()> {
    extractors
        .iter()
        .try_for_each(|extractor| extractor.extract(message, context))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::new(r#"{"order": {"id": 42, "items": ["a", "b"]}}"#).with_header("operation", "create")
    }

    #[test]
    fn test_extract_all_kinds() {
        let context = TestContext::default();
        let extractors = vec![
            VariableExtractor::Header {
                header: "operation".to_owned(),
                variable: "op".to_owned(),
            },
            VariableExtractor::JsonPath {
                expression: "$.order.id".to_owned(),
                variable: "orderId".to_owned(),
            },
            VariableExtractor::JsonPath {
                expression: "$.order.items[*]".to_owned(),
                variable: "items".to_owned(),
            },
            VariableExtractor::Payload {
                variable: "body".to_owned(),
            },
        ];

        extract_variables(&extractors, &message(), &context).unwrap();
        assert_eq!(context.get_variable("op").unwrap(), "create");
        assert_eq!(context.get_variable("orderId").unwrap(), "42");
        assert_eq!(context.get_variable("items").unwrap(), r#"["a","b"]"#);
        assert!(context.get_variable("body").unwrap().contains("\"order\""));
    }

    #[test]
    fn test_extract_failures() {
        let context = TestContext::default();
        let missing_header = VariableExtractor::Header {
            header: "missing".to_owned(),
            variable: "x".to_owned(),
        };
        assert!(matches!(
            missing_header.extract(&message(), &context),
            Err(Error::Runtime(_))
        ));

        let missing_path = VariableExtractor::JsonPath {
            expression: "$.order.unknown".to_owned(),
            variable: "x".to_owned(),
        };
        assert!(matches!(
            missing_path.extract(&message(), &context),
            Err(Error::Runtime(_))
        ));
        assert!(!context.has_variable("x"));
    }

    #[test]
    fn test_extract_xpath() {
        let context = TestContext::default();
        context.set_variable("field", "status").unwrap();
        let message = Message::new(
            r#"<ord:order xmlns:ord="urn:orders" status="open"><ord:item>a</ord:item><ord:item>b</ord:item></ord:order>"#,
        );
        let extractors = vec![
            VariableExtractor::XPath {
                expression: "/ord:order/ord:item[2]".to_owned(),
                variable: "second".to_owned(),
            },
            VariableExtractor::XPath {
                expression: "order.${field}".to_owned(),
                variable: "status".to_owned(),
            },
            VariableExtractor::XPath {
                expression: "count(//ord:item)".to_owned(),
                variable: "count".to_owned(),
            },
        ];
        extract_variables(&extractors, &message, &context).unwrap();
        assert_eq!(context.get_variable("second").unwrap(), "b");
        assert_eq!(context.get_variable("status").unwrap(), "open");
        assert_eq!(context.get_variable("count").unwrap(), "2");

        let missing = VariableExtractor::XPath {
            expression: "//ord:missing".to_owned(),
            variable: "x".to_owned(),
        };
        assert!(matches!(missing.extract(&message, &context), Err(Error::Runtime(_))));
        let not_xml = VariableExtractor::XPath {
            expression: "/a".to_owned(),
            variable: "x".to_owned(),
        };
        assert!(matches!(not_xml.extract(&Message::new("{}"), &context), Err(Error::Runtime(_))));
    }
}
