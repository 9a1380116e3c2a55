//! Message validator API, the validator registry and the validators it falls back to.

/// Validator used when the received payload is empty.
mod empty;
/// Message header validator.
mod header;
/// Lookup of validators by name and message type.
mod registry;
/// Trimmed text comparison used when no other validator applies.
mod text;

use indexmap::IndexMap;

use crate::context::TestContext;
use crate::error::Result;
use crate::message::{Message, MessageType};

pub use empty::DefaultEmptyMessageValidator;
pub use header::DefaultMessageHeaderValidator;
pub use registry::MessageValidatorRegistry;
pub use text::DefaultTextEqualsMessageValidator;

/// How a received message is compared against its control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationContext {
    /// Header comparison.
    Header {
        /// Match header names case-insensitively.
        ignore_case: bool,
    },
    /// JSON document comparison.
    Json {
        /// Require equal entry counts and array sizes.
        strict: bool,
        /// JSONPath expressions of entries to skip.
        ignore_expressions: Vec<String>,
    },
    /// Evaluates JSONPath expressions on the received payload.
    JsonPath {
        /// Expression to expected value.
        expressions: IndexMap<String, String>,
    },
    /// XML DOM comparison.
    Xml {
        /// XPath or dot notation expressions of received nodes to skip.
        ignore_expressions: Vec<String>,
        /// Namespace prefixes added to those declared in the documents.
        namespaces: IndexMap<String, String>,
    },
    /// Evaluates XPath expressions on the received payload.
    XPath {
        /// Expression to expected value.
        expressions: IndexMap<String, String>,
        /// Namespace prefixes added to those declared in the payload.
        namespaces: IndexMap<String, String>,
    },
    /// Plain text comparison.
    PlainText {
        /// Collapse whitespace before comparing.
        ignore_whitespace: bool,
        /// Treat `\r\n` and `\n` alike.
        ignore_new_line_type: bool,
    },
}

impl ValidationContext {
    /// JSON validation with the given strictness and nothing ignored.
    pub fn json(strict: bool) -> Self {
        Self::Json {
            strict,
            ignore_expressions: Vec::new(),
        }
    }

    /// XML validation with nothing ignored.
    pub fn xml() -> Self {
        Self::Xml {
            ignore_expressions: Vec::new(),
            namespaces: IndexMap::new(),
        }
    }

    /// Whether this context evaluates expressions that only a payload
    /// validator can check.
    pub fn is_expression_context(&self) -> bool {
        matches!(self, Self::JsonPath { .. } | Self::XPath { .. })
    }
}

/// Compares a received message with a control message.
pub trait MessageValidator: Send + Sync {
    /// Name the validator is registered under.
    fn name(&self) -> &str;

    /// Whether this validator handles messages of `message_type`.
    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool;

    /// Header validators run in addition to the payload validators.
    fn is_header_validator(&self) -> bool {
        false
    }

    /// Validates `received` against `control`.
    ///
    /// # Errors
    /// Returns `Error::Validation` describing the first mismatch.
    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()>;
}
