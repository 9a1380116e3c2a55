//! Structural comparison of YAML payloads.

use serde::Deserialize as _;
use serde_json::Value as JsonValue;
use tracing::debug;

use citrus_core::{
    Error, Message, MessageType, MessageValidator, Result, TestContext, ValidationContext,
};

use crate::json::{compare_documents, json_settings};

/// Compares received and control YAML payloads document by document.
///
/// Each document is read into the JSON data model and compared the way
/// [`JsonTextMessageValidator`](crate::JsonTextMessageValidator) compares
/// JSON, honoring the strictness and ignore expressions of the `Json`
/// validation context.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlMessageValidator;

impl YamlMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultYamlMessageValidator";
}

fn documents(text: &str, side: &str) -> Result<Vec<JsonValue>> {
    serde_yaml::Deserializer::from_str(text)
        .map(|document| {
            JsonValue::deserialize(document).map_err(|error| {
                Error::validation(format!("Failed to parse {side} YAML payload: {error}"))
            })
        })
        .collect()
}

impl MessageValidator for YamlMessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, message_type: MessageType, _message: &Message) -> bool {
        message_type == MessageType::Yaml
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()> {
        if control.payload().is_empty() {
            debug!("Skip YAML message validation as no control payload was defined");
            return Ok(());
        }
        if received.payload().is_empty() {
            return Err(Error::validation(
                "Expected message contents, but received empty message",
            ));
        }

        let (strict, ignore_expressions) = json_settings(contexts);
        let expected_text = context.replace_dynamic_content(&control.payload_text())?;
        let expected = documents(&expected_text, "control")?;
        let actual = documents(&received.payload_text(), "received")?;
        if expected.len() != actual.len() {
            return Err(Error::validation(format!(
                "Validation failed - number of YAML documents not equal, expected '{}' but was '{}'",
                expected.len(),
                actual.len()
            )));
        }

        debug!("Start YAML message validation (strict: {strict})");
        for (actual_document, expected_document) in actual.iter().zip(&expected) {
            compare_documents(actual_document, expected_document, strict, ignore_expressions, context)?;
        }
        debug!("YAML message validation successful: All values OK");
        Ok(())
    }
}
