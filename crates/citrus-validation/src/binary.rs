//! Binary payload validation through base64 encodings.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use citrus_core::{
    Error, Message, MessagePayload, MessageType, MessageValidator, Result, TestContext,
    ValidationContext,
};

/// Compares the base64 encodings of received and control payloads.
///
/// Control payloads declared as `BINARY_BASE64` text are taken as already
/// encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryBase64MessageValidator;

impl BinaryBase64MessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultBinaryBase64MessageValidator";
}

fn control_encoding(control: &Message, context: &TestContext) -> Result<String> {
    match control.payload() {
        MessagePayload::Text(text) if control.message_type() == Some(MessageType::Base64) => {
            let encoded = context.replace_dynamic_content(text.trim())?;
            STANDARD.decode(&encoded).map_err(|error| {
                Error::validation(format!("Control payload is not valid base64: {error}"))
            })?;
            Ok(encoded)
        }
        payload => Ok(payload.to_base64()),
    }
}

impl MessageValidator for BinaryBase64MessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, message_type: MessageType, _message: &Message) -> bool {
        matches!(message_type, MessageType::Binary | MessageType::Base64)
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        _contexts: &[ValidationContext],
    ) -> Result<()> {
        if control.payload().is_empty() {
            debug!("Skip binary message validation as no control payload was defined");
            return Ok(());
        }

        let expected = control_encoding(control, context)?;
        let actual = received.payload().to_base64();
        if actual == expected {
            debug!("Binary message validation successful");
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Binary message payload not equal, expected '{expected}' but was '{actual}'"
            )))
        }
    }
}
