use tracing::debug;

use super::{MessageValidator, ValidationContext};
use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::message::{Message, MessageType};

/// Compares trimmed payload text for equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTextEqualsMessageValidator;

impl DefaultTextEqualsMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultTextEqualsMessageValidator";
}

impl MessageValidator for DefaultTextEqualsMessageValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, _message_type: MessageType, _message: &Message) -> bool {
        true
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        _contexts: &[ValidationContext],
    ) -> Result<()> {
        if control.payload().is_empty() {
            debug!("Skip message payload validation as no control payload was defined");
            return Ok(());
        }

        let expected = context.replace_dynamic_content(control.payload_text().trim())?;
        let actual = received.payload_text();
        if actual.trim() != expected {
            return Err(Error::validation(format!(
                "Message payload not equal, expected '{expected}' but was '{}'",
                actual.trim()
            )));
        }
        debug!("Message payload is equal to control payload");
        Ok(())
    }
}
