use tracing::debug;

use super::{MessageValidator, ValidationContext};
use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::message::{Message, MessageType};

/// Expects both the control and the received payload to be empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEmptyMessageValidator;

impl DefaultEmptyMessageValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultEmptyMessageValidator";
}

impl MessageValidator for DefaultEmptyMessageValidator {
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
        _context: &TestContext,
        _contexts: &[ValidationContext],
    ) -> Result<()> {
        if !control.payload().is_empty() {
            return Err(Error::validation(
                "Empty message validation failed - control message is not empty",
            ));
        }

        debug!("Start to verify empty message payload");
        if !received.payload().is_empty() {
            return Err(Error::validation(format!(
                "Received message content is not empty: '{}'",
                received.payload_text()
            )));
        }
        debug!("Message payload is empty as expected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_validation() {
        let context = TestContext::default();
        let validator = DefaultEmptyMessageValidator;

        assert!(
            validator
                .validate(&Message::empty(), &Message::new("  "), &context, &[])
                .is_ok()
        );
        assert!(
            validator
                .validate(&Message::new("data"), &Message::empty(), &context, &[])
                .is_err()
        );
        assert!(
            validator
                .validate(&Message::empty(), &Message::new("data"), &context, &[])
                .is_err()
        );
    }
}
