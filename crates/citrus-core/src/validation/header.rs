use tracing::debug;

use super::{MessageValidator, ValidationContext};
use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::matcher::expression::{is_validation_matcher_expression, resolve_validation_matcher};
use crate::message::{Message, MessageType, headers};
use crate::settings::IGNORE_PLACEHOLDER;

/// Checks every non internal control header against the received headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessageHeaderValidator;

impl DefaultMessageHeaderValidator {
    /// Registry name.
    pub const NAME: &'static str = "defaultMessageHeaderValidator";
}

impl MessageValidator for DefaultMessageHeaderValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_message_type(&self, _message_type: MessageType, _message: &Message) -> bool {
        true
    }

    fn is_header_validator(&self) -> bool {
        true
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        contexts: &[ValidationContext],
    ) -> Result<()> {
        let ignore_case = contexts.iter().any(|validation| {
            matches!(validation, ValidationContext::Header { ignore_case: true })
        });

        let control_headers: Vec<_> = control
            .headers()
            .iter()
            .filter(|(name, _)| !headers::is_internal(name))
            .collect();
        if control_headers.is_empty() {
            return Ok(());
        }
        debug!("Start message header validation");

        for (name, expected) in control_headers {
            let name = context.replace_dynamic_content(name)?;
            let actual = if ignore_case {
                received.header_ignore_case(&name)
            } else {
                received.header(&name)
            };
            let Some(actual) = actual else {
                return Err(Error::validation(format!(
                    "Header element '{name}' is missing"
                )));
            };

            if expected == IGNORE_PLACEHOLDER {
                debug!("Ignoring header element '{name}'");
                continue;
            }

            if is_validation_matcher_expression(expected) {
                resolve_validation_matcher(&name, Some(&*actual), expected, context)?;
            } else {
                let expected = context.replace_dynamic_content(expected)?;
                if actual != expected {
                    return Err(Error::validation(format!(
                        "Values not equal for header element '{name}', expected '{expected}' but was '{actual}'"
                    )));
                }
            }
            debug!("Validating header element: {name}='{actual}': OK");
        }

        debug!("Message header validation successful: All values OK");
        Ok(())
    }
}
