use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{
    DefaultEmptyMessageValidator, DefaultMessageHeaderValidator, DefaultTextEqualsMessageValidator,
    MessageValidator,
};
use crate::error::{Error, Result};
use crate::message::{Message, MessageType};

/// Message validators by name, with lookup by message type.
#[derive(Clone)]
pub struct MessageValidatorRegistry {
    validators: IndexMap<String, Arc<dyn MessageValidator>>,
    empty_validator: Arc<dyn MessageValidator>,
    text_equals_validator: Arc<dyn MessageValidator>,
    header_validator: Arc<dyn MessageValidator>,
}

impl MessageValidatorRegistry {
    /// Registry holding only the default header validator.
    pub fn new() -> Self {
        let header_validator: Arc<dyn MessageValidator> = Arc::new(DefaultMessageHeaderValidator);
        let mut validators = IndexMap::new();
        validators.insert(
            DefaultMessageHeaderValidator::NAME.to_owned(),
            Arc::clone(&header_validator),
        );

        Self {
            validators,
            empty_validator: Arc::new(DefaultEmptyMessageValidator),
            text_equals_validator: Arc::new(DefaultTextEqualsMessageValidator),
            header_validator,
        }
    }

    /// Adds a validator under its own name.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn MessageValidator>) -> Self {
        let name = validator.name().to_owned();
        self.add_validator(name, validator);
        self
    }

    /// Adds a validator under `name`, replacing an existing one.
    pub fn add_validator(&mut self, name: impl Into<String>, validator: Arc<dyn MessageValidator>) {
        let name = name.into();
        if self.validators.contains_key(&name) {
            debug!("Overwriting message validator '{name}' in registry");
        }
        self.validators.insert(name, validator);
    }

    /// Validator registered under `name`.
    pub fn find_validator(&self, name: &str) -> Option<Arc<dyn MessageValidator>> {
        self.validators.get(name).cloned()
    }

    /// Validator registered under `name`.
    ///
    /// # Errors
    /// Returns `Error::Runtime` if no such validator is registered.
    pub fn get_validator(&self, name: &str) -> Result<Arc<dyn MessageValidator>> {
        self.find_validator(name).ok_or_else(|| {
            Error::runtime(format!(
                "Unable to find message validator with name '{name}'"
            ))
        })
    }

    /// Names of all registered validators.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// The default header validator.
    pub fn default_header_validator(&self) -> Arc<dyn MessageValidator> {
        Arc::clone(&self.header_validator)
    }

    /// Finds the validators for `message` declared as `message_type`.
    ///
    /// When only header validators support the declared type, the type is
    /// guessed from the payload and the lookup repeated. Empty payloads fall
    /// back to the empty message validator. Without a match the text equals
    /// validator is used, unless `must_find` is set.
    ///
    /// # Errors
    /// Returns `Error::Runtime` when `must_find` is set and no payload
    /// validator applies.
    pub fn find_message_validators(
        &self,
        message_type: MessageType,
        message: &Message,
        must_find: bool,
    ) -> Result<Vec<Arc<dyn MessageValidator>>> {
        let mut found = self.supporting(message_type, message);

        if only_header_validators(&found) && !message.payload().is_empty() {
            let guessed = MessageType::guess(&message.payload_text());
            if guessed != message_type {
                debug!(
                    "No payload validator for message type {message_type}, using guessed type {guessed}"
                );
                found = self.supporting(guessed, message);
            }
        }

        if only_header_validators(&found) && message.payload().is_empty() {
            found.push(Arc::clone(&self.empty_validator));
        }

        if only_header_validators(&found) {
            if must_find {
                warn!(
                    "Unable to find proper message validator. Message type is '{message_type}' and message payload is '{}'",
                    message.payload_text()
                );
                return Err(Error::runtime(
                    "Failed to find proper message validator for message",
                ));
            }
            warn!(
                "Unable to find proper message validator for message type '{message_type}', using default text equals validator"
            );
            found.push(Arc::clone(&self.text_equals_validator));
        }

        Ok(found)
    }

    fn supporting(&self, message_type: MessageType, message: &Message) -> Vec<Arc<dyn MessageValidator>> {
        self.validators
            .values()
            .filter(|validator| validator.supports_message_type(message_type, message))
            .cloned()
            .collect()
    }
}

impl Default for MessageValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn only_header_validators(validators: &[Arc<dyn MessageValidator>]) -> bool {
    validators
        .iter()
        .all(|validator| validator.is_header_validator())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;
    use crate::validation::ValidationContext;

    struct JsonOnly;

    impl MessageValidator for JsonOnly {
        fn name(&self) -> &str {
            "jsonOnly"
        }

        fn supports_message_type(&self, message_type: MessageType, _message: &Message) -> bool {
            message_type == MessageType::Json
        }

        fn validate(
            &self,
            _received: &Message,
            _control: &Message,
            _context: &TestContext,
            _contexts: &[ValidationContext],
        ) -> Result<()> {
            Ok(())
        }
    }

    fn names(validators: &[Arc<dyn MessageValidator>]) -> Vec<&str> {
        validators.iter().map(|validator| validator.name()).collect()
    }

    #[test]
    fn test_default_registry() {
        let registry = MessageValidatorRegistry::new();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["defaultMessageHeaderValidator"]);
        assert!(registry.get_validator("unknown").is_err());
        assert!(registry.default_header_validator().is_header_validator());
    }

    #[test]
    fn test_find_by_declared_type() {
        let registry = MessageValidatorRegistry::new().with_validator(Arc::new(JsonOnly));
        let found = registry
            .find_message_validators(MessageType::Json, &Message::new("{}"), true)
            .unwrap();
        assert_eq!(names(&found), vec!["defaultMessageHeaderValidator", "jsonOnly"]);
    }

    #[test]
    fn test_find_by_guessed_type() {
        let registry = MessageValidatorRegistry::new().with_validator(Arc::new(JsonOnly));
        let found = registry
            .find_message_validators(MessageType::Xml, &Message::new(r#"{"a": 1}"#), true)
            .unwrap();
        assert_eq!(names(&found), vec!["defaultMessageHeaderValidator", "jsonOnly"]);
    }

    #[test]
    fn test_empty_payload_uses_empty_validator() {
        let registry = MessageValidatorRegistry::new();
        let found = registry
            .find_message_validators(MessageType::Plaintext, &Message::empty(), true)
            .unwrap();
        assert_eq!(
            names(&found),
            vec!["defaultMessageHeaderValidator", "defaultEmptyMessageValidator"]
        );
    }

    #[test]
    fn test_fallback_and_must_find() {
        let registry = MessageValidatorRegistry::new();
        let found = registry
            .find_message_validators(MessageType::Plaintext, &Message::new("text"), false)
            .unwrap();
        assert_eq!(
            names(&found),
            vec!["defaultMessageHeaderValidator", "defaultTextEqualsMessageValidator"]
        );

        let error = registry
            .find_message_validators(MessageType::Plaintext, &Message::new("text"), true)
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Failed to find proper message validator for message"
        );
    }

    #[test]
    fn test_add_validator_overwrites() {
        let mut registry = MessageValidatorRegistry::new();
        registry.add_validator("custom", Arc::new(JsonOnly));
        registry.add_validator("custom", Arc::new(DefaultTextEqualsMessageValidator));
        assert_eq!(
            registry.get_validator("custom").unwrap().name(),
            "defaultTextEqualsMessageValidator"
        );
    }
}
