//! Message validators and validation matchers for Citrus tests.
//!
//! Provides the default validation matcher library (including the Hamcrest
//! `assertThat` matcher) and the JSON, JSONPath, XML, XPath, YAML, plain
//! text and binary payload validators, plus helpers that build registries
//! holding them.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::assertions_on_result_states,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

/// Base64 comparison of binary payloads.
pub mod binary;
/// Structural JSON comparison.
pub mod json;
/// JSONPath element validation.
pub mod json_path;
/// The default validation matcher library.
pub mod matchers;
/// Plain text comparison.
pub mod plaintext;
/// Structural XML comparison.
pub mod xml;
/// XPath element validation.
pub mod xpath;
/// Structural YAML comparison.
pub mod yaml;

use std::sync::Arc;

use citrus_core::{MessageValidatorRegistry, ValidationMatcherRegistry};

pub use binary::BinaryBase64MessageValidator;
pub use citrus_core::validation::{
    DefaultEmptyMessageValidator, DefaultMessageHeaderValidator, DefaultTextEqualsMessageValidator,
};
pub use json::JsonTextMessageValidator;
pub use json_path::JsonPathMessageValidator;
pub use matchers::{DEFAULT_MATCHER_LIBRARY, HamcrestValidationMatcher, default_matcher_library};
pub use plaintext::PlainTextMessageValidator;
pub use xml::DomXmlMessageValidator;
pub use xpath::XpathMessageValidator;
pub use yaml::YamlMessageValidator;

/// Adds all default payload validators to `registry`.
pub fn register_default_validators(registry: &mut MessageValidatorRegistry) {
    registry.add_validator(JsonTextMessageValidator::NAME, Arc::new(JsonTextMessageValidator));
    registry.add_validator(JsonPathMessageValidator::NAME, Arc::new(JsonPathMessageValidator));
    registry.add_validator(DomXmlMessageValidator::NAME, Arc::new(DomXmlMessageValidator));
    registry.add_validator(XpathMessageValidator::NAME, Arc::new(XpathMessageValidator));
    registry.add_validator(YamlMessageValidator::NAME, Arc::new(YamlMessageValidator));
    registry.add_validator(PlainTextMessageValidator::NAME, Arc::new(PlainTextMessageValidator));
    registry.add_validator(
        BinaryBase64MessageValidator::NAME,
        Arc::new(BinaryBase64MessageValidator),
    );
}

/// Validator registry with the header validator and all default payload validators.
pub fn default_validator_registry() -> MessageValidatorRegistry {
    let mut registry = MessageValidatorRegistry::new();
    register_default_validators(&mut registry);
    registry
}

/// Matcher registry holding the default matcher library.
pub fn default_matcher_registry() -> ValidationMatcherRegistry {
    ValidationMatcherRegistry::new().with_library(default_matcher_library())
}

#[cfg(test)]
mod tests {
    use citrus_core::{Message, MessageType};

    use super::*;

    fn names(registry: &MessageValidatorRegistry, message_type: MessageType, message: &Message) -> Vec<String> {
        registry
            .find_message_validators(message_type, message, true)
            .unwrap()
            .iter()
            .map(|validator| validator.name().to_owned())
            .collect()
    }

    #[test]
    fn test_default_validator_lookup() {
        let registry = default_validator_registry();
        assert_eq!(
            names(&registry, MessageType::Json, &Message::new("{}")),
            vec![
                DefaultMessageHeaderValidator::NAME,
                JsonTextMessageValidator::NAME,
                JsonPathMessageValidator::NAME
            ]
        );
        assert_eq!(
            names(&registry, MessageType::Plaintext, &Message::new("text")),
            vec![DefaultMessageHeaderValidator::NAME, PlainTextMessageValidator::NAME]
        );
        assert_eq!(
            names(&registry, MessageType::Base64, &Message::new(vec![1_u8])),
            vec![DefaultMessageHeaderValidator::NAME, BinaryBase64MessageValidator::NAME]
        );
        assert_eq!(
            names(&registry, MessageType::Xml, &Message::new("<a/>")),
            vec![
                DefaultMessageHeaderValidator::NAME,
                DomXmlMessageValidator::NAME,
                XpathMessageValidator::NAME
            ]
        );
        assert_eq!(
            names(&registry, MessageType::Json, &Message::new("<a/>")),
            vec![
                DefaultMessageHeaderValidator::NAME,
                DomXmlMessageValidator::NAME,
                XpathMessageValidator::NAME
            ]
        );
        assert_eq!(
            names(&registry, MessageType::Yaml, &Message::new("a: 1")),
            vec![DefaultMessageHeaderValidator::NAME, YamlMessageValidator::NAME]
        );
        assert_eq!(
            names(&registry, MessageType::Xml, &Message::new(r#"{"a": 1}"#)),
            vec![
                DefaultMessageHeaderValidator::NAME,
                JsonTextMessageValidator::NAME,
                JsonPathMessageValidator::NAME
            ]
        );
    }

    #[test]
    fn test_default_matcher_registry() {
        let registry = default_matcher_registry();
        let library = registry.library_for_prefix("").unwrap();
        assert_eq!(library.name(), DEFAULT_MATCHER_LIBRARY);
    }
}
