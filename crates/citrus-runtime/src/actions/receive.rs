//! Receive message action.

use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, info};

use citrus_core::extract::extract_variables;
use citrus_core::settings::DEFAULT_MESSAGE_TYPE;
use citrus_core::{
    Error, Message, MessageSelector, MessageStore, MessageType, MessageValidator, Result,
    TestContext, ValidationContext, VariableExtractor,
};

use crate::action::TestAction;
use crate::actions::message::MessageTemplate;

/// Message selector of a receive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorSource {
    /// Selector expression such as `operation = 'greet'`.
    Expression(String),
    /// Header name to expected value.
    Elements(IndexMap<String, String>),
}

/// Receives a message from an endpoint and validates it against a control message.
#[derive(Debug, Clone)]
pub struct ReceiveMessageAction {
    endpoint: String,
    message: MessageTemplate,
    selector: Option<SelectorSource>,
    timeout: Option<Duration>,
    validation_contexts: Vec<ValidationContext>,
    validators: Vec<String>,
    header_validators: Vec<String>,
    extractors: Vec<VariableExtractor>,
}

impl ReceiveMessageAction {
    /// Receives from `endpoint` and validates against `message`.
    pub fn new(endpoint: impl Into<String>, message: MessageTemplate) -> Self {
        Self {
            endpoint: endpoint.into(),
            message,
            selector: None,
            timeout: None,
            validation_contexts: Vec::new(),
            validators: Vec::new(),
            header_validators: Vec::new(),
            extractors: Vec::new(),
        }
    }

    /// Only accepts messages matching the selector.
    #[must_use]
    pub fn with_selector(mut self, selector: SelectorSource) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Overrides the endpoint receive timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a validation context.
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationContext) -> Self {
        self.validation_contexts.push(validation);
        self
    }

    /// Uses the named validator instead of the registry lookup by message type.
    #[must_use]
    pub fn with_validator(mut self, name: impl Into<String>) -> Self {
        self.validators.push(name.into());
        self
    }

    /// Uses the named header validator instead of the default one.
    #[must_use]
    pub fn with_header_validator(mut self, name: impl Into<String>) -> Self {
        self.header_validators.push(name.into());
        self
    }

    /// Extracts a variable from the received message.
    #[must_use]
    pub fn with_extractor(mut self, extractor: VariableExtractor) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Endpoint name or URI.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn selector(&self, context: &TestContext) -> Result<Option<MessageSelector>> {
        match &self.selector {
            None => Ok(None),
            Some(SelectorSource::Expression(expression)) => {
                MessageSelector::parse(&context.replace_dynamic_content(expression)?).map(Some)
            }
            Some(SelectorSource::Elements(elements)) => Ok(Some(MessageSelector::from_map(
                context.resolve_dynamic_values_in_map(elements)?,
            ))),
        }
    }

    fn message_type(&self) -> Result<MessageType> {
        self.message
            .message_type()
            .map_or_else(|| DEFAULT_MESSAGE_TYPE.parse(), Ok)
    }

    fn validators(
        &self,
        received: &Message,
        context: &TestContext,
    ) -> Result<Vec<Arc<dyn MessageValidator>>> {
        let registry = context.validator_registry();
        let mut validators = if self.validators.is_empty() {
            let must_find = self
                .validation_contexts
                .iter()
                .any(ValidationContext::is_expression_context);
            registry.find_message_validators(self.message_type()?, received, must_find)?
        } else {
            self.validators
                .iter()
                .map(|name| registry.get_validator(name))
                .collect::<Result<Vec<_>>>()?
        };

        if !self.header_validators.is_empty() {
            validators.retain(|validator| !validator.is_header_validator());
            for name in &self.header_validators {
                validators.push(registry.get_validator(name)?);
            }
        } else if !validators.iter().any(|validator| validator.is_header_validator()) {
            validators.insert(0, registry.default_header_validator());
        }
        Ok(validators)
    }
}

#[async_trait]
impl TestAction for ReceiveMessageAction {
    fn name(&self) -> &str {
        "receive"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let endpoint_name = context.replace_dynamic_content(&self.endpoint)?;
        let endpoint = context.endpoint_registry().resolve(&endpoint_name)?;
        let selector = self.selector(context)?;
        let timeout = self.timeout.unwrap_or_else(|| endpoint.timeout());

        info!("Receiving message on endpoint '{}'", endpoint.name());
        let received = endpoint
            .receive(selector.as_ref(), context, timeout)
            .await?
            .ok_or_else(|| {
                Error::ActionTimeout(format!(
                    "Action timeout after {} milliseconds. Failed to receive message on endpoint: '{}'",
                    timeout.as_millis(),
                    endpoint.name()
                ))
            })?;
        debug!("Received message:\n{received}");

        extract_variables(&self.extractors, &received, context)?;

        let control = self.message.build_control(context).await?;
        let store_name = control.name().map_or_else(
            || MessageStore::construct_message_name(self.name(), endpoint.name()),
            str::to_owned,
        );
        context.message_store().store(store_name, received.clone());

        for validator in self.validators(&received, context)? {
            debug!("Validating message with '{}'", validator.name());
            validator.validate(&received, &control, context, &self.validation_contexts)?;
        }
        info!("Message validation successful: all values OK");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use citrus_core::{EndpointRegistry, TestContextFactory};
    use citrus_endpoints::DefaultEndpointFactory;
    use citrus_validation::{default_matcher_registry, default_validator_registry};

    use super::*;

    async fn context_with(messages: &[Message]) -> TestContext {
        let registry = EndpointRegistry::new().with_factory(Arc::new(DefaultEndpointFactory::new()));
        let context = TestContextFactory::new()
            .with_endpoint_registry(Arc::new(registry))
            .with_matcher_registry(default_matcher_registry())
            .with_validator_registry(default_validator_registry())
            .create_context();
        let endpoint = context.endpoint_registry().resolve("direct:inbox").unwrap();
        for message in messages {
            endpoint.send(message.clone(), &context).await.unwrap();
        }
        context
    }

    #[tokio::test]
    async fn test_receive_and_validate_json() {
        let context = context_with(&[Message::new(r#"{"id": 7, "status": "open"}"#)
            .with_header("operation", "status")])
        .await;

        ReceiveMessageAction::new(
            "direct:inbox",
            MessageTemplate::new()
                .with_body(r#"{"id": "@greaterThan(5)@", "status": "open"}"#)
                .with_header("operation", "status")
                .with_name("statusReply"),
        )
        .with_extractor(VariableExtractor::JsonPath {
            expression: "$.status".to_owned(),
            variable: "status".to_owned(),
        })
        .execute(&context)
        .await
        .unwrap();

        assert_eq!(context.get_variable("status").unwrap(), "open");
        assert!(context.message_store().get("statusReply").is_some());
    }

    #[tokio::test]
    async fn test_selector_picks_matching_message() {
        let context = context_with(&[
            Message::new("first").with_header("operation", "a"),
            Message::new("second").with_header("operation", "b"),
        ])
        .await;

        ReceiveMessageAction::new(
            "direct:inbox",
            MessageTemplate::new()
                .with_body("second")
                .with_type(MessageType::Plaintext),
        )
        .with_selector(SelectorSource::Expression("operation = 'b'".to_owned()))
        .execute(&context)
        .await
        .unwrap();

        let mut elements = IndexMap::new();
        elements.insert("operation".to_owned(), "a".to_owned());
        ReceiveMessageAction::new(
            "direct:inbox",
            MessageTemplate::new()
                .with_body("first")
                .with_type(MessageType::Plaintext),
        )
        .with_selector(SelectorSource::Elements(elements))
        .execute(&context)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_timeout_without_message() {
        let context = context_with(&[]).await;
        let error = ReceiveMessageAction::new("direct:inbox", MessageTemplate::new())
            .with_timeout(Duration::from_millis(10))
            .execute(&context)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::ActionTimeout(_)));
        assert!(error.to_string().contains("10 milliseconds"));
    }

    #[tokio::test]
    async fn test_header_mismatch_fails() {
        let context = context_with(&[Message::new("{}").with_header("operation", "a")]).await;
        let error = ReceiveMessageAction::new(
            "direct:inbox",
            MessageTemplate::new().with_header("operation", "b"),
        )
        .execute(&context)
        .await
        .unwrap_err();
        assert!(error.is_validation());
    }

    #[tokio::test]
    async fn test_json_path_validation() {
        let context = context_with(&[Message::new(r#"{"items": [1, 2, 3]}"#)]).await;
        let mut expressions = IndexMap::new();
        expressions.insert("$.items.length()".to_owned(), "3".to_owned());
        ReceiveMessageAction::new("direct:inbox", MessageTemplate::new())
            .with_validation(ValidationContext::JsonPath { expressions })
            .execute(&context)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_named_validator() {
        let context = context_with(&[Message::new("text")]).await;
        let result = ReceiveMessageAction::new("direct:inbox", MessageTemplate::new().with_body("text"))
            .with_validator("noSuchValidator")
            .execute(&context)
            .await;
        assert!(result.is_err());
    }
}
