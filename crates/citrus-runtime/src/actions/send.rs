//! Send message action.

use async_trait::async_trait;
use tracing::{info, warn};

use citrus_core::extract::extract_variables;
use citrus_core::{MessageStore, Result, TestContext, VariableExtractor};

use crate::actions::message::MessageTemplate;
use crate::action::TestAction;

/// Builds a message and sends it to an endpoint.
///
/// The endpoint is looked up by name or created from its URI. A forked send
/// runs on its own task; the test waits for it before finishing and records
/// its failure.
#[derive(Debug, Clone)]
pub struct SendMessageAction {
    endpoint: String,
    message: MessageTemplate,
    extractors: Vec<VariableExtractor>,
    fork: bool,
}

impl SendMessageAction {
    /// Sends `message` to `endpoint`.
    pub fn new(endpoint: impl Into<String>, message: MessageTemplate) -> Self {
        Self {
            endpoint: endpoint.into(),
            message,
            extractors: Vec::new(),
            fork: false,
        }
    }

    /// Extracts a variable from the outgoing message.
    #[must_use]
    pub fn with_extractor(mut self, extractor: VariableExtractor) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Sends on a separate task.
    #[must_use]
    pub fn with_fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    /// Endpoint name or URI.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Message definition.
    pub fn message(&self) -> &MessageTemplate {
        &self.message
    }
}

#[async_trait]
impl TestAction for SendMessageAction {
    fn name(&self) -> &str {
        "send"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let endpoint_name = context.replace_dynamic_content(&self.endpoint)?;
        let endpoint = context.endpoint_registry().resolve(&endpoint_name)?;

        let message = self.message.build(context).await?;
        extract_variables(&self.extractors, &message, context)?;

        let store_name = message.name().map_or_else(
            || MessageStore::construct_message_name(self.name(), endpoint.name()),
            str::to_owned,
        );
        context.message_store().store(store_name, message.clone());

        if !self.fork {
            info!("Sending message to endpoint '{}'", endpoint.name());
            return endpoint.send(message, context).await;
        }

        info!("Forking message send to endpoint '{}'", endpoint.name());
        let task_context = context.clone();
        let handle = tokio::spawn(async move {
            if let Err(error) = endpoint.send(message, &task_context).await {
                warn!("Forked send to endpoint '{}' failed", endpoint.name());
                task_context.add_exception(error);
            }
        });
        context.register_async(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::sync::Arc;

    use citrus_core::{EndpointRegistry, Error, TestContextFactory};
    use citrus_endpoints::DefaultEndpointFactory;

    use super::*;

    fn context() -> TestContext {
        let registry = EndpointRegistry::new().with_factory(Arc::new(DefaultEndpointFactory::new()));
        TestContextFactory::new()
            .with_endpoint_registry(Arc::new(registry))
            .with_global_variable("user", "Citrus")
            .create_context()
    }

    #[tokio::test]
    async fn test_send_stores_and_delivers() {
        let context = context();
        let action = SendMessageAction::new(
            "direct:greetings",
            MessageTemplate::new()
                .with_body("Hello ${user}")
                .with_header("operation", "greet"),
        )
        .with_extractor(VariableExtractor::Header {
            header: "operation".to_owned(),
            variable: "op".to_owned(),
        });
        action.execute(&context).await.unwrap();

        assert_eq!(context.get_variable("op").unwrap(), "greet");
        let stored = context.message_store().get("send(direct:greetings)").unwrap();
        assert_eq!(stored.payload_text(), "Hello Citrus");

        let endpoint = context.endpoint_registry().resolve("direct:greetings").unwrap();
        let received = endpoint
            .receive(None, &context, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.payload_text(), "Hello Citrus");
    }

    #[tokio::test]
    async fn test_named_message_is_stored_by_name() {
        let context = context();
        SendMessageAction::new("direct:named", MessageTemplate::new().with_body("x").with_name("request"))
            .execute(&context)
            .await
            .unwrap();
        assert!(context.message_store().get("request").is_some());
    }

    #[tokio::test]
    async fn test_forked_send_failure_is_recorded() {
        let context = context();
        SendMessageAction::new(
            "direct-sync:nobody?timeout=10",
            MessageTemplate::new().with_body("ping"),
        )
        .with_fork(true)
        .execute(&context)
        .await
        .unwrap();

        for handle in context.drain_async() {
            handle.await.unwrap();
        }
        assert!(matches!(context.first_exception(), Some(Error::ActionTimeout(_))));
    }

    #[tokio::test]
    async fn test_unknown_endpoint_fails() {
        let error = SendMessageAction::new("jms:queue", MessageTemplate::new())
            .execute(&context())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Endpoint(_)));
    }
}
