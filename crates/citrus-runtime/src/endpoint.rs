//! Endpoints declared by a test.

use core::time::Duration;
use std::sync::Arc;

use citrus_core::Endpoint;
use citrus_endpoints::{
    DefaultEndpointFactory, DirectEndpoint, DirectSyncEndpoint, HttpClientConfig,
    HttpClientEndpoint,
};

/// Endpoint a test registers under its own name before it runs.
///
/// Direct endpoints share their queue with every other endpoint of the
/// same factory using that queue name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointDefinition {
    /// One-way in-memory endpoint.
    Direct {
        /// Endpoint name.
        name: String,
        /// Queue name.
        queue: String,
        /// Receive timeout.
        timeout: Option<Duration>,
    },
    /// Request/reply in-memory endpoint.
    DirectSync {
        /// Endpoint name.
        name: String,
        /// Queue name.
        queue: String,
        /// Reply and receive timeout.
        timeout: Option<Duration>,
    },
    /// HTTP client.
    HttpClient {
        /// Endpoint name.
        name: String,
        /// Client settings.
        config: HttpClientConfig,
    },
}

impl EndpointDefinition {
    /// Endpoint name.
    pub fn name(&self) -> &str {
        match self {
            Self::Direct { name, .. } | Self::DirectSync { name, .. } | Self::HttpClient { name, .. } => {
                name
            }
        }
    }

    /// Builds the endpoint, taking queues and the default timeout from `factory`.
    pub fn build(&self, factory: &DefaultEndpointFactory) -> Arc<dyn Endpoint> {
        match self {
            Self::Direct {
                name,
                queue,
                timeout,
            } => {
                let mut endpoint = DirectEndpoint::new(name.as_str(), factory.queue(queue));
                if let Some(timeout) = timeout.or(factory.default_timeout()) {
                    endpoint = endpoint.with_timeout(timeout);
                }
                Arc::new(endpoint)
            }
            Self::DirectSync {
                name,
                queue,
                timeout,
            } => {
                let mut endpoint = DirectSyncEndpoint::new(name.as_str(), factory.queue(queue));
                if let Some(timeout) = timeout.or(factory.default_timeout()) {
                    endpoint = endpoint.with_timeout(timeout);
                }
                Arc::new(endpoint)
            }
            Self::HttpClient { name, config } => {
                Arc::new(HttpClientEndpoint::new(name.as_str(), config.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use citrus_core::{EndpointFactory as _, Message, TestContext};

    use super::*;

    #[tokio::test]
    async fn test_declared_direct_endpoint_shares_factory_queue() {
        let factory = DefaultEndpointFactory::new();
        let definition = EndpointDefinition::Direct {
            name: "orderQueue".to_owned(),
            queue: "orders".to_owned(),
            timeout: Some(Duration::from_millis(200)),
        };
        let endpoint = definition.build(&factory);
        assert_eq!(endpoint.name(), "orderQueue");
        assert_eq!(endpoint.timeout(), Duration::from_millis(200));

        let context = TestContext::default();
        factory
            .create("direct:orders")
            .unwrap()
            .send(Message::new("hello"), &context)
            .await
            .unwrap();
        let received = endpoint
            .receive(None, &context, Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.payload_text(), "hello");
    }

    #[test]
    fn test_http_definition() {
        let definition = EndpointDefinition::HttpClient {
            name: "api".to_owned(),
            config: HttpClientConfig::new("http://localhost:8080"),
        };
        assert_eq!(definition.name(), "api");
        assert_eq!(definition.build(&DefaultEndpointFactory::new()).name(), "api");
    }
}
