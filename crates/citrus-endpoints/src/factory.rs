//! Creates endpoints from URIs.

use core::time::Duration;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use citrus_core::{Endpoint, EndpointFactory, Error, Result};

use crate::direct::{DirectEndpoint, DirectSyncEndpoint};
use crate::http::{HttpClientConfig, HttpClientEndpoint};
use crate::queue::MessageQueue;

/// URI scheme of one-way in-memory endpoints.
pub const DIRECT_SCHEME: &str = "direct:";
/// URI scheme of request/reply in-memory endpoints.
pub const DIRECT_SYNC_SCHEME: &str = "direct-sync:";

/// Builds endpoints for `direct:<queue>`, `direct-sync:<queue>` and
/// `http(s)://...` URIs.
///
/// Direct endpoints with the same queue name share one queue. A `timeout`
/// option in milliseconds may follow the URI: `direct:orders?timeout=500`.
#[derive(Debug, Default)]
pub struct DefaultEndpointFactory {
    queues: Mutex<IndexMap<String, Arc<MessageQueue>>>,
    default_timeout: Option<Duration>,
}

impl DefaultEndpointFactory {
    /// Factory without queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout given to direct endpoints whose URI sets none.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Timeout given to direct endpoints whose URI sets none.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Queue named `name`, created on first use.
    pub fn queue(&self, name: &str) -> Arc<MessageQueue> {
        let mut queues = self.queues.lock();
        Arc::clone(queues.entry(name.to_owned()).or_insert_with(|| {
            debug!("Creating message queue '{name}'");
            Arc::new(MessageQueue::new(name))
        }))
    }

    /// Names of all queues created so far.
    pub fn queue_names(&self) -> Vec<String> {
        self.queues.lock().keys().cloned().collect()
    }
}

/// Splits `target?timeout=500` into the target and the timeout option.
fn split_options(uri: &str) -> Result<(&str, Option<Duration>)> {
    let Some((target, options)) = uri.split_once('?') else {
        return Ok((uri, None));
    };

    let mut timeout = None;
    for option in options.split('&') {
        match option.split_once('=') {
            Some(("timeout", millis)) => {
                let millis: u64 = millis.parse().map_err(|_| {
                    Error::Endpoint(format!("Invalid timeout '{millis}' in endpoint uri '{uri}'"))
                })?;
                timeout = Some(Duration::from_millis(millis));
            }
            _ => {
                return Err(Error::Endpoint(format!(
                    "Unsupported option '{option}' in endpoint uri '{uri}'"
                )));
            }
        }
    }
    Ok((target, timeout))
}

impl EndpointFactory for DefaultEndpointFactory {
    fn create(&self, uri: &str) -> Result<Arc<dyn Endpoint>> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            debug!("Creating HTTP client endpoint for '{uri}'");
            return Ok(Arc::new(HttpClientEndpoint::new(uri, HttpClientConfig::new(uri))));
        }

        let (target, timeout) = split_options(uri)?;
        let timeout = timeout.or(self.default_timeout);
        if let Some(queue) = target.strip_prefix(DIRECT_SYNC_SCHEME) {
            let mut endpoint = DirectSyncEndpoint::new(uri, self.queue(queue));
            if let Some(timeout) = timeout {
                endpoint = endpoint.with_timeout(timeout);
            }
            return Ok(Arc::new(endpoint));
        }
        if let Some(queue) = target.strip_prefix(DIRECT_SCHEME) {
            let mut endpoint = DirectEndpoint::new(uri, self.queue(queue));
            if let Some(timeout) = timeout {
                endpoint = endpoint.with_timeout(timeout);
            }
            return Ok(Arc::new(endpoint));
        }

        Err(Error::Endpoint(format!(
            "Unable to create endpoint for uri '{uri}' - unsupported scheme"
        )))
    }
}

#[cfg(test)]
mod tests {
    use citrus_core::{EndpointRegistry, Message, TestContext};

    use super::*;

    #[tokio::test]
    async fn test_direct_endpoints_share_queues() {
        let factory = DefaultEndpointFactory::new();
        let producer = factory.create("direct:orders").unwrap();
        let consumer = factory.create("direct:orders?timeout=250").unwrap();
        assert_eq!(consumer.timeout(), Duration::from_millis(250));
        assert_eq!(factory.queue_names(), vec!["orders".to_owned()]);

        let context = TestContext::default();
        producer.send(Message::new("order"), &context).await.unwrap();
        let received = consumer
            .receive(None, &context, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.payload_text(), "order");
    }

    #[test]
    fn test_create_by_scheme() {
        let factory = DefaultEndpointFactory::new();
        assert_eq!(factory.create("direct-sync:echo").unwrap().name(), "direct-sync:echo");
        assert_eq!(
            factory.create("http://localhost:8080").unwrap().name(),
            "http://localhost:8080"
        );
        assert!(factory.create("jms:queue").is_err());
        assert!(factory.create("direct:orders?timeout=abc").is_err());
        assert!(factory.create("direct:orders?retries=3").is_err());
    }

    #[test]
    fn test_default_timeout_applies_without_option() {
        let factory = DefaultEndpointFactory::new().with_default_timeout(Duration::from_millis(750));
        assert_eq!(factory.create("direct:a").unwrap().timeout(), Duration::from_millis(750));
        assert_eq!(
            factory.create("direct-sync:b?timeout=20").unwrap().timeout(),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_registry_caches_created_endpoints() {
        let registry = EndpointRegistry::new().with_factory(Arc::new(DefaultEndpointFactory::new()));
        let first = registry.resolve("direct:cache").unwrap();
        let second = registry.resolve("direct:cache").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
