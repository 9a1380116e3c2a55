//! Endpoint abstraction used by send and receive actions.

use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::message::{Message, MessageSelector};
use crate::settings::DEFAULT_RECEIVE_TIMEOUT;

/// A channel messages are sent to and received from.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Name the endpoint is registered under.
    fn name(&self) -> &str;

    /// Receive timeout used when an action does not set one.
    fn timeout(&self) -> Duration {
        DEFAULT_RECEIVE_TIMEOUT
    }

    /// Sends a message.
    ///
    /// # Errors
    /// Returns `Error::Endpoint` if the message cannot be delivered.
    async fn send(&self, message: Message, context: &TestContext) -> Result<()>;

    /// Waits up to `timeout` for a message matching `selector`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    ///
    /// # Errors
    /// Returns `Error::Endpoint` for transport failures.
    async fn receive(
        &self,
        selector: Option<&MessageSelector>,
        context: &TestContext,
        timeout: Duration,
    ) -> Result<Option<Message>>;

    /// Drops pending messages matching `selector`, returning how many were dropped.
    ///
    /// # Errors
    /// Returns `Error::Endpoint` if the endpoint cannot be purged.
    async fn purge(
        &self,
        _selector: Option<&MessageSelector>,
        _context: &TestContext,
    ) -> Result<usize> {
        Ok(0)
    }
}

/// Creates endpoints from URIs such as `direct:orders`.
pub trait EndpointFactory: Send + Sync {
    /// Creates the endpoint for `uri`.
    ///
    /// # Errors
    /// Returns `Error::Endpoint` for unsupported URIs.
    fn create(&self, uri: &str) -> Result<Arc<dyn Endpoint>>;
}

/// Named endpoints shared by all tests of a run.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<IndexMap<String, Arc<dyn Endpoint>>>,
    factory: RwLock<Option<Arc<dyn EndpointFactory>>>,
}

impl EndpointRegistry {
    /// Registry without endpoints or factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the factory used for unknown names.
    #[must_use]
    pub fn with_factory(self, factory: Arc<dyn EndpointFactory>) -> Self {
        self.set_factory(factory);
        self
    }

    /// Replaces the factory used for unknown names.
    pub fn set_factory(&self, factory: Arc<dyn EndpointFactory>) {
        *self.factory.write() = Some(factory);
    }

    /// Registers an endpoint under its own name.
    pub fn register(&self, endpoint: Arc<dyn Endpoint>) {
        let name = endpoint.name().to_owned();
        self.register_as(name, endpoint);
    }

    /// Registers an endpoint under `name`, replacing any previous one.
    pub fn register_as(&self, name: impl Into<String>, endpoint: Arc<dyn Endpoint>) {
        let name = name.into();
        debug!("Registering endpoint '{name}'");
        self.endpoints.write().insert(name, endpoint);
    }

    /// Endpoint registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Endpoint>> {
        self.endpoints.read().get(name).cloned()
    }

    /// Names of all registered endpoints.
    pub fn names(&self) -> Vec<String> {
        self.endpoints.read().keys().cloned().collect()
    }

    /// Looks up an endpoint by name, or creates and caches it from a URI.
    ///
    /// # Errors
    /// Returns `Error::Endpoint` if the name is unknown and no factory can create it.
    pub fn resolve(&self, name_or_uri: &str) -> Result<Arc<dyn Endpoint>> {
        if let Some(endpoint) = self.get(name_or_uri) {
            return Ok(endpoint);
        }

        let factory = self
            .factory
            .read()
            .clone()
            .ok_or_else(|| Error::Endpoint(format!("Unknown endpoint '{name_or_uri}'")))?;
        let endpoint = factory.create(name_or_uri)?;

        let mut endpoints = self.endpoints.write();
        let cached = endpoints.entry(name_or_uri.to_owned()).or_insert(endpoint);
        Ok(Arc::clone(cached))
    }
}
