//! In-memory endpoints over named message queues.

use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info};

use citrus_core::settings::DEFAULT_RECEIVE_TIMEOUT;
use citrus_core::{Endpoint, Error, Message, MessageSelector, Result, TestContext};

use crate::correlation::{ReplyStore, correlation_key, new_correlation_key};
use crate::queue::MessageQueue;

/// One-way endpoint: `send` pushes to the queue, `receive` pops from it.
#[derive(Debug)]
pub struct DirectEndpoint {
    name: String,
    queue: Arc<MessageQueue>,
    timeout: Duration,
}

impl DirectEndpoint {
    /// Endpoint over `queue`.
    pub fn new(name: impl Into<String>, queue: Arc<MessageQueue>) -> Self {
        Self {
            name: name.into(),
            queue,
            timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    /// Sets the default receive timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The backing queue.
    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }
}

#[async_trait]
impl Endpoint for DirectEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, message: Message, _context: &TestContext) -> Result<()> {
        info!("Sending message to queue '{}'", self.queue.name());
        self.queue.push(message);
        Ok(())
    }

    async fn receive(
        &self,
        selector: Option<&MessageSelector>,
        context: &TestContext,
        timeout: Duration,
    ) -> Result<Option<Message>> {
        debug!("Receiving message from queue '{}'", self.queue.name());
        Ok(self.queue.pop(selector, context, timeout).await)
    }

    async fn purge(&self, selector: Option<&MessageSelector>, context: &TestContext) -> Result<usize> {
        Ok(self.queue.purge(selector, context))
    }
}

/// Side a synchronous endpoint plays in a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Sends requests and receives their replies.
    Client,
    /// Receives requests and sends replies.
    Server,
}

/// Request/reply endpoint over a queue.
///
/// The role is fixed at construction or taken from the first operation:
/// a first `send` makes the endpoint a client, a first `receive` a server.
#[derive(Debug)]
pub struct DirectSyncEndpoint {
    name: String,
    queue: Arc<MessageQueue>,
    timeout: Duration,
    role: Mutex<Option<SyncRole>>,
    replies: ReplyStore,
    reply_channels: Mutex<Vec<(String, oneshot::Sender<Message>)>>,
}

impl DirectSyncEndpoint {
    /// Endpoint over `queue` whose role is decided by first use.
    pub fn new(name: impl Into<String>, queue: Arc<MessageQueue>) -> Self {
        Self {
            name: name.into(),
            queue,
            timeout: DEFAULT_RECEIVE_TIMEOUT,
            role: Mutex::new(None),
            replies: ReplyStore::new(),
            reply_channels: Mutex::new(Vec::new()),
        }
    }

    /// Fixes the role.
    #[must_use]
    pub fn with_role(self, role: SyncRole) -> Self {
        *self.role.lock() = Some(role);
        self
    }

    /// Sets the reply and receive timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current role, if decided.
    pub fn role(&self) -> Option<SyncRole> {
        *self.role.lock()
    }

    fn role_or(&self, first_use: SyncRole) -> SyncRole {
        *self.role.lock().get_or_insert(first_use)
    }

    async fn send_request(&self, message: Message, context: &TestContext) -> Result<()> {
        let key = new_correlation_key(&self.name, context)?;
        let (reply_to, reply) = oneshot::channel();
        info!("Sending synchronous request to queue '{}'", self.queue.name());
        self.queue.push_with_reply(message, reply_to);

        match timeout(self.timeout, reply).await {
            Ok(Ok(reply)) => {
                debug!("Received synchronous reply on '{}'", self.name);
                self.replies.store(key, reply);
                Ok(())
            }
            Ok(Err(_)) => Err(Error::Endpoint(format!(
                "Reply channel of endpoint '{}' closed without a reply",
                self.name
            ))),
            Err(_) => Err(Error::ActionTimeout(format!(
                "Action timeout after {} milliseconds. Failed to receive synchronous reply on endpoint '{}'",
                self.timeout.as_millis(),
                self.name
            ))),
        }
    }

    fn send_reply(&self, message: Message, context: &TestContext) -> Result<()> {
        let key = correlation_key(&self.name, context)?;
        let reply_to = {
            let mut channels = self.reply_channels.lock();
            let position = channels
                .iter()
                .position(|(candidate, _)| *candidate == key)
                .ok_or_else(|| {
                    Error::Endpoint(format!(
                        "Unable to find reply channel for message correlation key '{key}'"
                    ))
                })?;
            channels.remove(position).1
        };
        info!("Sending synchronous reply on '{}'", self.name);
        reply_to.send(message).map_err(|_| {
            Error::Endpoint(format!(
                "Requestor of endpoint '{}' stopped waiting for the reply",
                self.name
            ))
        })
    }
}

#[async_trait]
impl Endpoint for DirectSyncEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, message: Message, context: &TestContext) -> Result<()> {
        match self.role_or(SyncRole::Client) {
            SyncRole::Client => self.send_request(message, context).await,
            SyncRole::Server => self.send_reply(message, context),
        }
    }

    async fn receive(
        &self,
        selector: Option<&MessageSelector>,
        context: &TestContext,
        timeout: Duration,
    ) -> Result<Option<Message>> {
        match self.role_or(SyncRole::Server) {
            SyncRole::Client => {
                let key = correlation_key(&self.name, context)?;
                Ok(self.replies.take(&key, timeout).await)
            }
            SyncRole::Server => {
                let Some(entry) = self.queue.pop_entry(selector, context, timeout).await else {
                    return Ok(None);
                };
                if let Some(reply_to) = entry.reply_to {
                    let key = new_correlation_key(&self.name, context)?;
                    let mut channels = self.reply_channels.lock();
                    channels.retain(|(_, sender)| !sender.is_closed());
                    channels.push((key, reply_to));
                }
                Ok(Some(entry.message))
            }
        }
    }

    async fn purge(&self, selector: Option<&MessageSelector>, context: &TestContext) -> Result<usize> {
        Ok(self.queue.purge(selector, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_direct_send_receive() {
        let queue = Arc::new(MessageQueue::new("greetings"));
        let endpoint = DirectEndpoint::new("greetings", Arc::clone(&queue));
        let context = TestContext::default();

        endpoint.send(Message::new("Hello"), &context).await.unwrap();
        assert_eq!(queue.len(), 1);

        let message = endpoint
            .receive(None, &context, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.payload_text(), "Hello");
        assert!(
            endpoint
                .receive(None, &context, Duration::from_millis(5))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_sync_request_reply() {
        let queue = Arc::new(MessageQueue::new("echo"));
        let client = Arc::new(
            DirectSyncEndpoint::new("echoClient", Arc::clone(&queue))
                .with_timeout(Duration::from_secs(2)),
        );
        let server = Arc::new(DirectSyncEndpoint::new("echoServer", queue));
        let client_context = TestContext::default();
        let server_context = TestContext::default();

        let server_task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let request = server
                    .receive(None, &server_context, Duration::from_secs(2))
                    .await
                    .unwrap()
                    .unwrap();
                let reply = Message::new(format!("Echo: {}", request.payload_text()));
                server.send(reply, &server_context).await.unwrap();
            })
        };

        client.send(Message::new("ping"), &client_context).await.unwrap();
        server_task.await.unwrap();

        assert_eq!(client.role(), Some(SyncRole::Client));
        assert_eq!(server.role(), Some(SyncRole::Server));
        let reply = client
            .receive(None, &client_context, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.payload_text(), "Echo: ping");
    }

    #[tokio::test]
    async fn test_sync_client_times_out() {
        let queue = Arc::new(MessageQueue::new("silent"));
        let client = DirectSyncEndpoint::new("client", queue)
            .with_role(SyncRole::Client)
            .with_timeout(Duration::from_millis(10));

        let error = client
            .send(Message::new("ping"), &TestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::ActionTimeout(_)));
    }

    #[tokio::test]
    async fn test_timed_out_request_is_not_served() {
        let queue = Arc::new(MessageQueue::new("late"));
        let client = DirectSyncEndpoint::new("client", Arc::clone(&queue))
            .with_role(SyncRole::Client)
            .with_timeout(Duration::from_millis(10));
        let server = DirectSyncEndpoint::new("server", Arc::clone(&queue)).with_role(SyncRole::Server);

        client
            .send(Message::new("ping"), &TestContext::default())
            .await
            .unwrap_err();
        let request = server
            .receive(None, &TestContext::default(), Duration::from_millis(5))
            .await
            .unwrap();
        assert!(request.is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_reply_channels_are_pruned() {
        let queue = Arc::new(MessageQueue::new("pruned"));
        let server = DirectSyncEndpoint::new("server", Arc::clone(&queue)).with_role(SyncRole::Server);

        let (first_reply_to, first_reply) = oneshot::channel();
        queue.push_with_reply(Message::new("first"), first_reply_to);
        server
            .receive(None, &TestContext::default(), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(server.reply_channels.lock().len(), 1);

        drop(first_reply);
        let (second_reply_to, _second_reply) = oneshot::channel();
        queue.push_with_reply(Message::new("second"), second_reply_to);
        server
            .receive(None, &TestContext::default(), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(server.reply_channels.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_server_reply_without_request_fails() {
        let queue = Arc::new(MessageQueue::new("idle"));
        let server = DirectSyncEndpoint::new("server", queue).with_role(SyncRole::Server);
        let error = server
            .send(Message::new("pong"), &TestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Endpoint(_)));
    }
}
