//! Selective in-memory message queue backing the direct endpoints.

use core::time::Duration;
use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use citrus_core::{Message, MessageSelector, TestContext};

/// A queued message with the channel a synchronous reply goes to.
#[derive(Debug)]
pub struct QueuedMessage {
    /// The message itself.
    pub message: Message,
    /// Reply channel of a synchronous request.
    pub reply_to: Option<oneshot::Sender<Message>>,
}

/// FIFO queue supporting selective consumption.
///
/// Messages a selector rejects stay queued for later consumers.
#[derive(Debug)]
pub struct MessageQueue {
    name: String,
    entries: Mutex<VecDeque<QueuedMessage>>,
    arrivals: Notify,
}

impl MessageQueue {
    /// Creates an empty queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(VecDeque::new()),
            arrivals: Notify::new(),
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a message.
    pub fn push(&self, message: Message) {
        self.push_entry(QueuedMessage {
            message,
            reply_to: None,
        });
    }

    /// Appends a request whose reply is sent through `reply_to`.
    pub fn push_with_reply(&self, message: Message, reply_to: oneshot::Sender<Message>) {
        self.push_entry(QueuedMessage {
            message,
            reply_to: Some(reply_to),
        });
    }

    fn push_entry(&self, entry: QueuedMessage) {
        debug!("Queue '{}' received message {}", self.name, entry.message.id());
        self.entries.lock().push_back(entry);
        self.arrivals.notify_waiters();
    }

    /// Waits up to `timeout` for the first message matching `selector`.
    pub async fn pop(
        &self,
        selector: Option<&MessageSelector>,
        context: &TestContext,
        timeout: Duration,
    ) -> Option<Message> {
        self.pop_entry(selector, context, timeout)
            .await
            .map(|entry| entry.message)
    }

    /// Like [`Self::pop`], keeping the reply channel.
    pub async fn pop_entry(
        &self,
        selector: Option<&MessageSelector>,
        context: &TestContext,
        timeout: Duration,
    ) -> Option<QueuedMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            if let Some(entry) = self.take_matching(selector, context) {
                return Some(entry);
            }
            if timeout_at(deadline, arrival).await.is_err() {
                return self.take_matching(selector, context);
            }
        }
    }

    fn take_matching(
        &self,
        selector: Option<&MessageSelector>,
        context: &TestContext,
    ) -> Option<QueuedMessage> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| !entry.reply_to.as_ref().is_some_and(oneshot::Sender::is_closed));
        if entries.len() < before {
            debug!(
                "Dropped {} abandoned request(s) from queue '{}'",
                before - entries.len(),
                self.name
            );
        }
        let position = entries.iter().position(|entry| {
            selector.is_none_or(|selector| selector.matches(&entry.message, context))
        })?;
        entries.remove(position)
    }

    /// Drops all messages matching `selector` and returns how many were dropped.
    pub fn purge(&self, selector: Option<&MessageSelector>, context: &TestContext) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| {
            !selector.is_none_or(|selector| selector.matches(&entry.message, context))
        });
        let purged = before - entries.len();
        debug!("Purged {purged} message(s) from queue '{}'", self.name);
        purged
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
