//! Correlation of replies with the test that sent the request.
//!
//! A sending endpoint generates a correlation key, saves it in the test
//! context and stores the reply under that key. A following receive on the
//! same endpoint reads the key back from the context.

use core::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use uuid::Uuid;

use citrus_core::message::headers::SYNC_CORRELATOR;
use citrus_core::{Error, Message, Result, TestContext};

/// Name of the context variable holding the correlation key of `endpoint`.
pub fn correlation_key_name(endpoint: &str) -> String {
    format!("{SYNC_CORRELATOR}_{endpoint}")
}

/// Creates a fresh correlation key and saves it in `context`.
///
/// # Errors
/// Returns an error if the context rejects the variable.
pub fn new_correlation_key(endpoint: &str, context: &TestContext) -> Result<String> {
    let key = Uuid::new_v4().to_string();
    context.set_variable(&correlation_key_name(endpoint), key.as_str())?;
    Ok(key)
}

/// Correlation key previously saved for `endpoint`.
///
/// # Errors
/// Returns `Error::Endpoint` when nothing was sent on the endpoint in this test.
pub fn correlation_key(endpoint: &str, context: &TestContext) -> Result<String> {
    context
        .find_variable(&correlation_key_name(endpoint))
        .ok_or_else(|| {
            Error::Endpoint(format!(
                "Failed to get correlation key for endpoint '{endpoint}' - no request was sent before"
            ))
        })
}

/// Replies waiting to be received, keyed by correlation key.
#[derive(Debug, Default)]
pub struct ReplyStore {
    replies: Mutex<IndexMap<String, Message>>,
    arrivals: Notify,
}

impl ReplyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the reply for `key`.
    pub fn store(&self, key: impl Into<String>, message: Message) {
        self.replies.lock().insert(key.into(), message);
        self.arrivals.notify_waiters();
    }

    /// Removes and returns the reply for `key`, waiting up to `timeout`.
    pub async fn take(&self, key: &str, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        loop {
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            if let Some(message) = self.replies.lock().shift_remove(key) {
                return Some(message);
            }
            if timeout_at(deadline, arrival).await.is_err() {
                return self.replies.lock().shift_remove(key);
            }
        }
    }

    /// Number of stored replies.
    pub fn len(&self) -> usize {
        self.replies.lock().len()
    }

    /// Whether no reply is stored.
    pub fn is_empty(&self) -> bool {
        self.replies.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_key_round_trip() {
        let context = TestContext::default();
        assert!(matches!(
            correlation_key("client", &context),
            Err(Error::Endpoint(_))
        ));

        let key = new_correlation_key("client", &context).unwrap();
        assert_eq!(correlation_key("client", &context).unwrap(), key);
        assert!(context.has_variable("citrus_sync_message_correlator_client"));
    }

    #[tokio::test]
    async fn test_reply_store() {
        let store = ReplyStore::new();
        store.store("a", Message::new("reply"));
        assert_eq!(store.len(), 1);

        assert!(store.take("b", Duration::from_millis(5)).await.is_none());
        let reply = store.take("a", Duration::ZERO).await.unwrap();
        assert_eq!(reply.payload_text(), "reply");
        assert!(store.is_empty());
    }
}
