use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Message;

/// Messages sent and received during a test, by name.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<IndexMap<String, Message>>,
}

impl MessageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a message, replacing any message with the same name.
    pub fn store(&self, name: impl Into<String>, message: Message) {
        self.messages.write().insert(name.into(), message);
    }

    /// Looks up a stored message.
    pub fn get(&self, name: &str) -> Option<Message> {
        self.messages.read().get(name).cloned()
    }

    /// Names of all stored messages in storage order.
    pub fn names(&self) -> Vec<String> {
        self.messages.read().keys().cloned().collect()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Name used when an action stores a message without an explicit name.
    pub fn construct_message_name(action: &str, endpoint: &str) -> String {
        format!("{action}({endpoint})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_get() {
        let store = MessageStore::new();
        assert!(store.is_empty());

        store.store("request", Message::new("first"));
        store.store("request", Message::new("second"));
        store.store("reply", Message::new("third"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("request").unwrap().payload_text(), "second");
        assert!(store.get("missing").is_none());
        assert_eq!(store.names(), vec!["request", "reply"]);
    }

    #[test]
    fn test_construct_message_name() {
        assert_eq!(
            MessageStore::construct_message_name("receive", "helloEndpoint"),
            "receive(helloEndpoint)"
        );
    }
}
