//! Message model exchanged with endpoints.

/// Well known header names.
pub mod headers;
/// Header and JSONPath based message selection.
pub mod selector;
/// Named storage of sent and received messages.
pub mod store;

use core::fmt;
use core::str::FromStr;
use std::borrow::Cow;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub use selector::MessageSelector;
pub use store::MessageStore;

/// Payload format a message is validated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// Unstructured text.
    Plaintext,
    /// JSON document.
    Json,
    /// XML document.
    Xml,
    /// One or more YAML documents.
    Yaml,
    /// Raw bytes.
    Binary,
    /// Bytes compared through their base64 encoding.
    Base64,
}

impl MessageType {
    /// Guesses the payload type from its first non blank character.
    pub fn guess(payload: &str) -> Self {
        let trimmed = payload.trim_start();
        if trimmed.starts_with('<') {
            Self::Xml
        } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Self::Json
        } else {
            Self::Plaintext
        }
    }

    /// Upper case name as used in test sources.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Yaml => "YAML",
            Self::Binary => "BINARY",
            Self::Base64 => "BINARY_BASE64",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PLAINTEXT" | "TEXT" => Ok(Self::Plaintext),
            "JSON" => Ok(Self::Json),
            "XML" | "XHTML" => Ok(Self::Xml),
            "YAML" | "YML" => Ok(Self::Yaml),
            "BINARY" => Ok(Self::Binary),
            "BINARY_BASE64" | "BASE64" => Ok(Self::Base64),
            other => Err(Error::Runtime(format!("Unknown message type '{other}'"))),
        }
    }
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessagePayload {
    /// No body at all.
    #[default]
    Empty,
    /// Text body.
    Text(String),
    /// Binary body.
    Binary(Vec<u8>),
}

impl MessagePayload {
    /// Whether the payload is absent or blank text.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// Payload as text; binary payloads are decoded lossily.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Empty => Cow::Borrowed(""),
            Self::Text(text) => Cow::Borrowed(text),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Whether the payload is blank or starts like a JSON object or array.
    pub fn is_json_like(&self) -> bool {
        let text = self.as_text();
        let trimmed = text.trim_start();
        trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('[')
    }

    /// Whether the payload is blank or starts with markup.
    pub fn is_xml_like(&self) -> bool {
        let text = self.as_text();
        let trimmed = text.trim_start();
        trimmed.is_empty() || trimmed.starts_with('<')
    }

    /// Base64 encoding of the payload bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.as_bytes())
    }
}

impl From<String> for MessagePayload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MessagePayload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for MessagePayload {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// A message sent to or received from an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: String,
    name: Option<String>,
    payload: MessagePayload,
    headers: IndexMap<String, String>,
    header_data: Vec<String>,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a message with a fresh id and timestamp.
    pub fn new(payload: impl Into<MessagePayload>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: None,
            payload: payload.into(),
            headers: IndexMap::new(),
            header_data: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a message without payload.
    pub fn empty() -> Self {
        Self::new(MessagePayload::Empty)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the message name used for the message store.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a raw header data fragment.
    #[must_use]
    pub fn with_header_data(mut self, data: impl Into<String>) -> Self {
        self.header_data.push(data.into());
        self
    }

    /// Unique message id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Optional message name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the message name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Message body.
    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    /// Replaces the message body.
    pub fn set_payload(&mut self, payload: impl Into<MessagePayload>) {
        self.payload = payload.into();
    }

    /// Message body as text.
    pub fn payload_text(&self) -> Cow<'_, str> {
        self.payload.as_text()
    }

    /// All headers in insertion order.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Header value by exact name. The id, name and timestamp are exposed as
    /// `citrus_message_*` headers.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        if let Some(value) = self.headers.get(name) {
            return Some(Cow::Borrowed(value));
        }
        match name {
            headers::ID => Some(Cow::Borrowed(&self.id)),
            headers::NAME => self.name.as_deref().map(Cow::Borrowed),
            headers::TIMESTAMP => Some(Cow::Owned(self.timestamp.timestamp_millis().to_string())),
            _ => None,
        }
    }

    /// Header value matched case-insensitively.
    pub fn header_ignore_case(&self, name: &str) -> Option<Cow<'_, str>> {
        self.header(name).or_else(|| {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| Cow::Borrowed(value.as_str()))
        })
    }

    /// Sets or replaces a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Removes a header.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.shift_remove(name)
    }

    /// Raw header data fragments.
    pub fn header_data(&self) -> &[String] {
        &self.header_data
    }

    /// Declared message type header, if any.
    pub fn message_type(&self) -> Option<MessageType> {
        self.headers
            .get(headers::MESSAGE_TYPE)
            .and_then(|value| value.parse().ok())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "Message [id: {}, headers: {:?}, payload: {}]",
            self.id,
            self.headers,
            self.payload.as_text()
        )
    }
}
