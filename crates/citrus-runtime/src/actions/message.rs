//! Message definitions of send and receive actions.

use std::path::PathBuf;

use indexmap::IndexMap;
use tokio::fs;

use citrus_core::message::headers;
use citrus_core::{
    Error, Message, MessageDirection, MessagePayload, MessageType, Result, TestContext,
};

/// Where the payload of a message definition comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// Inline payload text.
    Data(String),
    /// File read when the message is built.
    File(PathBuf),
}

/// Declared content of a message, before dynamic content is resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTemplate {
    name: Option<String>,
    message_type: Option<MessageType>,
    payload: Option<PayloadSource>,
    headers: IndexMap<String, String>,
    header_data: Vec<String>,
    data_dictionary: Option<String>,
}

impl MessageTemplate {
    /// Empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inline payload.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.payload = Some(PayloadSource::Data(body.into()));
        self
    }

    /// Reads the payload from a file.
    #[must_use]
    pub fn with_body_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.payload = Some(PayloadSource::File(path.into()));
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a header data fragment.
    #[must_use]
    pub fn with_header_data(mut self, data: impl Into<String>) -> Self {
        self.header_data.push(data.into());
        self
    }

    /// Sets the message name used in the message store.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the message type.
    #[must_use]
    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }

    /// Applies the named data dictionary in addition to the global ones.
    #[must_use]
    pub fn with_data_dictionary(mut self, name: impl Into<String>) -> Self {
        self.data_dictionary = Some(name.into());
        self
    }

    /// Declared message name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared message type.
    pub fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    /// Declared headers.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    async fn load_payload(&self, context: &TestContext, resolve: bool) -> Result<MessagePayload> {
        let text = match &self.payload {
            None => return Ok(MessagePayload::Empty),
            Some(PayloadSource::Data(data)) => data.clone(),
            Some(PayloadSource::File(path)) => {
                let path = context.replace_dynamic_content(&path.to_string_lossy())?;
                fs::read_to_string(&path).await.map_err(|error| {
                    Error::runtime(format!("Failed to read message payload file '{path}': {error}"))
                })?
            }
        };
        if resolve {
            return Ok(context.replace_dynamic_content(&text)?.into());
        }
        Ok(text.into())
    }

    fn finish(
        &self,
        mut message: Message,
        direction: MessageDirection,
        context: &TestContext,
    ) -> Result<Message> {
        context.data_dictionaries().apply(
            &mut message,
            direction,
            self.data_dictionary.as_deref(),
            context,
        )?;
        if let Some(name) = &self.name {
            message.set_name(context.replace_dynamic_content(name)?);
        }
        if let Some(message_type) = self.message_type {
            message.set_header(headers::MESSAGE_TYPE, message_type.as_str());
        }
        Ok(message)
    }

    /// Builds an outgoing message: payload, header names and header values
    /// have their dynamic content resolved, then outbound data dictionaries
    /// rewrite the payload.
    ///
    /// # Errors
    /// Returns resolution errors and file read failures.
    pub async fn build(&self, context: &TestContext) -> Result<Message> {
        let mut message = Message::new(self.load_payload(context, true).await?);
        for (name, value) in context.resolve_dynamic_values_in_map(&self.headers)? {
            message.set_header(name, value);
        }
        for data in &self.header_data {
            message = message.with_header_data(context.replace_dynamic_content(data)?);
        }
        self.finish(message, MessageDirection::Outbound, context)
    }

    /// Builds a control message for validation. Payload and headers stay as
    /// declared; validators resolve them so matcher expressions survive.
    /// Inbound data dictionaries rewrite the payload.
    ///
    /// # Errors
    /// Returns file read failures and data dictionary errors.
    pub async fn build_control(&self, context: &TestContext) -> Result<Message> {
        let mut message = Message::new(self.load_payload(context, false).await?);
        for (name, value) in &self.headers {
            message.set_header(name.as_str(), value.as_str());
        }
        for data in &self.header_data {
            message = message.with_header_data(data.as_str());
        }
        self.finish(message, MessageDirection::Inbound, context)
    }
}
