//! HTTP client endpoint backed by `reqwest`.

use core::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use tracing::{debug, info};

use citrus_core::message::headers;
use citrus_core::settings::DEFAULT_RECEIVE_TIMEOUT;
use citrus_core::{
    Endpoint, Error, Message, MessagePayload, MessageSelector, Result, TestContext,
};

use crate::correlation::{ReplyStore, correlation_key, new_correlation_key};

/// Settings of an HTTP client endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Base url requests are sent to.
    pub request_url: String,
    /// Method used when the message does not set one.
    pub request_method: String,
    /// Content type used when the message does not set one.
    pub content_type: String,
    /// Request timeout, also the default receive timeout.
    pub timeout: Duration,
}

impl HttpClientConfig {
    /// Settings for `request_url` with POST, JSON and the default timeout.
    pub fn new(request_url: impl Into<String>) -> Self {
        Self {
            request_url: request_url.into(),
            request_method: "POST".to_owned(),
            content_type: "application/json".to_owned(),
            timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    /// Sets the default method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.request_method = method.into();
        self
    }

    /// Sets the default content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Sends each message as an HTTP request and keeps the response for a
/// following receive.
///
/// Internal headers select the method, the request path appended to the
/// base url and the query parameters; all other headers are sent as HTTP
/// headers. Responses carry the status code and reason phrase as internal
/// headers.
#[derive(Debug)]
pub struct HttpClientEndpoint {
    name: String,
    config: HttpClientConfig,
    client: Client,
    responses: ReplyStore,
}

impl HttpClientEndpoint {
    /// Endpoint using `config`.
    pub fn new(name: impl Into<String>, config: HttpClientConfig) -> Self {
        Self {
            name: name.into(),
            config,
            client: Client::default(),
            responses: ReplyStore::new(),
        }
    }

    /// Endpoint settings.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn request_url(&self, message: &Message) -> String {
        match message.header(headers::HTTP_REQUEST_URI) {
            Some(uri) if uri.starts_with("http://") || uri.starts_with("https://") => {
                uri.into_owned()
            }
            Some(path) if !path.is_empty() => format!(
                "{}/{}",
                self.config.request_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            _ => self.config.request_url.clone(),
        }
    }

    fn method(&self, message: &Message) -> Result<Method> {
        let method = message
            .header(headers::HTTP_METHOD)
            .map_or_else(|| self.config.request_method.clone(), |method| method.into_owned());
        Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::Endpoint(format!("Invalid HTTP method '{method}'")))
    }

    async fn to_message(response: Response) -> Result<Message> {
        let status = response.status();
        let mut headers_out = vec![
            (headers::HTTP_STATUS_CODE.to_owned(), status.as_u16().to_string()),
            (
                headers::HTTP_REASON_PHRASE.to_owned(),
                status.canonical_reason().unwrap_or_default().to_owned(),
            ),
        ];
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers_out.push((name.as_str().to_owned(), value.to_owned()));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|error| Error::Endpoint(format!("Failed to read HTTP response body: {error}")))?
            .to_vec();
        let payload = if body.is_empty() {
            MessagePayload::Empty
        } else {
            String::from_utf8(body).map_or_else(
                |error| MessagePayload::Binary(error.into_bytes()),
                MessagePayload::Text,
            )
        };

        let mut message = Message::new(payload);
        for (name, value) in headers_out {
            message.set_header(name, value);
        }
        Ok(message)
    }
}

/// Splits `a=1,b=2` into pairs.
fn query_params(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.trim().to_owned(), value.trim().to_owned())
        })
        .collect()
}

#[async_trait]
impl Endpoint for HttpClientEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn send(&self, message: Message, context: &TestContext) -> Result<()> {
        let key = new_correlation_key(&self.name, context)?;
        let method = self.method(&message)?;
        let url = self.request_url(&message);
        info!("Sending HTTP {method} request to '{url}'");

        let mut request = self
            .client
            .request(method, &url)
            .timeout(self.config.timeout);
        if let Some(raw) = message.header(headers::HTTP_QUERY_PARAMS) {
            request = request.query(&query_params(&raw));
        }
        if message.header_ignore_case(headers::CONTENT_TYPE).is_none() {
            request = request.header(headers::CONTENT_TYPE, self.config.content_type.as_str());
        }
        for (name, value) in message.headers() {
            if !headers::is_internal(name) {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        if !message.payload().is_empty() {
            request = request.body(message.payload().as_bytes().to_vec());
        }

        let response = request.send().await.map_err(|error| {
            Error::Endpoint(format!("Failed to send HTTP request to '{url}': {error}"))
        })?;
        debug!("HTTP response status {} from '{url}'", response.status());
        let reply = Self::to_message(response).await?;
        self.responses.store(key, reply);
        Ok(())
    }

    async fn receive(
        &self,
        _selector: Option<&MessageSelector>,
        context: &TestContext,
        timeout: Duration,
    ) -> Result<Option<Message>> {
        let key = correlation_key(&self.name, context)?;
        Ok(self.responses.take(&key, timeout).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url() {
        let endpoint = HttpClientEndpoint::new("api", HttpClientConfig::new("http://localhost:8080/api/"));
        assert_eq!(endpoint.request_url(&Message::empty()), "http://localhost:8080/api/");
        assert_eq!(
            endpoint.request_url(&Message::empty().with_header(headers::HTTP_REQUEST_URI, "/users/1")),
            "http://localhost:8080/api/users/1"
        );
        assert_eq!(
            endpoint.request_url(
                &Message::empty().with_header(headers::HTTP_REQUEST_URI, "https://other/x")
            ),
            "https://other/x"
        );
    }

    #[test]
    fn test_method() {
        let endpoint = HttpClientEndpoint::new("api", HttpClientConfig::new("http://localhost").with_method("put"));
        assert_eq!(endpoint.method(&Message::empty()).unwrap(), Method::PUT);
        assert_eq!(
            endpoint
                .method(&Message::empty().with_header(headers::HTTP_METHOD, "get"))
                .unwrap(),
            Method::GET
        );
        assert!(
            endpoint
                .method(&Message::empty().with_header(headers::HTTP_METHOD, "BAD METHOD"))
                .is_err()
        );
    }

    #[test]
    fn test_query_params() {
        assert_eq!(
            query_params("page=1, size=20,flag"),
            vec![
                ("page".to_owned(), "1".to_owned()),
                ("size".to_owned(), "20".to_owned()),
                ("flag".to_owned(), String::new())
            ]
        );
    }

    #[tokio::test]
    async fn test_receive_without_request_fails() {
        let endpoint = HttpClientEndpoint::new("api", HttpClientConfig::new("http://localhost"));
        let result = endpoint
            .receive(None, &TestContext::default(), Duration::ZERO)
            .await;
        assert!(matches!(result, Err(Error::Endpoint(_))));
    }
}
