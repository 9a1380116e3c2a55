/// Prefix shared by all framework internal headers.
pub const PREFIX: &str = "citrus_";

/// Unique message id.
pub const ID: &str = "citrus_message_id";
/// Message name.
pub const NAME: &str = "citrus_message_name";
/// Creation time in epoch milliseconds.
pub const TIMESTAMP: &str = "citrus_message_timestamp";
/// Declared message type.
pub const MESSAGE_TYPE: &str = "citrus_message_type";
/// Correlation key linking a synchronous request to its reply.
pub const SYNC_CORRELATOR: &str = "citrus_sync_message_correlator";

/// HTTP request method.
pub const HTTP_METHOD: &str = "citrus_http_method";
/// HTTP request path, appended to the endpoint url.
pub const HTTP_REQUEST_URI: &str = "citrus_http_request_uri";
/// HTTP query parameters as `key=value,key2=value2`.
pub const HTTP_QUERY_PARAMS: &str = "citrus_http_query_params";
/// HTTP response status code.
pub const HTTP_STATUS_CODE: &str = "citrus_http_status_code";
/// HTTP response reason phrase.
pub const HTTP_REASON_PHRASE: &str = "citrus_http_reason_phrase";

/// Content type header.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Whether a header is framework internal and excluded from header validation.
pub fn is_internal(name: &str) -> bool {
    name.starts_with(PREFIX)
}
