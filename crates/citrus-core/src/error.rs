use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Result type for Citrus operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors raised while building and running Citrus tests.
#[derive(Debug, Error)]
pub enum Error {
    /// A generic runtime failure while executing a test action.
    #[error("{0}")]
    Runtime(String),

    /// The received message or value did not match its expectation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced test variable is not defined.
    #[error("{0}")]
    NoSuchVariable(String),

    /// A referenced function is not part of its library.
    #[error("{0}")]
    NoSuchFunction(String),

    /// No function library is registered for a prefix.
    #[error("{0}")]
    NoSuchFunctionLibrary(String),

    /// A referenced validation matcher is not part of its library.
    #[error("{0}")]
    NoSuchValidationMatcher(String),

    /// No validation matcher library is registered for a prefix.
    #[error("{0}")]
    NoSuchMatcherLibrary(String),

    /// A function was called with malformed syntax or bad parameters.
    #[error("Invalid function usage: {0}")]
    InvalidFunctionUsage(String),

    /// An expression (variable, matcher, boolean, JSONPath) could not be parsed.
    #[error("{0}")]
    InvalidExpression(String),

    /// An endpoint failed to send or receive.
    #[error("Endpoint error: {0}")]
    Endpoint(String),

    /// An action did not complete within its timeout.
    #[error("Action timeout: {0}")]
    ActionTimeout(String),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),
}

impl Error {
    /// Whether this error reports a failed expectation rather than a broken test.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Short name of the error kind, used by reporters and the `assert` container.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Runtime(_) => "RuntimeError",
            Self::Validation(_) => "ValidationError",
            Self::NoSuchVariable(_) => "NoSuchVariableError",
            Self::NoSuchFunction(_) => "NoSuchFunctionError",
            Self::NoSuchFunctionLibrary(_) => "NoSuchFunctionLibraryError",
            Self::NoSuchValidationMatcher(_) => "NoSuchValidationMatcherError",
            Self::NoSuchMatcherLibrary(_) => "NoSuchValidationMatcherLibraryError",
            Self::InvalidFunctionUsage(_) => "InvalidFunctionUsageError",
            Self::InvalidExpression(_) => "InvalidExpressionError",
            Self::Endpoint(_) => "EndpointError",
            Self::ActionTimeout(_) => "ActionTimeoutError",
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
        }
    }

    /// Message without the kind prefix added by `Display`.
    pub fn detail(&self) -> String {
        match self {
            Self::Runtime(message)
            | Self::Validation(message)
            | Self::NoSuchVariable(message)
            | Self::NoSuchFunction(message)
            | Self::NoSuchFunctionLibrary(message)
            | Self::NoSuchValidationMatcher(message)
            | Self::NoSuchMatcherLibrary(message)
            | Self::InvalidFunctionUsage(message)
            | Self::InvalidExpression(message)
            | Self::Endpoint(message)
            | Self::ActionTimeout(message)
            | Self::Config(message) => message.clone(),
            Self::Io(error) => error.to_string(),
            Self::Json(error) => error.to_string(),
        }
    }

    /// Rebuilds an equivalent error, for errors that must be both recorded and returned.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Runtime(message) => Self::Runtime(message.clone()),
            Self::Validation(message) => Self::Validation(message.clone()),
            Self::NoSuchVariable(message) => Self::NoSuchVariable(message.clone()),
            Self::NoSuchFunction(message) => Self::NoSuchFunction(message.clone()),
            Self::NoSuchFunctionLibrary(message) => Self::NoSuchFunctionLibrary(message.clone()),
            Self::NoSuchValidationMatcher(message) => {
                Self::NoSuchValidationMatcher(message.clone())
            }
            Self::NoSuchMatcherLibrary(message) => Self::NoSuchMatcherLibrary(message.clone()),
            Self::InvalidFunctionUsage(message) => Self::InvalidFunctionUsage(message.clone()),
            Self::InvalidExpression(message) => Self::InvalidExpression(message.clone()),
            Self::Endpoint(message) => Self::Endpoint(message.clone()),
            Self::ActionTimeout(message) => Self::ActionTimeout(message.clone()),
            Self::Config(message) => Self::Config(message.clone()),
            Self::Io(error) => Self::Io(IoError::new(error.kind(), error.to_string())),
            Self::Json(error) => Self::Runtime(format!("JSON error: {error}")),
        }
    }

    /// Builds a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Builds a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}
