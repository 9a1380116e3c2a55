//! Core types of the Citrus integration test framework.
//!
//! This crate holds the test context with its variables, the function and
//! validation matcher expression languages, the message model, and the
//! endpoint and message validator abstractions shared by all other crates.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::assertions_on_result_states,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

/// Boolean expressions used by conditions.
pub mod boolean_parser;
/// Test context and its factory.
pub mod context;
/// Java style date patterns and offsets.
pub mod dates;
/// Data dictionaries rewriting message payloads.
pub mod dictionary;
/// Endpoint traits and registry.
pub mod endpoint;
/// Error types and result definitions.
pub mod error;
/// Variable extraction from messages.
pub mod extract;
/// Function libraries and call resolution.
pub mod functions;
/// JSONPath evaluation.
pub mod json_path;
/// Validation matcher libraries and expressions.
pub mod matcher;
/// Messages, headers, selectors and the message store.
pub mod message;
/// Argument list splitting.
pub mod parameters;
/// Framework wide constants.
pub mod settings;
/// Message validator API and registry.
pub mod validation;
/// Variable expression helpers.
pub mod variables;
/// XPath evaluation on XML payloads.
pub mod xpath;

pub use context::{TestContext, TestContextFactory};
pub use dictionary::{DataDictionary, DataDictionaryRegistry, MessageDirection};
pub use endpoint::{Endpoint, EndpointFactory, EndpointRegistry};
pub use error::{Error, Result};
pub use extract::VariableExtractor;
pub use functions::{Function, FunctionLibrary, FunctionRegistry};
pub use matcher::{ValidationMatcher, ValidationMatcherLibrary, ValidationMatcherRegistry};
pub use message::{Message, MessagePayload, MessageSelector, MessageStore, MessageType};
pub use validation::{MessageValidator, MessageValidatorRegistry, ValidationContext};
