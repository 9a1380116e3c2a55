//! Endpoint implementations for Citrus tests.
//!
//! In-memory direct endpoints (one-way and request/reply) over named
//! message queues, an HTTP client endpoint, and the factory that builds
//! them from URIs.
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

/// Correlation keys and stored replies.
pub mod correlation;
/// Direct one-way and request/reply endpoints.
pub mod direct;
/// URI based endpoint factory.
pub mod factory;
/// HTTP client endpoint.
pub mod http;
/// Selective in-memory message queue.
pub mod queue;

pub use direct::{DirectEndpoint, DirectSyncEndpoint, SyncRole};
pub use factory::DefaultEndpointFactory;
pub use http::{HttpClientConfig, HttpClientEndpoint};
pub use queue::{MessageQueue, QueuedMessage};
