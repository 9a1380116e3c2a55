//! Built-in test actions.

/// Echo, sleep, fail and variable actions.
pub mod basic;
/// Message definitions shared by send and receive.
pub mod message;
/// Purge endpoint action.
pub mod purge;
/// Receive message action.
pub mod receive;
/// Send message action.
pub mod send;

pub use basic::{CreateVariablesAction, EchoAction, FailAction, SleepAction, TraceVariablesAction};
pub use message::{MessageTemplate, PayloadSource};
pub use purge::PurgeEndpointAction;
pub use receive::{ReceiveMessageAction, SelectorSource};
pub use send::SendMessageAction;
