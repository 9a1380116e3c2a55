//! Test execution for the Citrus integration test framework.
//!
//! Holds the test actions and containers, the test case lifecycle with its
//! listeners and reporters, the YAML test loader and the `Citrus` instance
//! that runs suites with a shared configuration.
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

/// Test action trait and sequential execution.
pub mod action;
/// Built-in test actions.
pub mod actions;
/// The `Citrus` instance.
pub mod citrus;
/// TOML configuration.
pub mod config;
/// Control flow containers.
pub mod containers;
/// Endpoints declared by tests.
pub mod endpoint;
/// Before and after test hooks.
pub mod hooks;
/// Listeners and reporters.
pub mod report;
/// Test results and summaries.
pub mod result;
/// Test cases and their lifecycle.
pub mod test_case;
/// YAML test loading.
pub mod yaml;

pub use action::{ActionRef, TestAction, run_actions};
pub use citrus::Citrus;
pub use config::{CitrusConfig, CitrusSettings, DictionaryConfig};
pub use endpoint::EndpointDefinition;
pub use hooks::TestHook;
pub use report::{
    JsonReporter, LoggingReporter, TestActionListener, TestFlowReporter, TestListener,
    TestListeners, TestReporter, TestSuiteListener,
};
pub use result::{ResultStatus, TestResult, TestResults};
pub use test_case::{TestCase, TestStatus};
pub use yaml::{LoadError, YamlLoader, discover_tests, load_test, load_test_str};
