//! Test listeners and reporters.

/// Flow report of executed actions.
pub mod flow;
/// JSON summary report.
pub mod json;
/// Tracing based reporter.
pub mod logging;

use std::sync::Arc;

use tracing::warn;

use citrus_core::{Error, Result};

use crate::action::TestAction;
use crate::result::{TestResult, TestResults};
use crate::test_case::TestCase;

pub use flow::TestFlowReporter;
pub use json::JsonReporter;
pub use logging::LoggingReporter;

/// Receives test lifecycle events.
pub trait TestListener: Send + Sync {
    /// Test starts.
    fn on_test_start(&self, _test: &TestCase) {}

    /// Test passed.
    fn on_test_success(&self, _test: &TestCase, _result: &TestResult) {}

    /// Test failed.
    fn on_test_failure(&self, _test: &TestCase, _result: &TestResult) {}

    /// Test was skipped.
    fn on_test_skipped(&self, _test: &TestCase) {}

    /// Test finished, after the after-test actions.
    fn on_test_finish(&self, _test: &TestCase, _result: &TestResult) {}
}

/// Receives events for top level test actions.
///
/// Finally actions continue the numbering of the main actions.
pub trait TestActionListener: Send + Sync {
    /// Action starts.
    fn on_action_start(&self, _test: &TestCase, _index: usize, _action: &dyn TestAction) {}

    /// Action passed.
    fn on_action_finish(&self, _test: &TestCase, _index: usize, _action: &dyn TestAction) {}

    /// Action failed.
    fn on_action_failed(
        &self,
        _test: &TestCase,
        _index: usize,
        _action: &dyn TestAction,
        _error: &Error,
    ) {
    }

    /// Action is disabled.
    fn on_action_skipped(&self, _test: &TestCase, _index: usize, _action: &dyn TestAction) {}
}

/// Receives suite events.
pub trait TestSuiteListener: Send + Sync {
    /// Suite starts.
    fn on_suite_start(&self) {}

    /// Suite finished.
    fn on_suite_finish(&self, _results: &TestResults) {}
}

/// Writes a report once the suite finished.
pub trait TestReporter: Send + Sync {
    /// Reporter name for log output.
    fn name(&self) -> &str;

    /// Generates the report.
    ///
    /// # Errors
    /// Returns an error if the report cannot be written.
    fn generate(&self, results: &TestResults) -> Result<()>;
}

/// Fan-out over all registered listeners.
#[derive(Clone, Default)]
pub struct TestListeners {
    test: Vec<Arc<dyn TestListener>>,
    action: Vec<Arc<dyn TestActionListener>>,
    suite: Vec<Arc<dyn TestSuiteListener>>,
    reporters: Vec<Arc<dyn TestReporter>>,
}

impl TestListeners {
    /// No listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a test listener.
    pub fn add_test_listener(&mut self, listener: Arc<dyn TestListener>) {
        self.test.push(listener);
    }

    /// Adds an action listener.
    pub fn add_action_listener(&mut self, listener: Arc<dyn TestActionListener>) {
        self.action.push(listener);
    }

    /// Adds a suite listener.
    pub fn add_suite_listener(&mut self, listener: Arc<dyn TestSuiteListener>) {
        self.suite.push(listener);
    }

    /// Adds a reporter.
    pub fn add_reporter(&mut self, reporter: Arc<dyn TestReporter>) {
        self.reporters.push(reporter);
    }

    /// Number of registered reporters.
    pub fn reporter_count(&self) -> usize {
        self.reporters.len()
    }

    pub(crate) fn on_test_start(&self, test: &TestCase) {
        for listener in &self.test {
            listener.on_test_start(test);
        }
    }

    pub(crate) fn on_test_success(&self, test: &TestCase, result: &TestResult) {
        for listener in &self.test {
            listener.on_test_success(test, result);
        }
    }

    pub(crate) fn on_test_failure(&self, test: &TestCase, result: &TestResult) {
        for listener in &self.test {
            listener.on_test_failure(test, result);
        }
    }

    pub(crate) fn on_test_skipped(&self, test: &TestCase) {
        for listener in &self.test {
            listener.on_test_skipped(test);
        }
    }

    pub(crate) fn on_test_finish(&self, test: &TestCase, result: &TestResult) {
        for listener in &self.test {
            listener.on_test_finish(test, result);
        }
    }

    pub(crate) fn on_action_start(&self, test: &TestCase, index: usize, action: &dyn TestAction) {
        for listener in &self.action {
            listener.on_action_start(test, index, action);
        }
    }

    pub(crate) fn on_action_finish(&self, test: &TestCase, index: usize, action: &dyn TestAction) {
        for listener in &self.action {
            listener.on_action_finish(test, index, action);
        }
    }

    pub(crate) fn on_action_failed(
        &self,
        test: &TestCase,
        index: usize,
        action: &dyn TestAction,
        error: &Error,
    ) {
        for listener in &self.action {
            listener.on_action_failed(test, index, action, error);
        }
    }

    pub(crate) fn on_action_skipped(&self, test: &TestCase, index: usize, action: &dyn TestAction) {
        for listener in &self.action {
            listener.on_action_skipped(test, index, action);
        }
    }

    pub(crate) fn on_suite_start(&self) {
        for listener in &self.suite {
            listener.on_suite_start();
        }
    }

    pub(crate) fn on_suite_finish(&self, results: &TestResults) {
        for listener in &self.suite {
            listener.on_suite_finish(results);
        }
    }

    /// Runs every reporter. Failing reporters are logged and skipped.
    pub fn generate_reports(&self, results: &TestResults) {
        for reporter in &self.reporters {
            if let Err(error) = reporter.generate(results) {
                warn!("Failed to generate {} report: {error}", reporter.name());
            }
        }
    }
}
