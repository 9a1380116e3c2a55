//! Reporter writing the test lifecycle and summary to the log.

use tracing::{debug, info, warn};

use citrus_core::{Error, Result};

use crate::action::TestAction;
use crate::report::{TestActionListener, TestListener, TestReporter, TestSuiteListener};
use crate::result::{TestResult, TestResults};
use crate::test_case::TestCase;

const SEPARATOR: &str =
    "------------------------------------------------------------------------";

/// Logs lifecycle events and a summary table.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter;

fn describe(action: &dyn TestAction) -> String {
    action.description().map_or_else(
        || action.name().to_owned(),
        |description| format!("{}: {description}", action.name()),
    )
}

fn summary_line(result: &TestResult) -> String {
    let mut line = format!(" {} ", result.name);
    let dots = 64_usize.saturating_sub(line.len());
    line.push_str(&".".repeat(dots));
    line.push(' ');
    line.push_str(result.status.as_str());
    line
}

impl TestListener for LoggingReporter {
    fn on_test_start(&self, test: &TestCase) {
        info!("{SEPARATOR}");
        info!("STARTING TEST {} <{}>", test.name(), test.package());
    }

    fn on_test_success(&self, test: &TestCase, _result: &TestResult) {
        info!("TEST SUCCESS {} ({})", test.name(), test.package());
        info!("{SEPARATOR}");
    }

    fn on_test_failure(&self, test: &TestCase, result: &TestResult) {
        warn!(
            "TEST FAILED {} <{}> Nested error is: {}",
            test.name(),
            test.package(),
            result.cause.as_deref().unwrap_or("unknown")
        );
        info!("{SEPARATOR}");
    }

    fn on_test_skipped(&self, test: &TestCase) {
        info!("SKIPPING TEST: {}", test.name());
    }
}

impl TestActionListener for LoggingReporter {
    fn on_action_start(&self, test: &TestCase, index: usize, action: &dyn TestAction) {
        debug!(
            "TEST STEP {}/{}: {}",
            index + 1,
            test.action_count(),
            describe(action)
        );
    }

    fn on_action_finish(&self, test: &TestCase, index: usize, _action: &dyn TestAction) {
        debug!("TEST STEP {}/{} SUCCESS", index + 1, test.action_count());
    }

    fn on_action_failed(
        &self,
        test: &TestCase,
        index: usize,
        action: &dyn TestAction,
        error: &Error,
    ) {
        warn!(
            "TEST STEP {}/{} FAILED: {} - {error}",
            index + 1,
            test.action_count(),
            describe(action)
        );
    }

    fn on_action_skipped(&self, test: &TestCase, index: usize, action: &dyn TestAction) {
        debug!(
            "SKIPPING TEST STEP {}/{}: {}",
            index + 1,
            test.action_count(),
            describe(action)
        );
    }
}

impl TestSuiteListener for LoggingReporter {
    fn on_suite_start(&self) {
        info!("{SEPARATOR}");
        info!("STARTING CITRUS TEST SUITE");
    }

    fn on_suite_finish(&self, results: &TestResults) {
        info!(
            "FINISHED CITRUS TEST SUITE: {} test(s) in {} ms",
            results.len(),
            results.total_duration().as_millis()
        );
    }
}

impl TestReporter for LoggingReporter {
    fn name(&self) -> &str {
        "logging"
    }

    fn generate(&self, results: &TestResults) -> Result<()> {
        info!("{SEPARATOR}");
        info!("CITRUS TEST RESULTS");
        info!("");
        for result in results.results() {
            info!("{}", summary_line(result));
            if let Some(cause) = &result.cause {
                info!("    FAILURE: Caused by: {cause}");
            }
        }
        info!("");
        info!("TOTAL:\t{}", results.len());
        info!("SKIPPED:\t{}", results.skipped_count());
        info!(
            "FAILED:\t{} ({:.1}%)",
            results.failed_count(),
            results.failure_rate()
        );
        info!(
            "SUCCESS:\t{} ({:.1}%)",
            results.success_count(),
            results.success_rate()
        );
        info!("{SEPARATOR}");
        Ok(())
    }
}
