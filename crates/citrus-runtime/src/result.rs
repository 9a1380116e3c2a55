//! Test results and the suite summary.

use core::time::Duration;

use serde::{Serialize, Serializer};

use citrus_core::Error;

/// Outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    /// All actions passed.
    Success,
    /// An action, a finally action or an async action failed.
    Failure,
    /// The test was disabled.
    Skipped,
}

impl ResultStatus {
    /// Upper case label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Result of one test run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Test name.
    pub name: String,
    /// Test package, empty when not set.
    pub package: String,
    /// Outcome.
    pub status: ResultStatus,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Failure kind, e.g. `ValidationError`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Wall clock time of the run.
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl TestResult {
    fn with_status(name: &str, package: &str, status: ResultStatus) -> Self {
        Self {
            name: name.to_owned(),
            package: package.to_owned(),
            status,
            cause: None,
            error_kind: None,
            duration: Duration::ZERO,
        }
    }

    /// Successful result.
    pub fn success(name: &str, package: &str) -> Self {
        Self::with_status(name, package, ResultStatus::Success)
    }

    /// Failed result carrying the error message and kind.
    pub fn failed(name: &str, package: &str, error: &Error) -> Self {
        Self {
            cause: Some(error.to_string()),
            error_kind: Some(error.kind().to_owned()),
            ..Self::with_status(name, package, ResultStatus::Failure)
        }
    }

    /// Skipped result.
    pub fn skipped(name: &str, package: &str) -> Self {
        Self::with_status(name, package, ResultStatus::Skipped)
    }

    /// Sets the run duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether the test passed.
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Whether the test failed.
    pub fn is_failed(&self) -> bool {
        self.status == ResultStatus::Failure
    }

    /// Whether the test was skipped.
    pub fn is_skipped(&self) -> bool {
        self.status == ResultStatus::Skipped
    }
}

/// Results of a suite run in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestResults {
    results: Vec<TestResult>,
}

impl TestResults {
    /// Empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result.
    pub fn add(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// All results.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no test has run.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of passed tests.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|result| result.is_success()).count()
    }

    /// Number of failed tests.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|result| result.is_failed()).count()
    }

    /// Number of skipped tests.
    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|result| result.is_skipped()).count()
    }

    /// Names of the failed tests.
    pub fn failed_names(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|result| result.is_failed())
            .map(|result| result.name.as_str())
            .collect()
    }

    /// Sum of all test durations.
    pub fn total_duration(&self) -> Duration {
        self.results.iter().map(|result| result.duration).sum()
    }

    /// Share of passed tests among executed (not skipped) tests, in percent.
    pub fn success_rate(&self) -> f64 {
        let executed = self.len() - self.skipped_count();
        if executed == 0 {
            return 0.0;
        }
        self.success_count() as f64 * 100.0 / executed as f64
    }

    /// Share of failed tests among executed tests, in percent.
    pub fn failure_rate(&self) -> f64 {
        let executed = self.len() - self.skipped_count();
        if executed == 0 {
            return 0.0;
        }
        self.failed_count() as f64 * 100.0 / executed as f64
    }

    /// Whether no test failed.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

impl Extend<TestResult> for TestResults {
    fn extend<I: IntoIterator<Item = TestResult>>(&mut self, iter: I) {
        self.results.extend(iter);
    }
}
