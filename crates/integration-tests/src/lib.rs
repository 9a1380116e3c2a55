//! Integration test harness for Citrus
//!
//! Runs the YAML fixtures under `tests/fixtures` end to end. Each fixture
//! directory name states the outcome every test inside it must have:
//! `passing`, `failing` or `skipped`.

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

use std::path::{Path, PathBuf};

use tracing::debug;

use citrus_runtime::{
    Citrus, CitrusConfig, LoadError, ResultStatus, TestResult, TestResults,
};

/// Outcome expected for every test of a fixture directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Tests must succeed
    Passing,
    /// Tests must fail
    Failing,
    /// Tests must be skipped
    Skipped,
}

impl Expectation {
    /// Expectation named by the directory, if any.
    pub fn for_dir(dir: &Path) -> Option<Self> {
        match dir.file_name()?.to_str()? {
            "passing" => Some(Self::Passing),
            "failing" => Some(Self::Failing),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Status a result must have.
    pub fn status(self) -> ResultStatus {
        match self {
            Self::Passing => ResultStatus::Success,
            Self::Failing => ResultStatus::Failure,
            Self::Skipped => ResultStatus::Skipped,
        }
    }

    /// Describes `result` when it does not meet the expectation.
    pub fn mismatch(self, result: &TestResult) -> Option<String> {
        (result.status != self.status()).then(|| {
            format!(
                "{}: expected {} but was {} ({})",
                result.name,
                self.status().as_str(),
                result.status.as_str(),
                result.cause.as_deref().unwrap_or("no cause")
            )
        })
    }
}

/// Root of the YAML fixtures.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Configuration writing reports to `report_dir` with short receive timeouts.
pub fn fixture_config(report_dir: &Path) -> CitrusConfig {
    let mut config = CitrusConfig::default();
    config.citrus.report_dir = report_dir.to_path_buf();
    config.citrus.receive_timeout_ms = 2000;
    config.citrus.flow_reporter = true;
    config
        .variables
        .insert("fixtureUser".to_owned(), "citrus".to_owned());
    config
}

/// Loads and runs every test under `dir`.
///
/// # Errors
/// Returns an error if a fixture cannot be loaded.
pub async fn run_fixtures(dir: &Path, report_dir: &Path) -> Result<TestResults, LoadError> {
    let citrus = Citrus::new(fixture_config(report_dir));
    let tests = citrus.load_tests(dir)?;
    debug!("Running {} fixture(s) from {}", tests.len(), dir.display());
    Ok(citrus.run_suite(&tests).await)
}

/// Mismatches between `results` and `expectation`, one line per test.
pub fn verify(results: &TestResults, expectation: Expectation) -> Vec<String> {
    results
        .results()
        .iter()
        .filter_map(|result| expectation.mismatch(result))
        .collect()
}

#[cfg(test)]
mod tests {
    use citrus_core::Error;

    use super::*;

    #[test]
    fn test_expectation_for_dir() {
        assert_eq!(
            Expectation::for_dir(Path::new("fixtures/failing")),
            Some(Expectation::Failing)
        );
        assert_eq!(Expectation::for_dir(Path::new("fixtures/other")), None);
    }

    #[test]
    fn test_mismatch_message() {
        let result = TestResult::failed("broken", "", &Error::Runtime("boom".to_owned()));
        assert_eq!(Expectation::Failing.mismatch(&result), None);
        assert_eq!(
            Expectation::Passing.mismatch(&result).unwrap(),
            "broken: expected SUCCESS but was FAILED (boom)"
        );
    }
}
