//! JSON summary report.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use citrus_core::Result;

use crate::report::TestReporter;
use crate::result::{TestResult, TestResults};

/// File name of the summary report.
pub const RESULTS_FILE_NAME: &str = "citrus-results.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'results> {
    generated: String,
    total: usize,
    success: usize,
    failed: usize,
    skipped: usize,
    success_rate: f64,
    duration_ms: u128,
    results: &'results [TestResult],
}

/// Writes `citrus-results.json` into the report directory.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    report_dir: PathBuf,
}

impl JsonReporter {
    /// Reporter writing into `report_dir`, created on demand.
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
        }
    }

    /// Path of the generated file.
    pub fn report_file(&self) -> PathBuf {
        self.report_dir.join(RESULTS_FILE_NAME)
    }

    /// Summary document for `results`.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn render(results: &TestResults) -> Result<String> {
        let summary = Summary {
            generated: Utc::now().to_rfc3339(),
            total: results.len(),
            success: results.success_count(),
            failed: results.failed_count(),
            skipped: results.skipped_count(),
            success_rate: results.success_rate(),
            duration_ms: results.total_duration().as_millis(),
            results: results.results(),
        };
        Ok(serde_json::to_string_pretty(&summary)?)
    }
}

impl TestReporter for JsonReporter {
    fn name(&self) -> &str {
        "json"
    }

    fn generate(&self, results: &TestResults) -> Result<()> {
        fs::create_dir_all(&self.report_dir)?;
        let path = self.report_file();
        fs::write(&path, Self::render(results)?)?;
        info!("Generated JSON test report: {}", path.display());
        Ok(())
    }
}
