//! Runs every YAML fixture and checks it against its directory's expectation.

#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::assertions_on_result_states,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::fs;
use std::path::Path;

use integration_tests::{Expectation, fixtures_dir, run_fixtures, verify};
use serde_json::Value;
use tempfile::TempDir;

async fn run_expecting(name: &str, expectation: Expectation) -> (usize, TempDir) {
    let dir = fixtures_dir().join(name);
    assert_eq!(Expectation::for_dir(&dir), Some(expectation));

    let reports = TempDir::new().unwrap();
    let results = run_fixtures(&dir, reports.path())
        .await
        .unwrap_or_else(|error| panic!("Failed to load fixtures in {name}: {error}"));
    assert!(!results.is_empty(), "No fixtures found in {name}");

    let mismatches = verify(&results, expectation);
    assert!(
        mismatches.is_empty(),
        "Fixtures in {name} did not meet expectations:\n{}",
        mismatches.join("\n")
    );
    (results.len(), reports)
}

fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|error| panic!("Failed to read {}: {error}", path.display()));
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn test_passing_fixtures() {
    let (count, reports) = run_expecting("passing", Expectation::Passing).await;
    let summary = read_json(&reports.path().join("citrus-results.json"));
    assert_eq!(summary["total"], count);
    assert_eq!(summary["success"], count);
    assert_eq!(summary["successRate"], 100.0);
}

#[tokio::test]
async fn test_failing_fixtures() {
    let (count, reports) = run_expecting("failing", Expectation::Failing).await;
    let summary = read_json(&reports.path().join("citrus-results.json"));
    assert_eq!(summary["failed"], count);

    let causes: Vec<String> = summary["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|result| result["cause"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert!(causes.iter().any(|cause| cause.contains("Failing on purpose")));
    assert!(causes.iter().any(|cause| cause.contains("notDefined")));
}

#[tokio::test]
async fn test_skipped_fixtures() {
    run_expecting("skipped", Expectation::Skipped).await;
}

#[tokio::test]
async fn test_flow_report_records_failed_action() {
    let (_, reports) = run_expecting("failing", Expectation::Failing).await;
    let flow = read_json(&reports.path().join("finally-runs-after-failure-flow.json"));
    let actions = flow.as_array().unwrap();

    assert_eq!(actions[0]["path"], "actions.0.fail");
    assert_eq!(actions[0]["error"], "Failing on purpose");
    assert!(
        actions
            .iter()
            .all(|action| action["name"].as_str() != Some("echo")),
        "Actions after the failure must not run"
    );
}

#[test]
fn test_every_fixture_dir_has_expectation() {
    for entry in fs::read_dir(fixtures_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            assert!(
                Expectation::for_dir(&path).is_some(),
                "Unexpected fixture directory {}",
                path.display()
            );
        }
    }
}
