//! Flow report listing the actions each test ran.
//!
//! Each test gets a `<test>-flow.json` file. Actions are addressed by a
//! path of the form `actions.<index>.<name>`; children of containers
//! extend their parent path.

use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use citrus_core::{Error, Result};

use crate::action::TestAction;
use crate::report::{TestActionListener, TestListener, TestReporter};
use crate::result::{TestResult, TestResults};
use crate::test_case::TestCase;

/// One action of the flow.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlowAction {
    /// Action name.
    pub name: String,
    /// Position in the test.
    pub path: String,
    /// Failure text of a failed action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Nested actions of a container.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<FlowAction>,
}

impl FlowAction {
    fn from_action(prefix: &str, index: usize, action: &dyn TestAction) -> Self {
        let path = format!("{prefix}actions.{index}.{}", action.name());
        let children = action
            .nested_actions()
            .iter()
            .enumerate()
            .map(|(child, nested)| Self::from_action(&format!("{path}."), child, nested.as_ref()))
            .collect();
        Self {
            name: action.name().to_owned(),
            path,
            error: None,
            actions: children,
        }
    }
}

/// Flow of one test.
#[derive(Debug, Clone, Serialize)]
pub struct TestFlow {
    /// Test name.
    pub name: String,
    /// Executed top level actions.
    pub actions: Vec<FlowAction>,
    /// Final result, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
}

/// Records executed actions and writes one flow file per test.
#[derive(Debug)]
pub struct TestFlowReporter {
    report_dir: PathBuf,
    flows: Mutex<IndexMap<String, TestFlow>>,
}

impl TestFlowReporter {
    /// Reporter writing into `report_dir`.
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            flows: Mutex::new(IndexMap::new()),
        }
    }

    /// Recorded flow of `test_name`.
    pub fn flow(&self, test_name: &str) -> Option<TestFlow> {
        self.flows.lock().get(test_name).cloned()
    }

    /// Path of the flow file for `test_name`.
    pub fn flow_file(&self, test_name: &str) -> PathBuf {
        let file_name: String = test_name
            .chars()
            .map(|character| {
                if character.is_alphanumeric() || matches!(character, '-' | '_' | '.') {
                    character
                } else {
                    '_'
                }
            })
            .collect();
        self.report_dir.join(format!("{file_name}-flow.json"))
    }

    fn record(&self, test: &TestCase, action: FlowAction) {
        let mut flows = self.flows.lock();
        let flow = flows
            .entry(test.name().to_owned())
            .or_insert_with(|| TestFlow {
                name: test.name().to_owned(),
                actions: Vec::new(),
                result: None,
            });
        flow.actions.push(action);
    }

    fn set_result(&self, test: &TestCase, result: &TestResult) {
        if let Some(flow) = self.flows.lock().get_mut(test.name()) {
            flow.result = Some(result.clone());
        }
    }
}

impl TestListener for TestFlowReporter {
    fn on_test_start(&self, test: &TestCase) {
        self.flows.lock().insert(
            test.name().to_owned(),
            TestFlow {
                name: test.name().to_owned(),
                actions: Vec::new(),
                result: None,
            },
        );
    }

    fn on_test_success(&self, test: &TestCase, result: &TestResult) {
        self.set_result(test, result);
    }

    fn on_test_failure(&self, test: &TestCase, result: &TestResult) {
        self.set_result(test, result);
    }
}

impl TestActionListener for TestFlowReporter {
    fn on_action_finish(&self, test: &TestCase, index: usize, action: &dyn TestAction) {
        self.record(test, FlowAction::from_action("", index, action));
    }

    fn on_action_failed(
        &self,
        test: &TestCase,
        index: usize,
        action: &dyn TestAction,
        error: &Error,
    ) {
        let mut flow_action = FlowAction::from_action("", index, action);
        flow_action.error = Some(error.to_string());
        self.record(test, flow_action);
    }
}

impl TestReporter for TestFlowReporter {
    fn name(&self) -> &str {
        "flow"
    }

    fn generate(&self, _results: &TestResults) -> Result<()> {
        fs::create_dir_all(&self.report_dir)?;
        let flows = self.flows.lock();
        for (name, flow) in flows.iter() {
            let path = self.flow_file(name);
            fs::write(&path, serde_json::to_string_pretty(&flow.actions)?)?;
            info!("Generated test flow report: {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};
    use tempfile::TempDir;

    use crate::action::ActionRef;
    use crate::actions::{EchoAction, FailAction};
    use crate::containers::Sequence;

    use super::*;

    #[test]
    fn test_paths_of_nested_actions() {
        let sequence = Sequence::new(vec![
            Arc::new(EchoAction::new("one")) as ActionRef,
            Arc::new(Sequence::new(vec![Arc::new(EchoAction::new("two"))])),
        ]);
        let flow = FlowAction::from_action("", 2, &sequence);
        assert_eq!(flow.path, "actions.2.sequential");
        assert_eq!(flow.actions[0].path, "actions.2.sequential.actions.0.echo");
        assert_eq!(
            flow.actions[1].actions[0].path,
            "actions.2.sequential.actions.1.sequential.actions.0.echo"
        );
    }

    #[test]
    fn test_generate_writes_flow_file() {
        let dir = TempDir::new().unwrap();
        let reporter = TestFlowReporter::new(dir.path());
        let test = TestCase::new("order flow");

        reporter.on_test_start(&test);
        reporter.on_action_finish(&test, 0, &EchoAction::new("hello"));
        reporter.on_action_failed(&test, 1, &FailAction::new("boom"), &Error::runtime("boom"));
        reporter.generate(&TestResults::new()).unwrap();

        let path = reporter.flow_file("order flow");
        assert!(path.ends_with("order_flow-flow.json"));
        let written: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!([
                {"name": "echo", "path": "actions.0.echo"},
                {"name": "fail", "path": "actions.1.fail", "error": "boom"}
            ])
        );
    }

    #[test]
    fn test_restart_resets_flow() {
        let reporter = TestFlowReporter::new("unused");
        let test = TestCase::new("again");
        reporter.on_test_start(&test);
        reporter.on_action_finish(&test, 0, &EchoAction::new("first"));
        reporter.on_test_start(&test);
        assert!(reporter.flow("again").unwrap().actions.is_empty());
    }
}
