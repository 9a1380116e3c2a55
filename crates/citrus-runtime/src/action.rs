//! Test action abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use citrus_core::{Result, TestContext};

/// Shared handle to an action.
pub type ActionRef = Arc<dyn TestAction>;

/// A single executable step of a test.
#[async_trait]
pub trait TestAction: Send + Sync {
    /// Action name as shown in logs and reports, e.g. `echo` or `receive`.
    fn name(&self) -> &str;

    /// Optional free text description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Disabled actions are skipped by the test runner and by containers.
    fn is_disabled(&self, _context: &TestContext) -> bool {
        false
    }

    /// Runs the action.
    ///
    /// # Errors
    /// Returns the failure that fails the test.
    async fn execute(&self, context: &TestContext) -> Result<()>;

    /// Nested actions of a container, empty for plain actions.
    fn nested_actions(&self) -> &[ActionRef] {
        &[]
    }
}

/// Runs `actions` in order, skipping disabled ones and stopping at the first failure.
///
/// # Errors
/// Returns the first action failure.
pub async fn run_actions(actions: &[ActionRef], context: &TestContext) -> Result<()> {
    for action in actions {
        if action.is_disabled(context) {
            debug!("Skipping disabled action '{}'", action.name());
            continue;
        }
        action.execute(context).await?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::{CountingAction, DisabledAction};
    use super::*;

    #[tokio::test]
    async fn test_run_actions_skips_disabled() {
        let counting = CountingAction::new();
        let actions: Vec<ActionRef> = vec![
            Arc::clone(&counting) as ActionRef,
            Arc::new(DisabledAction),
            Arc::clone(&counting) as ActionRef,
        ];

        run_actions(&actions, &TestContext::default()).await.unwrap();
        assert_eq!(counting.count(), 2);
    }

    #[tokio::test]
    async fn test_run_actions_stops_at_failure() {
        let failing = CountingAction::failing_until(1);
        let after = CountingAction::new();
        let actions: Vec<ActionRef> = vec![Arc::clone(&failing) as ActionRef, Arc::clone(&after) as ActionRef];

        let error = run_actions(&actions, &TestContext::default()).await.unwrap_err();
        assert_eq!(error.to_string(), "Run 1 failed");
        assert_eq!(after.count(), 0);
    }
}
