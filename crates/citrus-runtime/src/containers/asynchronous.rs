//! Async container.

use async_trait::async_trait;
use tracing::{info, warn};

use citrus_core::{Result, TestContext};

use crate::action::{ActionRef, TestAction, run_actions};

/// Runs the nested actions on a separate task and returns immediately.
///
/// Success actions run after the nested actions pass, error actions after
/// they fail. A failure is recorded in the context so the test fails when
/// it finishes; the test waits for the task before finishing.
#[derive(Clone, Default)]
pub struct Async {
    actions: Vec<ActionRef>,
    success_actions: Vec<ActionRef>,
    error_actions: Vec<ActionRef>,
}

impl Async {
    /// Async execution of `actions`.
    pub fn new(actions: Vec<ActionRef>) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    /// Actions run after success.
    #[must_use]
    pub fn with_success_actions(mut self, actions: Vec<ActionRef>) -> Self {
        self.success_actions = actions;
        self
    }

    /// Actions run after failure.
    #[must_use]
    pub fn with_error_actions(mut self, actions: Vec<ActionRef>) -> Self {
        self.error_actions = actions;
        self
    }
}

async fn run_async(
    actions: Vec<ActionRef>,
    success_actions: Vec<ActionRef>,
    error_actions: Vec<ActionRef>,
    context: TestContext,
) {
    match run_actions(&actions, &context).await {
        Ok(()) => {
            if let Err(error) = run_actions(&success_actions, &context).await {
                context.add_exception(error);
            }
        }
        Err(error) => {
            warn!("Async container failed: {error}");
            context.add_exception(error);
            if let Err(error) = run_actions(&error_actions, &context).await {
                context.add_exception(error);
            }
        }
    }
}

#[async_trait]
impl TestAction for Async {
    fn name(&self) -> &str {
        "async"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        info!("Starting async container with {} action(s)", self.actions.len());
        let handle = tokio::spawn(run_async(
            self.actions.clone(),
            self.success_actions.clone(),
            self.error_actions.clone(),
            context.clone(),
        ));
        context.register_async(handle);
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::action::testing::CountingAction;
    use crate::actions::FailAction;

    use super::*;

    async fn wait_for(context: &TestContext) {
        for handle in context.drain_async() {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_success_actions() {
        let context = TestContext::default();
        let body = CountingAction::new();
        let success = CountingAction::new();
        let error = CountingAction::new();

        Async::new(vec![Arc::clone(&body) as ActionRef])
            .with_success_actions(vec![Arc::clone(&success) as ActionRef])
            .with_error_actions(vec![Arc::clone(&error) as ActionRef])
            .execute(&context)
            .await
            .unwrap();
        wait_for(&context).await;

        assert_eq!((body.count(), success.count(), error.count()), (1, 1, 0));
        assert!(context.is_success());
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let context = TestContext::default();
        let error = CountingAction::new();

        Async::new(vec![Arc::new(FailAction::new("async boom"))])
            .with_error_actions(vec![Arc::clone(&error) as ActionRef])
            .execute(&context)
            .await
            .unwrap();
        wait_for(&context).await;

        assert_eq!(error.count(), 1);
        assert_eq!(context.first_exception().unwrap().to_string(), "async boom");
    }
}
