//! Sequential and parallel containers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{info, warn};

use citrus_core::{Error, Result, TestContext};

use crate::action::{ActionRef, TestAction, run_actions};

/// Runs nested actions in order.
#[derive(Clone, Default)]
pub struct Sequence {
    actions: Vec<ActionRef>,
}

impl Sequence {
    /// Sequence of `actions`.
    pub fn new(actions: Vec<ActionRef>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl TestAction for Sequence {
    fn name(&self) -> &str {
        "sequential"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        run_actions(&self.actions, context).await?;
        info!("Action sequence finished successfully");
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

/// Runs every nested action on its own task and waits for all of them.
///
/// All actions run to completion even when some fail; the failure of the
/// first declared failing action is returned.
#[derive(Clone, Default)]
pub struct Parallel {
    actions: Vec<ActionRef>,
}

impl Parallel {
    /// Parallel execution of `actions`.
    pub fn new(actions: Vec<ActionRef>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl TestAction for Parallel {
    fn name(&self) -> &str {
        "parallel"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let mut join_set = JoinSet::new();
        for (index, action) in self.actions.iter().enumerate() {
            if action.is_disabled(context) {
                continue;
            }
            let action = Arc::clone(action);
            let task_context = context.clone();
            join_set.spawn(async move { (index, action.execute(&task_context).await) });
        }

        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((index, Err(error))) => failures.push((index, error)),
                Err(error) => failures.push((
                    usize::MAX,
                    Error::runtime(format!("Parallel action task failed: {error}")),
                )),
            }
        }

        failures.sort_by_key(|(index, _)| *index);
        let mut failures = failures.into_iter().map(|(_, error)| error);
        let Some(first) = failures.next() else {
            return Ok(());
        };
        for other in failures {
            warn!("Additional failure in parallel container: {other}");
        }
        Err(first)
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}
