//! Loop containers.
//!
//! All loops keep their counter in a test variable (`i` by default) so
//! nested actions and the condition can use it.

use core::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use citrus_core::{Error, Result, TestContext};

use crate::action::{ActionRef, TestAction, run_actions};
use crate::containers::evaluate_condition;

/// Default loop counter variable.
pub const DEFAULT_INDEX_NAME: &str = "i";

/// Counter settings shared by the loop containers.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LoopCounter {
    condition: String,
    index_name: String,
    start: i64,
}

impl LoopCounter {
    fn new(condition: String) -> Self {
        Self {
            condition,
            index_name: DEFAULT_INDEX_NAME.to_owned(),
            start: 1,
        }
    }

    fn check(&self, index: i64, context: &TestContext) -> Result<bool> {
        context.set_variable(&self.index_name, index.to_string())?;
        evaluate_condition(&self.condition, Some((&self.index_name, index)), context)
    }

    fn advance(&self, index: i64, step: i64) -> Result<i64> {
        index.checked_add(step).ok_or_else(|| {
            Error::runtime(format!(
                "Loop counter '{}' overflowed after {index} with step {step}",
                self.index_name
            ))
        })
    }

    async fn run(&self, index: i64, actions: &[ActionRef], context: &TestContext) -> Result<()> {
        context.set_variable(&self.index_name, index.to_string())?;
        run_actions(actions, context).await
    }
}

/// Runs the nested actions while the condition holds.
#[derive(Clone)]
pub struct Iterate {
    counter: LoopCounter,
    step: i64,
    actions: Vec<ActionRef>,
}

impl Iterate {
    /// Loop over `actions` while `condition` is true.
    pub fn new(condition: impl Into<String>, actions: Vec<ActionRef>) -> Self {
        Self {
            counter: LoopCounter::new(condition.into()),
            step: 1,
            actions,
        }
    }

    /// Sets the counter variable name.
    #[must_use]
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.counter.index_name = name.into();
        self
    }

    /// Sets the first counter value.
    #[must_use]
    pub fn with_start(mut self, start: i64) -> Self {
        self.counter.start = start;
        self
    }

    /// Sets the counter increment.
    #[must_use]
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }
}

#[async_trait]
impl TestAction for Iterate {
    fn name(&self) -> &str {
        "iterate"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let mut index = self.counter.start;
        while self.counter.check(index, context)? {
            debug!("Iteration {index}");
            self.counter.run(index, &self.actions, context).await?;
            index = self.counter.advance(index, self.step)?;
        }
        info!("Iterate container finished after condition '{}' failed", self.counter.condition);
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

/// Runs the nested actions at least once, until the condition holds.
#[derive(Clone)]
pub struct RepeatUntilTrue {
    counter: LoopCounter,
    actions: Vec<ActionRef>,
}

impl RepeatUntilTrue {
    /// Repeats `actions` until `condition` is true.
    pub fn new(condition: impl Into<String>, actions: Vec<ActionRef>) -> Self {
        Self {
            counter: LoopCounter::new(condition.into()),
            actions,
        }
    }

    /// Sets the counter variable name.
    #[must_use]
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.counter.index_name = name.into();
        self
    }

    /// Sets the first counter value.
    #[must_use]
    pub fn with_start(mut self, start: i64) -> Self {
        self.counter.start = start;
        self
    }
}

#[async_trait]
impl TestAction for RepeatUntilTrue {
    fn name(&self) -> &str {
        "repeat"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let mut index = self.counter.start;
        loop {
            self.counter.run(index, &self.actions, context).await?;
            index = self.counter.advance(index, 1)?;
            if self.counter.check(index, context)? {
                break;
            }
        }
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

/// Retries the nested actions on failure until they succeed or the condition holds.
///
/// When the condition ends the loop while the last attempt failed, that
/// failure is returned.
#[derive(Clone)]
pub struct RepeatOnErrorUntilTrue {
    counter: LoopCounter,
    auto_sleep: Duration,
    actions: Vec<ActionRef>,
}

impl RepeatOnErrorUntilTrue {
    /// Pause between attempts unless configured otherwise.
    pub const DEFAULT_AUTO_SLEEP: Duration = Duration::from_millis(1000);

    /// Retries `actions` until they pass or `condition` is true.
    pub fn new(condition: impl Into<String>, actions: Vec<ActionRef>) -> Self {
        Self {
            counter: LoopCounter::new(condition.into()),
            auto_sleep: Self::DEFAULT_AUTO_SLEEP,
            actions,
        }
    }

    /// Sets the counter variable name.
    #[must_use]
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.counter.index_name = name.into();
        self
    }

    /// Sets the first counter value.
    #[must_use]
    pub fn with_start(mut self, start: i64) -> Self {
        self.counter.start = start;
        self
    }

    /// Sets the pause after a failed attempt.
    #[must_use]
    pub fn with_auto_sleep(mut self, auto_sleep: Duration) -> Self {
        self.auto_sleep = auto_sleep;
        self
    }
}

#[async_trait]
impl TestAction for RepeatOnErrorUntilTrue {
    fn name(&self) -> &str {
        "repeat-on-error"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let mut index = self.counter.start;
        let mut last_failure = None;
        while !self.counter.check(index, context)? {
            match self.counter.run(index, &self.actions, context).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    info!("Caught failure '{error}' - performing retry #{index}");
                    last_failure = Some(error);
                    sleep(self.auto_sleep).await;
                    index = self.counter.advance(index, 1)?;
                }
            }
        }

        match last_failure {
            Some(error) => {
                info!("All retries failed - raising last failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}
