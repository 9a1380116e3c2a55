//! Timer container and the action stopping timers.

use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;

use async_trait::async_trait;
use tokio::select;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use citrus_core::{Result, TestContext};

use crate::action::{ActionRef, TestAction, run_actions};

static TIMER_IDS: AtomicUsize = AtomicUsize::new(0);

/// Runs the nested actions repeatedly at a fixed interval.
///
/// Each run sets `<timer id>-index` to the 1-based run number. The timer
/// ends after `repeat_count` runs, on the first failure, or when a stop
/// timer action names its id. A forked timer runs in the background and
/// records its failure in the context.
#[derive(Clone)]
pub struct Timer {
    id: String,
    interval: Duration,
    delay: Duration,
    repeat_count: u64,
    fork: bool,
    actions: Vec<ActionRef>,
}

impl Timer {
    /// Interval used unless configured otherwise.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

    /// Timer with a generated id running `actions` until stopped.
    pub fn new(actions: Vec<ActionRef>) -> Self {
        Self {
            id: format!("citrus-timer-{}", TIMER_IDS.fetch_add(1, Ordering::Relaxed) + 1),
            interval: Self::DEFAULT_INTERVAL,
            delay: Duration::ZERO,
            repeat_count: u64::MAX,
            fork: false,
            actions,
        }
    }

    /// Sets the timer id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the pause between runs.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the pause before the first run.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Limits the number of runs.
    #[must_use]
    pub fn with_repeat_count(mut self, repeat_count: u64) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    /// Runs the timer in the background.
    #[must_use]
    pub fn with_fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    /// Timer id.
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn run(self, token: CancellationToken, context: TestContext) -> Result<()> {
        let mut ticks = interval_at(Instant::now() + self.delay, self.interval.max(Duration::from_millis(1)));
        let index_variable = format!("{}-index", self.id);

        let mut runs = 0;
        while runs < self.repeat_count {
            select! {
                biased;
                () = token.cancelled() => {}
                _ = ticks.tick() => {}
            }
            if token.is_cancelled() {
                info!("Timer '{}' stopped after {runs} run(s)", self.id);
                return Ok(());
            }
            runs += 1;
            debug!("Timer '{}' run {runs}", self.id);
            context.set_variable(&index_variable, runs.to_string())?;
            if let Err(error) = run_actions(&self.actions, &context).await {
                warn!("Timer '{}' failed in run {runs}", self.id);
                context.stop_timer(&self.id);
                return Err(error);
            }
        }
        context.stop_timer(&self.id);
        info!("Timer '{}' complete after {runs} run(s)", self.id);
        Ok(())
    }
}

#[async_trait]
impl TestAction for Timer {
    fn name(&self) -> &str {
        "timer"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let token = CancellationToken::new();
        context.register_timer(self.id.clone(), token.clone());

        if !self.fork {
            return self.clone().run(token, context.clone()).await;
        }

        info!("Forking timer '{}'", self.id);
        let timer = self.clone();
        let task_context = context.clone();
        tokio::spawn(async move {
            let recorder = task_context.clone();
            if let Err(error) = timer.run(token, task_context).await {
                recorder.add_exception(error);
            }
        });
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

/// Stops a running timer, or all timers when no id is given.
#[derive(Debug, Clone, Default)]
pub struct StopTimerAction {
    timer_id: Option<String>,
}

impl StopTimerAction {
    /// Stops the timer with `timer_id`.
    pub fn new(timer_id: impl Into<String>) -> Self {
        Self {
            timer_id: Some(timer_id.into()),
        }
    }

    /// Stops every timer of the test.
    pub fn all() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestAction for StopTimerAction {
    fn name(&self) -> &str {
        "stop-timer"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        match &self.timer_id {
            Some(timer_id) => {
                let timer_id = context.replace_dynamic_content(timer_id)?;
                if context.stop_timer(&timer_id) {
                    info!("Stopped timer '{timer_id}'");
                } else {
                    warn!("No running timer with id '{timer_id}'");
                }
            }
            None => {
                context.stop_timers();
                info!("Stopped all timers");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::sleep;

    use crate::action::testing::CountingAction;
    use crate::actions::{FailAction, SleepAction};

    use super::*;

    #[tokio::test]
    async fn test_timer_runs_repeat_count_times() {
        let counting = CountingAction::new();
        let context = TestContext::default();
        Timer::new(vec![Arc::clone(&counting) as ActionRef])
            .with_id("ticker")
            .with_interval(Duration::from_millis(5))
            .with_repeat_count(3)
            .execute(&context)
            .await
            .unwrap();

        assert_eq!(counting.count(), 3);
        assert_eq!(context.get_variable("ticker-index").unwrap(), "3");
        assert!(!context.stop_timer("ticker"));
    }

    #[tokio::test]
    async fn test_timer_stops_on_failure() {
        let error = Timer::new(vec![Arc::new(FailAction::new("tick failed"))])
            .with_interval(Duration::from_millis(5))
            .execute(&TestContext::default())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "tick failed");
    }

    #[tokio::test]
    async fn test_forked_timer_is_stoppable() {
        let counting = CountingAction::new();
        let context = TestContext::default();
        Timer::new(vec![Arc::clone(&counting) as ActionRef])
            .with_id("background")
            .with_interval(Duration::from_millis(5))
            .with_fork(true)
            .execute(&context)
            .await
            .unwrap();

        sleep(Duration::from_millis(50)).await;
        StopTimerAction::new("background").execute(&context).await.unwrap();
        let stopped_at = counting.count();
        assert!(stopped_at >= 1);

        sleep(Duration::from_millis(30)).await;
        assert!(counting.count() <= stopped_at + 1);
        assert!(context.is_success());
    }

    #[tokio::test]
    async fn test_timer_stopped_by_own_action_runs_once() {
        for _ in 0..20 {
            let counting = CountingAction::new();
            let context = TestContext::default();
            Timer::new(vec![
                Arc::clone(&counting) as ActionRef,
                Arc::new(SleepAction::of(Duration::from_millis(15))),
                Arc::new(StopTimerAction::new("self-stopping")),
            ])
            .with_id("self-stopping")
            .with_interval(Duration::from_millis(2))
            .with_repeat_count(5)
            .execute(&context)
            .await
            .unwrap();

            assert_eq!(counting.count(), 1);
            assert_eq!(context.get_variable("self-stopping-index").unwrap(), "1");
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let first = Timer::new(Vec::new());
        let second = Timer::new(Vec::new());
        assert_ne!(first.id(), second.id());
        assert!(first.id().starts_with("citrus-timer-"));
    }
}
