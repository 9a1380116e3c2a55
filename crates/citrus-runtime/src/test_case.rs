//! Test case definition and its execution lifecycle.

use core::fmt;
use core::time::Duration;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use citrus_core::settings::{TEST_NAME_VARIABLE, TEST_PACKAGE_VARIABLE};
use citrus_core::{Error, Result, TestContext};

use crate::action::{ActionRef, run_actions};
use crate::endpoint::EndpointDefinition;
use crate::hooks::TestHook;
use crate::report::TestListeners;
use crate::result::TestResult;

/// Lifecycle status of a test definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    /// Work in progress.
    Draft,
    /// Ready for review.
    ReadyForReview,
    /// Not executed.
    Disabled,
    /// Complete.
    #[default]
    Final,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Draft => "DRAFT",
            Self::ReadyForReview => "READY_FOR_REVIEW",
            Self::Disabled => "DISABLED",
            Self::Final => "FINAL",
        })
    }
}

/// A named sequence of test actions.
#[derive(Clone, Default)]
pub struct TestCase {
    name: String,
    package: String,
    description: Option<String>,
    author: Option<String>,
    status: TestStatus,
    groups: Vec<String>,
    variables: IndexMap<String, String>,
    parameters: IndexMap<String, String>,
    endpoints: Vec<EndpointDefinition>,
    actions: Vec<ActionRef>,
    finally: Vec<ActionRef>,
    timeout: Option<Duration>,
    source: Option<PathBuf>,
}

impl TestCase {
    /// Empty test called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the package.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: TestStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the groups.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Adds a test variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Adds a test parameter. Parameters are set before variables.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Declares an endpoint registered before the test runs.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointDefinition) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn with_action(mut self, action: ActionRef) -> Self {
        self.actions.push(action);
        self
    }

    /// Appends several actions.
    #[must_use]
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = ActionRef>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Appends an action run after the test whatever its outcome.
    #[must_use]
    pub fn with_finally(mut self, action: ActionRef) -> Self {
        self.finally.push(action);
        self
    }

    /// Sets how long the test waits for async actions.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remembers the file the test was loaded from.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Test package, empty when not set.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Author.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Status.
    pub fn status(&self) -> TestStatus {
        self.status
    }

    /// Groups.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Variables in declaration order.
    pub fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    /// Declared endpoints.
    pub fn endpoints(&self) -> &[EndpointDefinition] {
        &self.endpoints
    }

    /// Main actions.
    pub fn actions(&self) -> &[ActionRef] {
        &self.actions
    }

    /// Number of main actions.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Finally actions.
    pub fn finally_actions(&self) -> &[ActionRef] {
        &self.finally
    }

    /// Async wait timeout set on the test itself.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// File the test was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether the test belongs to one of `groups`. An empty filter matches all tests.
    pub fn in_any_group(&self, groups: &[String]) -> bool {
        groups.is_empty() || groups.iter().any(|group| self.groups.contains(group))
    }
}

/// Runs one test through its lifecycle.
pub(crate) struct TestRunner<'run> {
    pub(crate) test: &'run TestCase,
    pub(crate) context: TestContext,
    pub(crate) listeners: &'run TestListeners,
    pub(crate) before: &'run [TestHook],
    pub(crate) after: &'run [TestHook],
    pub(crate) default_timeout: Duration,
}

impl TestRunner<'_> {
    pub(crate) async fn run(self) -> TestResult {
        let test = self.test;
        if test.status == TestStatus::Disabled {
            info!("Skipping test '{}' with status {}", test.name, test.status);
            self.listeners.on_test_skipped(test);
            return TestResult::skipped(&test.name, &test.package);
        }

        let started = Instant::now();
        self.listeners.on_test_start(test);

        let mut failure = self.start().await.err();
        if failure.is_none() {
            failure = self.execute_actions().await.err();
        }
        self.finish(failure, started).await
    }

    async fn start(&self) -> Result<()> {
        let test = self.test;
        let context = &self.context;
        context.set_variable(TEST_NAME_VARIABLE, test.name.as_str())?;
        context.set_variable(TEST_PACKAGE_VARIABLE, test.package.as_str())?;

        for (name, value) in &test.parameters {
            context.set_variable(name, context.resolve_dynamic_value(value)?)?;
        }
        for (name, value) in &test.variables {
            context.set_variable(name, context.resolve_dynamic_value(value)?)?;
        }

        for hook in self.before.iter().filter(|hook| hook.applies_to(test)) {
            run_actions(hook.actions(), context)
                .await
                .map_err(|error| Error::Runtime(format!("Before test failed with errors: {error}")))?;
        }
        Ok(())
    }

    async fn execute_actions(&self) -> Result<()> {
        self.execute_numbered(&self.test.actions, 0, true).await
    }

    async fn execute_numbered(
        &self,
        actions: &[ActionRef],
        offset: usize,
        raise_exceptions: bool,
    ) -> Result<()> {
        let test = self.test;
        for (position, action) in actions.iter().enumerate() {
            let index = offset + position;
            if raise_exceptions && let Some(error) = self.take_exception() {
                return Err(error);
            }
            if action.is_disabled(&self.context) {
                self.listeners.on_action_skipped(test, index, action.as_ref());
                continue;
            }

            self.listeners.on_action_start(test, index, action.as_ref());
            match action.execute(&self.context).await {
                Ok(()) => self.listeners.on_action_finish(test, index, action.as_ref()),
                Err(error) => {
                    self.listeners.on_action_failed(test, index, action.as_ref(), &error);
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    fn take_exception(&self) -> Option<Error> {
        let mut exceptions = self.context.take_exceptions().into_iter();
        let first = exceptions.next();
        for ignored in exceptions {
            debug!("Suppressed further failure: {ignored}");
        }
        first
    }

    fn async_timeout(&self) -> Duration {
        self.test.timeout.unwrap_or(self.default_timeout)
    }

    async fn wait_for_async(&self) -> Result<()> {
        let deadline = Instant::now() + self.async_timeout();
        loop {
            let handles = self.context.drain_async();
            if handles.is_empty() {
                return Ok(());
            }
            debug!("Waiting for {} async action(s)", handles.len());
            let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();
            for handle in handles {
                match timeout_at(deadline, handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(join_error)) => {
                        return Err(Error::Runtime(format!("Async action aborted: {join_error}")));
                    }
                    Err(_elapsed) => {
                        for abort in &aborts {
                            abort.abort();
                        }
                        return Err(Error::ActionTimeout(format!(
                            "Failed to wait for test to finish properly - test timeout after {} milliseconds",
                            self.async_timeout().as_millis()
                        )));
                    }
                }
            }
        }
    }

    async fn finish(self, failure: Option<Error>, started: Instant) -> TestResult {
        let test = self.test;
        let mut failure = failure.or_else(|| self.take_exception());
        if failure.is_none()
            && let Err(error) = self.wait_for_async().await
        {
            failure = Some(error);
        }

        if !test.finally.is_empty() {
            info!("Running {} finally action(s)", test.finally.len());
            if let Err(error) = self
                .execute_numbered(&test.finally, test.actions.len(), false)
                .await
            {
                warn!("Finally action failed: {error}");
                if failure.is_none() {
                    failure = Some(error);
                }
            }
        }
        if failure.is_none() {
            failure = self.take_exception();
        }
        self.context.stop_timers();

        let result = match &failure {
            None => TestResult::success(&test.name, &test.package),
            Some(error) => TestResult::failed(&test.name, &test.package, error),
        }
        .with_duration(started.elapsed());

        if result.is_success() {
            self.listeners.on_test_success(test, &result);
        } else {
            self.listeners.on_test_failure(test, &result);
        }

        for hook in self.after.iter().filter(|hook| hook.applies_to(test)) {
            if let Err(error) = run_actions(hook.actions(), &self.context).await {
                warn!("After test failed with errors: {error}");
            }
        }

        self.listeners.on_test_finish(test, &result);
        result
    }
}
