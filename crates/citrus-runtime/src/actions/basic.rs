//! Actions that only touch the test context: echo, sleep, fail and variables.

use core::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use indexmap::IndexMap;
use tokio::time::sleep;
use tracing::info;

use citrus_core::{Error, Result, TestContext};

use crate::action::TestAction;

/// Logs a message with dynamic content resolved.
#[derive(Debug, Clone, Default)]
pub struct EchoAction {
    message: Option<String>,
}

impl EchoAction {
    /// Echo of `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Echo of the current time.
    pub fn timestamp() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestAction for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        match &self.message {
            Some(message) => info!("{}", context.replace_dynamic_content(message)?),
            None => info!("Citrus test {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        }
        Ok(())
    }
}

/// Pauses the test.
///
/// The time may contain dynamic content and is read in milliseconds, with
/// an optional decimal fraction.
#[derive(Debug, Clone)]
pub struct SleepAction {
    time: String,
}

impl SleepAction {
    /// Default pause of five seconds.
    pub const DEFAULT_TIME: &'static str = "5000";

    /// Pause of `millis` milliseconds, may contain dynamic content.
    pub fn new(millis: impl Into<String>) -> Self {
        Self { time: millis.into() }
    }

    /// Pause of a fixed duration.
    pub fn of(duration: Duration) -> Self {
        Self::new(duration.as_millis().to_string())
    }
}

impl Default for SleepAction {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIME)
    }
}

#[async_trait]
impl TestAction for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let time = context.replace_dynamic_content(&self.time)?;
        let millis: f64 = time.trim().parse().map_err(|_| {
            Error::runtime(format!("Invalid sleep time '{time}' - expected milliseconds"))
        })?;
        if millis.is_sign_negative() || !millis.is_finite() {
            return Err(Error::runtime(format!("Invalid sleep time '{time}'")));
        }

        info!("Sleeping {time} milliseconds");
        sleep(Duration::from_secs_f64(millis / 1000.0)).await;
        info!("Returning after {time} milliseconds");
        Ok(())
    }
}

/// Fails the test with a message.
#[derive(Debug, Clone)]
pub struct FailAction {
    message: String,
}

impl FailAction {
    /// Default failure text.
    pub const DEFAULT_MESSAGE: &'static str = "Generated error to interrupt test execution";

    /// Failure with `message`, may contain dynamic content.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailAction {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MESSAGE)
    }
}

#[async_trait]
impl TestAction for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        Err(Error::Runtime(context.replace_dynamic_content(&self.message)?))
    }
}

/// Defines test variables. Values may reference variables and functions.
#[derive(Debug, Clone, Default)]
pub struct CreateVariablesAction {
    variables: IndexMap<String, String>,
}

impl CreateVariablesAction {
    /// Action creating `variables` in order.
    pub fn new(variables: IndexMap<String, String>) -> Self {
        Self { variables }
    }

    /// Adds a variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl TestAction for CreateVariablesAction {
    fn name(&self) -> &str {
        "create-variables"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        for (name, value) in &self.variables {
            let value = context.resolve_dynamic_value(value)?;
            info!("Setting variable: {name} to value: {value}");
            context.set_variable(name, value)?;
        }
        Ok(())
    }
}

/// Logs variables, all of them when no names are given.
#[derive(Debug, Clone, Default)]
pub struct TraceVariablesAction {
    names: Vec<String>,
}

impl TraceVariablesAction {
    /// Traces the named variables.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl TestAction for TraceVariablesAction {
    fn name(&self) -> &str {
        "trace"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        info!("Trace variables");
        if self.names.is_empty() {
            for (name, value) in context.variables() {
                info!("Variable: {name} = {value}");
            }
            return Ok(());
        }
        for name in &self.names {
            info!("Variable: {name} = {}", context.get_variable(name)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_echo_resolves_variables() {
        let context = TestContext::default();
        context.set_variable("user", "Citrus").unwrap();
        EchoAction::new("Hello ${user}").execute(&context).await.unwrap();

        let error = EchoAction::new("Hello ${unknown}")
            .execute(&context)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NoSuchVariable(_)));
    }

    #[tokio::test]
    async fn test_sleep() {
        let context = TestContext::default();
        context.set_variable("pause", "20").unwrap();

        let start = Instant::now();
        SleepAction::new("${pause}").execute(&context).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));

        assert!(SleepAction::new("soon").execute(&context).await.is_err());
        assert!(SleepAction::new("-5").execute(&context).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_message() {
        let context = TestContext::default();
        context.set_variable("reason", "broken").unwrap();
        let error = FailAction::new("Service is ${reason}")
            .execute(&context)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Service is broken");

        let error = FailAction::default().execute(&context).await.unwrap_err();
        assert_eq!(error.to_string(), FailAction::DEFAULT_MESSAGE);
    }

    #[tokio::test]
    async fn test_create_variables() {
        let context = TestContext::default();
        CreateVariablesAction::default()
            .with_variable("first", "Hello")
            .with_variable("second", "${first} World")
            .with_variable("upper", "citrus:upperCase('${second}')")
            .execute(&context)
            .await
            .unwrap();

        assert_eq!(context.get_variable("second").unwrap(), "Hello World");
        assert_eq!(context.get_variable("upper").unwrap(), "HELLO WORLD");
    }

    #[tokio::test]
    async fn test_trace_unknown_variable_fails() {
        let context = TestContext::default();
        context.set_variable("known", "1").unwrap();
        TraceVariablesAction::default().execute(&context).await.unwrap();
        TraceVariablesAction::new(vec!["known".to_owned()])
            .execute(&context)
            .await
            .unwrap();
        assert!(
            TraceVariablesAction::new(vec!["unknown".to_owned()])
                .execute(&context)
                .await
                .is_err()
        );
    }
}
