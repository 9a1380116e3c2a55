//! Conditional execution and failure handling containers.

use async_trait::async_trait;
use tracing::info;

use citrus_core::matcher::expression::{
    is_validation_matcher_expression, resolve_validation_matcher,
};
use citrus_core::{Error, Result, TestContext};

use crate::action::{ActionRef, TestAction, run_actions};
use crate::containers::{ANY_ERROR_KIND, evaluate_condition, matches_error_kind};

/// Runs the nested actions only when the condition holds.
#[derive(Clone)]
pub struct Conditional {
    condition: String,
    actions: Vec<ActionRef>,
}

impl Conditional {
    /// Runs `actions` when `condition` evaluates to true.
    pub fn new(condition: impl Into<String>, actions: Vec<ActionRef>) -> Self {
        Self {
            condition: condition.into(),
            actions,
        }
    }
}

#[async_trait]
impl TestAction for Conditional {
    fn name(&self) -> &str {
        "conditional"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        if evaluate_condition(&self.condition, None, context)? {
            info!("Condition [ {} ] evaluates to true, executing nested actions", self.condition);
            run_actions(&self.actions, context).await
        } else {
            info!("Condition [ {} ] evaluates to false, not executing nested actions", self.condition);
            Ok(())
        }
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

/// Expects the nested action to fail with a given error kind and message.
///
/// The expected message may be a validation matcher expression.
#[derive(Clone)]
pub struct Assert {
    action: [ActionRef; 1],
    error_kind: Option<String>,
    message: Option<String>,
}

impl Assert {
    /// Expects `action` to fail.
    pub fn new(action: ActionRef) -> Self {
        Self {
            action: [action],
            error_kind: None,
            message: None,
        }
    }

    /// Expected error kind, e.g. `ValidationError`.
    #[must_use]
    pub fn with_error_kind(mut self, kind: impl Into<String>) -> Self {
        self.error_kind = Some(kind.into());
        self
    }

    /// Expected error message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn expected_kind(&self) -> &str {
        self.error_kind.as_deref().unwrap_or(ANY_ERROR_KIND)
    }

    fn validate_message(&self, error: &Error, context: &TestContext) -> Result<()> {
        let Some(expected) = &self.message else {
            return Ok(());
        };
        let actual = error.detail();
        if is_validation_matcher_expression(expected) {
            return resolve_validation_matcher("message", Some(actual.as_str()), expected, context);
        }
        let expected = context.replace_dynamic_content(expected)?;
        if expected != actual {
            return Err(Error::validation(format!(
                "Validation failed for asserted exception message - expected: '{expected}' but was: '{actual}'"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TestAction for Assert {
    fn name(&self) -> &str {
        "assert"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let [action] = &self.action;
        let Err(error) = action.execute(context).await else {
            return Err(Error::validation(format!(
                "Missing asserted exception '{}'",
                self.expected_kind()
            )));
        };

        info!("Validating caught failure: {error}");
        if !matches_error_kind(self.error_kind.as_deref(), &error) {
            return Err(Error::validation(format!(
                "Validation failed for asserted exception type - expected: '{}' but was: '{}'",
                self.expected_kind(),
                error.kind()
            )));
        }
        self.validate_message(&error, context)?;
        info!("Assert exception validation successful: All values OK");
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.action
    }
}

/// Runs each nested action and swallows failures of the given kind.
#[derive(Clone)]
pub struct Catch {
    error_kind: Option<String>,
    actions: Vec<ActionRef>,
}

impl Catch {
    /// Catches every failure of `actions`.
    pub fn new(actions: Vec<ActionRef>) -> Self {
        Self {
            error_kind: None,
            actions,
        }
    }

    /// Only catches failures of `kind`.
    #[must_use]
    pub fn with_error_kind(mut self, kind: impl Into<String>) -> Self {
        self.error_kind = Some(kind.into());
        self
    }
}

#[async_trait]
impl TestAction for Catch {
    fn name(&self) -> &str {
        "catch"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        for action in &self.actions {
            if action.is_disabled(context) {
                continue;
            }
            match action.execute(context).await {
                Ok(()) => {}
                Err(error) if matches_error_kind(self.error_kind.as_deref(), &error) => {
                    info!("Caught failure {}: {error}", error.kind());
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use citrus_core::TestContextFactory;
    use citrus_validation::default_matcher_registry;

    use crate::action::testing::CountingAction;
    use crate::actions::{EchoAction, FailAction};

    use super::*;

    fn context() -> TestContext {
        TestContextFactory::new()
            .with_matcher_registry(default_matcher_registry())
            .with_global_variable("limit", "5")
            .create_context()
    }

    #[tokio::test]
    async fn test_conditional() {
        let counting = CountingAction::new();
        let context = context();
        Conditional::new("${limit} gt 3", vec![Arc::clone(&counting) as ActionRef])
            .execute(&context)
            .await
            .unwrap();
        Conditional::new("1 = 2", vec![Arc::clone(&counting) as ActionRef])
            .execute(&context)
            .await
            .unwrap();
        Conditional::new("@contains('x')@", vec![Arc::clone(&counting) as ActionRef])
            .execute(&context)
            .await
            .unwrap();
        assert_eq!(counting.count(), 1);
    }

    #[tokio::test]
    async fn test_assert_matching_failure() {
        let context = context();
        Assert::new(Arc::new(FailAction::new("Something went wrong")))
            .with_error_kind("RuntimeError")
            .with_message("Something went wrong")
            .execute(&context)
            .await
            .unwrap();

        Assert::new(Arc::new(FailAction::new("Order 42 rejected")))
            .with_message("@startsWith('Order')@")
            .execute(&context)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_assert_mismatches() {
        let context = context();
        let missing = Assert::new(Arc::new(EchoAction::new("all good")))
            .execute(&context)
            .await
            .unwrap_err();
        assert_eq!(
            missing.to_string(),
            "Validation failed: Missing asserted exception 'RuntimeError'"
        );

        let wrong_kind = Assert::new(Arc::new(FailAction::new("boom")))
            .with_error_kind("EndpointError")
            .execute(&context)
            .await
            .unwrap_err();
        assert!(wrong_kind.is_validation());

        let wrong_message = Assert::new(Arc::new(FailAction::new("boom")))
            .with_message("bang")
            .execute(&context)
            .await
            .unwrap_err();
        assert_eq!(
            wrong_message.detail(),
            "Validation failed for asserted exception message - expected: 'bang' but was: 'boom'"
        );
    }

    #[tokio::test]
    async fn test_catch() {
        let context = context();
        let after = CountingAction::new();
        Catch::new(vec![
            Arc::new(FailAction::new("ignored")),
            Arc::clone(&after) as ActionRef,
        ])
        .execute(&context)
        .await
        .unwrap();
        assert_eq!(after.count(), 1);

        let error = Catch::new(vec![Arc::new(FailAction::new("not caught"))])
            .with_error_kind("ValidationError")
            .execute(&context)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "not caught");
    }
}
