//! Reusable action templates.

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::info;

use citrus_core::{Result, TestContext};

use crate::action::{ActionRef, TestAction, run_actions};

/// Named group of actions applied with parameters.
///
/// Parameters become variables before the actions run. Their values are
/// resolved against the calling context. With a global context the
/// parameters and any variables the actions create stay visible to the
/// test afterwards; otherwise the template works on a local copy.
#[derive(Clone)]
pub struct Template {
    template_name: String,
    actions: Vec<ActionRef>,
    parameters: IndexMap<String, String>,
    global_context: bool,
}

impl Template {
    /// Template `name` running `actions`.
    pub fn new(name: impl Into<String>, actions: Vec<ActionRef>) -> Self {
        Self {
            template_name: name.into(),
            actions,
            parameters: IndexMap::new(),
            global_context: true,
        }
    }

    /// Sets a parameter, replacing a default of the same name.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Sets several parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: IndexMap<String, String>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Chooses between the test context and a local copy.
    #[must_use]
    pub fn with_global_context(mut self, global_context: bool) -> Self {
        self.global_context = global_context;
        self
    }

    /// Template name.
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Declared parameters with their current values.
    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }
}

#[async_trait]
impl TestAction for Template {
    fn name(&self) -> &str {
        "template"
    }

    fn description(&self) -> Option<&str> {
        Some(&self.template_name)
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        info!(
            "Executing template '{}' with {} embedded action(s)",
            self.template_name,
            self.actions.len()
        );

        let inner = if self.global_context {
            context.clone()
        } else {
            context.local_copy()
        };
        for (name, value) in &self.parameters {
            inner.set_variable(name, context.replace_dynamic_content(value)?)?;
        }

        run_actions(&self.actions, &inner).await?;
        info!("Template '{}' finished successfully", self.template_name);
        Ok(())
    }

    fn nested_actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::actions::{CreateVariablesAction, FailAction};

    use super::*;

    fn greeting_template() -> Template {
        Template::new(
            "greet",
            vec![Arc::new(
                CreateVariablesAction::default().with_variable("greeting", "Hello ${user}"),
            )],
        )
        .with_parameter("user", "nobody")
    }

    #[tokio::test]
    async fn test_global_context_keeps_variables() {
        let context = TestContext::default();
        context.set_variable("name", "Citrus").unwrap();
        greeting_template()
            .with_parameter("user", "${name}")
            .execute(&context)
            .await
            .unwrap();
        assert_eq!(context.get_variable("greeting").unwrap(), "Hello Citrus");
        assert_eq!(context.get_variable("user").unwrap(), "Citrus");
    }

    #[tokio::test]
    async fn test_local_context_isolates_variables() {
        let context = TestContext::default();
        greeting_template()
            .with_global_context(false)
            .execute(&context)
            .await
            .unwrap();
        assert!(!context.has_variable("greeting"));
        assert!(!context.has_variable("user"));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let error = Template::new("broken", vec![Arc::new(FailAction::new("template failed"))])
            .execute(&TestContext::default())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "template failed");
    }
}
