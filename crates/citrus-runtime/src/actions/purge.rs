//! Purge endpoint action.

use async_trait::async_trait;
use tracing::info;

use citrus_core::{MessageSelector, Result, TestContext};

use crate::action::TestAction;

/// Drops pending messages from one or more endpoints.
#[derive(Debug, Clone, Default)]
pub struct PurgeEndpointAction {
    endpoints: Vec<String>,
    selector: Option<String>,
}

impl PurgeEndpointAction {
    /// Purges the named endpoints.
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            selector: None,
        }
    }

    /// Only drops messages matching `selector`.
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }
}

#[async_trait]
impl TestAction for PurgeEndpointAction {
    fn name(&self) -> &str {
        "purge-endpoint"
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let selector = self
            .selector
            .as_deref()
            .map(|selector| MessageSelector::parse(&context.replace_dynamic_content(selector)?))
            .transpose()?;

        for name in &self.endpoints {
            let endpoint = context
                .endpoint_registry()
                .resolve(&context.replace_dynamic_content(name)?)?;
            let purged = endpoint.purge(selector.as_ref(), context).await?;
            info!("Purged {purged} message(s) from endpoint '{}'", endpoint.name());
        }
        Ok(())
    }
}
