//! SSM automation hand-off
//!
//! Starts the incident workflow document after a containment so the
//! human-driven investigation picks up where the automated response
//! stopped.

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_ssm::Client;
use std::collections::HashMap;
use tracing::info;

/// SSM client for starting automation workflows
pub struct SsmClient {
    client: Client,
}

impl SsmClient {
    /// Create an SSM client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ssm_client(),
        }
    }

    /// Start an automation execution; returns the execution id.
    pub async fn start_automation(
        &self,
        document_name: &str,
        parameters: HashMap<String, Vec<String>>,
    ) -> Result<String> {
        info!(document = %document_name, "Starting automation workflow");

        let mut request = self.client.start_automation_execution().document_name(document_name);
        for (key, values) in parameters {
            request = request.parameters(key, values);
        }

        let response = request
            .send()
            .await
            .context("Failed to start automation execution")?;

        let execution_id = response
            .automation_execution_id()
            .context("No execution id in response")?
            .to_string();

        info!(execution_id = %execution_id, "Automation workflow started");
        Ok(execution_id)
    }
}
