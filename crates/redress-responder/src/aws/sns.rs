//! SNS publishing
//!
//! Thin wrapper used by the notification layer. Callers decide whether a
//! publish failure is fatal; for remediation outcomes it never is.

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_sns::Client;
use tracing::debug;

/// SNS client for outcome notifications
pub struct SnsClient {
    client: Client,
}

impl SnsClient {
    /// Create an SNS client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.sns_client(),
        }
    }

    /// Publish a message to a topic.
    pub async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<()> {
        debug!(topic_arn = %topic_arn, subject = %subject, "Publishing notification");

        self.client
            .publish()
            .topic_arn(topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .context("Failed to publish to SNS")?;

        Ok(())
    }
}
