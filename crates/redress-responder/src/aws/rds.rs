//! RDS database instance lookups
//!
//! Read-only: storage encryption cannot be toggled on a live instance, so
//! the database procedure only verifies state and records evidence for
//! the manual snapshot-and-restore path.

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_rds::Client;
use serde_json::{json, Value};

/// RDS client for database instance inspection
pub struct RdsClient {
    client: Client,
}

impl RdsClient {
    /// Create an RDS client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.rds_client(),
        }
    }
}

/// Trait for RDS operations, implemented by `RdsClient` and by in-memory
/// fakes in tests.
#[allow(async_fn_in_trait)]
pub trait DatabaseOperations: Send + Sync {
    /// Whether the instance has storage encryption enabled.
    async fn storage_encrypted(&self, instance_id: &str) -> Result<bool>;

    /// Read the instance attributes relevant to the encryption decision.
    async fn instance_attributes(&self, instance_id: &str) -> Result<Value>;
}

impl DatabaseOperations for RdsClient {
    async fn storage_encrypted(&self, instance_id: &str) -> Result<bool> {
        let response = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance_id)
            .send()
            .await
            .context("Failed to describe DB instance")?;

        let instance = response
            .db_instances()
            .first()
            .with_context(|| format!("DB instance {instance_id} not found"))?;

        Ok(instance.storage_encrypted().unwrap_or(false))
    }

    async fn instance_attributes(&self, instance_id: &str) -> Result<Value> {
        let response = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance_id)
            .send()
            .await
            .context("Failed to describe DB instance")?;

        let instance = response
            .db_instances()
            .first()
            .with_context(|| format!("DB instance {instance_id} not found"))?;

        Ok(json!({
            "db_instance_identifier": instance.db_instance_identifier(),
            "engine": instance.engine(),
            "engine_version": instance.engine_version(),
            "storage_encrypted": instance.storage_encrypted(),
            "kms_key_id": instance.kms_key_id(),
            "db_instance_status": instance.db_instance_status(),
            "multi_az": instance.multi_az(),
            "db_instance_class": instance.db_instance_class(),
        }))
    }
}
