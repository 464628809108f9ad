//! IAM principal operations
//!
//! Credential containment primitives: deactivating access keys and
//! attaching the deny-all inline policy, plus the read-only lookups used
//! to snapshot a principal's configuration before and after containment.

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_iam::types::StatusType;
use aws_sdk_iam::Client;
use serde_json::{json, Value};
use tracing::info;

/// IAM client for credential containment
pub struct IamClient {
    client: Client,
}

impl IamClient {
    /// Create an IAM client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

/// Trait for IAM operations, implemented by `IamClient` and by in-memory
/// fakes in tests.
#[allow(async_fn_in_trait)]
pub trait PrincipalOperations: Send + Sync {
    /// Deactivate an access key without deleting it, preserving it for
    /// forensics.
    async fn disable_access_key(&self, user_name: &str, access_key_id: &str) -> Result<()>;

    /// Attach an inline policy document to a user.
    async fn put_user_inline_policy(
        &self,
        user_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()>;

    /// Attach an inline policy document to a role.
    async fn put_role_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()>;

    /// Read a user's core attributes.
    async fn user_details(&self, user_name: &str) -> Result<Value>;

    /// List a user's access keys with their status.
    async fn user_access_keys(&self, user_name: &str) -> Result<Vec<Value>>;

    /// List the managed policies attached to a user.
    async fn user_attached_policies(&self, user_name: &str) -> Result<Vec<Value>>;

    /// Read a role's core attributes.
    async fn role_details(&self, role_name: &str) -> Result<Value>;

    /// List the managed policies attached to a role.
    async fn role_attached_policies(&self, role_name: &str) -> Result<Vec<Value>>;
}

impl PrincipalOperations for IamClient {
    async fn disable_access_key(&self, user_name: &str, access_key_id: &str) -> Result<()> {
        info!(
            user_name = %user_name,
            access_key_id = %access_key_id,
            "Deactivating access key"
        );

        self.client
            .update_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .status(StatusType::Inactive)
            .send()
            .await
            .context("Failed to deactivate access key")?;

        Ok(())
    }

    async fn put_user_inline_policy(
        &self,
        user_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()> {
        info!(
            user_name = %user_name,
            policy_name = %policy_name,
            "Attaching inline policy to user"
        );

        self.client
            .put_user_policy()
            .user_name(user_name)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .context("Failed to put user policy")?;

        Ok(())
    }

    async fn put_role_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()> {
        info!(
            role_name = %role_name,
            policy_name = %policy_name,
            "Attaching inline policy to role"
        );

        self.client
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .context("Failed to put role policy")?;

        Ok(())
    }

    async fn user_details(&self, user_name: &str) -> Result<Value> {
        let response = self
            .client
            .get_user()
            .user_name(user_name)
            .send()
            .await
            .context("Failed to get user")?;

        let user = response.user().context("No user in response")?;
        Ok(json!({
            "user_name": user.user_name(),
            "user_id": user.user_id(),
            "arn": user.arn(),
            "path": user.path(),
            "create_date": user.create_date().to_string(),
        }))
    }

    async fn user_access_keys(&self, user_name: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .list_access_keys()
            .user_name(user_name)
            .send()
            .await
            .context("Failed to list access keys")?;

        Ok(response
            .access_key_metadata()
            .iter()
            .map(|k| {
                json!({
                    "access_key_id": k.access_key_id(),
                    "status": k.status().map(|s| s.as_str()),
                    "create_date": k.create_date().map(|d| d.to_string()),
                })
            })
            .collect())
    }

    async fn user_attached_policies(&self, user_name: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .list_attached_user_policies()
            .user_name(user_name)
            .send()
            .await
            .context("Failed to list attached user policies")?;

        Ok(response
            .attached_policies()
            .iter()
            .map(|p| {
                json!({
                    "policy_name": p.policy_name(),
                    "policy_arn": p.policy_arn(),
                })
            })
            .collect())
    }

    async fn role_details(&self, role_name: &str) -> Result<Value> {
        let response = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .context("Failed to get role")?;

        let role = response.role().context("No role in response")?;
        Ok(json!({
            "role_name": role.role_name(),
            "role_id": role.role_id(),
            "arn": role.arn(),
            "path": role.path(),
            "create_date": role.create_date().to_string(),
        }))
    }

    async fn role_attached_policies(&self, role_name: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .context("Failed to list attached role policies")?;

        Ok(response
            .attached_policies()
            .iter()
            .map(|p| {
                json!({
                    "policy_name": p.policy_name(),
                    "policy_arn": p.policy_arn(),
                })
            })
            .collect())
    }
}
