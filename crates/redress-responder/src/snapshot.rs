//! Pre/post remediation state capture
//!
//! Read-only per-kind capture of a resource's externally visible
//! configuration. Capture is deliberately tolerant: a missing
//! sub-resource (a bucket with no policy) records `null`, and a failed
//! attribute read records `null` plus the failure reason under
//! `capture_errors`, without aborting the other reads. The caller always
//! gets a snapshot back.

use crate::aws::ec2::VolumeOperations;
use crate::aws::iam::PrincipalOperations;
use crate::aws::rds::DatabaseOperations;
use crate::aws::s3::BucketOperations;
use anyhow::Result;
use chrono::Utc;
use redress_common::evidence::ResourceSnapshot;
use redress_common::resource::{ResourceDescriptor, ResourceKind};
use serde_json::Value;
use tracing::warn;

/// Accumulates tolerant attribute reads for one snapshot.
struct Capture {
    snapshot: ResourceSnapshot,
    errors: Vec<Value>,
}

impl Capture {
    fn new(resource: ResourceDescriptor) -> Self {
        Self {
            snapshot: ResourceSnapshot::new(resource, Utc::now()),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, name: &str, result: Result<Value>) {
        match result {
            Ok(value) => {
                self.snapshot.attributes.insert(name.to_string(), value);
            }
            Err(e) => {
                warn!(
                    resource = %self.snapshot.resource,
                    attribute = name,
                    error = %e,
                    "Attribute capture failed"
                );
                self.snapshot
                    .attributes
                    .insert(name.to_string(), Value::Null);
                self.errors
                    .push(serde_json::json!({ "attribute": name, "error": format!("{e:#}") }));
            }
        }
    }

    fn finish(mut self) -> ResourceSnapshot {
        if !self.errors.is_empty() {
            self.snapshot
                .attributes
                .insert("capture_errors".to_string(), Value::Array(self.errors));
        }
        self.snapshot
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Capture a volume's configuration.
pub async fn capture_volume(ops: &impl VolumeOperations, volume_id: &str) -> ResourceSnapshot {
    let mut capture = Capture::new(ResourceDescriptor::new(ResourceKind::Volume, volume_id));
    capture.record(
        "volume",
        match ops.describe_volume(volume_id).await {
            Ok(d) => to_value(d),
            Err(e) => Err(e),
        },
    );
    capture.finish()
}

/// Capture a bucket's configuration: location, encryption, public-access
/// block, policy and ACL.
pub async fn capture_bucket(ops: &impl BucketOperations, bucket: &str) -> ResourceSnapshot {
    let mut capture = Capture::new(ResourceDescriptor::new(ResourceKind::Bucket, bucket));

    capture.record(
        "location",
        ops.bucket_location(bucket).await.map(Value::String),
    );
    capture.record(
        "encryption",
        ops.get_bucket_encryption(bucket)
            .await
            .map(|v| v.unwrap_or(Value::Null)),
    );
    capture.record(
        "public_access_block",
        ops.get_public_access_block(bucket)
            .await
            .map(|v| v.unwrap_or(Value::Null)),
    );
    capture.record(
        "policy",
        match ops.get_bucket_policy(bucket).await {
            Ok(Some(policy)) => to_value(policy),
            Ok(None) => Ok(Value::Null),
            Err(e) => Err(e),
        },
    );
    capture.record("acl", ops.get_bucket_acl(bucket).await);

    capture.finish()
}

/// Capture a database instance's configuration.
pub async fn capture_database(ops: &impl DatabaseOperations, instance_id: &str) -> ResourceSnapshot {
    let mut capture = Capture::new(ResourceDescriptor::new(
        ResourceKind::DbInstance,
        instance_id,
    ));
    capture.record("instance", ops.instance_attributes(instance_id).await);
    capture.finish()
}

/// Capture an IAM principal's configuration: core attributes, access keys
/// (users only) and attached policies.
pub async fn capture_principal(
    ops: &impl PrincipalOperations,
    resource: &ResourceDescriptor,
) -> ResourceSnapshot {
    let mut capture = Capture::new(resource.clone());

    match resource.kind {
        ResourceKind::IamUser => {
            capture.record("user", ops.user_details(&resource.id).await);
            capture.record(
                "access_keys",
                ops.user_access_keys(&resource.id).await.map(Value::Array),
            );
            capture.record(
                "attached_policies",
                ops.user_attached_policies(&resource.id)
                    .await
                    .map(Value::Array),
            );
        }
        ResourceKind::IamRole => {
            capture.record("role", ops.role_details(&resource.id).await);
            capture.record(
                "attached_policies",
                ops.role_attached_policies(&resource.id)
                    .await
                    .map(Value::Array),
            );
        }
        other => {
            warn!(kind = %other, "Principal capture called for a non-principal kind");
        }
    }

    capture.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use redress_common::policy::PolicyDocument;
    use serde_json::json;

    /// Bucket fake where individual reads can be made to fail.
    struct FlakyBucket {
        policy_fails: bool,
    }

    impl BucketOperations for FlakyBucket {
        async fn apply_public_access_block(&self, _bucket: &str) -> Result<()> {
            unreachable!("snapshot capture never mutates")
        }
        async fn get_bucket_policy(&self, _bucket: &str) -> Result<Option<PolicyDocument>> {
            if self.policy_fails {
                Err(anyhow!("access denied"))
            } else {
                Ok(None)
            }
        }
        async fn put_bucket_policy(&self, _: &str, _: &PolicyDocument) -> Result<()> {
            unreachable!("snapshot capture never mutates")
        }
        async fn delete_bucket_policy(&self, _: &str) -> Result<()> {
            unreachable!("snapshot capture never mutates")
        }
        async fn get_bucket_encryption(&self, _: &str) -> Result<Option<Value>> {
            Ok(Some(json!({ "rules": [] })))
        }
        async fn put_default_encryption(&self, _: &str, _: Option<&str>) -> Result<()> {
            unreachable!("snapshot capture never mutates")
        }
        async fn object_encryption(
            &self,
            _: &str,
            _: &str,
        ) -> Result<crate::aws::s3::ObjectEncryption> {
            unreachable!()
        }
        async fn reencrypt_object(&self, _: &str, _: &str, _: Option<&str>) -> Result<()> {
            unreachable!("snapshot capture never mutates")
        }
        async fn bucket_location(&self, _: &str) -> Result<String> {
            Ok("eu-west-1".to_string())
        }
        async fn get_public_access_block(&self, _: &str) -> Result<Option<Value>> {
            Ok(None)
        }
        async fn get_bucket_acl(&self, _: &str) -> Result<Value> {
            Ok(json!({ "owner": "abc", "grants": [] }))
        }
        async fn put_json_object(&self, _: &str, _: &str, _: String) -> Result<()> {
            unreachable!("snapshot capture never mutates")
        }
    }

    #[tokio::test]
    async fn missing_sub_resources_become_null() {
        let snapshot = capture_bucket(&FlakyBucket { policy_fails: false }, "b").await;
        assert_eq!(snapshot.attributes["policy"], Value::Null);
        assert_eq!(snapshot.attributes["public_access_block"], Value::Null);
        assert_eq!(snapshot.attributes["location"], json!("eu-west-1"));
        assert!(!snapshot.attributes.contains_key("capture_errors"));
    }

    #[tokio::test]
    async fn failed_read_does_not_abort_other_attributes() {
        let snapshot = capture_bucket(&FlakyBucket { policy_fails: true }, "b").await;
        assert_eq!(snapshot.attributes["policy"], Value::Null);
        // The other attributes were still captured.
        assert_eq!(snapshot.attributes["location"], json!("eu-west-1"));
        assert!(snapshot.attributes["encryption"].is_object());
        // And the failure reason is part of the snapshot.
        let errors = snapshot.attributes["capture_errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["attribute"], "policy");
    }
}
