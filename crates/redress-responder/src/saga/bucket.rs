//! Bucket remediation procedures
//!
//! Public exposure: the public-access block is applied first and
//! unconditionally, so the bucket is protected even if the policy
//! rewrite fails. The policy is then stripped of public statements,
//! order preserved; if nothing non-public remains the policy is deleted
//! outright.
//!
//! Missing encryption: default server-side encryption is enabled, AES256
//! with bucket keys, or `aws:kms` when a key is configured.

use crate::aws::s3::BucketOperations;
use crate::error::RemediationError;
use crate::saga::ProcedureResult;
use redress_common::outcome::RemediationOutcome;
use serde_json::json;
use tracing::info;

fn provider(operation: &'static str) -> impl FnOnce(anyhow::Error) -> RemediationError {
    move |source| RemediationError::Provider { operation, source }
}

fn partial_after_block<'a>(
    step: &'static str,
    completed: &'a [String],
) -> impl FnOnce(anyhow::Error) -> RemediationError + 'a {
    move |source| RemediationError::PartialSaga {
        step,
        completed: completed.to_vec(),
        orphaned: Vec::new(),
        source,
    }
}

/// Block public access and remove public policy statements.
pub async fn normalize_public_access(
    ops: &impl BucketOperations,
    bucket: &str,
) -> Result<ProcedureResult, RemediationError> {
    // Applied before the policy is even read, so a later failure still
    // leaves the bucket blocked from public access.
    ops.apply_public_access_block(bucket)
        .await
        .map_err(provider("put_public_access_block"))?;
    let mut actions = vec![format!("applied public access block to bucket {bucket}")];

    let policy = ops
        .get_bucket_policy(bucket)
        .await
        .map_err(partial_after_block("read_policy", &actions))?;

    let Some(policy) = policy else {
        return Ok(ProcedureResult::with_actions(
            RemediationOutcome::already_compliant(format!(
                "bucket {bucket} has no policy to normalize"
            )),
            actions,
        ));
    };

    let (survivors, removed) = policy.filter_public_statements();
    if removed == 0 {
        return Ok(ProcedureResult::with_actions(
            RemediationOutcome::already_compliant(format!(
                "bucket {bucket} policy has no public statements"
            )),
            actions,
        ));
    }

    if survivors.is_empty() {
        ops.delete_bucket_policy(bucket)
            .await
            .map_err(partial_after_block("delete_policy", &actions))?;
        actions.push(format!(
            "deleted bucket policy ({removed} public statements, none remaining)"
        ));
        info!(bucket = %bucket, removed, "Deleted fully public bucket policy");

        return Ok(ProcedureResult::with_actions(
            RemediationOutcome::success(
                format!("removed public bucket policy from {bucket}"),
                Some(json!({ "removed_statements": removed, "policy_deleted": true })),
            ),
            actions,
        ));
    }

    let remaining = survivors.len();
    let filtered = policy.with_statements(survivors);
    ops.put_bucket_policy(bucket, &filtered)
        .await
        .map_err(partial_after_block("put_filtered_policy", &actions))?;
    actions.push(format!(
        "removed {removed} public statements from bucket policy ({remaining} remaining)"
    ));
    info!(bucket = %bucket, removed, remaining, "Filtered public bucket policy");

    Ok(ProcedureResult::with_actions(
        RemediationOutcome::success(
            format!("removed {removed} public statements from bucket {bucket}"),
            Some(json!({
                "removed_statements": removed,
                "remaining_statements": remaining,
                "policy_deleted": false,
            })),
        ),
        actions,
    ))
}

/// Enable default server-side encryption on a bucket.
pub async fn enable_default_encryption(
    ops: &impl BucketOperations,
    bucket: &str,
    kms_key_id: Option<&str>,
) -> Result<ProcedureResult, RemediationError> {
    let existing = ops
        .get_bucket_encryption(bucket)
        .await
        .map_err(provider("get_bucket_encryption"))?;

    if existing.is_some() {
        return Ok(ProcedureResult::new(RemediationOutcome::already_compliant(
            format!("bucket {bucket} already has default encryption"),
        )));
    }

    ops.put_default_encryption(bucket, kms_key_id)
        .await
        .map_err(provider("put_bucket_encryption"))?;

    let algorithm = if kms_key_id.is_some() { "aws:kms" } else { "AES256" };
    info!(bucket = %bucket, algorithm, "Enabled default encryption");

    Ok(ProcedureResult::with_actions(
        RemediationOutcome::success(
            format!("enabled {algorithm} default encryption on bucket {bucket}"),
            Some(json!({ "algorithm": algorithm, "kms_key_id": kms_key_id })),
        ),
        vec![format!(
            "enabled {algorithm} default encryption on bucket {bucket}"
        )],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::s3::ObjectEncryption;
    use anyhow::Result;
    use redress_common::policy::{Effect, PolicyDocument, PolicyStatement};
    use serde_json::Value;
    use std::sync::Mutex;

    struct FakeBuckets {
        policy: Mutex<Option<PolicyDocument>>,
        encryption: Mutex<Option<Value>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBuckets {
        fn new(policy: Option<PolicyDocument>) -> Self {
            Self {
                policy: Mutex::new(policy),
                encryption: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BucketOperations for FakeBuckets {
        async fn apply_public_access_block(&self, _bucket: &str) -> Result<()> {
            self.log("apply_public_access_block");
            Ok(())
        }
        async fn get_bucket_policy(&self, _bucket: &str) -> Result<Option<PolicyDocument>> {
            self.log("get_bucket_policy");
            Ok(self.policy.lock().unwrap().clone())
        }
        async fn put_bucket_policy(&self, _bucket: &str, policy: &PolicyDocument) -> Result<()> {
            self.log(format!("put_bucket_policy n={}", policy.statement.len()));
            *self.policy.lock().unwrap() = Some(policy.clone());
            Ok(())
        }
        async fn delete_bucket_policy(&self, _bucket: &str) -> Result<()> {
            self.log("delete_bucket_policy");
            *self.policy.lock().unwrap() = None;
            Ok(())
        }
        async fn get_bucket_encryption(&self, _bucket: &str) -> Result<Option<Value>> {
            self.log("get_bucket_encryption");
            Ok(self.encryption.lock().unwrap().clone())
        }
        async fn put_default_encryption(
            &self,
            _bucket: &str,
            kms_key_id: Option<&str>,
        ) -> Result<()> {
            self.log(format!("put_default_encryption kms={kms_key_id:?}"));
            *self.encryption.lock().unwrap() = Some(json!({ "rules": [] }));
            Ok(())
        }
        async fn object_encryption(&self, _: &str, _: &str) -> Result<ObjectEncryption> {
            unreachable!()
        }
        async fn reencrypt_object(&self, _: &str, _: &str, _: Option<&str>) -> Result<()> {
            unreachable!()
        }
        async fn bucket_location(&self, _: &str) -> Result<String> {
            Ok("us-east-1".into())
        }
        async fn get_public_access_block(&self, _: &str) -> Result<Option<Value>> {
            Ok(None)
        }
        async fn get_bucket_acl(&self, _: &str) -> Result<Value> {
            Ok(json!({}))
        }
        async fn put_json_object(&self, _: &str, _: &str, _: String) -> Result<()> {
            Ok(())
        }
    }

    fn statement(sid: &str, public: bool) -> PolicyStatement {
        PolicyStatement {
            sid: Some(sid.to_string()),
            effect: Effect::Allow,
            principal: Some(if public {
                json!("*")
            } else {
                json!({ "AWS": "arn:aws:iam::111122223333:root" })
            }),
            action: Some(json!("s3:GetObject")),
            resource: Some(json!("arn:aws:s3:::b/*")),
            condition: None,
            extra: Default::default(),
        }
    }

    fn document(statements: Vec<PolicyStatement>) -> PolicyDocument {
        PolicyDocument {
            version: "2012-10-17".to_string(),
            statement: statements,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn block_is_applied_before_policy_read() {
        let fake = FakeBuckets::new(None);
        normalize_public_access(&fake, "b").await.unwrap();

        let calls = fake.calls();
        let block = calls
            .iter()
            .position(|c| c == "apply_public_access_block")
            .unwrap();
        let read = calls.iter().position(|c| c == "get_bucket_policy").unwrap();
        assert!(block < read);
    }

    #[tokio::test]
    async fn bucket_without_policy_is_already_compliant() {
        let fake = FakeBuckets::new(None);
        let result = normalize_public_access(&fake, "b").await.unwrap();
        assert!(matches!(
            result.outcome,
            RemediationOutcome::AlreadyCompliant { .. }
        ));
        // The block was still applied.
        assert!(result.actions[0].contains("public access block"));
    }

    #[tokio::test]
    async fn mixed_policy_keeps_private_statements_in_order() {
        let fake = FakeBuckets::new(Some(document(vec![
            statement("S1", false),
            statement("S2", true),
            statement("S3", false),
        ])));
        let result = normalize_public_access(&fake, "b").await.unwrap();

        let detail = match &result.outcome {
            RemediationOutcome::Success { detail, .. } => detail.clone().unwrap(),
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(detail["removed_statements"], 1);
        assert_eq!(detail["remaining_statements"], 2);
        assert_eq!(detail["policy_deleted"], false);

        let stored = fake.policy.lock().unwrap().clone().unwrap();
        let sids: Vec<_> = stored
            .statement
            .iter()
            .map(|s| s.sid.clone().unwrap())
            .collect();
        assert_eq!(sids, vec!["S1", "S3"]);
    }

    #[tokio::test]
    async fn fully_public_policy_is_deleted() {
        let fake = FakeBuckets::new(Some(document(vec![
            statement("S1", true),
            statement("S2", true),
        ])));
        let result = normalize_public_access(&fake, "b").await.unwrap();

        let detail = match &result.outcome {
            RemediationOutcome::Success { detail, .. } => detail.clone().unwrap(),
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(detail["policy_deleted"], true);
        assert!(fake.calls().contains(&"delete_bucket_policy".to_string()));
        assert!(fake.policy.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn second_run_is_already_compliant() {
        let fake = FakeBuckets::new(Some(document(vec![
            statement("S1", false),
            statement("S2", true),
        ])));

        let first = normalize_public_access(&fake, "b").await.unwrap();
        assert!(matches!(first.outcome, RemediationOutcome::Success { .. }));

        let second = normalize_public_access(&fake, "b").await.unwrap();
        assert!(matches!(
            second.outcome,
            RemediationOutcome::AlreadyCompliant { .. }
        ));
    }

    #[tokio::test]
    async fn existing_encryption_is_already_compliant() {
        let fake = FakeBuckets::new(None);
        *fake.encryption.lock().unwrap() = Some(json!({ "rules": [{}] }));

        let result = enable_default_encryption(&fake, "b", None).await.unwrap();
        assert!(matches!(
            result.outcome,
            RemediationOutcome::AlreadyCompliant { .. }
        ));
        assert!(!fake
            .calls()
            .iter()
            .any(|c| c.starts_with("put_default_encryption")));
    }

    #[tokio::test]
    async fn missing_encryption_enables_aes256_or_kms() {
        let fake = FakeBuckets::new(None);
        let result = enable_default_encryption(&fake, "b", None).await.unwrap();
        match &result.outcome {
            RemediationOutcome::Success { detail, .. } => {
                assert_eq!(detail.as_ref().unwrap()["algorithm"], "AES256");
            }
            other => panic!("expected success, got {other:?}"),
        }

        let fake = FakeBuckets::new(None);
        let result = enable_default_encryption(&fake, "b", Some("key-1"))
            .await
            .unwrap();
        match &result.outcome {
            RemediationOutcome::Success { detail, .. } => {
                assert_eq!(detail.as_ref().unwrap()["algorithm"], "aws:kms");
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert!(fake
            .calls()
            .contains(&"put_default_encryption kms=Some(\"key-1\")".to_string()));
    }
}
