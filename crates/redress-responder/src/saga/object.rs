//! Single-object encryption procedure
//!
//! One read, at most one write, no waits: the object's head says whether
//! it is encrypted (and with which key), and remediation is a
//! copy-onto-self with `aws:kms`.

use crate::aws::s3::{BucketOperations, ObjectEncryption};
use crate::error::RemediationError;
use crate::saga::ProcedureResult;
use redress_common::outcome::RemediationOutcome;
use serde_json::json;
use tracing::info;

/// Whether an object needs rewriting: unencrypted, or encrypted with a
/// key other than the required one.
pub fn needs_reencryption(encryption: &ObjectEncryption, required_kms_key: Option<&str>) -> bool {
    if !encryption.is_encrypted() {
        return true;
    }
    match required_kms_key {
        Some(required) => encryption.kms_key_id.as_deref() != Some(required),
        None => false,
    }
}

/// Verify and, if needed, rewrite one object with KMS encryption.
pub async fn ensure_object_encrypted(
    ops: &impl BucketOperations,
    bucket: &str,
    key: &str,
    required_kms_key: Option<&str>,
) -> Result<ProcedureResult, RemediationError> {
    let encryption = ops
        .object_encryption(bucket, key)
        .await
        .map_err(|source| RemediationError::Provider {
            operation: "head_object",
            source,
        })?;

    if !needs_reencryption(&encryption, required_kms_key) {
        return Ok(ProcedureResult::new(RemediationOutcome::already_compliant(
            format!(
                "object s3://{bucket}/{key} is already encrypted with {}",
                encryption.algorithm.as_deref().unwrap_or("unknown"),
            ),
        )));
    }

    ops.reencrypt_object(bucket, key, required_kms_key)
        .await
        .map_err(|source| RemediationError::Provider {
            operation: "copy_object",
            source,
        })?;

    info!(bucket = %bucket, key = %key, "Object rewritten with KMS encryption");
    Ok(ProcedureResult::with_actions(
        RemediationOutcome::success(
            format!("re-encrypted object s3://{bucket}/{key} with aws:kms"),
            Some(json!({
                "previous_algorithm": encryption.algorithm,
                "previous_kms_key_id": encryption.kms_key_id,
                "kms_key_id": required_kms_key,
            })),
        ),
        vec![format!("re-encrypted object s3://{bucket}/{key}")],
    ))
}
