//! Database storage-encryption check
//!
//! Storage encryption cannot be enabled on a live database instance, so
//! this procedure never mutates: it verifies the flag and, when unset,
//! reports the manual snapshot-copy-restore path.

use crate::aws::rds::DatabaseOperations;
use crate::error::RemediationError;
use crate::saga::ProcedureResult;
use redress_common::outcome::RemediationOutcome;

/// Verify storage encryption on a database instance.
pub async fn check_storage_encryption(
    ops: &impl DatabaseOperations,
    instance_id: &str,
) -> Result<ProcedureResult, RemediationError> {
    let encrypted = ops
        .storage_encrypted(instance_id)
        .await
        .map_err(|source| RemediationError::Provider {
            operation: "describe_db_instance",
            source,
        })?;

    if encrypted {
        return Ok(ProcedureResult::new(RemediationOutcome::already_compliant(
            format!("database instance {instance_id} already has storage encryption"),
        )));
    }

    Ok(ProcedureResult::new(RemediationOutcome::manual_action(
        format!(
            "database instance {instance_id} has unencrypted storage; encryption cannot be \
             enabled in place. Take a snapshot, copy it with encryption enabled, and restore \
             a new instance from the encrypted copy."
        ),
    )))
}
