//! Volume re-encryption saga
//!
//! Encryption cannot be enabled on a live volume, so the saga replaces
//! it: snapshot the original, create an encrypted volume from the
//! snapshot, detach the original and attach the replacement at the same
//! device path, then copy the tags over. There is no rollback; a failure
//! after the first mutation surfaces as a partial-saga error that names
//! every step that committed and every intermediate resource left
//! behind.
//!
//! Preconditions, checked before any write: the volume must be attached
//! (otherwise there is nothing to swap into) and its instance must be
//! stopped (a volume is never pulled out from under a running instance).

use crate::aws::ec2::{ReplacementVolumeSpec, VolumeOperations};
use crate::aws::error::classify_anyhow_error;
use crate::error::{OrphanedResource, Precondition, RemediationError};
use crate::saga::ProcedureResult;
use crate::wait::{wait_until, PollConfig, WaitError};
use redress_common::outcome::RemediationOutcome;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables for the volume saga.
#[derive(Debug, Clone)]
pub struct VolumeSagaConfig {
    /// KMS key for the replacement; `None` uses the default managed key.
    pub kms_key_id: Option<String>,
    /// Delay between terminal-state checks.
    pub poll_interval: Duration,
    /// Deadline for snapshot completion.
    pub snapshot_wait: Duration,
    /// Deadline for volume state transitions.
    pub volume_wait: Duration,
}

impl Default for VolumeSagaConfig {
    fn default() -> Self {
        Self {
            kms_key_id: None,
            poll_interval: redress_common::defaults::DEFAULT_POLL_INTERVAL,
            snapshot_wait: redress_common::defaults::DEFAULT_SNAPSHOT_WAIT,
            volume_wait: redress_common::defaults::DEFAULT_VOLUME_WAIT,
        }
    }
}

fn partial(
    step: &'static str,
    completed: &[String],
    orphaned: &[OrphanedResource],
    source: anyhow::Error,
) -> RemediationError {
    RemediationError::PartialSaga {
        step,
        completed: completed.to_vec(),
        orphaned: orphaned.to_vec(),
        source,
    }
}

fn wait_failure(
    step: &'static str,
    completed: &[String],
    orphaned: &[OrphanedResource],
    error: WaitError,
) -> RemediationError {
    partial(step, completed, orphaned, anyhow::Error::new(error))
}

/// Replace an unencrypted volume with an encrypted copy.
pub async fn reencrypt_volume(
    ops: &impl VolumeOperations,
    config: &VolumeSagaConfig,
    volume_id: &str,
) -> Result<ProcedureResult, RemediationError> {
    let volume = match ops.describe_volume(volume_id).await {
        Ok(volume) => volume,
        Err(source) if classify_anyhow_error(&source).is_not_found() => {
            return Err(Precondition::ResourceNotFound {
                kind: "volume",
                id: volume_id.to_string(),
            }
            .into())
        }
        Err(source) => {
            return Err(RemediationError::Provider {
                operation: "describe_volume",
                source,
            })
        }
    };

    if volume.encrypted {
        info!(volume_id = %volume_id, "Volume already encrypted");
        return Ok(ProcedureResult::new(RemediationOutcome::already_compliant(
            format!("volume {volume_id} is already encrypted"),
        )));
    }

    let attachment = volume
        .attachment
        .clone()
        .ok_or(Precondition::NotAttached {
            volume_id: volume_id.to_string(),
        })?;

    let state = ops
        .instance_state(&attachment.instance_id)
        .await
        .map_err(|source| RemediationError::Provider {
            operation: "describe_instance",
            source,
        })?;
    if state != "stopped" {
        return Err(Precondition::InstanceNotStopped {
            instance_id: attachment.instance_id,
            state,
        }
        .into());
    }

    let mut completed: Vec<String> = Vec::new();
    let mut orphaned: Vec<OrphanedResource> = Vec::new();

    // First mutation. A failure here leaves nothing behind.
    let snapshot_id = ops
        .create_snapshot(
            volume_id,
            &format!("Pre-encryption snapshot of {volume_id}"),
        )
        .await
        .map_err(|source| RemediationError::Provider {
            operation: "create_snapshot",
            source,
        })?;
    completed.push(format!("created snapshot {snapshot_id}"));
    orphaned.push(OrphanedResource::new("snapshot", &snapshot_id));

    let snapshot_poll = PollConfig::new(config.poll_interval, config.snapshot_wait);
    wait_until(snapshot_poll, "snapshot completion", || {
        ops.snapshot_completed(&snapshot_id)
    })
    .await
    .map_err(|e| wait_failure("wait_snapshot_ready", &completed, &orphaned, e))?;
    completed.push(format!("snapshot {snapshot_id} completed"));

    let replacement_id = ops
        .create_encrypted_volume(ReplacementVolumeSpec {
            snapshot_id: snapshot_id.clone(),
            size_gib: volume.size_gib,
            volume_type: volume.volume_type.clone(),
            availability_zone: volume.availability_zone.clone(),
            kms_key_id: config.kms_key_id.clone(),
        })
        .await
        .map_err(|source| partial("create_replacement", &completed, &orphaned, source))?;
    completed.push(format!("created encrypted volume {replacement_id}"));
    orphaned.push(OrphanedResource::new("volume", &replacement_id));

    let volume_poll = PollConfig::new(config.poll_interval, config.volume_wait);
    wait_until(volume_poll, "replacement volume availability", || {
        ops.volume_available(&replacement_id)
    })
    .await
    .map_err(|e| wait_failure("wait_replacement_ready", &completed, &orphaned, e))?;

    ops.detach_volume(volume_id)
        .await
        .map_err(|source| partial("detach_original", &completed, &orphaned, source))?;
    completed.push(format!(
        "detached volume {volume_id} from {}",
        attachment.instance_id
    ));

    wait_until(volume_poll, "original volume detachment", || {
        ops.volume_available(volume_id)
    })
    .await
    .map_err(|e| wait_failure("wait_detached", &completed, &orphaned, e))?;

    ops.attach_volume(&replacement_id, &attachment.instance_id, &attachment.device)
        .await
        .map_err(|source| partial("attach_replacement", &completed, &orphaned, source))?;
    completed.push(format!(
        "attached volume {replacement_id} to {} at {}",
        attachment.instance_id, attachment.device
    ));

    // The swap is done. A tag-copy failure is not worth reverting it.
    if let Err(e) = ops.create_tags(&replacement_id, &volume.tags).await {
        warn!(
            volume_id = %replacement_id,
            error = %e,
            "Failed to copy tags to replacement volume"
        );
    } else if !volume.tags.is_empty() {
        completed.push(format!("copied {} tags", volume.tags.len()));
    }

    info!(
        original = %volume_id,
        replacement = %replacement_id,
        "Volume re-encryption complete"
    );

    let detail = json!({
        "original_volume_id": volume_id,
        "replacement_volume_id": replacement_id,
        "snapshot_id": snapshot_id,
        "instance_id": attachment.instance_id,
        "device": attachment.device,
    });
    Ok(ProcedureResult::with_actions(
        RemediationOutcome::success(
            format!("replaced volume {volume_id} with encrypted volume {replacement_id}"),
            Some(detail),
        ),
        completed,
    ))
}
