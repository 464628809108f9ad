//! Remediation error taxonomy
//!
//! Typed errors for every boundary of the responder, replacing broad
//! catch-and-log flows with a narrow enumerated set. `AlreadyCompliant` is
//! deliberately absent: it is an outcome, not an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A precondition a saga checks before its first mutating step.
///
/// Precondition failures are recoverable and guarantee zero mutation.
#[derive(Debug, Error)]
pub enum Precondition {
    /// The volume has no attachment, so there is no attachment point to
    /// swap a replacement into.
    #[error("volume {volume_id} is not attached to any instance")]
    NotAttached { volume_id: String },

    /// A volume must never be detached from a live instance.
    #[error("instance {instance_id} must be stopped to replace a volume (current state: {state})")]
    InstanceNotStopped {
        instance_id: String,
        state: String,
    },

    /// The target resource does not exist.
    #[error("{kind} '{id}' not found")]
    ResourceNotFound { kind: &'static str, id: String },
}

/// A resource created mid-saga that survived a later failure and needs
/// operator reconciliation. Recorded in evidence, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedResource {
    pub kind: String,
    pub id: String,
}

impl OrphanedResource {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Errors surfaced by classification, sagas, and the provider boundary.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// The inbound event matched none of the supported invocation shapes.
    #[error("unclassifiable event: {0}")]
    Classification(String),

    /// A saga precondition failed before any mutation.
    #[error(transparent)]
    PreconditionFailed(#[from] Precondition),

    /// A provider call failed before any mutation was committed. The
    /// caller's event-source retry policy governs; no internal retry.
    #[error("provider error during {operation}")]
    Provider {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A step failed after one or more prior steps already mutated
    /// external state. Carries full detail of what was and was not done.
    #[error("saga failed at step '{step}' after prior steps mutated state")]
    PartialSaga {
        step: &'static str,
        /// Descriptions of steps that committed, in execution order.
        completed: Vec<String>,
        /// Intermediate resources left behind by the failure.
        orphaned: Vec<OrphanedResource>,
        #[source]
        source: anyhow::Error,
    },

    /// No remediation procedure is registered for the resource kind.
    #[error("unsupported resource type: {0}")]
    Unsupported(String),
}

impl RemediationError {
    /// Structured detail for the evidence record, so an operator can
    /// reconcile whatever a partial saga left behind.
    pub fn detail(&self) -> Option<serde_json::Value> {
        match self {
            Self::PartialSaga {
                step,
                completed,
                orphaned,
                ..
            } => Some(serde_json::json!({
                "failed_step": step,
                "completed_steps": completed,
                "orphaned_resources": orphaned,
            })),
            _ => None,
        }
    }

    /// HTTP-style status code for the invocation response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Classification(_) | Self::Unsupported(_) => 400,
            Self::PreconditionFailed(_) => 200,
            Self::Provider { .. } | Self::PartialSaga { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_display() {
        let err = Precondition::InstanceNotStopped {
            instance_id: "i-1".into(),
            state: "running".into(),
        };
        assert_eq!(
            err.to_string(),
            "instance i-1 must be stopped to replace a volume (current state: running)"
        );
    }

    #[test]
    fn partial_saga_detail_lists_orphans() {
        let err = RemediationError::PartialSaga {
            step: "attach_replacement",
            completed: vec!["created snapshot snap-1".into()],
            orphaned: vec![OrphanedResource::new("snapshot", "snap-1")],
            source: anyhow::anyhow!("boom"),
        };
        let detail = err.detail().unwrap();
        assert_eq!(detail["failed_step"], "attach_replacement");
        assert_eq!(detail["orphaned_resources"][0]["id"], "snap-1");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            RemediationError::Classification("bad".into()).status_code(),
            400
        );
        assert_eq!(
            RemediationError::Unsupported("AWS::Lambda::Function".into()).status_code(),
            400
        );
        let precondition: RemediationError = Precondition::NotAttached {
            volume_id: "vol-1".into(),
        }
        .into();
        assert_eq!(precondition.status_code(), 200);
    }
}
