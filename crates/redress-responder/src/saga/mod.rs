//! Remediation procedures
//!
//! One procedure per resource kind / violation pair. The registry is a
//! plain match: adding a kind means adding a variant and an arm, and an
//! unmatched pair yields no procedure (the handler reports it as
//! unsupported without touching the resource).

pub mod bucket;
pub mod database;
pub mod iam;
pub mod object;
pub mod volume;

use redress_common::outcome::RemediationOutcome;
use redress_common::resource::{ResourceKind, ViolationKind};

/// What a procedure did: the outcome plus the ordered list of actions it
/// took, for evidence and notification.
#[derive(Debug)]
pub struct ProcedureResult {
    pub outcome: RemediationOutcome,
    pub actions: Vec<String>,
}

impl ProcedureResult {
    pub fn new(outcome: RemediationOutcome) -> Self {
        Self {
            outcome,
            actions: Vec::new(),
        }
    }

    pub fn with_actions(outcome: RemediationOutcome, actions: Vec<String>) -> Self {
        Self { outcome, actions }
    }
}

/// The procedures the responder knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    /// Snapshot, replace and reattach an unencrypted volume.
    VolumeReencryption,
    /// Block public access and strip public policy statements.
    BucketPolicyNormalization,
    /// Enable default server-side encryption on a bucket.
    BucketDefaultEncryption,
    /// Rewrite a single object with KMS encryption.
    ObjectReencryption,
    /// Contain a compromised IAM principal.
    CredentialContainment,
    /// Verify database storage encryption (manual path only).
    DatabaseEncryptionCheck,
}

/// Select the procedure for a resource kind and violation. `None` means
/// the pair has no registered procedure.
pub fn select(
    kind: ResourceKind,
    violation: ViolationKind,
    has_object_key: bool,
) -> Option<Procedure> {
    match (kind, violation) {
        (ResourceKind::Volume, ViolationKind::Unencrypted) => Some(Procedure::VolumeReencryption),
        (ResourceKind::Bucket, ViolationKind::PubliclyExposed) => {
            Some(Procedure::BucketPolicyNormalization)
        }
        (ResourceKind::Bucket, ViolationKind::Unencrypted) if has_object_key => {
            Some(Procedure::ObjectReencryption)
        }
        (ResourceKind::Bucket, ViolationKind::Unencrypted) => {
            Some(Procedure::BucketDefaultEncryption)
        }
        (ResourceKind::DbInstance, ViolationKind::Unencrypted) => {
            Some(Procedure::DatabaseEncryptionCheck)
        }
        (
            ResourceKind::IamUser | ResourceKind::IamRole,
            ViolationKind::SuspiciousCredentialActivity,
        ) => Some(Procedure::CredentialContainment),
        _ => None,
    }
}

/// Label an unsupported pair for the response body.
pub fn unsupported_outcome(kind: ResourceKind, violation: ViolationKind) -> RemediationOutcome {
    RemediationOutcome::unsupported(format!(
        "no remediation procedure for {} with violation {}",
        kind, violation
    ))
}
