//! Default configuration values
//!
//! Thresholds and tunings that are configuration surface with fixed
//! defaults. Callers can override them on the responder config.

use std::time::Duration;

/// Minimum detection-finding severity (0-10 scale) at which containment
/// actions execute. Below this, evidence is still collected and reported
/// but nothing is mutated.
pub const DEFAULT_SEVERITY_THRESHOLD: f64 = 7.0;

/// Identity-management event names that indicate possible credential
/// compromise and always trigger containment.
pub const SUSPICIOUS_IAM_EVENTS: &[&str] = &[
    "CreateAccessKey",
    "CreateLoginProfile",
    "UpdateLoginProfile",
    "AttachUserPolicy",
    "AttachRolePolicy",
    "PutUserPolicy",
    "PutRolePolicy",
    "CreatePolicyVersion",
    "SetDefaultPolicyVersion",
];

/// Activity window looked up when collecting evidence for a principal.
pub const EVIDENCE_ACTIVITY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum activity events collected per evidence record.
pub const EVIDENCE_ACTIVITY_MAX_EVENTS: i32 = 50;

/// Poll interval for asynchronous provider completion checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Overall deadline for a storage snapshot to reach its ready state.
pub const DEFAULT_SNAPSHOT_WAIT: Duration = Duration::from_secs(15 * 60);

/// Overall deadline for a volume to become available (after creation or
/// detach).
pub const DEFAULT_VOLUME_WAIT: Duration = Duration::from_secs(10 * 60);
