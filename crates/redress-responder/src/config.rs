//! Responder configuration
//!
//! Everything the procedures parameterize on: the evidence bucket, the
//! notification topic, the KMS key for re-encryption, the containment
//! severity threshold and event allow-list, and the polling bounds.
//! Values come from CLI flags or environment variables; unset optional
//! surfaces degrade gracefully (no evidence bucket means log-only
//! evidence, no topic means no notifications).

use redress_common::defaults::{
    DEFAULT_POLL_INTERVAL, DEFAULT_SEVERITY_THRESHOLD, DEFAULT_SNAPSHOT_WAIT,
    DEFAULT_VOLUME_WAIT, SUSPICIOUS_IAM_EVENTS,
};
use std::time::Duration;

/// Runtime configuration for one responder invocation.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// AWS region every client targets.
    pub region: String,
    /// Bucket for evidence records; `None` means log-only evidence.
    pub evidence_bucket: Option<String>,
    /// Topic for outcome notifications; `None` disables them.
    pub sns_topic_arn: Option<String>,
    /// Customer KMS key for re-encryption; `None` uses the default
    /// managed key.
    pub kms_key_id: Option<String>,
    /// Automation document started after containment; `None` skips the
    /// hand-off.
    pub workflow_document: Option<String>,
    /// Findings at or above this severity trigger containment mutations.
    pub severity_threshold: f64,
    /// Identity event names that always trigger containment.
    pub suspicious_events: Vec<String>,
    /// Delay between terminal-state checks.
    pub poll_interval: Duration,
    /// Deadline for snapshot completion.
    pub snapshot_wait: Duration,
    /// Deadline for volume state transitions.
    pub volume_wait: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            evidence_bucket: None,
            sns_topic_arn: None,
            kms_key_id: None,
            workflow_document: None,
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            suspicious_events: SUSPICIOUS_IAM_EVENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            snapshot_wait: DEFAULT_SNAPSHOT_WAIT,
            volume_wait: DEFAULT_VOLUME_WAIT,
        }
    }
}

impl ResponderConfig {
    /// Whether an identity event name is on the containment allow-list.
    pub fn is_suspicious_event(&self, event_name: &str) -> bool {
        self.suspicious_events.iter().any(|e| e == event_name)
    }

    /// Whether a finding severity crosses the mutation threshold.
    pub fn severity_requires_containment(&self, severity: f64) -> bool {
        severity >= self.severity_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_matches_known_events() {
        let config = ResponderConfig::default();
        assert!(config.is_suspicious_event("CreateAccessKey"));
        assert!(config.is_suspicious_event("SetDefaultPolicyVersion"));
        assert!(!config.is_suspicious_event("GetUser"));
    }

    #[test]
    fn severity_threshold_is_inclusive() {
        let config = ResponderConfig::default();
        assert!(!config.severity_requires_containment(6.9));
        assert!(config.severity_requires_containment(7.0));
        assert!(config.severity_requires_containment(9.5));
    }
}
