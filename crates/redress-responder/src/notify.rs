//! Outcome notifications
//!
//! Best-effort: a notification failure is logged and swallowed, never
//! failing the invocation that produced the outcome.

use crate::aws::sns::SnsClient;
use anyhow::Result;
use redress_common::evidence::EvidenceRecord;

/// Subject line for an outcome notification.
pub fn subject(record: &EvidenceRecord) -> String {
    format!(
        "Remediation {}: {} '{}'",
        record.outcome.label(),
        record.resource.kind.short_name(),
        record.resource.id,
    )
}

/// Plain-text notification body.
pub fn body(record: &EvidenceRecord) -> String {
    let actions = if record.containment_actions.is_empty() {
        "  None".to_string()
    } else {
        record
            .containment_actions
            .iter()
            .map(|a| format!("  - {a}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Resource: {}\nViolation: {}\nOutcome: {}\nActions taken:\n{}\nTimestamp: {}",
        record.resource,
        record.violation_kind,
        record.outcome,
        actions,
        record.timestamp.to_rfc3339(),
    )
}

/// Channel an outcome notification is delivered on.
#[allow(async_fn_in_trait)]
pub trait OutcomeNotifier: Send + Sync {
    async fn notify(&self, record: &EvidenceRecord) -> Result<()>;
}

/// Publishes outcome notifications to an SNS topic.
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

impl OutcomeNotifier for SnsNotifier {
    async fn notify(&self, record: &EvidenceRecord) -> Result<()> {
        self.client
            .publish(&self.topic_arn, &subject(record), &body(record))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use redress_common::outcome::RemediationOutcome;
    use redress_common::resource::{ResourceDescriptor, ResourceKind, ViolationKind};

    fn record(actions: Vec<String>) -> EvidenceRecord {
        EvidenceRecord {
            violation_kind: ViolationKind::SuspiciousCredentialActivity,
            resource: ResourceDescriptor::new(ResourceKind::IamUser, "mallory"),
            before: None,
            after: None,
            outcome: RemediationOutcome::success("contained", None),
            containment_actions: actions,
            error_detail: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn subject_names_outcome_and_resource() {
        let s = subject(&record(vec![]));
        assert!(s.contains("SUCCESS"));
        assert!(s.contains("iam-user 'mallory'"));
    }

    #[test]
    fn body_lists_actions() {
        let b = body(&record(vec![
            "deactivated access key AKIA1 for user mallory".into(),
        ]));
        assert!(b.contains("  - deactivated access key AKIA1"));
    }

    #[test]
    fn body_defaults_to_none_without_actions() {
        let b = body(&record(vec![]));
        assert!(b.contains("Actions taken:\n  None"));
    }
}
