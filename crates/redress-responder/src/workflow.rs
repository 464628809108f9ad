//! Incident workflow hand-off
//!
//! After a containment mutates a principal, the configured automation
//! document is started so investigation continues outside the responder.
//! Best-effort like notification: a failed start is logged, not fatal.

use crate::aws::ssm::SsmClient;
use anyhow::Result;
use redress_common::evidence::EvidenceRecord;
use std::collections::HashMap;

/// Starts the follow-up investigation workflow.
#[allow(async_fn_in_trait)]
pub trait WorkflowLauncher: Send + Sync {
    /// Returns the execution id when a workflow was started.
    async fn launch(&self, record: &EvidenceRecord) -> Result<Option<String>>;
}

/// Launches an SSM automation document.
pub struct SsmWorkflow {
    client: SsmClient,
    document: String,
    evidence_bucket: Option<String>,
}

impl SsmWorkflow {
    pub fn new(client: SsmClient, document: impl Into<String>, evidence_bucket: Option<String>) -> Self {
        Self {
            client,
            document: document.into(),
            evidence_bucket,
        }
    }
}

impl WorkflowLauncher for SsmWorkflow {
    async fn launch(&self, record: &EvidenceRecord) -> Result<Option<String>> {
        let mut parameters: HashMap<String, Vec<String>> = HashMap::from([
            (
                "PrincipalType".to_string(),
                vec![record.resource.kind.short_name().to_string()],
            ),
            ("PrincipalId".to_string(), vec![record.resource.id.clone()]),
            (
                "Timestamp".to_string(),
                vec![record.timestamp.to_rfc3339()],
            ),
        ]);
        if let Some(bucket) = &self.evidence_bucket {
            parameters.insert("EvidenceBucket".to_string(), vec![bucket.clone()]);
        }

        let execution_id = self
            .client
            .start_automation(&self.document, parameters)
            .await?;
        Ok(Some(execution_id))
    }
}
