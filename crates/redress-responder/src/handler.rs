//! Invocation orchestration
//!
//! One invocation: classify the event, snapshot the resource, run the
//! selected procedure, snapshot again on success, then persist evidence
//! and send the notification. Evidence and notification are best-effort
//! at this level; a failed write is logged and the invocation still
//! returns its outcome.

use crate::aws::cloudtrail::ActivityOperations;
use crate::aws::context::AwsContext;
use crate::aws::ec2::VolumeOperations;
use crate::aws::iam::PrincipalOperations;
use crate::aws::rds::DatabaseOperations;
use crate::aws::s3::BucketOperations;
use crate::aws::{CloudTrailClient, Ec2Client, IamClient, RdsClient, S3Client, SnsClient, SsmClient};
use crate::config::ResponderConfig;
use crate::error::RemediationError;
use crate::event::{classify, Classified};
use crate::evidence::{BucketEvidenceSink, EvidenceSink, LogEvidenceSink, ResponderEvidenceSink};
use crate::notify::{OutcomeNotifier, SnsNotifier};
use crate::saga::volume::VolumeSagaConfig;
use crate::saga::{self, Procedure, ProcedureResult};
use crate::snapshot;
use crate::workflow::{SsmWorkflow, WorkflowLauncher};
use chrono::Utc;
use redress_common::evidence::{EvidenceRecord, ResourceSnapshot};
use redress_common::outcome::RemediationOutcome;
use redress_common::resource::{ResourceDescriptor, ResourceKind, ViolationKind};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// HTTP-style invocation response.
#[derive(Debug, Serialize)]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: Value,
}

/// The responder, generic over its provider operations so tests can run
/// the full invocation path against in-memory fakes.
pub struct Responder<V, B, D, P, A, E, N, W> {
    volumes: V,
    buckets: B,
    databases: D,
    principals: P,
    activity: A,
    evidence: E,
    notifier: Option<N>,
    workflow: Option<W>,
    config: ResponderConfig,
}

/// The responder as wired against real AWS clients.
pub type AwsResponder = Responder<
    Ec2Client,
    S3Client,
    RdsClient,
    IamClient,
    CloudTrailClient,
    ResponderEvidenceSink,
    SnsNotifier,
    SsmWorkflow,
>;

impl AwsResponder {
    /// Build a responder with real AWS clients from configuration.
    pub async fn from_config(config: ResponderConfig) -> Self {
        let ctx = AwsContext::new(&config.region).await;

        let evidence = match &config.evidence_bucket {
            Some(bucket) => ResponderEvidenceSink::Bucket(BucketEvidenceSink::new(
                S3Client::from_context(&ctx),
                bucket.clone(),
            )),
            None => ResponderEvidenceSink::Log(LogEvidenceSink),
        };
        let notifier = config
            .sns_topic_arn
            .as_ref()
            .map(|topic| SnsNotifier::new(SnsClient::from_context(&ctx), topic.clone()));
        let workflow = config.workflow_document.as_ref().map(|document| {
            SsmWorkflow::new(
                SsmClient::from_context(&ctx),
                document.clone(),
                config.evidence_bucket.clone(),
            )
        });

        Self {
            volumes: Ec2Client::from_context(&ctx),
            buckets: S3Client::from_context(&ctx),
            databases: RdsClient::from_context(&ctx),
            principals: IamClient::from_context(&ctx),
            activity: CloudTrailClient::from_context(&ctx),
            evidence,
            notifier,
            workflow,
            config,
        }
    }
}

impl<V, B, D, P, A, E, N, W> Responder<V, B, D, P, A, E, N, W>
where
    V: VolumeOperations,
    B: BucketOperations,
    D: DatabaseOperations,
    P: PrincipalOperations,
    A: ActivityOperations,
    E: EvidenceSink,
    N: OutcomeNotifier,
    W: WorkflowLauncher,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        volumes: V,
        buckets: B,
        databases: D,
        principals: P,
        activity: A,
        evidence: E,
        notifier: Option<N>,
        workflow: Option<W>,
        config: ResponderConfig,
    ) -> Self {
        Self {
            volumes,
            buckets,
            databases,
            principals,
            activity,
            evidence,
            notifier,
            workflow,
            config,
        }
    }

    /// Handle one inbound event end to end.
    pub async fn handle(&self, event: &Value) -> InvocationResponse {
        let classified = match classify(event) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "Event classification failed");
                return InvocationResponse {
                    status_code: e.status_code(),
                    body: json!({ "error": e.to_string() }),
                };
            }
        };
        info!(
            resource = %classified.resource,
            violation = %classified.violation,
            "Handling remediation event"
        );

        let kind = classified.resource.kind;
        let violation = classified.violation;

        let Some(procedure) = saga::select(kind, violation, classified.object_key.is_some())
        else {
            let outcome = saga::unsupported_outcome(kind, violation);
            let status = outcome.status_code();
            let record = build_record(&classified, None, None, outcome, Vec::new(), None);
            self.finalize(&record).await;
            return respond(&record, status);
        };

        let before = self.capture(&classified.resource).await;
        let result = self.execute(procedure, &classified).await;

        let (outcome, actions, status, error_detail) = match result {
            Ok(ProcedureResult { outcome, actions }) => {
                let status = outcome.status_code();
                (outcome, actions, status, None)
            }
            Err(e) => {
                error!(resource = %classified.resource, error = %e, "Remediation failed");
                let actions = match &e {
                    RemediationError::PartialSaga { completed, .. } => completed.clone(),
                    _ => Vec::new(),
                };
                let status = e.status_code();
                (
                    RemediationOutcome::failed(format!("{e:#}")),
                    actions,
                    status,
                    e.detail(),
                )
            }
        };

        let after = if matches!(outcome, RemediationOutcome::Success { .. }) {
            Some(self.capture(&classified.resource).await)
        } else {
            None
        };

        let record = build_record(
            &classified,
            Some(before),
            after,
            outcome,
            actions,
            error_detail,
        );
        self.finalize(&record).await;

        respond(&record, status)
    }

    async fn execute(
        &self,
        procedure: Procedure,
        classified: &Classified,
    ) -> Result<ProcedureResult, RemediationError> {
        let id = &classified.resource.id;
        match procedure {
            Procedure::VolumeReencryption => {
                let config = VolumeSagaConfig {
                    kms_key_id: self.config.kms_key_id.clone(),
                    poll_interval: self.config.poll_interval,
                    snapshot_wait: self.config.snapshot_wait,
                    volume_wait: self.config.volume_wait,
                };
                saga::volume::reencrypt_volume(&self.volumes, &config, id).await
            }
            Procedure::BucketPolicyNormalization => {
                saga::bucket::normalize_public_access(&self.buckets, id).await
            }
            Procedure::BucketDefaultEncryption => {
                saga::bucket::enable_default_encryption(
                    &self.buckets,
                    id,
                    self.config.kms_key_id.as_deref(),
                )
                .await
            }
            Procedure::ObjectReencryption => {
                let key = classified.object_key.as_deref().ok_or_else(|| {
                    RemediationError::Classification(
                        "object encryption event names no object key".to_string(),
                    )
                })?;
                saga::object::ensure_object_encrypted(
                    &self.buckets,
                    id,
                    key,
                    self.config.kms_key_id.as_deref(),
                )
                .await
            }
            Procedure::CredentialContainment => {
                let trigger = classified.trigger.as_ref().ok_or_else(|| {
                    RemediationError::Classification(
                        "credential containment requires a detection finding or identity event"
                            .to_string(),
                    )
                })?;
                saga::iam::contain_principal(
                    &self.principals,
                    &self.activity,
                    &self.config,
                    &classified.resource,
                    trigger,
                )
                .await
            }
            Procedure::DatabaseEncryptionCheck => {
                saga::database::check_storage_encryption(&self.databases, id).await
            }
        }
    }

    async fn capture(&self, resource: &ResourceDescriptor) -> ResourceSnapshot {
        match resource.kind {
            ResourceKind::Volume => snapshot::capture_volume(&self.volumes, &resource.id).await,
            ResourceKind::Bucket => snapshot::capture_bucket(&self.buckets, &resource.id).await,
            ResourceKind::DbInstance => {
                snapshot::capture_database(&self.databases, &resource.id).await
            }
            ResourceKind::IamUser | ResourceKind::IamRole => {
                snapshot::capture_principal(&self.principals, resource).await
            }
        }
    }

    /// Persist evidence, notify, and hand off to the incident workflow.
    /// All best-effort: the invocation's outcome stands regardless.
    async fn finalize(&self, record: &EvidenceRecord) {
        if let Err(e) = self.evidence.persist(record).await {
            error!(resource = %record.resource, error = %e, "Failed to persist evidence");
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(record).await {
                warn!(resource = %record.resource, error = %e, "Notification failed");
            }
        }

        let contained = record.violation_kind == ViolationKind::SuspiciousCredentialActivity
            && !record.containment_actions.is_empty();
        if contained {
            if let Some(workflow) = &self.workflow {
                match workflow.launch(record).await {
                    Ok(Some(execution_id)) => {
                        info!(execution_id = %execution_id, "Incident workflow started");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "Failed to start incident workflow");
                    }
                }
            }
        }
    }
}

fn build_record(
    classified: &Classified,
    before: Option<ResourceSnapshot>,
    after: Option<ResourceSnapshot>,
    outcome: RemediationOutcome,
    actions: Vec<String>,
    error_detail: Option<Value>,
) -> EvidenceRecord {
    EvidenceRecord {
        violation_kind: classified.violation,
        resource: classified.resource.clone(),
        before,
        after,
        outcome,
        containment_actions: actions,
        error_detail,
        timestamp: Utc::now(),
    }
}

fn respond(record: &EvidenceRecord, status_code: u16) -> InvocationResponse {
    let mut body = json!({
        "resource": {
            "kind": record.resource.kind.short_name(),
            "id": record.resource.id,
        },
        "violation": record.violation_kind.short_name(),
        "outcome": serde_json::to_value(&record.outcome).unwrap_or(Value::Null),
        "actions": record.containment_actions,
    });
    if let Some(detail) = &record.error_detail {
        body["error_detail"] = detail.clone();
    }
    InvocationResponse { status_code, body }
}
