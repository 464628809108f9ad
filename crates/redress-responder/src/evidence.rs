//! Evidence persistence
//!
//! Every invocation produces exactly one evidence record, persisted
//! regardless of outcome. With an evidence bucket configured the record
//! is stored as encrypted JSON under a key derived from the violation,
//! resource and timestamp; without one it is emitted to the log so the
//! record is never silently dropped.

use crate::aws::s3::BucketOperations;
use anyhow::{Context, Result};
use redress_common::evidence::EvidenceRecord;
use tracing::info;

/// Destination for evidence records.
#[allow(async_fn_in_trait)]
pub trait EvidenceSink: Send + Sync {
    async fn persist(&self, record: &EvidenceRecord) -> Result<()>;
}

/// Stores evidence records in a bucket.
pub struct BucketEvidenceSink<B> {
    buckets: B,
    bucket: String,
}

impl<B: BucketOperations> BucketEvidenceSink<B> {
    pub fn new(buckets: B, bucket: impl Into<String>) -> Self {
        Self {
            buckets,
            bucket: bucket.into(),
        }
    }
}

impl<B: BucketOperations> EvidenceSink for BucketEvidenceSink<B> {
    async fn persist(&self, record: &EvidenceRecord) -> Result<()> {
        let key = record.object_key();
        let body =
            serde_json::to_string_pretty(record).context("Failed to serialize evidence record")?;

        self.buckets
            .put_json_object(&self.bucket, &key, body)
            .await
            .context("Failed to store evidence record")?;

        info!(bucket = %self.bucket, key = %key, "Evidence record stored");
        Ok(())
    }
}

/// Fallback when no evidence bucket is configured: the record goes to
/// the log instead.
pub struct LogEvidenceSink;

impl EvidenceSink for LogEvidenceSink {
    async fn persist(&self, record: &EvidenceRecord) -> Result<()> {
        let body =
            serde_json::to_string(record).context("Failed to serialize evidence record")?;
        info!(
            resource = %record.resource,
            outcome = record.outcome.label(),
            evidence = %body,
            "No evidence bucket configured; record logged only"
        );
        Ok(())
    }
}

/// The sink the responder actually runs with, chosen from configuration.
pub enum ResponderEvidenceSink {
    Bucket(BucketEvidenceSink<crate::aws::s3::S3Client>),
    Log(LogEvidenceSink),
}

impl EvidenceSink for ResponderEvidenceSink {
    async fn persist(&self, record: &EvidenceRecord) -> Result<()> {
        match self {
            Self::Bucket(sink) => sink.persist(record).await,
            Self::Log(sink) => sink.persist(record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::s3::ObjectEncryption;
    use chrono::{DateTime, Utc};
    use redress_common::outcome::RemediationOutcome;
    use redress_common::policy::PolicyDocument;
    use redress_common::resource::{ResourceDescriptor, ResourceKind, ViolationKind};
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBucket {
        puts: Mutex<Vec<(String, String, String)>>,
    }

    impl BucketOperations for RecordingBucket {
        async fn apply_public_access_block(&self, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn get_bucket_policy(&self, _: &str) -> Result<Option<PolicyDocument>> {
            unreachable!()
        }
        async fn put_bucket_policy(&self, _: &str, _: &PolicyDocument) -> Result<()> {
            unreachable!()
        }
        async fn delete_bucket_policy(&self, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn get_bucket_encryption(&self, _: &str) -> Result<Option<Value>> {
            unreachable!()
        }
        async fn put_default_encryption(&self, _: &str, _: Option<&str>) -> Result<()> {
            unreachable!()
        }
        async fn object_encryption(&self, _: &str, _: &str) -> Result<ObjectEncryption> {
            unreachable!()
        }
        async fn reencrypt_object(&self, _: &str, _: &str, _: Option<&str>) -> Result<()> {
            unreachable!()
        }
        async fn bucket_location(&self, _: &str) -> Result<String> {
            unreachable!()
        }
        async fn get_public_access_block(&self, _: &str) -> Result<Option<Value>> {
            unreachable!()
        }
        async fn get_bucket_acl(&self, _: &str) -> Result<Value> {
            unreachable!()
        }
        async fn put_json_object(&self, bucket: &str, key: &str, body: String) -> Result<()> {
            self.puts
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string(), body));
            Ok(())
        }
    }

    #[tokio::test]
    async fn record_lands_under_derived_key() {
        let ts = DateTime::parse_from_rfc3339("2026-08-26T10:20:30Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = EvidenceRecord {
            violation_kind: ViolationKind::Unencrypted,
            resource: ResourceDescriptor::new(ResourceKind::Volume, "vol-1"),
            before: None,
            after: None,
            outcome: RemediationOutcome::success("ok", None),
            containment_actions: vec![],
            error_detail: None,
            timestamp: ts,
        };

        let sink = BucketEvidenceSink::new(RecordingBucket::default(), "evidence");
        sink.persist(&record).await.unwrap();

        let puts = sink.buckets.puts.lock().unwrap();
        let (bucket, key, body) = &puts[0];
        assert_eq!(bucket, "evidence");
        assert_eq!(
            key,
            "remediation-logs/unencrypted/volume/vol-1/2026-08-26-10-20-30.json"
        );
        let parsed: EvidenceRecord = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.resource, record.resource);
    }
}
