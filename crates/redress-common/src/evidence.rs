//! Immutable per-invocation audit record
//!
//! One `EvidenceRecord` is created per invocation and never mutated after
//! creation. It is persisted regardless of outcome; when snapshot capture
//! itself fails, the failure reason becomes the evidence.

use crate::outcome::RemediationOutcome;
use crate::resource::{ResourceDescriptor, ViolationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Point-in-time serialized read of a resource's externally visible
/// configuration. Attributes are an opaque provider-specific bag; the saga
/// executor never parses them. Partial snapshots (with some attributes
/// null or missing) are valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub resource: ResourceDescriptor,
    pub captured_at: DateTime<Utc>,
    pub attributes: Map<String, Value>,
}

impl ResourceSnapshot {
    pub fn new(resource: ResourceDescriptor, captured_at: DateTime<Utc>) -> Self {
        Self {
            resource,
            captured_at,
            attributes: Map::new(),
        }
    }
}

/// The audit artifact produced for every invocation.
///
/// Invariants: every outcome other than `Unsupported` has a `before`
/// snapshot; `after` is populated only on `Success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub violation_kind: ViolationKind,
    pub resource: ResourceDescriptor,
    pub before: Option<ResourceSnapshot>,
    pub after: Option<ResourceSnapshot>,
    pub outcome: RemediationOutcome,
    /// Ordered descriptions of containment/remediation actions taken.
    pub containment_actions: Vec<String>,
    /// Structured failure detail (failed step, orphaned resources) when
    /// the procedure did not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl EvidenceRecord {
    /// Object key under which this record is stored in the evidence
    /// bucket, keyed by violation kind, resource kind, resource id and
    /// timestamp.
    pub fn object_key(&self) -> String {
        format!(
            "remediation-logs/{}/{}/{}/{}.json",
            self.violation_kind.short_name(),
            self.resource.kind.short_name(),
            self.resource.id,
            self.timestamp.format("%Y-%m-%d-%H-%M-%S"),
        )
    }
}
