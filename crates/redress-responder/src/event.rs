//! Inbound event classification
//!
//! Three invocation shapes arrive at the responder: scheduled compliance
//! evaluations (embedded `invokingEvent` JSON string with a
//! `configurationItem`), event-stream payloads (`detail` object from the
//! event bus, covering resource notifications, S3 data events, identity
//! events and detection findings), and direct invocations with the
//! resource named at the top level. Classification reduces all three to
//! one `ResourceDescriptor` plus `ViolationKind`, with the extras the
//! containment and object procedures need.

use crate::error::RemediationError;
use redress_common::resource::{ResourceDescriptor, ResourceKind, ViolationKind};
use serde_json::Value;
use tracing::debug;

/// Extra context for credential containment, carried only when the
/// inbound event is a detection finding or identity event.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainmentTrigger {
    /// Detection finding with a 0-10 severity score.
    Finding {
        severity: f64,
        access_key_id: Option<String>,
    },
    /// Identity management event from the audit trail.
    IdentityEvent {
        event_name: String,
        /// Set when the event itself created a credential (CreateAccessKey
        /// response), so containment can disable exactly that key.
        created_access_key_id: Option<String>,
    },
}

/// The classified form of an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub resource: ResourceDescriptor,
    pub violation: ViolationKind,
    /// Present only for single-object encryption events.
    pub object_key: Option<String>,
    pub trigger: Option<ContainmentTrigger>,
}

impl Classified {
    fn plain(resource: ResourceDescriptor, violation: ViolationKind) -> Self {
        Self {
            resource,
            violation,
            object_key: None,
            trigger: None,
        }
    }
}

/// The violation a resource kind implies when the event names only the
/// resource.
fn default_violation(kind: ResourceKind) -> ViolationKind {
    match kind {
        ResourceKind::Volume | ResourceKind::DbInstance => ViolationKind::Unencrypted,
        ResourceKind::Bucket => ViolationKind::PubliclyExposed,
        ResourceKind::IamUser | ResourceKind::IamRole => {
            ViolationKind::SuspiciousCredentialActivity
        }
    }
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Classify an inbound event into a resource, violation and extras.
pub fn classify(event: &Value) -> Result<Classified, RemediationError> {
    if let Some(classified) = classify_scheduled(event)? {
        debug!(resource = %classified.resource, "Classified scheduled compliance event");
        return Ok(classified);
    }
    if let Some(classified) = classify_stream(event)? {
        debug!(resource = %classified.resource, "Classified event-stream payload");
        return Ok(classified);
    }
    if let Some(classified) = classify_direct(event)? {
        debug!(resource = %classified.resource, "Classified direct invocation");
        return Ok(classified);
    }

    Err(RemediationError::Classification(
        "event matches no known invocation shape".to_string(),
    ))
}

/// Scheduled compliance shape: `invokingEvent` is a JSON string holding a
/// `configurationItem` with the resource type and id.
fn classify_scheduled(event: &Value) -> Result<Option<Classified>, RemediationError> {
    let Some(raw) = str_at(event, "/invokingEvent") else {
        return Ok(None);
    };

    let invoking: Value = serde_json::from_str(raw).map_err(|e| {
        RemediationError::Classification(format!("invokingEvent is not valid JSON: {e}"))
    })?;

    let item = invoking
        .pointer("/configurationItem")
        .ok_or_else(|| {
            RemediationError::Classification("invokingEvent has no configurationItem".to_string())
        })?;

    let resource_type = str_at(item, "/resourceType").ok_or_else(|| {
        RemediationError::Classification("configurationItem has no resourceType".to_string())
    })?;
    let kind = ResourceKind::from_provider_type(resource_type).ok_or_else(|| {
        RemediationError::Classification(format!("unsupported resource type {resource_type}"))
    })?;

    // Buckets are identified by name in compliance payloads.
    let id = match kind {
        ResourceKind::Bucket => str_at(item, "/resourceName").or_else(|| str_at(item, "/resourceId")),
        _ => str_at(item, "/resourceId"),
    }
    .ok_or_else(|| {
        RemediationError::Classification("configurationItem has no resource id".to_string())
    })?;

    let violation = match kind {
        ResourceKind::Bucket => {
            let rule = str_at(event, "/configRuleName").unwrap_or_default();
            if rule.to_ascii_lowercase().contains("public") {
                ViolationKind::PubliclyExposed
            } else {
                ViolationKind::Unencrypted
            }
        }
        other => default_violation(other),
    };

    Ok(Some(Classified::plain(
        ResourceDescriptor::new(kind, id),
        violation,
    )))
}

/// Event-stream shape: everything under `detail`.
fn classify_stream(event: &Value) -> Result<Option<Classified>, RemediationError> {
    let Some(detail) = event.get("detail") else {
        return Ok(None);
    };

    // Identity management event from the audit trail.
    if str_at(detail, "/eventSource") == Some("iam.amazonaws.com") {
        return classify_identity_event(detail).map(Some);
    }

    // Detection finding with a severity score.
    if let Some(severity) = detail.pointer("/severity").and_then(Value::as_f64) {
        return classify_finding(detail, severity).map(Some);
    }

    // Resource notification with an explicit type and id.
    if let (Some(resource_type), Some(id)) =
        (str_at(detail, "/resourceType"), str_at(detail, "/resourceId"))
    {
        let kind = ResourceKind::from_provider_type(resource_type).ok_or_else(|| {
            RemediationError::Classification(format!("unsupported resource type {resource_type}"))
        })?;
        return Ok(Some(Classified::plain(
            ResourceDescriptor::new(kind, id),
            default_violation(kind),
        )));
    }

    // S3 data event naming a bucket and optionally an object.
    if let Some(bucket) = str_at(detail, "/requestParameters/bucketName") {
        let object_key = str_at(detail, "/requestParameters/key").map(str::to_string);
        return Ok(Some(Classified {
            resource: ResourceDescriptor::new(ResourceKind::Bucket, bucket),
            violation: ViolationKind::Unencrypted,
            object_key,
            trigger: None,
        }));
    }

    Ok(None)
}

fn classify_identity_event(detail: &Value) -> Result<Classified, RemediationError> {
    let event_name = str_at(detail, "/eventName")
        .ok_or_else(|| {
            RemediationError::Classification("identity event has no eventName".to_string())
        })?
        .to_string();

    let identity_type = str_at(detail, "/userIdentity/type")
        .unwrap_or_default()
        .to_ascii_lowercase();

    let resource = match identity_type.as_str() {
        "iamuser" => str_at(detail, "/userIdentity/userName")
            .map(|name| ResourceDescriptor::new(ResourceKind::IamUser, name)),
        "assumedrole" => str_at(detail, "/userIdentity/sessionContext/sessionIssuer/userName")
            .map(|name| ResourceDescriptor::new(ResourceKind::IamRole, name)),
        _ => None,
    }
    .ok_or_else(|| {
        RemediationError::Classification(
            "could not determine the affected principal from identity event".to_string(),
        )
    })?;

    let created_access_key_id = if event_name == "CreateAccessKey" {
        str_at(detail, "/responseElements/accessKey/accessKeyId").map(str::to_string)
    } else {
        None
    };

    Ok(Classified {
        resource,
        violation: ViolationKind::SuspiciousCredentialActivity,
        object_key: None,
        trigger: Some(ContainmentTrigger::IdentityEvent {
            event_name,
            created_access_key_id,
        }),
    })
}

fn classify_finding(detail: &Value, severity: f64) -> Result<Classified, RemediationError> {
    let (resource, access_key_id) =
        if let Some(user) = str_at(detail, "/resource/accessKeyDetails/userName") {
            (
                ResourceDescriptor::new(ResourceKind::IamUser, user),
                str_at(detail, "/resource/accessKeyDetails/accessKeyId").map(str::to_string),
            )
        } else if let Some(role) = str_at(detail, "/resource/iamInstanceProfile/name") {
            (ResourceDescriptor::new(ResourceKind::IamRole, role), None)
        } else {
            return Err(RemediationError::Classification(
                "could not determine the affected principal from finding".to_string(),
            ));
        };

    Ok(Classified {
        resource,
        violation: ViolationKind::SuspiciousCredentialActivity,
        object_key: None,
        trigger: Some(ContainmentTrigger::Finding {
            severity,
            access_key_id,
        }),
    })
}

/// Direct invocation shape: the resource named at the top level. An
/// optional `violation` short name picks between the bucket procedures;
/// without it, an object key implies encryption and a bare bucket
/// implies exposure.
fn classify_direct(event: &Value) -> Result<Option<Classified>, RemediationError> {
    if let (Some(resource_type), Some(id)) =
        (str_at(event, "/resourceType"), str_at(event, "/resourceId"))
    {
        let Some(kind) = ResourceKind::from_provider_type(resource_type) else {
            return Ok(None);
        };
        return Ok(Some(Classified::plain(
            ResourceDescriptor::new(kind, id),
            default_violation(kind),
        )));
    }

    if let Some(bucket) = str_at(event, "/bucket_name") {
        let object_key = str_at(event, "/object_key").map(str::to_string);
        let violation = match str_at(event, "/violation") {
            Some(name) => ViolationKind::from_short_name(name).ok_or_else(|| {
                RemediationError::Classification(format!("unknown violation '{name}'"))
            })?,
            None if object_key.is_some() => ViolationKind::Unencrypted,
            None => ViolationKind::PubliclyExposed,
        };
        return Ok(Some(Classified {
            resource: ResourceDescriptor::new(ResourceKind::Bucket, bucket),
            violation,
            object_key,
            trigger: None,
        }));
    }

    Ok(None)
}
