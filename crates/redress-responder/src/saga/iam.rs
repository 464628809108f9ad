//! IAM credential containment
//!
//! Evidence first, containment second. Recent activity for the principal
//! is always collected (best-effort; a failed lookup never blocks
//! containment). Mutations are gated: detection findings must reach the
//! severity threshold, identity events must be on the suspicious-event
//! allow-list. When containment runs it deactivates the credential the
//! triggering action created (if its id is known) and attaches a
//! timestamped deny-all inline policy with the exception-tag escape
//! hatch. Credentials are deactivated, never deleted, so forensics keeps
//! the artifact.

use crate::aws::cloudtrail::{ActivityLookup, ActivityOperations};
use crate::aws::iam::PrincipalOperations;
use crate::config::ResponderConfig;
use crate::error::RemediationError;
use crate::event::ContainmentTrigger;
use crate::saga::ProcedureResult;
use chrono::Utc;
use redress_common::defaults::{EVIDENCE_ACTIVITY_MAX_EVENTS, EVIDENCE_ACTIVITY_WINDOW};
use redress_common::outcome::RemediationOutcome;
use redress_common::policy::{containment_policy_document, containment_policy_name};
use redress_common::resource::{ResourceDescriptor, ResourceKind};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Whether the trigger warrants mutating the principal, and a short label
/// explaining the decision.
fn containment_decision(
    config: &ResponderConfig,
    trigger: &ContainmentTrigger,
) -> (bool, String) {
    match trigger {
        ContainmentTrigger::Finding { severity, .. } => (
            config.severity_requires_containment(*severity),
            format!(
                "finding severity {severity} (threshold {})",
                config.severity_threshold
            ),
        ),
        ContainmentTrigger::IdentityEvent { event_name, .. } => (
            config.is_suspicious_event(event_name),
            format!("identity event {event_name}"),
        ),
    }
}

/// The credential to deactivate, when the trigger identifies one.
fn credential_to_disable(trigger: &ContainmentTrigger) -> Option<&str> {
    match trigger {
        ContainmentTrigger::Finding { access_key_id, .. } => access_key_id.as_deref(),
        ContainmentTrigger::IdentityEvent {
            created_access_key_id,
            ..
        } => created_access_key_id.as_deref(),
    }
}

/// Contain a compromised IAM principal.
pub async fn contain_principal(
    principals: &impl PrincipalOperations,
    activity: &impl ActivityOperations,
    config: &ResponderConfig,
    resource: &ResourceDescriptor,
    trigger: &ContainmentTrigger,
) -> Result<ProcedureResult, RemediationError> {
    // Best-effort activity history: worth having, never worth blocking on.
    let recent_activity: Vec<Value> = match activity
        .recent_events(
            ActivityLookup::for_principal(resource.kind),
            &resource.id,
            EVIDENCE_ACTIVITY_WINDOW,
            EVIDENCE_ACTIVITY_MAX_EVENTS,
        )
        .await
    {
        Ok(events) => events,
        Err(e) => {
            warn!(principal = %resource.id, error = %e, "Activity lookup failed");
            Vec::new()
        }
    };

    let (contain, reason) = containment_decision(config, trigger);
    if !contain {
        info!(principal = %resource.id, reason = %reason, "No containment required");
        return Ok(ProcedureResult::new(RemediationOutcome::success(
            format!(
                "evidence collected for {}; no containment required ({reason})",
                resource
            ),
            Some(json!({
                "contained": false,
                "reason": reason,
                "recent_activity_events": recent_activity.len(),
                "recent_activity": recent_activity,
            })),
        )));
    }

    let mut actions: Vec<String> = Vec::new();

    if resource.kind == ResourceKind::IamUser {
        if let Some(access_key_id) = credential_to_disable(trigger) {
            principals
                .disable_access_key(&resource.id, access_key_id)
                .await
                .map_err(|source| RemediationError::Provider {
                    operation: "disable_access_key",
                    source,
                })?;
            actions.push(format!(
                "deactivated access key {access_key_id} for user {}",
                resource.id
            ));
        }
    }

    let policy_name = containment_policy_name(Utc::now());
    let document = serde_json::to_string(&containment_policy_document()).map_err(|e| {
        RemediationError::Provider {
            operation: "serialize_containment_policy",
            source: e.into(),
        }
    })?;

    let attach = match resource.kind {
        ResourceKind::IamUser => {
            principals
                .put_user_inline_policy(&resource.id, &policy_name, &document)
                .await
        }
        ResourceKind::IamRole => {
            principals
                .put_role_inline_policy(&resource.id, &policy_name, &document)
                .await
        }
        other => {
            return Err(RemediationError::Unsupported(format!(
                "cannot contain resource kind {other}"
            )))
        }
    };
    attach.map_err(|source| {
        if actions.is_empty() {
            RemediationError::Provider {
                operation: "put_inline_policy",
                source,
            }
        } else {
            // The access key was already deactivated.
            RemediationError::PartialSaga {
                step: "apply_containment_policy",
                completed: actions.clone(),
                orphaned: Vec::new(),
                source,
            }
        }
    })?;
    actions.push(format!(
        "applied containment policy {policy_name} to {}",
        resource
    ));

    info!(principal = %resource.id, reason = %reason, "Principal contained");
    Ok(ProcedureResult::with_actions(
        RemediationOutcome::success(
            format!("contained {resource} ({reason})"),
            Some(json!({
                "contained": true,
                "reason": reason,
                "containment_policy": policy_name,
                "recent_activity_events": recent_activity.len(),
                "recent_activity": recent_activity,
            })),
        ),
        actions,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakePrincipals {
        calls: Mutex<Vec<String>>,
    }

    impl FakePrincipals {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl PrincipalOperations for FakePrincipals {
        async fn disable_access_key(&self, user_name: &str, access_key_id: &str) -> Result<()> {
            self.log(format!("disable_key {user_name} {access_key_id}"));
            Ok(())
        }
        async fn put_user_inline_policy(
            &self,
            user_name: &str,
            policy_name: &str,
            _document: &str,
        ) -> Result<()> {
            self.log(format!("put_user_policy {user_name} {policy_name}"));
            Ok(())
        }
        async fn put_role_inline_policy(
            &self,
            role_name: &str,
            policy_name: &str,
            _document: &str,
        ) -> Result<()> {
            self.log(format!("put_role_policy {role_name} {policy_name}"));
            Ok(())
        }
        async fn user_details(&self, _: &str) -> Result<Value> {
            Ok(json!({}))
        }
        async fn user_access_keys(&self, _: &str) -> Result<Vec<Value>> {
            Ok(vec![])
        }
        async fn user_attached_policies(&self, _: &str) -> Result<Vec<Value>> {
            Ok(vec![])
        }
        async fn role_details(&self, _: &str) -> Result<Value> {
            Ok(json!({}))
        }
        async fn role_attached_policies(&self, _: &str) -> Result<Vec<Value>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeActivity {
        fail: bool,
        lookups: Mutex<Vec<String>>,
    }

    impl FakeActivity {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.lock().unwrap().clone()
        }
    }

    impl ActivityOperations for FakeActivity {
        async fn recent_events(
            &self,
            lookup: ActivityLookup,
            principal_name: &str,
            _window: Duration,
            _max_events: i32,
        ) -> Result<Vec<Value>> {
            self.lookups
                .lock()
                .unwrap()
                .push(format!("{lookup:?} {principal_name}"));
            if self.fail {
                anyhow::bail!("trail unavailable")
            }
            Ok(vec![json!({ "event_name": "GetCallerIdentity" })])
        }
    }

    fn user() -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceKind::IamUser, "mallory")
    }

    #[tokio::test]
    async fn below_threshold_collects_evidence_only() {
        let principals = FakePrincipals::default();
        let trigger = ContainmentTrigger::Finding {
            severity: 6.9,
            access_key_id: Some("AKIA1".into()),
        };
        let result = contain_principal(
            &principals,
            &FakeActivity::default(),
            &ResponderConfig::default(),
            &user(),
            &trigger,
        )
        .await
        .unwrap();

        assert!(principals.calls().is_empty());
        match &result.outcome {
            RemediationOutcome::Success { detail, .. } => {
                let detail = detail.as_ref().unwrap();
                assert_eq!(detail["contained"], false);
                assert_eq!(detail["recent_activity_events"], 1);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn at_threshold_disables_key_and_attaches_policy() {
        let principals = FakePrincipals::default();
        let trigger = ContainmentTrigger::Finding {
            severity: 7.0,
            access_key_id: Some("AKIA1".into()),
        };
        let result = contain_principal(
            &principals,
            &FakeActivity::default(),
            &ResponderConfig::default(),
            &user(),
            &trigger,
        )
        .await
        .unwrap();

        let calls = principals.calls();
        assert_eq!(calls[0], "disable_key mallory AKIA1");
        assert!(calls[1].starts_with("put_user_policy mallory SecurityContainment-"));
        assert_eq!(result.actions.len(), 2);
    }

    #[tokio::test]
    async fn allow_listed_identity_event_always_contains() {
        let principals = FakePrincipals::default();
        let trigger = ContainmentTrigger::IdentityEvent {
            event_name: "CreateAccessKey".into(),
            created_access_key_id: Some("AKIA2".into()),
        };
        contain_principal(
            &principals,
            &FakeActivity::default(),
            &ResponderConfig::default(),
            &user(),
            &trigger,
        )
        .await
        .unwrap();

        let calls = principals.calls();
        assert_eq!(calls[0], "disable_key mallory AKIA2");
        assert!(calls[1].starts_with("put_user_policy"));
    }

    #[tokio::test]
    async fn non_listed_identity_event_is_evidence_only() {
        let principals = FakePrincipals::default();
        let trigger = ContainmentTrigger::IdentityEvent {
            event_name: "TagUser".into(),
            created_access_key_id: None,
        };
        let result = contain_principal(
            &principals,
            &FakeActivity::default(),
            &ResponderConfig::default(),
            &user(),
            &trigger,
        )
        .await
        .unwrap();

        assert!(principals.calls().is_empty());
        assert!(result.actions.is_empty());
    }

    #[tokio::test]
    async fn role_containment_uses_role_policy() {
        let principals = FakePrincipals::default();
        let trigger = ContainmentTrigger::Finding {
            severity: 8.5,
            access_key_id: None,
        };
        contain_principal(
            &principals,
            &FakeActivity::default(),
            &ResponderConfig::default(),
            &ResourceDescriptor::new(ResourceKind::IamRole, "app-role"),
            &trigger,
        )
        .await
        .unwrap();

        let calls = principals.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("put_role_policy app-role"));
    }

    #[tokio::test]
    async fn role_activity_is_looked_up_by_resource_name() {
        let principals = FakePrincipals::default();
        let activity = FakeActivity::default();
        let trigger = ContainmentTrigger::Finding {
            severity: 8.5,
            access_key_id: None,
        };
        contain_principal(
            &principals,
            &activity,
            &ResponderConfig::default(),
            &ResourceDescriptor::new(ResourceKind::IamRole, "app-role"),
            &trigger,
        )
        .await
        .unwrap();

        assert_eq!(activity.lookups(), vec!["ResourceName app-role".to_string()]);
    }

    #[tokio::test]
    async fn user_activity_is_looked_up_by_username() {
        let principals = FakePrincipals::default();
        let activity = FakeActivity::default();
        let trigger = ContainmentTrigger::Finding {
            severity: 8.5,
            access_key_id: None,
        };
        contain_principal(&principals, &activity, &ResponderConfig::default(), &user(), &trigger)
            .await
            .unwrap();

        assert_eq!(activity.lookups(), vec!["Username mallory".to_string()]);
    }

    #[tokio::test]
    async fn activity_lookup_failure_never_blocks_containment() {
        let principals = FakePrincipals::default();
        let trigger = ContainmentTrigger::Finding {
            severity: 9.0,
            access_key_id: None,
        };
        let result = contain_principal(
            &principals,
            &FakeActivity::failing(),
            &ResponderConfig::default(),
            &user(),
            &trigger,
        )
        .await
        .unwrap();

        assert!(!principals.calls().is_empty());
        match &result.outcome {
            RemediationOutcome::Success { detail, .. } => {
                assert_eq!(detail.as_ref().unwrap()["recent_activity_events"], 0);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}
