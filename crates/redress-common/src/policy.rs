//! Access policy model and public-statement analysis
//!
//! A bucket policy is an ordered sequence of statements; order is load
//! bearing (later statements can be narrower), so filtering must never
//! reorder survivors. Statement fields beyond the ones we inspect are kept
//! as raw JSON and round-trip losslessly.
//!
//! The public check is conservative: any wildcard principal on an `Allow`
//! statement counts as public, whether or not a `Condition` block is
//! present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Principal tag that exempts a session from a containment policy.
pub const CONTAINMENT_EXCEPTION_TAG: &str = "SecurityException";

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// One access-policy statement.
///
/// Only `Effect` and `Principal` are interpreted; everything else is
/// carried opaquely so a rewritten policy preserves whatever the original
/// statements said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
    #[serde(rename = "Action", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PolicyStatement {
    /// Whether this statement grants access to an unrestricted principal.
    ///
    /// True iff the effect is `Allow` and the principal is `"*"` or
    /// `{"AWS": "*"}`. Conditions do not negate exposure.
    pub fn is_public(&self) -> bool {
        if self.effect != Effect::Allow {
            return false;
        }
        match &self.principal {
            Some(Value::String(s)) => s == "*",
            Some(Value::Object(map)) => map.get("AWS") == Some(&Value::String("*".into())),
            _ => false,
        }
    }
}

/// An ordered access-policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version", default = "default_policy_version")]
    pub version: String,
    #[serde(rename = "Statement", default)]
    pub statement: Vec<PolicyStatement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_policy_version() -> String {
    "2012-10-17".to_string()
}

impl PolicyDocument {
    /// True iff any contained statement is public-granting.
    pub fn is_public(&self) -> bool {
        self.statement.iter().any(PolicyStatement::is_public)
    }

    /// Remove public-granting statements, preserving the relative order of
    /// survivors. Returns the surviving statements and how many were
    /// removed.
    pub fn filter_public_statements(&self) -> (Vec<PolicyStatement>, usize) {
        let mut remaining = Vec::with_capacity(self.statement.len());
        let mut removed = 0usize;
        for stmt in &self.statement {
            if stmt.is_public() {
                removed += 1;
            } else {
                remaining.push(stmt.clone());
            }
        }
        (remaining, removed)
    }

    /// Rebuild this document with a different statement list, keeping
    /// version and any opaque top-level fields.
    pub fn with_statements(&self, statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: self.version.clone(),
            statement,
            extra: self.extra.clone(),
        }
    }
}

/// The fixed containment policy: deny everything unless the session
/// carries the exception principal tag.
pub fn containment_policy_document() -> PolicyDocument {
    let mut tag_condition = Map::new();
    tag_condition.insert(
        format!("aws:PrincipalTag/{CONTAINMENT_EXCEPTION_TAG}"),
        json!("true"),
    );
    let mut condition = Map::new();
    condition.insert("StringNotEquals".to_string(), Value::Object(tag_condition));

    PolicyDocument {
        version: default_policy_version(),
        statement: vec![PolicyStatement {
            sid: None,
            effect: Effect::Deny,
            principal: None,
            action: Some(json!("*")),
            resource: Some(json!("*")),
            condition: Some(Value::Object(condition)),
            extra: Map::new(),
        }],
        extra: Map::new(),
    }
}

/// Generated name for an attached containment policy. The timestamp makes
/// repeated containments of the same principal distinguishable in audit.
pub fn containment_policy_name(now: DateTime<Utc>) -> String {
    format!("SecurityContainment-{}", now.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(effect: Effect, principal: Value) -> PolicyStatement {
        PolicyStatement {
            sid: None,
            effect,
            principal: Some(principal),
            action: Some(json!("s3:GetObject")),
            resource: Some(json!("arn:aws:s3:::b/*")),
            condition: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn is_public_truth_table() {
        assert!(stmt(Effect::Allow, json!("*")).is_public());
        assert!(stmt(Effect::Allow, json!({"AWS": "*"})).is_public());
        assert!(!stmt(Effect::Deny, json!("*")).is_public());
        assert!(!stmt(Effect::Allow, json!({"AWS": "arn:aws:iam::123456789012:root"})).is_public());
    }

    #[test]
    fn condition_does_not_negate_exposure() {
        let mut s = stmt(Effect::Allow, json!("*"));
        s.condition = Some(json!({"IpAddress": {"aws:SourceIp": "10.0.0.0/8"}}));
        assert!(s.is_public());
    }

    #[test]
    fn missing_principal_is_not_public() {
        let mut s = stmt(Effect::Allow, json!("*"));
        s.principal = None;
        assert!(!s.is_public());
    }

    #[test]
    fn filter_preserves_survivor_order() {
        let doc = PolicyDocument {
            version: default_policy_version(),
            statement: vec![
                {
                    let mut s = stmt(Effect::Allow, json!({"AWS": "arn:aws:iam::1:root"}));
                    s.sid = Some("S1".into());
                    s
                },
                {
                    let mut s = stmt(Effect::Allow, json!("*"));
                    s.sid = Some("S2".into());
                    s
                },
                {
                    let mut s = stmt(Effect::Deny, json!("*"));
                    s.sid = Some("S3".into());
                    s
                },
            ],
            extra: Map::new(),
        };

        let (remaining, removed) = doc.filter_public_statements();
        assert_eq!(removed, 1);
        let sids: Vec<_> = remaining.iter().map(|s| s.sid.as_deref().unwrap()).collect();
        assert_eq!(sids, vec!["S1", "S3"]);
    }

    #[test]
    fn all_public_filters_to_empty() {
        let doc = PolicyDocument {
            version: default_policy_version(),
            statement: vec![stmt(Effect::Allow, json!("*")), stmt(Effect::Allow, json!({"AWS": "*"}))],
            extra: Map::new(),
        };
        let (remaining, removed) = doc.filter_public_statements();
        assert!(remaining.is_empty());
        assert_eq!(removed, 2);
        assert!(doc.is_public());
    }

    #[test]
    fn unknown_fields_roundtrip() {
        let raw = json!({
            "Version": "2012-10-17",
            "Id": "custom-id",
            "Statement": [{
                "Sid": "keep",
                "Effect": "Allow",
                "Principal": {"AWS": "arn:aws:iam::1:root"},
                "Action": "s3:GetObject",
                "Resource": "arn:aws:s3:::b/*",
                "NotAction": "s3:DeleteObject"
            }]
        });
        let doc: PolicyDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn containment_document_shape() {
        let doc = containment_policy_document();
        assert_eq!(doc.statement.len(), 1);
        let s = &doc.statement[0];
        assert_eq!(s.effect, Effect::Deny);
        assert_eq!(s.action, Some(json!("*")));
        assert_eq!(s.resource, Some(json!("*")));
        let cond = s.condition.as_ref().unwrap();
        assert_eq!(
            cond["StringNotEquals"]["aws:PrincipalTag/SecurityException"],
            "true"
        );
        assert!(!s.is_public());
    }

    #[test]
    fn containment_name_is_timestamped() {
        let t = DateTime::parse_from_rfc3339("2026-08-26T12:34:56Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(containment_policy_name(t), "SecurityContainment-20260826123456");
    }
}
