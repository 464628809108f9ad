//! Remediation outcome type
//!
//! Every procedure terminates in exactly one of these states. Outcomes are
//! informational results, not errors: an already-compliant resource or an
//! unsupported kind is still a handled invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Terminal result of one remediation procedure.
///
/// Every variant carries a human-readable message; `Success` additionally
/// carries structured detail (e.g., the replacement volume id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemediationOutcome {
    /// The resource was already compliant; no mutation was performed.
    AlreadyCompliant { message: String },
    /// The resource was brought into compliance.
    Success {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<Value>,
    },
    /// The procedure could not complete. Detail of what was and was not
    /// done travels in the error that produced this outcome.
    Failed { message: String },
    /// Remediation requires an operator (e.g., DB storage encryption).
    ManualActionRequired { message: String },
    /// No procedure is registered for the resource kind.
    Unsupported { message: String },
}

impl RemediationOutcome {
    pub fn already_compliant(message: impl Into<String>) -> Self {
        Self::AlreadyCompliant {
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>, detail: Option<Value>) -> Self {
        Self::Success {
            message: message.into(),
            detail,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn manual_action(message: impl Into<String>) -> Self {
        Self::ManualActionRequired {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// The human-readable message carried by this outcome.
    pub fn message(&self) -> &str {
        match self {
            Self::AlreadyCompliant { message }
            | Self::Success { message, .. }
            | Self::Failed { message }
            | Self::ManualActionRequired { message }
            | Self::Unsupported { message } => message,
        }
    }

    /// True when the resource ended up compliant (including the case where
    /// it already was).
    pub fn is_compliant(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::AlreadyCompliant { .. }
        )
    }

    /// Short status label for subjects and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyCompliant { .. } => "ALREADY_COMPLIANT",
            Self::Success { .. } => "SUCCESS",
            Self::Failed { .. } => "FAILED",
            Self::ManualActionRequired { .. } => "MANUAL_ACTION_REQUIRED",
            Self::Unsupported { .. } => "UNSUPPORTED",
        }
    }

    /// HTTP-style status code for the invocation response.
    ///
    /// Handled outcomes (including informational ones) are 200; an
    /// unsupported kind is a caller problem, 400.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AlreadyCompliant { .. }
            | Self::Success { .. }
            | Self::ManualActionRequired { .. } => 200,
            Self::Failed { .. } => 200,
            Self::Unsupported { .. } => 400,
        }
    }
}

impl fmt::Display for RemediationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_codes() {
        assert_eq!(RemediationOutcome::success("ok", None).status_code(), 200);
        assert_eq!(
            RemediationOutcome::already_compliant("ok").status_code(),
            200
        );
        assert_eq!(
            RemediationOutcome::manual_action("runbook").status_code(),
            200
        );
        assert_eq!(RemediationOutcome::unsupported("nope").status_code(), 400);
    }

    #[test]
    fn serializes_with_status_tag() {
        let out = RemediationOutcome::success(
            "replaced",
            Some(json!({"new_volume_id": "vol-1"})),
        );
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["status"], "SUCCESS");
        assert_eq!(v["detail"]["new_volume_id"], "vol-1");
    }

    #[test]
    fn detail_omitted_when_absent() {
        let v = serde_json::to_value(RemediationOutcome::success("ok", None)).unwrap();
        assert!(v.get("detail").is_none());
    }

    #[test]
    fn compliance_check() {
        assert!(RemediationOutcome::success("ok", None).is_compliant());
        assert!(RemediationOutcome::already_compliant("ok").is_compliant());
        assert!(!RemediationOutcome::failed("no").is_compliant());
        assert!(!RemediationOutcome::manual_action("runbook").is_compliant());
    }
}
