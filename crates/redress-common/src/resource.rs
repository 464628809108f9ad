//! Resource and violation kinds
//!
//! Every invocation targets exactly one resource and one violation. The
//! kind determines which remediation procedure the registry selects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of cloud resources the responder knows how to remediate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// EBS volume (re-encryption via snapshot/replace)
    Volume,
    /// S3 bucket (policy normalization or default encryption)
    Bucket,
    /// RDS instance (storage encryption cannot be enabled in place)
    DbInstance,
    /// IAM user (credential containment)
    IamUser,
    /// IAM role (credential containment)
    IamRole,
}

impl ResourceKind {
    /// Map a provider resource-type string (as carried by compliance and
    /// event-stream payloads) to a kind.
    pub fn from_provider_type(s: &str) -> Option<Self> {
        match s {
            "AWS::EC2::Volume" => Some(ResourceKind::Volume),
            "AWS::S3::Bucket" => Some(ResourceKind::Bucket),
            "AWS::RDS::DBInstance" => Some(ResourceKind::DbInstance),
            "AWS::IAM::User" => Some(ResourceKind::IamUser),
            "AWS::IAM::Role" => Some(ResourceKind::IamRole),
            _ => None,
        }
    }

    /// The provider resource-type string for this kind.
    pub fn provider_type(self) -> &'static str {
        match self {
            ResourceKind::Volume => "AWS::EC2::Volume",
            ResourceKind::Bucket => "AWS::S3::Bucket",
            ResourceKind::DbInstance => "AWS::RDS::DBInstance",
            ResourceKind::IamUser => "AWS::IAM::User",
            ResourceKind::IamRole => "AWS::IAM::Role",
        }
    }

    /// Short lowercase name, used in evidence keys and log fields.
    pub fn short_name(self) -> &'static str {
        match self {
            ResourceKind::Volume => "volume",
            ResourceKind::Bucket => "bucket",
            ResourceKind::DbInstance => "db-instance",
            ResourceKind::IamUser => "iam-user",
            ResourceKind::IamRole => "iam-role",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A single resource targeted by one invocation.
///
/// Identity is immutable once created; `id` is the provider-assigned
/// identifier (volume id, bucket name, DB identifier, principal name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.id)
    }
}

/// The violation class that triggered the invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Storage resource without encryption at rest
    Unencrypted,
    /// Object storage reachable by an unrestricted principal
    PubliclyExposed,
    /// Identity credentials showing signs of compromise
    SuspiciousCredentialActivity,
}

impl ViolationKind {
    /// Short lowercase name, used in evidence keys and log fields.
    pub fn short_name(self) -> &'static str {
        match self {
            ViolationKind::Unencrypted => "unencrypted",
            ViolationKind::PubliclyExposed => "publicly-exposed",
            ViolationKind::SuspiciousCredentialActivity => "suspicious-credentials",
        }
    }

    /// Parse a short name back to a kind, as carried by direct
    /// invocations that pick the violation explicitly.
    pub fn from_short_name(s: &str) -> Option<Self> {
        match s {
            "unencrypted" => Some(ViolationKind::Unencrypted),
            "publicly-exposed" => Some(ViolationKind::PubliclyExposed),
            "suspicious-credentials" => Some(ViolationKind::SuspiciousCredentialActivity),
            _ => None,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_type_roundtrip() {
        for kind in [
            ResourceKind::Volume,
            ResourceKind::Bucket,
            ResourceKind::DbInstance,
            ResourceKind::IamUser,
            ResourceKind::IamRole,
        ] {
            assert_eq!(
                ResourceKind::from_provider_type(kind.provider_type()),
                Some(kind)
            );
        }
    }

    #[test]
    fn unknown_provider_type() {
        assert_eq!(ResourceKind::from_provider_type("AWS::Lambda::Function"), None);
        assert_eq!(ResourceKind::from_provider_type(""), None);
    }

    #[test]
    fn violation_short_name_roundtrip() {
        for violation in [
            ViolationKind::Unencrypted,
            ViolationKind::PubliclyExposed,
            ViolationKind::SuspiciousCredentialActivity,
        ] {
            assert_eq!(
                ViolationKind::from_short_name(violation.short_name()),
                Some(violation)
            );
        }
        assert_eq!(ViolationKind::from_short_name("exposed"), None);
    }

    #[test]
    fn descriptor_display() {
        let r = ResourceDescriptor::new(ResourceKind::Volume, "vol-0abc");
        assert_eq!(r.to_string(), "volume 'vol-0abc'");
    }
}
