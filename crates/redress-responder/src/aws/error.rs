//! AWS error classification
//!
//! Typed categories for AWS SDK errors using the error code rather than
//! string matching on the Debug format. The responder never retries
//! internally; classification exists so sagas can distinguish "resource or
//! sub-resource absent" (often a valid state, e.g. a bucket with no
//! policy) from real failures.

use thiserror::Error;

/// AWS error categories relevant to remediation
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found
    #[error("resource not found: {message}")]
    NotFound { message: String },

    /// An optional sub-resource is absent (bucket policy, encryption
    /// config, public access block). A valid state, not a failure.
    #[error("sub-resource absent: {message}")]
    SubResourceAbsent { message: String },

    /// Rate limit exceeded. Surfaced to the caller; the event source's
    /// own retry policy governs.
    #[error("rate limit exceeded")]
    Throttled,

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_sub_resource_absent(&self) -> bool {
        matches!(self, AwsError::SubResourceAbsent { .. })
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidVolume.NotFound",
    "InvalidInstanceID.NotFound",
    "InvalidSnapshot.NotFound",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchEntity",
    "DBInstanceNotFound",
    "DBInstanceNotFoundFault",
];

/// Codes for optional sub-resources that legitimately may not exist
const SUB_RESOURCE_ABSENT_CODES: &[&str] = &[
    "NoSuchBucketPolicy",
    "NoSuchPublicAccessBlockConfiguration",
    "ServerSideEncryptionConfigurationNotFoundError",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if SUB_RESOURCE_ABSENT_CODES.contains(&c) => {
            AwsError::SubResourceAbsent { message }
        }
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// All known codes, for extraction from debug-format error chains
const ALL_KNOWN_CODES: &[&str] = &[
    "InvalidVolume.NotFound",
    "InvalidInstanceID.NotFound",
    "InvalidSnapshot.NotFound",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchEntity",
    "DBInstanceNotFound",
    "DBInstanceNotFoundFault",
    "NoSuchBucketPolicy",
    "NoSuchPublicAccessBlockConfiguration",
    "ServerSideEncryptionConfigurationNotFoundError",
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
];

/// Classify an error from an `anyhow::Error` chain.
///
/// AWS SDK service errors render their code in the Debug representation;
/// extracting it there covers every operation type without enumerating
/// each SDK error struct.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    let debug_str = format!("{error:?}");
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&error.to_string()));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    for code in ALL_KNOWN_CODES {
        if debug_str.contains(code) {
            return Some((*code).to_string());
        }
    }

    // Fall back to a `code: Some("...")` field if any
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}
