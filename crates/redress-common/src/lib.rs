//! redress-common - Shared types for the remediation responder
//!
//! This crate provides the types shared across the responder, without any
//! AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`resource`]: Resource and violation kinds
//! - [`outcome`]: Remediation outcome type
//! - [`policy`]: Access policy model and public-statement analysis
//! - [`evidence`]: Immutable per-invocation audit record
//! - [`defaults`]: Default thresholds, allow-lists and wait tunings

pub mod defaults;
pub mod evidence;
pub mod outcome;
pub mod policy;
pub mod resource;

// Re-export commonly used types
pub use evidence::EvidenceRecord;
pub use outcome::RemediationOutcome;
pub use policy::{PolicyDocument, PolicyStatement};
pub use resource::{ResourceDescriptor, ResourceKind, ViolationKind};
