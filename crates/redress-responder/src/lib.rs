//! Event-driven remediation responder
//!
//! Takes compliance evaluations, event-stream payloads and direct
//! invocations, classifies them to a resource and violation, and runs
//! the matching remediation procedure: volume re-encryption, bucket
//! policy normalization, bucket/object encryption, credential
//! containment, or the manual database path. Every invocation leaves an
//! evidence record behind and optionally notifies an SNS topic.

pub mod aws;
pub mod config;
pub mod error;
pub mod event;
pub mod evidence;
pub mod handler;
pub mod notify;
pub mod saga;
pub mod snapshot;
pub mod wait;
pub mod workflow;

pub use config::ResponderConfig;
pub use error::{OrphanedResource, Precondition, RemediationError};
pub use handler::{AwsResponder, InvocationResponse, Responder};
