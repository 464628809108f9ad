//! CloudTrail activity lookups
//!
//! Pulls the recent management events for a principal so containment
//! evidence carries what the credentials were actually used for.

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_cloudtrail::types::{LookupAttribute, LookupAttributeKey};
use aws_sdk_cloudtrail::Client;
use aws_smithy_types::DateTime;
use chrono::Utc;
use redress_common::resource::ResourceKind;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Which lookup attribute identifies a principal in the trail. Users
/// appear under `Username`; role activity is only indexed by the role as
/// a touched `ResourceName`, so a username lookup for a role comes back
/// empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLookup {
    Username,
    ResourceName,
}

impl ActivityLookup {
    /// The lookup attribute for a principal kind.
    pub fn for_principal(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::IamRole => ActivityLookup::ResourceName,
            _ => ActivityLookup::Username,
        }
    }

    fn attribute_key(self) -> LookupAttributeKey {
        match self {
            ActivityLookup::Username => LookupAttributeKey::Username,
            ActivityLookup::ResourceName => LookupAttributeKey::ResourceName,
        }
    }
}

/// CloudTrail client for principal activity history
pub struct CloudTrailClient {
    client: Client,
}

impl CloudTrailClient {
    /// Create a CloudTrail client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudtrail_client(),
        }
    }
}

/// Trait for activity-history operations, implemented by
/// `CloudTrailClient` and by in-memory fakes in tests.
#[allow(async_fn_in_trait)]
pub trait ActivityOperations: Send + Sync {
    /// Management events attributed to `principal_name` within the
    /// trailing `window`, newest first, capped at `max_events`.
    async fn recent_events(
        &self,
        lookup: ActivityLookup,
        principal_name: &str,
        window: Duration,
        max_events: i32,
    ) -> Result<Vec<Value>>;
}

impl ActivityOperations for CloudTrailClient {
    async fn recent_events(
        &self,
        lookup: ActivityLookup,
        principal_name: &str,
        window: Duration,
        max_events: i32,
    ) -> Result<Vec<Value>> {
        let now = Utc::now();
        let start = now - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::hours(24));

        let attribute = LookupAttribute::builder()
            .attribute_key(lookup.attribute_key())
            .attribute_value(principal_name)
            .build()
            .context("Failed to build lookup attribute")?;

        let response = self
            .client
            .lookup_events()
            .lookup_attributes(attribute)
            .start_time(DateTime::from_secs(start.timestamp()))
            .end_time(DateTime::from_secs(now.timestamp()))
            .max_results(max_events)
            .send()
            .await
            .context("Failed to look up CloudTrail events")?;

        let events: Vec<Value> = response
            .events()
            .iter()
            .map(|e| {
                json!({
                    "event_id": e.event_id(),
                    "event_name": e.event_name(),
                    "event_source": e.event_source(),
                    "event_time": e.event_time().map(|t| t.to_string()),
                    "username": e.username(),
                })
            })
            .collect();

        debug!(
            principal = %principal_name,
            lookup = ?lookup,
            count = events.len(),
            "Fetched recent activity"
        );
        Ok(events)
    }
}
