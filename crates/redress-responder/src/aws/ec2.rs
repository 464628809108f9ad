//! EC2 volume and instance operations
//!
//! Wraps the SDK calls the volume re-encryption saga needs. All reads are
//! side-effect free; every mutating call is logged with the ids involved.

use crate::aws::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_ec2::types::{SnapshotState, Tag, VolumeState, VolumeType};
use aws_sdk_ec2::Client;
use serde::Serialize;
use tracing::{debug, info};

/// A key/value tag on a provider resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

/// Where a volume is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeAttachment {
    pub instance_id: String,
    pub device: String,
}

/// Externally visible configuration of a volume.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeDescription {
    pub volume_id: String,
    pub encrypted: bool,
    pub size_gib: Option<i32>,
    pub volume_type: Option<String>,
    pub availability_zone: Option<String>,
    pub attachment: Option<VolumeAttachment>,
    pub tags: Vec<ResourceTag>,
}

/// Parameters for the encrypted replacement volume. Size, type and zone
/// mirror the original; the key id falls back to the default managed key
/// when not supplied.
#[derive(Debug, Clone)]
pub struct ReplacementVolumeSpec {
    pub snapshot_id: String,
    pub size_gib: Option<i32>,
    pub volume_type: Option<String>,
    pub availability_zone: Option<String>,
    pub kms_key_id: Option<String>,
}

/// EC2 client for volume remediation
pub struct Ec2Client {
    client: Client,
}

impl Ec2Client {
    /// Create an EC2 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }

    async fn describe_volume_inner(&self, volume_id: &str) -> Result<VolumeDescription> {
        let response = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .context("Failed to describe volume")?;

        let volume = response
            .volumes()
            .first()
            .with_context(|| format!("Volume {volume_id} not found"))?;

        let attachment = volume.attachments().first().and_then(|a| {
            match (a.instance_id(), a.device()) {
                (Some(instance_id), Some(device)) => Some(VolumeAttachment {
                    instance_id: instance_id.to_string(),
                    device: device.to_string(),
                }),
                _ => None,
            }
        });

        let tags = volume
            .tags()
            .iter()
            .filter_map(|t| match (t.key(), t.value()) {
                (Some(k), Some(v)) => Some(ResourceTag {
                    key: k.to_string(),
                    value: v.to_string(),
                }),
                _ => None,
            })
            .collect();

        Ok(VolumeDescription {
            volume_id: volume_id.to_string(),
            encrypted: volume.encrypted().unwrap_or(false),
            size_gib: volume.size(),
            volume_type: volume.volume_type().map(|t| t.as_str().to_string()),
            availability_zone: volume.availability_zone().map(|s| s.to_string()),
            attachment,
            tags,
        })
    }
}

/// Trait for EC2 operations, implemented by `Ec2Client` and by in-memory
/// fakes in tests so saga logic is exercised without hitting AWS.
#[allow(async_fn_in_trait)]
pub trait VolumeOperations: Send + Sync {
    /// Read a volume's externally visible configuration.
    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescription>;

    /// Current state name of an instance ("running", "stopped", ...).
    async fn instance_state(&self, instance_id: &str) -> Result<String>;

    /// Start an asynchronous point-in-time copy; returns the snapshot id.
    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String>;

    /// Whether a snapshot has reached its terminal ready state. Errors if
    /// the snapshot entered a failure state.
    async fn snapshot_completed(&self, snapshot_id: &str) -> Result<bool>;

    /// Allocate an encrypted volume from a snapshot; returns the new id.
    async fn create_encrypted_volume(&self, spec: ReplacementVolumeSpec) -> Result<String>;

    /// Whether a volume is in the `available` state.
    async fn volume_available(&self, volume_id: &str) -> Result<bool>;

    /// Begin detaching a volume from its instance.
    async fn detach_volume(&self, volume_id: &str) -> Result<()>;

    /// Attach a volume to an instance at a device path.
    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()>;

    /// Copy descriptive tags onto a volume.
    async fn create_tags(&self, volume_id: &str, tags: &[ResourceTag]) -> Result<()>;
}

impl VolumeOperations for Ec2Client {
    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescription> {
        self.describe_volume_inner(volume_id).await
    }

    async fn instance_state(&self, instance_id: &str) -> Result<String> {
        let response = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .context("Failed to describe instance")?;

        let state = response
            .reservations()
            .first()
            .and_then(|r| r.instances().first())
            .and_then(|i| i.state())
            .and_then(|s| s.name())
            .with_context(|| format!("Instance {instance_id} has no state"))?;

        Ok(state.as_str().to_string())
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String> {
        info!(volume_id = %volume_id, "Creating snapshot");

        let response = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await
            .context("Failed to create snapshot")?;

        let snapshot_id = response
            .snapshot_id()
            .context("No snapshot ID in response")?
            .to_string();

        info!(snapshot_id = %snapshot_id, "Snapshot started");
        Ok(snapshot_id)
    }

    async fn snapshot_completed(&self, snapshot_id: &str) -> Result<bool> {
        let response = self
            .client
            .describe_snapshots()
            .snapshot_ids(snapshot_id)
            .send()
            .await
            .context("Failed to describe snapshot")?;

        let state = response
            .snapshots()
            .first()
            .and_then(|s| s.state())
            .with_context(|| format!("Snapshot {snapshot_id} not found"))?;

        match state {
            SnapshotState::Completed => Ok(true),
            SnapshotState::Error => {
                anyhow::bail!("Snapshot {snapshot_id} entered error state")
            }
            _ => {
                debug!(snapshot_id = %snapshot_id, state = ?state, "Snapshot still copying");
                Ok(false)
            }
        }
    }

    async fn create_encrypted_volume(&self, spec: ReplacementVolumeSpec) -> Result<String> {
        info!(snapshot_id = %spec.snapshot_id, "Creating encrypted replacement volume");

        let mut request = self
            .client
            .create_volume()
            .snapshot_id(&spec.snapshot_id)
            .encrypted(true);

        if let Some(size) = spec.size_gib {
            request = request.size(size);
        }
        if let Some(ref volume_type) = spec.volume_type {
            request = request.volume_type(VolumeType::from(volume_type.as_str()));
        }
        if let Some(ref zone) = spec.availability_zone {
            request = request.availability_zone(zone);
        }
        if let Some(ref key_id) = spec.kms_key_id {
            request = request.kms_key_id(key_id);
        }

        let response = request
            .send()
            .await
            .context("Failed to create encrypted volume")?;

        let volume_id = response
            .volume_id()
            .context("No volume ID in response")?
            .to_string();

        info!(volume_id = %volume_id, "Encrypted replacement volume created");
        Ok(volume_id)
    }

    async fn volume_available(&self, volume_id: &str) -> Result<bool> {
        let response = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .context("Failed to describe volume")?;

        let state = response
            .volumes()
            .first()
            .and_then(|v| v.state())
            .with_context(|| format!("Volume {volume_id} not found"))?;

        match state {
            VolumeState::Available => Ok(true),
            VolumeState::Error => anyhow::bail!("Volume {volume_id} entered error state"),
            _ => {
                debug!(volume_id = %volume_id, state = ?state, "Volume not yet available");
                Ok(false)
            }
        }
    }

    async fn detach_volume(&self, volume_id: &str) -> Result<()> {
        info!(volume_id = %volume_id, "Detaching volume");

        self.client
            .detach_volume()
            .volume_id(volume_id)
            .send()
            .await
            .context("Failed to detach volume")?;

        Ok(())
    }

    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()> {
        info!(
            volume_id = %volume_id,
            instance_id = %instance_id,
            device = %device,
            "Attaching volume"
        );

        self.client
            .attach_volume()
            .volume_id(volume_id)
            .instance_id(instance_id)
            .device(device)
            .send()
            .await
            .context("Failed to attach volume")?;

        Ok(())
    }

    async fn create_tags(&self, volume_id: &str, tags: &[ResourceTag]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        debug!(volume_id = %volume_id, count = tags.len(), "Copying tags");

        let mut request = self.client.create_tags().resources(volume_id);
        for tag in tags {
            request = request.tags(Tag::builder().key(&tag.key).value(&tag.value).build());
        }

        request.send().await.context("Failed to create tags")?;
        Ok(())
    }
}
