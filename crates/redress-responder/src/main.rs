use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use redress_responder::{AwsResponder, ResponderConfig};
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redress-responder")]
#[command(about = "Remediate non-compliant and compromised cloud resources")]
struct Cli {
    /// AWS region to operate in
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1", global = true)]
    region: String,

    /// Bucket for evidence records (omit for log-only evidence)
    #[arg(long, env = "EVIDENCE_BUCKET", global = true)]
    evidence_bucket: Option<String>,

    /// SNS topic for outcome notifications
    #[arg(long = "sns-topic", env = "SNS_TOPIC_ARN", global = true)]
    sns_topic_arn: Option<String>,

    /// KMS key for re-encryption (omit for the default managed key)
    #[arg(long = "kms-key", env = "KMS_KEY_ID", global = true)]
    kms_key_id: Option<String>,

    /// Automation document started after a containment
    #[arg(long = "workflow-document", env = "INCIDENT_WORKFLOW_DOCUMENT", global = true)]
    workflow_document: Option<String>,

    /// Finding severity at or above which containment mutates
    #[arg(long, default_value_t = redress_common::defaults::DEFAULT_SEVERITY_THRESHOLD, global = true)]
    severity_threshold: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle a raw inbound event (JSON file, or `-` for stdin)
    Handle {
        #[arg(long)]
        event: PathBuf,
    },
    /// Re-encrypt a volume
    Volume {
        #[arg(long)]
        id: String,
    },
    /// Remediate a bucket
    Bucket {
        #[arg(long)]
        name: String,
        /// Which violation to remediate
        #[arg(long, value_enum, default_value = "exposure")]
        violation: BucketViolation,
    },
    /// Verify and re-encrypt a single object
    Object {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },
}

/// Bucket violations the `bucket` subcommand can target.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum BucketViolation {
    /// Block public access and strip public policy statements
    Exposure,
    /// Enable default server-side encryption
    Encryption,
}

/// Synthesize the inbound event for a subcommand.
fn command_event(command: &Command) -> Result<Value> {
    Ok(match command {
        Command::Handle { event } => read_event(event)?,
        Command::Volume { id } => json!({
            "resourceType": "AWS::EC2::Volume",
            "resourceId": id,
        }),
        Command::Bucket { name, violation } => match violation {
            BucketViolation::Exposure => json!({ "bucket_name": name }),
            BucketViolation::Encryption => json!({
                "bucket_name": name,
                "violation": "unencrypted",
            }),
        },
        Command::Object { bucket, key } => json!({
            "bucket_name": bucket,
            "object_key": key,
        }),
    })
}

fn read_event(path: &PathBuf) -> Result<Value> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read event from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Event is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = ResponderConfig {
        region: cli.region.clone(),
        evidence_bucket: cli.evidence_bucket.clone(),
        sns_topic_arn: cli.sns_topic_arn.clone(),
        kms_key_id: cli.kms_key_id.clone(),
        workflow_document: cli.workflow_document.clone(),
        severity_threshold: cli.severity_threshold,
        ..ResponderConfig::default()
    };

    let event = command_event(&cli.command)?;

    info!(region = %config.region, "Starting responder");
    let responder = AwsResponder::from_config(config).await;
    let response = responder.handle(&event).await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.status_code >= 300 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_subcommand_defaults_to_exposure() {
        let cli = Cli::try_parse_from(["redress-responder", "bucket", "--name", "b"]).unwrap();
        let event = command_event(&cli.command).unwrap();
        assert_eq!(event, json!({ "bucket_name": "b" }));
    }

    #[test]
    fn bucket_subcommand_targets_encryption() {
        let cli = Cli::try_parse_from([
            "redress-responder",
            "bucket",
            "--name",
            "b",
            "--violation",
            "encryption",
        ])
        .unwrap();
        let event = command_event(&cli.command).unwrap();
        assert_eq!(event["violation"], "unencrypted");
        assert!(event.get("object_key").is_none());
    }
}
