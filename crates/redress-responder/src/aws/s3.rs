//! S3 bucket, policy and object operations
//!
//! Covers the bucket-policy normalization and encryption procedures plus
//! evidence persistence. Reads of optional sub-resources (policy, access
//! block, encryption config) return `None` when the sub-resource is
//! absent instead of erroring.

use crate::aws::context::AwsContext;
use crate::aws::error::classify_anyhow_error;
use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    PublicAccessBlockConfiguration, ServerSideEncryption, ServerSideEncryptionByDefault,
    ServerSideEncryptionConfiguration, ServerSideEncryptionRule,
};
use aws_sdk_s3::Client;
use redress_common::policy::PolicyDocument;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Encryption state of a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEncryption {
    pub algorithm: Option<String>,
    pub kms_key_id: Option<String>,
}

impl ObjectEncryption {
    pub fn is_encrypted(&self) -> bool {
        self.algorithm.is_some()
    }
}

/// S3 client for bucket remediation and evidence storage
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create an S3 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
        }
    }
}

/// Absorb "sub-resource absent" errors into `None`, propagating the rest.
fn absent_as_none<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            if classify_anyhow_error(&e).is_sub_resource_absent() {
                Ok(None)
            } else {
                Err(e)
            }
        }
    }
}

/// Trait for S3 operations, implemented by `S3Client` and by in-memory
/// fakes in tests.
#[allow(async_fn_in_trait)]
pub trait BucketOperations: Send + Sync {
    /// Set all four public-access block flags unconditionally. Idempotent.
    async fn apply_public_access_block(&self, bucket: &str) -> Result<()>;

    /// Read the bucket policy; `None` when the bucket has no policy.
    async fn get_bucket_policy(&self, bucket: &str) -> Result<Option<PolicyDocument>>;

    /// Replace the bucket policy.
    async fn put_bucket_policy(&self, bucket: &str, policy: &PolicyDocument) -> Result<()>;

    /// Delete the bucket policy entirely.
    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()>;

    /// Read the default-encryption configuration; `None` when unset.
    async fn get_bucket_encryption(&self, bucket: &str) -> Result<Option<Value>>;

    /// Enable default encryption: AES256 with bucket keys, or `aws:kms`
    /// when a key id is supplied.
    async fn put_default_encryption(&self, bucket: &str, kms_key_id: Option<&str>) -> Result<()>;

    /// Read an object's encryption state from its head.
    async fn object_encryption(&self, bucket: &str, key: &str) -> Result<ObjectEncryption>;

    /// Rewrite an object in place (copy-onto-self) with KMS encryption.
    async fn reencrypt_object(&self, bucket: &str, key: &str, kms_key_id: Option<&str>)
        -> Result<()>;

    /// Region the bucket lives in.
    async fn bucket_location(&self, bucket: &str) -> Result<String>;

    /// Read the public-access block configuration; `None` when unset.
    async fn get_public_access_block(&self, bucket: &str) -> Result<Option<Value>>;

    /// Read the bucket ACL.
    async fn get_bucket_acl(&self, bucket: &str) -> Result<Value>;

    /// Store a JSON document (evidence record) with server-side
    /// encryption.
    async fn put_json_object(&self, bucket: &str, key: &str, body: String) -> Result<()>;
}

impl BucketOperations for S3Client {
    async fn apply_public_access_block(&self, bucket: &str) -> Result<()> {
        info!(bucket = %bucket, "Applying public access block");

        let config = PublicAccessBlockConfiguration::builder()
            .block_public_acls(true)
            .ignore_public_acls(true)
            .block_public_policy(true)
            .restrict_public_buckets(true)
            .build();

        self.client
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(config)
            .send()
            .await
            .context("Failed to apply public access block")?;

        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<Option<PolicyDocument>> {
        let result = self
            .client
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to get bucket policy");

        let response = match absent_as_none(result)? {
            Some(r) => r,
            None => {
                debug!(bucket = %bucket, "Bucket has no policy");
                return Ok(None);
            }
        };

        let raw = response.policy().context("Empty policy in response")?;
        let document: PolicyDocument =
            serde_json::from_str(raw).context("Failed to parse bucket policy")?;
        Ok(Some(document))
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &PolicyDocument) -> Result<()> {
        info!(
            bucket = %bucket,
            statements = policy.statement.len(),
            "Replacing bucket policy"
        );

        let body = serde_json::to_string(policy).context("Failed to serialize policy")?;
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(body)
            .send()
            .await
            .context("Failed to put bucket policy")?;

        Ok(())
    }

    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()> {
        info!(bucket = %bucket, "Deleting bucket policy");

        self.client
            .delete_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .context("Failed to delete bucket policy")?;

        Ok(())
    }

    async fn get_bucket_encryption(&self, bucket: &str) -> Result<Option<Value>> {
        let result = self
            .client
            .get_bucket_encryption()
            .bucket(bucket)
            .send()
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to get bucket encryption");

        let response = match absent_as_none(result)? {
            Some(r) => r,
            None => return Ok(None),
        };

        let rules: Vec<Value> = response
            .server_side_encryption_configuration()
            .map(|c| c.rules())
            .unwrap_or_default()
            .iter()
            .map(|rule| {
                let default = rule.apply_server_side_encryption_by_default();
                json!({
                    "sse_algorithm": default.map(|d| d.sse_algorithm().as_str()),
                    "kms_master_key_id": default.and_then(|d| d.kms_master_key_id()),
                    "bucket_key_enabled": rule.bucket_key_enabled(),
                })
            })
            .collect();

        Ok(Some(json!({ "rules": rules })))
    }

    async fn put_default_encryption(&self, bucket: &str, kms_key_id: Option<&str>) -> Result<()> {
        info!(
            bucket = %bucket,
            kms_key = kms_key_id.unwrap_or("AES256"),
            "Enabling default encryption"
        );

        let by_default = match kms_key_id {
            Some(key_id) => ServerSideEncryptionByDefault::builder()
                .sse_algorithm(ServerSideEncryption::AwsKms)
                .kms_master_key_id(key_id)
                .build()
                .context("Failed to build encryption default")?,
            None => ServerSideEncryptionByDefault::builder()
                .sse_algorithm(ServerSideEncryption::Aes256)
                .build()
                .context("Failed to build encryption default")?,
        };

        let rule = ServerSideEncryptionRule::builder()
            .apply_server_side_encryption_by_default(by_default)
            .bucket_key_enabled(true)
            .build();

        let config = ServerSideEncryptionConfiguration::builder()
            .rules(rule)
            .build()
            .context("Failed to build encryption configuration")?;

        self.client
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(config)
            .send()
            .await
            .context("Failed to put bucket encryption")?;

        Ok(())
    }

    async fn object_encryption(&self, bucket: &str, key: &str) -> Result<ObjectEncryption> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("Failed to head object")?;

        Ok(ObjectEncryption {
            algorithm: response
                .server_side_encryption()
                .map(|a| a.as_str().to_string()),
            kms_key_id: response.ssekms_key_id().map(|s| s.to_string()),
        })
    }

    async fn reencrypt_object(
        &self,
        bucket: &str,
        key: &str,
        kms_key_id: Option<&str>,
    ) -> Result<()> {
        info!(bucket = %bucket, key = %key, "Rewriting object with KMS encryption");

        let mut request = self
            .client
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(format!("{bucket}/{key}"))
            .server_side_encryption(ServerSideEncryption::AwsKms);

        if let Some(key_id) = kms_key_id {
            request = request.ssekms_key_id(key_id);
        }

        request.send().await.context("Failed to copy object")?;
        Ok(())
    }

    async fn bucket_location(&self, bucket: &str) -> Result<String> {
        let response = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .context("Failed to get bucket location")?;

        // An empty constraint means the original region.
        Ok(response
            .location_constraint()
            .map(|c| c.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("us-east-1")
            .to_string())
    }

    async fn get_public_access_block(&self, bucket: &str) -> Result<Option<Value>> {
        let result = self
            .client
            .get_public_access_block()
            .bucket(bucket)
            .send()
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to get public access block");

        let response = match absent_as_none(result)? {
            Some(r) => r,
            None => return Ok(None),
        };

        Ok(response.public_access_block_configuration().map(|c| {
            json!({
                "block_public_acls": c.block_public_acls(),
                "ignore_public_acls": c.ignore_public_acls(),
                "block_public_policy": c.block_public_policy(),
                "restrict_public_buckets": c.restrict_public_buckets(),
            })
        }))
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<Value> {
        let response = self
            .client
            .get_bucket_acl()
            .bucket(bucket)
            .send()
            .await
            .context("Failed to get bucket ACL")?;

        let grants: Vec<Value> = response
            .grants()
            .iter()
            .map(|g| {
                json!({
                    "grantee_type": g.grantee().map(|gr| gr.r#type().as_str()),
                    "grantee_uri": g.grantee().and_then(|gr| gr.uri()),
                    "permission": g.permission().map(|p| p.as_str()),
                })
            })
            .collect();

        Ok(json!({
            "owner": response.owner().and_then(|o| o.id()),
            "grants": grants,
        }))
    }

    async fn put_json_object(&self, bucket: &str, key: &str, body: String) -> Result<()> {
        debug!(bucket = %bucket, key = %key, size = body.len(), "Storing JSON object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.into_bytes()))
            .content_type("application/json")
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .context("Failed to put object")?;

        Ok(())
    }
}
