//! AWS service clients and error classification
//!
//! One thin wrapper per service, each exposing the handful of calls the
//! remediation procedures need behind a trait so tests can substitute
//! in-memory fakes.

pub mod cloudtrail;
pub mod context;
pub mod ec2;
pub mod error;
pub mod iam;
pub mod rds;
pub mod s3;
pub mod sns;
pub mod ssm;

pub use cloudtrail::{ActivityLookup, ActivityOperations, CloudTrailClient};
pub use context::AwsContext;
pub use ec2::{Ec2Client, VolumeOperations};
pub use error::{classify_anyhow_error, classify_aws_error, AwsError};
pub use iam::{IamClient, PrincipalOperations};
pub use rds::{DatabaseOperations, RdsClient};
pub use s3::{BucketOperations, S3Client};
pub use sns::SnsClient;
pub use ssm::SsmClient;
