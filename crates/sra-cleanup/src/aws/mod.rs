//! AWS SDK wrappers backing the [`Provider`](crate::provider::Provider) trait
//!
//! One thin client per service, built from a shared [`AwsContext`]:
//! - CloudFormation: stacks and stack sets
//! - Lambda, SSM, CloudWatch Logs: regional resources
//! - IAM, S3: account-global resources
//! - STS: account identity

pub mod account;
pub mod cloudformation;
pub mod context;
pub mod error;
pub mod iam;
pub mod lambda;
pub mod logs;
pub mod s3;
pub mod session;
pub mod ssm;

pub use account::{AccountId, get_current_account_id};
pub use context::AwsContext;
pub use error::{AwsError, classify_anyhow_error, classify_aws_error, suggestion_for};
pub use session::{AwsProvider, AwsSessionFactory};
