//! Provider and session collaborator traits
//!
//! Handlers talk to the cloud only through [`Provider`]. The real
//! implementation wraps the AWS SDK (see [`crate::aws::AwsProvider`]); tests
//! use mocks or the recording fake from `sra-cleanup-test-utils`.

use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;

use crate::config::AccountTarget;

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, M = String> {
    pub items: Vec<T>,
    /// Marker for the next page, `None` on the last page
    pub next: Option<M>,
}

impl<T, M> Page<T, M> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// A CloudFormation stack as listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    pub name: String,
    pub status: String,
}

/// A CloudFormation stack set as listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSetSummary {
    pub name: String,
    pub status: String,
}

/// A deployment of a stack set into one (account, region) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StackInstance {
    pub account: String,
    pub region: String,
    pub status: String,
}

/// One object version or delete marker in a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: String,
    pub is_delete_marker: bool,
}

/// Continuation marker for object version listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub key_marker: String,
    pub version_id_marker: Option<String>,
}

/// Stack set status that marks a retired stack set
pub const STACK_SET_DELETED: &str = "DELETED";

/// Stack status of a completed deletion
pub const STACK_DELETE_COMPLETE: &str = "DELETE_COMPLETE";

/// Stack status of a failed deletion
pub const STACK_DELETE_FAILED: &str = "DELETE_FAILED";

/// Trait for cloud provider operations that can be mocked in tests.
///
/// Region-scoped calls take the region explicitly. List calls take the marker
/// returned by the previous page; handlers drive the pagination.
///
/// Note: Some parameters use owned types instead of references to work
/// around mockall lifetime limitations.
#[allow(async_fn_in_trait)] // Internal use only, futures are awaited in place
#[cfg_attr(test, mockall::automock)]
pub trait Provider {
    /// List live stacks in a region
    async fn list_stacks(&self, region: &str, next: Option<String>) -> Result<Page<StackSummary>>;

    /// Issue an asynchronous stack deletion
    async fn delete_stack(&self, region: &str, name: &str) -> Result<()>;

    /// Current stack status, `None` once the stack no longer exists
    async fn stack_status(&self, region: &str, name: &str) -> Result<Option<String>>;

    /// List Lambda function names in a region
    async fn list_functions(&self, region: &str, next: Option<String>) -> Result<Page<String>>;

    /// Delete a Lambda function
    async fn delete_function(&self, region: &str, name: &str) -> Result<()>;

    /// List IAM role names
    async fn list_roles(&self, next: Option<String>) -> Result<Page<String>>;

    /// ARNs of managed policies attached to a role
    async fn list_attached_role_policies(&self, role: &str) -> Result<Vec<String>>;

    /// Detach a managed policy from a role
    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()>;

    /// Names of inline policies embedded in a role
    async fn list_inline_role_policies(&self, role: &str) -> Result<Vec<String>>;

    /// Delete an inline policy from a role
    async fn delete_inline_role_policy(&self, role: &str, policy_name: &str) -> Result<()>;

    /// Delete an IAM role
    async fn delete_role(&self, role: &str) -> Result<()>;

    /// List SSM parameter names in a region
    async fn list_parameters(&self, region: &str, next: Option<String>) -> Result<Page<String>>;

    /// Delete up to ten parameters in one request.
    ///
    /// Returns the names the provider reported as invalid (already absent).
    async fn delete_parameters(&self, region: &str, names: Vec<String>) -> Result<Vec<String>>;

    /// List CloudWatch log group names in a region
    async fn list_log_groups(&self, region: &str, next: Option<String>) -> Result<Page<String>>;

    /// Delete a log group
    async fn delete_log_group(&self, region: &str, name: &str) -> Result<()>;

    /// List bucket names in the account
    async fn list_buckets(&self, next: Option<String>) -> Result<Page<String>>;

    /// List object versions and delete markers of a bucket
    async fn list_object_versions(
        &self,
        bucket: &str,
        next: Option<VersionMarker>,
    ) -> Result<Page<ObjectVersion, VersionMarker>>;

    /// Delete one object version or delete marker
    async fn delete_object_version(&self, bucket: &str, key: &str, version_id: &str)
    -> Result<()>;

    /// Delete an (empty) bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// List stack sets administered by this account
    async fn list_stack_sets(&self, next: Option<String>) -> Result<Page<StackSetSummary>>;

    /// List the instances of a stack set
    async fn list_stack_instances(
        &self,
        stack_set: &str,
        next: Option<String>,
    ) -> Result<Page<StackInstance>>;

    /// Retract instances of a stack set without retaining their stacks.
    ///
    /// `accounts` and `regions` are parallel lists.
    async fn delete_stack_instances(
        &self,
        stack_set: &str,
        accounts: Vec<String>,
        regions: Vec<String>,
    ) -> Result<()>;

    /// Delete a stack set that has no instances left
    async fn delete_stack_set(&self, stack_set: &str) -> Result<()>;
}

/// Failure to open a session for an account
#[derive(Debug, Error)]
pub enum SessionError {
    /// No credentials could be resolved for the profile
    #[error("No credentials found for profile '{profile}'")]
    NoCredentials { profile: String },

    /// Credentials resolved but the identity check failed
    #[error("Failed to connect with profile '{profile}': {message}")]
    Client { profile: String, message: String },
}

/// Opens authenticated provider sessions for accounts.
pub trait SessionFactory {
    type Session: Provider;

    /// Open and verify a session for `account`
    fn connect(
        &self,
        account: &AccountTarget,
    ) -> impl Future<Output = std::result::Result<Self::Session, SessionError>>;
}
