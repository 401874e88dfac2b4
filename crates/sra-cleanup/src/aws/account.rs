//! AWS account identity

use anyhow::{Context, Result};
use tracing::info;

use super::context::AwsContext;
use super::error::from_sdk;

/// Strongly-typed AWS account ID (12-digit string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    /// Create an AccountId for testing purposes
    #[cfg(test)]
    pub fn new(s: String) -> Self {
        AccountId(s)
    }
}

/// Resolve the account behind a context's credentials via STS GetCallerIdentity.
///
/// Needs no permissions beyond valid credentials, so it doubles as the
/// credential check when a session is opened.
pub async fn get_current_account_id(ctx: &AwsContext) -> Result<AccountId> {
    let identity = ctx
        .sts_client()
        .get_caller_identity()
        .send()
        .await
        .map_err(from_sdk)
        .context("Failed to get AWS caller identity")?;

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    info!(account_id = %account, profile = ?ctx.profile(), "AWS account validated");

    Ok(AccountId(account.to_string()))
}
