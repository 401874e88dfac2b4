//! IAM role handler
//!
//! A role cannot be deleted while managed policies are attached or inline
//! policies remain, so both are removed first. Failures there are recorded
//! as partial-state errors and the role deletion is still attempted.

use anyhow::Result;
use sra_cleanup_common::ResourceKind;
use tracing::{debug, info, warn};

use super::{collect_pages, delete_outcome, select_baseline};
use crate::outcome::{CleanupError, Outcome, ResourceRef};
use crate::provider::Provider;

pub async fn discover<P: Provider>(provider: &P) -> Result<Vec<ResourceRef>> {
    let names = collect_pages(move |next| provider.list_roles(next)).await?;
    let names = select_baseline(names);
    debug!(count = names.len(), "Listed roles");
    Ok(names
        .into_iter()
        .map(|name| ResourceRef::new(ResourceKind::Role, name, None))
        .collect())
}

/// Strip policies, then delete the role.
///
/// Returns one partial-state outcome per failed preparation step, followed
/// by the outcome of the role deletion itself.
pub async fn teardown<P: Provider>(provider: &P, role: &ResourceRef) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    let mut partial = |step: String, e: anyhow::Error| {
        warn!(role = %role.name, step = %step, error = ?e, "Role preparation step failed");
        outcomes.push(Outcome::failed(role, CleanupError::partial(&step, &e)));
    };

    match provider.list_attached_role_policies(&role.name).await {
        Ok(arns) => {
            for arn in arns {
                if let Err(e) = provider.detach_role_policy(&role.name, &arn).await {
                    partial(format!("detach policy {arn}"), e);
                } else {
                    debug!(role = %role.name, policy = %arn, "Detached policy");
                }
            }
        }
        Err(e) => partial("list attached policies".to_string(), e),
    }

    match provider.list_inline_role_policies(&role.name).await {
        Ok(names) => {
            for name in names {
                if let Err(e) = provider.delete_inline_role_policy(&role.name, &name).await {
                    partial(format!("delete inline policy {name}"), e);
                } else {
                    debug!(role = %role.name, policy = %name, "Deleted inline policy");
                }
            }
        }
        Err(e) => partial("list inline policies".to_string(), e),
    }

    info!(role = %role.name, "Deleting role");
    let result = provider.delete_role(&role.name).await;
    outcomes.push(delete_outcome(role, result));
    outcomes
}
