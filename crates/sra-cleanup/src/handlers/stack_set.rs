//! CloudFormation stack set handler (management account only)
//!
//! A stack set can only be deleted once it owns no instances. Instances are
//! retracted in chunks of at most [`MAX_BATCH_SIZE`] with a pause after each
//! accepted chunk, then the stack set itself is deleted.

use anyhow::Result;
use sra_cleanup_common::ResourceKind;
use sra_cleanup_common::defaults::MAX_BATCH_SIZE;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{collect_pages, delete_outcome, select_baseline};
use crate::outcome::{CleanupError, Outcome, ResourceRef};
use crate::provider::{Provider, STACK_SET_DELETED, StackInstance};

/// List live stack sets carrying the baseline token.
///
/// Stack sets already in `DELETED` status are skipped regardless of name.
pub async fn discover<P: Provider>(provider: &P) -> Result<Vec<ResourceRef>> {
    let sets = collect_pages(move |next| provider.list_stack_sets(next)).await?;
    let live = sets
        .into_iter()
        .filter(|s| s.status != STACK_SET_DELETED)
        .map(|s| s.name);
    let names = select_baseline(live);
    debug!(count = names.len(), "Listed stack sets");
    Ok(names
        .into_iter()
        .map(|name| ResourceRef::new(ResourceKind::StackSet, name, None))
        .collect())
}

/// Distinct (account, region) pairs, in listing order
fn distinct_targets(instances: Vec<StackInstance>) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    instances
        .into_iter()
        .map(|i| (i.account, i.region))
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}

/// Retract every instance, then delete the stack set.
///
/// Failed retraction chunks and a failed instance listing are recorded as
/// partial-state errors ahead of the stack set's own outcome.
pub async fn teardown<P: Provider>(
    provider: &P,
    batch_pause: Duration,
    stack_set: &ResourceRef,
) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    let name = stack_set.name.as_str();

    match collect_pages(move |next| provider.list_stack_instances(name, next)).await {
        Ok(instances) => {
            let targets = distinct_targets(instances);
            info!(stack_set = %name, instances = targets.len(), "Retracting stack set instances");

            for chunk in targets.chunks(MAX_BATCH_SIZE) {
                let (accounts, regions): (Vec<String>, Vec<String>) = chunk.iter().cloned().unzip();
                match provider
                    .delete_stack_instances(name, accounts, regions)
                    .await
                {
                    Ok(()) => {
                        debug!(stack_set = %name, count = chunk.len(), "Retracted instance chunk");
                        tokio::time::sleep(batch_pause).await;
                    }
                    Err(e) => {
                        warn!(stack_set = %name, count = chunk.len(), error = ?e, "Failed to retract instances");
                        let step = format!("retract {} instances", chunk.len());
                        outcomes.push(Outcome::failed(stack_set, CleanupError::partial(&step, &e)));
                    }
                }
            }
        }
        Err(e) => {
            warn!(stack_set = %name, error = ?e, "Failed to list stack set instances");
            outcomes.push(Outcome::failed(
                stack_set,
                CleanupError::partial("list stack instances", &e),
            ));
        }
    }

    info!(stack_set = %name, "Deleting stack set");
    let result = provider.delete_stack_set(name).await;
    outcomes.push(delete_outcome(stack_set, result));
    outcomes
}
