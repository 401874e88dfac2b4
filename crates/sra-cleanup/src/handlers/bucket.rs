//! S3 bucket handler
//!
//! Buckets are emptied version by version (including delete markers) before
//! the bucket itself is deleted. Emptying failures are recorded as
//! partial-state errors; the bucket delete is attempted exactly once either
//! way and its error is reported as the provider returned it.

use anyhow::Result;
use sra_cleanup_common::ResourceKind;
use tracing::{debug, info, warn};

use super::{collect_pages, delete_outcome, select_baseline};
use crate::outcome::{CleanupError, Outcome, OutcomeStatus, ResourceRef};
use crate::provider::Provider;

pub async fn discover<P: Provider>(provider: &P) -> Result<Vec<ResourceRef>> {
    let buckets = collect_pages(move |next| provider.list_buckets(next)).await?;
    let names = select_baseline(buckets);
    debug!(count = names.len(), "Listed buckets");
    Ok(names
        .into_iter()
        .map(|name| ResourceRef::new(ResourceKind::Bucket, name, None))
        .collect())
}

/// Result of emptying one bucket
#[derive(Debug, Default)]
struct Emptied {
    removed: usize,
    failures: Vec<Outcome>,
}

async fn empty_bucket<P: Provider>(provider: &P, bucket: &ResourceRef) -> Emptied {
    let mut emptied = Emptied::default();
    let mut next = None;

    loop {
        let page = match provider.list_object_versions(&bucket.name, next.take()).await {
            Ok(page) => page,
            Err(e) => {
                warn!(bucket = %bucket.name, error = ?e, "Failed to list object versions");
                emptied.failures.push(Outcome::failed(
                    bucket,
                    CleanupError::partial("list object versions", &e),
                ));
                return emptied;
            }
        };

        for version in page.items {
            match provider
                .delete_object_version(&bucket.name, &version.key, &version.version_id)
                .await
            {
                Ok(()) => {
                    emptied.removed += 1;
                    debug!(
                        bucket = %bucket.name,
                        key = %version.key,
                        version_id = %version.version_id,
                        delete_marker = version.is_delete_marker,
                        "Removed object version"
                    );
                }
                Err(e) => {
                    warn!(bucket = %bucket.name, key = %version.key, error = ?e, "Failed to remove object version");
                    let step = format!("delete {} (version {})", version.key, version.version_id);
                    emptied
                        .failures
                        .push(Outcome::failed(bucket, CleanupError::partial(&step, &e)));
                }
            }
        }

        match page.next {
            Some(marker) => next = Some(marker),
            None => return emptied,
        }
    }
}

/// Empty the bucket, then delete it.
///
/// Returns the emptying failures followed by the outcome of the bucket
/// deletion.
pub async fn teardown<P: Provider>(provider: &P, bucket: &ResourceRef) -> Vec<Outcome> {
    info!(bucket = %bucket.name, "Emptying bucket");
    let Emptied { removed, mut failures } = empty_bucket(provider, bucket).await;
    info!(bucket = %bucket.name, removed, failed = failures.len(), "Emptied bucket");

    let result = provider.delete_bucket(&bucket.name).await;
    let mut outcome = delete_outcome(bucket, result);
    if let OutcomeStatus::Deleted { detail } = &mut outcome.status {
        *detail = format!("{detail} ({removed} object versions removed)");
    }
    failures.push(outcome);
    failures
}
