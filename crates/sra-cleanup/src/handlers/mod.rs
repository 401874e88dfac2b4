//! Resource handlers
//!
//! One module per resource type. Each exposes `discover`, which lists and
//! filters instances in one scope, and `teardown`, which runs the type's
//! deletion protocol and returns one [`Outcome`] per step that matters to the
//! report. Handlers never fail as a whole during teardown; only discovery
//! returns an error.

pub mod bucket;
pub mod function;
pub mod log_group;
pub mod parameter;
pub mod role;
pub mod stack;
pub mod stack_set;

use anyhow::Result;
use sra_cleanup_common::{ResourceKind, matches_baseline};
use std::collections::HashSet;
use std::future::Future;
use tracing::{error, info};

use crate::aws::error::{is_not_found, suggestion_for};
use crate::config::HandlerSettings;
use crate::outcome::{CleanupError, Outcome, ResourceRef};
use crate::provider::{Page, Provider};

/// Detail recorded for a resource that was gone before its delete call landed
pub const ALREADY_DELETED: &str = "already deleted";

/// Detail recorded for a completed deletion
pub const DELETED: &str = "deleted";

/// List one resource type in one scope.
///
/// `region` is `None` for account-global types.
pub async fn discover<P: Provider>(
    provider: &P,
    kind: ResourceKind,
    region: Option<&str>,
) -> Result<Vec<ResourceRef>> {
    match kind {
        ResourceKind::Stack => stack::discover(provider, scoped(region)?).await,
        ResourceKind::Function => function::discover(provider, scoped(region)?).await,
        ResourceKind::Role => role::discover(provider).await,
        ResourceKind::Parameter => parameter::discover(provider, scoped(region)?).await,
        ResourceKind::LogGroup => log_group::discover(provider, scoped(region)?).await,
        ResourceKind::Bucket => bucket::discover(provider).await,
        ResourceKind::StackSet => stack_set::discover(provider).await,
    }
}

/// Tear down discovered resources of one type.
///
/// All `resources` must be of `kind`. Parameters are batched across the
/// whole slice, every other type is torn down one resource at a time.
pub async fn teardown<P: Provider>(
    provider: &P,
    settings: &HandlerSettings,
    kind: ResourceKind,
    resources: &[ResourceRef],
) -> Vec<Outcome> {
    if kind == ResourceKind::Parameter {
        return parameter::teardown(provider, resources).await;
    }

    let mut outcomes = Vec::new();
    for resource in resources {
        match kind {
            ResourceKind::Stack => {
                outcomes.push(stack::teardown(provider, &settings.stack_wait, resource).await)
            }
            ResourceKind::Function => outcomes.push(function::teardown(provider, resource).await),
            ResourceKind::Role => outcomes.extend(role::teardown(provider, resource).await),
            ResourceKind::LogGroup => {
                outcomes.push(log_group::teardown(provider, resource).await)
            }
            ResourceKind::Bucket => outcomes.extend(bucket::teardown(provider, resource).await),
            ResourceKind::StackSet => outcomes.extend(
                stack_set::teardown(provider, settings.batch_pause, resource).await,
            ),
            ResourceKind::Parameter => outcomes.extend(
                parameter::teardown(provider, std::slice::from_ref(resource)).await,
            ),
        }
    }
    outcomes
}

fn scoped(region: Option<&str>) -> Result<&str> {
    region.ok_or_else(|| anyhow::anyhow!("regional resource type listed without a region"))
}

/// Follow continuation markers until the provider reports the last page.
pub(crate) async fn collect_pages<T, M, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<M>) -> Fut,
    Fut: Future<Output = Result<Page<T, M>>>,
{
    let mut items = Vec::new();
    let mut next = None;
    loop {
        let page = fetch(next.take()).await?;
        items.extend(page.items);
        match page.next {
            Some(marker) => next = Some(marker),
            None => return Ok(items),
        }
    }
}

/// Keep names carrying the baseline token, dropping duplicates but keeping
/// first-seen order.
pub(crate) fn select_baseline<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| matches_baseline(name))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Map a single delete call onto an outcome.
///
/// A not-found error means a stale listing; the resource is already gone.
pub(crate) fn delete_outcome(resource: &ResourceRef, result: Result<()>) -> Outcome {
    match result {
        Ok(()) => {
            info!(
                resource_type = resource.kind.as_str(),
                resource = %resource.name,
                region = resource.region_label(),
                "Deleted"
            );
            Outcome::deleted(resource, DELETED)
        }
        Err(e) if is_not_found(&e) => {
            info!(
                resource_type = resource.kind.as_str(),
                resource = %resource.name,
                region = resource.region_label(),
                "Already deleted"
            );
            Outcome::deleted(resource, ALREADY_DELETED)
        }
        Err(e) => {
            error!(
                resource_type = resource.kind.as_str(),
                resource = %resource.name,
                region = resource.region_label(),
                error = ?e,
                hint = suggestion_for(&e),
                "Failed to delete"
            );
            Outcome::failed(resource, CleanupError::deletion(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::error::AwsError;
    use std::cell::RefCell;

    #[tokio::test]
    async fn test_collect_pages_follows_markers() {
        let calls = RefCell::new(Vec::new());
        let items = collect_pages(|next: Option<String>| {
            calls.borrow_mut().push(next.clone());
            async move {
                Ok(match next.as_deref() {
                    None => Page {
                        items: vec![1, 2],
                        next: Some("a".to_string()),
                    },
                    Some("a") => Page {
                        items: vec![3],
                        next: Some("b".to_string()),
                    },
                    _ => Page::last(vec![4]),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4]);
        assert_eq!(
            calls.into_inner(),
            vec![None, Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_collect_pages_propagates_error() {
        let result: Result<Vec<u8>> = collect_pages(|_: Option<String>| async {
            Err::<Page<u8>, _>(anyhow::anyhow!("AccessDenied"))
        })
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_select_baseline_filters_and_dedups() {
        let names = ["sra-a", "other", "SRA-B", "sra-a", "my-sra-c", "s-r-a"]
            .into_iter()
            .map(String::from);
        assert_eq!(select_baseline(names), vec!["sra-a", "SRA-B", "my-sra-c"]);
    }

    #[test]
    fn test_delete_outcome_classification() {
        let r = ResourceRef::new(ResourceKind::Function, "sra-fn", Some("us-east-1"));

        assert_eq!(
            delete_outcome(&r, Ok(())),
            Outcome::deleted(&r, DELETED)
        );

        let gone = anyhow::Error::new(AwsError::NotFound {
            message: "Function not found".into(),
        });
        assert_eq!(
            delete_outcome(&r, Err(gone)),
            Outcome::deleted(&r, ALREADY_DELETED)
        );

        let denied = anyhow::Error::new(AwsError::AccessDenied {
            message: "not authorized".into(),
        });
        let outcome = delete_outcome(&r, Err(denied));
        assert!(!outcome.is_deleted());
    }

    #[tokio::test]
    async fn test_regional_discover_requires_region() {
        let provider = crate::provider::MockProvider::new();
        let result = discover(&provider, ResourceKind::Stack, None).await;
        assert!(result.is_err());
    }
}
