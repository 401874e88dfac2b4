//! SSM parameter handler
//!
//! Parameters are deleted in batches of at most [`MAX_BATCH_SIZE`] names per
//! region. A batch result is attributed to every name in it.

use anyhow::Result;
use sra_cleanup_common::ResourceKind;
use sra_cleanup_common::defaults::MAX_BATCH_SIZE;
use tracing::{debug, error, info};

use super::{ALREADY_DELETED, DELETED, collect_pages, select_baseline};
use crate::outcome::{CleanupError, Outcome, ResourceRef};
use crate::provider::Provider;

pub async fn discover<P: Provider>(provider: &P, region: &str) -> Result<Vec<ResourceRef>> {
    let names = collect_pages(move |next| provider.list_parameters(region, next)).await?;
    let names = select_baseline(names);
    debug!(region, count = names.len(), "Listed parameters");
    Ok(names
        .into_iter()
        .map(|name| ResourceRef::new(ResourceKind::Parameter, name, Some(region)))
        .collect())
}

/// Group parameters by region, keeping first-seen region order.
fn by_region(parameters: &[ResourceRef]) -> Vec<(&str, Vec<&ResourceRef>)> {
    let mut groups: Vec<(&str, Vec<&ResourceRef>)> = Vec::new();
    for parameter in parameters {
        let region = parameter.region_label();
        match groups.iter_mut().find(|(r, _)| *r == region) {
            Some((_, members)) => members.push(parameter),
            None => groups.push((region, vec![parameter])),
        }
    }
    groups
}

pub async fn teardown<P: Provider>(provider: &P, parameters: &[ResourceRef]) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(parameters.len());

    for (region, members) in by_region(parameters) {
        for chunk in members.chunks(MAX_BATCH_SIZE) {
            let names: Vec<String> = chunk.iter().map(|p| p.name.clone()).collect();
            info!(region, count = names.len(), "Deleting parameter batch");

            match provider.delete_parameters(region, names).await {
                Ok(invalid) => {
                    for parameter in chunk {
                        let detail = if invalid.contains(&parameter.name) {
                            ALREADY_DELETED
                        } else {
                            DELETED
                        };
                        outcomes.push(Outcome::deleted(parameter, detail));
                    }
                }
                Err(e) => {
                    error!(region, count = chunk.len(), error = ?e, "Parameter batch failed");
                    let err = CleanupError::deletion(&e);
                    outcomes.extend(chunk.iter().map(|p| Outcome::failed(p, err.clone())));
                }
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorKind;
    use crate::provider::MockProvider;

    fn params(region: &str, count: usize) -> Vec<ResourceRef> {
        (0..count)
            .map(|i| {
                ResourceRef::new(
                    ResourceKind::Parameter,
                    format!("/sra/param-{i:02}"),
                    Some(region),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batches_never_exceed_ten() {
        let mut mock = MockProvider::new();
        mock.expect_delete_parameters()
            .withf(|_, names| names.len() <= MAX_BATCH_SIZE)
            .times(3)
            .returning(|_, _| Ok(vec![]));

        let outcomes = teardown(&mock, &params("us-east-1", 23)).await;
        assert_eq!(outcomes.len(), 23);
        assert!(outcomes.iter().all(Outcome::is_deleted));
    }

    #[tokio::test]
    async fn test_batches_are_per_region() {
        let mut mock = MockProvider::new();
        mock.expect_delete_parameters()
            .withf(|region, names| region == "us-east-1" && names.len() == 2)
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mock.expect_delete_parameters()
            .withf(|region, names| region == "us-west-2" && names.len() == 1)
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let mut all = params("us-east-1", 2);
        all.extend(params("us-west-2", 1));
        let outcomes = teardown(&mock, &all).await;
        assert_eq!(outcomes.len(), 3);
    }

    #[tokio::test]
    async fn test_batch_failure_attributed_to_every_name() {
        let mut mock = MockProvider::new();
        mock.expect_delete_parameters()
            .withf(|_, names| names.len() == 10)
            .returning(|_, _| anyhow::bail!("AccessDeniedException: not authorized"));
        mock.expect_delete_parameters()
            .withf(|_, names| names.len() == 2)
            .returning(|_, _| Ok(vec![]));

        let outcomes = teardown(&mock, &params("us-east-1", 12)).await;
        let failed = outcomes
            .iter()
            .filter(|o| o.error_kind() == Some(ErrorKind::Deletion))
            .count();
        assert_eq!(failed, 10);
        assert_eq!(outcomes.iter().filter(|o| o.is_deleted()).count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_names_are_already_deleted() {
        let mut mock = MockProvider::new();
        mock.expect_delete_parameters()
            .returning(|_, _| Ok(vec!["/sra/param-01".to_string()]));

        let outcomes = teardown(&mock, &params("us-east-1", 2)).await;
        assert_eq!(outcomes[0], Outcome::deleted(&params("us-east-1", 1)[0], DELETED));
        match &outcomes[1].status {
            crate::outcome::OutcomeStatus::Deleted { detail } => {
                assert_eq!(detail, ALREADY_DELETED)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
