//! CloudWatch log group handler

use anyhow::Result;
use sra_cleanup_common::ResourceKind;
use tracing::debug;

use super::{collect_pages, delete_outcome, select_baseline};
use crate::outcome::{Outcome, ResourceRef};
use crate::provider::Provider;

pub async fn discover<P: Provider>(provider: &P, region: &str) -> Result<Vec<ResourceRef>> {
    let names = collect_pages(move |next| provider.list_log_groups(region, next)).await?;
    let names = select_baseline(names);
    debug!(region, count = names.len(), "Listed log groups");
    Ok(names
        .into_iter()
        .map(|name| ResourceRef::new(ResourceKind::LogGroup, name, Some(region)))
        .collect())
}

pub async fn teardown<P: Provider>(provider: &P, group: &ResourceRef) -> Outcome {
    let result = provider
        .delete_log_group(group.region_label(), &group.name)
        .await;
    delete_outcome(group, result)
}
