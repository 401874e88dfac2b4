//! Lambda function handler

use anyhow::Result;
use sra_cleanup_common::ResourceKind;
use tracing::{debug, info};

use super::{collect_pages, delete_outcome, select_baseline};
use crate::outcome::{Outcome, ResourceRef};
use crate::provider::Provider;

pub async fn discover<P: Provider>(provider: &P, region: &str) -> Result<Vec<ResourceRef>> {
    let names = collect_pages(move |next| provider.list_functions(region, next)).await?;
    let names = select_baseline(names);
    debug!(region, count = names.len(), "Listed functions");
    Ok(names
        .into_iter()
        .map(|name| ResourceRef::new(ResourceKind::Function, name, Some(region)))
        .collect())
}

pub async fn teardown<P: Provider>(provider: &P, function: &ResourceRef) -> Outcome {
    let region = function.region_label();
    info!(function = %function.name, region, "Deleting function");
    let result = provider.delete_function(region, &function.name).await;
    delete_outcome(function, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::error::AwsError;
    use crate::handlers::{ALREADY_DELETED, DELETED};
    use crate::outcome::ErrorKind;
    use crate::provider::{MockProvider, Page};

    fn function(name: &str) -> ResourceRef {
        ResourceRef::new(ResourceKind::Function, name, Some("us-west-2"))
    }

    #[tokio::test]
    async fn test_discover_is_case_insensitive() {
        let mut mock = MockProvider::new();
        mock.expect_list_functions().returning(|_, _| {
            Ok(Page::last(vec![
                "sra-config-rule".to_string(),
                "billing-report".to_string(),
                "SecurityHub-SRA-Org".to_string(),
            ]))
        });

        let found = discover(&mock, "us-west-2").await.unwrap();
        let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sra-config-rule", "SecurityHub-SRA-Org"]);
    }

    #[tokio::test]
    async fn test_teardown_single_call() {
        let mut mock = MockProvider::new();
        mock.expect_delete_function()
            .withf(|region, name| region == "us-west-2" && name == "sra-config-rule")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = teardown(&mock, &function("sra-config-rule")).await;
        assert_eq!(outcome, Outcome::deleted(&function("sra-config-rule"), DELETED));
    }

    #[tokio::test]
    async fn test_teardown_not_found_is_already_deleted() {
        let mut mock = MockProvider::new();
        mock.expect_delete_function().returning(|_, _| {
            Err(AwsError::NotFound {
                message: "Function not found".into(),
            }
            .into())
        });

        let outcome = teardown(&mock, &function("sra-gone")).await;
        assert_eq!(outcome, Outcome::deleted(&function("sra-gone"), ALREADY_DELETED));
    }

    #[tokio::test]
    async fn test_teardown_failure() {
        let mut mock = MockProvider::new();
        mock.expect_delete_function()
            .returning(|_, _| anyhow::bail!("ResourceConflictException: function is being updated"));

        let outcome = teardown(&mock, &function("sra-busy")).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Deletion));
    }
}
