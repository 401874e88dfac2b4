//! SSM parameters

use anyhow::{Context, Result};
use aws_sdk_ssm::Client;

use super::context::AwsContext;
use super::error::from_sdk;
use crate::provider::Page;

/// SSM client bound to one region
#[derive(Debug, Clone)]
pub struct SsmClient {
    client: Client,
    region: String,
}

impl SsmClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ssm_client(),
            region: ctx.region().to_string(),
        }
    }

    pub async fn list_parameters(&self, next: Option<String>) -> Result<Page<String>> {
        let response = self
            .client
            .describe_parameters()
            .set_next_token(next)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to list parameters in {}", self.region))?;

        Ok(Page {
            items: response
                .parameters()
                .iter()
                .filter_map(|p| p.name().map(str::to_string))
                .collect(),
            next: response.next_token().map(str::to_string),
        })
    }

    /// Delete a batch of parameters, returning the names reported as invalid
    pub async fn delete_parameters(&self, names: Vec<String>) -> Result<Vec<String>> {
        let count = names.len();
        let response = self
            .client
            .delete_parameters()
            .set_names(Some(names))
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete {count} parameters in {}", self.region))?;

        Ok(response.invalid_parameters().to_vec())
    }
}
