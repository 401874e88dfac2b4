//! Lambda functions

use anyhow::{Context, Result};
use aws_sdk_lambda::Client;

use super::context::AwsContext;
use super::error::from_sdk;
use crate::provider::Page;

/// Lambda client bound to one region
#[derive(Debug, Clone)]
pub struct LambdaClient {
    client: Client,
    region: String,
}

impl LambdaClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.lambda_client(),
            region: ctx.region().to_string(),
        }
    }

    pub async fn list_functions(&self, next: Option<String>) -> Result<Page<String>> {
        let response = self
            .client
            .list_functions()
            .set_marker(next)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to list functions in {}", self.region))?;

        Ok(Page {
            items: response
                .functions()
                .iter()
                .filter_map(|f| f.function_name().map(str::to_string))
                .collect(),
            next: response.next_marker().map(str::to_string),
        })
    }

    pub async fn delete_function(&self, name: &str) -> Result<()> {
        self.client
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete function {name}"))?;
        Ok(())
    }
}
