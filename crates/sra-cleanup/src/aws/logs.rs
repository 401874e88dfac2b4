//! CloudWatch log groups

use anyhow::{Context, Result};
use aws_sdk_cloudwatchlogs::Client;

use super::context::AwsContext;
use super::error::from_sdk;
use crate::provider::Page;

/// CloudWatch Logs client bound to one region
#[derive(Debug, Clone)]
pub struct LogsClient {
    client: Client,
    region: String,
}

impl LogsClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.logs_client(),
            region: ctx.region().to_string(),
        }
    }

    pub async fn list_log_groups(&self, next: Option<String>) -> Result<Page<String>> {
        let response = self
            .client
            .describe_log_groups()
            .set_next_token(next)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to list log groups in {}", self.region))?;

        Ok(Page {
            items: response
                .log_groups()
                .iter()
                .filter_map(|g| g.log_group_name().map(str::to_string))
                .collect(),
            next: response.next_token().map(str::to_string),
        })
    }

    pub async fn delete_log_group(&self, name: &str) -> Result<()> {
        self.client
            .delete_log_group()
            .log_group_name(name)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete log group {name}"))?;
        Ok(())
    }
}
