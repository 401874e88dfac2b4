//! CloudFormation stacks and stack sets

use anyhow::{Context, Result};
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::types::{self, StackStatus};
use tracing::debug;

use super::context::AwsContext;
use super::error::{AwsError, from_sdk};
use crate::provider::{Page, StackInstance, StackSetSummary, StackSummary};

/// Stack statuses worth cleaning up; anything else is in flight or gone
const LIVE_STACK_STATUSES: [StackStatus; 6] = [
    StackStatus::CreateComplete,
    StackStatus::UpdateComplete,
    StackStatus::UpdateRollbackComplete,
    StackStatus::CreateFailed,
    StackStatus::DeleteFailed,
    StackStatus::RollbackComplete,
];

/// Summaries without a name or status are dropped
fn stack_summary(s: &types::StackSummary) -> Option<StackSummary> {
    Some(StackSummary {
        name: s.stack_name()?.to_string(),
        status: s.stack_status()?.as_str().to_string(),
    })
}

fn stack_status_of(stack: &types::Stack) -> Option<String> {
    stack.stack_status().map(|st| st.as_str().to_string())
}

/// CloudFormation client bound to one region
#[derive(Debug, Clone)]
pub struct CloudFormationClient {
    client: Client,
    region: String,
}

impl CloudFormationClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudformation_client(),
            region: ctx.region().to_string(),
        }
    }

    pub async fn list_stacks(&self, next: Option<String>) -> Result<Page<StackSummary>> {
        let mut request = self.client.list_stacks().set_next_token(next);
        for status in LIVE_STACK_STATUSES {
            request = request.stack_status_filter(status);
        }

        let response = request
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to list stacks in {}", self.region))?;

        let items = response
            .stack_summaries()
            .iter()
            .filter_map(stack_summary)
            .collect();

        Ok(Page {
            items,
            next: response.next_token().map(str::to_string),
        })
    }

    pub async fn delete_stack(&self, name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete stack {name}"))?;
        Ok(())
    }

    /// Current status, `None` once the stack is gone
    pub async fn stack_status(&self, name: &str) -> Result<Option<String>> {
        let response = match self.client.describe_stacks().stack_name(name).send().await {
            Ok(response) => response,
            Err(e) => match from_sdk(e) {
                AwsError::NotFound { .. } => {
                    debug!(stack = %name, "Stack no longer exists");
                    return Ok(None);
                }
                other => {
                    return Err(other).with_context(|| format!("Failed to describe stack {name}"));
                }
            },
        };

        Ok(response.stacks().first().and_then(stack_status_of))
    }

    pub async fn list_stack_sets(&self, next: Option<String>) -> Result<Page<StackSetSummary>> {
        let response = self
            .client
            .list_stack_sets()
            .set_next_token(next)
            .send()
            .await
            .map_err(from_sdk)
            .context("Failed to list stack sets")?;

        let items = response
            .summaries()
            .iter()
            .filter_map(|s| {
                Some(StackSetSummary {
                    name: s.stack_set_name()?.to_string(),
                    status: s.status().map(|st| st.as_str().to_string()).unwrap_or_default(),
                })
            })
            .collect();

        Ok(Page {
            items,
            next: response.next_token().map(str::to_string),
        })
    }

    pub async fn list_stack_instances(
        &self,
        stack_set: &str,
        next: Option<String>,
    ) -> Result<Page<StackInstance>> {
        let response = self
            .client
            .list_stack_instances()
            .stack_set_name(stack_set)
            .set_next_token(next)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to list instances of stack set {stack_set}"))?;

        let items = response
            .summaries()
            .iter()
            .filter_map(|i| {
                Some(StackInstance {
                    account: i.account()?.to_string(),
                    region: i.region()?.to_string(),
                    status: i.status().map(|st| st.as_str().to_string()).unwrap_or_default(),
                })
            })
            .collect();

        Ok(Page {
            items,
            next: response.next_token().map(str::to_string),
        })
    }

    /// Retract instances without retaining their stacks
    pub async fn delete_stack_instances(
        &self,
        stack_set: &str,
        accounts: Vec<String>,
        regions: Vec<String>,
    ) -> Result<()> {
        let operation = self
            .client
            .delete_stack_instances()
            .stack_set_name(stack_set)
            .set_accounts(Some(accounts))
            .set_regions(Some(regions))
            .retain_stacks(false)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete instances of stack set {stack_set}"))?;

        debug!(
            stack_set = %stack_set,
            operation_id = ?operation.operation_id(),
            "Stack instance deletion started"
        );
        Ok(())
    }

    pub async fn delete_stack_set(&self, stack_set: &str) -> Result<()> {
        self.client
            .delete_stack_set()
            .stack_set_name(stack_set)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete stack set {stack_set}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_summary_requires_name_and_status() {
        let full = types::StackSummary::builder()
            .stack_name("sra-guardduty")
            .stack_status(StackStatus::DeleteFailed)
            .build();
        assert_eq!(
            stack_summary(&full),
            Some(StackSummary {
                name: "sra-guardduty".to_string(),
                status: "DELETE_FAILED".to_string(),
            })
        );

        let nameless = types::StackSummary::builder()
            .stack_status(StackStatus::CreateComplete)
            .build();
        assert_eq!(stack_summary(&nameless), None);

        let statusless = types::StackSummary::builder().stack_name("sra-x").build();
        assert_eq!(stack_summary(&statusless), None);
    }

    #[test]
    fn test_stack_status_of() {
        let stack = types::Stack::builder()
            .stack_name("sra-guardduty")
            .stack_status(StackStatus::DeleteInProgress)
            .build();
        assert_eq!(stack_status_of(&stack).as_deref(), Some("DELETE_IN_PROGRESS"));

        let unknown = types::Stack::builder().stack_name("sra-guardduty").build();
        assert_eq!(stack_status_of(&unknown), None);
    }
}
