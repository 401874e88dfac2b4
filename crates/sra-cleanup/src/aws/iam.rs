//! IAM roles and their policies

use anyhow::{Context, Result};
use aws_sdk_iam::Client;
use tracing::debug;

use super::context::AwsContext;
use super::error::from_sdk;
use crate::provider::Page;

/// IAM client (account-global)
#[derive(Debug, Clone)]
pub struct IamClient {
    client: Client,
}

impl IamClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }

    pub async fn list_roles(&self, next: Option<String>) -> Result<Page<String>> {
        let response = self
            .client
            .list_roles()
            .set_marker(next)
            .send()
            .await
            .map_err(from_sdk)
            .context("Failed to list IAM roles")?;

        let next = if response.is_truncated() {
            response.marker().map(str::to_string)
        } else {
            None
        };

        Ok(Page {
            items: response
                .roles()
                .iter()
                .map(|r| r.role_name().to_string())
                .collect(),
            next,
        })
    }

    /// ARNs of all managed policies attached to a role
    pub async fn list_attached_role_policies(&self, role: &str) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_attached_role_policies()
                .role_name(role)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(from_sdk)
                .with_context(|| format!("Failed to list attached policies of role {role}"))?;

            arns.extend(
                response
                    .attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );

            if response.is_truncated() {
                marker = response.marker().map(str::to_string);
            }
            if marker.is_none() {
                break;
            }
        }

        debug!(role = %role, count = arns.len(), "Listed attached policies");
        Ok(arns)
    }

    pub async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()> {
        self.client
            .detach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to detach {policy_arn} from role {role}"))?;
        Ok(())
    }

    /// Names of all inline policies of a role
    pub async fn list_inline_role_policies(&self, role: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_role_policies()
                .role_name(role)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(from_sdk)
                .with_context(|| format!("Failed to list inline policies of role {role}"))?;

            names.extend(response.policy_names().iter().cloned());

            if response.is_truncated() {
                marker = response.marker().map(str::to_string);
            }
            if marker.is_none() {
                break;
            }
        }

        Ok(names)
    }

    pub async fn delete_inline_role_policy(&self, role: &str, policy_name: &str) -> Result<()> {
        self.client
            .delete_role_policy()
            .role_name(role)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete inline policy {policy_name} of role {role}"))?;
        Ok(())
    }

    pub async fn delete_role(&self, role: &str) -> Result<()> {
        self.client
            .delete_role()
            .role_name(role)
            .send()
            .await
            .map_err(from_sdk)
            .with_context(|| format!("Failed to delete role {role}"))?;
        Ok(())
    }
}
