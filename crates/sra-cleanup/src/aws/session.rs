//! AWS-backed provider and session factory

use anyhow::{Result, anyhow};
use aws_sdk_sts::config::ProvideCredentials;
use sra_cleanup_common::defaults::SRA_REGIONS;
use std::collections::HashMap;
use tracing::{info, warn};

use super::account::{AccountId, get_current_account_id};
use super::cloudformation::CloudFormationClient;
use super::context::AwsContext;
use super::iam::IamClient;
use super::lambda::LambdaClient;
use super::logs::LogsClient;
use super::s3::S3Client;
use super::ssm::SsmClient;
use crate::config::AccountTarget;
use crate::provider::{
    ObjectVersion, Page, Provider, SessionError, SessionFactory, StackInstance, StackSetSummary,
    StackSummary, VersionMarker,
};

/// Region-scoped clients of one session
#[derive(Debug)]
struct RegionClients {
    cloudformation: CloudFormationClient,
    lambda: LambdaClient,
    ssm: SsmClient,
    logs: LogsClient,
}

impl RegionClients {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            cloudformation: CloudFormationClient::from_context(ctx),
            lambda: LambdaClient::from_context(ctx),
            ssm: SsmClient::from_context(ctx),
            logs: LogsClient::from_context(ctx),
        }
    }
}

/// Authenticated session for one account
#[derive(Debug)]
pub struct AwsProvider {
    account_id: AccountId,
    home_region: String,
    regions: HashMap<String, RegionClients>,
    iam: IamClient,
    s3: S3Client,
}

impl AwsProvider {
    /// Build clients for `regions` from a loaded home-region context
    pub fn new(account_id: AccountId, home: &AwsContext, regions: &[String]) -> Self {
        let mut clients = HashMap::new();
        clients.insert(home.region().to_string(), RegionClients::from_context(home));
        for region in regions {
            clients
                .entry(region.clone())
                .or_insert_with(|| RegionClients::from_context(&home.for_region(region)));
        }

        Self {
            account_id,
            home_region: home.region().to_string(),
            regions: clients,
            iam: IamClient::from_context(home),
            s3: S3Client::from_context(home),
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn regional(&self, region: &str) -> Result<&RegionClients> {
        self.regions
            .get(region)
            .ok_or_else(|| anyhow!("Region {region} is not configured for this session"))
    }

    /// Stack sets are administered from the home region
    fn stack_sets(&self) -> Result<&CloudFormationClient> {
        Ok(&self.regional(&self.home_region)?.cloudformation)
    }
}

impl Provider for AwsProvider {
    async fn list_stacks(&self, region: &str, next: Option<String>) -> Result<Page<StackSummary>> {
        self.regional(region)?.cloudformation.list_stacks(next).await
    }

    async fn delete_stack(&self, region: &str, name: &str) -> Result<()> {
        self.regional(region)?.cloudformation.delete_stack(name).await
    }

    async fn stack_status(&self, region: &str, name: &str) -> Result<Option<String>> {
        self.regional(region)?.cloudformation.stack_status(name).await
    }

    async fn list_functions(&self, region: &str, next: Option<String>) -> Result<Page<String>> {
        self.regional(region)?.lambda.list_functions(next).await
    }

    async fn delete_function(&self, region: &str, name: &str) -> Result<()> {
        self.regional(region)?.lambda.delete_function(name).await
    }

    async fn list_roles(&self, next: Option<String>) -> Result<Page<String>> {
        self.iam.list_roles(next).await
    }

    async fn list_attached_role_policies(&self, role: &str) -> Result<Vec<String>> {
        self.iam.list_attached_role_policies(role).await
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()> {
        self.iam.detach_role_policy(role, policy_arn).await
    }

    async fn list_inline_role_policies(&self, role: &str) -> Result<Vec<String>> {
        self.iam.list_inline_role_policies(role).await
    }

    async fn delete_inline_role_policy(&self, role: &str, policy_name: &str) -> Result<()> {
        self.iam.delete_inline_role_policy(role, policy_name).await
    }

    async fn delete_role(&self, role: &str) -> Result<()> {
        self.iam.delete_role(role).await
    }

    async fn list_parameters(&self, region: &str, next: Option<String>) -> Result<Page<String>> {
        self.regional(region)?.ssm.list_parameters(next).await
    }

    async fn delete_parameters(&self, region: &str, names: Vec<String>) -> Result<Vec<String>> {
        self.regional(region)?.ssm.delete_parameters(names).await
    }

    async fn list_log_groups(&self, region: &str, next: Option<String>) -> Result<Page<String>> {
        self.regional(region)?.logs.list_log_groups(next).await
    }

    async fn delete_log_group(&self, region: &str, name: &str) -> Result<()> {
        self.regional(region)?.logs.delete_log_group(name).await
    }

    async fn list_buckets(&self, next: Option<String>) -> Result<Page<String>> {
        self.s3.list_buckets(next).await
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        next: Option<VersionMarker>,
    ) -> Result<Page<ObjectVersion, VersionMarker>> {
        self.s3.list_object_versions(bucket, next).await
    }

    async fn delete_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> Result<()> {
        self.s3.delete_object_version(bucket, key, version_id).await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.s3.delete_bucket(bucket).await
    }

    async fn list_stack_sets(&self, next: Option<String>) -> Result<Page<StackSetSummary>> {
        self.stack_sets()?.list_stack_sets(next).await
    }

    async fn list_stack_instances(
        &self,
        stack_set: &str,
        next: Option<String>,
    ) -> Result<Page<StackInstance>> {
        self.stack_sets()?.list_stack_instances(stack_set, next).await
    }

    async fn delete_stack_instances(
        &self,
        stack_set: &str,
        accounts: Vec<String>,
        regions: Vec<String>,
    ) -> Result<()> {
        self.stack_sets()?
            .delete_stack_instances(stack_set, accounts, regions)
            .await
    }

    async fn delete_stack_set(&self, stack_set: &str) -> Result<()> {
        self.stack_sets()?.delete_stack_set(stack_set).await
    }
}

/// Opens sessions from named credential profiles
#[derive(Debug, Clone)]
pub struct AwsSessionFactory {
    regions: Vec<String>,
}

impl AwsSessionFactory {
    /// Sessions get clients for every region in `regions`; the first one
    /// is the home region.
    pub fn new(regions: Vec<String>) -> Self {
        Self { regions }
    }

    fn home_region(&self) -> &str {
        self.regions
            .first()
            .map(String::as_str)
            .unwrap_or(SRA_REGIONS[0])
    }
}

impl SessionFactory for AwsSessionFactory {
    type Session = AwsProvider;

    async fn connect(&self, account: &AccountTarget) -> Result<AwsProvider, SessionError> {
        let profile = account.auth_profile.as_str();
        let ctx = AwsContext::with_profile(profile, self.home_region()).await;

        let no_credentials = || SessionError::NoCredentials {
            profile: profile.to_string(),
        };
        let credentials = ctx
            .sdk_config()
            .credentials_provider()
            .ok_or_else(no_credentials)?;
        if let Err(e) = credentials.provide_credentials().await {
            warn!(profile, error = %e, "Could not resolve credentials");
            return Err(no_credentials());
        }

        let account_id = get_current_account_id(&ctx)
            .await
            .map_err(|e| SessionError::Client {
                profile: profile.to_string(),
                message: format!("{e:#}"),
            })?;

        info!(
            account = %account.display_name,
            account_id = %account_id,
            profile,
            "Connected"
        );
        Ok(AwsProvider::new(account_id, &ctx, &self.regions))
    }
}
