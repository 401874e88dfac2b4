//! Per-account orchestration

use sra_cleanup_common::defaults::LISTING_RESOURCE_NAME;
use sra_cleanup_common::{OrderError, ResourceKind, Scope, teardown_order};
use tracing::{error, info, warn};

use crate::aws::suggestion_for;
use crate::config::{AccountKey, AccountTarget, CleanupConfig};
use crate::handlers;
use crate::outcome::{CleanupError, ResourceRef};
use crate::provider::{Provider, SessionFactory};
use crate::report::CleanupReport;

/// Synthetic resource name of a connection failure
pub const SESSION_RESOURCE_NAME: &str = "session";

/// Resource kinds to process for an account, in teardown order.
///
/// Master-only kinds are dropped for every other account.
pub fn account_plan(key: AccountKey) -> Result<Vec<ResourceKind>, OrderError> {
    let kinds: Vec<ResourceKind> = ResourceKind::ALL
        .into_iter()
        .filter(|k| key == AccountKey::Master || !k.is_master_only())
        .collect();
    teardown_order(&kinds)
}

/// Open a session for `account` and process it.
///
/// Returns `false` only when no session could be opened; in that case one
/// connection error is recorded and no handler runs. Every other failure is
/// recorded in `report` and processing continues.
pub async fn run_account<F: SessionFactory>(
    factory: &F,
    account: &AccountTarget,
    plan: &[ResourceKind],
    config: &CleanupConfig,
    report: &mut CleanupReport,
) -> bool {
    info!(
        account = %account.display_name,
        profile = %account.auth_profile,
        apply = config.mode.is_apply(),
        "Processing account"
    );

    let session = match factory.connect(account).await {
        Ok(session) => session,
        Err(e) => {
            error!(account = %account.display_name, error = %e, "Could not open session");
            report.add_error(
                account,
                None,
                SESSION_RESOURCE_NAME,
                None,
                &CleanupError::Connection(e.to_string()),
            );
            return false;
        }
    };

    process_account(&session, account, plan, config, report).await;
    info!(account = %account.display_name, "Account processed");
    true
}

/// Run every handler in `plan` against one session.
///
/// Each kind is discovered in all of its scopes before any of it is torn
/// down. Teardown only happens in apply mode.
pub async fn process_account<P: Provider>(
    provider: &P,
    account: &AccountTarget,
    plan: &[ResourceKind],
    config: &CleanupConfig,
    report: &mut CleanupReport,
) {
    for &kind in plan {
        let scopes: Vec<Option<&str>> = match kind.scope() {
            Scope::Regional => config.regions.iter().map(|r| Some(r.as_str())).collect(),
            Scope::Global => vec![None],
        };

        let mut discovered: Vec<ResourceRef> = Vec::new();
        for region in scopes {
            match handlers::discover(provider, kind, region).await {
                Ok(found) => {
                    report.add_found(account, region, kind, found.len());
                    log_found(account, kind, region, &found, config.mode.is_apply());
                    discovered.extend(found);
                }
                Err(e) => {
                    error!(
                        account = %account.display_name,
                        resource_type = kind.as_str(),
                        region = region.unwrap_or("global"),
                        error = ?e,
                        hint = suggestion_for(&e),
                        "Discovery failed"
                    );
                    report.add_error(
                        account,
                        Some(kind),
                        LISTING_RESOURCE_NAME,
                        region,
                        &CleanupError::Discovery(format!("{e:#}")),
                    );
                }
            }
        }

        if !config.mode.is_apply() || discovered.is_empty() {
            continue;
        }

        let outcomes = handlers::teardown(provider, &config.handlers, kind, &discovered).await;
        for outcome in &outcomes {
            report.record_outcome(account, outcome);
        }
        let failed = outcomes.iter().filter(|o| !o.is_deleted()).count();
        if failed > 0 {
            warn!(
                account = %account.display_name,
                resource_type = kind.as_str(),
                failed,
                "Teardown finished with errors"
            );
        }
    }
}

fn log_found(
    account: &AccountTarget,
    kind: ResourceKind,
    region: Option<&str>,
    found: &[ResourceRef],
    apply: bool,
) {
    let region = region.unwrap_or("global");
    if found.is_empty() {
        info!(account = %account.display_name, resource_type = kind.as_str(), region, "None found");
        return;
    }

    info!(
        account = %account.display_name,
        resource_type = kind.as_str(),
        region,
        count = found.len(),
        "Found"
    );
    if !apply {
        for resource in found {
            info!(resource = %resource.name, region, "[DRY RUN] Would delete {}", kind.label());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HandlerSettings, RunMode};
    use crate::provider::{MockProvider, Page};

    fn config(mode: RunMode) -> CleanupConfig {
        CleanupConfig {
            handlers: HandlerSettings::immediate(),
            ..CleanupConfig::new(mode)
        }
    }

    fn master() -> AccountTarget {
        AccountTarget::new(AccountKey::Master, "aws-sso-dev-root")
    }

    /// A provider that lists nothing anywhere
    fn empty_provider() -> MockProvider {
        let mut mock = MockProvider::new();
        mock.expect_list_stacks().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_functions().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_roles().returning(|_| Ok(Page::last(vec![])));
        mock.expect_list_parameters().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_log_groups().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_buckets().returning(|_| Ok(Page::last(vec![])));
        mock.expect_list_stack_sets().returning(|_| Ok(Page::last(vec![])));
        mock
    }

    #[test]
    fn test_plan_for_master_ends_with_stack_sets() {
        let plan = account_plan(AccountKey::Master).unwrap();
        assert_eq!(plan.len(), 7);
        assert_eq!(plan.last(), Some(&ResourceKind::StackSet));
    }

    #[test]
    fn test_plan_for_member_accounts_skips_stack_sets() {
        for key in [AccountKey::Audit, AccountKey::Log] {
            let plan = account_plan(key).unwrap();
            assert_eq!(
                plan,
                vec![
                    ResourceKind::Stack,
                    ResourceKind::Function,
                    ResourceKind::Role,
                    ResourceKind::Parameter,
                    ResourceKind::LogGroup,
                    ResourceKind::Bucket,
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_regional_kinds_listed_per_region() {
        let mut mock = MockProvider::new();
        mock.expect_list_functions()
            .withf(|region, _| region == "us-east-1")
            .times(1)
            .returning(|_, _| Ok(Page::last(vec!["sra-a".to_string()])));
        mock.expect_list_functions()
            .withf(|region, _| region == "us-west-2")
            .times(1)
            .returning(|_, _| Ok(Page::last(vec!["sra-b".to_string(), "other".to_string()])));

        let mut report = CleanupReport::new();
        let account = master();
        process_account(
            &mock,
            &account,
            &[ResourceKind::Function],
            &config(RunMode::Advisory),
            &mut report,
        )
        .await;

        let east = report.scope("Master Account", Some("us-east-1")).unwrap();
        let west = report.scope("Master Account", Some("us-west-2")).unwrap();
        assert_eq!(east.found_count(ResourceKind::Function), 1);
        assert_eq!(west.found_count(ResourceKind::Function), 1);
        assert_eq!(report.success_count(), 0);
    }

    #[tokio::test]
    async fn test_advisory_mode_never_deletes() {
        let mut mock = MockProvider::new();
        mock.expect_list_roles()
            .returning(|_| Ok(Page::last(vec!["sra-role".to_string()])));
        mock.expect_list_attached_role_policies().never();
        mock.expect_delete_role().never();

        let mut report = CleanupReport::new();
        process_account(
            &mock,
            &master(),
            &[ResourceKind::Role],
            &config(RunMode::Advisory),
            &mut report,
        )
        .await;

        assert_eq!(report.total_found(ResourceKind::Role), 1);
        assert_eq!(report.total_deleted(ResourceKind::Role), 0);
    }

    #[tokio::test]
    async fn test_discovery_error_recorded_as_listing() {
        let mut mock = MockProvider::new();
        mock.expect_list_log_groups()
            .withf(|region, _| region == "us-east-1")
            .returning(|_, _| anyhow::bail!("AccessDeniedException: not authorized"));
        mock.expect_list_log_groups()
            .withf(|region, _| region == "us-west-2")
            .returning(|_, _| Ok(Page::last(vec!["/aws/sra".to_string()])));
        mock.expect_delete_log_group().times(1).returning(|_, _| Ok(()));

        let mut report = CleanupReport::new();
        process_account(
            &mock,
            &master(),
            &[ResourceKind::LogGroup],
            &config(RunMode::Apply),
            &mut report,
        )
        .await;

        let errors: Vec<_> = report.entries().filter(|e| e.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].resource_name, LISTING_RESOURCE_NAME);
        assert_eq!(errors[0].region.as_deref(), Some("us-east-1"));
        assert_eq!(report.total_deleted(ResourceKind::LogGroup), 1);
    }

    #[tokio::test]
    async fn test_empty_account_leaves_no_trace() {
        let mock = empty_provider();
        let mut report = CleanupReport::new();
        let plan = account_plan(AccountKey::Master).unwrap();
        process_account(&mock, &master(), &plan, &config(RunMode::Apply), &mut report).await;

        assert!(report.scopes().is_empty());
        assert_eq!(report.error_count(), 0);
    }
}
