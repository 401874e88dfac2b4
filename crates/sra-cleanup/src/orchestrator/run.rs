//! Run controller: the account loop and the final summary

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

use super::account::{account_plan, run_account};
use crate::config::{AccountKey, CleanupConfig, RunMode};
use crate::provider::SessionFactory;
use crate::report::CleanupReport;

/// How one account fared
#[derive(Debug, Clone, Serialize)]
pub struct AccountResult {
    pub key: AccountKey,
    pub display_name: String,
    pub profile: String,
    /// A session was opened and every handler ran
    pub connected: bool,
    pub errors: usize,
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub accounts: Vec<AccountResult>,
    pub report: CleanupReport,
    /// True only if every account connected and no error was recorded
    pub success: bool,
}

impl RunSummary {
    /// The report followed by per-account totals
    pub fn render(&self) -> String {
        let mut out = self.report.render(self.mode);

        let processed = self.accounts.len();
        let succeeded = self
            .accounts
            .iter()
            .filter(|a| a.connected && a.errors == 0)
            .count();
        let _ = writeln!(out, "\nAccounts:");
        let _ = writeln!(out, "  - Processed: {processed}");
        let _ = writeln!(out, "  - Succeeded: {succeeded}");
        let _ = writeln!(out, "  - With errors: {}", processed - succeeded);
        for account in self.accounts.iter().filter(|a| !a.connected) {
            let _ = writeln!(
                out,
                "  - {} could not be reached with profile '{}'",
                account.display_name, account.profile
            );
        }

        if self.success {
            let _ = writeln!(out, "\nCleanup finished successfully.");
        } else {
            let _ = writeln!(out, "\nCleanup finished with errors.");
        }
        out
    }

    /// Write the summary as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }
}

/// Process every configured account in order and collect the results.
///
/// Only an unresolvable teardown order is fatal. Connection failures and
/// resource failures are recorded and the run moves on to the next account.
pub async fn run_cleanup<F: SessionFactory>(
    factory: &F,
    config: &CleanupConfig,
) -> Result<RunSummary> {
    info!(
        mode = ?config.mode,
        accounts = config.accounts.len(),
        regions = ?config.regions,
        "Starting cleanup"
    );
    if !config.mode.is_apply() {
        info!("Advisory mode: nothing will be deleted. Re-run with --delete to apply.");
    }

    let mut report = CleanupReport::new();
    let mut accounts = Vec::with_capacity(config.accounts.len());

    for account in &config.accounts {
        let plan = account_plan(account.key)
            .with_context(|| format!("Failed to order handlers for {}", account.display_name))?;

        let connected = run_account(factory, account, &plan, config, &mut report).await;
        let errors: usize = report
            .account_scopes(&account.display_name)
            .map(|s| s.errors().count())
            .sum();
        if errors > 0 {
            warn!(account = %account.display_name, errors, "Account finished with errors");
        }

        accounts.push(AccountResult {
            key: account.key,
            display_name: account.display_name.clone(),
            profile: account.auth_profile.clone(),
            connected,
            errors,
        });
    }

    let success = accounts.iter().all(|a| a.connected) && report.error_count() == 0;
    info!(
        successes = report.success_count(),
        errors = report.error_count(),
        success,
        "Cleanup finished"
    );

    Ok(RunSummary {
        generated_at: Utc::now(),
        mode: config.mode,
        accounts,
        report,
        success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountTarget, HandlerSettings};
    use crate::provider::{MockProvider, Page, SessionError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Hands out one prepared mock per profile; unknown profiles fail
    struct MockFactory {
        sessions: Mutex<HashMap<String, MockProvider>>,
    }

    impl MockFactory {
        fn new(sessions: Vec<(&str, MockProvider)>) -> Self {
            Self {
                sessions: Mutex::new(
                    sessions
                        .into_iter()
                        .map(|(p, m)| (p.to_string(), m))
                        .collect(),
                ),
            }
        }
    }

    impl SessionFactory for MockFactory {
        type Session = MockProvider;

        async fn connect(&self, account: &AccountTarget) -> Result<MockProvider, SessionError> {
            self.sessions
                .lock()
                .unwrap()
                .remove(&account.auth_profile)
                .ok_or_else(|| SessionError::NoCredentials {
                    profile: account.auth_profile.clone(),
                })
        }
    }

    fn empty_provider(with_stack_sets: bool) -> MockProvider {
        let mut mock = MockProvider::new();
        mock.expect_list_stacks().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_functions().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_roles().returning(|_| Ok(Page::last(vec![])));
        mock.expect_list_parameters().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_log_groups().returning(|_, _| Ok(Page::last(vec![])));
        mock.expect_list_buckets().returning(|_| Ok(Page::last(vec![])));
        if with_stack_sets {
            mock.expect_list_stack_sets().returning(|_| Ok(Page::last(vec![])));
        } else {
            mock.expect_list_stack_sets().never();
        }
        mock
    }

    fn config(mode: RunMode) -> CleanupConfig {
        CleanupConfig {
            handlers: HandlerSettings::immediate(),
            ..CleanupConfig::new(mode)
        }
    }

    #[tokio::test]
    async fn test_clean_accounts_succeed() {
        let factory = MockFactory::new(vec![
            ("aws-sso-dev-root", empty_provider(true)),
            ("aws-sso-dev-audit", empty_provider(false)),
            ("aws-sso-dev-log", empty_provider(false)),
        ]);

        let summary = run_cleanup(&factory, &config(RunMode::Apply)).await.unwrap();
        assert!(summary.success);
        assert_eq!(summary.accounts.len(), 3);
        assert!(summary.accounts.iter().all(|a| a.connected));
        assert_eq!(summary.report.error_count(), 0);
        assert!(summary.render().contains("All operations completed successfully."));
    }

    #[tokio::test]
    async fn test_connection_failure_skips_only_that_account() {
        let factory = MockFactory::new(vec![
            ("aws-sso-dev-root", empty_provider(true)),
            ("aws-sso-dev-log", empty_provider(false)),
        ]);

        let summary = run_cleanup(&factory, &config(RunMode::Advisory)).await.unwrap();
        assert!(!summary.success);

        let audit = &summary.accounts[1];
        assert_eq!(audit.key, AccountKey::Audit);
        assert!(!audit.connected);
        assert!(summary.accounts[2].connected);

        let errors: Vec<_> = summary.report.entries().filter(|e| e.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].account, AccountKey::Audit);
        assert_eq!(errors[0].resource_type, None);
        assert!(errors[0].detail.starts_with("Connection failed"));
        assert!(summary.render().contains("could not be reached"));
    }

    #[tokio::test]
    async fn test_summary_json_export() {
        let factory = MockFactory::new(vec![
            ("aws-sso-dev-root", empty_provider(true)),
            ("aws-sso-dev-audit", empty_provider(false)),
            ("aws-sso-dev-log", empty_provider(false)),
        ]);
        let summary = run_cleanup(&factory, &config(RunMode::Advisory)).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        summary.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mode"], "advisory");
        assert_eq!(value["success"], true);
        assert_eq!(value["accounts"].as_array().unwrap().len(), 3);
    }
}
