//! Configuration types for a cleanup run

use serde::Serialize;
use sra_cleanup_common::defaults::{
    DEFAULT_AUDIT_PROFILE, DEFAULT_BATCH_PAUSE, DEFAULT_LOG_PROFILE, DEFAULT_MASTER_PROFILE,
    SRA_REGIONS,
};
use std::path::PathBuf;
use std::time::Duration;

use crate::wait::WaitConfig;

/// Key of an entry in the fixed account catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKey {
    Master,
    Audit,
    Log,
}

impl AccountKey {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKey::Master => "master",
            AccountKey::Audit => "audit",
            AccountKey::Log => "log",
        }
    }
}

/// One administrative account the run operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountTarget {
    pub key: AccountKey,
    /// Named credential profile used to open a session
    pub auth_profile: String,
    pub display_name: String,
}

impl AccountTarget {
    pub fn new(key: AccountKey, auth_profile: impl Into<String>) -> Self {
        let display_name = match key {
            AccountKey::Master => "Master Account",
            AccountKey::Audit => "Audit Account",
            AccountKey::Log => "Log Archive Account",
        };
        Self {
            key,
            auth_profile: auth_profile.into(),
            display_name: display_name.to_string(),
        }
    }
}

/// Profile overrides for the fixed account catalog
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub master: Option<String>,
    pub audit: Option<String>,
    pub log: Option<String>,
}

/// The fixed account catalog, in processing order.
///
/// Master comes first because it is the only account that owns stack sets.
pub fn account_catalog(overrides: &ProfileOverrides) -> Vec<AccountTarget> {
    vec![
        AccountTarget::new(
            AccountKey::Master,
            overrides.master.as_deref().unwrap_or(DEFAULT_MASTER_PROFILE),
        ),
        AccountTarget::new(
            AccountKey::Audit,
            overrides.audit.as_deref().unwrap_or(DEFAULT_AUDIT_PROFILE),
        ),
        AccountTarget::new(
            AccountKey::Log,
            overrides.log.as_deref().unwrap_or(DEFAULT_LOG_PROFILE),
        ),
    ]
}

/// Advisory (discover only) or apply (discover and delete)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Advisory,
    Apply,
}

impl RunMode {
    pub fn from_delete_flag(delete: bool) -> Self {
        if delete { RunMode::Apply } else { RunMode::Advisory }
    }

    pub fn is_apply(self) -> bool {
        self == RunMode::Apply
    }
}

/// Tuning for the multi-step teardown protocols
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Bounded polling for stack deletion
    pub stack_wait: WaitConfig,
    /// Pause after each stack instance retraction chunk
    pub batch_pause: Duration,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            stack_wait: WaitConfig::default(),
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }
}

impl HandlerSettings {
    /// Settings with no waiting at all, for tests against fake providers
    pub fn immediate() -> Self {
        Self {
            stack_wait: WaitConfig {
                delay: Duration::ZERO,
                ..WaitConfig::default()
            },
            batch_pause: Duration::ZERO,
        }
    }
}

/// Configuration for a cleanup run
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub mode: RunMode,
    pub accounts: Vec<AccountTarget>,
    pub regions: Vec<String>,
    pub handlers: HandlerSettings,
    /// Optional JSON export of the final report
    pub output: Option<PathBuf>,
}

impl CleanupConfig {
    /// Config over the fixed catalogs with default tuning
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            accounts: account_catalog(&ProfileOverrides::default()),
            regions: SRA_REGIONS.iter().map(|r| r.to_string()).collect(),
            handlers: HandlerSettings::default(),
            output: None,
        }
    }

    /// Region used for account-global administration (stack sets, S3 fallback)
    pub fn home_region(&self) -> &str {
        self.regions.first().map(String::as_str).unwrap_or(SRA_REGIONS[0])
    }
}
