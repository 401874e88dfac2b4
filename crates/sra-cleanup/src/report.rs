//! Report aggregator
//!
//! Collects found/deleted counts and outcome entries per
//! `(account, region)` scope. Scopes keep the order in which they were first
//! touched, and every operation appends; nothing is ever overwritten.

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use sra_cleanup_common::ResourceKind;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::{AccountKey, AccountTarget, RunMode};
use crate::outcome::{CleanupError, ErrorKind, Outcome, OutcomeStatus, ResourceRef};

/// Composite key of one report scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeKey {
    pub account: String,
    pub region: Option<String>,
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{} ({})", self.account, region),
            None => f.write_str(&self.account),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Success,
    Error,
}

/// One recorded success or error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeEntry {
    pub account: AccountKey,
    /// `None` only for connection failures, which precede any resource type
    pub resource_type: Option<ResourceKind>,
    pub resource_name: String,
    pub region: Option<String>,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub detail: String,
}

impl OutcomeEntry {
    pub fn is_error(&self) -> bool {
        self.status == EntryStatus::Error
    }

    fn type_label(&self) -> &'static str {
        self.resource_type.map_or("Connection", ResourceKind::label)
    }
}

/// Everything recorded under one scope key
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    #[serde(flatten)]
    pub key: ScopeKey,
    pub found: BTreeMap<ResourceKind, usize>,
    pub deleted: BTreeMap<ResourceKind, usize>,
    pub entries: Vec<OutcomeEntry>,
}

impl ScopeReport {
    fn new(key: ScopeKey) -> Self {
        Self {
            key,
            found: BTreeMap::new(),
            deleted: BTreeMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn found_count(&self, kind: ResourceKind) -> usize {
        self.found.get(&kind).copied().unwrap_or(0)
    }

    pub fn deleted_count(&self, kind: ResourceKind) -> usize {
        self.deleted.get(&kind).copied().unwrap_or(0)
    }

    pub fn successes(&self) -> impl Iterator<Item = &OutcomeEntry> {
        self.entries.iter().filter(|e| !e.is_error())
    }

    pub fn errors(&self) -> impl Iterator<Item = &OutcomeEntry> {
        self.entries.iter().filter(|e| e.is_error())
    }
}

/// Process-wide result accumulator for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    scopes: Vec<ScopeReport>,
}

impl CleanupReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn scope_mut(&mut self, account: &AccountTarget, region: Option<&str>) -> &mut ScopeReport {
        let idx = match self.position(&account.display_name, region) {
            Some(idx) => idx,
            None => {
                self.scopes.push(ScopeReport::new(ScopeKey {
                    account: account.display_name.clone(),
                    region: region.map(str::to_string),
                }));
                self.scopes.len() - 1
            }
        };
        &mut self.scopes[idx]
    }

    fn position(&self, account: &str, region: Option<&str>) -> Option<usize> {
        self.scopes
            .iter()
            .position(|s| s.key.account == account && s.key.region.as_deref() == region)
    }

    /// Record `count` discovered resources. Zero counts leave no trace.
    pub fn add_found(
        &mut self,
        account: &AccountTarget,
        region: Option<&str>,
        kind: ResourceKind,
        count: usize,
    ) {
        if count > 0 {
            *self.scope_mut(account, region).found.entry(kind).or_default() += count;
        }
    }

    /// Record `count` deleted resources. Zero counts leave no trace.
    pub fn add_deleted(
        &mut self,
        account: &AccountTarget,
        region: Option<&str>,
        kind: ResourceKind,
        count: usize,
    ) {
        if count > 0 {
            *self
                .scope_mut(account, region)
                .deleted
                .entry(kind)
                .or_default() += count;
        }
    }

    pub fn add_success(&mut self, account: &AccountTarget, resource: &ResourceRef, detail: &str) {
        let entry = OutcomeEntry {
            account: account.key,
            resource_type: Some(resource.kind),
            resource_name: resource.name.clone(),
            region: resource.region.clone(),
            status: EntryStatus::Success,
            error_kind: None,
            detail: detail.to_string(),
        };
        self.scope_mut(account, resource.region.as_deref())
            .entries
            .push(entry);
    }

    pub fn add_error(
        &mut self,
        account: &AccountTarget,
        resource_type: Option<ResourceKind>,
        resource_name: &str,
        region: Option<&str>,
        error: &CleanupError,
    ) {
        let entry = OutcomeEntry {
            account: account.key,
            resource_type,
            resource_name: resource_name.to_string(),
            region: region.map(str::to_string),
            status: EntryStatus::Error,
            error_kind: Some(error.kind()),
            detail: error.to_string(),
        };
        self.scope_mut(account, region).entries.push(entry);
    }

    /// Record a teardown outcome; a deletion also bumps the deleted count
    pub fn record_outcome(&mut self, account: &AccountTarget, outcome: &Outcome) {
        let resource = &outcome.resource;
        match &outcome.status {
            OutcomeStatus::Deleted { detail } => {
                self.add_success(account, resource, detail);
                self.add_deleted(account, resource.region.as_deref(), resource.kind, 1);
            }
            OutcomeStatus::Failed(error) => self.add_error(
                account,
                Some(resource.kind),
                &resource.name,
                resource.region.as_deref(),
                error,
            ),
        }
    }

    pub fn scopes(&self) -> &[ScopeReport] {
        &self.scopes
    }

    pub fn scope(&self, account: &str, region: Option<&str>) -> Option<&ScopeReport> {
        self.position(account, region).map(|idx| &self.scopes[idx])
    }

    /// All entries, scope by scope
    pub fn entries(&self) -> impl Iterator<Item = &OutcomeEntry> {
        self.scopes.iter().flat_map(|s| s.entries.iter())
    }

    /// All scopes belonging to one account
    pub fn account_scopes<'a>(
        &'a self,
        display_name: &'a str,
    ) -> impl Iterator<Item = &'a ScopeReport> + 'a {
        self.scopes
            .iter()
            .filter(move |s| s.key.account == display_name)
    }

    pub fn success_count(&self) -> usize {
        self.entries().filter(|e| !e.is_error()).count()
    }

    pub fn error_count(&self) -> usize {
        self.entries().filter(|e| e.is_error()).count()
    }

    pub fn total_found(&self, kind: ResourceKind) -> usize {
        self.scopes.iter().map(|s| s.found_count(kind)).sum()
    }

    pub fn total_deleted(&self, kind: ResourceKind) -> usize {
        self.scopes.iter().map(|s| s.deleted_count(kind)).sum()
    }

    /// Render the human-readable summary.
    ///
    /// Sections: found counts, deleted counts (apply mode only), successes,
    /// errors, totals, and a status line.
    pub fn render(&self, mode: RunMode) -> String {
        let mut out = String::new();
        let rule = "=".repeat(80);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "SRA CLEANUP REPORT");
        let _ = writeln!(out, "{rule}");

        if let Some(table) = self.counts_table(|s| &s.found) {
            let _ = writeln!(out, "\nResources found:\n{table}");
        }

        if mode.is_apply() {
            if let Some(table) = self.counts_table(|s| &s.deleted) {
                let _ = writeln!(out, "\nResources deleted:\n{table}");
            }
        }

        if self.success_count() > 0 {
            let _ = writeln!(out, "\nSuccessful operations:");
            for scope in self.scopes.iter().filter(|s| s.successes().next().is_some()) {
                let _ = writeln!(out, "\n  {}:", scope.key);
                for entry in scope.successes() {
                    let _ = writeln!(out, "    - {}", entry_line(entry));
                }
            }
        }

        if self.error_count() > 0 {
            let _ = writeln!(out, "\nErrors:");
            for scope in self.scopes.iter().filter(|s| s.errors().next().is_some()) {
                let _ = writeln!(out, "\n  {}:", scope.key);
                for entry in scope.errors() {
                    let _ = writeln!(out, "    - {}", entry_line(entry));
                    let _ = writeln!(out, "      Error: {}", entry.detail);
                }
            }
        }

        let errors = self.error_count();
        let _ = writeln!(out, "\nSummary:");
        let _ = writeln!(out, "  - Successful operations: {}", self.success_count());
        let _ = writeln!(out, "  - Errors: {errors}");

        if errors == 0 {
            let _ = writeln!(out, "\nAll operations completed successfully.");
        } else {
            let _ = writeln!(
                out,
                "\n{errors} error(s) recorded. Manual follow-up required; review the errors above."
            );
        }

        out
    }

    fn counts_table<F>(&self, counts: F) -> Option<Table>
    where
        F: Fn(&ScopeReport) -> &BTreeMap<ResourceKind, usize>,
    {
        let rows: Vec<_> = self
            .scopes
            .iter()
            .flat_map(|s| counts(s).iter().map(move |(kind, n)| (&s.key, *kind, *n)))
            .collect();
        if rows.is_empty() {
            return None;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Account (Region)"),
                Cell::new("Resource Type"),
                Cell::new("Count"),
            ]);
        for (key, kind, n) in rows {
            table.add_row(vec![
                Cell::new(key.to_string()),
                Cell::new(kind.label()),
                Cell::new(n),
            ]);
        }
        Some(table)
    }
}

fn entry_line(entry: &OutcomeEntry) -> String {
    match &entry.region {
        Some(region) => format!(
            "{}: {} ({})",
            entry.type_label(),
            entry.resource_name,
            region
        ),
        None => format!("{}: {}", entry.type_label(), entry.resource_name),
    }
}
