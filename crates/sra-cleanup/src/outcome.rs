//! Discovered resources and the outcomes of tearing them down

use serde::Serialize;
use sra_cleanup_common::ResourceKind;
use thiserror::Error;

/// One discovered resource instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    /// `None` for account-global resource types
    pub region: Option<String>,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>, region: Option<&str>) -> Self {
        Self {
            kind,
            name: name.into(),
            region: region.map(str::to_string),
        }
    }

    /// Region for logging, `global` for account-global types
    pub fn region_label(&self) -> &str {
        self.region.as_deref().unwrap_or("global")
    }
}

/// Category of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Discovery,
    Deletion,
    PartialState,
    UnexpectedState,
}

/// Failures recorded during a run. None of them aborts the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CleanupError {
    /// Session acquisition failed; fatal to that account only
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Listing a resource type failed in one scope
    #[error("{0}")]
    Discovery(String),

    /// The final delete call for a resource failed
    #[error("{0}")]
    Deletion(String),

    /// A precondition step of a multi-step teardown failed
    #[error("{0}")]
    PartialState(String),

    /// A stack settled in a state that needs manual follow-up
    #[error("{0}")]
    UnexpectedState(String),
}

impl CleanupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CleanupError::Connection(_) => ErrorKind::Connection,
            CleanupError::Discovery(_) => ErrorKind::Discovery,
            CleanupError::Deletion(_) => ErrorKind::Deletion,
            CleanupError::PartialState(_) => ErrorKind::PartialState,
            CleanupError::UnexpectedState(_) => ErrorKind::UnexpectedState,
        }
    }

    /// Build a deletion error from a provider error, keeping its full chain
    pub fn deletion(e: &anyhow::Error) -> Self {
        CleanupError::Deletion(format!("{e:#}"))
    }

    pub fn partial(step: &str, e: &anyhow::Error) -> Self {
        CleanupError::PartialState(format!("{step}: {e:#}"))
    }
}

/// Result of one teardown step for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The resource is gone; counts toward the deleted total
    Deleted { detail: String },
    /// A step failed. Partial-state failures precede the final attempt and
    /// do not replace its own outcome.
    Failed(CleanupError),
}

/// Outcome of tearing down (part of) one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub resource: ResourceRef,
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn deleted(resource: &ResourceRef, detail: impl Into<String>) -> Self {
        Self {
            resource: resource.clone(),
            status: OutcomeStatus::Deleted {
                detail: detail.into(),
            },
        }
    }

    pub fn failed(resource: &ResourceRef, error: CleanupError) -> Self {
        Self {
            resource: resource.clone(),
            status: OutcomeStatus::Failed(error),
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.status, OutcomeStatus::Deleted { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.status {
            OutcomeStatus::Failed(e) => Some(e.kind()),
            OutcomeStatus::Deleted { .. } => None,
        }
    }
}
