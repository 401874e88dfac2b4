//! sra-cleanup - Cross-account cleanup of security baseline resources
//!
//! Discovers resources whose names carry the baseline token across the
//! management, audit and log archive accounts, and either reports them
//! (advisory mode) or tears them down in dependency order (apply mode).

pub mod aws;
pub mod config;
pub mod handlers;
pub mod orchestrator;
pub mod outcome;
pub mod provider;
pub mod report;
pub mod wait;
