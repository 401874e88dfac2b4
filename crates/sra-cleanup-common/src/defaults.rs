//! Default configuration values for sra-cleanup
//!
//! The account catalog and region set are fixed for a deployment; the
//! tuning values can be overridden from the command line.

use std::time::Duration;

/// Case-insensitive token identifying resources of the security baseline
pub const BASELINE_TOKEN: &str = "sra";

/// Regions the baseline is deployed to. The first entry is the home region,
/// used for stack set administration and as the default S3 endpoint.
pub const SRA_REGIONS: [&str; 2] = ["us-east-1", "us-west-2"];

/// Default credential profile for the management (master) account
pub const DEFAULT_MASTER_PROFILE: &str = "aws-sso-dev-root";

/// Default credential profile for the audit account
pub const DEFAULT_AUDIT_PROFILE: &str = "aws-sso-dev-audit";

/// Default credential profile for the log archive account
pub const DEFAULT_LOG_PROFILE: &str = "aws-sso-dev-log";

/// Maximum number of names or instances sent in one batched delete request
pub const MAX_BATCH_SIZE: usize = 10;

/// Default delay between stack deletion status polls
pub const DEFAULT_STACK_WAIT_DELAY: Duration = Duration::from_secs(10);

/// Default maximum number of stack deletion status polls
pub const DEFAULT_STACK_WAIT_ATTEMPTS: u32 = 60;

/// Default pause after each stack instance retraction chunk
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(10);

/// Synthetic resource name used for discovery-level failures
pub const LISTING_RESOURCE_NAME: &str = "listing";
