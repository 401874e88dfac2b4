//! Account orchestration and the run controller
//!
//! [`run_cleanup`] walks the fixed account catalog in order and hands each
//! account to [`run_account`], which opens a session and runs the resource
//! handlers in dependency order. Both accumulate into one explicit
//! [`CleanupReport`](crate::report::CleanupReport) owned by the run.

pub mod account;
pub mod run;

pub use account::{account_plan, process_account, run_account};
pub use run::{AccountResult, RunSummary, run_cleanup};
