//! sra-cleanup: cross-account teardown of security baseline resources
//!
//! Runs in advisory mode by default and only lists what it would delete.
//! Pass `--delete` to tear the resources down.

use anyhow::Result;
use clap::Parser;
use sra_cleanup::aws::{AwsSessionFactory, suggestion_for};
use sra_cleanup::config::{
    CleanupConfig, HandlerSettings, ProfileOverrides, RunMode, account_catalog,
};
use sra_cleanup::orchestrator::run_cleanup;
use sra_cleanup::wait::WaitConfig;
use sra_cleanup_common::defaults::{
    DEFAULT_BATCH_PAUSE, DEFAULT_STACK_WAIT_ATTEMPTS, DEFAULT_STACK_WAIT_DELAY, SRA_REGIONS,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Log targets capped at `warn`
const QUIET_TARGETS: &[&str] = &[
    "aws_config",
    "aws_smithy_runtime",
    "aws_sdk_cloudformation",
    "aws_sdk_cloudwatchlogs",
    "aws_sdk_iam",
    "aws_sdk_lambda",
    "aws_sdk_s3",
    "aws_sdk_ssm",
    "aws_sdk_sts",
];

#[derive(Parser, Debug)]
#[command(name = "sra-cleanup")]
#[command(about = "Remove security baseline resources from the management, audit and log accounts")]
#[command(version)]
struct Args {
    /// Actually delete resources (default is advisory, list only)
    #[arg(long)]
    delete: bool,

    /// Credential profile for the management account
    #[arg(long, env = "SRA_CLEANUP_MASTER_PROFILE")]
    master_profile: Option<String>,

    /// Credential profile for the audit account
    #[arg(long, env = "SRA_CLEANUP_AUDIT_PROFILE")]
    audit_profile: Option<String>,

    /// Credential profile for the log archive account
    #[arg(long, env = "SRA_CLEANUP_LOG_PROFILE")]
    log_profile: Option<String>,

    /// Seconds between stack status checks
    #[arg(long, default_value_t = DEFAULT_STACK_WAIT_DELAY.as_secs())]
    stack_wait_delay_secs: u64,

    /// Maximum stack status checks before falling back to a single check
    #[arg(long, default_value_t = DEFAULT_STACK_WAIT_ATTEMPTS)]
    stack_wait_attempts: u32,

    /// Seconds to pause after each stack instance retraction batch
    #[arg(long, default_value_t = DEFAULT_BATCH_PAUSE.as_secs())]
    batch_pause_secs: u64,

    /// Write the final report as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl From<Args> for CleanupConfig {
    fn from(args: Args) -> Self {
        let overrides = ProfileOverrides {
            master: args.master_profile,
            audit: args.audit_profile,
            log: args.log_profile,
        };
        Self {
            mode: RunMode::from_delete_flag(args.delete),
            accounts: account_catalog(&overrides),
            regions: SRA_REGIONS.iter().map(|r| r.to_string()).collect(),
            handlers: HandlerSettings {
                stack_wait: WaitConfig {
                    delay: Duration::from_secs(args.stack_wait_delay_secs),
                    max_attempts: args.stack_wait_attempts,
                },
                batch_pause: Duration::from_secs(args.batch_pause_secs),
            },
            output: args.output,
        }
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(suggestion) = suggestion_for(e) {
        let _ = writeln!(stderr, "\n\x1b[36mSuggestion:\x1b[0m {suggestion}");
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Returns whether the run finished without recorded errors
async fn run() -> Result<bool> {
    let args = Args::parse();

    // Reduce noise from the AWS SDK (warnings and errors only)
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    for target in QUIET_TARGETS {
        filter = filter.add_directive(format!("{target}=warn").parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config: CleanupConfig = args.into();
    for account in &config.accounts {
        info!(account = %account.display_name, profile = %account.auth_profile, "Using profile");
    }

    let factory = AwsSessionFactory::new(config.regions.clone());
    let summary = run_cleanup(&factory, &config).await?;

    println!("{}", summary.render());
    if let Some(path) = &config.output {
        summary.write_json(path)?;
    }

    Ok(summary.success)
}
