//! Bounded polling with a fixed delay.
//!
//! Provides a generic abstraction for waiting on an AWS resource (or any async
//! condition) to settle, checking at most `max_attempts` times. Exhausting the
//! attempts is a normal outcome, not an error, so callers can fall back to a
//! final status check of their own.

use anyhow::Result;
use backon::{BackoffBuilder, ConstantBuilder};
use sra_cleanup_common::defaults::{DEFAULT_STACK_WAIT_ATTEMPTS, DEFAULT_STACK_WAIT_DELAY};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for bounded polling.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay between checks
    pub delay: Duration,
    /// Maximum number of checks before giving up
    pub max_attempts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_STACK_WAIT_DELAY,
            max_attempts: DEFAULT_STACK_WAIT_ATTEMPTS,
        }
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    /// The check reported a settled value
    Ready(T),
    /// Every attempt reported "not yet"
    Exhausted { attempts: u32 },
}

/// Poll `check` until it yields a value or the attempts run out.
///
/// # Arguments
/// * `config` - Delay and attempt bound
/// * `resource_name` - Name for logging
/// * `check` - Returns `Ok(Some(v))` when settled, `Ok(None)` to retry
///
/// # Returns
/// * `Ok(WaitOutcome::Ready(v))` - The check settled
/// * `Ok(WaitOutcome::Exhausted { .. })` - Attempts exhausted
/// * `Err` - The check itself failed; the wait stops immediately
pub async fn poll_until<F, Fut, T>(
    config: &WaitConfig,
    resource_name: &str,
    mut check: F,
) -> Result<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delays = ConstantBuilder::default()
        .with_delay(config.delay)
        .with_max_times(max_attempts as usize - 1)
        .build();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match check().await {
            Ok(Some(value)) => {
                debug!(resource = %resource_name, attempts, "Resource settled");
                return Ok(WaitOutcome::Ready(value));
            }
            Ok(None) => match delays.next() {
                Some(delay) => {
                    debug!(
                        resource = %resource_name,
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        "Resource not settled, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(resource = %resource_name, attempts, "Gave up waiting");
                    return Ok(WaitOutcome::Exhausted { attempts });
                }
            },
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Resource check failed");
                return Err(e);
            }
        }
    }
}
