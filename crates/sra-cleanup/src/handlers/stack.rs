//! CloudFormation stack handler
//!
//! Stack deletion is asynchronous. After the delete call the handler waits
//! for a terminal status with bounded polling and, if the wait does not end
//! in `DELETE_COMPLETE`, checks the status once more before deciding.

use anyhow::Result;
use sra_cleanup_common::ResourceKind;
use tracing::{debug, error, info, warn};

use super::{ALREADY_DELETED, DELETED, collect_pages, delete_outcome, select_baseline};
use crate::aws::error::is_not_found;
use crate::outcome::{CleanupError, Outcome, ResourceRef};
use crate::provider::{Provider, STACK_DELETE_COMPLETE, STACK_DELETE_FAILED};
use crate::wait::{WaitConfig, WaitOutcome, poll_until};

pub async fn discover<P: Provider>(provider: &P, region: &str) -> Result<Vec<ResourceRef>> {
    let stacks = collect_pages(move |next| provider.list_stacks(region, next)).await?;
    let names = select_baseline(stacks.into_iter().map(|s| s.name));
    debug!(region, count = names.len(), "Listed stacks");
    Ok(names
        .into_iter()
        .map(|name| ResourceRef::new(ResourceKind::Stack, name, Some(region)))
        .collect())
}

/// Progress of one stack deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackDeletion {
    /// The delete call was accepted
    Issued,
    /// Polling for a terminal status
    Waiting,
    /// Polling observed a terminal status
    Settled(String),
    /// Polling ended without `DELETE_COMPLETE`
    WaitFailed(String),
    /// Status seen by the one-shot check after a failed wait; `None` if gone
    FallbackChecked(Option<String>),
}

enum Step {
    Next(StackDeletion),
    Done(Outcome),
}

pub async fn teardown<P: Provider>(
    provider: &P,
    wait: &WaitConfig,
    stack: &ResourceRef,
) -> Outcome {
    let region = stack.region_label();

    info!(stack = %stack.name, region, "Deleting stack");
    if let Err(e) = provider.delete_stack(region, &stack.name).await {
        return delete_outcome(stack, Err(e));
    }

    let mut state = StackDeletion::Issued;
    loop {
        match advance(provider, wait, stack, state).await {
            Step::Next(next) => state = next,
            Step::Done(outcome) => return outcome,
        }
    }
}

async fn advance<P: Provider>(
    provider: &P,
    wait: &WaitConfig,
    stack: &ResourceRef,
    state: StackDeletion,
) -> Step {
    let region = stack.region_label();

    match state {
        StackDeletion::Issued => {
            debug!(stack = %stack.name, region, "Waiting for stack deletion");
            Step::Next(StackDeletion::Waiting)
        }
        StackDeletion::Waiting => {
            let result = poll_until(wait, &stack.name, || async move {
                let status = provider.stack_status(region, &stack.name).await?;
                Ok(match status {
                    None => Some(STACK_DELETE_COMPLETE.to_string()),
                    Some(s) if s == STACK_DELETE_COMPLETE || s == STACK_DELETE_FAILED => Some(s),
                    Some(_) => None,
                })
            })
            .await;

            Step::Next(match result {
                Ok(WaitOutcome::Ready(status)) => StackDeletion::Settled(status),
                Ok(WaitOutcome::Exhausted { attempts }) => StackDeletion::WaitFailed(format!(
                    "timed out after {attempts} status checks"
                )),
                Err(e) if is_not_found(&e) => {
                    StackDeletion::Settled(STACK_DELETE_COMPLETE.to_string())
                }
                Err(e) => StackDeletion::WaitFailed(format!("status check failed: {e:#}")),
            })
        }
        StackDeletion::Settled(status) if status == STACK_DELETE_COMPLETE => {
            info!(stack = %stack.name, region, "Stack deleted");
            Step::Done(Outcome::deleted(stack, DELETED))
        }
        StackDeletion::Settled(status) => {
            Step::Next(StackDeletion::WaitFailed(format!("stack reached {status}")))
        }
        StackDeletion::WaitFailed(reason) => {
            warn!(stack = %stack.name, region, reason = %reason, "Stack wait failed, checking status");
            match provider.stack_status(region, &stack.name).await {
                Ok(status) => Step::Next(StackDeletion::FallbackChecked(status)),
                Err(e) if is_not_found(&e) => Step::Next(StackDeletion::FallbackChecked(None)),
                Err(e) => {
                    error!(stack = %stack.name, region, error = ?e, "Stack status check failed");
                    Step::Done(Outcome::failed(
                        stack,
                        CleanupError::Deletion(format!("{reason}; status check failed: {e:#}")),
                    ))
                }
            }
        }
        StackDeletion::FallbackChecked(status) => Step::Done(settle(stack, status.as_deref())),
    }
}

/// Classify the status seen by the fallback check
fn settle(stack: &ResourceRef, status: Option<&str>) -> Outcome {
    match status {
        None => {
            info!(stack = %stack.name, "Stack gone after fallback check");
            Outcome::deleted(stack, ALREADY_DELETED)
        }
        Some(STACK_DELETE_COMPLETE) => {
            info!(stack = %stack.name, "Stack deleted (fallback check)");
            Outcome::deleted(stack, DELETED)
        }
        Some(STACK_DELETE_FAILED) => {
            error!(stack = %stack.name, "Stack deletion failed, manual deletion required");
            Outcome::failed(
                stack,
                CleanupError::Deletion(format!(
                    "Stack deletion ended in {STACK_DELETE_FAILED}; manual deletion required"
                )),
            )
        }
        Some(other) => {
            error!(stack = %stack.name, status = other, "Stack in unexpected state");
            Outcome::failed(
                stack,
                CleanupError::UnexpectedState(format!(
                    "Stack in unexpected state {other}; manual follow-up required"
                )),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::error::AwsError;
    use crate::outcome::{ErrorKind, OutcomeStatus};
    use crate::provider::{MockProvider, Page, StackSummary};
    use std::time::Duration;

    fn fast_wait(max_attempts: u32) -> WaitConfig {
        WaitConfig {
            delay: Duration::ZERO,
            max_attempts,
        }
    }

    fn stack(name: &str) -> ResourceRef {
        ResourceRef::new(ResourceKind::Stack, name, Some("us-east-1"))
    }

    fn summary(name: &str) -> StackSummary {
        StackSummary {
            name: name.to_string(),
            status: "CREATE_COMPLETE".to_string(),
        }
    }

    #[tokio::test]
    async fn test_discover_filters_and_paginates() {
        let mut mock = MockProvider::new();
        mock.expect_list_stacks()
            .withf(|region, next| region == "us-east-1" && next.is_none())
            .times(1)
            .returning(|_, _| {
                Ok(Page {
                    items: vec![summary("sra-common-prereqs"), summary("unrelated")],
                    next: Some("t1".to_string()),
                })
            });
        mock.expect_list_stacks()
            .withf(|_, next| next.as_deref() == Some("t1"))
            .times(1)
            .returning(|_, _| Ok(Page::last(vec![summary("SRA-GuardDuty")])));

        let found = discover(&mock, "us-east-1").await.unwrap();
        let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sra-common-prereqs", "SRA-GuardDuty"]);
        assert!(found.iter().all(|r| r.region.as_deref() == Some("us-east-1")));
    }

    #[tokio::test]
    async fn test_delete_completes() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack().times(1).returning(|_, _| Ok(()));
        let mut checks = 0;
        mock.expect_stack_status().times(2).returning(move |_, _| {
            checks += 1;
            Ok(Some(
                if checks == 1 {
                    "DELETE_IN_PROGRESS"
                } else {
                    STACK_DELETE_COMPLETE
                }
                .to_string(),
            ))
        });

        let outcome = teardown(&mock, &fast_wait(5), &stack("sra-stack")).await;
        assert_eq!(outcome, Outcome::deleted(&stack("sra-stack"), DELETED));
    }

    #[tokio::test]
    async fn test_vanished_stack_counts_as_deleted() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack().returning(|_, _| Ok(()));
        mock.expect_stack_status().times(1).returning(|_, _| Ok(None));

        let outcome = teardown(&mock, &fast_wait(5), &stack("sra-stack")).await;
        assert!(outcome.is_deleted());
    }

    #[tokio::test]
    async fn test_delete_failed_after_timeout_needs_manual_action() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack().returning(|_, _| Ok(()));
        let mut checks = 0;
        // Three polls stay in progress, the fallback check sees DELETE_FAILED
        mock.expect_stack_status().times(4).returning(move |_, _| {
            checks += 1;
            Ok(Some(
                if checks <= 3 {
                    "DELETE_IN_PROGRESS"
                } else {
                    STACK_DELETE_FAILED
                }
                .to_string(),
            ))
        });

        let outcome = teardown(&mock, &fast_wait(3), &stack("test-sra-cloudtrail")).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Deletion));
        match outcome.status {
            OutcomeStatus::Failed(e) => assert!(e.to_string().contains("manual deletion")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_failed_during_wait_is_rechecked() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack().returning(|_, _| Ok(()));
        mock.expect_stack_status()
            .times(2)
            .returning(|_, _| Ok(Some(STACK_DELETE_FAILED.to_string())));

        let outcome = teardown(&mock, &fast_wait(10), &stack("sra-stack")).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Deletion));
    }

    #[tokio::test]
    async fn test_other_state_is_unexpected() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack().returning(|_, _| Ok(()));
        mock.expect_stack_status()
            .returning(|_, _| Ok(Some("UPDATE_ROLLBACK_COMPLETE".to_string())));

        let outcome = teardown(&mock, &fast_wait(2), &stack("sra-stack")).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::UnexpectedState));
    }

    #[tokio::test]
    async fn test_status_error_falls_back_to_single_check() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack().returning(|_, _| Ok(()));
        let mut checks = 0;
        mock.expect_stack_status().times(2).returning(move |_, _| {
            checks += 1;
            if checks == 1 {
                anyhow::bail!("Throttling: Rate exceeded")
            }
            Ok(Some(STACK_DELETE_COMPLETE.to_string()))
        });

        let outcome = teardown(&mock, &fast_wait(10), &stack("sra-stack")).await;
        assert_eq!(outcome, Outcome::deleted(&stack("sra-stack"), DELETED));
    }

    #[tokio::test]
    async fn test_stale_listing_is_already_deleted() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack().returning(|_, _| {
            Err(AwsError::NotFound {
                message: "Stack with id sra-stack does not exist".into(),
            }
            .into())
        });
        mock.expect_stack_status().never();

        let outcome = teardown(&mock, &fast_wait(5), &stack("sra-stack")).await;
        assert_eq!(outcome, Outcome::deleted(&stack("sra-stack"), ALREADY_DELETED));
    }

    #[tokio::test]
    async fn test_delete_call_failure() {
        let mut mock = MockProvider::new();
        mock.expect_delete_stack()
            .returning(|_, _| anyhow::bail!("AccessDenied: not authorized"));
        mock.expect_stack_status().never();

        let outcome = teardown(&mock, &fast_wait(5), &stack("sra-stack")).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Deletion));
    }
}
