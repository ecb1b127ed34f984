//! Poll-until-terminal for stacks and change sets.
//!
//! Two specializations share one pattern: describe, check terminal
//! state, otherwise sleep a fixed interval and recheck. Polling suspends
//! the task between checks; it never blocks a thread. The retry count is
//! unbounded by default (eventual consistency over timeout) but callers
//! can set an explicit budget through [`PollConfig`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{ChangeSetError, NoOpReason, PollError, Result, StackError};

use super::client::StackApi;
use super::types::{ChangeSetDescriptor, ChangeSetStatus, StackDescriptor};

/// Delay between status checks.
const POLL_INTERVAL_SECS: u64 = 5;

/// Polling configuration.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay between status checks.
    pub interval: Duration,
    /// Maximum number of checks before giving up. `None` polls until the
    /// provider reaches a terminal state or errors.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            max_attempts: None,
        }
    }
}

/// Poller for asynchronous stack and change-set operations.
pub struct StackPoller {
    /// Provider API.
    api: Arc<dyn StackApi>,
    /// Polling configuration.
    config: PollConfig,
}

impl StackPoller {
    /// Creates a poller with the default configuration.
    #[must_use]
    pub fn new(api: Arc<dyn StackApi>) -> Self {
        Self {
            api,
            config: PollConfig::default(),
        }
    }

    /// Sets the polling configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    /// Polls a stack until it reaches a terminal state.
    ///
    /// Returns `Ok(None)` if the stack stops existing (deletion reached
    /// terminal absence). Terminal failure statuses reject with the full
    /// stack descriptor for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error on terminal failure statuses, transport errors,
    /// or an exhausted retry budget.
    pub async fn wait_for_stack(&self, name: &str) -> Result<Option<StackDescriptor>> {
        let mut attempts: u32 = 0;

        loop {
            let Some(stack) = self.api.describe_stack(name).await? else {
                debug!("Stack {name} no longer exists");
                return Ok(None);
            };

            if stack.status.is_terminal_success() {
                debug!("Stack {name} reached {}", stack.status);
                return Ok(Some(stack));
            }

            if stack.status.is_terminal_failure() {
                return Err(StackError::OperationFailed {
                    stack: Box::new(stack),
                }
                .into());
            }

            debug!("Stack {name} is {}, waiting", stack.status);
            attempts = attempts.saturating_add(1);
            self.check_budget("stack", name, attempts)?;
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Polls a change set until it reaches a terminal state.
    ///
    /// Returns `Ok(None)` when the change set does not exist (already
    /// deleted) or when it failed with a recognized no-op reason; both
    /// are success-with-empty-result, never errors.
    ///
    /// # Errors
    ///
    /// Returns an error on a genuine terminal failure, transport errors,
    /// or an exhausted retry budget.
    pub async fn wait_for_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Option<ChangeSetDescriptor>> {
        let mut attempts: u32 = 0;

        loop {
            let Some(change_set) = self
                .api
                .describe_change_set(stack_name, change_set_name)
                .await?
            else {
                debug!("Change set {change_set_name} no longer exists");
                return Ok(None);
            };

            if change_set.status.is_terminal_success() {
                debug!(
                    "Change set {change_set_name} reached {}",
                    change_set.status
                );
                return Ok(Some(change_set));
            }

            if change_set.status == ChangeSetStatus::Failed {
                let reason = change_set.status_reason.clone().unwrap_or_default();
                if NoOpReason::detect(&reason).is_some() {
                    debug!("Change set {change_set_name} contained no changes");
                    return Ok(None);
                }
                return Err(ChangeSetError::OperationFailed {
                    stack_name: stack_name.to_string(),
                    name: change_set_name.to_string(),
                    reason,
                }
                .into());
            }

            debug!(
                "Change set {change_set_name} is {}, waiting",
                change_set.status
            );
            attempts = attempts.saturating_add(1);
            self.check_budget("change set", change_set_name, attempts)?;
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Polls a change-set deletion until the record disappears.
    ///
    /// Only absence or `DELETE_COMPLETE` resolve the poll. A describe
    /// that races ahead of the deletion request can still report a
    /// create-terminal status; that means the deletion has not taken
    /// effect yet, so polling continues.
    ///
    /// # Errors
    ///
    /// Returns an error on `DELETE_FAILED`, transport errors, or an
    /// exhausted retry budget.
    pub async fn wait_for_change_set_deletion(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<()> {
        let mut attempts: u32 = 0;

        loop {
            let Some(change_set) = self
                .api
                .describe_change_set(stack_name, change_set_name)
                .await?
            else {
                debug!("Change set {change_set_name} no longer exists");
                return Ok(());
            };

            match change_set.status {
                ChangeSetStatus::DeleteComplete => {
                    debug!("Change set {change_set_name} reached {}", change_set.status);
                    return Ok(());
                }
                ChangeSetStatus::DeleteFailed => {
                    return Err(ChangeSetError::OperationFailed {
                        stack_name: stack_name.to_string(),
                        name: change_set_name.to_string(),
                        reason: change_set.status_reason.unwrap_or_default(),
                    }
                    .into());
                }
                _ => {}
            }

            debug!(
                "Change set {change_set_name} is {}, waiting for deletion",
                change_set.status
            );
            attempts = attempts.saturating_add(1);
            self.check_budget("change set", change_set_name, attempts)?;
            tokio::time::sleep(self.config.interval).await;
        }
    }

    fn check_budget(&self, kind: &str, name: &str, attempts: u32) -> Result<()> {
        if self.config.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(PollError::RetryBudgetExhausted {
                resource: format!("{kind} {name}"),
                attempts,
            }
            .into());
        }
        Ok(())
    }
}
