//! Change-set lifecycle management.
//!
//! Creates, executes, and deletes change sets, polling each operation to
//! a terminal state. A change set that resolves to "contained no changes"
//! is a successful no-op (`None`), never an error; callers use the
//! populated/empty distinction to decide whether to proceed.

use std::sync::Arc;

use tracing::info;

use crate::error::{Result, StackError};

use super::client::StackApi;
use super::poller::{PollConfig, StackPoller};
use super::types::{ChangeSetDescriptor, ChangeSetInput, StackDescriptor};

/// Manager for change-set create/execute/delete flows.
pub struct ChangeSetManager {
    /// Provider API.
    api: Arc<dyn StackApi>,
    /// Shared poller.
    poller: StackPoller,
}

impl ChangeSetManager {
    /// Creates a manager polling with the given configuration.
    #[must_use]
    pub fn new(api: Arc<dyn StackApi>, poll_config: PollConfig) -> Self {
        let poller = StackPoller::new(Arc::clone(&api)).with_config(poll_config);
        Self { api, poller }
    }

    /// Submits a change-set creation request and polls it to terminal.
    ///
    /// Returns `None` when the change set resolved as a no-op (it
    /// contained no changes); `Some` descriptors are ready to execute.
    ///
    /// # Errors
    ///
    /// Returns an error if creation is rejected or the change set fails
    /// for a reason that is not a recognized no-op.
    pub async fn create(&self, input: &ChangeSetInput) -> Result<Option<ChangeSetDescriptor>> {
        self.api.create_change_set(input).await?;

        let resolved = self
            .poller
            .wait_for_change_set(&input.stack_name, &input.change_set_name)
            .await?;

        // Describe does not echo the type; carry it over from the request.
        Ok(resolved.map(|mut change_set| {
            change_set.change_set_type = input.change_set_type;
            change_set
        }))
    }

    /// Executes a change set and polls the *stack* (not the change set)
    /// to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error if execution is rejected or the stack reaches a
    /// terminal failure status.
    pub async fn execute(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<StackDescriptor> {
        self.api
            .execute_change_set(stack_name, change_set_name)
            .await?;

        self.poller
            .wait_for_stack(stack_name)
            .await?
            .ok_or_else(|| {
                StackError::NotFound {
                    name: stack_name.to_string(),
                }
                .into()
            })
    }

    /// Requests deletion of a change set and polls until it disappears.
    ///
    /// An already-missing change set resolves successfully. A describe
    /// still reporting a create-terminal status keeps the poll waiting;
    /// only absence or `DELETE_COMPLETE` counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion request is rejected or the
    /// change set ends in `DELETE_FAILED`.
    pub async fn delete(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        self.api
            .delete_change_set(stack_name, change_set_name)
            .await?;

        self.poller
            .wait_for_change_set_deletion(stack_name, change_set_name)
            .await?;

        info!("Change set {change_set_name} on stack {stack_name} deleted");
        Ok(())
    }
}
