//! `CloudFormation` data model.
//!
//! This module defines the crate-owned types for stacks and change sets.
//! The SDK-backed client maps provider responses into these types so that
//! everything above the [`super::client::StackApi`] seam is testable
//! against scripted fakes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capabilities requested on every create/update call.
pub const DEFAULT_CAPABILITIES: [&str; 2] = ["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

/// A described stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDescriptor {
    /// Stack name.
    pub name: String,
    /// Provider-assigned stack id, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    /// Current status.
    pub status: StackStatus,
    /// Status reason, if the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Output key/value mapping.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Parameters the stack was last deployed with.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// Stack status enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    /// Create in progress.
    CreateInProgress,
    /// Create succeeded.
    CreateComplete,
    /// Create failed.
    CreateFailed,
    /// Rollback in progress.
    RollbackInProgress,
    /// Rollback finished (terminal create failure).
    RollbackComplete,
    /// Rollback failed.
    RollbackFailed,
    /// Update in progress.
    UpdateInProgress,
    /// Update cleanup in progress.
    UpdateCompleteCleanupInProgress,
    /// Update succeeded.
    UpdateComplete,
    /// Update failed.
    UpdateFailed,
    /// Update rollback in progress.
    UpdateRollbackInProgress,
    /// Update rollback cleanup in progress.
    UpdateRollbackCompleteCleanupInProgress,
    /// Update rollback finished (terminal update failure).
    UpdateRollbackComplete,
    /// Delete in progress.
    DeleteInProgress,
    /// Delete succeeded.
    DeleteComplete,
    /// Delete failed.
    DeleteFailed,
    /// Stack created via change set, awaiting execution.
    ReviewInProgress,
    /// Unrecognized status.
    #[default]
    Unknown,
}

impl StackStatus {
    /// Parses a provider status string.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "CREATE_FAILED" => Self::CreateFailed,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "ROLLBACK_FAILED" => Self::RollbackFailed,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => Self::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => Self::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                Self::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => Self::UpdateRollbackComplete,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "REVIEW_IN_PROGRESS" => Self::ReviewInProgress,
            _ => Self::Unknown,
        }
    }

    /// Whether this status terminates polling successfully.
    #[must_use]
    pub const fn is_terminal_success(self) -> bool {
        matches!(self, Self::CreateComplete | Self::UpdateComplete)
    }

    /// Whether this status terminates polling as an operation failure.
    #[must_use]
    pub const fn is_terminal_failure(self) -> bool {
        matches!(
            self,
            Self::RollbackComplete
                | Self::CreateFailed
                | Self::UpdateFailed
                | Self::DeleteFailed
                | Self::UpdateRollbackComplete
        )
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{status}")
    }
}

/// A described change set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSetDescriptor {
    /// Stack the change set targets.
    pub stack_name: String,
    /// Change-set name.
    pub name: String,
    /// CREATE or UPDATE.
    pub change_set_type: ChangeSetType,
    /// Current status.
    pub status: ChangeSetStatus,
    /// Status reason, if the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Proposed resource changes.
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
}

/// A single proposed resource change within a change set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Add, Modify, or Remove.
    pub action: String,
    /// Logical resource id within the template.
    pub logical_id: String,
    /// Provider resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

/// Change-set type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetType {
    /// Creates a new stack on execution.
    Create,
    /// Updates an existing stack on execution.
    Update,
}

impl ChangeSetType {
    /// The provider wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
        }
    }
}

/// Change-set status enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetStatus {
    /// Creation queued.
    CreatePending,
    /// Creation in progress.
    CreateInProgress,
    /// Created and ready to execute.
    CreateComplete,
    /// Updated (terminal).
    UpdateComplete,
    /// Deletion queued.
    DeletePending,
    /// Deletion in progress.
    DeleteInProgress,
    /// Deleted (terminal).
    DeleteComplete,
    /// Deletion failed.
    DeleteFailed,
    /// Execution in progress.
    ExecuteInProgress,
    /// Executed.
    ExecuteComplete,
    /// Execution failed.
    ExecuteFailed,
    /// Terminal failure; the reason may still indicate a no-op.
    Failed,
    /// Unrecognized status.
    #[default]
    Unknown,
}

impl ChangeSetStatus {
    /// Parses a provider status string.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "CREATE_PENDING" => Self::CreatePending,
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "DELETE_PENDING" => Self::DeletePending,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "EXECUTE_IN_PROGRESS" => Self::ExecuteInProgress,
            "EXECUTE_COMPLETE" => Self::ExecuteComplete,
            "EXECUTE_FAILED" => Self::ExecuteFailed,
            "FAILED" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Whether this status terminates change-set polling successfully.
    #[must_use]
    pub const fn is_terminal_success(self) -> bool {
        matches!(
            self,
            Self::CreateComplete | Self::UpdateComplete | Self::DeleteComplete
        )
    }
}

impl std::fmt::Display for ChangeSetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::CreatePending => "CREATE_PENDING",
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::DeletePending => "DELETE_PENDING",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::ExecuteInProgress => "EXECUTE_IN_PROGRESS",
            Self::ExecuteComplete => "EXECUTE_COMPLETE",
            Self::ExecuteFailed => "EXECUTE_FAILED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{status}")
    }
}

/// A stack parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: String,
}

impl Parameter {
    /// Creates a parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Where a resolved template lives: an inline body or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLocation {
    /// Inline template body.
    Body(String),
    /// Remote template URL.
    Url(String),
}

/// Input for a create-stack or update-stack call.
#[derive(Debug, Clone)]
pub struct StackOperationInput {
    /// Stack name.
    pub stack_name: String,
    /// Resolved template.
    pub template: TemplateLocation,
    /// Stack parameters.
    pub parameters: Vec<Parameter>,
    /// Capability flags.
    pub capabilities: Vec<String>,
    /// Whether to disable automatic rollback (create only; keeps failure
    /// artifacts inspectable).
    pub disable_rollback: bool,
}

impl StackOperationInput {
    /// Creates an input with the default capabilities.
    #[must_use]
    pub fn new(stack_name: &str, template: TemplateLocation, parameters: &[Parameter]) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            template,
            parameters: parameters.to_vec(),
            capabilities: DEFAULT_CAPABILITIES.iter().map(ToString::to_string).collect(),
            disable_rollback: false,
        }
    }

    /// Disables automatic rollback.
    #[must_use]
    pub fn with_rollback_disabled(mut self) -> Self {
        self.disable_rollback = true;
        self
    }
}

/// Input for a create-change-set call.
#[derive(Debug, Clone)]
pub struct ChangeSetInput {
    /// Stack name.
    pub stack_name: String,
    /// Change-set name.
    pub change_set_name: String,
    /// CREATE or UPDATE.
    pub change_set_type: ChangeSetType,
    /// Resolved template.
    pub template: TemplateLocation,
    /// Stack parameters.
    pub parameters: Vec<Parameter>,
    /// Capability flags.
    pub capabilities: Vec<String>,
}

impl ChangeSetInput {
    /// Creates an input with the default capabilities.
    #[must_use]
    pub fn new(
        stack_name: &str,
        change_set_name: &str,
        change_set_type: ChangeSetType,
        template: TemplateLocation,
        parameters: &[Parameter],
    ) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            change_set_name: change_set_name.to_string(),
            change_set_type,
            template,
            parameters: parameters.to_vec(),
            capabilities: DEFAULT_CAPABILITIES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Outcome of dispatching a direct update-stack call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDispatch {
    /// The update was accepted and is now in progress.
    Started,
    /// The provider reported nothing to update.
    NoChanges,
}

impl ChangeSetDescriptor {
    /// Whether the change set proposes at least one resource change.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_status_round_trips_through_parse() {
        for status in [
            "CREATE_COMPLETE",
            "UPDATE_ROLLBACK_COMPLETE",
            "DELETE_IN_PROGRESS",
            "REVIEW_IN_PROGRESS",
        ] {
            assert_eq!(StackStatus::parse(status).to_string(), status);
        }
    }

    #[test]
    fn unknown_stack_status_does_not_panic() {
        assert_eq!(StackStatus::parse("IMPORT_IN_PROGRESS"), StackStatus::Unknown);
    }

    #[test]
    fn terminal_failure_set_matches_contract() {
        for status in [
            StackStatus::RollbackComplete,
            StackStatus::CreateFailed,
            StackStatus::UpdateFailed,
            StackStatus::DeleteFailed,
            StackStatus::UpdateRollbackComplete,
        ] {
            assert!(status.is_terminal_failure());
            assert!(!status.is_terminal_success());
        }
    }

    #[test]
    fn in_progress_statuses_are_not_terminal() {
        for status in [
            StackStatus::CreateInProgress,
            StackStatus::UpdateInProgress,
            StackStatus::DeleteInProgress,
            StackStatus::UpdateCompleteCleanupInProgress,
        ] {
            assert!(!status.is_terminal_success());
            assert!(!status.is_terminal_failure());
        }
    }

    #[test]
    fn change_set_success_set_matches_contract() {
        assert!(ChangeSetStatus::CreateComplete.is_terminal_success());
        assert!(ChangeSetStatus::UpdateComplete.is_terminal_success());
        assert!(ChangeSetStatus::DeleteComplete.is_terminal_success());
        assert!(!ChangeSetStatus::Failed.is_terminal_success());
        assert!(!ChangeSetStatus::CreateInProgress.is_terminal_success());
    }
}
