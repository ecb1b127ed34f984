//! Error types for the stackpilot toolkit.
//!
//! This module provides a comprehensive error hierarchy for all operations
//! in the stack lifecycle: template handling, `CloudFormation` calls,
//! change-set management, object-store draining, polling, and the
//! external-CLI deploy fallback.

use std::path::PathBuf;
use thiserror::Error;

use crate::cfn::types::StackDescriptor;

/// The main error type for the stackpilot toolkit.
#[derive(Debug, Error)]
pub enum StackPilotError {
    /// Template resolution errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Stack API errors.
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Change-set errors.
    #[error("Change set error: {0}")]
    ChangeSet(#[from] ChangeSetError),

    /// Object-store errors.
    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    /// Polling errors.
    #[error("Polling error: {0}")]
    Poll(#[from] PollError),

    /// External-CLI deploy errors.
    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Manifest/configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Template resolution errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template path does not resolve to an existing file.
    #[error("Template not found: {path}")]
    NotFound {
        /// Path to the missing template.
        path: PathBuf,
    },

    /// The template file could not be read.
    #[error("Failed to read template {path}: {message}")]
    Unreadable {
        /// Path to the unreadable template.
        path: PathBuf,
        /// Description of the read failure.
        message: String,
    },
}

/// Stack API errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// The stack does not exist.
    #[error("Stack not found: {name}")]
    NotFound {
        /// Name of the missing stack.
        name: String,
    },

    /// A stack operation reached a terminal failure status.
    ///
    /// Carries the full stack descriptor for diagnostics.
    #[error("Stack operation failed: {} is {} ({})",
        stack.name,
        stack.status,
        stack.status_reason.as_deref().unwrap_or("no reason given"))]
    OperationFailed {
        /// The terminal stack descriptor.
        stack: Box<StackDescriptor>,
    },

    /// Transport, auth, or throttling error from the provider API.
    ///
    /// Propagated unchanged; retry is left to the SDK's own policy.
    #[error("CloudFormation API error: {message}")]
    Api {
        /// Description of the API error.
        message: String,
    },
}

/// Change-set errors.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// A change set reached a terminal failure status that is not a
    /// recognized no-op.
    #[error("Change set {name} on stack {stack_name} failed: {reason}")]
    OperationFailed {
        /// Stack the change set targets.
        stack_name: String,
        /// Change-set name.
        name: String,
        /// Status reason reported by the provider.
        reason: String,
    },
}

/// Object-store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bucket does not exist.
    ///
    /// Benign during emptying: nothing to drain.
    #[error("Bucket not found: {bucket}")]
    BucketNotFound {
        /// Name of the missing bucket.
        bucket: String,
    },

    /// Transport or service error from the object-store API.
    #[error("S3 API error: {message}")]
    Api {
        /// Description of the API error.
        message: String,
    },

    /// A batched delete call partially failed.
    #[error("Batch delete in bucket {bucket} failed for {failed} object(s): {message}")]
    BatchDeleteFailed {
        /// Bucket the delete targeted.
        bucket: String,
        /// Number of objects that failed to delete.
        failed: usize,
        /// First reported failure.
        message: String,
    },
}

/// Polling errors.
#[derive(Debug, Error)]
pub enum PollError {
    /// The caller-supplied retry budget was exhausted before a terminal
    /// state was observed.
    #[error("Retry budget exhausted after {attempts} attempts polling {resource}")]
    RetryBudgetExhausted {
        /// Resource being polled.
        resource: String,
        /// Number of attempts made.
        attempts: u32,
    },
}

/// External-CLI deploy errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The CLI deploy subcommand exited non-zero without the
    /// no-changes marker on stderr.
    #[error("Stack deploy failed for {stack_name} (exit code: {})",
        exit_code.map_or_else(|| String::from("killed by signal"), |c| c.to_string()))]
    CliFailed {
        /// Stack the deploy targeted.
        stack_name: String,
        /// Exit code of the subprocess, if any.
        exit_code: Option<i32>,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The operator rejected the preview change set.
    ///
    /// The preview change set has already been deleted; no mutation
    /// was applied.
    #[error("Change set {change_set} for stack {stack_name} rejected by reviewer")]
    ReviewRejected {
        /// Stack the preview targeted.
        stack_name: String,
        /// Name of the (already deleted) preview change set.
        change_set: String,
    },
}

/// Manifest/configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest file could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// A CLI or manifest value is invalid.
    #[error("Invalid configuration value: {message}")]
    Invalid {
        /// Description of the invalid value.
        message: String,
    },
}

/// Recognized reasons for which the provider reports "nothing to do".
///
/// `CloudFormation` only exposes these as message text, so detection
/// falls back to substring matching against a closed set of reasons.
/// A match is always resolved as success-with-no-op, never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// Direct update rejected with "No updates are to be performed".
    NoUpdatesToPerform,
    /// Change set failed with "The submitted information didn't contain
    /// changes".
    NoChangesInChangeSet,
}

impl NoOpReason {
    /// Matches provider reason text against the recognized no-op reasons.
    #[must_use]
    pub fn detect(reason: &str) -> Option<Self> {
        let reason = reason.to_ascii_lowercase();
        if reason.contains("no updates are to be performed") {
            Some(Self::NoUpdatesToPerform)
        } else if reason.contains("didn't contain changes") {
            Some(Self::NoChangesInChangeSet)
        } else {
            None
        }
    }
}

/// Result type alias for stackpilot operations.
pub type Result<T> = std::result::Result<T, StackPilotError>;

impl StackPilotError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl StackError {
    /// Creates an API error with the given message.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Creates an API error with the given message.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Creates an invalid-value error with the given message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_no_updates_reason() {
        let reason = "No updates are to be performed.";
        assert_eq!(
            NoOpReason::detect(reason),
            Some(NoOpReason::NoUpdatesToPerform)
        );
    }

    #[test]
    fn detects_empty_change_set_reason() {
        let reason =
            "The submitted information didn't contain changes. Submit different information.";
        assert_eq!(
            NoOpReason::detect(reason),
            Some(NoOpReason::NoChangesInChangeSet)
        );
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(
            NoOpReason::detect("NO UPDATES ARE TO BE PERFORMED"),
            Some(NoOpReason::NoUpdatesToPerform)
        );
    }

    #[test]
    fn unrelated_failure_is_not_a_no_op() {
        assert_eq!(NoOpReason::detect("Access Denied"), None);
        assert_eq!(NoOpReason::detect("Rate exceeded"), None);
    }
}
