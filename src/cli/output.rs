//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying stack
//! outcomes to the user, plus the console change-set reviewer.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;

use async_trait::async_trait;
use colored::Colorize;
use tabled::{Table, Tabled};

use crate::cfn::types::{ChangeSetDescriptor, StackDescriptor};
use crate::error::Result;
use crate::reconciler::{ChangeSetReviewer, ReviewDecision, UpsertOutcome};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Stack output row for table display.
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Proposed change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Type")]
    resource_type: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an upsert outcome for display.
    #[must_use]
    pub fn format_outcome(&self, outcome: &UpsertOutcome) -> String {
        match self.format {
            OutputFormat::Json => match outcome.stack() {
                Some(stack) => serde_json::to_string_pretty(stack).unwrap_or_default(),
                None => serde_json::json!({ "status": "no-changes" }).to_string(),
            },
            OutputFormat::Text => Self::format_outcome_text(outcome),
        }
    }

    /// Formats an outcome as text.
    fn format_outcome_text(outcome: &UpsertOutcome) -> String {
        match outcome {
            UpsertOutcome::Applied(stack) => {
                let mut output = format!(
                    "{} Stack {} is {}\n",
                    "✓".green(),
                    stack.name,
                    stack.status
                );
                if !stack.outputs.is_empty() {
                    output.push('\n');
                    output.push_str(&Self::outputs_table(&stack.outputs));
                    output.push('\n');
                }
                output
            }
            UpsertOutcome::NoChanges(_) => format!(
                "{} No changes required - stack is up to date.\n",
                "✓".green()
            ),
        }
    }

    /// Formats a terminal stack descriptor.
    #[must_use]
    pub fn format_stack(&self, stack: &StackDescriptor) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(stack).unwrap_or_default(),
            OutputFormat::Text => {
                Self::format_outcome_text(&UpsertOutcome::Applied(stack.clone()))
            }
        }
    }

    /// Formats an output key/value mapping.
    #[must_use]
    pub fn format_outputs(&self, outputs: &BTreeMap<String, String>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outputs).unwrap_or_default(),
            OutputFormat::Text => {
                if outputs.is_empty() {
                    return String::from("No outputs.\n");
                }
                let mut text = Self::outputs_table(outputs);
                text.push('\n');
                text
            }
        }
    }

    /// Renders outputs as a table.
    fn outputs_table(outputs: &BTreeMap<String, String>) -> String {
        let rows: Vec<OutputRow> = outputs
            .iter()
            .map(|(key, value)| OutputRow {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        Table::new(rows).to_string()
    }
}

/// Interactive reviewer prompting on the terminal.
///
/// Presented change sets have already been deleted; the decision only
/// controls whether the update proceeds.
#[derive(Debug, Default)]
pub struct ConsoleReviewer;

impl ConsoleReviewer {
    /// Creates a console reviewer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChangeSetReviewer for ConsoleReviewer {
    async fn review(&self, change_set: &ChangeSetDescriptor) -> Result<ReviewDecision> {
        let rows: Vec<ChangeRow> = change_set
            .changes
            .iter()
            .map(|change| ChangeRow {
                action: change.action.clone(),
                resource: change.logical_id.clone(),
                resource_type: change
                    .resource_type
                    .clone()
                    .unwrap_or_else(|| String::from("-")),
            })
            .collect();

        let mut prompt = format!(
            "\nProposed changes for stack {}:\n\n",
            change_set.stack_name
        );
        let _ = write!(prompt, "{}\n\n", Table::new(rows));
        eprintln!("{prompt}");

        eprint!("Apply these changes? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim().eq_ignore_ascii_case("y") {
            Ok(ReviewDecision::Approved)
        } else {
            Ok(ReviewDecision::Rejected)
        }
    }
}
