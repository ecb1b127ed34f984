//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stackpilot - declarative `CloudFormation` stack reconciler.
#[derive(Parser, Debug)]
#[command(name = "stackpilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// AWS profile to use.
    #[arg(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// AWS region to use.
    #[arg(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update a stack to match its template.
    Up {
        /// Stack name (may come from the manifest instead).
        stack: Option<String>,

        /// Template path or URL.
        #[arg(short, long)]
        template: Option<String>,

        /// Stack parameter, as KEY=VALUE (repeatable).
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Create a preview change set and ask before applying.
        #[arg(long)]
        review: bool,

        /// Stage a local template into this bucket first.
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Key prefix for staged templates.
        #[arg(long)]
        s3_prefix: Option<String>,

        /// Force change-set handling for transform-bearing templates.
        #[arg(long)]
        transforms: bool,

        /// Stack manifest file supplying the values above.
        #[arg(short = 'f', long = "file")]
        manifest: Option<PathBuf>,
    },

    /// Delete a stack, emptying its buckets first.
    Down {
        /// Stack name.
        stack: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show a stack's outputs.
    Outputs {
        /// Stack name.
        stack: String,
    },

    /// Deploy a template through the provider CLI (transform fallback).
    Deploy {
        /// Stack name.
        stack: String,

        /// Template path.
        #[arg(short, long)]
        template: PathBuf,

        /// Stack parameter, as KEY=VALUE (repeatable).
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_accepts_repeatable_params() {
        let cli = Cli::parse_from([
            "stackpilot",
            "up",
            "app-stack",
            "--template",
            "template.json",
            "--param",
            "Stage=prod",
            "--param",
            "Memory=512",
            "--review",
        ]);

        match cli.command {
            Commands::Up {
                stack,
                template,
                params,
                review,
                ..
            } => {
                assert_eq!(stack.as_deref(), Some("app-stack"));
                assert_eq!(template.as_deref(), Some("template.json"));
                assert_eq!(params, vec!["Stage=prod", "Memory=512"]);
                assert!(review);
            }
            _ => panic!("expected up command"),
        }
    }

    #[test]
    fn down_requires_a_stack_name() {
        assert!(Cli::try_parse_from(["stackpilot", "down"]).is_err());

        let cli = Cli::parse_from(["stackpilot", "down", "app-stack", "--yes"]);
        match cli.command {
            Commands::Down { stack, yes } => {
                assert_eq!(stack, "app-stack");
                assert!(yes);
            }
            _ => panic!("expected down command"),
        }
    }

    #[test]
    fn global_profile_and_region_are_accepted() {
        let cli = Cli::parse_from([
            "stackpilot",
            "--profile",
            "prod",
            "--region",
            "eu-west-1",
            "outputs",
            "app-stack",
        ]);
        assert_eq!(cli.profile.as_deref(), Some("prod"));
        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
    }
}
