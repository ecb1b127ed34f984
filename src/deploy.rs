//! External-CLI deploy fallback.
//!
//! Some transform-bearing templates cannot be applied through the
//! declarative API at all; for those the provider CLI's `deploy`
//! subcommand is invoked as a child process. Its stdout streams straight
//! through to the console, stderr is streamed and captured, and a
//! non-zero exit is still a success when stderr carries the CLI's own
//! no-changes marker.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::cfn::client::StackApi;
use crate::cfn::types::{Parameter, StackDescriptor, DEFAULT_CAPABILITIES};
use crate::error::{DeployError, Result, StackError, StackPilotError, TemplateError};

/// Stderr marker the CLI emits for a no-op deploy.
const NO_CHANGES_MARKER: &str = "No changes to deploy";

/// Deploys a template by shelling out to the provider CLI.
pub struct CliDeployer {
    /// Provider API, used to describe the stack after a deploy.
    api: Arc<dyn StackApi>,
    /// CLI program to invoke.
    program: String,
    /// Profile passed to the CLI.
    profile: String,
    /// Region passed to the CLI.
    region: String,
}

impl CliDeployer {
    /// Creates a deployer invoking the standard `aws` CLI.
    #[must_use]
    pub fn new(api: Arc<dyn StackApi>, profile: &str, region: &str) -> Self {
        Self {
            api,
            program: String::from("aws"),
            profile: profile.to_string(),
            region: region.to_string(),
        }
    }

    /// Overrides the CLI program (used by tests).
    #[must_use]
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    /// Builds the fixed argument shape of the deploy subcommand.
    fn build_args(&self, stack_name: &str, template_path: &Path, parameters: &[Parameter]) -> Vec<String> {
        let mut args = vec![
            String::from("cloudformation"),
            String::from("deploy"),
            String::from("--profile"),
            self.profile.clone(),
            String::from("--region"),
            self.region.clone(),
            String::from("--template-file"),
            template_path.display().to_string(),
            String::from("--stack-name"),
            stack_name.to_string(),
            String::from("--capabilities"),
        ];
        args.extend(DEFAULT_CAPABILITIES.iter().map(ToString::to_string));

        if !parameters.is_empty() {
            args.push(String::from("--parameter-overrides"));
            args.extend(parameters.iter().map(|p| format!("{}={}", p.key, p.value)));
        }

        args
    }

    /// Deploys the template and describes the resulting stack.
    ///
    /// Success is exit code 0, or a non-zero exit whose stderr contains
    /// the no-changes marker. All subprocess output has been streamed to
    /// the console by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] for a missing template (no
    /// subprocess is spawned), [`DeployError::CliFailed`] for a genuine
    /// deploy failure, or a provider error from the final describe.
    pub async fn deploy(
        &self,
        stack_name: &str,
        template_path: &Path,
        parameters: &[Parameter],
    ) -> Result<StackDescriptor> {
        if !template_path.is_file() {
            return Err(TemplateError::NotFound {
                path: template_path.to_path_buf(),
            }
            .into());
        }

        let args = self.build_args(stack_name, template_path, parameters);
        info!("Running {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StackPilotError::internal("child stderr was not captured"))?;

        // Stream stderr through while keeping a copy for the marker check.
        let mut captured = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = lines.next_line().await? {
            eprintln!("{line}");
            captured.push_str(&line);
            captured.push('\n');
        }

        let status = child.wait().await?;
        if !status.success() && !captured.contains(NO_CHANGES_MARKER) {
            return Err(DeployError::CliFailed {
                stack_name: stack_name.to_string(),
                exit_code: status.code(),
            }
            .into());
        }

        if !status.success() {
            debug!("Deploy of {stack_name} was a no-op");
        }

        self.api
            .describe_stack(stack_name)
            .await?
            .ok_or_else(|| {
                StackError::NotFound {
                    name: stack_name.to_string(),
                }
                .into()
            })
    }
}
