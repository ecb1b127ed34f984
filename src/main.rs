//! Stackpilot CLI entrypoint.
//!
//! This is the main entrypoint for the stackpilot command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use stackpilot::cfn::{CfnClient, StackApi};
use stackpilot::cli::{Cli, Commands, ConsoleReviewer, OutputFormatter};
use stackpilot::config::{load_dotenv, parse_parameter, StackManifest};
use stackpilot::deploy::CliDeployer;
use stackpilot::error::{ConfigError, Result};
use stackpilot::reconciler::{StackReconciler, UpsertOptions};
use stackpilot::store::{ObjectStore, S3ObjectStore};
use stackpilot::template::TemplateSource;

use aws_config::BehaviorVersion;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    load_dotenv();

    let formatter = OutputFormatter::new(cli.output);
    let aws = load_aws_config(cli.profile.as_deref(), cli.region.as_deref()).await;

    match cli.command {
        Commands::Up {
            stack,
            template,
            params,
            review,
            s3_bucket,
            s3_prefix,
            transforms,
            manifest,
        } => {
            // Manifest values first, CLI flags layered on top.
            let (name, template_input, mut parameters, mut options) = match manifest {
                Some(path) => {
                    let manifest = StackManifest::load_file(&path)?;
                    let name = stack.unwrap_or_else(|| manifest.stack.clone());
                    let template_input =
                        template.unwrap_or_else(|| manifest.template.clone());
                    (name, template_input, manifest.parameters(), manifest.options())
                }
                None => {
                    let name = stack.ok_or_else(|| {
                        ConfigError::invalid("a stack name is required without a manifest")
                    })?;
                    let template_input = template.ok_or_else(|| {
                        ConfigError::invalid("--template is required without a manifest")
                    })?;
                    (name, template_input, vec![], UpsertOptions::default())
                }
            };

            for param in &params {
                parameters.push(parse_parameter(param)?);
            }
            if review {
                options.review = true;
            }
            if s3_bucket.is_some() {
                options.s3_bucket = s3_bucket;
            }
            if s3_prefix.is_some() {
                options.s3_prefix = s3_prefix;
            }
            if transforms {
                options.contains_transforms = Some(true);
            }

            cmd_up(&aws, &name, &template_input, &parameters, &options, &formatter).await
        }
        Commands::Down { stack, yes } => cmd_down(&aws, &stack, yes).await,
        Commands::Outputs { stack } => cmd_outputs(&aws, &stack, &formatter).await,
        Commands::Deploy {
            stack,
            template,
            params,
        } => {
            cmd_deploy(
                &aws,
                cli.profile.as_deref(),
                cli.region.as_deref(),
                &stack,
                &template,
                &params,
                &formatter,
            )
            .await
        }
    }
}

/// Reconcile a stack to its template.
async fn cmd_up(
    aws: &aws_config::SdkConfig,
    name: &str,
    template_input: &str,
    parameters: &[stackpilot::Parameter],
    options: &UpsertOptions,
    formatter: &OutputFormatter,
) -> Result<()> {
    let reconciler = build_reconciler(aws);
    let template = TemplateSource::from_input(template_input);

    let outcome = reconciler.upsert(name, template, parameters, options).await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

/// Delete a stack after emptying its buckets.
async fn cmd_down(aws: &aws_config::SdkConfig, stack: &str, auto_approve: bool) -> Result<()> {
    // Confirm
    if !auto_approve {
        eprint!(
            "This will delete stack {stack} and empty its buckets. \
             This action is IRREVERSIBLE. Type 'delete' to confirm: "
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "delete" {
            eprintln!("Deletion cancelled.");
            return Ok(());
        }
    }

    let reconciler = build_reconciler(aws);
    reconciler.delete(stack).await?;

    eprintln!("Stack {stack} deleted.");
    Ok(())
}

/// Show a stack's outputs.
async fn cmd_outputs(
    aws: &aws_config::SdkConfig,
    stack: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let reconciler = build_reconciler(aws);
    let outputs = reconciler.describe_outputs(stack).await?;

    eprintln!("{}", formatter.format_outputs(&outputs));
    Ok(())
}

/// Deploy through the provider CLI.
async fn cmd_deploy(
    aws: &aws_config::SdkConfig,
    profile: Option<&str>,
    region: Option<&str>,
    stack: &str,
    template: &Path,
    params: &[String],
    formatter: &OutputFormatter,
) -> Result<()> {
    let profile = profile.unwrap_or("default");
    let region = region
        .map(ToString::to_string)
        .or_else(|| aws.region().map(ToString::to_string))
        .ok_or_else(|| {
            ConfigError::invalid("a region is required for CLI deploys (--region or AWS_REGION)")
        })?;

    let parameters = params
        .iter()
        .map(|p| parse_parameter(p))
        .collect::<Result<Vec<_>>>()?;

    let api: Arc<dyn StackApi> = Arc::new(CfnClient::new(aws));
    let deployer = CliDeployer::new(api, profile, &region);
    let result = deployer.deploy(stack, template, &parameters).await?;

    eprintln!("{}", formatter.format_stack(&result));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads the shared AWS configuration.
async fn load_aws_config(
    profile: Option<&str>,
    region: Option<&str>,
) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile) = profile {
        debug!("Using AWS profile: {profile}");
        loader = loader.profile_name(profile);
    }
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}

/// Wires the reconciler with production clients.
fn build_reconciler(aws: &aws_config::SdkConfig) -> StackReconciler {
    let api: Arc<dyn StackApi> = Arc::new(CfnClient::new(aws));
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(aws));
    StackReconciler::new(api, store, Arc::new(ConsoleReviewer::new()))
}
