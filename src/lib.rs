// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackpilot
//!
//! A declarative, idempotent reconciliation toolkit for `CloudFormation` stacks.
//!
//! ## Overview
//!
//! Stackpilot wraps the `CloudFormation` and S3 control-plane APIs to bring
//! named stacks to a desired state:
//!
//! - Create, update, or change-set-review a stack from a single `upsert` call
//! - Route transform-bearing templates through change sets automatically
//! - Poll every asynchronous operation to a terminal state
//! - Empty dependent buckets (including full version history) before deletion
//! - Fall back to the provider CLI for templates the declarative API rejects
//!
//! ## Architecture
//!
//! Every decision flows through the **stack reconciler**:
//!
//! 1. **Probe**: does the stack exist? (absence is only inferred from a
//!    genuine not-found, never from transport errors)
//! 2. **Decide**: plain create/update, change-set apply, or reviewed apply
//! 3. **Poll**: wait for the provider to reach a terminal state
//!
//! ## Modules
//!
//! - [`cfn`]: `CloudFormation` data model, client seam, poller, change sets
//! - [`store`]: object-store client seam and the bucket-emptying routine
//! - [`template`]: template source resolution, transform scan, S3 staging
//! - [`reconciler`]: the upsert/delete state machine
//! - [`deploy`]: external-CLI deploy fallback
//! - [`config`]: stack manifest loading
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```yaml
//! stack: app-stack
//! template: template.json
//! parameters:
//!   Stage: prod
//! review: true
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cfn;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod reconciler;
pub mod store;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use cfn::{
    CfnClient, ChangeSetDescriptor, ChangeSetManager, ChangeSetStatus, ChangeSetType, Parameter,
    PollConfig, StackApi, StackDescriptor, StackPoller, StackStatus,
};
pub use cli::{Cli, Commands, ConsoleReviewer, OutputFormatter};
pub use config::StackManifest;
pub use deploy::CliDeployer;
pub use error::{Result, StackPilotError};
pub use reconciler::{
    ChangeSetReviewer, ReviewDecision, StackReconciler, UpsertOptions, UpsertOutcome,
};
pub use store::{BucketDrainer, ObjectStore, S3ObjectStore};
pub use template::TemplateSource;
