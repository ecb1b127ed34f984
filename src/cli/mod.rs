//! Command-line interface.

pub mod commands;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::{ConsoleReviewer, OutputFormatter};
