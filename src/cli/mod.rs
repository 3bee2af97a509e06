//! CLI layer for ragrelay.
//!
//! Provides the command-line interface using clap, with commands for
//! generation, embedding, grounded answers and offline sanitizing.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
