//! CLI module for the camera remote tool
//!
//! This module contains all command-line interface related code including
//! argument parsing, command definitions, and command handlers.
//!
//! # Submodules
//!
//! - `args` - Command-line argument definitions using clap
//! - `commands` - Command handler implementations
//! - `output` - Log and CLI output utilities

pub mod args;
pub mod commands;
pub mod output;

// Re-export commonly used types for convenience
pub use args::{Args, Commands, PropAction};
pub use commands::run_command;
pub use output::DualWriter;
