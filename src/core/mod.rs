//! Core functionality: configuration and error handling
//!
//! # Submodules
//!
//! - `config` - TOML configuration loading and saving
//! - `error` - Error taxonomy used throughout the crate

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{CameraError, Result};
