//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Remote control for vendor-SDK cameras: discovery, capture, live view
/// and property access over USB or Ethernet
#[derive(Parser, Debug)]
#[command(name = "camera-remote")]
#[command(author = "Vihaan Reddy M")]
#[command(version = "1.0.0")]
#[command(about = "Control vendor-SDK cameras: list, capture, live view, properties", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Camera to use: hex id prefix or model substring (overrides config)
    #[arg(short, long, global = true)]
    pub device_id: Option<String>,

    /// Vendor SDK installation directory (overrides config)
    #[arg(long, global = true)]
    pub sdk_dir: Option<PathBuf>,

    /// Run against a simulated camera instead of real hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List connectable cameras
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect and show camera identity, state and current settings
    Info {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Trigger still capture(s) and wait for the transferred image(s)
    Capture {
        /// Number of shots to take
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Pause between shots in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,

        /// Completion timeout per shot in seconds (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Stream live-view frames
    Liveview {
        /// Stop after this many received frames (0 = until Ctrl+C)
        #[arg(short = 'n', long, default_value = "30")]
        frames: u64,

        /// Write received frames into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Read or write named camera properties
    Prop {
        #[command(subcommand)]
        action: PropAction,
    },

    /// Manage the configuration file
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\camera_remote_tool\config.toml
    /// - Linux/macOS: ~/.config/camera_remote_tool/config.toml
    Config {
        /// Show the config file path only
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (writes a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[derive(Subcommand, Debug)]
pub enum PropAction {
    /// Read one property
    Get {
        /// Property name (e.g. iso, aperture, shutter_speed)
        name: String,
    },

    /// Write one property
    Set {
        /// Property name
        name: String,

        /// Raw value to write
        value: u64,
    },

    /// Show all supported properties the camera reports
    List,
}
