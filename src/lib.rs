//! Camera Remote Tool Library
//!
//! A safe session layer and CLI over a vendor camera-control SDK:
//! discovery, connection lifecycle, still capture, live-view streaming
//! and named property access, with a mock backend for development
//! without hardware.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration and the error taxonomy
//! - [`sdk`] - The vendor SDK seam: backend traits, the reference-counted
//!   runtime, the mock backend, and (feature `vendor-sdk`) the FFI backend
//! - [`camera`] - The session layer: directory, session, capture,
//!   live view and properties
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use camera_remote_tool::camera::{CameraSession, DeviceDirectory};
//! use camera_remote_tool::sdk::{MockSdk, ReconnectPolicy, SdkRuntime};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = SdkRuntime::new(MockSdk::with_one_camera("ILCE-7M4"));
//!
//!     let directory = DeviceDirectory::new(Arc::clone(&runtime));
//!     let descriptor = directory.find(None)?.expect("no camera");
//!
//!     let session = CameraSession::connect(&runtime, descriptor, ReconnectPolicy::On)?;
//!     let photo = session.capture()?.wait_timeout(Duration::from_secs(30))?;
//!     println!("captured {}", photo.display());
//!
//!     session.disconnect()?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod cli;
pub mod core;
pub mod sdk;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name
pub const NAME: &str = "camera-remote";
