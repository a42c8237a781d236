//! Vendor SDK layer
//!
//! This module owns everything that talks to the vendor camera SDK:
//!
//! - `backend` - the `CameraSdk`/`DeviceEventSink` trait seam
//! - `runtime` - reference-counted process-wide init/teardown
//! - `mock` - scriptable mock backend for tests and `--simulate`
//! - `ffi` - the real FFI backend (requires the `vendor-sdk` feature)
//!
//! The session layer in [`crate::camera`] never calls the vendor
//! directly; everything goes through a `CameraSdk` implementation, so the
//! whole pipeline runs unchanged against mock hardware.

pub mod backend;
#[cfg(feature = "vendor-sdk")]
pub mod ffi;
pub mod mock;
pub mod runtime;

pub use backend::{
    CameraSdk, CommandId, CommandParam, ConnectionType, DeviceDescriptor, DeviceEventSink,
    PropertyKind, RawProperty, ReconnectPolicy, SdkError, SdkHandle,
};
pub use mock::{MockSdk, MockSdkConfig};
pub use runtime::{RuntimeGuard, SdkRuntime};

#[cfg(feature = "vendor-sdk")]
pub use ffi::CrSdk;
