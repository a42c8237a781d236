//! Camera session layer
//!
//! Everything above the raw vendor surface: discovery, connection
//! lifecycle, capture, live view and named properties. One
//! [`CameraSession`] owns one camera connection; its components share
//! state through [`bridge::SessionShared`] and receive vendor events via
//! [`bridge::EventBridge`].

pub mod bridge;
pub mod capture;
pub mod directory;
pub mod liveview;
pub mod properties;
pub mod session;

pub use bridge::{EventBridge, SessionShared, SessionState};
pub use capture::{CaptureCoordinator, CaptureHandle, SHUTTER_SETTLE};
pub use directory::DeviceDirectory;
pub use liveview::{ChannelSink, FrameSink, LiveViewFrame, LiveViewStats, LiveViewStream};
pub use properties::{PropertyDef, PropertyStore, PROPERTY_TABLE};
pub use session::{CameraSession, DeviceInfo};
