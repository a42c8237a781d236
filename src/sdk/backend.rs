//! Vendor SDK abstraction traits
//!
//! This module defines the seam between the session layer and the vendor
//! camera-control SDK, allowing both the real FFI-backed SDK and a mock
//! backend to be used interchangeably. This enables comprehensive testing
//! of the session/capture/live-view pipeline without a physical camera.
//!
//! # Architecture
//!
//! - `CameraSdk` - the blocking vendor surface (init, enumerate, connect,
//!   commands, properties)
//! - `DeviceEventSink` - the callback surface the vendor invokes on its own
//!   internal thread(s)
//! - `DeviceDescriptor` - an owned, copied record identifying a
//!   discoverable camera
//!
//! Implementations of `CameraSdk::enumerate` must deep-copy every field
//! they need out of the vendor's reference-counted enumeration list and
//! release that list before returning. A descriptor must never alias
//! vendor-owned memory.

use crate::core::error::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::Path;
use std::sync::Arc;

/// Opaque vendor-issued identifier for an active device connection.
///
/// Zero is never a valid handle.
pub type SdkHandle = i64;

/// Physical transport a camera is reachable over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// USB-attached camera
    #[default]
    Usb,
    /// Network-attached camera
    Ethernet,
    /// Transport not reported by the vendor
    Unknown,
}

impl ConnectionType {
    /// Human-readable name for this connection type
    pub fn display_name(&self) -> &'static str {
        match self {
            ConnectionType::Usb => "USB",
            ConnectionType::Ethernet => "Ethernet",
            ConnectionType::Unknown => "Unknown",
        }
    }
}

impl Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// An owned record identifying a discoverable camera.
///
/// Descriptors are deep copies of the fields needed for a later connect;
/// their lifetime is independent of the enumeration call that produced
/// them, and they remain usable across repeated enumerations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Camera model name (e.g. "ILCE-7M4")
    pub model: String,
    /// Transport the camera was discovered on
    pub connection: ConnectionType,
    /// Raw vendor identifier bytes (USB serial, MAC, ...)
    pub raw_id: Vec<u8>,
}

impl DeviceDescriptor {
    /// Create a descriptor from already-copied fields
    pub fn new(model: &str, connection: ConnectionType, raw_id: &[u8]) -> Self {
        Self {
            model: model.to_string(),
            connection,
            raw_id: raw_id.to_vec(),
        }
    }

    /// Stable printable id derived from the raw identifier bytes
    pub fn id_hex(&self) -> String {
        self.raw_id.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Whether the vendor SDK should re-establish dropped connections itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Vendor-side reconnection disabled
    Off,
    /// Vendor-side reconnection enabled
    #[default]
    On,
}

/// Vendor command identifiers
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    /// Shutter release actuation
    Release = 0x0001,
}

/// Vendor command parameters
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandParam {
    /// Press the shutter
    Down = 0x0001,
    /// Release the shutter
    Up = 0x0002,
}

/// Wire type of a vendor property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    U8,
    U16,
    U32,
    U64,
}

impl PropertyKind {
    /// Largest value representable in this wire type
    pub fn max_value(&self) -> u64 {
        match self {
            PropertyKind::U8 => u8::MAX as u64,
            PropertyKind::U16 => u16::MAX as u64,
            PropertyKind::U32 => u32::MAX as u64,
            PropertyKind::U64 => u64::MAX,
        }
    }
}

/// A single entry of the vendor's unordered property array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawProperty {
    /// Vendor property code
    pub code: u32,
    /// Wire type of the value
    pub kind: PropertyKind,
    /// Current (or requested) value
    pub value: u64,
}

/// Error reported by a vendor SDK call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkError {
    /// Vendor status code
    pub code: u32,
    /// Description of the failure
    pub message: String,
}

impl SdkError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (vendor code {:#06x})", self.message, self.code)
    }
}

impl std::error::Error for SdkError {}

impl SdkError {
    /// Map a connect-time failure into the session error taxonomy
    pub fn into_connect_error(self) -> CameraError {
        CameraError::Connect {
            cause: self.to_string(),
        }
    }

    /// Map a capture-time failure into the session error taxonomy
    pub fn into_capture_error(self) -> CameraError {
        CameraError::Capture {
            cause: self.to_string(),
        }
    }
}

/// Callback surface the vendor SDK invokes on its own internal thread(s).
///
/// Every method may execute concurrently with any API call on the same
/// session, including disconnect. Implementations must not block: the
/// vendor pumps all sessions' events from the same delivery path.
///
/// The payload passed to `on_live_view_frame` is only valid for the
/// duration of the call; implementations must copy it before returning.
pub trait DeviceEventSink: Send + Sync {
    /// Connection established (informational; the synchronous connect
    /// return code is authoritative)
    fn on_connected(&self);

    /// Vendor-initiated loss of connection. A zero reason means an orderly
    /// remote shutdown; anything else is an error code.
    fn on_disconnected(&self, reason: u32);

    /// One or more device properties changed
    fn on_property_changed(&self);

    /// A live-view frame is ready. `payload` is vendor-owned memory.
    fn on_live_view_frame(&self, payload: &[u8]);

    /// A captured image finished transferring to `path`
    fn on_captured_file(&self, path: &Path);

    /// Non-fatal vendor warning
    fn on_warning(&self, code: u32);

    /// Vendor error. Fails the in-flight capture if one is pending.
    fn on_error(&self, code: u32);
}

/// Blocking vendor SDK surface.
///
/// All methods except `release` may block on device I/O and must never be
/// invoked from the thread that delivers `DeviceEventSink` callbacks; doing
/// so can deadlock the SDK's internal event pump.
pub trait CameraSdk: Send + Sync {
    /// Process-wide vendor initialization. Called once by the runtime when
    /// the first session appears; implementations may establish persistent
    /// process context (e.g. pin the working directory for adapter
    /// libraries).
    fn init(&self) -> Result<(), SdkError>;

    /// Process-wide vendor teardown, called when the last session is gone
    fn release(&self);

    /// Scan for connectable devices.
    ///
    /// Returns an ordered snapshot of owned descriptors; an empty vector
    /// when no devices are present. Implementations copy all required
    /// fields out of the vendor list and release it before returning.
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, SdkError>;

    /// Open a connection to the described device.
    ///
    /// `sink` receives all asynchronous events for the returned handle
    /// until `disconnect`. A successful return code is authoritative for
    /// connection establishment.
    fn connect(
        &self,
        descriptor: &DeviceDescriptor,
        sink: Arc<dyn DeviceEventSink>,
        reconnect: ReconnectPolicy,
    ) -> Result<SdkHandle, SdkError>;

    /// Close a connection and release the vendor-side device object.
    /// The handle is invalid afterwards.
    fn disconnect(&self, handle: SdkHandle) -> Result<(), SdkError>;

    /// Send a command to the device
    fn send_command(
        &self,
        handle: SdkHandle,
        command: CommandId,
        param: CommandParam,
    ) -> Result<(), SdkError>;

    /// Fetch the device's property array (small, unordered)
    fn get_properties(&self, handle: SdkHandle) -> Result<Vec<RawProperty>, SdkError>;

    /// Write a single property value
    fn set_property(&self, handle: SdkHandle, property: RawProperty) -> Result<(), SdkError>;
}
