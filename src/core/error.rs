//! Error types for the camera remote tool
//!
//! This module defines the error taxonomy used throughout the crate.
//! Recoverable conditions (`Busy`, `Property`, `Enumeration`) are returned
//! to the immediate caller; an unexpected disconnect fails only the
//! outstanding operations of the affected session.

use thiserror::Error;

/// Main error type for the camera remote tool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Vendor runtime or its native adapter libraries are unavailable.
    /// Fatal for the process's ability to use any session until the
    /// missing dependency is corrected externally.
    #[error("SDK initialization failed: {0}")]
    Init(String),

    /// The vendor enumeration call itself failed. An empty device list
    /// is not an error and is reported as an empty snapshot instead.
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    /// The vendor connect call rejected (device missing, busy, unsupported)
    #[error("Failed to connect to camera: {cause}")]
    Connect { cause: String },

    /// The operation requires a connected session
    #[error("Camera is not connected")]
    NotConnected,

    /// A capture is already in flight on this session
    #[error("Capture already in progress")]
    Busy,

    /// Shutter command failed or the vendor reported a capture error
    #[error("Capture failed: {cause}")]
    Capture { cause: String },

    /// Vendor rejected a property read or write
    #[error("Property operation rejected by device (code {code:#06x})")]
    Property { code: u32 },

    /// Property name not in the supported table
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// Property cannot be written
    #[error("Property is read-only: {0}")]
    PropertyReadOnly(String),

    /// Requested value does not fit the property's wire type
    #[error("Value {value} out of range for property {name}")]
    PropertyOutOfRange { name: String, value: u64 },

    /// Live view is already running on this session
    #[error("Live view already active")]
    LiveViewActive,

    /// The vendor reported loss of connection outside our control
    #[error("Camera disconnected unexpectedly")]
    DisconnectedUnexpectedly,

    /// General I/O error
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CameraError>;

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CameraError::Connect {
            cause: "device busy".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to connect to camera: device busy");

        let err = CameraError::Property { code: 0x501C };
        assert!(err.to_string().contains("0x501c"));

        assert_eq!(
            CameraError::Busy.to_string(),
            "Capture already in progress"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CameraError = io_err.into();
        assert!(matches!(err, CameraError::Io(_)));
    }
}
