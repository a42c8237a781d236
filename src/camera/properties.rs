//! Named device properties
//!
//! The vendor exposes device settings as an unordered array of
//! code/value records. This module maps a small table of stable property
//! names onto those codes and validates writes against the property's
//! wire type before they reach the device.

use crate::camera::bridge::SessionShared;
use crate::core::error::{CameraError, Result};
use crate::sdk::backend::{CameraSdk, PropertyKind, RawProperty};
use log::debug;
use std::sync::Arc;

/// Vendor property codes
pub mod codes {
    pub const APERTURE: u32 = 0x5007;
    pub const WHITE_BALANCE: u32 = 0x5005;
    pub const FOCUS_MODE: u32 = 0x500A;
    pub const SHUTTER_SPEED: u32 = 0x500D;
    pub const EXPOSURE_PROGRAM: u32 = 0x500E;
    pub const ISO: u32 = 0x500F;
    /// Vendor-specific toggle that starts/stops live-view frame delivery
    pub const LIVE_VIEW_ENABLE: u32 = 0xD6A0;
    /// BCD-encoded firmware revision word
    pub const FIRMWARE_VERSION: u32 = 0xD203;
}

/// One row of the supported-property table
#[derive(Debug, Clone, Copy)]
pub struct PropertyDef {
    pub name: &'static str,
    pub code: u32,
    pub kind: PropertyKind,
    pub writable: bool,
}

/// Properties exposed by name. `live_view_status` reflects the live-view
/// toggle but is only written through [`crate::camera::LiveViewStream`].
pub const PROPERTY_TABLE: &[PropertyDef] = &[
    PropertyDef {
        name: "iso",
        code: codes::ISO,
        kind: PropertyKind::U32,
        writable: true,
    },
    PropertyDef {
        name: "aperture",
        code: codes::APERTURE,
        kind: PropertyKind::U16,
        writable: true,
    },
    PropertyDef {
        name: "shutter_speed",
        code: codes::SHUTTER_SPEED,
        kind: PropertyKind::U32,
        writable: true,
    },
    PropertyDef {
        name: "white_balance",
        code: codes::WHITE_BALANCE,
        kind: PropertyKind::U16,
        writable: true,
    },
    PropertyDef {
        name: "exposure_program",
        code: codes::EXPOSURE_PROGRAM,
        kind: PropertyKind::U16,
        writable: true,
    },
    PropertyDef {
        name: "focus_mode",
        code: codes::FOCUS_MODE,
        kind: PropertyKind::U16,
        writable: true,
    },
    PropertyDef {
        name: "live_view_status",
        code: codes::LIVE_VIEW_ENABLE,
        kind: PropertyKind::U8,
        writable: false,
    },
    PropertyDef {
        name: "firmware_version",
        code: codes::FIRMWARE_VERSION,
        kind: PropertyKind::U16,
        writable: false,
    },
];

/// Look up a property definition by name
pub fn lookup(name: &str) -> Option<&'static PropertyDef> {
    PROPERTY_TABLE.iter().find(|def| def.name == name)
}

/// Name-based view over a connected session's vendor properties
pub struct PropertyStore {
    backend: Arc<dyn CameraSdk>,
    shared: Arc<SessionShared>,
}

impl PropertyStore {
    pub(crate) fn new(backend: Arc<dyn CameraSdk>, shared: Arc<SessionShared>) -> Self {
        Self { backend, shared }
    }

    /// Read one property by name.
    ///
    /// Returns `Ok(None)` when the device does not report the property or
    /// the session is no longer connected; an unknown name is an error.
    pub fn get(&self, name: &str) -> Result<Option<u64>> {
        let def = lookup(name).ok_or_else(|| CameraError::UnknownProperty(name.to_string()))?;

        let Some(handle) = self.shared.handle_if_valid() else {
            return Ok(None);
        };

        let properties = self
            .backend
            .get_properties(handle)
            .map_err(|_| CameraError::Property { code: def.code })?;

        Ok(properties
            .iter()
            .find(|p| p.code == def.code)
            .map(|p| p.value))
    }

    /// Snapshot every named property the device currently reports
    pub fn get_all(&self) -> Result<Vec<(&'static str, u64)>> {
        let Some(handle) = self.shared.handle_if_valid() else {
            return Ok(Vec::new());
        };

        let properties = self
            .backend
            .get_properties(handle)
            .map_err(|e| CameraError::Property { code: e.code })?;

        Ok(PROPERTY_TABLE
            .iter()
            .filter_map(|def| {
                properties
                    .iter()
                    .find(|p| p.code == def.code)
                    .map(|p| (def.name, p.value))
            })
            .collect())
    }

    /// Write one property by name.
    ///
    /// The value is range-checked against the property's wire type before
    /// any vendor call; a device rejection surfaces as
    /// [`CameraError::Property`].
    pub fn set(&self, name: &str, value: u64) -> Result<()> {
        let def = lookup(name).ok_or_else(|| CameraError::UnknownProperty(name.to_string()))?;

        if !def.writable {
            return Err(CameraError::PropertyReadOnly(name.to_string()));
        }
        if value > def.kind.max_value() {
            return Err(CameraError::PropertyOutOfRange {
                name: name.to_string(),
                value,
            });
        }

        let handle = self.shared.connected_handle()?;

        debug!("Setting {} ({:#06x}) = {}", name, def.code, value);
        self.backend
            .set_property(
                handle,
                RawProperty {
                    code: def.code,
                    kind: def.kind,
                    value,
                },
            )
            .map_err(|_| CameraError::Property { code: def.code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(lookup("iso").unwrap().code, codes::ISO);
        assert_eq!(lookup("aperture").unwrap().code, codes::APERTURE);
        assert!(lookup("bokeh_amount").is_none());
    }

    #[test]
    fn test_table_names_are_unique() {
        for (i, a) in PROPERTY_TABLE.iter().enumerate() {
            for b in &PROPERTY_TABLE[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.code, b.code);
            }
        }
    }
}
