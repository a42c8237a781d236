//! Device discovery
//!
//! Wraps vendor enumeration behind the runtime lifecycle: each scan holds
//! an SDK reference only for its own duration, so a program that only
//! lists cameras leaves the vendor torn down afterwards.

use crate::core::error::{CameraError, Result};
use crate::sdk::backend::DeviceDescriptor;
use crate::sdk::runtime::SdkRuntime;
use log::debug;
use std::sync::Arc;

pub struct DeviceDirectory {
    runtime: Arc<SdkRuntime>,
}

impl DeviceDirectory {
    pub fn new(runtime: Arc<SdkRuntime>) -> Self {
        Self { runtime }
    }

    /// Scan for connectable cameras.
    ///
    /// Returns an owned snapshot; no camera present is an empty vector,
    /// not an error. Descriptors stay valid across later scans.
    pub fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let _guard = self.runtime.acquire()?;

        let devices = self
            .runtime
            .backend()
            .enumerate()
            .map_err(|e| CameraError::Enumeration(e.to_string()))?;

        debug!("Enumeration found {} device(s)", devices.len());
        Ok(devices)
    }

    /// Pick a camera: by hex id prefix or model substring when `selector`
    /// is given, otherwise the first one found
    pub fn find(&self, selector: Option<&str>) -> Result<Option<DeviceDescriptor>> {
        let devices = self.enumerate()?;

        Ok(match selector {
            None => devices.into_iter().next(),
            Some(wanted) => devices.into_iter().find(|d| {
                d.id_hex().starts_with(&wanted.to_lowercase())
                    || d.model.to_lowercase().contains(&wanted.to_lowercase())
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::backend::ConnectionType;
    use crate::sdk::mock::{MockSdk, MockSdkConfig};

    #[test]
    fn test_empty_scan_is_ok() {
        let runtime = SdkRuntime::new(MockSdk::new());
        let directory = DeviceDirectory::new(Arc::clone(&runtime));

        assert!(directory.enumerate().unwrap().is_empty());
        // The scan's SDK reference is gone once enumerate returns
        assert_eq!(runtime.active_refs(), 0);
    }

    #[test]
    fn test_descriptors_survive_later_scans() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let runtime = SdkRuntime::new(sdk.clone());
        let directory = DeviceDirectory::new(runtime);

        let first = directory.enumerate().unwrap();
        let kept = first[0].clone();

        sdk.clear_devices();
        assert!(directory.enumerate().unwrap().is_empty());

        // Earlier snapshot unaffected by the device going away
        assert_eq!(kept.model, "ILCE-7M4");
        assert_eq!(kept.connection, ConnectionType::Usb);
    }

    #[test]
    fn test_failed_scan_maps_to_enumeration_error() {
        let sdk = MockSdk::with_config(MockSdkConfig {
            fail_enumerate: true,
            ..Default::default()
        });
        let directory = DeviceDirectory::new(SdkRuntime::new(sdk));

        assert!(matches!(
            directory.enumerate().unwrap_err(),
            CameraError::Enumeration(_)
        ));
    }

    #[test]
    fn test_find_by_model_and_id() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        sdk.push_device(DeviceDescriptor::new(
            "ZV-E10",
            ConnectionType::Usb,
            &[0xBB, 0x09],
        ));
        let directory = DeviceDirectory::new(SdkRuntime::new(sdk));

        assert_eq!(directory.find(None).unwrap().unwrap().model, "ILCE-7M4");
        assert_eq!(
            directory.find(Some("zv-e10")).unwrap().unwrap().model,
            "ZV-E10"
        );
        assert_eq!(
            directory.find(Some("bb09")).unwrap().unwrap().model,
            "ZV-E10"
        );
        assert!(directory.find(Some("nope")).unwrap().is_none());
    }
}
