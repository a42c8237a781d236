//! Camera session lifecycle
//!
//! A [`CameraSession`] owns one vendor connection from connect to
//! disconnect. It holds an SDK runtime reference for its whole life, the
//! event bridge the vendor calls back into, and the per-session
//! components (capture, live view, properties) that share its state.
//!
//! Disconnect is idempotent: the handle is surrendered exactly once, and
//! a connection the vendor already reported gone is never released a
//! second time.

use crate::camera::bridge::{EventBridge, SessionShared, SessionState};
use crate::camera::capture::{CaptureCoordinator, CaptureHandle};
use crate::camera::liveview::LiveViewStream;
use crate::camera::properties::PropertyStore;
use crate::core::error::{CameraError, Result};
use crate::sdk::backend::{CameraSdk, ConnectionType, DeviceDescriptor, ReconnectPolicy};
use crate::sdk::runtime::{RuntimeGuard, SdkRuntime};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Snapshot of a session's identity and state, shaped for display
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub model: String,
    /// Printable serial derived from the raw vendor identifier
    pub serial: String,
    pub connection: ConnectionType,
    /// Firmware revision, when the camera reports one
    pub firmware: Option<String>,
    pub state: SessionState,
    pub connected: bool,
}

/// An open (or once-open) connection to a single camera
pub struct CameraSession {
    backend: Arc<dyn CameraSdk>,
    shared: Arc<SessionShared>,
    descriptor: DeviceDescriptor,
    coordinator: CaptureCoordinator,
    live_view: LiveViewStream,
    properties: PropertyStore,
    _guard: RuntimeGuard,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl CameraSession {
    /// Connect to the described camera.
    ///
    /// Initializes the vendor runtime if this is the first session. The
    /// synchronous vendor return code decides success; the event bridge
    /// is registered before the connect call so no early callback is
    /// lost. On failure the runtime reference is released again.
    pub fn connect(
        runtime: &Arc<SdkRuntime>,
        descriptor: DeviceDescriptor,
        reconnect: ReconnectPolicy,
    ) -> Result<Self> {
        let guard = runtime.acquire()?;
        let backend = runtime.backend();

        let shared = SessionShared::new();
        shared.set_state(SessionState::Connecting);

        let bridge = Arc::new(EventBridge::new(
            Arc::clone(&shared),
            descriptor.model.clone(),
        ));

        info!("Connecting to {} ({})", descriptor.model, descriptor.connection);
        let handle = backend
            .connect(&descriptor, bridge, reconnect)
            .map_err(|e| {
                shared.set_state(SessionState::Disconnected);
                e.into_connect_error()
            })?;

        shared.mark_connected(handle);
        info!("Connected to {}", descriptor.model);

        Ok(Self {
            coordinator: CaptureCoordinator::new(Arc::clone(&backend), Arc::clone(&shared)),
            live_view: LiveViewStream::new(Arc::clone(&backend), Arc::clone(&shared)),
            properties: PropertyStore::new(Arc::clone(&backend), Arc::clone(&shared)),
            backend,
            shared,
            descriptor,
            _guard: guard,
        })
    }

    /// The descriptor this session was opened with
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether device operations are currently possible
    pub fn is_connected(&self) -> bool {
        self.shared.state() == SessionState::Connected
    }

    /// Identity and state snapshot
    pub fn info(&self) -> DeviceInfo {
        let state = self.shared.state();

        // Vendor encodes the revision as BCD major/minor in one word
        let firmware = self
            .properties
            .get("firmware_version")
            .ok()
            .flatten()
            .map(|word| format!("{:x}.{:02x}", (word >> 8) & 0xFF, word & 0xFF));

        DeviceInfo {
            model: self.descriptor.model.clone(),
            serial: self.descriptor.id_hex(),
            connection: self.descriptor.connection,
            firmware,
            state,
            connected: state == SessionState::Connected,
        }
    }

    /// Trigger a capture; see [`CaptureCoordinator::capture`]
    pub fn capture(&self) -> Result<CaptureHandle> {
        self.coordinator.capture()
    }

    /// Live-view control for this session
    pub fn live_view(&self) -> &LiveViewStream {
        &self.live_view
    }

    /// Named property access for this session
    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Close the connection.
    ///
    /// Safe to call repeatedly; only the first call after a successful
    /// connect releases the vendor-side handle, and none is released if
    /// the vendor already reported the connection gone. A capture still
    /// pending fails with [`CameraError::Capture`].
    pub fn disconnect(&self) -> Result<()> {
        let taken = {
            let mut core = self.shared.core.lock().unwrap();
            let handle = core.handle.take();
            core.state = if handle.is_some() {
                SessionState::Disconnecting
            } else {
                SessionState::Disconnected
            };
            handle
        };

        self.shared.finish_pending(Err(CameraError::Capture {
            cause: "session disconnected".to_string(),
        }));
        {
            let mut live = self.shared.live.lock().unwrap();
            live.active = false;
            live.sink = None;
        }

        let Some(handle) = taken else {
            return Ok(());
        };

        // Only release if the vendor has not already torn the connection
        // down from its side
        if self.shared.valid.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.backend.disconnect(handle) {
                warn!("{}: vendor disconnect failed: {}", self.descriptor.model, e);
            } else {
                info!("Disconnected from {}", self.descriptor.model);
            }
        }

        self.shared.set_state(SessionState::Disconnected);
        Ok(())
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::capture::SHUTTER_SETTLE;
    use crate::camera::liveview::ChannelSink;
    use crate::camera::properties::codes;
    use crate::sdk::backend::{CommandId, CommandParam, PropertyKind, RawProperty};
    use crate::sdk::mock::{MockSdk, MockSdkConfig};
    use std::time::Duration;

    fn connected(sdk: &Arc<MockSdk>) -> (Arc<SdkRuntime>, CameraSession) {
        let runtime = SdkRuntime::new(sdk.clone());
        let descriptor = sdk.enumerate().unwrap().remove(0);
        let session = CameraSession::connect(&runtime, descriptor, ReconnectPolicy::On).unwrap();
        (runtime, session)
    }

    #[test]
    fn test_connect_and_disconnect() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (runtime, session) = connected(&sdk);

        assert!(session.is_connected());
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(sdk.connection_count(), 1);
        assert_eq!(runtime.active_refs(), 1);

        session.disconnect().unwrap();
        assert!(!session.is_connected());
        assert_eq!(sdk.connection_count(), 0);

        drop(session);
        assert_eq!(runtime.active_refs(), 0);
        assert_eq!(sdk.release_calls(), 1);
    }

    #[test]
    fn test_failed_connect_releases_runtime() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        sdk.set_fail_connect(true);
        let runtime = SdkRuntime::new(sdk.clone());
        let descriptor = sdk.enumerate().unwrap().remove(0);

        let err =
            CameraSession::connect(&runtime, descriptor, ReconnectPolicy::On).unwrap_err();
        assert!(matches!(err, CameraError::Connect { .. }));
        assert_eq!(runtime.active_refs(), 0);
        assert_eq!(sdk.release_calls(), 1);
    }

    #[test]
    fn test_double_disconnect_releases_once() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        session.disconnect().unwrap();
        session.disconnect().unwrap();
        drop(session);

        assert_eq!(sdk.disconnect_calls().len(), 1);
    }

    #[test]
    fn test_vendor_initiated_disconnect_skips_release() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        // Cable pulled: connection is gone before the callback lands
        sdk.emit_disconnect(1, 0x20FF);
        assert_eq!(session.state(), SessionState::Error);

        session.disconnect().unwrap();
        drop(session);

        // The dead handle must never reach the vendor again
        assert!(sdk.disconnect_calls().is_empty());
    }

    #[test]
    fn test_capture_completes_with_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sdk = MockSdk::with_config(MockSdkConfig {
            auto_complete_capture: true,
            capture_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });
        sdk.push_device(DeviceDescriptor::new(
            "ILCE-7M4",
            ConnectionType::Usb,
            &[0xAA, 0x01],
        ));
        let (_runtime, session) = connected(&sdk);

        let path = session
            .capture()
            .unwrap()
            .wait_timeout(Duration::from_secs(2))
            .unwrap();

        assert!(path.exists());
        assert_eq!(
            sdk.sent_commands(),
            vec![
                (1, CommandId::Release, CommandParam::Down),
                (1, CommandId::Release, CommandParam::Up),
            ]
        );
    }

    #[test]
    fn test_second_capture_is_busy_without_commands() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        // First capture stays pending: nothing completes it
        let pending = session.capture().unwrap();
        assert!(matches!(session.capture().unwrap_err(), CameraError::Busy));

        // Only the first capture's shutter pair reached the device
        assert_eq!(sdk.sent_commands().len(), 2);

        sdk.emit_captured_file(1, std::path::Path::new("/tmp/DSC00002.JPG"));
        assert!(pending.wait_timeout(Duration::from_secs(1)).is_ok());

        // Slot free again
        assert!(session.capture().is_ok());
    }

    #[test]
    fn test_capture_observes_shutter_settle() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        let started = std::time::Instant::now();
        let _pending = session.capture().unwrap();
        assert!(started.elapsed() >= SHUTTER_SETTLE);
    }

    #[test]
    fn test_disconnect_fails_pending_capture() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        let pending = session.capture().unwrap();
        session.disconnect().unwrap();

        let err = pending.wait_timeout(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, CameraError::Capture { .. }));
    }

    #[test]
    fn test_capture_fails_fast_when_shutter_rejected() {
        let sdk = MockSdk::with_config(MockSdkConfig {
            fail_command: true,
            ..Default::default()
        });
        sdk.push_device(DeviceDescriptor::new(
            "ILCE-7M4",
            ConnectionType::Usb,
            &[0xAA, 0x01],
        ));
        let (_runtime, session) = connected(&sdk);

        let err = session.capture().unwrap_err();
        assert!(matches!(err, CameraError::Capture { .. }));
        // Slot was released, a retry is allowed through
        assert!(matches!(
            session.capture().unwrap_err(),
            CameraError::Capture { .. }
        ));
    }

    #[test]
    fn test_live_view_round_trip() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        let (sink, frames) = ChannelSink::bounded(2);
        session.live_view().start(Box::new(sink)).unwrap();
        assert!(session.live_view().is_active());

        // The vendor-side toggle was written
        let toggled = sdk
            .get_properties(1)
            .unwrap()
            .iter()
            .any(|p| p.code == codes::LIVE_VIEW_ENABLE && p.value == 1);
        assert!(toggled);

        for payload in [&[1u8][..], &[2], &[3], &[4], &[5]] {
            sdk.emit_live_view_frame(1, payload);
        }

        // Two buffered, three dropped, event thread never blocked
        assert_eq!(frames.recv().unwrap().data, vec![1]);
        assert_eq!(frames.recv().unwrap().data, vec![2]);
        assert!(frames.try_recv().is_err());

        let stats = session.live_view().stats();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.last_sequence, 5);

        session.live_view().stop().unwrap();
        sdk.emit_live_view_frame(1, &[6]);
        assert!(frames.try_recv().is_err());
        assert_eq!(session.live_view().stats().last_sequence, 5);
    }

    #[test]
    fn test_live_view_double_start_rejected() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        let (sink, _frames) = ChannelSink::bounded(1);
        session.live_view().start(Box::new(sink)).unwrap();

        let (sink, _frames) = ChannelSink::bounded(1);
        assert!(matches!(
            session.live_view().start(Box::new(sink)).unwrap_err(),
            CameraError::LiveViewActive
        ));
    }

    #[test]
    fn test_property_get_set() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        sdk.set_properties(vec![RawProperty {
            code: codes::ISO,
            kind: PropertyKind::U32,
            value: 800,
        }]);
        let (_runtime, session) = connected(&sdk);

        assert_eq!(session.properties().get("iso").unwrap(), Some(800));
        assert_eq!(session.properties().get("aperture").unwrap(), None);

        session.properties().set("iso", 1600).unwrap();
        assert_eq!(session.properties().get("iso").unwrap(), Some(1600));

        assert!(matches!(
            session.properties().get("nonsense").unwrap_err(),
            CameraError::UnknownProperty(_)
        ));
        assert!(matches!(
            session.properties().set("aperture", 1 << 40).unwrap_err(),
            CameraError::PropertyOutOfRange { .. }
        ));
        assert!(matches!(
            session.properties().set("live_view_status", 1).unwrap_err(),
            CameraError::PropertyReadOnly(_)
        ));
    }

    #[test]
    fn test_property_rejected_by_device() {
        let sdk = MockSdk::with_config(MockSdkConfig {
            reject_set_codes: vec![codes::ISO],
            ..Default::default()
        });
        sdk.push_device(DeviceDescriptor::new(
            "ILCE-7M4",
            ConnectionType::Usb,
            &[0xAA, 0x01],
        ));
        let (_runtime, session) = connected(&sdk);

        assert!(matches!(
            session.properties().set("iso", 400).unwrap_err(),
            CameraError::Property { code } if code == codes::ISO
        ));
    }

    #[test]
    fn test_property_get_after_disconnect_is_none() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        sdk.set_properties(vec![RawProperty {
            code: codes::ISO,
            kind: PropertyKind::U32,
            value: 800,
        }]);
        let (_runtime, session) = connected(&sdk);

        session.disconnect().unwrap();
        assert_eq!(session.properties().get("iso").unwrap(), None);
        assert!(matches!(
            session.properties().set("iso", 400).unwrap_err(),
            CameraError::NotConnected
        ));
    }

    #[test]
    fn test_operations_after_vendor_disconnect() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let (_runtime, session) = connected(&sdk);

        sdk.emit_disconnect(1, 0x20FF);

        assert!(matches!(
            session.capture().unwrap_err(),
            CameraError::NotConnected
        ));
        let (sink, _frames) = ChannelSink::bounded(1);
        assert!(matches!(
            session.live_view().start(Box::new(sink)).unwrap_err(),
            CameraError::NotConnected
        ));
    }

    #[test]
    fn test_info_reports_identity_and_firmware() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        sdk.set_properties(vec![RawProperty {
            code: codes::FIRMWARE_VERSION,
            kind: PropertyKind::U16,
            value: 0x0131,
        }]);
        let (_runtime, session) = connected(&sdk);

        let info = session.info();
        assert_eq!(info.model, "ILCE-7M4");
        assert_eq!(info.serial, "aa010203");
        assert_eq!(info.firmware.as_deref(), Some("1.31"));
        assert!(info.connected);

        session.disconnect().unwrap();
        let info = session.info();
        assert!(!info.connected);
        assert_eq!(info.state, SessionState::Disconnected);
        assert_eq!(info.firmware, None);
    }

    #[test]
    fn test_drop_closes_connection() {
        let sdk = MockSdk::with_one_camera("ILCE-7M4");
        let runtime = SdkRuntime::new(sdk.clone());
        {
            let descriptor = sdk.enumerate().unwrap().remove(0);
            let _session =
                CameraSession::connect(&runtime, descriptor, ReconnectPolicy::On).unwrap();
            assert_eq!(sdk.connection_count(), 1);
        }
        assert_eq!(sdk.connection_count(), 0);
        assert_eq!(runtime.active_refs(), 0);
    }
}
