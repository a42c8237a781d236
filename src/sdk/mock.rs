//! Mock vendor SDK for testing without a real camera
//!
//! Implements [`CameraSdk`] over an in-memory device table and lets tests
//! (and the CLI's `--simulate` mode) script vendor events: captured files,
//! live-view frames, unexpected disconnects, warnings and errors. Fault
//! injection mirrors the failure modes seen with real hardware: missing
//! native libraries, rejected connects, flaky command transport.

use crate::sdk::backend::{
    CameraSdk, CommandId, CommandParam, DeviceDescriptor, DeviceEventSink, RawProperty,
    ReconnectPolicy, SdkError, SdkHandle,
};
use chrono::Utc;
use log::trace;
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for mock backend behavior
#[derive(Debug, Clone, Default)]
pub struct MockSdkConfig {
    /// Fail `init` as if the vendor's native libraries were missing
    pub fail_init: bool,
    /// Fail the enumeration call itself (distinct from zero devices)
    pub fail_enumerate: bool,
    /// Reject every connect attempt
    pub fail_connect: bool,
    /// Fail every command send
    pub fail_command: bool,
    /// Random command failure rate (0-100 percentage)
    pub command_failure_rate: u8,
    /// Property codes whose writes the device rejects
    pub reject_set_codes: Vec<u32>,
    /// Complete captures on their own: after shutter-up, deliver a
    /// captured-file event from a background thread
    pub auto_complete_capture: bool,
    /// Directory for auto-completed capture artifacts. When set, an empty
    /// artifact file is actually written there.
    pub capture_dir: Option<PathBuf>,
}

/// Internal mutable state of the mock backend
#[derive(Default)]
struct MockState {
    devices: Vec<DeviceDescriptor>,
    properties: Vec<RawProperty>,
    connections: HashMap<SdkHandle, Arc<dyn DeviceEventSink>>,
    next_handle: SdkHandle,
    init_calls: usize,
    release_calls: usize,
    disconnect_calls: Vec<SdkHandle>,
    commands: Vec<(SdkHandle, CommandId, CommandParam)>,
}

/// Scriptable mock implementation of the vendor SDK
pub struct MockSdk {
    state: Mutex<MockState>,
    config: Mutex<MockSdkConfig>,
}

impl MockSdk {
    /// Create a mock backend with default (non-failing) behavior
    pub fn new() -> Arc<Self> {
        Self::with_config(MockSdkConfig::default())
    }

    /// Create a mock backend with specific behavior
    pub fn with_config(config: MockSdkConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                next_handle: 1,
                ..Default::default()
            }),
            config: Mutex::new(config),
        })
    }

    /// Create a mock with one USB camera attached, the common test setup
    pub fn with_one_camera(model: &str) -> Arc<Self> {
        let sdk = Self::new();
        sdk.push_device(DeviceDescriptor::new(
            model,
            crate::sdk::backend::ConnectionType::Usb,
            &[0xAA, 0x01, 0x02, 0x03],
        ));
        sdk
    }

    /// Attach a simulated device
    pub fn push_device(&self, descriptor: DeviceDescriptor) {
        self.state.lock().unwrap().devices.push(descriptor);
    }

    /// Remove all simulated devices
    pub fn clear_devices(&self) {
        self.state.lock().unwrap().devices.clear();
    }

    /// Replace the simulated property array
    pub fn set_properties(&self, properties: Vec<RawProperty>) {
        self.state.lock().unwrap().properties = properties;
    }

    /// Allow a previously failing init to succeed
    pub fn set_fail_init(&self, fail: bool) {
        self.config.lock().unwrap().fail_init = fail;
    }

    /// Toggle connect rejection
    pub fn set_fail_connect(&self, fail: bool) {
        self.config.lock().unwrap().fail_connect = fail;
    }

    /// Number of vendor init calls observed
    pub fn init_calls(&self) -> usize {
        self.state.lock().unwrap().init_calls
    }

    /// Number of vendor teardown calls observed
    pub fn release_calls(&self) -> usize {
        self.state.lock().unwrap().release_calls
    }

    /// Every handle `disconnect` was called with, in order. A handle
    /// appearing twice means a double release.
    pub fn disconnect_calls(&self) -> Vec<SdkHandle> {
        self.state.lock().unwrap().disconnect_calls.clone()
    }

    /// Every command sent, in order
    pub fn sent_commands(&self) -> Vec<(SdkHandle, CommandId, CommandParam)> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Number of currently open connections
    pub fn connection_count(&self) -> usize {
        self.state.lock().unwrap().connections.len()
    }

    fn sink_for(&self, handle: SdkHandle) -> Option<Arc<dyn DeviceEventSink>> {
        self.state.lock().unwrap().connections.get(&handle).cloned()
    }

    /// Deliver a captured-file event for `handle`, as the vendor would
    /// after an image finished transferring
    pub fn emit_captured_file(&self, handle: SdkHandle, path: &Path) {
        if let Some(sink) = self.sink_for(handle) {
            sink.on_captured_file(path);
        }
    }

    /// Deliver a live-view frame payload for `handle`. The slice is only
    /// borrowed for the duration of the callback, matching vendor buffer
    /// lifetime rules.
    pub fn emit_live_view_frame(&self, handle: SdkHandle, payload: &[u8]) {
        if let Some(sink) = self.sink_for(handle) {
            sink.on_live_view_frame(payload);
        }
    }

    /// Simulate a vendor-initiated disconnect (cable pulled, battery out).
    /// The connection is gone before the callback fires, as with the real
    /// SDK.
    pub fn emit_disconnect(&self, handle: SdkHandle, reason: u32) {
        let sink = {
            let mut state = self.state.lock().unwrap();
            state.connections.remove(&handle)
        };
        if let Some(sink) = sink {
            sink.on_disconnected(reason);
        }
    }

    /// Deliver a vendor error event
    pub fn emit_error(&self, handle: SdkHandle, code: u32) {
        if let Some(sink) = self.sink_for(handle) {
            sink.on_error(code);
        }
    }

    /// Deliver a vendor warning event
    pub fn emit_warning(&self, handle: SdkHandle, code: u32) {
        if let Some(sink) = self.sink_for(handle) {
            sink.on_warning(code);
        }
    }

    fn auto_complete_capture(&self, handle: SdkHandle) {
        let (sink, dir) = {
            let config = self.config.lock().unwrap();
            if !config.auto_complete_capture {
                return;
            }
            (self.sink_for(handle), config.capture_dir.clone())
        };

        let Some(sink) = sink else { return };

        std::thread::spawn(move || {
            // Give the shutter a moment, like a real transfer would
            std::thread::sleep(Duration::from_millis(20));

            let name = format!("capture_{}.jpg", Utc::now().format("%Y%m%d_%H%M%S%3f"));
            let path = match dir {
                Some(dir) => {
                    let path = dir.join(name);
                    let _ = std::fs::write(&path, b"");
                    path
                }
                None => std::env::temp_dir().join(name),
            };

            sink.on_captured_file(&path);
        });
    }
}

impl CameraSdk for MockSdk {
    fn init(&self) -> Result<(), SdkError> {
        let fail = self.config.lock().unwrap().fail_init;
        let mut state = self.state.lock().unwrap();
        state.init_calls += 1;

        if fail {
            return Err(SdkError::new(0x8001, "native adapter libraries missing"));
        }
        Ok(())
    }

    fn release(&self) {
        self.state.lock().unwrap().release_calls += 1;
    }

    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, SdkError> {
        if self.config.lock().unwrap().fail_enumerate {
            return Err(SdkError::new(0x8101, "enumeration transport failure"));
        }

        // Fresh owned snapshot per call, as the FFI backend produces
        Ok(self.state.lock().unwrap().devices.clone())
    }

    fn connect(
        &self,
        descriptor: &DeviceDescriptor,
        sink: Arc<dyn DeviceEventSink>,
        _reconnect: ReconnectPolicy,
    ) -> Result<SdkHandle, SdkError> {
        if self.config.lock().unwrap().fail_connect {
            return Err(SdkError::new(0x8201, "connect rejected"));
        }

        let mut state = self.state.lock().unwrap();
        let present = state.devices.iter().any(|d| d.raw_id == descriptor.raw_id);
        if !present {
            return Err(SdkError::new(0x8202, "device not found"));
        }

        let handle = state.next_handle;
        state.next_handle += 1;
        state.connections.insert(handle, Arc::clone(&sink));
        drop(state);

        trace!("mock connect: handle {}", handle);
        // Informational callback, delivered off the caller's thread as the
        // vendor does
        std::thread::spawn(move || sink.on_connected());

        Ok(handle)
    }

    fn disconnect(&self, handle: SdkHandle) -> Result<(), SdkError> {
        let mut state = self.state.lock().unwrap();
        state.disconnect_calls.push(handle);

        if state.connections.remove(&handle).is_none() {
            return Err(SdkError::new(0x8203, "invalid device handle"));
        }
        Ok(())
    }

    fn send_command(
        &self,
        handle: SdkHandle,
        command: CommandId,
        param: CommandParam,
    ) -> Result<(), SdkError> {
        {
            let config = self.config.lock().unwrap();
            if config.fail_command {
                return Err(SdkError::new(0x8301, "command transport failure"));
            }
            if config.command_failure_rate > 0 {
                let roll: u8 = rand::thread_rng().gen_range(0..100);
                if roll < config.command_failure_rate {
                    return Err(SdkError::new(0x8302, "intermittent command failure"));
                }
            }
        }

        let mut state = self.state.lock().unwrap();
        if !state.connections.contains_key(&handle) {
            return Err(SdkError::new(0x8203, "invalid device handle"));
        }
        state.commands.push((handle, command, param));
        drop(state);

        if command == CommandId::Release && param == CommandParam::Up {
            self.auto_complete_capture(handle);
        }
        Ok(())
    }

    fn get_properties(&self, handle: SdkHandle) -> Result<Vec<RawProperty>, SdkError> {
        let state = self.state.lock().unwrap();
        if !state.connections.contains_key(&handle) {
            return Err(SdkError::new(0x8203, "invalid device handle"));
        }
        Ok(state.properties.clone())
    }

    fn set_property(&self, handle: SdkHandle, property: RawProperty) -> Result<(), SdkError> {
        if self
            .config
            .lock()
            .unwrap()
            .reject_set_codes
            .contains(&property.code)
        {
            return Err(SdkError::new(0x8402, "property rejected by device"));
        }

        let mut state = self.state.lock().unwrap();
        if !state.connections.contains_key(&handle) {
            return Err(SdkError::new(0x8203, "invalid device handle"));
        }

        match state.properties.iter_mut().find(|p| p.code == property.code) {
            Some(existing) => existing.value = property.value,
            None => state.properties.push(property),
        }
        Ok(())
    }
}
