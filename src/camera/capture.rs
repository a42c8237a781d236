//! Still-image capture
//!
//! A capture is a two-phase shutter actuation (press, settle, release)
//! followed by an asynchronous wait for the vendor's captured-file event.
//! Only one capture may be in flight per session; the in-flight slot is
//! claimed before the first shutter command is sent, so a losing
//! concurrent caller gets [`CameraError::Busy`] without touching the
//! device.

use crate::camera::bridge::{PendingCapture, SessionShared};
use crate::core::error::{CameraError, Result};
use crate::sdk::backend::{CameraSdk, CommandId, CommandParam};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Hold time between shutter press and release. Shorter presses are
/// dropped by some camera bodies as switch bounce.
pub const SHUTTER_SETTLE: Duration = Duration::from_millis(35);

/// Outstanding capture. Resolves to the path of the transferred image
/// once the device reports completion.
#[derive(Debug)]
pub struct CaptureHandle {
    rx: Receiver<Result<PathBuf>>,
}

impl CaptureHandle {
    /// Block until the capture completes or fails
    pub fn wait(self) -> Result<PathBuf> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(CameraError::Capture {
                cause: "session dropped before completion".to_string(),
            }),
        }
    }

    /// Block up to `timeout` for completion
    pub fn wait_timeout(self, timeout: Duration) -> Result<PathBuf> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CameraError::Capture {
                cause: format!("no completion within {:?}", timeout),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::Capture {
                cause: "session dropped before completion".to_string(),
            }),
        }
    }

    /// Check for completion without blocking
    pub fn try_wait(&self) -> Option<Result<PathBuf>> {
        self.rx.try_recv().ok()
    }
}

/// Single-flight capture driver for one session
pub struct CaptureCoordinator {
    backend: Arc<dyn CameraSdk>,
    shared: Arc<SessionShared>,
}

impl CaptureCoordinator {
    pub(crate) fn new(backend: Arc<dyn CameraSdk>, shared: Arc<SessionShared>) -> Self {
        Self { backend, shared }
    }

    /// Trigger a capture.
    ///
    /// Claims the session's single in-flight slot, actuates the shutter
    /// and returns a handle resolving on the captured-file event. Fails
    /// with [`CameraError::Busy`] while a previous capture is pending and
    /// with [`CameraError::NotConnected`] without an open session; in
    /// both cases no shutter command is sent.
    pub fn capture(&self) -> Result<CaptureHandle> {
        let handle = self.shared.connected_handle()?;

        let rx = {
            let mut pending = self.shared.pending.lock().unwrap();
            if pending.is_some() {
                return Err(CameraError::Busy);
            }
            let (tx, rx) = bounded(1);
            *pending = Some(PendingCapture { tx });
            rx
        };

        debug!("Shutter down");
        if let Err(e) = self
            .backend
            .send_command(handle, CommandId::Release, CommandParam::Down)
        {
            self.shared.clear_pending();
            return Err(e.into_capture_error());
        }

        std::thread::sleep(SHUTTER_SETTLE);

        debug!("Shutter up");
        if let Err(e) = self
            .backend
            .send_command(handle, CommandId::Release, CommandParam::Up)
        {
            self.shared.clear_pending();
            return Err(e.into_capture_error());
        }

        Ok(CaptureHandle { rx })
    }

    /// Whether a capture is currently awaiting completion
    pub fn in_flight(&self) -> bool {
        self.shared.pending.lock().unwrap().is_some()
    }
}
