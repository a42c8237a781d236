//! Session shared state and vendor event demultiplexing
//!
//! A session's mutable state is shared between API callers and the
//! vendor's event thread. [`SessionShared`] owns that state behind small
//! independent locks; [`EventBridge`] is the [`DeviceEventSink`]
//! implementation handed to the vendor at connect time, translating raw
//! callbacks into state transitions, capture completion and live-view
//! delivery.
//!
//! Bridge methods run on the vendor's event thread and therefore never
//! call back into the blocking vendor surface and never block beyond the
//! short state locks.

use crate::camera::liveview::{FrameSink, LiveViewFrame};
use crate::core::error::{CameraError, Result};
use crate::sdk::backend::{DeviceEventSink, SdkHandle};
use crossbeam_channel::Sender;
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Connection lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No connection (initial state, or after an orderly disconnect)
    Disconnected,
    /// Connect call in flight
    Connecting,
    /// Handle open, operations allowed
    Connected,
    /// Orderly disconnect in flight
    Disconnecting,
    /// Connection lost to a vendor-reported error
    Error,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// State + handle, always transitioned together
pub(crate) struct SessionCore {
    pub state: SessionState,
    pub handle: Option<SdkHandle>,
}

/// The capture waiting for its completion event
pub(crate) struct PendingCapture {
    pub tx: Sender<Result<PathBuf>>,
}

/// Live-view delivery state, guarded as one unit so that clearing the
/// sink and delivering a frame cannot interleave
#[derive(Default)]
pub(crate) struct LiveViewDelivery {
    pub sink: Option<Box<dyn FrameSink>>,
    pub active: bool,
    pub sequence: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// State shared between a session's API surface and its event bridge
pub struct SessionShared {
    pub(crate) core: Mutex<SessionCore>,
    /// Cleared the moment the vendor reports the connection gone; checked
    /// before any vendor call that needs the handle
    pub(crate) valid: AtomicBool,
    pub(crate) pending: Mutex<Option<PendingCapture>>,
    pub(crate) live: Mutex<LiveViewDelivery>,
}

impl SessionShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            core: Mutex::new(SessionCore {
                state: SessionState::Disconnected,
                handle: None,
            }),
            valid: AtomicBool::new(false),
            pending: Mutex::new(None),
            live: Mutex::new(LiveViewDelivery::default()),
        })
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.core.lock().unwrap().state = state;
    }

    pub(crate) fn mark_connected(&self, handle: SdkHandle) {
        let mut core = self.core.lock().unwrap();
        core.state = SessionState::Connected;
        core.handle = Some(handle);
        self.valid.store(true, Ordering::SeqCst);
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.core.lock().unwrap().state
    }

    /// The open handle, required. Errors once the session has left the
    /// connected state for any reason.
    pub(crate) fn connected_handle(&self) -> Result<SdkHandle> {
        let core = self.core.lock().unwrap();
        match core.handle {
            Some(handle) if core.state == SessionState::Connected => Ok(handle),
            _ => Err(CameraError::NotConnected),
        }
    }

    /// The open handle, if the vendor still considers it live
    pub(crate) fn handle_if_valid(&self) -> Option<SdkHandle> {
        if !self.valid.load(Ordering::SeqCst) {
            return None;
        }
        self.core.lock().unwrap().handle
    }

    /// Resolve the pending capture, if any, with `result`
    pub(crate) fn finish_pending(&self, result: Result<PathBuf>) {
        if let Some(pending) = self.pending.lock().unwrap().take() {
            // The waiter may have timed out and dropped its receiver
            let _ = pending.tx.send(result);
        }
    }

    pub(crate) fn clear_pending(&self) {
        self.pending.lock().unwrap().take();
    }

    fn stop_live_delivery(&self) {
        let mut live = self.live.lock().unwrap();
        live.active = false;
        live.sink = None;
    }
}

/// Vendor event sink for one session.
///
/// Each event is handled against the session's shared state; events for a
/// session the vendor already reported gone are ignored.
pub struct EventBridge {
    shared: Arc<SessionShared>,
    model: String,
}

impl EventBridge {
    pub(crate) fn new(shared: Arc<SessionShared>, model: String) -> Self {
        Self { shared, model }
    }
}

impl DeviceEventSink for EventBridge {
    fn on_connected(&self) {
        // Informational only: the synchronous connect return code already
        // decided whether the session is connected
        debug!("{}: vendor connected notification", self.model);
    }

    fn on_disconnected(&self, reason: u32) {
        self.shared.valid.store(false, Ordering::SeqCst);

        {
            let mut core = self.shared.core.lock().unwrap();
            // The vendor-side object is gone with the connection; keeping
            // the handle would invite a second release
            core.handle = None;
            core.state = if reason == 0 {
                SessionState::Disconnected
            } else {
                SessionState::Error
            };
        }

        if reason == 0 {
            info!("{}: camera disconnected", self.model);
        } else {
            warn!("{}: camera disconnected, reason {:#06x}", self.model, reason);
        }

        self.shared
            .finish_pending(Err(CameraError::DisconnectedUnexpectedly));
        self.shared.stop_live_delivery();
    }

    fn on_property_changed(&self) {
        trace!("{}: property change notification", self.model);
    }

    fn on_live_view_frame(&self, payload: &[u8]) {
        let mut live = self.shared.live.lock().unwrap();
        if !live.active {
            return;
        }

        live.sequence += 1;
        let frame = LiveViewFrame {
            sequence: live.sequence,
            // Vendor buffer dies when this callback returns
            data: payload.to_vec(),
        };

        let accepted = match live.sink.as_ref() {
            Some(sink) => sink.deliver(frame),
            None => return,
        };
        if accepted {
            live.delivered += 1;
        } else {
            live.dropped += 1;
        }
    }

    fn on_captured_file(&self, path: &Path) {
        info!("{}: captured {}", self.model, path.display());
        self.shared.finish_pending(Ok(path.to_path_buf()));
    }

    fn on_warning(&self, code: u32) {
        warn!("{}: vendor warning {:#06x}", self.model, code);
    }

    fn on_error(&self, code: u32) {
        error!("{}: vendor error {:#06x}", self.model, code);
        self.shared.finish_pending(Err(CameraError::Capture {
            cause: format!("vendor error {:#06x}", code),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::liveview::ChannelSink;
    use crossbeam_channel::bounded;

    fn bridge() -> (Arc<SessionShared>, EventBridge) {
        let shared = SessionShared::new();
        shared.mark_connected(7);
        let bridge = EventBridge::new(Arc::clone(&shared), "ILCE-7M4".to_string());
        (shared, bridge)
    }

    #[test]
    fn test_captured_file_resolves_pending() {
        let (shared, bridge) = bridge();
        let (tx, rx) = bounded(1);
        *shared.pending.lock().unwrap() = Some(PendingCapture { tx });

        bridge.on_captured_file(Path::new("/tmp/DSC00001.JPG"));

        let path = rx.recv().unwrap().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/DSC00001.JPG"));
        assert!(shared.pending.lock().unwrap().is_none());
    }

    #[test]
    fn test_vendor_error_fails_pending() {
        let (shared, bridge) = bridge();
        let (tx, rx) = bounded(1);
        *shared.pending.lock().unwrap() = Some(PendingCapture { tx });

        bridge.on_error(0x8402);

        let err = rx.recv().unwrap().unwrap_err();
        assert!(matches!(err, CameraError::Capture { .. }));
        assert!(shared.pending.lock().unwrap().is_none());
    }

    #[test]
    fn test_unexpected_disconnect_clears_everything() {
        let (shared, bridge) = bridge();
        let (tx, rx) = bounded(1);
        *shared.pending.lock().unwrap() = Some(PendingCapture { tx });
        {
            let mut live = shared.live.lock().unwrap();
            let (sink, _rx) = ChannelSink::bounded(1);
            live.sink = Some(Box::new(sink));
            live.active = true;
        }

        bridge.on_disconnected(0x20FF);

        assert_eq!(shared.state(), SessionState::Error);
        assert!(shared.core.lock().unwrap().handle.is_none());
        assert!(shared.handle_if_valid().is_none());
        assert!(matches!(
            rx.recv().unwrap().unwrap_err(),
            CameraError::DisconnectedUnexpectedly
        ));
        assert!(!shared.live.lock().unwrap().active);
    }

    #[test]
    fn test_orderly_remote_disconnect_is_not_an_error_state() {
        let (shared, bridge) = bridge();
        bridge.on_disconnected(0);
        assert_eq!(shared.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_frames_ignored_when_inactive() {
        let (shared, bridge) = bridge();
        let (sink, rx) = ChannelSink::bounded(4);
        {
            let mut live = shared.live.lock().unwrap();
            live.sink = Some(Box::new(sink));
            live.active = false;
        }

        bridge.on_live_view_frame(&[1, 2, 3]);

        assert!(rx.try_recv().is_err());
        assert_eq!(shared.live.lock().unwrap().sequence, 0);
    }

    #[test]
    fn test_frame_sequence_counts_drops() {
        let (shared, bridge) = bridge();
        let (sink, rx) = ChannelSink::bounded(1);
        {
            let mut live = shared.live.lock().unwrap();
            live.sink = Some(Box::new(sink));
            live.active = true;
        }

        bridge.on_live_view_frame(&[1]);
        bridge.on_live_view_frame(&[2]);
        bridge.on_live_view_frame(&[3]);

        let live = shared.live.lock().unwrap();
        assert_eq!(live.sequence, 3);
        assert_eq!(live.delivered, 1);
        assert_eq!(live.dropped, 2);
        drop(live);

        assert_eq!(rx.recv().unwrap().sequence, 1);
    }
}
