//! Live-view frame streaming
//!
//! The vendor pushes encoded live-view frames from its event thread.
//! Delivery to the consumer must never block that thread, so frames go
//! through a [`FrameSink`] whose `deliver` is required to return
//! immediately; a sink that has no room reports the frame as dropped and
//! the newest frame is lost, never the event thread's time.

use crate::camera::bridge::SessionShared;
use crate::camera::properties::codes;
use crate::core::error::{CameraError, Result};
use crate::sdk::backend::{CameraSdk, PropertyKind, RawProperty};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info};
use std::sync::Arc;

/// One copied live-view frame.
///
/// `data` is an owned copy of the vendor's payload; `sequence` increases
/// by one per frame the device produced while the stream was active, so
/// gaps in received sequence numbers measure drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveViewFrame {
    pub sequence: u64,
    pub data: Vec<u8>,
}

/// Consumer endpoint for live-view frames.
///
/// `deliver` runs on the vendor's event thread and must return without
/// blocking. Returning `false` counts the frame as dropped.
pub trait FrameSink: Send {
    fn deliver(&self, frame: LiveViewFrame) -> bool;
}

/// [`FrameSink`] backed by a bounded channel; a full channel drops the
/// incoming frame rather than waiting for the consumer
pub struct ChannelSink {
    tx: Sender<LiveViewFrame>,
}

impl ChannelSink {
    /// Create a sink/receiver pair with room for `capacity` frames
    pub fn bounded(capacity: usize) -> (Self, Receiver<LiveViewFrame>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn deliver(&self, frame: LiveViewFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Delivery counters for an active or finished stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveViewStats {
    /// Frames the sink accepted
    pub delivered: u64,
    /// Frames the sink refused (consumer too slow)
    pub dropped: u64,
    /// Sequence number of the most recent frame produced
    pub last_sequence: u64,
}

/// Starts and stops live-view delivery on one session.
///
/// `start` registers the sink before the vendor-side toggle is written,
/// so the first frame can never race past an unregistered sink. `stop`
/// clears the sink under the delivery lock; once it returns, no further
/// frame reaches the old sink.
pub struct LiveViewStream {
    backend: Arc<dyn CameraSdk>,
    shared: Arc<SessionShared>,
}

impl LiveViewStream {
    pub(crate) fn new(backend: Arc<dyn CameraSdk>, shared: Arc<SessionShared>) -> Self {
        Self { backend, shared }
    }

    /// Begin streaming frames into `sink`
    pub fn start(&self, sink: Box<dyn FrameSink>) -> Result<()> {
        let handle = self.shared.connected_handle()?;

        {
            let mut live = self.shared.live.lock().unwrap();
            if live.active {
                return Err(CameraError::LiveViewActive);
            }
            live.sink = Some(sink);
            live.active = true;
            live.sequence = 0;
            live.delivered = 0;
            live.dropped = 0;
        }

        let enable = RawProperty {
            code: codes::LIVE_VIEW_ENABLE,
            kind: PropertyKind::U8,
            value: 1,
        };
        if self.backend.set_property(handle, enable).is_err() {
            let mut live = self.shared.live.lock().unwrap();
            live.active = false;
            live.sink = None;
            return Err(CameraError::Property {
                code: codes::LIVE_VIEW_ENABLE,
            });
        }

        info!("Live view started");
        Ok(())
    }

    /// Stop streaming. Safe to call when not active or already
    /// disconnected; the vendor-side toggle is cleared best-effort.
    pub fn stop(&self) -> Result<()> {
        if let Some(handle) = self.shared.handle_if_valid() {
            let disable = RawProperty {
                code: codes::LIVE_VIEW_ENABLE,
                kind: PropertyKind::U8,
                value: 0,
            };
            // The device may already be gone; delivery stops regardless
            let _ = self.backend.set_property(handle, disable);
        }

        let mut live = self.shared.live.lock().unwrap();
        if live.active {
            debug!(
                "Live view stopped (delivered {}, dropped {})",
                live.delivered, live.dropped
            );
        }
        live.active = false;
        live.sink = None;
        Ok(())
    }

    /// Whether frames are currently being delivered
    pub fn is_active(&self) -> bool {
        self.shared.live.lock().unwrap().active
    }

    /// Delivery counters
    pub fn stats(&self) -> LiveViewStats {
        let live = self.shared.live.lock().unwrap();
        LiveViewStats {
            delivered: live.delivered,
            dropped: live.dropped,
            last_sequence: live.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, rx) = ChannelSink::bounded(2);

        let frame = |sequence| LiveViewFrame {
            sequence,
            data: vec![0xFF],
        };
        assert!(sink.deliver(frame(1)));
        assert!(sink.deliver(frame(2)));
        assert!(!sink.deliver(frame(3)));

        assert_eq!(rx.recv().unwrap().sequence, 1);
        assert_eq!(rx.recv().unwrap().sequence, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_dead_receiver_is_a_drop() {
        let (sink, rx) = ChannelSink::bounded(4);
        drop(rx);
        assert!(!sink.deliver(LiveViewFrame {
            sequence: 1,
            data: Vec::new(),
        }));
    }
}
