//! Hand-off queue bridging WebSocket uploads to the switch sender.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::packet::Packet;

/// Process-wide FIFO of packets awaiting delivery on the switch channel.
///
/// Producers (WebSocket connections) push from any task; the single
/// consumer (the active switch session's sender task) pops with a
/// bounded wait. Packets queued while no switch session is attached stay
/// queued until the next session drains them, so an upload made before
/// the target connects is delivered, not dropped.
///
/// Shared as `Arc<ScriptQueue>` and handed to both listeners at
/// construction time.
pub struct ScriptQueue {
    tx: UnboundedSender<Packet>,
    rx: Mutex<UnboundedReceiver<Packet>>,
}

impl ScriptQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueue a packet for delivery. Never blocks.
    pub fn push(&self, packet: Packet) {
        // The queue owns both channel halves, so the send can only fail
        // if the queue itself is gone.
        if self.tx.send(packet).is_err() {
            tracing::error!("script queue receiver dropped, packet discarded");
        }
    }

    /// Dequeue the next packet, waiting up to `timeout`.
    ///
    /// Returns `None` on timeout so the caller can re-check its stop
    /// signal between attempts.
    pub async fn pop(&self, timeout: Duration) -> Option<Packet> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(packet) => packet,
            Err(_) => None,
        }
    }
}

impl Default for ScriptQueue {
    fn default() -> Self {
        Self::new()
    }
}
