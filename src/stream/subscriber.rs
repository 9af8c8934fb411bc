//! Per-viewer bounded payload queue

use bytes::Bytes;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Client ID type (UUID string)
pub type ClientId = String;

/// Compressed bytes for one frame, shared by every queue it is delivered to
pub type EncodedPayload = Bytes;

/// Per-subscriber bookkeeping shared between the hub and the session
#[derive(Debug)]
pub struct SubscriberInfo {
    /// Unique client ID
    pub id: ClientId,
    /// Connection timestamp
    pub connected_at: Instant,
    /// Frames written and flushed to the client
    frames_sent: AtomicU64,
}

impl SubscriberInfo {
    pub(crate) fn new(id: ClientId) -> Self {
        Self {
            id,
            connected_at: Instant::now(),
            frames_sent: AtomicU64::new(0),
        }
    }

    /// Record one frame flushed to the client
    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames flushed to the client so far
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Get connection duration
    pub fn connected_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Snapshot for status reporting
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            id: self.id.clone(),
            frames_sent: self.frames_sent(),
            connected_secs: self.connected_duration().as_secs(),
        }
    }
}

/// Per-client statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    /// Client ID
    pub id: ClientId,
    /// Frames flushed to the client
    pub frames_sent: u64,
    /// Seconds since the client subscribed
    pub connected_secs: u64,
}

/// Consumer half of a subscription
///
/// Owned by exactly one streaming session. The producing half lives in the
/// hub's live set; once the hub drops it (eviction, `unsubscribe`, `close_all`)
/// `recv` yields the payloads still buffered and then `None`.
#[derive(Debug)]
pub struct Subscriber {
    rx: mpsc::Receiver<EncodedPayload>,
    info: Arc<SubscriberInfo>,
}

impl Subscriber {
    pub(crate) fn new(rx: mpsc::Receiver<EncodedPayload>, info: Arc<SubscriberInfo>) -> Self {
        Self { rx, info }
    }

    /// Get client ID
    pub fn id(&self) -> &ClientId {
        &self.info.id
    }

    pub fn info(&self) -> &Arc<SubscriberInfo> {
        &self.info
    }

    /// Wait for the next payload; `None` once the queue is closed and drained
    pub async fn recv(&mut self) -> Option<EncodedPayload> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Result<EncodedPayload, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Close the queue from the consumer side
    ///
    /// Already-buffered payloads can still be drained. The hub notices the
    /// closed queue lazily, on its next publish pass.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
