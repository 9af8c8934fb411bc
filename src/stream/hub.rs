//! Broadcast hub
//!
//! Owns the live set of subscribers and fans each published frame out to them.
//!
//! # Backpressure
//!
//! Every subscriber has a bounded queue (capacity 2 by default). `publish`
//! encodes the frame once and then tries a non-blocking enqueue on every
//! queue. A full queue means the viewer is not keeping up: the subscriber is
//! dropped from the live set and its queue closed, so a slow viewer never
//! stalls the producer or the other viewers. A queue whose consumer has gone
//! away is dropped the same way on the next pass.

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use super::subscriber::{ClientStats, EncodedPayload, Subscriber, SubscriberInfo};
use crate::error::{AppError, Result};
use crate::video::encoder::Encoder;
use crate::video::VideoFrame;

/// Default per-subscriber queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Producer half of one subscription, held in the live set
struct SubscriberSlot {
    tx: mpsc::Sender<EncodedPayload>,
    info: Arc<SubscriberInfo>,
}

#[derive(Default)]
struct LiveSet {
    slots: Vec<SubscriberSlot>,
    /// Set by `close_all`; new subscribers are handed an already-closed queue
    closed: bool,
}

/// Hub statistics snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubStats {
    /// Subscribers currently in the live set
    pub subscribers: usize,
    /// Frames encoded and fanned out
    pub frames_published: u64,
    /// Successful enqueues across all subscribers
    pub frames_delivered: u64,
    /// Subscribers evicted because their queue was full
    pub evicted_slow: u64,
    /// Subscribers removed because their consumer went away
    pub evicted_disconnected: u64,
    /// Frames dropped because encoding failed
    pub encode_failures: u64,
    /// Whether `close_all` has been called
    pub closed: bool,
    /// Per-client statistics for the live set
    pub clients: Vec<ClientStats>,
}

/// Subscriber registry and fan-out engine
pub struct BroadcastHub {
    live: Mutex<LiveSet>,
    encoder: Mutex<Box<dyn Encoder>>,
    capacity: usize,
    /// Last payload that was fanned out
    latest: ArcSwapOption<EncodedPayload>,
    frames_published: AtomicU64,
    frames_delivered: AtomicU64,
    evicted_slow: AtomicU64,
    evicted_disconnected: AtomicU64,
    encode_failures: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub with the default queue capacity
    pub fn new(encoder: Box<dyn Encoder>) -> Self {
        Self::with_capacity(encoder, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a hub with a custom queue capacity (at least 1)
    pub fn with_capacity(encoder: Box<dyn Encoder>, capacity: usize) -> Self {
        debug!(encoder = encoder.name(), capacity, "Creating broadcast hub");
        Self {
            live: Mutex::new(LiveSet::default()),
            encoder: Mutex::new(encoder),
            capacity: capacity.max(1),
            latest: ArcSwapOption::empty(),
            frames_published: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            evicted_slow: AtomicU64::new(0),
            evicted_disconnected: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
        }
    }

    /// Per-subscriber queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a new subscriber
    ///
    /// After `close_all` the returned subscriber's queue is already closed.
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(self.capacity);
        let info = Arc::new(SubscriberInfo::new(uuid::Uuid::new_v4().to_string()));

        let total = {
            let mut live = self.live.lock();
            if live.closed {
                None
            } else {
                live.slots.push(SubscriberSlot {
                    tx,
                    info: info.clone(),
                });
                Some(live.slots.len())
            }
        };

        match total {
            Some(total) => info!(client = %info.id, total, "Subscriber added"),
            None => debug!(client = %info.id, "Hub closed, subscriber starts closed"),
        }

        Subscriber::new(rx, info)
    }

    /// Remove a subscriber and close its queue
    ///
    /// Returns false if it was not in the live set (already evicted or closed).
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = {
            let mut live = self.live.lock();
            live.slots
                .iter()
                .position(|slot| slot.info.id == id)
                .map(|pos| live.slots.swap_remove(pos))
        };

        match removed {
            Some(slot) => {
                info!(
                    client = %slot.info.id,
                    frames_sent = slot.info.frames_sent(),
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    /// Whether anyone is watching
    pub fn has_subscribers(&self) -> bool {
        !self.live.lock().slots.is_empty()
    }

    /// Current live set size
    pub fn subscriber_count(&self) -> usize {
        self.live.lock().slots.len()
    }

    /// Whether `close_all` has been called
    pub fn is_closed(&self) -> bool {
        self.live.lock().closed
    }

    /// Encode `frame` once and offer it to every live subscriber
    ///
    /// Returns the number of subscribers that received the payload. With no
    /// subscribers the encoder is not invoked. An encode failure delivers
    /// nothing and leaves the live set untouched. Never blocks on a consumer.
    pub fn publish(&self, frame: VideoFrame) -> Result<usize> {
        if !self.has_subscribers() {
            trace!(sequence = frame.sequence, "No subscribers, skipping frame");
            return Ok(0);
        }

        let payload = self.encode(&frame).map_err(|e| {
            self.encode_failures.fetch_add(1, Ordering::Relaxed);
            e
        })?;

        let mut slow = Vec::new();
        let mut gone = Vec::new();
        let retained = {
            let mut live = self.live.lock();
            if live.closed {
                debug!(sequence = frame.sequence, "Hub closed during encode, dropping frame");
                return Ok(0);
            }
            live.slots.retain(|slot| match slot.tx.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    slow.push(slot.info.clone());
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    gone.push(slot.info.clone());
                    false
                }
            });
            live.slots.len()
        };

        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered
            .fetch_add(retained as u64, Ordering::Relaxed);
        self.latest.store(Some(Arc::new(payload)));

        if !slow.is_empty() {
            self.evicted_slow
                .fetch_add(slow.len() as u64, Ordering::Relaxed);
            for info in &slow {
                warn!(
                    client = %info.id,
                    frames_sent = info.frames_sent(),
                    capacity = self.capacity,
                    "Evicting slow subscriber (queue full)"
                );
            }
        }
        if !gone.is_empty() {
            self.evicted_disconnected
                .fetch_add(gone.len() as u64, Ordering::Relaxed);
            for info in &gone {
                debug!(
                    client = %info.id,
                    frames_sent = info.frames_sent(),
                    "Removing disconnected subscriber"
                );
            }
        }

        Ok(retained)
    }

    /// Compressed frames pass through; raw frames go through the encoder
    fn encode(&self, frame: &VideoFrame) -> Result<EncodedPayload> {
        if frame.format.is_compressed() {
            if frame.is_valid_jpeg() {
                return Ok(frame.data_bytes());
            }
            return Err(AppError::Encode(format!(
                "Invalid {} frame (sequence {})",
                frame.format, frame.sequence
            )));
        }

        let encoded = self.encoder.lock().encode(frame)?;
        Ok(encoded.data)
    }

    /// Close every subscriber's queue and empty the live set
    ///
    /// Idempotent. Later `publish` calls find no subscribers.
    pub fn close_all(&self) {
        let slots = {
            let mut live = self.live.lock();
            live.closed = true;
            std::mem::take(&mut live.slots)
        };

        if !slots.is_empty() {
            info!(count = slots.len(), "Closed all subscribers");
        }
    }

    /// Last payload that was fanned out, if any
    pub fn latest_payload(&self) -> Option<EncodedPayload> {
        self.latest.load_full().map(|payload| (*payload).clone())
    }

    /// Per-client statistics for the live set
    pub fn clients(&self) -> Vec<ClientStats> {
        self.live
            .lock()
            .slots
            .iter()
            .map(|slot| slot.info.stats())
            .collect()
    }

    pub fn stats(&self) -> HubStats {
        let (clients, closed) = {
            let live = self.live.lock();
            let clients: Vec<ClientStats> =
                live.slots.iter().map(|slot| slot.info.stats()).collect();
            (clients, live.closed)
        };

        HubStats {
            subscribers: clients.len(),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            evicted_slow: self.evicted_slow.load(Ordering::Relaxed),
            evicted_disconnected: self.evicted_disconnected.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            closed,
            clients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::testing::{raw_frame, StubEncoder};
    use crate::video::{PixelFormat, Resolution};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc::error::TryRecvError;

    fn hub() -> (BroadcastHub, Arc<AtomicUsize>) {
        let (encoder, calls) = StubEncoder::new();
        (BroadcastHub::new(Box::new(encoder)), calls)
    }

    #[test]
    fn test_publish_without_subscribers_skips_encoder() {
        let (hub, calls) = hub();
        assert!(!hub.has_subscribers());
        assert_eq!(hub.publish(raw_frame(b"X", 1)).unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(hub.latest_payload().is_none());
    }

    #[test]
    fn test_fanout_shares_one_payload() {
        let (hub, calls) = hub();
        let mut subs: Vec<_> = (0..3).map(|_| hub.subscribe()).collect();
        assert!(hub.has_subscribers());

        assert_eq!(hub.publish(raw_frame(b"frame-1", 1)).unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let payloads: Vec<_> = subs.iter_mut().map(|s| s.try_recv().unwrap()).collect();
        for payload in &payloads {
            assert_eq!(&payload[..], b"frame-1");
            // Same allocation, not a copy per subscriber
            assert_eq!(payload.as_ptr(), payloads[0].as_ptr());
        }
        for sub in &mut subs {
            assert!(matches!(sub.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[test]
    fn test_slow_subscriber_evicted() {
        let (hub, _) = hub();
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        for seq in 1..=2u64 {
            assert_eq!(hub.publish(raw_frame(&[seq as u8], seq)).unwrap(), 2);
            assert_eq!(fast.try_recv().unwrap()[0], seq as u8);
        }

        // Third publish finds the slow queue full
        assert_eq!(hub.publish(raw_frame(&[3], 3)).unwrap(), 1);
        assert_eq!(fast.try_recv().unwrap()[0], 3);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.clients()[0].id, *fast.id());

        // Buffered payloads are still delivered, then the queue reports closed
        assert_eq!(slow.try_recv().unwrap()[0], 1);
        assert_eq!(slow.try_recv().unwrap()[0], 2);
        assert!(matches!(slow.try_recv(), Err(TryRecvError::Disconnected)));

        // Publishing keeps reaching the draining subscriber
        assert_eq!(hub.publish(raw_frame(&[4], 4)).unwrap(), 1);
        assert_eq!(fast.try_recv().unwrap()[0], 4);

        let stats = hub.stats();
        assert_eq!(stats.evicted_slow, 1);
        assert_eq!(stats.frames_published, 4);
        assert_eq!(stats.frames_delivered, 2 + 2 + 1 + 1);
    }

    #[test]
    fn test_per_subscriber_fifo() {
        let (hub, _) = hub();
        let mut sub = hub.subscribe();
        hub.publish(raw_frame(b"first", 1)).unwrap();
        hub.publish(raw_frame(b"second", 2)).unwrap();
        assert_eq!(&sub.try_recv().unwrap()[..], b"first");
        assert_eq!(&sub.try_recv().unwrap()[..], b"second");
    }

    #[tokio::test]
    async fn test_close_all() {
        let (hub, calls) = hub();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.close_all();
        assert!(hub.is_closed());
        assert!(!hub.has_subscribers());
        assert_eq!(hub.publish(raw_frame(b"X", 1)).unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(a.recv().await.is_none());
        assert!(b.recv().await.is_none());

        // Idempotent
        hub.close_all();
        assert_eq!(hub.subscriber_count(), 0);

        // Late subscribers observe immediate closure
        let mut late = hub.subscribe();
        assert!(late.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_encode_failure_delivers_nothing() {
        let (encoder, calls) = StubEncoder::failing();
        let hub = BroadcastHub::new(Box::new(encoder));
        let mut sub = hub.subscribe();

        let err = hub.publish(raw_frame(b"X", 1)).unwrap_err();
        assert!(matches!(err, AppError::Encode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(hub.subscriber_count(), 1);

        let stats = hub.stats();
        assert_eq!(stats.encode_failures, 1);
        assert_eq!(stats.frames_published, 0);
    }

    #[test]
    fn test_dropped_subscriber_removed_on_next_publish() {
        let (hub, _) = hub();
        let gone = hub.subscribe();
        let mut kept = hub.subscribe();
        drop(gone);

        // Lingers until a publish pass notices
        assert_eq!(hub.subscriber_count(), 2);
        assert_eq!(hub.publish(raw_frame(b"X", 1)).unwrap(), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(&kept.try_recv().unwrap()[..], b"X");
        assert_eq!(hub.stats().evicted_disconnected, 1);
    }

    #[test]
    fn test_unsubscribe() {
        let (hub, _) = hub();
        let mut sub = hub.subscribe();
        let id = sub.id().clone();

        assert!(hub.unsubscribe(&id));
        assert!(!hub.unsubscribe(&id));
        assert!(!hub.has_subscribers());
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_compressed_frames_pass_through() {
        let (hub, calls) = hub();
        let mut sub = hub.subscribe();
        let jpeg = vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
        let frame = VideoFrame::from_vec(jpeg.clone(), Resolution::VGA, PixelFormat::Mjpeg, 1);

        assert_eq!(hub.publish(frame).unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(&sub.try_recv().unwrap()[..], &jpeg[..]);
        assert_eq!(&hub.latest_payload().unwrap()[..], &jpeg[..]);

        let broken = VideoFrame::from_vec(vec![0, 1, 2, 3], Resolution::VGA, PixelFormat::Jpeg, 2);
        assert!(hub.publish(broken).is_err());
    }

    #[test]
    fn test_capacity_floor() {
        let (encoder, _) = StubEncoder::new();
        let hub = BroadcastHub::with_capacity(Box::new(encoder), 0);
        assert_eq!(hub.capacity(), 1);
    }

    #[test]
    fn test_concurrent_subscribe_and_publish() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 50;
        const PUBLISHES: u64 = 200;

        let (hub, _) = hub();
        let hub = &hub;

        let subscribers: Vec<Subscriber> = std::thread::scope(|scope| {
            let publisher = scope.spawn(move || {
                for seq in 0..PUBLISHES {
                    hub.publish(raw_frame(b"payload", seq)).unwrap();
                    assert!(hub.subscriber_count() <= THREADS * PER_THREAD);
                }
            });

            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(move || {
                        (0..PER_THREAD)
                            .map(|_| {
                                let sub = hub.subscribe();
                                std::thread::yield_now();
                                sub
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            publisher.join().unwrap();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        // Every subscriber is either still live or was evicted with its queue closed
        let mut closed = 0;
        for mut sub in subscribers {
            loop {
                match sub.try_recv() {
                    Ok(_) => continue,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed += 1;
                        break;
                    }
                }
            }
        }

        let stats = hub.stats();
        assert_eq!(stats.subscribers + closed, THREADS * PER_THREAD);
        assert_eq!(stats.evicted_slow as usize, closed);
    }

    #[test]
    fn test_consumer_close_removed_on_next_publish() {
        let (hub, _) = hub();
        let mut closing = hub.subscribe();
        let mut open = hub.subscribe();

        hub.publish(raw_frame(b"before", 1)).unwrap();
        closing.close();
        assert_eq!(&closing.try_recv().unwrap()[..], b"before");
        assert!(matches!(closing.try_recv(), Err(TryRecvError::Disconnected)));
        assert_eq!(hub.subscriber_count(), 2);

        assert_eq!(hub.publish(raw_frame(b"after", 2)).unwrap(), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.stats().evicted_disconnected, 1);
        assert_eq!(&open.try_recv().unwrap()[..], b"before");
        assert_eq!(&open.try_recv().unwrap()[..], b"after");
    }

    /// Encoder that shuts its hub down mid-encode
    struct ClosingEncoder {
        hub: Arc<std::sync::OnceLock<std::sync::Weak<BroadcastHub>>>,
        config: crate::video::EncoderConfig,
    }

    impl Encoder for ClosingEncoder {
        fn name(&self) -> &str {
            "closing"
        }

        fn encode(&mut self, frame: &VideoFrame) -> Result<crate::video::EncodedFrame> {
            if let Some(hub) = self.hub.get().and_then(|weak| weak.upgrade()) {
                hub.close_all();
            }
            Ok(crate::video::EncodedFrame::jpeg(
                frame.data_bytes(),
                frame.resolution,
                frame.sequence,
            ))
        }

        fn config(&self) -> &crate::video::EncoderConfig {
            &self.config
        }

        fn supports_format(&self, _format: PixelFormat) -> bool {
            true
        }
    }

    #[test]
    fn test_close_during_encode_publishes_nothing() {
        let slot = Arc::new(std::sync::OnceLock::new());
        let encoder = ClosingEncoder {
            hub: slot.clone(),
            config: Default::default(),
        };
        let hub = Arc::new(BroadcastHub::new(Box::new(encoder)));
        let _ = slot.set(Arc::downgrade(&hub));

        let _sub = hub.subscribe();
        assert_eq!(hub.publish(raw_frame(b"X", 1)).unwrap(), 0);

        let stats = hub.stats();
        assert!(stats.closed);
        assert_eq!(stats.frames_published, 0);
        assert_eq!(stats.frames_delivered, 0);
        assert!(hub.latest_payload().is_none());
    }
}
