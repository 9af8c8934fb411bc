//! Frame broadcasting
//!
//! # Components
//!
//! - `BroadcastHub` - subscriber registry, encode-once fan-out, drop-on-full backpressure
//! - `Subscriber` - bounded payload queue owned by one viewer
//! - `StreamingSession` - writes one subscriber's payloads as multipart MJPEG
//! - `spawn_producer` - render loop feeding the hub
//!
//! # Data flow
//!
//! ```text
//! FrameSource ──render──> spawn_producer ──publish──> BroadcastHub
//!                                                       │ encode once
//!                              ┌────────────────────────┼────────────────────────┐
//!                              ▼                        ▼                        ▼
//!                         [Subscriber]             [Subscriber]             [Subscriber]
//!                              │                        │                        │
//!                      StreamingSession         StreamingSession         StreamingSession
//!                              │                        │                        │
//!                             TCP                      TCP                      TCP
//! ```

pub mod hub;
pub mod producer;
pub mod session;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod testing;

pub use hub::{BroadcastHub, HubStats, DEFAULT_QUEUE_CAPACITY};
pub use producer::{spawn_producer, ProducerStats};
pub use session::{mjpeg_part, SessionEnd, StreamingSession, MJPEG_CONTENT_TYPE};
pub use subscriber::{ClientId, ClientStats, EncodedPayload, Subscriber, SubscriberInfo};
