//! Producer loop
//!
//! Renders frames from a `FrameSource` at a fixed rate and publishes them to
//! the hub. Rendering is skipped entirely while nobody is watching.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::hub::BroadcastHub;
use crate::error::AppError;
use crate::utils::LogThrottler;
use crate::video::FrameSource;
use crate::warn_throttled;

/// Counters reported when the loop stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Frames rendered and handed to the hub
    pub frames_rendered: u64,
    /// Ticks skipped because there were no subscribers
    pub ticks_idle: u64,
    /// Publishes that failed to encode
    pub encode_failures: u64,
}

/// Spawn the producer loop
///
/// Publishes run one at a time on the blocking pool, so frames reach the hub
/// in render order. The loop ends when `shutdown` fires or the hub is closed.
pub fn spawn_producer(
    hub: Arc<BroadcastHub>,
    mut source: Box<dyn FrameSource>,
    fps: u32,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<ProducerStats> {
    let period = Duration::from_secs(1) / fps.max(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let throttler = LogThrottler::default();
        let mut stats = ProducerStats::default();
        let mut sequence = 0u64;

        info!(
            fps,
            resolution = %source.resolution(),
            "Producer started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {}
            }

            if hub.is_closed() {
                break;
            }
            if !hub.has_subscribers() {
                stats.ticks_idle += 1;
                continue;
            }

            sequence += 1;
            let frame = source.render(sequence);
            stats.frames_rendered += 1;

            let publish_hub = hub.clone();
            let result = tokio::task::spawn_blocking(move || publish_hub.publish(frame))
                .await
                .unwrap_or_else(|e| Err(AppError::Internal(format!("publish task failed: {}", e))));

            match result {
                Ok(delivered) => {
                    throttler.clear("publish");
                    debug!(sequence, delivered, "Frame published");
                }
                Err(e) => {
                    stats.encode_failures += 1;
                    warn_throttled!(throttler, "publish", "Failed to publish frame {}: {}", sequence, e);
                }
            }
        }

        info!(
            frames = stats.frames_rendered,
            idle_ticks = stats.ticks_idle,
            failures = stats.encode_failures,
            "Producer stopped"
        );
        stats
    })
}
