//! MJPEG streaming session
//!
//! Drains one subscriber and writes every payload to one connection as a
//! `multipart/x-mixed-replace` part:
//!
//! ```text
//! \r\n--frame\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <payload>\r\n
//! ```
//!
//! Each part is flushed before waiting for the next payload. There is no
//! end-of-stream marker; the stream ends when the connection closes.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::subscriber::Subscriber;

/// Response content type for the multipart stream
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Bytes written before each payload
pub const PART_HEADER: &[u8] = b"\r\n--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// Bytes written after each payload
pub const PART_TRAILER: &[u8] = b"\r\n";

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The subscriber's queue was closed (evicted, unsubscribed or hub shut down)
    QueueClosed,
    /// Writing to the connection failed
    Disconnected,
}

/// Build one multipart part for `payload`
pub fn mjpeg_part(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(PART_HEADER.len() + payload.len() + PART_TRAILER.len());
    buf.put_slice(PART_HEADER);
    buf.put_slice(payload);
    buf.put_slice(PART_TRAILER);
    buf.freeze()
}

/// One viewer connection fed by one subscriber
pub struct StreamingSession {
    subscriber: Subscriber,
}

impl StreamingSession {
    pub fn new(subscriber: Subscriber) -> Self {
        Self { subscriber }
    }

    /// Stream until the queue closes or a write fails
    ///
    /// Write errors end the session quietly; the hub is not told; it drops
    /// the subscriber on a later publish pass.
    pub async fn run<W>(mut self, writer: &mut W) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        let client = self.subscriber.id().clone();

        let end = loop {
            let Some(payload) = self.subscriber.recv().await else {
                break SessionEnd::QueueClosed;
            };

            if let Err(e) = write_part(writer, &payload).await {
                debug!(client = %client, error = %e, "Viewer connection lost");
                break SessionEnd::Disconnected;
            }
            self.subscriber.info().record_frame_sent();
        };

        if end == SessionEnd::QueueClosed {
            // Best effort, the peer may already be gone
            let _ = writer.shutdown().await;
        }

        let info = self.subscriber.info();
        debug!(
            client = %client,
            reason = ?end,
            frames_sent = info.frames_sent(),
            secs = info.connected_duration().as_secs_f32(),
            "Streaming session ended"
        );
        end
    }
}

async fn write_part<W>(writer: &mut W, payload: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&mjpeg_part(payload)).await?;
    writer.flush().await
}
