use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::{sink::SinkMapErr, SinkExt};
use serde::Serialize;
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::io::{CopyToBytes, SinkWriter};
use tokio_util::sync::{PollSendError, PollSender};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream::{HubStats, StreamingSession, MJPEG_CONTENT_TYPE};

/// `AsyncWrite` half of a part channel; every write becomes one body chunk
type PartWriter =
    SinkWriter<CopyToBytes<SinkMapErr<PollSender<Bytes>, fn(PollSendError<Bytes>) -> io::Error>>>;

fn body_closed(_: PollSendError<Bytes>) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped")
}

/// Bounded channel (capacity=1) between a session and the response body
///
/// The session can run at most one part ahead of the HTTP client; beyond that
/// its subscriber queue fills and the hub evicts it.
fn part_channel() -> (PartWriter, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel::<Bytes>(1);
    let sink = PollSender::new(tx).sink_map_err(body_closed as fn(_) -> _);
    (SinkWriter::new(CopyToBytes::new(sink)), rx)
}

// ============================================================================
// Health & Status
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Stream status response
#[derive(Serialize)]
pub struct StreamStatus {
    /// Per-viewer queue capacity
    pub queue_capacity: usize,
    #[serde(flatten)]
    pub hub: HubStats,
}

/// GET /api/stream/status
pub async fn stream_status(State(state): State<Arc<AppState>>) -> Json<StreamStatus> {
    Json(StreamStatus {
        queue_capacity: state.hub.capacity(),
        hub: state.hub.stats(),
    })
}

/// GET /api/config - effective configuration (read-only)
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<AppConfig> {
    Json(state.config.clone())
}

// ============================================================================
// MJPEG Streaming
// ============================================================================

/// MJPEG multipart stream, one subscriber per connection
///
/// The session writes into a capacity-1 part channel whose receiver is the
/// response body. When the client goes away hyper drops the body, the next
/// write in the session fails and the session ends.
pub async fn mjpeg_stream(State(state): State<Arc<AppState>>) -> Response {
    let subscriber = state.hub.subscribe();
    let client_id = subscriber.id().clone();
    let (mut writer, rx) = part_channel();

    tokio::spawn(async move {
        StreamingSession::new(subscriber).run(&mut writer).await;
    });

    debug!(client = %client_id, "MJPEG stream opened");

    let body = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|part| (Ok::<_, Infallible>(part), rx))
    });

    (
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Single JPEG snapshot of the last broadcast frame
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Result<Response> {
    let payload = state
        .hub
        .latest_payload()
        .ok_or_else(|| AppError::ServiceUnavailable("No frame available".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        payload,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::broadcast;

    use crate::config::AppConfig;
    use crate::state::AppState;
    use crate::stream::testing::{raw_frame, StubEncoder};
    use crate::stream::{mjpeg_part, BroadcastHub, StreamingSession};
    use crate::web::create_router;

    use super::part_channel;

    async fn serve() -> (SocketAddr, Arc<AppState>) {
        let (encoder, _) = StubEncoder::new();
        let hub = Arc::new(BroadcastHub::new(Box::new(encoder)));
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = AppState::new(AppConfig::default(), hub, shutdown_tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    /// HTTP/1.0 request so the body is delimited by connection close
    async fn request(addr: SocketAddr, path: &str) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.0\r\nHost: localhost\r\n\r\n", path).as_bytes())
            .await
            .unwrap();
        stream
    }

    fn split_response(raw: &[u8]) -> Option<(String, Vec<u8>)> {
        let end = raw.windows(4).position(|w| w == b"\r\n\r\n")?;
        let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
        Some((head, raw[end + 4..].to_vec()))
    }

    async fn get(addr: SocketAddr, path: &str) -> (String, Vec<u8>) {
        let mut stream = request(addr, path).await;
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        split_response(&raw).unwrap()
    }

    async fn read_until(stream: &mut TcpStream, raw: &mut Vec<u8>, done: impl Fn(&[u8]) -> bool) {
        let mut chunk = [0u8; 4096];
        while !done(raw) {
            let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
                .await
                .expect("timed out waiting for stream data")
                .unwrap();
            assert!(n > 0, "connection closed early");
            raw.extend_from_slice(&chunk[..n]);
        }
    }

    async fn wait_for_subscribers(state: &AppState, count: usize) {
        for _ in 0..200 {
            if state.hub.subscriber_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} subscribers", count);
    }

    #[tokio::test]
    async fn test_health() {
        let (addr, _) = serve().await;
        let (head, body) = get(addr, "/api/health").await;
        assert!(head.starts_with("http/1.0 200") || head.starts_with("http/1.1 200"));
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_mjpeg_stream_end_to_end() {
        let (addr, state) = serve().await;
        let mut stream = request(addr, "/api/stream").await;
        wait_for_subscribers(&state, 1).await;

        let expected_x = mjpeg_part(b"X");
        state.hub.publish(raw_frame(b"X", 1)).unwrap();

        let mut raw = Vec::new();
        read_until(&mut stream, &mut raw, |r| {
            split_response(r).is_some_and(|(_, body)| body.len() >= expected_x.len())
        })
        .await;
        let (head, _) = split_response(&raw).unwrap();
        assert!(head.contains("content-type: multipart/x-mixed-replace; boundary=frame"));
        assert!(head.contains("cache-control: no-cache"));

        state.hub.publish(raw_frame(b"Y", 2)).unwrap();
        state.hub.close_all();

        // Queue closure ends the response; HTTP/1.0 closes the connection
        stream.read_to_end(&mut raw).await.unwrap();
        let (_, body) = split_response(&raw).unwrap();

        let mut expected = expected_x.to_vec();
        expected.extend_from_slice(&mjpeg_part(b"Y"));
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn test_disconnected_viewer_dropped_on_next_publish() {
        let (addr, state) = serve().await;
        let stream = request(addr, "/api/stream").await;
        wait_for_subscribers(&state, 1).await;

        drop(stream);

        // The closed queue is noticed lazily by publish passes
        for seq in 0..200u64 {
            state.hub.publish(raw_frame(b"frame", seq)).unwrap();
            if state.hub.subscriber_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("disconnected viewer was never dropped");
    }

    #[tokio::test]
    async fn test_snapshot() {
        let (addr, state) = serve().await;

        let (head, _) = get(addr, "/api/snapshot").await;
        assert!(head.contains(" 503 "));

        let _sub = state.hub.subscribe();
        state.hub.publish(raw_frame(b"JPEGDATA", 1)).unwrap();

        let (head, body) = get(addr, "/api/snapshot").await;
        assert!(head.contains(" 200 "));
        assert!(head.contains("content-type: image/jpeg"));
        assert_eq!(body, b"JPEGDATA");
    }

    #[tokio::test]
    async fn test_stream_status() {
        let (addr, state) = serve().await;
        let sub = state.hub.subscribe();
        state.hub.publish(raw_frame(b"X", 1)).unwrap();

        let (_, body) = get(addr, "/api/stream/status").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["queue_capacity"], 2);
        assert_eq!(json["subscribers"], 1);
        assert_eq!(json["frames_published"], 1);
        assert_eq!(json["clients"][0]["id"], sub.id().as_str());
    }

    #[tokio::test]
    async fn test_part_channel_yields_whole_parts() {
        let (encoder, _) = StubEncoder::new();
        let hub = BroadcastHub::new(Box::new(encoder));
        let (mut writer, mut rx) = part_channel();
        let session = tokio::spawn({
            let sub = hub.subscribe();
            async move { StreamingSession::new(sub).run(&mut writer).await }
        });

        let large = vec![0xABu8; 100 * 1024];
        hub.publish(raw_frame(b"X", 1)).unwrap();
        assert_eq!(rx.recv().await.unwrap(), mjpeg_part(b"X"));
        hub.publish(raw_frame(&large, 2)).unwrap();
        assert_eq!(rx.recv().await.unwrap(), mjpeg_part(&large));

        hub.close_all();
        assert!(rx.recv().await.is_none());
        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_unread_body_evicts_after_queue_fills() {
        let (encoder, _) = StubEncoder::new();
        let hub = BroadcastHub::new(Box::new(encoder));
        let (mut writer, _rx) = part_channel();
        let sub = hub.subscribe();
        tokio::spawn(async move { StreamingSession::new(sub).run(&mut writer).await });

        let payload = vec![0x55u8; 32 * 1024];
        // One part parked in the channel, one held by the session, two queued
        for seq in 1..=4u64 {
            assert_eq!(hub.publish(raw_frame(&payload, seq)).unwrap(), 1);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(hub.publish(raw_frame(&payload, 5)).unwrap(), 0);
        assert_eq!(hub.stats().evicted_slow, 1);
    }
}
