//! Test doubles shared by the stream and web tests

use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::video::encoder::{EncodedFrame, Encoder, EncoderConfig};
use crate::video::{PixelFormat, Resolution, VideoFrame};

/// Encoder stub: the "encoded" payload is the frame's own bytes
pub(crate) struct StubEncoder {
    calls: Arc<AtomicUsize>,
    fail: bool,
    config: EncoderConfig,
}

impl StubEncoder {
    pub(crate) fn new() -> (Self, Arc<AtomicUsize>) {
        Self::build(false)
    }

    pub(crate) fn failing() -> (Self, Arc<AtomicUsize>) {
        Self::build(true)
    }

    fn build(fail: bool) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let encoder = Self {
            calls: calls.clone(),
            fail,
            config: EncoderConfig::default(),
        };
        (encoder, calls)
    }
}

impl Encoder for StubEncoder {
    fn name(&self) -> &str {
        "stub"
    }

    fn encode(&mut self, frame: &VideoFrame) -> Result<EncodedFrame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Encode("stub failure".to_string()));
        }
        Ok(EncodedFrame::jpeg(
            Bytes::copy_from_slice(frame.data()),
            frame.resolution,
            frame.sequence,
        ))
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn supports_format(&self, format: PixelFormat) -> bool {
        !format.is_compressed()
    }
}

/// Raw frame whose stub-encoded payload is exactly `data`
pub(crate) fn raw_frame(data: &[u8], sequence: u64) -> VideoFrame {
    VideoFrame::new(
        Bytes::copy_from_slice(data),
        Resolution::VGA,
        PixelFormat::Rgb24,
        0,
        sequence,
    )
}
