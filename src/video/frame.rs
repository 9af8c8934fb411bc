//! Video frame data structures

use bytes::Bytes;
use std::time::Instant;

use super::format::{PixelFormat, Resolution};

/// One rendered frame handed to the broadcaster
///
/// The pixel buffer is immutable once constructed; cloning a frame only bumps
/// the reference count of the underlying `Bytes`.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw frame data
    data: Bytes,
    /// Frame resolution
    pub resolution: Resolution,
    /// Pixel format
    pub format: PixelFormat,
    /// Stride (bytes per line), 0 for compressed formats
    pub stride: u32,
    /// Frame sequence number
    pub sequence: u64,
    /// Timestamp when the frame was produced
    pub capture_ts: Instant,
}

impl VideoFrame {
    /// Create a new video frame
    pub fn new(
        data: Bytes,
        resolution: Resolution,
        format: PixelFormat,
        stride: u32,
        sequence: u64,
    ) -> Self {
        Self {
            data,
            resolution,
            format,
            stride,
            sequence,
            capture_ts: Instant::now(),
        }
    }

    /// Create a frame from a Vec<u8>, deriving the stride from the format
    pub fn from_vec(
        data: Vec<u8>,
        resolution: Resolution,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        let stride = format
            .bytes_per_pixel()
            .map(|bpp| resolution.width * bpp as u32)
            .unwrap_or(0);
        Self::new(Bytes::from(data), resolution, format, stride, sequence)
    }

    /// Get frame data as bytes slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get frame data as Bytes (cheap clone)
    pub fn data_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Get data length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    /// Get age of this frame (time since it was produced)
    pub fn age(&self) -> std::time::Duration {
        self.capture_ts.elapsed()
    }

    /// Check if format is JPEG/MJPEG
    pub fn is_jpeg(&self) -> bool {
        self.format.is_compressed()
    }

    /// Validate JPEG frame data (SOI marker at the start, EOI or padding at the end)
    pub fn is_valid_jpeg(&self) -> bool {
        if !self.is_jpeg() || self.data.len() < 4 {
            return false;
        }
        let start_marker = ((self.data[0] as u16) << 8) | self.data[1] as u16;
        if start_marker != 0xFFD8 {
            return false;
        }
        let end = self.data.len();
        let end_marker = ((self.data[end - 2] as u16) << 8) | self.data[end - 1] as u16;
        // Valid end markers: 0xFFD9, 0xD900, 0x0000 (padded)
        matches!(end_marker, 0xFFD9 | 0xD900 | 0x0000)
    }
}
