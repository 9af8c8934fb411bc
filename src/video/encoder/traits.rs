//! Encoder traits and common types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::Result;
use crate::video::format::{PixelFormat, Resolution};
use crate::video::frame::VideoFrame;

/// Default JPEG quality (1-100)
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Encoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// JPEG quality (1-100), fixed for the lifetime of the encoder
    pub quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl EncoderConfig {
    pub fn jpeg(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

/// Encoded frame output
///
/// `data` is the payload fanned out to subscribers; it is reference counted,
/// so every queue shares the same allocation.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Encoded data
    pub data: Bytes,
    /// Resolution of the source frame
    pub resolution: Resolution,
    /// Source frame sequence number
    pub sequence: u64,
    /// Encoding timestamp
    pub timestamp: Instant,
}

impl EncodedFrame {
    pub fn jpeg(data: Bytes, resolution: Resolution, sequence: u64) -> Self {
        Self {
            data,
            resolution,
            sequence,
            timestamp: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Available JPEG encoder implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    /// Pure Rust encoder from the `image` crate
    #[default]
    Image,
    /// libjpeg-turbo (requires the `turbojpeg` feature)
    Turbojpeg,
}

impl EncoderBackend {
    /// Whether this backend was compiled in
    pub fn is_available(&self) -> bool {
        match self {
            EncoderBackend::Image => true,
            EncoderBackend::Turbojpeg => cfg!(feature = "turbojpeg"),
        }
    }
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderBackend::Image => write!(f, "image"),
            EncoderBackend::Turbojpeg => write!(f, "turbojpeg"),
        }
    }
}

/// Frame encoder used by the broadcast hub
///
/// Not `Sync`: some encoders (turbojpeg) keep per-instance native state. The hub
/// wraps its encoder in a mutex and only ever encodes from the producer context.
pub trait Encoder: Send {
    /// Get encoder name
    fn name(&self) -> &str;

    /// Encode one frame into a compressed payload
    fn encode(&mut self, frame: &VideoFrame) -> Result<EncodedFrame>;

    /// Get current configuration
    fn config(&self) -> &EncoderConfig;

    /// Check if encoder supports the given input format
    fn supports_format(&self, format: PixelFormat) -> bool;
}
