use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::stream::DEFAULT_QUEUE_CAPACITY;
use crate::video::encoder::{EncoderBackend, DEFAULT_JPEG_QUALITY};
use crate::video::Resolution;

/// Upper bound for the producer frame rate
pub const MAX_FPS: u32 = 240;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// Broadcast settings
    pub stream: StreamConfig,
    /// Built-in frame producer settings
    pub producer: ProducerConfig,
}

impl AppConfig {
    /// Reject settings the broadcaster cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.stream.queue_capacity == 0 {
            return Err(AppError::Config("stream.queue_capacity must be at least 1".into()));
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(AppError::Config(format!(
                "stream.jpeg_quality must be within 1-100, got {}",
                self.stream.jpeg_quality
            )));
        }
        if !self.stream.encoder.is_available() {
            return Err(AppError::Config(format!(
                "stream.encoder '{}' is not compiled in",
                self.stream.encoder
            )));
        }
        if self.producer.fps == 0 || self.producer.fps > MAX_FPS {
            return Err(AppError::Config(format!(
                "producer.fps must be within 1-{}, got {}",
                MAX_FPS, self.producer.fps
            )));
        }
        let resolution = self.producer.resolution();
        if !resolution.is_valid() {
            return Err(AppError::Config(format!(
                "producer resolution {} is out of range",
                resolution
            )));
        }
        Ok(())
    }
}

/// Broadcast configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Per-viewer queue capacity; a viewer this many frames behind is dropped
    pub queue_capacity: usize,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// JPEG encoder implementation
    pub encoder: EncoderBackend,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            encoder: EncoderBackend::default(),
        }
    }
}

/// Built-in test pattern producer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProducerConfig {
    /// Run the producer loop
    pub enabled: bool,
    /// Frames per second
    pub fps: u32,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fps: 30,
            width: 640,
            height: 480,
        }
    }
}

impl ProducerConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP port
    pub http_port: u16,
    /// Bind address
    pub bind_address: String,
    /// Bind addresses; takes precedence over `bind_address` when non-empty
    pub bind_addresses: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            bind_address: "0.0.0.0".to_string(),
            bind_addresses: Vec::new(),
        }
    }
}

impl WebConfig {
    /// Addresses to listen on, before parsing
    pub fn listen_addresses(&self) -> &[String] {
        if !self.bind_addresses.is_empty() {
            self.bind_addresses.as_slice()
        } else {
            std::slice::from_ref(&self.bind_address)
        }
    }
}
