//! Pixel format definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel layouts a frame source may hand to the broadcaster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    /// MJPEG compressed format (already encoded, forwarded as-is)
    Mjpeg,
    /// JPEG compressed format (already encoded, forwarded as-is)
    Jpeg,
    /// RGB24 format (3 bytes per pixel)
    Rgb24,
    /// BGR24 format (3 bytes per pixel)
    Bgr24,
    /// RGBA format (4 bytes per pixel, alpha ignored on encode)
    Rgba32,
    /// Grayscale format
    Grey,
}

impl PixelFormat {
    /// Check if format is compressed (JPEG/MJPEG)
    pub fn is_compressed(&self) -> bool {
        matches!(self, PixelFormat::Mjpeg | PixelFormat::Jpeg)
    }

    /// Get bytes per pixel for uncompressed formats
    /// Returns None for compressed formats
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Mjpeg | PixelFormat::Jpeg => None,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(3),
            PixelFormat::Rgba32 => Some(4),
            PixelFormat::Grey => Some(1),
        }
    }

    /// Calculate expected frame size for a given resolution
    /// Returns None for compressed formats (variable size)
    pub fn frame_size(&self, resolution: Resolution) -> Option<usize> {
        self.bytes_per_pixel()
            .map(|bpp| resolution.pixels() as usize * bpp)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Mjpeg => "MJPEG",
            PixelFormat::Jpeg => "JPEG",
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Bgr24 => "BGR24",
            PixelFormat::Rgba32 => "RGBA32",
            PixelFormat::Grey => "GREY",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MJPEG" | "MJPG" => Ok(PixelFormat::Mjpeg),
            "JPEG" => Ok(PixelFormat::Jpeg),
            "RGB24" | "RGB" => Ok(PixelFormat::Rgb24),
            "BGR24" | "BGR" => Ok(PixelFormat::Bgr24),
            "RGBA32" | "RGBA" => Ok(PixelFormat::Rgba32),
            "GREY" | "GRAY" => Ok(PixelFormat::Grey),
            _ => Err(format!("Unknown pixel format: {}", s)),
        }
    }
}

/// Resolution (width x height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if resolution is valid
    pub fn is_valid(&self) -> bool {
        self.width >= 160 && self.width <= 15360 && self.height >= 120 && self.height <= 8640
    }

    /// Get total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };
    pub const HD720: Resolution = Resolution {
        width: 1280,
        height: 720,
    };
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}
