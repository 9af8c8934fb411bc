//! libjpeg-turbo encoder (`turbojpeg` feature)
//!
//! turbojpeg accepts RGB/BGR/RGBA/grey input with an arbitrary pitch, so no
//! repacking is needed before compression.

use bytes::Bytes;

use super::traits::{EncodedFrame, Encoder, EncoderConfig};
use crate::error::{AppError, Result};
use crate::video::format::PixelFormat;
use crate::video::frame::VideoFrame;

/// JPEG encoder using libjpeg-turbo
///
/// Note: This encoder is NOT thread-safe due to turbojpeg limitations.
/// Use it from a single thread or wrap in a Mutex.
pub struct TurboJpegEncoder {
    config: EncoderConfig,
    compressor: turbojpeg::Compressor,
}

impl TurboJpegEncoder {
    /// Create a new libjpeg-turbo encoder
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let mut compressor = turbojpeg::Compressor::new().map_err(|e| {
            AppError::Encode(format!("Failed to create turbojpeg compressor: {}", e))
        })?;

        compressor
            .set_quality(config.quality as i32)
            .map_err(|e| AppError::Encode(format!("Failed to set JPEG quality: {}", e)))?;

        Ok(Self { config, compressor })
    }
}

fn turbo_format(format: PixelFormat) -> Option<turbojpeg::PixelFormat> {
    match format {
        PixelFormat::Rgb24 => Some(turbojpeg::PixelFormat::RGB),
        PixelFormat::Bgr24 => Some(turbojpeg::PixelFormat::BGR),
        PixelFormat::Rgba32 => Some(turbojpeg::PixelFormat::RGBA),
        PixelFormat::Grey => Some(turbojpeg::PixelFormat::GRAY),
        PixelFormat::Mjpeg | PixelFormat::Jpeg => None,
    }
}

impl Encoder for TurboJpegEncoder {
    fn name(&self) -> &str {
        "JPEG (turbojpeg)"
    }

    fn encode(&mut self, frame: &VideoFrame) -> Result<EncodedFrame> {
        let format = turbo_format(frame.format).ok_or_else(|| {
            AppError::Encode(format!("Unsupported format for JPEG encoding: {}", frame.format))
        })?;
        let bpp = frame.format.bytes_per_pixel().unwrap_or(3);
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let pitch = if frame.stride == 0 {
            width * bpp
        } else {
            frame.stride as usize
        };

        if width == 0 || height == 0 || pitch < width * bpp || frame.len() < pitch * height {
            return Err(AppError::Encode(format!(
                "{} data too small: {} < {}",
                frame.format,
                frame.len(),
                pitch * height
            )));
        }

        // Greyscale input can only be encoded with grey subsampling
        let subsamp = if frame.format == PixelFormat::Grey {
            turbojpeg::Subsamp::Gray
        } else {
            turbojpeg::Subsamp::Sub2x2
        };
        self.compressor
            .set_subsamp(subsamp)
            .map_err(|e| AppError::Encode(format!("Failed to set subsampling: {}", e)))?;

        let image = turbojpeg::Image {
            pixels: frame.data(),
            width,
            pitch,
            height,
            format,
        };

        let jpeg_data = self
            .compressor
            .compress_to_vec(image)
            .map_err(|e| AppError::Encode(format!("JPEG compression failed: {}", e)))?;

        Ok(EncodedFrame::jpeg(
            Bytes::from(jpeg_data),
            frame.resolution,
            frame.sequence,
        ))
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn supports_format(&self, format: PixelFormat) -> bool {
        turbo_format(format).is_some()
    }
}
