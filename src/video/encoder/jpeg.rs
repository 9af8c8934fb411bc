//! JPEG encoder implementation
//!
//! Pure Rust baseline JPEG encoding via the `image` crate. Accepts RGB24,
//! BGR24, RGBA32 and greyscale frames; anything that is not already tightly
//! packed RGB/grey is repacked into a scratch buffer first.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use super::traits::{EncodedFrame, Encoder, EncoderConfig};
use crate::error::{AppError, Result};
use crate::video::format::PixelFormat;
use crate::video::frame::VideoFrame;

/// JPEG encoder backed by `image::codecs::jpeg`
pub struct JpegEncoder {
    config: EncoderConfig,
    /// Scratch buffer for repacking strided / BGR / RGBA input
    scratch: Vec<u8>,
    /// Output buffer, reused between frames
    output: Vec<u8>,
}

impl JpegEncoder {
    /// Create a new JPEG encoder
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            scratch: Vec::new(),
            output: Vec::with_capacity(64 * 1024),
        }
    }

    /// Create with specific quality
    pub fn with_quality(quality: u8) -> Self {
        Self::new(EncoderConfig::jpeg(quality))
    }

    /// Copy `frame` into `scratch` as tightly packed RGB8 or L8
    fn repack(&mut self, frame: &VideoFrame) -> Result<ExtendedColorType> {
        let bpp = frame.format.bytes_per_pixel().ok_or_else(|| {
            AppError::Encode(format!("Unsupported format for JPEG encoding: {}", frame.format))
        })?;

        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let stride = if frame.stride == 0 {
            width * bpp
        } else {
            frame.stride as usize
        };

        if width == 0 || height == 0 {
            return Err(AppError::Encode(format!("Empty frame: {}", frame.resolution)));
        }
        if stride < width * bpp {
            return Err(AppError::Encode(format!(
                "{} stride too small: {} < {}",
                frame.format,
                stride,
                width * bpp
            )));
        }
        let expected_size = stride * (height - 1) + width * bpp;
        if frame.len() < expected_size {
            return Err(AppError::Encode(format!(
                "{} data too small: {} < {}",
                frame.format,
                frame.len(),
                expected_size
            )));
        }

        let (color, out_bpp) = match frame.format {
            PixelFormat::Grey => (ExtendedColorType::L8, 1),
            _ => (ExtendedColorType::Rgb8, 3),
        };

        self.scratch.clear();
        self.scratch.reserve(width * height * out_bpp);
        let data = frame.data();
        for row in 0..height {
            let line = &data[row * stride..row * stride + width * bpp];
            match frame.format {
                PixelFormat::Rgb24 | PixelFormat::Grey => self.scratch.extend_from_slice(line),
                PixelFormat::Bgr24 => {
                    for px in line.chunks_exact(3) {
                        self.scratch.extend_from_slice(&[px[2], px[1], px[0]]);
                    }
                }
                PixelFormat::Rgba32 => {
                    for px in line.chunks_exact(4) {
                        self.scratch.extend_from_slice(&px[..3]);
                    }
                }
                PixelFormat::Mjpeg | PixelFormat::Jpeg => unreachable!("rejected above"),
            }
        }

        Ok(color)
    }
}

impl Encoder for JpegEncoder {
    fn name(&self) -> &str {
        "JPEG (image)"
    }

    fn encode(&mut self, frame: &VideoFrame) -> Result<EncodedFrame> {
        let color = self.repack(frame)?;

        self.output.clear();
        ImageJpegEncoder::new_with_quality(&mut self.output, self.config.quality)
            .encode(&self.scratch, frame.width(), frame.height(), color)
            .map_err(|e| AppError::Encode(format!("JPEG compression failed: {}", e)))?;

        Ok(EncodedFrame::jpeg(
            Bytes::copy_from_slice(&self.output),
            frame.resolution,
            frame.sequence,
        ))
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn supports_format(&self, format: PixelFormat) -> bool {
        matches!(
            format,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba32 | PixelFormat::Grey
        )
    }
}
