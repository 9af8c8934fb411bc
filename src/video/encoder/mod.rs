//! Frame encoder implementations
//!
//! - `JpegEncoder` - pure Rust JPEG encoding (always available)
//! - `TurboJpegEncoder` - libjpeg-turbo JPEG encoding (`turbojpeg` feature)

pub mod jpeg;
pub mod traits;
#[cfg(feature = "turbojpeg")]
pub mod turbo;

pub use traits::{EncodedFrame, Encoder, EncoderBackend, EncoderConfig, DEFAULT_JPEG_QUALITY};

pub use jpeg::JpegEncoder;
#[cfg(feature = "turbojpeg")]
pub use turbo::TurboJpegEncoder;

use crate::error::Result;

/// Create an encoder for the configured backend
pub fn create_encoder(backend: EncoderBackend, config: EncoderConfig) -> Result<Box<dyn Encoder>> {
    match backend {
        EncoderBackend::Image => Ok(Box::new(JpegEncoder::new(config))),
        #[cfg(feature = "turbojpeg")]
        EncoderBackend::Turbojpeg => Ok(Box::new(TurboJpegEncoder::new(config)?)),
        #[cfg(not(feature = "turbojpeg"))]
        EncoderBackend::Turbojpeg => Err(crate::error::AppError::Config(
            "turbojpeg encoder requested but framecast was built without the `turbojpeg` feature"
                .to_string(),
        )),
    }
}
