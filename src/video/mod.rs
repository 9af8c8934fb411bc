//! Frames, pixel formats, encoders and frame sources

pub mod encoder;
pub mod format;
pub mod frame;
pub mod pattern;

pub use encoder::{create_encoder, EncodedFrame, Encoder, EncoderBackend, EncoderConfig, JpegEncoder};
pub use format::{PixelFormat, Resolution};
pub use frame::VideoFrame;
pub use pattern::{FrameSource, TestPattern};
