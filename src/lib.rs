//! framecast - live frame broadcaster
//!
//! Encodes frames once and fans them out to any number of HTTP viewers as a
//! `multipart/x-mixed-replace` MJPEG stream. Slow viewers are dropped instead
//! of stalling the producer.

pub mod config;
pub mod error;
pub mod state;
pub mod stream;
pub mod utils;
pub mod video;
pub mod web;

pub use error::{AppError, Result};
