//! Frame sources for the producer loop

use super::format::{PixelFormat, Resolution};
use super::frame::VideoFrame;

/// Something that renders one frame per producer tick
pub trait FrameSource: Send {
    /// Output resolution
    fn resolution(&self) -> Resolution;

    /// Render the frame for tick `sequence`
    fn render(&mut self, sequence: u64) -> VideoFrame;
}

/// SMPTE-style colour bars (RGB24)
const BARS: [[u8; 3]; 8] = [
    [0xC0, 0xC0, 0xC0],
    [0xC0, 0xC0, 0x00],
    [0x00, 0xC0, 0xC0],
    [0x00, 0xC0, 0x00],
    [0xC0, 0x00, 0xC0],
    [0xC0, 0x00, 0x00],
    [0x00, 0x00, 0xC0],
    [0x10, 0x10, 0x10],
];

/// Width of the moving white stripe, in pixels
const STRIPE_WIDTH: u32 = 8;

/// Colour bars with a white stripe that advances 4 pixels per frame
pub struct TestPattern {
    resolution: Resolution,
    /// Pre-rendered bars, copied into each frame
    background: Vec<u8>,
}

impl TestPattern {
    /// Zero dimensions are raised to 1 pixel
    pub fn new(resolution: Resolution) -> Self {
        let resolution = Resolution::new(resolution.width.max(1), resolution.height.max(1));
        let width = resolution.width as usize;
        let height = resolution.height as usize;
        let mut row = Vec::with_capacity(width * 3);
        for x in 0..width {
            let bar = (x * BARS.len() / width).min(BARS.len() - 1);
            row.extend_from_slice(&BARS[bar]);
        }
        let mut background = Vec::with_capacity(width * height * 3);
        for _ in 0..height {
            background.extend_from_slice(&row);
        }
        Self {
            resolution,
            background,
        }
    }
}

impl FrameSource for TestPattern {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn render(&mut self, sequence: u64) -> VideoFrame {
        let width = self.resolution.width;
        let stride = width as usize * 3;
        let mut data = self.background.clone();

        let offset = ((sequence * 4) % width as u64) as u32;
        for row in data.chunks_exact_mut(stride) {
            for dx in 0..STRIPE_WIDTH {
                let x = ((offset + dx) % width) as usize;
                row[x * 3..x * 3 + 3].copy_from_slice(&[0xFF, 0xFF, 0xFF]);
            }
        }

        VideoFrame::from_vec(data, self.resolution, PixelFormat::Rgb24, sequence)
    }
}
