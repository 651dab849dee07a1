//! Camera frames at the acquisition boundary.
//!
//! Cameras hand over [`RawFrame`]s in whatever raster layout they produce.
//! Everything downstream works on single-channel luma, so [`Frame::from_raw`]
//! converts once at ingestion.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::image::{GrayImage, GrayImageView};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Bgr8,
    /// Planar I420; only the luma plane is used.
    Yuv420,
}

impl PixelFormat {
    /// Minimum byte length for a `width x height` raster.
    pub fn expected_len(self, width: usize, height: usize) -> usize {
        let n = width * height;
        match self {
            PixelFormat::Gray8 => n,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => n * 3,
            PixelFormat::Yuv420 => n + 2 * (width.div_ceil(2) * height.div_ceil(2)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("invalid frame dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
    #[error("invalid {format:?} buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer {
        format: PixelFormat,
        expected: usize,
        got: usize,
    },
    #[error("frame source failed: {0}")]
    Source(String),
}

/// Uncompressed frame as delivered by a camera driver.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub timestamp: Duration,
}

/// Luma frame with a capture timestamp and ingestion sequence number.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub image: GrayImage,
    pub timestamp: Duration,
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: GrayImage, timestamp: Duration, sequence: u64) -> Self {
        Self {
            image,
            timestamp,
            sequence,
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        self.image.view()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.image.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.image.height
    }

    /// Convert a raw raster to luma.
    pub fn from_raw(raw: &RawFrame, sequence: u64) -> Result<Self, FrameError> {
        let image = luma_from_raw(&raw.pixels, raw.width, raw.height, raw.format)?;
        Ok(Self::new(image, raw.timestamp, sequence))
    }
}

/// Extract an 8-bit luma raster from a packed buffer.
pub fn luma_from_raw(
    pixels: &[u8],
    width: usize,
    height: usize,
    format: PixelFormat,
) -> Result<GrayImage, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::InvalidDimensions { width, height });
    }
    let expected = format.expected_len(width, height);
    if pixels.len() < expected {
        return Err(FrameError::InvalidBuffer {
            format,
            expected,
            got: pixels.len(),
        });
    }

    let n = width * height;
    let data = match format {
        PixelFormat::Gray8 | PixelFormat::Yuv420 => pixels[..n].to_vec(),
        PixelFormat::Rgb8 => pixels[..n * 3]
            .chunks_exact(3)
            .map(|p| luma(p[0], p[1], p[2]))
            .collect(),
        PixelFormat::Bgr8 => pixels[..n * 3]
            .chunks_exact(3)
            .map(|p| luma(p[2], p[1], p[0]))
            .collect(),
    };

    Ok(GrayImage {
        width,
        height,
        data,
    })
}

// BT.601 weights in 8.8 fixed point.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Pull-style frame delivery.
pub trait FrameSource {
    /// Next frame, or `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, FrameError>;
}

/// In-memory source, mostly for replaying recorded sessions.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: VecDeque<RawFrame>,
}

impl VecFrameSource {
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, FrameError> {
        Ok(self.frames.pop_front())
    }
}
