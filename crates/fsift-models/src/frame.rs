//! Raw frame buffers handed to the pre-processing pipeline.
//!
//! A `PixelBuffer` is a single still image from a camera feed or upload.
//! The pipeline only ever reads it; all stages work on borrowed buffers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Declared layout of the raw pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Single luma channel, 1 byte per pixel.
    Gray8,
    /// Interleaved RGB, 3 bytes per pixel.
    #[default]
    Rgb8,
    /// Interleaved RGBA, 4 bytes per pixel. Alpha is ignored by all stages.
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Returns the format name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Gray8 => "gray8",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Rgba8 => "rgba8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised when a frame buffer is structurally invalid.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame has zero width or height ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },

    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

/// A single frame: raw pixel bytes plus declared format and dimensions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PixelBuffer {
    /// Declared pixel layout.
    pub format: PixelFormat,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Raw interleaved pixel bytes, row-major.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a frame, validating dimensions against the buffer length.
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let frame = Self {
            format,
            width,
            height,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Re-check structural invariants.
    ///
    /// Deserialized buffers may carry inconsistent dimensions; the pipeline
    /// validates before touching pixel data.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::ZeroDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.pixel_count() * self.format.bytes_per_pixel();
        if self.data.len() != expected {
            return Err(FrameError::BufferSizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Iterate luma (0-255) per pixel, in row-major order.
    pub fn lumas(&self) -> impl Iterator<Item = u8> + '_ {
        let bpp = self.format.bytes_per_pixel();
        let format = self.format;
        self.data.chunks_exact(bpp).map(move |px| match format {
            PixelFormat::Gray8 => px[0],
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => luma(px[0], px[1], px[2]),
        })
    }

    /// Iterate (r, g, b) per pixel. Gray frames replicate luma across channels.
    pub fn rgb_pixels(&self) -> impl Iterator<Item = (u8, u8, u8)> + '_ {
        let bpp = self.format.bytes_per_pixel();
        let format = self.format;
        self.data.chunks_exact(bpp).map(move |px| match format {
            PixelFormat::Gray8 => (px[0], px[0], px[0]),
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => (px[0], px[1], px[2]),
        })
    }

    /// Luma at pixel index (row-major), without bounds checks beyond the slice.
    pub fn luma_at(&self, index: usize) -> Option<u8> {
        let bpp = self.format.bytes_per_pixel();
        let start = index.checked_mul(bpp)?;
        let px = self.data.get(start..start + bpp)?;
        Some(match self.format {
            PixelFormat::Gray8 => px[0],
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => luma(px[0], px[1], px[2]),
        })
    }
}

/// ITU-R BT.601 integer luma approximation.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}
