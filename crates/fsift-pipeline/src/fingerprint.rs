//! Perceptual frame fingerprinting.
//!
//! A fingerprint is the frame downsampled to an 8x8 luma grid, each cell
//! quantized to one hex digit (64 characters total). Similarity between two
//! fingerprints is the per-character match ratio, so near-identical frames
//! score close to 1.0 while unrelated frames land near the 1/16 chance
//! floor. Both the duplicate detector and the motion detector use this same
//! function; they differ only in what they compare against.

use fsift_models::PixelBuffer;

use crate::error::PipelineResult;

/// Cells per fingerprint axis.
const GRID: usize = 8;

/// Quantization levels per cell (one hex digit).
const LEVELS: u32 = 16;

/// Fingerprint length in characters.
pub const FINGERPRINT_LEN: usize = GRID * GRID;

/// Compute the fixed-length perceptual fingerprint of a frame.
pub fn fingerprint(frame: &PixelBuffer) -> PipelineResult<String> {
    frame.validate()?;

    let width = frame.width as usize;
    let height = frame.height as usize;

    let mut sums = [0u64; FINGERPRINT_LEN];
    let mut counts = [0u64; FINGERPRINT_LEN];

    for (index, luma) in frame.lumas().enumerate() {
        let x = index % width;
        let y = index / width;
        // Map pixel coordinates onto the 8x8 grid.
        let cell = (y * GRID / height) * GRID + (x * GRID / width);
        sums[cell] += luma as u64;
        counts[cell] += 1;
    }

    let mut out = String::with_capacity(FINGERPRINT_LEN);
    for cell in 0..FINGERPRINT_LEN {
        let mean = if counts[cell] > 0 {
            (sums[cell] / counts[cell]) as u32
        } else {
            0
        };
        let level = (mean * LEVELS / 256).min(LEVELS - 1);
        out.push(char::from_digit(level, 16).unwrap_or('0'));
    }

    Ok(out)
}

/// Per-character match ratio between two fingerprints (0-1).
pub fn similarity(a: &str, b: &str) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 0.0;
    }
    let matches = a
        .bytes()
        .zip(b.bytes())
        .filter(|(ca, cb)| ca == cb)
        .count();
    matches as f64 / len as f64
}

/// Fingerprint difference as a percentage (0-100).
pub fn difference_pct(a: &str, b: &str) -> f64 {
    (1.0 - similarity(a, b)) * 100.0
}
