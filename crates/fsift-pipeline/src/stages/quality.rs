//! Quality assessment: luma statistics plus black/transition-frame classifiers.
//!
//! Sharpness and noise are linear proxies of contrast rather than true
//! edge-based or frequency-domain measurements; that simplification is the
//! defined behavior, kept cheap on purpose.

use std::time::Instant;
use tracing::debug;

use fsift_models::{ProfileMultipliers, QualityResult, QualityThresholds, StageStatus};
use fsift_models::PixelBuffer;

/// Fixed score penalty per violated threshold.
const VIOLATION_PENALTY: f64 = 20.0;

/// Brightness at or below this counts toward transition detection.
const TRANSITION_DARK: f64 = 12.0;

/// Brightness at or above this counts toward transition detection.
const TRANSITION_BRIGHT: f64 = 88.0;

/// Contrast below this is "uniform" for transition detection.
const TRANSITION_UNIFORMITY: f64 = 8.0;

/// Sharpness below this is "edgeless" for transition detection.
const TRANSITION_EDGELESS: f64 = 15.0;

/// Stateless quality assessor.
pub struct QualityAssessor;

impl QualityAssessor {
    /// Score a frame against the quality thresholds, loosened by the active
    /// safety profile's factor.
    ///
    /// Never fails: a malformed buffer yields a permissive neutral result,
    /// because quality uncertainty must never block analysis.
    pub fn assess(
        frame: &PixelBuffer,
        thresholds: &QualityThresholds,
        multipliers: &ProfileMultipliers,
    ) -> QualityResult {
        let started = Instant::now();

        if let Err(err) = frame.validate() {
            return QualityResult::neutral(format!("unreadable frame: {err}"));
        }

        let (brightness, contrast) = luma_stats(frame);
        // Contrast-derived proxies (see module docs).
        let sharpness = (contrast * 1.5).min(100.0);
        let noise = ((100.0 - contrast) * 0.5).clamp(0.0, 100.0);

        let factor = multipliers.quality_threshold_factor;
        let min_brightness = thresholds.min_brightness * factor;
        let min_contrast = thresholds.min_contrast * factor;
        let min_sharpness = thresholds.min_sharpness * factor;

        let mut reasons = Vec::new();

        let is_black_frame = brightness <= thresholds.black_frame_ceiling;
        if is_black_frame {
            reasons.push(format!(
                "black frame detected (brightness {brightness:.1} <= {:.1})",
                thresholds.black_frame_ceiling
            ));
        }

        // Fades and dissolves meet at least two of the three conditions.
        let transition_signals = [
            brightness <= TRANSITION_DARK || brightness >= TRANSITION_BRIGHT,
            contrast < TRANSITION_UNIFORMITY,
            sharpness < TRANSITION_EDGELESS,
        ]
        .iter()
        .filter(|&&hit| hit)
        .count();
        let is_transition_frame = transition_signals >= 2;
        if is_transition_frame {
            reasons.push(format!(
                "transition frame detected ({transition_signals}/3 signals)"
            ));
        }

        if brightness < min_brightness {
            reasons.push(format!(
                "brightness too low: {brightness:.1} < {min_brightness:.1}"
            ));
        }
        if brightness > thresholds.max_brightness {
            reasons.push(format!(
                "brightness too high: {brightness:.1} > {:.1}",
                thresholds.max_brightness
            ));
        }
        if contrast < min_contrast {
            reasons.push(format!("contrast too low: {contrast:.1} < {min_contrast:.1}"));
        }
        if sharpness < min_sharpness {
            reasons.push(format!(
                "sharpness too low: {sharpness:.1} < {min_sharpness:.1}"
            ));
        }
        if noise > thresholds.max_noise {
            reasons.push(format!(
                "noise too high: {noise:.1} > {:.1}",
                thresholds.max_noise
            ));
        }

        let score = (100.0 - VIOLATION_PENALTY * reasons.len() as f64).max(0.0);
        let status = if reasons.is_empty() {
            StageStatus::Passed
        } else {
            StageStatus::Failed
        };

        debug!(
            brightness = format!("{brightness:.1}"),
            contrast = format!("{contrast:.1}"),
            score,
            violations = reasons.len(),
            "quality assessed"
        );

        QualityResult {
            status,
            score,
            brightness,
            contrast,
            sharpness,
            noise,
            is_black_frame,
            is_transition_frame,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            reasons,
        }
    }
}

/// Mean luma and luma standard deviation, both on a 0-100 scale.
fn luma_stats(frame: &PixelBuffer) -> (f64, f64) {
    let mut sum = 0u64;
    let mut sum_sq = 0u64;
    let mut count = 0u64;

    for luma in frame.lumas() {
        let v = luma as u64;
        sum += v;
        sum_sq += v * v;
        count += 1;
    }

    if count == 0 {
        return (0.0, 0.0);
    }

    let mean = sum as f64 / count as f64;
    let variance = (sum_sq as f64 / count as f64 - mean * mean).max(0.0);
    let stddev = variance.sqrt();

    // Map raw luma (0-255) to the configured 0-100 scale. The theoretical
    // stddev maximum is 127.5, so contrast doubles the ratio.
    let brightness = mean / 255.0 * 100.0;
    let contrast = (stddev / 127.5 * 100.0).min(100.0);
    (brightness, contrast)
}
