//! Pipeline threshold configuration.
//!
//! `OptimizationThresholds` is the single versioned aggregate every stage
//! reads at call time. It is validated on construction and on every hot
//! swap; threshold inversions are configuration faults surfaced before any
//! frame is processed, never discovered mid-decision.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time_policy::{ProfileMultipliers, ScheduleOverride};

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Threshold inversion in {stage}: {detail}")]
    ThresholdInversion { stage: &'static str, detail: String },

    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("aggressive_mode and conservative_mode are mutually exclusive")]
    ConflictingModes,

    #[error("Schedule override #{index} invalid: {detail}")]
    InvalidOverride { index: usize, detail: String },
}

/// Quality stage bounds. Brightness/contrast/sharpness/noise are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityThresholds {
    /// Whether a quality failure may skip the frame.
    pub enabled: bool,
    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_contrast: f64,
    pub min_sharpness: f64,
    pub max_noise: f64,
    /// Brightness at or below this is a black frame.
    pub black_frame_ceiling: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_brightness: 15.0,
            max_brightness: 85.0,
            min_contrast: 10.0,
            min_sharpness: 20.0,
            max_noise: 70.0,
            black_frame_ceiling: 8.0,
        }
    }
}

/// Duplicate stage bounds and cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DuplicateThresholds {
    pub enabled: bool,
    /// Similarity at or above this is a duplicate (0-1).
    pub similarity_ceiling: f64,
    /// Maximum fingerprints kept in the cache.
    pub cache_max_entries: usize,
    /// Fingerprints older than this are swept before each lookup.
    pub cache_duration_minutes: u32,
}

impl Default for DuplicateThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_ceiling: 0.85,
            cache_max_entries: 100,
            cache_duration_minutes: 30,
        }
    }
}

/// Occupancy stage confidence floor and signal weights.
///
/// Weights need not sum to exactly 1 but the defaults do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OccupancyThresholds {
    pub enabled: bool,
    /// Combined confidence at or above this declares occupancy (0-1).
    pub min_confidence: f64,
    pub pixel_density_weight: f64,
    pub edge_density_weight: f64,
    pub color_variance_weight: f64,
}

impl Default for OccupancyThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: 0.35,
            pixel_density_weight: 0.4,
            edge_density_weight: 0.35,
            color_variance_weight: 0.25,
        }
    }
}

/// Motion stage floors, both on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionThresholds {
    pub enabled: bool,
    /// Motion score at or above this declares motion.
    pub min_motion_score: f64,
    /// Raw frame-difference percentage floor.
    pub min_frame_difference: f64,
}

impl Default for MotionThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_motion_score: 10.0,
            min_frame_difference: 5.0,
        }
    }
}

/// Time policy windows and per-profile multiplier sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimePolicyThresholds {
    /// Whether the time stage may skip frames (only `Suppress` windows do).
    pub enabled: bool,
    /// Night window start hour (0-23), inclusive.
    pub night_start_hour: u8,
    /// Night window end hour (0-23), exclusive. Below start = wraps midnight.
    pub night_end_hour: u8,
    /// Hours within the night window with the highest sensitivity.
    pub emergency_hours: Vec<u8>,
    /// Dawn/dusk hours mapped to the transition profile.
    pub transition_hours: Vec<u8>,
    /// Ordered schedule overrides; first match wins.
    pub overrides: Vec<ScheduleOverride>,
    pub night_multipliers: ProfileMultipliers,
    pub emergency_multipliers: ProfileMultipliers,
    pub day_multipliers: ProfileMultipliers,
    pub transition_multipliers: ProfileMultipliers,
}

impl TimePolicyThresholds {
    /// True when the given hour falls inside the (possibly wrapping) night window.
    pub fn in_night_window(&self, hour: u8) -> bool {
        if self.night_start_hour <= self.night_end_hour {
            hour >= self.night_start_hour && hour < self.night_end_hour
        } else {
            hour >= self.night_start_hour || hour < self.night_end_hour
        }
    }
}

impl Default for TimePolicyThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            night_start_hour: 22,
            night_end_hour: 6,
            emergency_hours: vec![2, 3, 4],
            transition_hours: vec![6, 7, 20, 21],
            overrides: Vec::new(),
            night_multipliers: ProfileMultipliers::forced_processing(),
            emergency_multipliers: ProfileMultipliers {
                motion_sensitivity: 4.0,
                ..ProfileMultipliers::forced_processing()
            },
            day_multipliers: ProfileMultipliers::neutral(),
            transition_multipliers: ProfileMultipliers {
                quality_threshold_factor: 0.8,
                motion_sensitivity: 1.25,
                ..ProfileMultipliers::neutral()
            },
        }
    }
}

/// Pipeline-wide flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GlobalFlags {
    /// Gate the whole pipeline. Off = every frame proceeds untouched.
    pub enabled: bool,
    /// Stricter thresholds: savings over safety margins.
    pub aggressive_mode: bool,
    /// Looser thresholds: safety margins over savings.
    pub conservative_mode: bool,
    /// Verbose per-stage diagnostics.
    pub debug_mode: bool,
    /// Hard decision deadline in milliseconds.
    pub max_processing_time_ms: u64,
    /// Substitute neutral stage results on fault instead of propagating.
    pub fallback_on_error: bool,
}

impl Default for GlobalFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            aggressive_mode: false,
            conservative_mode: false,
            debug_mode: false,
            max_processing_time_ms: 500,
            fallback_on_error: true,
        }
    }
}

/// The versioned configuration aggregate read by every stage at call time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct OptimizationThresholds {
    /// Operator-bumped configuration version, carried into analytics.
    pub version: u32,
    pub quality: QualityThresholds,
    pub duplicate: DuplicateThresholds,
    pub occupancy: OccupancyThresholds,
    pub motion: MotionThresholds,
    pub time_policy: TimePolicyThresholds,
    pub flags: GlobalFlags,
}

impl OptimizationThresholds {
    /// The balanced baseline every other variant derives from.
    pub fn balanced() -> Self {
        Self {
            version: 1,
            ..Default::default()
        }
    }

    /// Stricter variant: skips more frames, saves more tokens.
    pub fn aggressive() -> Self {
        let mut t = Self::balanced();
        t.quality.min_brightness = 25.0;
        t.quality.max_brightness = 80.0;
        t.quality.min_contrast = 15.0;
        t.duplicate.similarity_ceiling = 0.75;
        t.occupancy.min_confidence = 0.5;
        t.motion.min_motion_score = 20.0;
        t.motion.min_frame_difference = 10.0;
        t.flags.aggressive_mode = true;
        t
    }

    /// Looser variant: forwards more frames, safety margins over savings.
    pub fn conservative() -> Self {
        let mut t = Self::balanced();
        t.quality.min_brightness = 8.0;
        t.quality.min_contrast = 5.0;
        t.quality.min_sharpness = 10.0;
        t.duplicate.similarity_ceiling = 0.95;
        t.occupancy.min_confidence = 0.2;
        t.motion.min_motion_score = 5.0;
        t.motion.min_frame_difference = 2.0;
        t.flags.conservative_mode = true;
        t
    }

    /// Balanced thresholds plus verbose diagnostics and a long deadline.
    pub fn debug() -> Self {
        let mut t = Self::balanced();
        t.flags.debug_mode = true;
        t.flags.max_processing_time_ms = 5_000;
        t
    }

    /// Validate the whole aggregate. Runs before the pipeline accepts the
    /// config, at construction and on every hot swap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_quality()?;
        self.validate_duplicate()?;
        self.validate_occupancy()?;
        self.validate_motion()?;
        self.validate_time_policy()?;
        self.validate_flags()?;
        Ok(())
    }

    fn validate_quality(&self) -> Result<(), ConfigError> {
        let q = &self.quality;
        if q.min_brightness >= q.max_brightness {
            return Err(ConfigError::ThresholdInversion {
                stage: "quality",
                detail: format!(
                    "min_brightness ({}) >= max_brightness ({})",
                    q.min_brightness, q.max_brightness
                ),
            });
        }
        for (field, value) in [
            ("quality.min_brightness", q.min_brightness),
            ("quality.max_brightness", q.max_brightness),
            ("quality.min_contrast", q.min_contrast),
            ("quality.min_sharpness", q.min_sharpness),
            ("quality.max_noise", q.max_noise),
            ("quality.black_frame_ceiling", q.black_frame_ceiling),
        ] {
            range_check(field, value, 0.0, 100.0)?;
        }
        Ok(())
    }

    fn validate_duplicate(&self) -> Result<(), ConfigError> {
        let d = &self.duplicate;
        range_check("duplicate.similarity_ceiling", d.similarity_ceiling, 0.0, 1.0)?;
        if d.cache_max_entries == 0 {
            return Err(ConfigError::ZeroCapacity("duplicate.cache_max_entries"));
        }
        if d.cache_duration_minutes == 0 {
            return Err(ConfigError::ZeroCapacity("duplicate.cache_duration_minutes"));
        }
        Ok(())
    }

    fn validate_occupancy(&self) -> Result<(), ConfigError> {
        let o = &self.occupancy;
        range_check("occupancy.min_confidence", o.min_confidence, 0.0, 1.0)?;
        for (field, value) in [
            ("occupancy.pixel_density_weight", o.pixel_density_weight),
            ("occupancy.edge_density_weight", o.edge_density_weight),
            ("occupancy.color_variance_weight", o.color_variance_weight),
        ] {
            range_check(field, value, 0.0, 1.0)?;
        }
        let sum = o.pixel_density_weight + o.edge_density_weight + o.color_variance_weight;
        if sum <= 0.0 {
            return Err(ConfigError::ZeroCapacity("occupancy weight sum"));
        }
        Ok(())
    }

    fn validate_motion(&self) -> Result<(), ConfigError> {
        range_check("motion.min_motion_score", self.motion.min_motion_score, 0.0, 100.0)?;
        range_check(
            "motion.min_frame_difference",
            self.motion.min_frame_difference,
            0.0,
            100.0,
        )?;
        Ok(())
    }

    fn validate_time_policy(&self) -> Result<(), ConfigError> {
        let tp = &self.time_policy;
        range_check("time_policy.night_start_hour", tp.night_start_hour as f64, 0.0, 23.0)?;
        range_check("time_policy.night_end_hour", tp.night_end_hour as f64, 0.0, 23.0)?;
        for &hour in &tp.emergency_hours {
            range_check("time_policy.emergency_hours", hour as f64, 0.0, 23.0)?;
            if !tp.in_night_window(hour) {
                return Err(ConfigError::ThresholdInversion {
                    stage: "time_policy",
                    detail: format!("emergency hour {hour} lies outside the night window"),
                });
            }
        }
        for &hour in &tp.transition_hours {
            range_check("time_policy.transition_hours", hour as f64, 0.0, 23.0)?;
        }
        for (index, window) in tp.overrides.iter().enumerate() {
            if window.start_minute >= 1440 || window.end_minute >= 1440 {
                return Err(ConfigError::InvalidOverride {
                    index,
                    detail: format!(
                        "minutes out of range: {}..{}",
                        window.start_minute, window.end_minute
                    ),
                });
            }
            if let Some(&day) = window.weekdays.iter().find(|&&d| d > 6) {
                return Err(ConfigError::InvalidOverride {
                    index,
                    detail: format!("weekday index {day} out of range (0-6)"),
                });
            }
        }
        Ok(())
    }

    fn validate_flags(&self) -> Result<(), ConfigError> {
        if self.flags.aggressive_mode && self.flags.conservative_mode {
            return Err(ConfigError::ConflictingModes);
        }
        if self.flags.max_processing_time_ms == 0 {
            return Err(ConfigError::ZeroCapacity("flags.max_processing_time_ms"));
        }
        Ok(())
    }
}

fn range_check(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
