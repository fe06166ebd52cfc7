//! Stage results and the aggregate pre-processing decision.
//!
//! Every stage produces an immutable result, even when it never ran: skipped
//! remainders are filled with `NotEvaluated` placeholders, never left
//! undefined. Each stage type has a single shared `neutral` constructor used
//! uniformly by the fault path and the timeout path, so permissive fallbacks
//! have one set of semantics.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::time_policy::{OverrideKind, SafetyProfile};

/// Outcome of one stage within a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The pipeline short-circuited before this stage ran.
    #[default]
    NotEvaluated,
    Passed,
    Failed,
    /// Skipped by a context override or a safety-profile bypass flag.
    Bypassed,
}

impl StageStatus {
    /// True when this status can never convert into a skip decision.
    pub fn is_permissive(&self) -> bool {
        !matches!(self, StageStatus::Failed)
    }
}

/// Why a frame was not forwarded to the downstream vision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LowQuality,
    Duplicate,
    NoOccupancy,
    NoMotion,
    TimeFiltered,
}

impl SkipReason {
    /// All reasons, in pipeline stage order.
    pub const ALL: &'static [SkipReason] = &[
        SkipReason::LowQuality,
        SkipReason::TimeFiltered,
        SkipReason::Duplicate,
        SkipReason::NoOccupancy,
        SkipReason::NoMotion,
    ];

    /// Returns the reason as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::LowQuality => "low_quality",
            SkipReason::Duplicate => "duplicate",
            SkipReason::NoOccupancy => "no_occupancy",
            SkipReason::NoMotion => "no_motion",
            SkipReason::TimeFiltered => "time_filtered",
        }
    }

    /// Heuristic token-savings percentage attributed to this skip.
    ///
    /// Not a measured value; a duplicate frame saves the full downstream
    /// call, a borderline quality skip is discounted.
    pub fn savings_pct(&self) -> f64 {
        match self {
            SkipReason::Duplicate => 95.0,
            SkipReason::NoMotion => 85.0,
            SkipReason::NoOccupancy => 80.0,
            SkipReason::LowQuality => 70.0,
            SkipReason::TimeFiltered => 60.0,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SkipReason {
    type Err = SkipReasonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low_quality" => Ok(SkipReason::LowQuality),
            "duplicate" => Ok(SkipReason::Duplicate),
            "no_occupancy" => Ok(SkipReason::NoOccupancy),
            "no_motion" => Ok(SkipReason::NoMotion),
            "time_filtered" => Ok(SkipReason::TimeFiltered),
            _ => Err(SkipReasonParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown skip reason: {0}")]
pub struct SkipReasonParseError(String);

/// Quality stage result: luma statistics plus the two binary classifiers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QualityResult {
    pub status: StageStatus,
    /// 100 minus a fixed penalty per violated threshold, floored at 0.
    pub score: f64,
    /// Mean luma on a 0-100 scale.
    pub brightness: f64,
    /// Luma standard deviation on a 0-100 scale.
    pub contrast: f64,
    /// Contrast-derived proxy, not a true edge measurement.
    pub sharpness: f64,
    /// Inverse contrast-derived proxy.
    pub noise: f64,
    pub is_black_frame: bool,
    pub is_transition_frame: bool,
    pub processing_time_ms: f64,
    /// Accumulated failure reasons; a frame can report several defects.
    pub reasons: Vec<String>,
}

impl QualityResult {
    /// Shared permissive fallback: quality uncertainty must never block analysis.
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Passed,
            score: 50.0,
            brightness: 0.0,
            contrast: 0.0,
            sharpness: 0.0,
            noise: 0.0,
            is_black_frame: false,
            is_transition_frame: false,
            processing_time_ms: 0.0,
            reasons: vec![reason.into()],
        }
    }

    /// Placeholder for a stage the pipeline never reached.
    pub fn not_evaluated() -> Self {
        Self {
            status: StageStatus::NotEvaluated,
            ..Self::neutral("not evaluated")
        }
    }

    /// Stage bypassed by an override or profile flag.
    pub fn bypassed(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Bypassed,
            ..Self::neutral(reason)
        }
    }
}

/// Time policy stage result: the resolved safety profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimeFilterResult {
    pub status: StageStatus,
    /// 0-100; forced-processing profiles score 100 (frame always valuable).
    pub score: f64,
    pub profile: SafetyProfile,
    pub hour: u8,
    /// Schedule override that superseded the hour-derived profile, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_override: Option<OverrideKind>,
    /// Hard safety override: no later stage may skip this frame.
    pub forced_processing: bool,
    pub processing_time_ms: f64,
    pub reasons: Vec<String>,
}

impl TimeFilterResult {
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Passed,
            score: 100.0,
            profile: SafetyProfile::DayOptimization,
            hour: 0,
            matched_override: None,
            forced_processing: false,
            processing_time_ms: 0.0,
            reasons: vec![reason.into()],
        }
    }

    pub fn not_evaluated() -> Self {
        Self {
            status: StageStatus::NotEvaluated,
            ..Self::neutral("not evaluated")
        }
    }

    pub fn bypassed(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Bypassed,
            ..Self::neutral(reason)
        }
    }
}

/// Duplicate stage result: best cache match.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DuplicateResult {
    pub status: StageStatus,
    /// 0-100; 100 means maximally distinct from everything cached.
    pub score: f64,
    pub is_duplicate: bool,
    /// Best per-character match ratio against the cache (0-1).
    pub similarity: f64,
    /// Fingerprint prefix of the best match, for audit logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_fingerprint: Option<String>,
    /// Cache population at lookup time, after the TTL sweep.
    pub cache_size: usize,
    pub processing_time_ms: f64,
    pub reasons: Vec<String>,
}

impl DuplicateResult {
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Passed,
            score: 100.0,
            is_duplicate: false,
            similarity: 0.0,
            matched_fingerprint: None,
            cache_size: 0,
            processing_time_ms: 0.0,
            reasons: vec![reason.into()],
        }
    }

    pub fn not_evaluated() -> Self {
        Self {
            status: StageStatus::NotEvaluated,
            ..Self::neutral("not evaluated")
        }
    }

    pub fn bypassed(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Bypassed,
            ..Self::neutral(reason)
        }
    }
}

/// Occupancy stage result: the three fused presence signals.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OccupancyResult {
    pub status: StageStatus,
    /// Combined confidence on a 0-100 scale.
    pub score: f64,
    pub occupied: bool,
    /// Weighted sum of the three signals (0-1).
    pub confidence: f64,
    pub pixel_density: f64,
    pub edge_density: f64,
    pub color_variance: f64,
    pub processing_time_ms: f64,
    pub reasons: Vec<String>,
}

impl OccupancyResult {
    /// Permissive fallback assumes occupancy; absence must be proven.
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Passed,
            score: 100.0,
            occupied: true,
            confidence: 1.0,
            pixel_density: 0.0,
            edge_density: 0.0,
            color_variance: 0.0,
            processing_time_ms: 0.0,
            reasons: vec![reason.into()],
        }
    }

    pub fn not_evaluated() -> Self {
        Self {
            status: StageStatus::NotEvaluated,
            ..Self::neutral("not evaluated")
        }
    }

    pub fn bypassed(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Bypassed,
            ..Self::neutral(reason)
        }
    }
}

/// Motion stage result: per-session previous-frame diff.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MotionResult {
    pub status: StageStatus,
    /// 0-100 motion score.
    pub score: f64,
    pub motion_detected: bool,
    /// Raw fingerprint difference percentage (0-100).
    pub frame_difference: f64,
    /// False for the first frame of a session (motion assumed).
    pub had_baseline: bool,
    pub processing_time_ms: f64,
    pub reasons: Vec<String>,
}

impl MotionResult {
    /// Permissive fallback assumes motion.
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Passed,
            score: 100.0,
            motion_detected: true,
            frame_difference: 100.0,
            had_baseline: false,
            processing_time_ms: 0.0,
            reasons: vec![reason.into()],
        }
    }

    pub fn not_evaluated() -> Self {
        Self {
            status: StageStatus::NotEvaluated,
            ..Self::neutral("not evaluated")
        }
    }

    pub fn bypassed(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Bypassed,
            ..Self::neutral(reason)
        }
    }
}

/// The aggregate decision for one frame. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreProcessingResult {
    /// Forward the frame to the downstream vision service?
    pub should_proceed: bool,

    /// Set exactly when `should_proceed` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,

    /// Pipeline certainty: fixed 0.9 for proceed, 0.8 for skip, 1.0 when the
    /// pipeline is globally disabled or timed out.
    pub confidence: f64,

    /// Mean score of the stages that actually ran (100 when none did).
    pub overall_score: f64,

    /// Heuristic avoided-cost percentage (0 on proceed).
    pub estimated_savings_pct: f64,

    pub quality: QualityResult,
    pub time_filter: TimeFilterResult,
    pub duplicate: DuplicateResult,
    pub occupancy: OccupancyResult,
    pub motion: MotionResult,

    /// Analytics metadata.
    pub session_id: String,
    /// Monotonic per-pipeline decision counter.
    pub sequence: u64,
    /// Unique id for this decision.
    pub decision_id: String,
    pub timestamp: DateTime<Utc>,
    /// Configuration version the decision was made under.
    pub config_version: u32,
    pub processing_time_ms: f64,
}

impl PreProcessingResult {
    /// Check the structural invariant: `skip_reason` is set iff the frame
    /// was skipped.
    pub fn is_well_formed(&self) -> bool {
        self.skip_reason.is_some() != self.should_proceed
    }
}
