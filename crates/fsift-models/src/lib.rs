//! Shared data models for the FrameSift pre-processing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Raw frame buffers and pixel formats
//! - Request context and per-stage overrides
//! - Versioned optimization thresholds with validation
//! - Safety profiles and schedule overrides
//! - Stage results, skip reasons, and the aggregate decision
//! - Statistics snapshots

pub mod context;
pub mod frame;
pub mod results;
pub mod stats;
pub mod thresholds;
pub mod time_policy;

// Re-export common types
pub use context::{AnalysisContext, RequestOrigin, RequestPriority, StageOverrides};
pub use frame::{luma, FrameError, PixelBuffer, PixelFormat};
pub use results::{
    DuplicateResult, MotionResult, OccupancyResult, PreProcessingResult, QualityResult,
    SkipReason, StageStatus, TimeFilterResult,
};
pub use stats::OptimizationStats;
pub use thresholds::{
    ConfigError, DuplicateThresholds, GlobalFlags, MotionThresholds, OccupancyThresholds,
    OptimizationThresholds, QualityThresholds, TimePolicyThresholds,
};
pub use time_policy::{
    OverrideAction, OverrideKind, ProfileMultipliers, SafetyProfile, ScheduleOverride,
};
