//! FrameSift pre-processing pipeline.
//!
//! Decides, per camera frame, whether the expensive downstream vision-AI
//! call is worth making. Five cheap assessment stages run in a fixed order
//! (quality, time policy, duplicate, occupancy, motion); the first enabled
//! failing stage skips the frame, and safety profiles can force processing
//! regardless of what the stages say.
//!
//! The public surface is [`FramePipeline`]: construct it with validated
//! [`OptimizationThresholds`](fsift_models::OptimizationThresholds), share it
//! behind an `Arc`, and call `pre_process` per frame.

pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod stages;
pub mod stats;
pub mod store;

pub use error::{PipelineError, PipelineResult};
pub use fingerprint::{difference_pct, fingerprint, similarity, FINGERPRINT_LEN};
pub use pipeline::FramePipeline;
pub use stages::{
    DuplicateDetector, MotionDetector, OccupancyDetector, QualityAssessor, ResolvedPolicy,
    TimePolicyEngine,
};
pub use stats::StatsCollector;
pub use store::{HashCache, MotionHistory};
