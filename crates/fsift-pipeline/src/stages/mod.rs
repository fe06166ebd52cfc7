//! The five assessment stages, in pipeline order:
//! quality, time policy, duplicate, occupancy, motion.

pub mod duplicate;
pub mod motion;
pub mod occupancy;
pub mod quality;
pub mod time_policy;

pub use duplicate::DuplicateDetector;
pub use motion::MotionDetector;
pub use occupancy::OccupancyDetector;
pub use quality::QualityAssessor;
pub use time_policy::{ResolvedPolicy, TimePolicyEngine};
