//! Error types for pipeline operations.

use fsift_models::{ConfigError, FrameError};
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while deciding on a frame.
///
/// Configuration faults are surfaced before a run starts; stage faults only
/// propagate when `fallback_on_error` is off. The public `pre_process` entry
/// point never lets any of these escape.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Stage {stage} failed: {message}")]
    StageFault { stage: &'static str, message: String },

    #[error("Decision timed out after {0} ms")]
    Timeout(u64),
}

impl PipelineError {
    /// Create a stage fault error.
    pub fn stage_fault(stage: &'static str, message: impl Into<String>) -> Self {
        Self::StageFault {
            stage,
            message: message.into(),
        }
    }
}
