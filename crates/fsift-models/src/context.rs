//! Per-request context describing where a frame came from and how to treat it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Where the frame originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrigin {
    /// Live camera feed at the monitored facility.
    #[default]
    Camera,
    /// Operator-uploaded still.
    Upload,
    /// Manually triggered capture (operator pressed the button).
    Manual,
    /// Scheduled periodic capture.
    Scheduled,
}

impl RequestOrigin {
    /// Returns the origin name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOrigin::Camera => "camera",
            RequestOrigin::Upload => "upload",
            RequestOrigin::Manual => "manual",
            RequestOrigin::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequestOrigin {
    type Err = OriginParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "camera" => Ok(RequestOrigin::Camera),
            "upload" => Ok(RequestOrigin::Upload),
            "manual" => Ok(RequestOrigin::Manual),
            "scheduled" => Ok(RequestOrigin::Scheduled),
            _ => Err(OriginParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown request origin: {0}")]
pub struct OriginParseError(String);

/// Caller-declared priority for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Per-stage skip overrides.
///
/// A set flag bypasses that stage for this call only: the stage records a
/// bypassed result and can never cause a skip. Used by batch tooling to
/// isolate individual stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct StageOverrides {
    #[serde(default)]
    pub skip_quality: bool,
    #[serde(default)]
    pub skip_time_policy: bool,
    #[serde(default)]
    pub skip_duplicate: bool,
    #[serde(default)]
    pub skip_occupancy: bool,
    #[serde(default)]
    pub skip_motion: bool,
}

/// Immutable description of a single pre-processing request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisContext {
    /// Where the frame came from.
    pub origin: RequestOrigin,

    /// Caller-declared priority.
    pub priority: RequestPriority,

    /// Session the frame belongs to (one session per camera stream).
    pub session_id: String,

    /// Optional per-stage skip overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<StageOverrides>,

    /// Optional hint about expected content ("horse in stall", "empty aisle").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_content: Option<String>,
}

impl AnalysisContext {
    /// Create a camera-origin context for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            origin: RequestOrigin::Camera,
            priority: RequestPriority::Normal,
            session_id: session_id.into(),
            overrides: None,
            expected_content: None,
        }
    }

    /// Set the request origin.
    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Set the request priority.
    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set per-stage skip overrides.
    pub fn with_overrides(mut self, overrides: StageOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Set the expected-content hint.
    pub fn with_expected_content(mut self, hint: impl Into<String>) -> Self {
        self.expected_content = Some(hint.into());
        self
    }

    /// Effective overrides, defaulting to none set.
    pub fn stage_overrides(&self) -> StageOverrides {
        self.overrides.unwrap_or_default()
    }
}
