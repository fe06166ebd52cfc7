//! Session-scoped optimization statistics.
//!
//! The pipeline's statistics collector mutates an internal copy after every
//! decision; consumers only ever receive owned snapshots of this type.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::results::SkipReason;

/// Counters accumulated since service start or the last reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptimizationStats {
    /// Frames that entered the pipeline.
    pub total_requests: u64,

    /// Frames forwarded to the downstream vision service.
    pub optimized_requests: u64,

    /// Frames skipped by the pipeline.
    pub skipped_requests: u64,

    /// Heuristic tokens avoided by skipping.
    pub tokens_saved: f64,

    /// Heuristic cost avoided, in dollars.
    pub cost_saved: f64,

    /// Rolling mean decision latency in milliseconds.
    pub avg_processing_time_ms: f64,

    /// Skip counts keyed by reason string (stable snake_case names).
    pub skip_reasons: HashMap<String, u64>,

    /// When counting started (service start or last reset).
    pub since: DateTime<Utc>,
}

impl OptimizationStats {
    /// Fresh counters starting now.
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            optimized_requests: 0,
            skipped_requests: 0,
            tokens_saved: 0.0,
            cost_saved: 0.0,
            avg_processing_time_ms: 0.0,
            skip_reasons: HashMap::new(),
            since: Utc::now(),
        }
    }

    /// Fraction of frames skipped (0 when nothing was processed yet).
    pub fn skip_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.skipped_requests as f64 / self.total_requests as f64
    }

    /// Skip count for one reason.
    pub fn skips_for(&self, reason: SkipReason) -> u64 {
        self.skip_reasons.get(reason.as_str()).copied().unwrap_or(0)
    }

    /// True when every counter is zero.
    pub fn is_zeroed(&self) -> bool {
        self.total_requests == 0
            && self.optimized_requests == 0
            && self.skipped_requests == 0
            && self.tokens_saved == 0.0
            && self.cost_saved == 0.0
            && self.skip_reasons.is_empty()
    }
}

impl Default for OptimizationStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_stats_zeroed() {
        let stats = OptimizationStats::new();
        assert!(stats.is_zeroed());
        assert_eq!(stats.skip_rate(), 0.0);
        assert_eq!(stats.skips_for(SkipReason::Duplicate), 0);
    }

    #[test]
    fn test_skip_rate() {
        let mut stats = OptimizationStats::new();
        stats.total_requests = 10;
        stats.skipped_requests = 4;
        assert!((stats.skip_rate() - 0.4).abs() < f64::EPSILON);
    }
}
