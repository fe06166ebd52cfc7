//! Statistics aggregation over completed decisions.
//!
//! The collector observes every decision regardless of outcome, mutates its
//! internal counters, and hands out owned snapshots only. It also emits
//! `metrics` crate counters and histograms for external monitoring backends.

use std::sync::RwLock;

use metrics::{counter, histogram};
use fsift_models::{OptimizationStats, PreProcessingResult};

/// Heuristic tokens consumed by one forwarded vision-AI call.
const TOKENS_PER_FRAME: f64 = 1_500.0;

/// Dollars per thousand tokens.
const COST_PER_1K_TOKENS: f64 = 0.01;

/// Session-scoped counters with snapshot/reset lifecycle.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: RwLock<OptimizationStats>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(OptimizationStats::new()),
        }
    }

    /// Record one completed decision.
    pub fn record(&self, result: &PreProcessingResult) {
        let mut stats = self.inner.write().unwrap_or_else(|e| e.into_inner());

        stats.total_requests += 1;
        if result.should_proceed {
            stats.optimized_requests += 1;
        } else {
            stats.skipped_requests += 1;
            if let Some(reason) = result.skip_reason {
                *stats
                    .skip_reasons
                    .entry(reason.as_str().to_string())
                    .or_insert(0) += 1;

                let tokens = TOKENS_PER_FRAME * reason.savings_pct() / 100.0;
                stats.tokens_saved += tokens;
                stats.cost_saved += tokens / 1_000.0 * COST_PER_1K_TOKENS;
            }
        }

        // Incremental rolling mean.
        let n = stats.total_requests as f64;
        stats.avg_processing_time_ms +=
            (result.processing_time_ms - stats.avg_processing_time_ms) / n;

        drop(stats);

        let outcome = if result.should_proceed { "proceed" } else { "skip" };
        counter!("fsift_decisions_total", "outcome" => outcome).increment(1);
        if let Some(reason) = result.skip_reason {
            counter!("fsift_skips_total", "reason" => reason.as_str()).increment(1);
        }
        histogram!("fsift_decision_duration_ms").record(result.processing_time_ms);
    }

    /// Owned snapshot of the counters; side-effect free.
    pub fn snapshot(&self) -> OptimizationStats {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Zero all counters and restart the window.
    pub fn reset(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = OptimizationStats::new();
    }
}
