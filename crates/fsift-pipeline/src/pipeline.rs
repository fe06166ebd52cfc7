//! The decision orchestrator.
//!
//! `FramePipeline` owns the two shared stores, the statistics collector, and
//! a hot-swappable threshold aggregate. Stages run strictly in the order
//! quality -> time policy -> duplicate -> occupancy -> motion; the first
//! enabled failing stage short-circuits the rest. Stages that never ran are
//! recorded as `NotEvaluated` placeholders, never left undefined.
//!
//! Safety rule, checked here as a hard override: while a forced-processing
//! profile (night, emergency, or a force-process schedule window) is active,
//! no stage failure may convert into a skip. A failed optimization attempt
//! must never become a false "skip monitoring" outcome.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fsift_models::{
    AnalysisContext, ConfigError, DuplicateResult, MotionResult, OccupancyResult,
    OptimizationStats, OptimizationThresholds, PixelBuffer, PreProcessingResult, QualityResult,
    SkipReason, StageStatus, TimeFilterResult,
};

use crate::error::{PipelineError, PipelineResult};
use crate::fingerprint::fingerprint;
use crate::stages::{
    DuplicateDetector, MotionDetector, OccupancyDetector, QualityAssessor, ResolvedPolicy,
    TimePolicyEngine,
};
use crate::stats::StatsCollector;
use crate::store::{HashCache, MotionHistory};

/// Extra slack the async wrapper grants the blocking task beyond the
/// configured deadline; the synchronous body checks the real deadline
/// between stages.
const DEADLINE_GRACE_MS: u64 = 100;

/// Final verdict of one decision pass.
enum Decision {
    Proceed,
    Skip(SkipReason),
}

/// Working set of stage results for one decision.
struct StageSet {
    quality: QualityResult,
    time_filter: TimeFilterResult,
    duplicate: DuplicateResult,
    occupancy: OccupancyResult,
    motion: MotionResult,
}

impl Default for StageSet {
    fn default() -> Self {
        Self {
            quality: QualityResult::not_evaluated(),
            time_filter: TimeFilterResult::not_evaluated(),
            duplicate: DuplicateResult::not_evaluated(),
            occupancy: OccupancyResult::not_evaluated(),
            motion: MotionResult::not_evaluated(),
        }
    }
}

impl StageSet {
    fn all_bypassed(reason: &str) -> Self {
        Self {
            quality: QualityResult::bypassed(reason),
            time_filter: TimeFilterResult::bypassed(reason),
            duplicate: DuplicateResult::bypassed(reason),
            occupancy: OccupancyResult::bypassed(reason),
            motion: MotionResult::bypassed(reason),
        }
    }

    /// Mean score of the stages that actually executed; 100 when none did.
    fn overall_score(&self) -> f64 {
        let executed: Vec<f64> = [
            (self.quality.status, self.quality.score),
            (self.time_filter.status, self.time_filter.score),
            (self.duplicate.status, self.duplicate.score),
            (self.occupancy.status, self.occupancy.score),
            (self.motion.status, self.motion.score),
        ]
        .into_iter()
        .filter(|(status, _)| matches!(status, StageStatus::Passed | StageStatus::Failed))
        .map(|(_, score)| score)
        .collect();

        if executed.is_empty() {
            100.0
        } else {
            executed.iter().sum::<f64>() / executed.len() as f64
        }
    }
}

/// The pre-processing decision service.
///
/// Constructed once and shared (`Arc`) across camera streams. Each decision
/// call is internally sequential; only the hash cache and the motion history
/// are shared, each behind its own store-scoped lock.
pub struct FramePipeline {
    thresholds: RwLock<Arc<OptimizationThresholds>>,
    cache: HashCache,
    history: MotionHistory,
    stats: StatsCollector,
    sequence: AtomicU64,
}

impl FramePipeline {
    /// Create a pipeline with validated thresholds.
    pub fn new(thresholds: OptimizationThresholds) -> PipelineResult<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds: RwLock::new(Arc::new(thresholds)),
            cache: HashCache::new(),
            history: MotionHistory::new(),
            stats: StatsCollector::new(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Snapshot of the active thresholds.
    pub fn thresholds(&self) -> Arc<OptimizationThresholds> {
        self.thresholds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Validate and hot-swap the threshold aggregate. In-flight decisions
    /// keep the snapshot they started with.
    pub fn swap_thresholds(&self, thresholds: OptimizationThresholds) -> Result<(), ConfigError> {
        thresholds.validate()?;
        info!(version = thresholds.version, "thresholds swapped");
        *self.thresholds.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(thresholds);
        Ok(())
    }

    /// Statistics snapshot; side-effect free for in-flight decisions.
    pub fn stats(&self) -> OptimizationStats {
        self.stats.snapshot()
    }

    /// Zero all statistics counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Operator reset of both stores, e.g. after a config change invalidates
    /// cached fingerprints.
    pub fn clear_caches(&self) {
        self.cache.clear();
        self.history.clear();
        info!("hash cache and motion history cleared");
    }

    /// Current hash cache population.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Number of sessions with a live motion baseline.
    pub fn session_count(&self) -> usize {
        self.history.len()
    }

    /// Primary entry point: decide whether `frame` is worth forwarding.
    ///
    /// Never returns an error and never exceeds the configured deadline by
    /// more than a small grace window; timeouts, panics, and stage faults
    /// all degrade to the same permissive pass-through used for a globally
    /// disabled pipeline, because uncertainty must favor processing.
    pub async fn pre_process(
        self: &Arc<Self>,
        frame: PixelBuffer,
        context: AnalysisContext,
    ) -> PreProcessingResult {
        let config = self.thresholds();
        let deadline = Duration::from_millis(config.flags.max_processing_time_ms + DEADLINE_GRACE_MS);

        // The wrapper and the blocking task share one claim token so each
        // frame is recorded in the statistics exactly once, even when the
        // wrapper gives up and the abandoned task finishes later.
        let claim = Arc::new(AtomicBool::new(false));
        let pipeline = Arc::clone(self);
        let ctx = context.clone();
        let task_claim = Arc::clone(&claim);
        let task = tokio::task::spawn_blocking(move || {
            pipeline.decide_inner(&frame, &ctx, Utc::now(), Some(&task_claim))
        });

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(err))) => {
                warn!(error = %err, "decision failed, falling back to pass-through");
                self.passthrough(&context, &config, Instant::now(), "stage fault", Some(&claim))
            }
            Ok(Err(join_err)) => {
                error!(error = %join_err, "decision task panicked, falling back to pass-through");
                self.passthrough(&context, &config, Instant::now(), "decision fault", Some(&claim))
            }
            Err(_) => {
                warn!(
                    deadline_ms = config.flags.max_processing_time_ms,
                    "decision deadline exceeded, falling back to pass-through"
                );
                self.passthrough(
                    &context,
                    &config,
                    Instant::now(),
                    "deadline exceeded",
                    Some(&claim),
                )
            }
        }
    }

    /// The synchronous decision body. Exposed for batch tooling and tests
    /// that need a deterministic clock; `pre_process` is the safe wrapper.
    pub fn decide(
        &self,
        frame: &PixelBuffer,
        context: &AnalysisContext,
        now: DateTime<Utc>,
    ) -> PipelineResult<PreProcessingResult> {
        self.decide_inner(frame, context, now, None)
    }

    fn decide_inner(
        &self,
        frame: &PixelBuffer,
        context: &AnalysisContext,
        now: DateTime<Utc>,
        claim: Option<&AtomicBool>,
    ) -> PipelineResult<PreProcessingResult> {
        let started = Instant::now();
        let config = self.thresholds();
        let flags = &config.flags;

        if !flags.enabled {
            return Ok(self.passthrough(context, &config, started, "pipeline disabled", claim));
        }

        let overrides = context.stage_overrides();
        let mut stages = StageSet::default();

        // The safety profile is resolved before the first stage runs: the
        // quality stage needs its multipliers, and the forced-processing
        // rule gates every skip below. Its stage result is still judged in
        // pipeline order, after quality.
        let policy = if overrides.skip_time_policy {
            ResolvedPolicy::bypassed("context override")
        } else {
            TimePolicyEngine::resolve(now, &config.time_policy)
        };
        let forced = policy.forced_processing();
        let multipliers = policy.multipliers;
        stages.time_filter = policy.result;

        // Stage 1: quality.
        stages.quality = if overrides.skip_quality {
            QualityResult::bypassed("context override")
        } else {
            QualityAssessor::assess(frame, &config.quality, &multipliers)
        };
        if config.quality.enabled && stages.quality.status == StageStatus::Failed && !forced {
            return Ok(self.finish(context, &config, stages, Decision::Skip(SkipReason::LowQuality), started, claim));
        }
        if let Some(outcome) = self.deadline_fallback(context, &config, started, claim) {
            return outcome;
        }

        // Stage 2: time policy.
        if config.time_policy.enabled && stages.time_filter.status == StageStatus::Failed && !forced
        {
            return Ok(self.finish(context, &config, stages, Decision::Skip(SkipReason::TimeFiltered), started, claim));
        }

        // One fingerprint serves both the duplicate and motion stages.
        let fingerprint = match fingerprint(frame) {
            Ok(fp) => Some(fp),
            Err(err) => {
                if !flags.fallback_on_error {
                    return Err(PipelineError::stage_fault("fingerprint", err.to_string()));
                }
                warn!(error = %err, "fingerprinting failed, duplicate and motion fall back to neutral");
                None
            }
        };
        if let Some(outcome) = self.deadline_fallback(context, &config, started, claim) {
            return outcome;
        }

        // Stage 3: duplicate.
        stages.duplicate = if overrides.skip_duplicate {
            DuplicateResult::bypassed("context override")
        } else if multipliers.bypass_duplicate {
            DuplicateResult::bypassed(format!(
                "{} profile bypass",
                stages.time_filter.profile
            ))
        } else {
            match fingerprint.as_deref() {
                Some(fp) => DuplicateDetector::check(fp, &self.cache, &config.duplicate, now),
                None => DuplicateResult::neutral("fingerprint unavailable"),
            }
        };
        if config.duplicate.enabled && stages.duplicate.status == StageStatus::Failed && !forced {
            return Ok(self.finish(context, &config, stages, Decision::Skip(SkipReason::Duplicate), started, claim));
        }
        if let Some(outcome) = self.deadline_fallback(context, &config, started, claim) {
            return outcome;
        }

        // Stage 4: occupancy.
        stages.occupancy = if overrides.skip_occupancy {
            OccupancyResult::bypassed("context override")
        } else if multipliers.bypass_occupancy {
            OccupancyResult::bypassed(format!(
                "{} profile bypass",
                stages.time_filter.profile
            ))
        } else {
            OccupancyDetector::detect(frame, &config.occupancy)
        };
        if config.occupancy.enabled && stages.occupancy.status == StageStatus::Failed && !forced {
            return Ok(self.finish(context, &config, stages, Decision::Skip(SkipReason::NoOccupancy), started, claim));
        }
        if let Some(outcome) = self.deadline_fallback(context, &config, started, claim) {
            return outcome;
        }

        // Stage 5: motion.
        stages.motion = if overrides.skip_motion {
            MotionResult::bypassed("context override")
        } else {
            match fingerprint.as_deref() {
                Some(fp) => MotionDetector::detect(
                    fp,
                    &context.session_id,
                    &self.history,
                    &config.motion,
                    multipliers.motion_sensitivity,
                    now,
                ),
                None => MotionResult::neutral("fingerprint unavailable"),
            }
        };
        if config.motion.enabled && stages.motion.status == StageStatus::Failed && !forced {
            return Ok(self.finish(context, &config, stages, Decision::Skip(SkipReason::NoMotion), started, claim));
        }

        Ok(self.finish(context, &config, stages, Decision::Proceed, started, claim))
    }

    /// Periodic TTL sweep over both stores, independent of request handling.
    /// Each sweep holds a store lock for one bounded pass only.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let config = pipeline.thresholds();
                let now = Utc::now();
                let ttl = config.duplicate.cache_duration_minutes;
                pipeline.cache.sweep(now, ttl);
                pipeline.history.sweep(now, ttl);
            }
        })
    }

    fn deadline_fallback(
        &self,
        context: &AnalysisContext,
        config: &OptimizationThresholds,
        started: Instant,
        claim: Option<&AtomicBool>,
    ) -> Option<PipelineResult<PreProcessingResult>> {
        if started.elapsed().as_millis() as u64 >= config.flags.max_processing_time_ms {
            if !config.flags.fallback_on_error {
                return Some(Err(PipelineError::Timeout(
                    config.flags.max_processing_time_ms,
                )));
            }
            warn!(
                deadline_ms = config.flags.max_processing_time_ms,
                "deadline reached mid-decision, falling back to pass-through"
            );
            return Some(Ok(self.passthrough(
                context,
                config,
                started,
                "deadline exceeded",
                claim,
            )));
        }
        None
    }

    /// Record the decision unless another holder of the same claim token
    /// already has. Direct `decide` callers carry no token and always record.
    fn record_once(&self, result: &PreProcessingResult, claim: Option<&AtomicBool>) {
        let already_recorded = claim.is_some_and(|token| token.swap(true, Ordering::SeqCst));
        if !already_recorded {
            self.stats.record(result);
        }
    }

    /// The permissive pass-through used for a disabled pipeline, timeouts,
    /// and unrecoverable faults. Records the decision.
    fn passthrough(
        &self,
        context: &AnalysisContext,
        config: &OptimizationThresholds,
        started: Instant,
        reason: &str,
        claim: Option<&AtomicBool>,
    ) -> PreProcessingResult {
        let result = self.build_passthrough(context, config, started, reason);
        self.record_once(&result, claim);
        result
    }

    fn build_passthrough(
        &self,
        context: &AnalysisContext,
        config: &OptimizationThresholds,
        started: Instant,
        reason: &str,
    ) -> PreProcessingResult {
        debug!(reason, session_id = %context.session_id, "pass-through decision");
        let stages = StageSet::all_bypassed(reason);
        PreProcessingResult {
            should_proceed: true,
            skip_reason: None,
            confidence: 1.0,
            overall_score: 100.0,
            estimated_savings_pct: 0.0,
            quality: stages.quality,
            time_filter: stages.time_filter,
            duplicate: stages.duplicate,
            occupancy: stages.occupancy,
            motion: stages.motion,
            session_id: context.session_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            decision_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            config_version: config.version,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn finish(
        &self,
        context: &AnalysisContext,
        config: &OptimizationThresholds,
        stages: StageSet,
        decision: Decision,
        started: Instant,
        claim: Option<&AtomicBool>,
    ) -> PreProcessingResult {
        let (should_proceed, skip_reason, confidence) = match decision {
            Decision::Proceed => (true, None, 0.9),
            Decision::Skip(reason) => (false, Some(reason), 0.8),
        };

        let result = PreProcessingResult {
            should_proceed,
            skip_reason,
            confidence,
            overall_score: stages.overall_score(),
            estimated_savings_pct: skip_reason.map(|r| r.savings_pct()).unwrap_or(0.0),
            quality: stages.quality,
            time_filter: stages.time_filter,
            duplicate: stages.duplicate,
            occupancy: stages.occupancy,
            motion: stages.motion,
            session_id: context.session_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            decision_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            config_version: config.version,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        if config.flags.debug_mode {
            info!(
                session_id = %result.session_id,
                sequence = result.sequence,
                should_proceed = result.should_proceed,
                skip_reason = result.skip_reason.map(|r| r.as_str()),
                overall_score = format!("{:.1}", result.overall_score),
                quality = format!("{:.1}", result.quality.score),
                duplicate_similarity = format!("{:.2}", result.duplicate.similarity),
                occupancy_confidence = format!("{:.2}", result.occupancy.confidence),
                motion_score = format!("{:.1}", result.motion.score),
                profile = result.time_filter.profile.as_str(),
                "decision"
            );
        } else {
            debug!(
                session_id = %result.session_id,
                should_proceed = result.should_proceed,
                skip_reason = result.skip_reason.map(|r| r.as_str()),
                "decision"
            );
        }

        self.record_once(&result, claim);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fsift_models::{PixelFormat, StageOverrides};

    fn pipeline() -> FramePipeline {
        FramePipeline::new(OptimizationThresholds::balanced()).unwrap()
    }

    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 13, 0, 0).unwrap()
    }

    fn night() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 23, 0, 0).unwrap()
    }

    fn black_frame() -> PixelBuffer {
        PixelBuffer::new(PixelFormat::Gray8, 32, 32, vec![5; 32 * 32]).unwrap()
    }

    /// Textured frame that passes quality and occupancy.
    fn busy_frame(seed: u8) -> PixelBuffer {
        let data: Vec<u8> = (0..32 * 32)
            .map(|i| {
                let x = i % 32;
                if x % 2 == 0 {
                    seed.wrapping_add(10)
                } else {
                    230u8.wrapping_sub(seed)
                }
            })
            .collect();
        PixelBuffer::new(PixelFormat::Gray8, 32, 32, data).unwrap()
    }

    /// Textured frame large enough that scanning it exceeds a 1 ms deadline.
    fn huge_frame() -> PixelBuffer {
        let data: Vec<u8> = (0..4096usize * 4096)
            .map(|i| if (i % 4096) % 2 == 0 { 10 } else { 230 })
            .collect();
        PixelBuffer::new(PixelFormat::Gray8, 4096, 4096, data).unwrap()
    }

    fn one_ms_deadline() -> OptimizationThresholds {
        let mut t = OptimizationThresholds::balanced();
        t.flags.max_processing_time_ms = 1;
        t
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut t = OptimizationThresholds::balanced();
        t.quality.min_brightness = 95.0;
        assert!(FramePipeline::new(t).is_err());
    }

    #[test]
    fn test_black_frame_skipped_for_low_quality() {
        let p = pipeline();
        let result = p
            .decide(&black_frame(), &AnalysisContext::new("s1"), midday())
            .unwrap();
        assert!(!result.should_proceed);
        assert_eq!(result.skip_reason, Some(SkipReason::LowQuality));
        assert!((result.confidence - 0.8).abs() < f64::EPSILON);
        // Short-circuit: remaining stages were never evaluated.
        assert_eq!(result.duplicate.status, StageStatus::NotEvaluated);
        assert_eq!(result.occupancy.status, StageStatus::NotEvaluated);
        assert_eq!(result.motion.status, StageStatus::NotEvaluated);
        assert!(result.is_well_formed());
    }

    #[test]
    fn test_night_forces_processing_of_black_frame() {
        let p = pipeline();
        let result = p
            .decide(&black_frame(), &AnalysisContext::new("s1"), night())
            .unwrap();
        assert!(result.should_proceed, "night profile must never skip");
        assert!(result.time_filter.forced_processing);
        // Quality still ran and recorded its failure.
        assert_eq!(result.quality.status, StageStatus::Failed);
        // Duplicate and occupancy are bypassed by the night profile.
        assert_eq!(result.duplicate.status, StageStatus::Bypassed);
        assert_eq!(result.occupancy.status, StageStatus::Bypassed);
    }

    #[test]
    fn test_disabled_pipeline_passes_everything_through() {
        let mut t = OptimizationThresholds::balanced();
        t.flags.enabled = false;
        let p = FramePipeline::new(t).unwrap();
        let result = p
            .decide(&black_frame(), &AnalysisContext::new("s1"), midday())
            .unwrap();
        assert!(result.should_proceed);
        assert_eq!(result.overall_score, 100.0);
        assert_eq!(result.estimated_savings_pct, 0.0);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_repeat_frame_skipped_as_duplicate() {
        let p = pipeline();
        let ctx = AnalysisContext::new("s1");
        let first = p.decide(&busy_frame(0), &ctx, midday()).unwrap();
        assert!(first.should_proceed, "skip: {:?}", first.skip_reason);
        let second = p.decide(&busy_frame(0), &ctx, midday()).unwrap();
        assert!(!second.should_proceed);
        assert_eq!(second.skip_reason, Some(SkipReason::Duplicate));
        assert!(second.duplicate.similarity >= 0.85);
    }

    #[test]
    fn test_disabled_stage_records_but_does_not_skip() {
        let mut t = OptimizationThresholds::balanced();
        t.quality.enabled = false;
        // Keep downstream stages from skipping the frame for other reasons.
        t.occupancy.enabled = false;
        t.motion.enabled = false;
        let p = FramePipeline::new(t).unwrap();
        let result = p
            .decide(&black_frame(), &AnalysisContext::new("s1"), midday())
            .unwrap();
        assert!(result.should_proceed);
        // The failure is still recorded for audit.
        assert_eq!(result.quality.status, StageStatus::Failed);
    }

    #[test]
    fn test_context_overrides_bypass_stages() {
        let p = pipeline();
        let ctx = AnalysisContext::new("s1").with_overrides(StageOverrides {
            skip_quality: true,
            skip_duplicate: true,
            skip_occupancy: true,
            skip_motion: true,
            ..Default::default()
        });
        let result = p.decide(&black_frame(), &ctx, midday()).unwrap();
        assert!(result.should_proceed);
        assert_eq!(result.quality.status, StageStatus::Bypassed);
        assert_eq!(result.motion.status, StageStatus::Bypassed);
    }

    #[test]
    fn test_sequence_increments() {
        let p = pipeline();
        let ctx = AnalysisContext::new("s1");
        let a = p.decide(&busy_frame(0), &ctx, midday()).unwrap();
        let b = p.decide(&busy_frame(40), &ctx, midday()).unwrap();
        assert_eq!(b.sequence, a.sequence + 1);
    }

    #[test]
    fn test_swap_thresholds_validates() {
        let p = pipeline();
        let mut bad = OptimizationThresholds::balanced();
        bad.duplicate.similarity_ceiling = 7.0;
        assert!(p.swap_thresholds(bad).is_err());
        assert!(p.swap_thresholds(OptimizationThresholds::aggressive()).is_ok());
        assert!(p.thresholds().flags.aggressive_mode);
    }

    #[test]
    fn test_clear_caches_resets_duplicate_state() {
        let p = pipeline();
        let ctx = AnalysisContext::new("s1");
        p.decide(&busy_frame(0), &ctx, midday()).unwrap();
        assert_eq!(p.cache_size(), 1);
        assert_eq!(p.session_count(), 1);
        p.clear_caches();
        assert_eq!(p.cache_size(), 0);
        assert_eq!(p.session_count(), 0);
        let again = p.decide(&busy_frame(0), &ctx, midday()).unwrap();
        assert_ne!(again.skip_reason, Some(SkipReason::Duplicate));
    }

    #[test]
    fn test_stats_observe_every_decision() {
        let p = pipeline();
        let ctx = AnalysisContext::new("s1");
        p.decide(&busy_frame(0), &ctx, midday()).unwrap();
        p.decide(&black_frame(), &ctx, midday()).unwrap();
        let stats = p.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.skipped_requests, 1);
        assert_eq!(stats.skips_for(SkipReason::LowQuality), 1);
    }

    #[test]
    fn test_deadline_exceeded_falls_back_to_passthrough() {
        let p = FramePipeline::new(one_ms_deadline()).unwrap();
        let result = p
            .decide(&huge_frame(), &AnalysisContext::new("s1"), midday())
            .unwrap();
        assert!(result.should_proceed);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.overall_score, 100.0);
        assert_eq!(result.estimated_savings_pct, 0.0);
        assert_eq!(p.stats().total_requests, 1);
    }

    #[test]
    fn test_deadline_without_fallback_is_an_error() {
        let mut t = one_ms_deadline();
        t.flags.fallback_on_error = false;
        let p = FramePipeline::new(t).unwrap();
        let outcome = p.decide(&huge_frame(), &AnalysisContext::new("s1"), midday());
        assert!(matches!(outcome, Err(PipelineError::Timeout(1))));
        // Errors bubble to the caller unrecorded.
        assert_eq!(p.stats().total_requests, 0);
    }

    #[tokio::test]
    async fn test_deadline_fallback_records_exactly_once() {
        // Whichever side loses the race between the blocking task and the
        // wrapper's own timeout, the frame must land in the stats once.
        let p = Arc::new(FramePipeline::new(one_ms_deadline()).unwrap());
        let result = p
            .pre_process(huge_frame(), AnalysisContext::new("s1"))
            .await;
        assert!(result.should_proceed);
        assert!(result.is_well_formed());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(p.stats().total_requests, 1);
    }

    #[tokio::test]
    async fn test_pre_process_contract() {
        let p = Arc::new(pipeline());
        let result = p
            .pre_process(busy_frame(0), AnalysisContext::new("s1"))
            .await;
        assert!(result.is_well_formed());
    }

    #[tokio::test]
    async fn test_pre_process_never_errors_on_malformed_frame() {
        let p = Arc::new(pipeline());
        let bad = PixelBuffer {
            format: PixelFormat::Rgb8,
            width: 16,
            height: 16,
            data: vec![0u8; 10],
        };
        let result = p.pre_process(bad, AnalysisContext::new("s1")).await;
        // Malformed input degrades to neutral stage results, never an error.
        assert!(result.is_well_formed());
    }

    #[tokio::test]
    async fn test_sweeper_runs_independently() {
        let p = Arc::new(pipeline());
        let handle = p.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
    }
}
