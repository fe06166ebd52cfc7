//! Duplicate detection against the global fingerprint cache.
//!
//! The fingerprint itself is computed once per decision by the orchestrator
//! and shared with the motion stage; this stage only owns the cache
//! comparison. The cache is global across sessions and entirely separate
//! from the per-session motion history.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::debug;

use fsift_models::{DuplicateResult, DuplicateThresholds, StageStatus};

use crate::store::HashCache;

/// Characters of the matched fingerprint kept for audit logs.
const MATCH_PREFIX_LEN: usize = 16;

/// Stateless detector over a shared cache.
pub struct DuplicateDetector;

impl DuplicateDetector {
    /// Compare `fingerprint` against the cache and insert it.
    ///
    /// The store sweeps TTL-expired entries first and evicts oldest-first
    /// when over capacity; a frame is a duplicate when the best surviving
    /// match reaches the configured ceiling.
    pub fn check(
        fingerprint: &str,
        cache: &HashCache,
        thresholds: &DuplicateThresholds,
        now: DateTime<Utc>,
    ) -> DuplicateResult {
        let started = Instant::now();

        let lookup = cache.lookup_and_insert(
            fingerprint,
            now,
            thresholds.cache_duration_minutes,
            thresholds.cache_max_entries,
        );

        let (similarity, matched_fingerprint) = match &lookup.best {
            Some(best) => (
                best.similarity,
                Some(best.fingerprint.chars().take(MATCH_PREFIX_LEN).collect()),
            ),
            None => (0.0, None),
        };

        let is_duplicate = lookup.size > 0 && similarity >= thresholds.similarity_ceiling;
        let mut reasons = Vec::new();
        if is_duplicate {
            reasons.push(format!(
                "duplicate of cached frame (similarity {similarity:.2} >= {:.2})",
                thresholds.similarity_ceiling
            ));
        }

        debug!(
            similarity = format!("{similarity:.3}"),
            cache_size = lookup.size,
            is_duplicate,
            "duplicate check"
        );

        DuplicateResult {
            status: if is_duplicate {
                StageStatus::Failed
            } else {
                StageStatus::Passed
            },
            score: (1.0 - similarity) * 100.0,
            is_duplicate,
            similarity,
            matched_fingerprint,
            cache_size: lookup.size,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(fill: char) -> String {
        std::iter::repeat(fill).take(64).collect()
    }

    #[test]
    fn test_first_frame_never_duplicate() {
        let cache = HashCache::new();
        let result =
            DuplicateDetector::check(&fp('a'), &cache, &DuplicateThresholds::default(), Utc::now());
        assert!(!result.is_duplicate);
        assert_eq!(result.status, StageStatus::Passed);
        assert_eq!(result.cache_size, 0);
    }

    #[test]
    fn test_repeat_frame_is_duplicate() {
        let cache = HashCache::new();
        let thresholds = DuplicateThresholds::default();
        let now = Utc::now();
        DuplicateDetector::check(&fp('a'), &cache, &thresholds, now);
        let second = DuplicateDetector::check(&fp('a'), &cache, &thresholds, now);
        assert!(second.is_duplicate);
        assert!((second.similarity - 1.0).abs() < f64::EPSILON);
        assert_eq!(second.status, StageStatus::Failed);
        assert!(second.reasons[0].contains("duplicate"));
    }

    #[test]
    fn test_distinct_frame_passes_with_low_similarity() {
        let cache = HashCache::new();
        let thresholds = DuplicateThresholds::default();
        let now = Utc::now();
        DuplicateDetector::check(&fp('a'), &cache, &thresholds, now);
        let other = DuplicateDetector::check(&fp('f'), &cache, &thresholds, now);
        assert!(!other.is_duplicate);
        assert_eq!(other.similarity, 0.0);
        assert_eq!(other.score, 100.0);
    }

    #[test]
    fn test_expired_entry_not_a_match() {
        let cache = HashCache::new();
        let thresholds = DuplicateThresholds::default(); // 30 minute TTL
        let old = Utc::now() - chrono::Duration::minutes(45);
        DuplicateDetector::check(&fp('a'), &cache, &thresholds, old);
        let later = DuplicateDetector::check(&fp('a'), &cache, &thresholds, Utc::now());
        assert!(!later.is_duplicate);
        assert_eq!(later.cache_size, 0);
    }
}
