//! Motion detection against the session's previous frame.
//!
//! Reuses the duplicate detector's fingerprint rather than re-deriving a
//! second representation. Exactly one baseline is stored per session and the
//! current frame always becomes the new baseline, pass or fail.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::debug;

use fsift_models::{MotionResult, MotionThresholds, StageStatus};

use crate::fingerprint::difference_pct;
use crate::store::MotionHistory;

/// Stateless detector over the shared per-session history.
pub struct MotionDetector;

impl MotionDetector {
    /// Score frame-to-frame change for this session.
    ///
    /// The first frame of a session has no baseline and passes permissively
    /// ("motion assumed"). `sensitivity` above 1.0 lowers both floors, so a
    /// night profile keeps smaller movements.
    pub fn detect(
        fingerprint: &str,
        session_id: &str,
        history: &MotionHistory,
        thresholds: &MotionThresholds,
        sensitivity: f64,
        now: DateTime<Utc>,
    ) -> MotionResult {
        let started = Instant::now();

        let previous = history.swap(session_id, fingerprint, now);

        let Some(previous) = previous else {
            debug!(session_id, "no motion baseline, motion assumed");
            let mut result = MotionResult::neutral("first frame of session, motion assumed");
            result.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
            return result;
        };

        let frame_difference = difference_pct(&previous, fingerprint);
        let score = frame_difference;

        let sensitivity = sensitivity.max(f64::EPSILON);
        let score_floor = thresholds.min_motion_score / sensitivity;
        let difference_floor = thresholds.min_frame_difference / sensitivity;

        let motion_detected = score >= score_floor && frame_difference >= difference_floor;
        let mut reasons = Vec::new();
        if !motion_detected {
            reasons.push(format!(
                "no motion detected (score {score:.1} < {score_floor:.1})"
            ));
        }

        debug!(
            session_id,
            score = format!("{score:.1}"),
            frame_difference = format!("{frame_difference:.1}"),
            motion_detected,
            "motion check"
        );

        MotionResult {
            status: if motion_detected {
                StageStatus::Passed
            } else {
                StageStatus::Failed
            },
            score,
            motion_detected,
            frame_difference,
            had_baseline: true,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            reasons,
        }
    }
}
