//! Time policy engine: maps the wall clock to a safety profile.
//!
//! The profile decides how aggressively the rest of the pipeline may skip
//! frames. Night and emergency windows force processing outright; that rule
//! is the primary safety invariant of the whole pipeline, checked again by
//! the orchestrator as a hard override rather than left to threshold tuning.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::time::Instant;
use tracing::debug;

use fsift_models::{
    OverrideAction, ProfileMultipliers, SafetyProfile, StageStatus, TimeFilterResult,
    TimePolicyThresholds,
};

/// The resolved policy for one decision: the recorded stage result plus the
/// multipliers downstream stages apply.
#[derive(Debug, Clone)]
pub struct ResolvedPolicy {
    pub result: TimeFilterResult,
    pub multipliers: ProfileMultipliers,
}

impl ResolvedPolicy {
    /// True when no frame may be skipped while this policy is active.
    pub fn forced_processing(&self) -> bool {
        self.result.forced_processing
    }

    /// Neutral daylight policy, used when the stage is bypassed.
    pub fn bypassed(reason: impl Into<String>) -> Self {
        Self {
            result: TimeFilterResult::bypassed(reason),
            multipliers: ProfileMultipliers::neutral(),
        }
    }
}

/// Stateless policy engine.
pub struct TimePolicyEngine;

impl TimePolicyEngine {
    /// Resolve the active safety profile for `now`.
    ///
    /// Schedule overrides are evaluated in list order and the first match
    /// supersedes the hour-derived profile.
    pub fn resolve(now: DateTime<Utc>, config: &TimePolicyThresholds) -> ResolvedPolicy {
        let started = Instant::now();
        let hour = now.hour() as u8;
        let minute_of_day = (now.hour() * 60 + now.minute()) as u16;
        let weekday = now.weekday();

        let matched = config
            .overrides
            .iter()
            .find(|window| window.matches(minute_of_day, weekday));

        let mut reasons = Vec::new();
        let mut status = StageStatus::Passed;

        let (profile, mut multipliers, score) = if let Some(window) = matched {
            match window.action {
                OverrideAction::ForceProcess => {
                    reasons.push(format!(
                        "schedule override {} forces processing",
                        window.kind.as_str()
                    ));
                    (
                        hour_profile(hour, config),
                        ProfileMultipliers::forced_processing(),
                        100.0,
                    )
                }
                OverrideAction::AllowOptimization => (
                    SafetyProfile::DayOptimization,
                    config.day_multipliers,
                    50.0,
                ),
                OverrideAction::ReducedSensitivity => (
                    SafetyProfile::Transition,
                    config.transition_multipliers,
                    75.0,
                ),
                OverrideAction::Suppress => {
                    status = StageStatus::Failed;
                    reasons.push(format!(
                        "{} window active, frames suppressed",
                        window.kind.as_str()
                    ));
                    (hour_profile(hour, config), config.day_multipliers, 0.0)
                }
            }
        } else {
            let profile = hour_profile(hour, config);
            let multipliers = match profile {
                SafetyProfile::Emergency => config.emergency_multipliers,
                SafetyProfile::NightPriority => config.night_multipliers,
                SafetyProfile::Transition => config.transition_multipliers,
                SafetyProfile::DayOptimization => config.day_multipliers,
            };
            let score = match profile {
                SafetyProfile::Emergency | SafetyProfile::NightPriority => 100.0,
                SafetyProfile::Transition => 75.0,
                SafetyProfile::DayOptimization => 50.0,
            };
            (profile, multipliers, score)
        };

        // Forced processing is a structural rule of the profile, not a
        // property of the operator-editable multiplier sets: night and
        // emergency always pin optimization off, whatever the config says.
        if profile.forces_processing() {
            multipliers.enable_optimization = false;
        }
        let forced_processing = !multipliers.enable_optimization;
        if forced_processing && reasons.is_empty() {
            reasons.push(format!("{profile} profile forces processing"));
        }

        debug!(
            hour,
            profile = profile.as_str(),
            forced_processing,
            matched_override = matched.map(|w| w.kind.as_str()),
            "time policy resolved"
        );

        ResolvedPolicy {
            result: TimeFilterResult {
                status,
                score,
                profile,
                hour,
                matched_override: matched.map(|w| w.kind),
                forced_processing,
                processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                reasons,
            },
            multipliers,
        }
    }
}

/// Hour-derived profile, ignoring schedule overrides.
fn hour_profile(hour: u8, config: &TimePolicyThresholds) -> SafetyProfile {
    if config.emergency_hours.contains(&hour) {
        SafetyProfile::Emergency
    } else if config.in_night_window(hour) {
        SafetyProfile::NightPriority
    } else if config.transition_hours.contains(&hour) {
        SafetyProfile::Transition
    } else {
        SafetyProfile::DayOptimization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fsift_models::{OverrideKind, ScheduleOverride};

    fn at_hour(hour: u32) -> DateTime<Utc> {
        // 2026-08-24 is a Monday.
        Utc.with_ymd_and_hms(2026, 8, 24, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_hour_23_is_night_priority_and_forces_processing() {
        let config = TimePolicyThresholds::default(); // night 22..6
        let policy = TimePolicyEngine::resolve(at_hour(23), &config);
        assert_eq!(policy.result.profile, SafetyProfile::NightPriority);
        assert!(policy.forced_processing());
        assert!(!policy.multipliers.enable_optimization);
    }

    #[test]
    fn test_emergency_hours_subset_of_night() {
        let config = TimePolicyThresholds::default(); // emergency 2,3,4
        let policy = TimePolicyEngine::resolve(at_hour(3), &config);
        assert_eq!(policy.result.profile, SafetyProfile::Emergency);
        assert!(policy.forced_processing());
    }

    #[test]
    fn test_midday_is_day_optimization() {
        let policy = TimePolicyEngine::resolve(at_hour(13), &TimePolicyThresholds::default());
        assert_eq!(policy.result.profile, SafetyProfile::DayOptimization);
        assert!(!policy.forced_processing());
        assert!(policy.multipliers.enable_optimization);
    }

    #[test]
    fn test_dusk_is_transition() {
        let policy = TimePolicyEngine::resolve(at_hour(20), &TimePolicyThresholds::default());
        assert_eq!(policy.result.profile, SafetyProfile::Transition);
        assert!(policy.multipliers.motion_sensitivity > 1.0);
    }

    #[test]
    fn test_first_matching_override_wins() {
        let mut config = TimePolicyThresholds::default();
        config.overrides = vec![
            ScheduleOverride {
                kind: OverrideKind::Feeding,
                start_minute: 13 * 60,
                end_minute: 14 * 60,
                weekdays: vec![],
                action: OverrideAction::ForceProcess,
            },
            ScheduleOverride {
                kind: OverrideKind::Maintenance,
                start_minute: 13 * 60,
                end_minute: 14 * 60,
                weekdays: vec![],
                action: OverrideAction::Suppress,
            },
        ];
        let policy = TimePolicyEngine::resolve(at_hour(13), &config);
        assert_eq!(policy.result.matched_override, Some(OverrideKind::Feeding));
        assert!(policy.forced_processing());
    }

    #[test]
    fn test_suppress_override_fails_stage() {
        let mut config = TimePolicyThresholds::default();
        config.overrides = vec![ScheduleOverride {
            kind: OverrideKind::Maintenance,
            start_minute: 13 * 60,
            end_minute: 14 * 60,
            weekdays: vec![],
            action: OverrideAction::Suppress,
        }];
        let policy = TimePolicyEngine::resolve(at_hour(13), &config);
        assert_eq!(policy.result.status, StageStatus::Failed);
        assert!(!policy.forced_processing());
    }

    #[test]
    fn test_weekday_mismatch_ignores_override() {
        let mut config = TimePolicyThresholds::default();
        config.overrides = vec![ScheduleOverride {
            kind: OverrideKind::Training,
            start_minute: 13 * 60,
            end_minute: 14 * 60,
            weekdays: vec![5, 6], // weekend only; test date is a Monday
            action: OverrideAction::Suppress,
        }];
        let policy = TimePolicyEngine::resolve(at_hour(13), &config);
        assert_eq!(policy.result.matched_override, None);
        assert_eq!(policy.result.status, StageStatus::Passed);
    }

    #[test]
    fn test_night_forces_processing_despite_permissive_multipliers() {
        // Operators can edit the multiplier sets; the forced-processing rule
        // must not depend on them.
        let mut config = TimePolicyThresholds::default();
        config.night_multipliers = ProfileMultipliers::neutral();
        config.emergency_multipliers = ProfileMultipliers::neutral();

        let night = TimePolicyEngine::resolve(at_hour(23), &config);
        assert_eq!(night.result.profile, SafetyProfile::NightPriority);
        assert!(night.forced_processing());

        let emergency = TimePolicyEngine::resolve(at_hour(3), &config);
        assert_eq!(emergency.result.profile, SafetyProfile::Emergency);
        assert!(emergency.forced_processing());
    }

    #[test]
    fn test_aggressiveness_decreases_with_risk() {
        let config = TimePolicyThresholds::default();
        let day = TimePolicyEngine::resolve(at_hour(13), &config);
        let dusk = TimePolicyEngine::resolve(at_hour(20), &config);
        let night = TimePolicyEngine::resolve(at_hour(23), &config);
        // Quality minimums loosen monotonically as risk rises.
        assert!(
            day.multipliers.quality_threshold_factor
                >= dusk.multipliers.quality_threshold_factor
        );
        assert!(
            dusk.multipliers.quality_threshold_factor
                >= night.multipliers.quality_threshold_factor
        );
    }
}
