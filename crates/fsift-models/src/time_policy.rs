//! Safety profiles and schedule overrides for the time policy engine.
//!
//! The pipeline's willingness to skip frames depends on the time of day:
//! optimization aggressiveness must decrease monotonically as time-of-day
//! risk increases. Night and emergency profiles force processing outright.

use chrono::Weekday;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-derived policy governing how aggressively the pipeline may skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyProfile {
    /// Night hours: foaling, colic, and intrusion risk. Forces processing.
    NightPriority,
    /// Highest-sensitivity subset of the night window. Forces processing.
    Emergency,
    /// Daylight staffed hours: full optimization allowed.
    #[default]
    DayOptimization,
    /// Dawn/dusk boundary hours: optimization allowed but softened.
    Transition,
}

impl SafetyProfile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyProfile::NightPriority => "night_priority",
            SafetyProfile::Emergency => "emergency",
            SafetyProfile::DayOptimization => "day_optimization",
            SafetyProfile::Transition => "transition",
        }
    }

    /// Relative risk rank (1 = lowest risk, 4 = highest).
    pub fn risk_rank(&self) -> u8 {
        match self {
            SafetyProfile::DayOptimization => 1,
            SafetyProfile::Transition => 2,
            SafetyProfile::NightPriority => 3,
            SafetyProfile::Emergency => 4,
        }
    }

    /// Returns true if this profile forces processing of every frame.
    pub fn forces_processing(&self) -> bool {
        matches!(self, SafetyProfile::NightPriority | SafetyProfile::Emergency)
    }
}

impl fmt::Display for SafetyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-profile threshold adjustments applied by downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProfileMultipliers {
    /// Factor applied to quality minimums (< 1.0 loosens them).
    pub quality_threshold_factor: f64,

    /// Multiplier on motion sensitivity (> 1.0 lowers the motion floor).
    pub motion_sensitivity: f64,

    /// Skip the duplicate check entirely while this profile is active.
    pub bypass_duplicate: bool,

    /// Skip the occupancy check entirely while this profile is active.
    pub bypass_occupancy: bool,

    /// Whether the orchestrator may skip frames at all. When false, stage
    /// failures are recorded but never converted into a skip decision.
    pub enable_optimization: bool,
}

impl ProfileMultipliers {
    /// Multipliers for a profile that must never suppress a frame.
    pub fn forced_processing() -> Self {
        Self {
            quality_threshold_factor: 0.0,
            motion_sensitivity: 3.0,
            bypass_duplicate: true,
            bypass_occupancy: true,
            enable_optimization: false,
        }
    }

    /// Neutral daylight multipliers.
    pub fn neutral() -> Self {
        Self {
            quality_threshold_factor: 1.0,
            motion_sensitivity: 1.0,
            bypass_duplicate: false,
            bypass_occupancy: false,
            enable_optimization: true,
        }
    }
}

impl Default for ProfileMultipliers {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Kind of scheduled facility activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Feeding,
    Training,
    Maintenance,
    NightCheck,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKind::Feeding => "feeding",
            OverrideKind::Training => "training",
            OverrideKind::Maintenance => "maintenance",
            OverrideKind::NightCheck => "night_check",
        }
    }
}

/// What a matching schedule override does to the hour-derived profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Treat the window like an emergency: process every frame.
    ForceProcess,
    /// Full optimization, as if it were staffed daylight hours.
    AllowOptimization,
    /// Softened optimization (transition multipliers).
    ReducedSensitivity,
    /// Skip frames outright (camera under maintenance, feed is noise).
    Suppress,
}

/// A scheduled window that supersedes the hour-derived safety profile.
///
/// Overrides are evaluated in list order; the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScheduleOverride {
    /// What activity this window represents.
    pub kind: OverrideKind,

    /// Window start, minutes since midnight (0..1440).
    pub start_minute: u16,

    /// Window end, minutes since midnight. May be below `start_minute` for
    /// windows that wrap past midnight.
    pub end_minute: u16,

    /// Weekdays the window applies to, 0 = Monday .. 6 = Sunday.
    /// Empty means every day.
    #[serde(default)]
    pub weekdays: Vec<u8>,

    /// Effect on the active profile while the window matches.
    pub action: OverrideAction,
}

impl ScheduleOverride {
    /// True when the window covers the given minute-of-day and weekday.
    pub fn matches(&self, minute_of_day: u16, weekday: Weekday) -> bool {
        let day_ok = self.weekdays.is_empty()
            || self
                .weekdays
                .contains(&(weekday.num_days_from_monday() as u8));
        if !day_ok {
            return false;
        }
        if self.start_minute <= self.end_minute {
            minute_of_day >= self.start_minute && minute_of_day < self.end_minute
        } else {
            // Wraps past midnight.
            minute_of_day >= self.start_minute || minute_of_day < self.end_minute
        }
    }
}
