// ABOUTME: Shared domain types for the adaptive coaching engine
// ABOUTME: Context signals, adjustment actions, recommendations, and feedback records
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Core data model shared by the workout and nutrition instantiations.
//!
//! Everything here is a plain serializable value type. `Context` is built
//! fresh per request and never persisted; `Recommendation` is immutable once
//! returned; feedback types flow into the learner and its bounded in-memory
//! history.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Time of day buckets for context analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// Before 6 AM
    EarlyMorning,
    /// 6 AM - 12 PM
    Morning,
    /// 12 PM - 5 PM
    Afternoon,
    /// 5 PM - 9 PM
    Evening,
    /// After 9 PM
    Night,
}

impl TimeOfDay {
    /// Bucket an hour (0-23) into a time-of-day category
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => Self::EarlyMorning,
            6..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }
}

/// Reported gym crowding level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdingLevel {
    /// Plenty of free equipment
    Low,
    /// Some waiting expected
    Medium,
    /// Most equipment occupied
    High,
}

/// Situational signals for a single request.
///
/// All physiological and environmental signals are optional; the analyzer
/// substitutes neutral values for anything absent. A `Context` carries no
/// identity beyond the owning request and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Time-of-day bucket
    pub time_of_day: TimeOfDay,
    /// Day of week
    pub day_of_week: Weekday,
    /// Self-reported energy on a 0-10 scale
    #[serde(default)]
    pub energy: Option<f64>,
    /// Self-reported motivation on a 0-10 scale
    #[serde(default)]
    pub motivation: Option<f64>,
    /// External recovery composite on a 0-100 scale (HRV, sleep, stress)
    #[serde(default)]
    pub recovery_score: Option<f64>,
    /// Sleep quality on a 0-10 scale
    #[serde(default)]
    pub sleep_quality: Option<f64>,
    /// Last night's sleep duration in hours
    #[serde(default)]
    pub sleep_duration_hours: Option<f64>,
    /// Stress level on a 0-10 scale
    #[serde(default)]
    pub stress_level: Option<f64>,
    /// Minutes available for the session
    #[serde(default)]
    pub available_minutes: Option<f64>,
    /// Equipment name -> currently available
    #[serde(default)]
    pub equipment_availability: Option<HashMap<String, bool>>,
    /// Gym crowding level
    #[serde(default)]
    pub crowding: Option<CrowdingLevel>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            time_of_day: TimeOfDay::Morning,
            day_of_week: Weekday::Mon,
            energy: None,
            motivation: None,
            recovery_score: None,
            sleep_quality: None,
            sleep_duration_hours: None,
            stress_level: None,
            available_minutes: None,
            equipment_availability: None,
            crowding: None,
        }
    }
}

/// Closed set of adjustment actions a suggestion may carry.
///
/// The first group is the workout instantiation's vocabulary, the second the
/// nutrition instantiation's. The suggestion source only ever emits tags from
/// the owning domain's subset; anything else is treated as malformed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentAction {
    /// Reduce reps for the current set
    RepReduction,
    /// Add reps to the current set
    RepIncrease,
    /// Increase working weight
    WeightIncrease,
    /// Shorten rest between sets
    RestReduction,
    /// Lengthen rest between sets
    RestIncrease,
    /// Drop a set from the plan
    VolumeReduction,
    /// Add a set to the plan
    VolumeIncrease,
    /// Push intensity (pace, tempo, load) upward
    IntensityIncrease,
    /// Swap the exercise for an alternative movement
    ExerciseSubstitution,
    /// Keep the plan as written
    MaintainProgram,

    /// Raise protein intake toward target
    IncreaseProtein,
    /// Raise fluid intake toward target
    IncreaseHydration,
    /// Cut added sugar for the rest of the day
    ReduceSugar,
    /// Cut sodium for the rest of the day
    ReduceSodium,
    /// Prioritize recovery-supporting foods
    RecoveryFocus,
}

impl AdjustmentAction {
    /// Whether this action asks the user to do *more* (load, reps, volume, intensity)
    #[must_use]
    pub const fn increases_load(&self) -> bool {
        matches!(
            self,
            Self::WeightIncrease | Self::RepIncrease | Self::VolumeIncrease | Self::IntensityIncrease
        )
    }

    /// Whether this action increases session volume specifically
    #[must_use]
    pub const fn increases_volume(&self) -> bool {
        matches!(self, Self::VolumeIncrease | Self::RepIncrease)
    }

    /// Whether this action is conservative (gets the confidence boost)
    #[must_use]
    pub const fn is_conservative(&self) -> bool {
        matches!(
            self,
            Self::MaintainProgram | Self::RestIncrease | Self::RecoveryFocus
        )
    }

    /// Snake-case wire tag for this action
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RepReduction => "rep_reduction",
            Self::RepIncrease => "rep_increase",
            Self::WeightIncrease => "weight_increase",
            Self::RestReduction => "rest_reduction",
            Self::RestIncrease => "rest_increase",
            Self::VolumeReduction => "volume_reduction",
            Self::VolumeIncrease => "volume_increase",
            Self::IntensityIncrease => "intensity_increase",
            Self::ExerciseSubstitution => "exercise_substitution",
            Self::MaintainProgram => "maintain_program",
            Self::IncreaseProtein => "increase_protein",
            Self::IncreaseHydration => "increase_hydration",
            Self::ReduceSugar => "reduce_sugar",
            Self::ReduceSodium => "reduce_sodium",
            Self::RecoveryFocus => "recovery_focus",
        }
    }
}

/// A suggested (or original) numeric value.
///
/// Reps may be planned per-set (`Series`); everything else is a `Scalar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestionValue {
    /// Single numeric value (weight, rest seconds, set count, grams, liters)
    Scalar(f64),
    /// Per-set values, e.g. reps for each planned set
    Series(Vec<f64>),
}

impl SuggestionValue {
    /// The scalar value, if this is not a series
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Series(_) => None,
        }
    }

    /// Apply `f` to every numeric component, producing a new value
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            Self::Scalar(v) => Self::Scalar(f(*v)),
            Self::Series(vs) => Self::Series(vs.iter().copied().map(f).collect()),
        }
    }
}

/// Risk tier attached to every recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Safety-clamped or maintain-type recommendation
    #[serde(rename = "Very Low")]
    VeryLow,
    /// Normal conservative adjustment
    #[serde(rename = "Low")]
    Low,
    /// Meaningful change to the plan
    #[serde(rename = "Moderate")]
    Moderate,
    /// Aggressive change; should be rare after personalization
    #[serde(rename = "High")]
    High,
}

impl RiskLevel {
    /// Human-readable label (matches the wire form)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "Very Low",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

/// An alternative option offered alongside the primary recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeOption {
    /// Alternative action
    pub action: AdjustmentAction,
    /// Suggested value for the alternative, if numeric
    #[serde(default)]
    pub suggested_value: Option<SuggestionValue>,
    /// Short note on when to prefer this alternative
    pub note: String,
}

/// A finished, safety-checked recommendation.
///
/// Created fresh per request and never mutated after return; the safety
/// stage produces a new value rather than editing in place, so `reasoning`
/// records what was clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Unique id, referenced by feedback
    pub id: Uuid,
    /// Action tag from the closed domain set
    pub action: AdjustmentAction,
    /// The planned value this recommendation adjusts, if any
    #[serde(default)]
    pub original_value: Option<SuggestionValue>,
    /// The suggested value after personalization and safety clamping
    #[serde(default)]
    pub suggested_value: Option<SuggestionValue>,
    /// Engine confidence in [0,1]
    pub confidence: f64,
    /// Free-text reasoning, including personalization and clamp annotations
    pub reasoning: String,
    /// Contributing factors (stable snake-case tokens)
    pub factors: Vec<String>,
    /// What the user should expect if they follow the suggestion
    pub expected_outcome: String,
    /// Risk tier
    pub risk: RiskLevel,
    /// Alternative options, possibly empty
    #[serde(default)]
    pub alternatives: Vec<AlternativeOption>,
    /// Creation timestamp
    pub generated_at: DateTime<Utc>,
}

/// User response to a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackAction {
    /// Followed the suggestion as given
    Accepted,
    /// Dismissed the suggestion
    Rejected,
    /// Followed a self-modified version
    Modified,
    /// Let the suggestion expire without response
    Ignored,
}

/// Feedback payload submitted for a recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// What the user did with the recommendation
    pub action: FeedbackAction,
    /// Optional explicit rating, 1-5
    #[serde(default)]
    pub rating: Option<u8>,
    /// Seconds between delivery and response
    #[serde(default)]
    pub response_seconds: Option<f64>,
    /// Free-text reason, mainly for rejections
    #[serde(default)]
    pub reason: Option<String>,
    /// The value the user substituted, when `action` is `Modified`
    #[serde(default)]
    pub modified_value: Option<SuggestionValue>,
}

/// Which per-category confidence scalar a feedback event trains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileCategory {
    /// Workout tweak recommendations
    Workout,
    /// Nutrition and hydration recommendations
    Nutrition,
    /// Intensity-specific recommendations
    Intensity,
}

/// A recorded feedback event, kept in the learner's bounded history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// The recommendation this feedback refers to
    pub recommendation_id: Uuid,
    /// Which confidence category the recommendation belonged to
    pub category: ProfileCategory,
    /// The feedback payload
    pub feedback: Feedback,
    /// When the feedback was recorded
    pub recorded_at: DateTime<Utc>,
}
