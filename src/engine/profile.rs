// ABOUTME: Per-user preference profile learned from recommendation feedback
// ABOUTME: Bounded preference scalars, EMA behavioral statistics, and learning metadata
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! User preference profiles.
//!
//! A [`PreferenceProfile`] is owned exclusively by the profile store and
//! mutated only through the feedback learner. Every rate and confidence field
//! stays inside `[0, 1]` after every mutation, the learning rate stays inside
//! its configured bounds, and the interaction count only ever grows.
//!
//! The serialized layout is forward-compatible: unknown fields are ignored on
//! load and absent fields take the documented defaults, so profiles written
//! by older builds keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::LearningConfig;
use crate::models::ProfileCategory;

/// Clamp a rate/confidence value into `[0, 1]`
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Learned preference profile for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceProfile {
    /// Stable user identifier (store key)
    pub user_id: String,

    // Workout preferences
    /// Preferred training intensity, 0-1
    #[serde(default = "default_preferred_intensity")]
    pub preferred_intensity: f64,
    /// Tolerance for added sets/reps, 0-1
    #[serde(default = "default_volume_tolerance")]
    pub volume_tolerance: f64,
    /// Preferred rest between sets in seconds
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds_preference: f64,
    /// Appetite for exercise variety, 0-1
    #[serde(default = "default_exercise_variety")]
    pub exercise_variety: f64,
    /// Appetite for progressive overload, 0-1
    #[serde(default = "default_progression_rate")]
    pub progression_rate: f64,
    /// Preference for form quality over load, 0-1
    #[serde(default = "default_form_focus")]
    pub form_focus: f64,
    /// Typical session time budget in minutes
    #[serde(default = "default_time_budget")]
    pub time_budget_minutes: f64,

    // Behavioral statistics (EMA-updated, always in [0,1])
    /// Rolling rate of accepted recommendations
    #[serde(default = "default_half")]
    pub acceptance_rate: f64,
    /// Rolling rate of user-modified recommendations
    #[serde(default = "default_modification_frequency")]
    pub modification_frequency: f64,
    /// Rolling rate of ignored recommendations
    #[serde(default = "default_skip_rate")]
    pub skip_rate: f64,

    // Per-category confidence (always in [0,1])
    /// Confidence in workout recommendations
    #[serde(default = "default_half")]
    pub workout_confidence: f64,
    /// Confidence in nutrition recommendations
    #[serde(default = "default_half")]
    pub nutrition_confidence: f64,
    /// Confidence in intensity recommendations
    #[serde(default = "default_half")]
    pub intensity_confidence: f64,

    // Learning metadata
    /// Lifetime feedback events; append-only
    #[serde(default)]
    pub total_interactions: u64,
    /// Timestamp of the last learner mutation
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    /// Adaptive EMA learning rate, bounded by `LearningConfig`
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Recent rejection reasons, newest last; fixed capacity ring
    #[serde(default)]
    pub recent_rejection_reasons: VecDeque<String>,
}

fn default_preferred_intensity() -> f64 {
    0.7
}
fn default_volume_tolerance() -> f64 {
    0.8
}
fn default_rest_seconds() -> f64 {
    90.0
}
fn default_exercise_variety() -> f64 {
    0.6
}
fn default_progression_rate() -> f64 {
    0.5
}
fn default_form_focus() -> f64 {
    0.8
}
fn default_time_budget() -> f64 {
    60.0
}
fn default_half() -> f64 {
    0.5
}
fn default_modification_frequency() -> f64 {
    0.3
}
fn default_skip_rate() -> f64 {
    0.1
}
fn default_learning_rate() -> f64 {
    0.1
}

impl PreferenceProfile {
    /// Create a fresh profile with documented defaults
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            preferred_intensity: default_preferred_intensity(),
            volume_tolerance: default_volume_tolerance(),
            rest_seconds_preference: default_rest_seconds(),
            exercise_variety: default_exercise_variety(),
            progression_rate: default_progression_rate(),
            form_focus: default_form_focus(),
            time_budget_minutes: default_time_budget(),
            acceptance_rate: default_half(),
            modification_frequency: default_modification_frequency(),
            skip_rate: default_skip_rate(),
            workout_confidence: default_half(),
            nutrition_confidence: default_half(),
            intensity_confidence: default_half(),
            total_interactions: 0,
            last_updated: Utc::now(),
            learning_rate: default_learning_rate(),
            recent_rejection_reasons: VecDeque::new(),
        }
    }

    /// Experience band derived from interaction count
    #[must_use]
    pub const fn experience_level(&self) -> &'static str {
        if self.total_interactions < 10 {
            "Beginner"
        } else if self.total_interactions < 50 {
            "Intermediate"
        } else {
            "Advanced"
        }
    }

    /// Read the confidence scalar for a recommendation category
    #[must_use]
    pub const fn confidence_for(&self, category: ProfileCategory) -> f64 {
        match category {
            ProfileCategory::Workout => self.workout_confidence,
            ProfileCategory::Nutrition => self.nutrition_confidence,
            ProfileCategory::Intensity => self.intensity_confidence,
        }
    }

    /// Adjust the confidence scalar for a category by `delta`, clamped to `[0,1]`
    pub fn nudge_confidence(&mut self, category: ProfileCategory, delta: f64) {
        let slot = match category {
            ProfileCategory::Workout => &mut self.workout_confidence,
            ProfileCategory::Nutrition => &mut self.nutrition_confidence,
            ProfileCategory::Intensity => &mut self.intensity_confidence,
        };
        *slot = clamp01(*slot + delta);
    }

    /// Append a rejection reason, evicting the oldest once at capacity
    pub fn push_rejection_reason(&mut self, reason: impl Into<String>, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.recent_rejection_reasons.len() >= capacity {
            self.recent_rejection_reasons.pop_front();
        }
        self.recent_rejection_reasons.push_back(reason.into());
    }

    /// Restore every bounded field to its documented range.
    ///
    /// Called after each learner mutation and after loading persisted state,
    /// so out-of-range values can never escape this module.
    pub fn enforce_invariants(&mut self, learning: &LearningConfig) {
        self.acceptance_rate = clamp01(self.acceptance_rate);
        self.modification_frequency = clamp01(self.modification_frequency);
        self.skip_rate = clamp01(self.skip_rate);
        self.workout_confidence = clamp01(self.workout_confidence);
        self.nutrition_confidence = clamp01(self.nutrition_confidence);
        self.intensity_confidence = clamp01(self.intensity_confidence);
        self.preferred_intensity = clamp01(self.preferred_intensity);
        self.volume_tolerance = clamp01(self.volume_tolerance);
        self.exercise_variety = clamp01(self.exercise_variety);
        self.progression_rate = clamp01(self.progression_rate);
        self.form_focus = clamp01(self.form_focus);
        self.learning_rate = self
            .learning_rate
            .clamp(learning.min_learning_rate, learning.max_learning_rate);
        while self.recent_rejection_reasons.len() > learning.rejection_reason_capacity {
            self.recent_rejection_reasons.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults() {
        let profile = PreferenceProfile::new("u1");
        assert!((profile.preferred_intensity - 0.7).abs() < f64::EPSILON);
        assert!((profile.volume_tolerance - 0.8).abs() < f64::EPSILON);
        assert!((profile.acceptance_rate - 0.5).abs() < f64::EPSILON);
        assert!((profile.learning_rate - 0.1).abs() < f64::EPSILON);
        assert_eq!(profile.total_interactions, 0);
        assert_eq!(profile.experience_level(), "Beginner");
    }

    #[test]
    fn test_rejection_ring_evicts_oldest() {
        let mut profile = PreferenceProfile::new("u1");
        for i in 0..25 {
            profile.push_rejection_reason(format!("reason-{i}"), 20);
        }
        assert_eq!(profile.recent_rejection_reasons.len(), 20);
        assert_eq!(profile.recent_rejection_reasons.front().unwrap(), "reason-5");
        assert_eq!(profile.recent_rejection_reasons.back().unwrap(), "reason-24");
    }

    #[test]
    fn test_enforce_invariants_clamps_everything() {
        let learning = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        profile.acceptance_rate = 1.7;
        profile.workout_confidence = -0.2;
        profile.learning_rate = 0.9;
        profile.enforce_invariants(&learning);
        assert!((profile.acceptance_rate - 1.0).abs() < f64::EPSILON);
        assert!(profile.workout_confidence.abs() < f64::EPSILON);
        assert!((profile.learning_rate - learning.max_learning_rate).abs() < f64::EPSILON);
    }

    #[test]
    fn test_forward_compatible_deserialization() {
        // A profile written by an older build: missing newer optional fields
        // and carrying a field this build does not know about.
        let json = r#"{
            "user_id": "legacy",
            "acceptance_rate": 0.72,
            "total_interactions": 42,
            "some_future_field": {"nested": true}
        }"#;
        let profile: PreferenceProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.user_id, "legacy");
        assert!((profile.acceptance_rate - 0.72).abs() < f64::EPSILON);
        assert_eq!(profile.total_interactions, 42);
        // absent fields took the documented defaults
        assert!((profile.form_focus - 0.8).abs() < f64::EPSILON);
        assert!((profile.learning_rate - 0.1).abs() < f64::EPSILON);
    }
}
