// ABOUTME: Read-only profile insights: derived trend statistics and coaching meta-notes
// ABOUTME: Pure projection over the profile and the bounded interaction history
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Profile insights.
//!
//! A [`ProfileSummary`] is a read-only projection: building one never
//! mutates the profile or the history it summarizes.

use serde::{Deserialize, Serialize};

use crate::config::LearningConfig;
use crate::engine::profile::PreferenceProfile;
use crate::models::{FeedbackAction, InteractionRecord};

/// Direction of the user's satisfaction trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Ratings in the recent half are meaningfully higher
    Improving,
    /// Ratings in the recent half are meaningfully lower
    Declining,
    /// No meaningful movement either way
    Stable,
    /// Not enough history to call a trend
    InsufficientData,
}

/// Read-only projection of a profile plus derived statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// User this summary describes
    pub user_id: String,
    /// Snapshot of the learned profile
    pub profile: PreferenceProfile,
    /// Acceptance rate over the last ten recorded interactions
    pub recent_acceptance_rate: f64,
    /// Satisfaction trend from rating halves
    pub improvement_trend: TrendDirection,
    /// `1 - learning_rate`: higher means the profile has settled
    pub learning_stability: f64,
    /// How personalized recommendations can be, `min(1, interactions / 50)`
    pub personalization_level: f64,
    /// Meta-notes about how the engine is performing for this user
    pub coaching_notes: Vec<String>,
}

impl ProfileSummary {
    /// Build a summary from a profile snapshot and its interaction history
    #[must_use]
    pub fn build(
        profile: PreferenceProfile,
        history: &[InteractionRecord],
        config: &LearningConfig,
    ) -> Self {
        let recent_acceptance_rate = recent_acceptance_rate(history);
        let improvement_trend = improvement_trend(history);
        let learning_stability = 1.0 - profile.learning_rate;
        let personalization_level = (profile.total_interactions as f64 / 50.0).min(1.0);
        let coaching_notes = coaching_notes(&profile, config);

        Self {
            user_id: profile.user_id.clone(),
            profile,
            recent_acceptance_rate,
            improvement_trend,
            learning_stability,
            personalization_level,
            coaching_notes,
        }
    }
}

/// Acceptance rate over the last ten interactions, 0.5 with no history
fn recent_acceptance_rate(history: &[InteractionRecord]) -> f64 {
    let recent: Vec<_> = history.iter().rev().take(10).collect();
    if recent.is_empty() {
        return 0.5;
    }
    let accepted = recent
        .iter()
        .filter(|r| r.feedback.action == FeedbackAction::Accepted)
        .count();
    accepted as f64 / recent.len() as f64
}

/// Compare average ratings of the older and newer history halves
fn improvement_trend(history: &[InteractionRecord]) -> TrendDirection {
    if history.len() < 10 {
        return TrendDirection::InsufficientData;
    }

    let rating_of = |record: &InteractionRecord| {
        record.feedback.rating.map_or(3.0, f64::from)
    };

    let mid = history.len() / 2;
    let first: f64 = history[..mid].iter().map(rating_of).sum::<f64>() / mid as f64;
    let second: f64 =
        history[mid..].iter().map(rating_of).sum::<f64>() / (history.len() - mid) as f64;

    if second > first + 0.3 {
        TrendDirection::Improving
    } else if second < first - 0.3 {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Meta-notes about recommendation quality for this user
fn coaching_notes(profile: &PreferenceProfile, config: &LearningConfig) -> Vec<String> {
    let mut notes = Vec::new();

    if profile.acceptance_rate < 0.3 {
        notes.push(
            "Recommendations may be too aggressive; consider more conservative suggestions."
                .to_owned(),
        );
    }
    if profile.modification_frequency > 0.7 {
        notes.push(
            "User frequently modifies suggestions; learn from modification patterns.".to_owned(),
        );
    }
    if profile.total_interactions < 10 {
        notes.push("Limited interaction history; still learning user preferences.".to_owned());
    } else if profile.total_interactions > 100 {
        notes.push(
            "Extensive interaction history available; recommendations should be highly personalized."
                .to_owned(),
        );
    }
    if !profile.recent_rejection_reasons.is_empty()
        && profile.recent_rejection_reasons.len() >= config.rejection_reason_capacity / 2
    {
        notes.push("Rejection reasons are accumulating; review the recent ones.".to_owned());
    }

    notes
}
