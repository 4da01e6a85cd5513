// ABOUTME: Feedback learner updating preference profiles from user responses
// ABOUTME: EMA statistics, rating/latency confidence nudges, and periodic pattern re-analysis
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Feedback learning.
//!
//! The learner is the only component that mutates profiles. Each feedback
//! event updates the rolling behavioral statistics by exponential moving
//! average (`new = old·(1−α) + signal·α`), nudges the per-category
//! confidence from explicit ratings and response latency, and records
//! rejection reasons in the profile's bounded ring.
//!
//! Every `pattern_analysis_every` interactions the learner re-examines the
//! recent window: a recent acceptance rate diverging from the stored rate by
//! more than the configured threshold raises the learning rate (bounded
//! above); a stable pattern decays it slowly (bounded below). This is the
//! system's only feedback-driven meta-adaptation.
//!
//! Profile read-modify-write runs under the per-user lock, so concurrent
//! feedback for the same user serializes while other users proceed.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, LearningConfig};
use crate::engine::profile::PreferenceProfile;
use crate::models::{FeedbackAction, InteractionRecord};
use crate::store::{ProfileStore, UserLockRegistry};

/// Exponential moving average step
#[must_use]
pub fn ema(current: f64, signal: f64, alpha: f64) -> f64 {
    current * (1.0 - alpha) + signal * alpha
}

/// Apply one feedback event to a profile. Exposed for direct testing; the
/// engine always goes through [`FeedbackLearner::record`].
pub fn apply_feedback(
    profile: &mut PreferenceProfile,
    record: &InteractionRecord,
    config: &LearningConfig,
) {
    profile.total_interactions += 1;
    let alpha = profile.learning_rate;

    match record.feedback.action {
        FeedbackAction::Accepted => {
            profile.acceptance_rate = ema(profile.acceptance_rate, 1.0, alpha);
        }
        FeedbackAction::Rejected => {
            profile.acceptance_rate = ema(profile.acceptance_rate, 0.0, alpha);
            if let Some(reason) = &record.feedback.reason {
                profile.push_rejection_reason(reason.clone(), config.rejection_reason_capacity);
            }
        }
        FeedbackAction::Modified => {
            profile.modification_frequency = ema(profile.modification_frequency, 1.0, alpha);
        }
        FeedbackAction::Ignored => {
            profile.skip_rate = ema(profile.skip_rate, 1.0, alpha);
        }
    }

    if let Some(rating) = record.feedback.rating {
        let offset = (f64::from(rating) - config.rating_midpoint) / config.rating_divisor;
        profile.nudge_confidence(record.category, offset * alpha);
    }

    if let Some(latency) = record.feedback.response_seconds {
        if latency < config.fast_response_secs {
            profile.nudge_confidence(record.category, config.latency_confidence_step);
        } else if latency > config.slow_response_secs {
            profile.nudge_confidence(record.category, -config.latency_confidence_step);
        }
    }

    profile.last_updated = chrono::Utc::now();
    profile.enforce_invariants(config);
}

/// Re-examine the recent interaction window and adapt the learning rate.
/// Never pushes the rate outside its configured bounds.
pub fn reanalyze_patterns(
    profile: &mut PreferenceProfile,
    recent: &[InteractionRecord],
    config: &LearningConfig,
) {
    if recent.is_empty() {
        return;
    }

    let accepted = recent
        .iter()
        .filter(|r| r.feedback.action == FeedbackAction::Accepted)
        .count();
    let recent_acceptance = accepted as f64 / recent.len() as f64;

    if (recent_acceptance - profile.acceptance_rate).abs() > config.divergence_threshold {
        profile.learning_rate =
            (profile.learning_rate * config.rate_increase_factor).min(config.max_learning_rate);
        info!(
            user_id = %profile.user_id,
            learning_rate = profile.learning_rate,
            "Acceptance pattern shifted, raised learning rate"
        );
    } else {
        profile.learning_rate =
            (profile.learning_rate * config.rate_decay_factor).max(config.min_learning_rate);
    }
}

/// Learner owning the per-user interaction history and the profile
/// read-modify-write cycle
pub struct FeedbackLearner {
    store: Arc<dyn ProfileStore>,
    locks: Arc<UserLockRegistry>,
    history: DashMap<String, VecDeque<InteractionRecord>>,
}

impl FeedbackLearner {
    /// Create a learner over `store`, sharing the per-user lock registry
    /// with the owning engine
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>, locks: Arc<UserLockRegistry>) -> Self {
        Self {
            store,
            locks,
            history: DashMap::new(),
        }
    }

    /// Record one feedback event: update the profile under the user's lock,
    /// append to the bounded history, and trigger pattern re-analysis when
    /// due. Store failures are logged, not surfaced — the in-memory profile
    /// is current and persistence is retried at shutdown.
    pub async fn record(&self, user_id: &str, record: InteractionRecord) {
        let config = &EngineConfig::global().learning;
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut profile = self.store.get(user_id).await;
        apply_feedback(&mut profile, &record, config);

        {
            let mut history = self.history.entry(user_id.to_owned()).or_default();
            while history.len() >= config.interaction_history_capacity {
                history.pop_front();
            }
            history.push_back(record);
        }

        if profile.total_interactions % config.pattern_analysis_every == 0 {
            let recent = self.recent_window(user_id, config.pattern_window);
            reanalyze_patterns(&mut profile, &recent, config);
        }

        debug!(
            user_id,
            acceptance_rate = profile.acceptance_rate,
            interactions = profile.total_interactions,
            "Updated preferences from feedback"
        );

        if let Err(e) = self.store.save(profile).await {
            warn!(user_id, "Failed to persist profile after feedback: {e}");
        }
    }

    /// Snapshot of the user's recorded interactions, oldest first
    #[must_use]
    pub fn history(&self, user_id: &str) -> Vec<InteractionRecord> {
        self.history
            .get(user_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn recent_window(&self, user_id: &str, window: usize) -> Vec<InteractionRecord> {
        self.history
            .get(user_id)
            .map(|h| h.iter().rev().take(window).rev().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::{Feedback, ProfileCategory};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(action: FeedbackAction) -> InteractionRecord {
        InteractionRecord {
            recommendation_id: Uuid::new_v4(),
            category: ProfileCategory::Workout,
            feedback: Feedback {
                action,
                rating: None,
                response_seconds: None,
                reason: None,
                modified_value: None,
            },
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_accept_moves_acceptance_toward_one() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        let before = profile.acceptance_rate;
        apply_feedback(&mut profile, &record(FeedbackAction::Accepted), &config);
        assert!(profile.acceptance_rate > before);
        assert_eq!(profile.total_interactions, 1);
    }

    #[test]
    fn test_reject_moves_acceptance_toward_zero_and_keeps_reason() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        let mut rejected = record(FeedbackAction::Rejected);
        rejected.feedback.reason = Some("too heavy".into());
        apply_feedback(&mut profile, &rejected, &config);
        assert!(profile.acceptance_rate < 0.5);
        assert_eq!(profile.recent_rejection_reasons.back().unwrap(), "too heavy");
    }

    #[test]
    fn test_modify_and_ignore_update_their_own_stats() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        let acceptance_before = profile.acceptance_rate;
        apply_feedback(&mut profile, &record(FeedbackAction::Modified), &config);
        apply_feedback(&mut profile, &record(FeedbackAction::Ignored), &config);
        assert!((profile.acceptance_rate - acceptance_before).abs() < f64::EPSILON);
        assert!(profile.modification_frequency > 0.3);
        assert!(profile.skip_rate > 0.1);
    }

    #[test]
    fn test_rating_nudges_category_confidence() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        let mut rated = record(FeedbackAction::Accepted);
        rated.feedback.rating = Some(5);
        apply_feedback(&mut profile, &rated, &config);
        // (5 - 3) / 5 * 0.1 = 0.04 above the 0.5 default
        assert!((profile.workout_confidence - 0.54).abs() < 1e-12);

        let mut poor = record(FeedbackAction::Rejected);
        poor.feedback.rating = Some(1);
        apply_feedback(&mut profile, &poor, &config);
        assert!(profile.workout_confidence < 0.54);
    }

    #[test]
    fn test_latency_nudges_confidence_both_ways() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        let mut fast = record(FeedbackAction::Accepted);
        fast.feedback.response_seconds = Some(2.0);
        apply_feedback(&mut profile, &fast, &config);
        assert!((profile.workout_confidence - 0.51).abs() < 1e-12);

        let mut slow = record(FeedbackAction::Accepted);
        slow.feedback.response_seconds = Some(45.0);
        apply_feedback(&mut profile, &slow, &config);
        assert!((profile.workout_confidence - 0.50).abs() < 1e-12);
    }

    #[test]
    fn test_twenty_accepts_converge_toward_one() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        let initial = profile.acceptance_rate;
        let mut previous = initial;
        for _ in 0..20 {
            apply_feedback(&mut profile, &record(FeedbackAction::Accepted), &config);
            assert!(profile.acceptance_rate > previous);
            previous = profile.acceptance_rate;
        }
        assert!(profile.acceptance_rate > initial);
        assert!(profile.acceptance_rate > 0.85);
        assert!(profile.acceptance_rate <= 1.0);
    }

    #[test]
    fn test_reanalysis_raises_rate_on_divergence_within_bounds() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        profile.acceptance_rate = 0.2;
        let recent: Vec<_> = (0..20).map(|_| record(FeedbackAction::Accepted)).collect();
        for _ in 0..40 {
            reanalyze_patterns(&mut profile, &recent, &config);
        }
        assert!((profile.learning_rate - config.max_learning_rate).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reanalysis_decays_rate_when_stable_within_bounds() {
        let config = LearningConfig::default();
        let mut profile = PreferenceProfile::new("u1");
        profile.acceptance_rate = 1.0;
        let recent: Vec<_> = (0..20).map(|_| record(FeedbackAction::Accepted)).collect();
        for _ in 0..200 {
            reanalyze_patterns(&mut profile, &recent, &config);
        }
        assert!((profile.learning_rate - config.min_learning_rate).abs() < f64::EPSILON);
    }
}
