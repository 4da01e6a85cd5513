// ABOUTME: Confidence scoring combining profile maturity, acceptance history, and context clarity
// ABOUTME: Pure function of its inputs, always clipped to [0,1]
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Confidence scoring.
//!
//! `score = base × (0.5 + 0.5·acceptance) × (0.7 + 0.3·clarity) × maturity`,
//! clipped to `[0, 1]`. Profiles past the maturity threshold earn a bounded
//! multiplicative boost, and conservative actions get a further fixed boost
//! before re-clipping. All constants come from [`ConfidenceConfig`].

use crate::config::{ConfidenceConfig, ContextConfig};
use crate::engine::context::ContextFactors;
use crate::engine::profile::{clamp01, PreferenceProfile};
use crate::models::AdjustmentAction;

/// Stateless confidence scorer
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Score a recommendation. Pure: identical inputs yield identical scores.
    #[must_use]
    pub fn score(
        base_confidence: f64,
        action: AdjustmentAction,
        profile: &PreferenceProfile,
        factors: &ContextFactors,
        config: &ConfidenceConfig,
        context_config: &ContextConfig,
    ) -> f64 {
        let acceptance_term =
            config.acceptance_floor + config.acceptance_weight * profile.acceptance_rate;
        let clarity_term =
            config.clarity_floor + config.clarity_weight * factors.clarity(context_config);

        let maturity_boost = if profile.total_interactions > config.maturity_min_interactions {
            1.0 + (profile.total_interactions as f64 / config.maturity_divisor)
                .min(config.maturity_cap)
        } else {
            1.0
        };

        let mut score =
            clamp01(base_confidence) * acceptance_term * clarity_term * maturity_boost;

        if action.is_conservative() {
            score *= config.conservative_boost;
        }

        clamp01(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> (ConfidenceConfig, ContextConfig) {
        (ConfidenceConfig::default(), ContextConfig::default())
    }

    #[test]
    fn test_score_matches_formula_for_fresh_profile() {
        let (config, context_config) = defaults();
        let profile = PreferenceProfile::new("u1");
        let factors = ContextFactors::default();
        let score = ConfidenceScorer::score(
            0.8,
            AdjustmentAction::RepReduction,
            &profile,
            &factors,
            &config,
            &context_config,
        );
        // 0.8 * (0.5 + 0.5*0.5) * (0.7 + 0.3*1.0) * 1.0 = 0.6
        assert!((score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_conservative_actions_get_boost() {
        let (config, context_config) = defaults();
        let profile = PreferenceProfile::new("u1");
        let factors = ContextFactors::default();
        let plain = ConfidenceScorer::score(
            0.6,
            AdjustmentAction::WeightIncrease,
            &profile,
            &factors,
            &config,
            &context_config,
        );
        let conservative = ConfidenceScorer::score(
            0.6,
            AdjustmentAction::MaintainProgram,
            &profile,
            &factors,
            &config,
            &context_config,
        );
        assert!((conservative - plain * 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_maturity_boost_applies_after_threshold() {
        let (config, context_config) = defaults();
        let mut profile = PreferenceProfile::new("u1");
        let factors = ContextFactors::default();
        let young = ConfidenceScorer::score(
            0.7,
            AdjustmentAction::RepReduction,
            &profile,
            &factors,
            &config,
            &context_config,
        );
        profile.total_interactions = 50;
        let mature = ConfidenceScorer::score(
            0.7,
            AdjustmentAction::RepReduction,
            &profile,
            &factors,
            &config,
            &context_config,
        );
        // 50 interactions -> boost 1 + min(0.2, 0.5) = 1.2
        assert!((mature - young * 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_score_always_in_unit_interval() {
        let (config, context_config) = defaults();
        let mut profile = PreferenceProfile::new("u1");
        profile.acceptance_rate = 1.0;
        profile.total_interactions = 10_000;
        let factors = ContextFactors::default();
        for base in [-1.0, 0.0, 0.5, 1.0, 7.3] {
            let score = ConfidenceScorer::score(
                base,
                AdjustmentAction::MaintainProgram,
                &profile,
                &factors,
                &config,
                &context_config,
            );
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
    }
}
