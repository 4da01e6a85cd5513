// ABOUTME: Personalization rules reshaping raw suggestions using learned preference weights
// ABOUTME: Fixed-order rule pipeline; later rules may tighten but never re-aggress a maintain
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Personalization.
//!
//! The adjuster reshapes a raw suggestion using the profile's preference
//! weights. Rules run in a fixed order and each may short-circuit the action
//! to a conservative `maintain_program`; once a rule has done that, no later
//! rule may turn the suggestion back into something more aggressive.
//!
//! 1. High form focus damps the suggested delta on load increases.
//! 2. Low volume tolerance overrides volume increases to maintain.
//! 3. Low energy or motivation overrides any increase to maintain.
//! 4. Low historical acceptance scales reported confidence down
//!    (the suggested value is untouched).

use crate::config::PersonalizationConfig;
use crate::engine::context::ContextFactors;
use crate::engine::profile::{clamp01, PreferenceProfile};
use crate::engine::suggestion::RawSuggestion;
use crate::models::{AdjustmentAction, RiskLevel, SuggestionValue};

/// Stateless personalization rule pipeline
pub struct PersonalizationAdjuster;

impl PersonalizationAdjuster {
    /// Apply the rule pipeline to `suggestion`.
    ///
    /// `original_value` is the planned value the suggestion adjusts; rule 1
    /// needs it to damp the delta rather than the absolute value.
    #[must_use]
    pub fn adjust(
        mut suggestion: RawSuggestion,
        original_value: Option<&SuggestionValue>,
        profile: &PreferenceProfile,
        factors: &ContextFactors,
        config: &PersonalizationConfig,
    ) -> RawSuggestion {
        // Rule 1: high form focus damps load increases.
        if profile.form_focus > config.form_focus_threshold && suggestion.action.increases_load() {
            suggestion.suggested_value = suggestion
                .suggested_value
                .map(|value| scale_delta(&value, original_value, config.conservative_scale));
            suggestion
                .reasoning
                .push_str(" (Adjusted for high form focus preference)");
        }

        // Rule 2: low volume tolerance turns volume increases into maintain.
        if profile.volume_tolerance < config.low_volume_tolerance
            && suggestion.action.increases_volume()
        {
            override_to_maintain(
                &mut suggestion,
                "Maintaining volume due to low volume tolerance preference",
            );
        }

        // Rule 3: low energy or motivation turns any increase into maintain.
        if (factors.energy_alignment < config.low_energy_threshold
            || factors.motivation_factor < config.low_motivation_threshold)
            && suggestion.action.increases_load()
        {
            override_to_maintain(
                &mut suggestion,
                "Conservative approach due to current energy/motivation levels",
            );
        }

        // Rule 4: low acceptance history scales confidence, not the value.
        if profile.acceptance_rate < config.low_acceptance_threshold {
            suggestion.confidence =
                clamp01(suggestion.confidence * config.low_acceptance_confidence_scale);
            suggestion
                .reasoning
                .push_str(" (Conservative due to preference history)");
        }

        suggestion
    }
}

/// Scale the delta between original and suggested value by `scale`,
/// producing a new suggested value. With no numeric original to diff
/// against, the scale applies to the value itself.
fn scale_delta(
    suggested: &SuggestionValue,
    original: Option<&SuggestionValue>,
    scale: f64,
) -> SuggestionValue {
    match (suggested, original) {
        (SuggestionValue::Scalar(new), Some(SuggestionValue::Scalar(old))) => {
            SuggestionValue::Scalar(old + (new - old) * scale)
        }
        (SuggestionValue::Series(new), Some(SuggestionValue::Series(old)))
            if new.len() == old.len() =>
        {
            SuggestionValue::Series(
                new.iter()
                    .zip(old)
                    .map(|(n, o)| o + (n - o) * scale)
                    .collect(),
            )
        }
        _ => suggested.map(|v| v * scale),
    }
}

fn override_to_maintain(suggestion: &mut RawSuggestion, reasoning: &str) {
    suggestion.action = AdjustmentAction::MaintainProgram;
    suggestion.suggested_value = None;
    suggestion.reasoning = reasoning.to_owned();
    suggestion.risk = RiskLevel::VeryLow;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdjustmentAction;

    fn config() -> PersonalizationConfig {
        PersonalizationConfig::default()
    }

    fn weight_increase(value: f64) -> RawSuggestion {
        RawSuggestion {
            action: AdjustmentAction::WeightIncrease,
            suggested_value: Some(SuggestionValue::Scalar(value)),
            reasoning: "Progression".into(),
            factors: vec!["successful_completion".into()],
            expected_outcome: "Strength gains".into(),
            risk: RiskLevel::Low,
            confidence: 0.7,
        }
    }

    #[test]
    fn test_rule1_scales_delta_not_value() {
        let mut profile = PreferenceProfile::new("u1");
        profile.form_focus = 0.9;
        let adjusted = PersonalizationAdjuster::adjust(
            weight_increase(102.5),
            Some(&SuggestionValue::Scalar(100.0)),
            &profile,
            &ContextFactors::default(),
            &config(),
        );
        // delta 2.5 scaled by 0.95 -> 2.375
        assert_eq!(
            adjusted.suggested_value,
            Some(SuggestionValue::Scalar(102.375))
        );
        assert!(adjusted.reasoning.contains("form focus"));
    }

    #[test]
    fn test_rule1_skipped_at_threshold() {
        let profile = PreferenceProfile::new("u1"); // form_focus default 0.8, not > 0.8
        let adjusted = PersonalizationAdjuster::adjust(
            weight_increase(102.5),
            Some(&SuggestionValue::Scalar(100.0)),
            &profile,
            &ContextFactors::default(),
            &config(),
        );
        assert_eq!(
            adjusted.suggested_value,
            Some(SuggestionValue::Scalar(102.5))
        );
    }

    #[test]
    fn test_rule2_low_volume_tolerance_overrides_to_maintain() {
        let mut profile = PreferenceProfile::new("u1");
        profile.volume_tolerance = 0.3;
        let suggestion = RawSuggestion {
            action: AdjustmentAction::VolumeIncrease,
            suggested_value: Some(SuggestionValue::Scalar(4.0)),
            reasoning: "Add a set".into(),
            factors: vec![],
            expected_outcome: "More volume".into(),
            risk: RiskLevel::Moderate,
            confidence: 0.6,
        };
        let adjusted = PersonalizationAdjuster::adjust(
            suggestion,
            None,
            &profile,
            &ContextFactors::default(),
            &config(),
        );
        assert_eq!(adjusted.action, AdjustmentAction::MaintainProgram);
        assert_eq!(adjusted.suggested_value, None);
        assert_eq!(adjusted.risk, RiskLevel::VeryLow);
    }

    #[test]
    fn test_rule3_low_energy_overrides_increase() {
        let profile = PreferenceProfile::new("u1");
        let factors = ContextFactors {
            energy_alignment: 0.3,
            ..ContextFactors::default()
        };
        let adjusted = PersonalizationAdjuster::adjust(
            weight_increase(102.5),
            Some(&SuggestionValue::Scalar(100.0)),
            &profile,
            &factors,
            &config(),
        );
        assert_eq!(adjusted.action, AdjustmentAction::MaintainProgram);
        assert!(adjusted.reasoning.contains("energy/motivation"));
    }

    #[test]
    fn test_rule3_leaves_reductions_alone() {
        let profile = PreferenceProfile::new("u1");
        let factors = ContextFactors {
            energy_alignment: 0.3,
            ..ContextFactors::default()
        };
        let suggestion = RawSuggestion {
            action: AdjustmentAction::RepReduction,
            suggested_value: Some(SuggestionValue::Scalar(9.0)),
            reasoning: "Struggling".into(),
            factors: vec![],
            expected_outcome: "Finish the set".into(),
            risk: RiskLevel::Low,
            confidence: 0.8,
        };
        let adjusted =
            PersonalizationAdjuster::adjust(suggestion, None, &profile, &factors, &config());
        assert_eq!(adjusted.action, AdjustmentAction::RepReduction);
    }

    #[test]
    fn test_rule4_scales_confidence_only() {
        let mut profile = PreferenceProfile::new("u1");
        profile.acceptance_rate = 0.2;
        let adjusted = PersonalizationAdjuster::adjust(
            weight_increase(102.5),
            Some(&SuggestionValue::Scalar(100.0)),
            &profile,
            &ContextFactors::default(),
            &config(),
        );
        assert!((adjusted.confidence - 0.7 * 0.8).abs() < 1e-12);
        assert_eq!(
            adjusted.suggested_value,
            Some(SuggestionValue::Scalar(102.5))
        );
        assert!(adjusted.reasoning.contains("preference history"));
    }

    #[test]
    fn test_maintain_is_never_reaggressed() {
        // Rules 2 and 3 both fire; the suggestion must stay maintain.
        let mut profile = PreferenceProfile::new("u1");
        profile.volume_tolerance = 0.1;
        let factors = ContextFactors {
            motivation_factor: 0.2,
            ..ContextFactors::default()
        };
        let suggestion = RawSuggestion {
            action: AdjustmentAction::RepIncrease,
            suggested_value: Some(SuggestionValue::Scalar(12.0)),
            reasoning: "Push".into(),
            factors: vec![],
            expected_outcome: "More reps".into(),
            risk: RiskLevel::Moderate,
            confidence: 0.9,
        };
        let adjusted =
            PersonalizationAdjuster::adjust(suggestion, None, &profile, &factors, &config());
        assert_eq!(adjusted.action, AdjustmentAction::MaintainProgram);
        assert_eq!(adjusted.suggested_value, None);
    }
}
