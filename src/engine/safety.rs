// ABOUTME: Safety constraint enforcement clamping suggestions against hard domain limits
// ABOUTME: Single ordered pipeline of named rules; authoritative over every upstream stage
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Safety constraint enforcement.
//!
//! The enforcer's output is authoritative: no upstream component (model,
//! rule table, personalization) can override it. Each rule is named and
//! independently testable; any clamp lowers the risk tier to the minimum
//! and appends a human-readable note to the reasoning. This stage can only
//! tighten a suggestion, never loosen one.

use crate::config::SafetyConstraintSet;
use crate::engine::suggestion::RawSuggestion;
use crate::engine::workout::ExerciseSetPlan;
use crate::models::{AdjustmentAction, RiskLevel, SuggestionValue};

/// Stateless enforcer over the hard workout limits
pub struct SafetyConstraintEnforcer;

impl SafetyConstraintEnforcer {
    /// Clamp `suggestion` against the plan and the constraint set.
    ///
    /// Returns the (possibly rebuilt) suggestion and the list of constraint
    /// names that fired. The input is consumed; clamping produces a new
    /// value rather than editing in place so reasoning can record exactly
    /// what changed.
    #[must_use]
    pub fn enforce(
        suggestion: RawSuggestion,
        plan: &ExerciseSetPlan,
        constraints: &SafetyConstraintSet,
    ) -> (RawSuggestion, Vec<&'static str>) {
        let mut safe = suggestion;
        let mut fired = Vec::new();

        match safe.action {
            AdjustmentAction::RepReduction => {
                if let Some(name) = Self::clamp_rep_reduction(&mut safe, plan, constraints) {
                    fired.push(name);
                }
            }
            AdjustmentAction::WeightIncrease => {
                if let Some(name) = Self::clamp_weight_increase(&mut safe, plan, constraints) {
                    fired.push(name);
                }
            }
            AdjustmentAction::RestReduction => {
                if let Some(name) = Self::clamp_rest_reduction(&mut safe, constraints) {
                    fired.push(name);
                }
            }
            _ => {}
        }

        if !fired.is_empty() {
            safe.reasoning.push_str(&format!(
                " (Safety constraints applied: {})",
                fired.join(", ")
            ));
            safe.risk = RiskLevel::VeryLow;
        }

        (safe, fired)
    }

    /// Reps may never drop below `ceil(planned * min_rep_fraction)`,
    /// applied element-wise when reps are planned per set.
    fn clamp_rep_reduction(
        suggestion: &mut RawSuggestion,
        plan: &ExerciseSetPlan,
        constraints: &SafetyConstraintSet,
    ) -> Option<&'static str> {
        let planned = plan.planned_reps.as_ref()?;
        let suggested = suggestion.suggested_value.as_ref()?;

        let floor_of = |orig: f64| (orig * constraints.min_rep_fraction).ceil().max(1.0);

        let clamped = match (suggested, planned) {
            (SuggestionValue::Scalar(s), SuggestionValue::Scalar(o)) => {
                let floor = floor_of(*o);
                (*s < floor).then_some(SuggestionValue::Scalar(floor.max(*s)))
            }
            (SuggestionValue::Series(s), SuggestionValue::Series(o)) if s.len() == o.len() => {
                let floors: Vec<f64> = o.iter().copied().map(floor_of).collect();
                let any_below = s.iter().zip(&floors).any(|(sv, fl)| sv < fl);
                any_below.then(|| {
                    SuggestionValue::Series(
                        s.iter().zip(&floors).map(|(sv, fl)| sv.max(*fl)).collect(),
                    )
                })
            }
            _ => None,
        };

        clamped.map(|value| {
            suggestion.suggested_value = Some(value);
            "min_rep_constraint"
        })
    }

    /// Weight may never exceed `planned * (1 + max_weight_increase_fraction)`.
    fn clamp_weight_increase(
        suggestion: &mut RawSuggestion,
        plan: &ExerciseSetPlan,
        constraints: &SafetyConstraintSet,
    ) -> Option<&'static str> {
        let planned = plan.planned_weight.filter(|w| *w > 0.0)?;
        let suggested = suggestion.suggested_value.as_ref()?.as_scalar()?;

        let ceiling = planned * (1.0 + constraints.max_weight_increase_fraction);
        (suggested > ceiling).then(|| {
            suggestion.suggested_value = Some(SuggestionValue::Scalar(ceiling));
            "max_weight_constraint"
        })
    }

    /// Rest may never drop below the configured minimum.
    fn clamp_rest_reduction(
        suggestion: &mut RawSuggestion,
        constraints: &SafetyConstraintSet,
    ) -> Option<&'static str> {
        let suggested = suggestion.suggested_value.as_ref()?.as_scalar()?;
        (suggested < constraints.min_rest_seconds).then(|| {
            suggestion.suggested_value = Some(SuggestionValue::Scalar(constraints.min_rest_seconds));
            "min_rest_constraint"
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn constraints() -> SafetyConstraintSet {
        SafetyConstraintSet::default()
    }

    fn plan() -> ExerciseSetPlan {
        ExerciseSetPlan {
            exercise_name: "Back Squat".into(),
            planned_sets: Some(3),
            planned_reps: Some(SuggestionValue::Scalar(10.0)),
            planned_weight: Some(100.0),
            planned_rest_seconds: Some(90.0),
            current_set: 1,
        }
    }

    fn suggestion(action: AdjustmentAction, value: f64) -> RawSuggestion {
        RawSuggestion {
            action,
            suggested_value: Some(SuggestionValue::Scalar(value)),
            reasoning: "test".into(),
            factors: vec![],
            expected_outcome: "test".into(),
            risk: RiskLevel::Moderate,
            confidence: 0.7,
        }
    }

    #[test]
    fn test_rep_floor_clamps_aggressive_reduction() {
        let (safe, fired) = SafetyConstraintEnforcer::enforce(
            suggestion(AdjustmentAction::RepReduction, 5.0),
            &plan(),
            &constraints(),
        );
        // ceil(10 * 0.8) = 8
        assert_eq!(safe.suggested_value, Some(SuggestionValue::Scalar(8.0)));
        assert_eq!(fired, vec!["min_rep_constraint"]);
        assert_eq!(safe.risk, RiskLevel::VeryLow);
        assert!(safe.reasoning.contains("Safety constraints applied"));
    }

    #[test]
    fn test_rep_floor_leaves_safe_reduction_alone() {
        let (safe, fired) = SafetyConstraintEnforcer::enforce(
            suggestion(AdjustmentAction::RepReduction, 9.0),
            &plan(),
            &constraints(),
        );
        assert_eq!(safe.suggested_value, Some(SuggestionValue::Scalar(9.0)));
        assert!(fired.is_empty());
        assert_eq!(safe.risk, RiskLevel::Moderate);
    }

    #[test]
    fn test_rep_floor_applies_element_wise() {
        let mut plan = plan();
        plan.planned_reps = Some(SuggestionValue::Series(vec![10.0, 8.0, 6.0]));
        let mut aggressive = suggestion(AdjustmentAction::RepReduction, 0.0);
        aggressive.suggested_value = Some(SuggestionValue::Series(vec![5.0, 7.0, 3.0]));
        let (safe, fired) =
            SafetyConstraintEnforcer::enforce(aggressive, &plan, &constraints());
        // floors: ceil(8)=8, ceil(6.4)=7, ceil(4.8)=5
        assert_eq!(
            safe.suggested_value,
            Some(SuggestionValue::Series(vec![8.0, 7.0, 5.0]))
        );
        assert_eq!(fired, vec!["min_rep_constraint"]);
    }

    #[test]
    fn test_weight_ceiling_clamps_overshoot() {
        let (safe, fired) = SafetyConstraintEnforcer::enforce(
            suggestion(AdjustmentAction::WeightIncrease, 120.0),
            &plan(),
            &constraints(),
        );
        assert_eq!(safe.suggested_value, Some(SuggestionValue::Scalar(110.0)));
        assert_eq!(fired, vec!["max_weight_constraint"]);
    }

    #[test]
    fn test_weight_ceiling_allows_safe_increase() {
        let (safe, fired) = SafetyConstraintEnforcer::enforce(
            suggestion(AdjustmentAction::WeightIncrease, 102.5),
            &plan(),
            &constraints(),
        );
        assert_eq!(safe.suggested_value, Some(SuggestionValue::Scalar(102.5)));
        assert!(fired.is_empty());
    }

    #[test]
    fn test_rest_floor() {
        let (safe, fired) = SafetyConstraintEnforcer::enforce(
            suggestion(AdjustmentAction::RestReduction, 15.0),
            &plan(),
            &constraints(),
        );
        assert_eq!(safe.suggested_value, Some(SuggestionValue::Scalar(30.0)));
        assert_eq!(fired, vec!["min_rest_constraint"]);
    }

    #[test]
    fn test_non_numeric_actions_pass_through() {
        let maintain = RawSuggestion::maintain("steady", 0.6);
        let (safe, fired) =
            SafetyConstraintEnforcer::enforce(maintain, &plan(), &constraints());
        assert!(fired.is_empty());
        assert_eq!(safe.action, AdjustmentAction::MaintainProgram);
    }
}
