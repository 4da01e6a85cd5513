// ABOUTME: Workout instantiation: set-level tweak recommendations for strength sessions
// ABOUTME: Wires analyzer, suggestion source, personalization, safety, and confidence scoring
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Workout recommendation engine.
//!
//! Control flow per request: context analysis → suggestion source →
//! personalization → safety enforcement → confidence scoring. The engine
//! never raises to its caller; any internal failure degrades to a
//! low-confidence fallback recommendation.

use chrono::Utc;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::confidence::ConfidenceScorer;
use crate::engine::context::{ContextAnalyzer, ContextFactors};
use crate::engine::feedback::FeedbackLearner;
use crate::engine::insights::ProfileSummary;
use crate::engine::personalization::PersonalizationAdjuster;
use crate::engine::profile::PreferenceProfile;
use crate::engine::safety::SafetyConstraintEnforcer;
use crate::engine::suggestion::{EventType, RawSuggestion, SuggestionRules, SuggestionSource};
use crate::errors::AppResult;
use crate::llm::LlmProvider;
use crate::models::{
    AdjustmentAction, Context, Feedback, InteractionRecord, ProfileCategory, Recommendation,
    RiskLevel, SuggestionValue,
};
use crate::store::{ProfileStore, UserLockRegistry};

/// Planned parameters for the exercise a request refers to
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExerciseSetPlan {
    /// Exercise name, e.g. "Back Squat"
    pub exercise_name: String,
    /// Planned number of sets
    #[serde(default)]
    pub planned_sets: Option<u32>,
    /// Planned reps: a scalar, or one value per set
    #[serde(default)]
    pub planned_reps: Option<SuggestionValue>,
    /// Planned working weight
    #[serde(default)]
    pub planned_weight: Option<f64>,
    /// Planned rest between sets in seconds
    #[serde(default)]
    pub planned_rest_seconds: Option<f64>,
    /// One-based index of the set in progress
    #[serde(default = "default_current_set")]
    pub current_set: u32,
}

fn default_current_set() -> u32 {
    1
}

impl ExerciseSetPlan {
    /// The planned value an action adjusts, used as the recommendation's
    /// original value
    #[must_use]
    pub fn value_for(&self, action: AdjustmentAction) -> Option<SuggestionValue> {
        match action {
            AdjustmentAction::RepReduction | AdjustmentAction::RepIncrease => {
                self.planned_reps.clone()
            }
            AdjustmentAction::WeightIncrease => self.planned_weight.map(SuggestionValue::Scalar),
            AdjustmentAction::RestReduction | AdjustmentAction::RestIncrease => {
                self.planned_rest_seconds.map(SuggestionValue::Scalar)
            }
            AdjustmentAction::VolumeReduction | AdjustmentAction::VolumeIncrease => {
                self.planned_sets.map(|s| SuggestionValue::Scalar(f64::from(s)))
            }
            _ => None,
        }
    }
}

/// Workout-domain rules: decision table, prompt, and action vocabulary
pub struct WorkoutRules<'a> {
    plan: &'a ExerciseSetPlan,
}

impl<'a> WorkoutRules<'a> {
    /// Rules over one request's plan
    #[must_use]
    pub const fn new(plan: &'a ExerciseSetPlan) -> Self {
        Self { plan }
    }

    fn struggle_suggestion(&self, context: &Context) -> RawSuggestion {
        let Some(planned_reps) = &self.plan.planned_reps else {
            return RawSuggestion::maintain(
                "No planned reps to adjust; holding the program steady.",
                0.6,
            );
        };
        let reduced = planned_reps.map(|r| (r * 0.9).floor().max(1.0));
        let energy = context
            .energy
            .map_or_else(|| "unknown".to_owned(), |e| format!("{e:.0}"));
        RawSuggestion {
            action: AdjustmentAction::RepReduction,
            suggested_value: Some(reduced),
            reasoning: format!(
                "Reduced reps by 10% to accommodate current difficulty level. User energy: {energy}/10"
            ),
            factors: vec![
                "user_struggling".into(),
                "energy_level".into(),
                "safety_first".into(),
            ],
            expected_outcome: "Maintain form while completing the set".into(),
            risk: RiskLevel::Low,
            confidence: 0.8,
        }
    }

    fn progression_suggestion(&self) -> Option<RawSuggestion> {
        let weight = self.plan.planned_weight.filter(|w| *w > 0.0)?;
        Some(RawSuggestion {
            action: AdjustmentAction::WeightIncrease,
            suggested_value: Some(SuggestionValue::Scalar(weight * 1.025)),
            reasoning:
                "Set completed successfully with high progression preference. Small weight increase recommended."
                    .into(),
            factors: vec![
                "successful_completion".into(),
                "progression_preference".into(),
                "user_profile".into(),
            ],
            expected_outcome: "Progressive overload for continued strength gains".into(),
            risk: RiskLevel::Low,
            confidence: 0.7,
        })
    }

    fn time_pressure_suggestion(
        &self,
        profile: &PreferenceProfile,
        available: f64,
    ) -> Option<RawSuggestion> {
        let sets = self.plan.planned_sets.filter(|s| *s > 1)?;
        Some(RawSuggestion {
            action: AdjustmentAction::VolumeReduction,
            suggested_value: Some(SuggestionValue::Scalar(f64::from(sets - 1))),
            reasoning: format!(
                "Reduced sets due to time constraints. {available:.0} min available vs {:.0} min preferred.",
                profile.time_budget_minutes
            ),
            factors: vec!["time_constraint".into(), "user_preferences".into()],
            expected_outcome: "Complete workout within available time".into(),
            risk: RiskLevel::Low,
            confidence: 0.9,
        })
    }

    fn skip_suggestion(&self) -> RawSuggestion {
        RawSuggestion {
            action: AdjustmentAction::ExerciseSubstitution,
            suggested_value: None,
            reasoning: format!(
                "Skip request for {} noted. Substitute a comparable movement targeting the same muscle group.",
                self.plan.exercise_name
            ),
            factors: vec!["user_skip".into(), "exercise_variety".into()],
            expected_outcome: "Keep the session balanced despite the skipped exercise".into(),
            risk: RiskLevel::VeryLow,
            confidence: 0.6,
        }
    }
}

impl SuggestionRules for WorkoutRules<'_> {
    fn domain(&self) -> &'static str {
        "workout"
    }

    fn system_prompt(&self) -> String {
        "You are an AI fitness coach providing personalized workout adjustments.".into()
    }

    fn build_prompt(
        &self,
        profile: &PreferenceProfile,
        context: &Context,
        event: EventType,
    ) -> String {
        let mut prompt = String::new();

        let _ = writeln!(prompt, "User Profile:");
        let _ = writeln!(prompt, "- Experience Level: {}", profile.experience_level());
        let _ = writeln!(
            prompt,
            "- Preferred Intensity: {:.1}/1.0",
            profile.preferred_intensity
        );
        let _ = writeln!(prompt, "- Volume Tolerance: {:.1}/1.0", profile.volume_tolerance);
        let _ = writeln!(prompt, "- Form Focus: {:.1}/1.0", profile.form_focus);
        let _ = writeln!(
            prompt,
            "- Progression Rate: {:.1}/1.0",
            profile.progression_rate
        );
        let _ = writeln!(
            prompt,
            "- Acceptance Rate: {:.1}/1.0",
            profile.acceptance_rate
        );
        let _ = writeln!(prompt, "- Total Interactions: {}", profile.total_interactions);

        let _ = writeln!(prompt, "\nCurrent Context:");
        let _ = writeln!(prompt, "- Time: {:?}", context.time_of_day);
        if let Some(energy) = context.energy {
            let _ = writeln!(prompt, "- User Energy: {energy:.0}/10");
        }
        if let Some(motivation) = context.motivation {
            let _ = writeln!(prompt, "- User Motivation: {motivation:.0}/10");
        }
        if let Some(minutes) = context.available_minutes {
            let _ = writeln!(prompt, "- Available Time: {minutes:.0} minutes");
        }
        if let Some(crowding) = context.crowding {
            let _ = writeln!(prompt, "- Gym Crowding: {crowding:?}");
        }

        let _ = writeln!(prompt, "\nCurrent Exercise:");
        let _ = writeln!(prompt, "- Exercise: {}", self.plan.exercise_name);
        if let Some(sets) = self.plan.planned_sets {
            let _ = writeln!(prompt, "- Planned Sets: {sets}");
        }
        if let Some(reps) = &self.plan.planned_reps {
            let _ = writeln!(prompt, "- Planned Reps: {reps:?}");
        }
        if let Some(weight) = self.plan.planned_weight {
            let _ = writeln!(prompt, "- Planned Weight: {weight}");
        }
        let _ = writeln!(prompt, "- Set Number: {}", self.plan.current_set);

        let _ = writeln!(prompt, "\nEvent Type: {}", event.as_str());
        let guidance = match event {
            EventType::StruggleSet => {
                "User is struggling with the current set. Consider reducing intensity."
            }
            EventType::CompleteSet => {
                "User completed the set successfully. Consider progression or maintaining."
            }
            EventType::SkipExercise => {
                "User wants to skip this exercise. Suggest alternatives or modifications."
            }
            EventType::General => "Provide a context-appropriate adjustment.",
        };
        let _ = writeln!(prompt, "{guidance}");

        let config = EngineConfig::global();
        let _ = writeln!(prompt, "\nSafety Rules:");
        let _ = writeln!(
            prompt,
            "- Never reduce reps below {:.0}% of planned",
            config.safety.min_rep_fraction * 100.0
        );
        let _ = writeln!(
            prompt,
            "- Weight increases must not exceed {:.0}% per session",
            config.safety.max_weight_increase_fraction * 100.0
        );
        let _ = writeln!(
            prompt,
            "- Minimum rest time is {:.0} seconds",
            config.safety.min_rest_seconds
        );

        let _ = writeln!(
            prompt,
            "\nRespond with a single JSON object with this exact structure:"
        );
        let _ = writeln!(
            prompt,
            r#"{{"type": "adjustment_type", "suggested_value": 0, "reasoning": "detailed_explanation", "factors": ["factor1"], "expected_outcome": "expected_result", "risk_assessment": "risk_level", "confidence_score": 0.85}}"#
        );
        prompt
    }

    fn action_from_tag(&self, tag: &str) -> Option<AdjustmentAction> {
        match tag {
            "rep_reduction" => Some(AdjustmentAction::RepReduction),
            "rep_increase" => Some(AdjustmentAction::RepIncrease),
            "weight_increase" => Some(AdjustmentAction::WeightIncrease),
            "rest_reduction" => Some(AdjustmentAction::RestReduction),
            "rest_increase" => Some(AdjustmentAction::RestIncrease),
            "volume_reduction" => Some(AdjustmentAction::VolumeReduction),
            "volume_increase" => Some(AdjustmentAction::VolumeIncrease),
            "intensity_increase" => Some(AdjustmentAction::IntensityIncrease),
            "exercise_substitution" => Some(AdjustmentAction::ExerciseSubstitution),
            "maintain_program" | "maintain" => Some(AdjustmentAction::MaintainProgram),
            _ => None,
        }
    }

    fn decide(
        &self,
        profile: &PreferenceProfile,
        context: &Context,
        _factors: &ContextFactors,
        event: EventType,
    ) -> RawSuggestion {
        match event {
            EventType::StruggleSet => self.struggle_suggestion(context),
            EventType::SkipExercise => self.skip_suggestion(),
            EventType::CompleteSet | EventType::General => {
                if event == EventType::CompleteSet && profile.progression_rate > 0.7 {
                    if let Some(suggestion) = self.progression_suggestion() {
                        return suggestion;
                    }
                }
                if let Some(available) = context.available_minutes {
                    if available < profile.time_budget_minutes * 0.8 {
                        if let Some(suggestion) =
                            self.time_pressure_suggestion(profile, available)
                        {
                            return suggestion;
                        }
                    }
                }
                RawSuggestion::maintain(
                    "Maintaining current program parameters based on user profile and context.",
                    0.6,
                )
            }
        }
    }
}

/// Workout recommendation engine façade
pub struct WorkoutEngine {
    store: Arc<dyn ProfileStore>,
    source: SuggestionSource,
    learner: FeedbackLearner,
}

impl WorkoutEngine {
    /// Create an engine over `store`. Passing a model provider selects the
    /// model-backed suggestion source for the process lifetime; `None`
    /// selects the rule-based source.
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>, model: Option<Arc<dyn LlmProvider>>) -> Self {
        let locks = Arc::new(UserLockRegistry::new());
        let source = SuggestionSource::select(model);
        debug!(model_backed = source.is_model_backed(), "Workout engine initialized");
        Self {
            learner: FeedbackLearner::new(store.clone(), locks),
            store,
            source,
        }
    }

    /// Generate a safety-checked recommendation. Never raises: any internal
    /// failure returns the documented fallback recommendation instead.
    pub async fn generate(
        &self,
        user_id: &str,
        plan: &ExerciseSetPlan,
        context: &Context,
        event: EventType,
    ) -> Recommendation {
        match self.generate_inner(user_id, plan, context, event).await {
            Ok(recommendation) => recommendation,
            Err(e) => {
                warn!(user_id, "Recommendation pipeline failed: {e}");
                Self::fallback_recommendation(plan)
            }
        }
    }

    async fn generate_inner(
        &self,
        user_id: &str,
        plan: &ExerciseSetPlan,
        context: &Context,
        event: EventType,
    ) -> AppResult<Recommendation> {
        let config = EngineConfig::global();
        let profile = self.store.get(user_id).await;
        let factors = ContextAnalyzer::analyze(context, &profile, &config.context);

        let rules = WorkoutRules::new(plan);
        let raw = self
            .source
            .generate(&rules, &profile, context, &factors, event)
            .await;

        let original_value = plan.value_for(raw.action);
        let adjusted = PersonalizationAdjuster::adjust(
            raw,
            original_value.as_ref(),
            &profile,
            &factors,
            &config.personalization,
        );

        let (safe, fired) = SafetyConstraintEnforcer::enforce(adjusted, plan, &config.safety);
        if !fired.is_empty() {
            debug!(user_id, constraints = ?fired, "Safety constraints clamped the suggestion");
        }

        let confidence = ConfidenceScorer::score(
            safe.confidence,
            safe.action,
            &profile,
            &factors,
            &config.confidence,
            &config.context,
        );

        Ok(Recommendation {
            id: Uuid::new_v4(),
            action: safe.action,
            original_value: plan.value_for(safe.action),
            suggested_value: safe.suggested_value,
            confidence,
            reasoning: safe.reasoning,
            factors: safe.factors,
            expected_outcome: safe.expected_outcome,
            risk: safe.risk,
            alternatives: Vec::new(),
            generated_at: Utc::now(),
        })
    }

    /// The documented degradation path: conservative, low-confidence, and
    /// explicitly labeled as a fallback.
    fn fallback_recommendation(plan: &ExerciseSetPlan) -> Recommendation {
        Recommendation {
            id: Uuid::new_v4(),
            action: AdjustmentAction::MaintainProgram,
            original_value: plan.planned_reps.clone(),
            suggested_value: plan.planned_reps.clone(),
            confidence: 0.3,
            reasoning: "Using fallback recommendation; maintaining the current program.".into(),
            factors: vec!["fallback".into()],
            expected_outcome: "Maintain current program".into(),
            risk: RiskLevel::VeryLow,
            alternatives: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Record feedback for a previously issued recommendation
    pub async fn feedback(&self, user_id: &str, recommendation_id: Uuid, feedback: Feedback) {
        let record = InteractionRecord {
            recommendation_id,
            category: ProfileCategory::Workout,
            feedback,
            recorded_at: Utc::now(),
        };
        self.learner.record(user_id, record).await;
    }

    /// Read-only profile summary with derived trend statistics
    pub async fn insights(&self, user_id: &str) -> ProfileSummary {
        let profile = self.store.get(user_id).await;
        let history = self.learner.history(user_id);
        ProfileSummary::build(profile, &history, &EngineConfig::global().learning)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn plan() -> ExerciseSetPlan {
        ExerciseSetPlan {
            exercise_name: "Bench Press".into(),
            planned_sets: Some(3),
            planned_reps: Some(SuggestionValue::Scalar(10.0)),
            planned_weight: Some(100.0),
            planned_rest_seconds: Some(90.0),
            current_set: 1,
        }
    }

    #[test]
    fn test_struggle_set_reduces_reps_ten_percent() {
        let plan = plan();
        let rules = WorkoutRules::new(&plan);
        let suggestion = rules.decide(
            &PreferenceProfile::new("u1"),
            &Context::default(),
            &ContextFactors::default(),
            EventType::StruggleSet,
        );
        assert_eq!(suggestion.action, AdjustmentAction::RepReduction);
        assert_eq!(suggestion.suggested_value, Some(SuggestionValue::Scalar(9.0)));
        assert!((suggestion.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_complete_set_with_high_progression_increases_weight() {
        let plan = plan();
        let rules = WorkoutRules::new(&plan);
        let mut profile = PreferenceProfile::new("u1");
        profile.progression_rate = 0.8;
        let suggestion = rules.decide(
            &profile,
            &Context::default(),
            &ContextFactors::default(),
            EventType::CompleteSet,
        );
        assert_eq!(suggestion.action, AdjustmentAction::WeightIncrease);
        assert_eq!(
            suggestion.suggested_value,
            Some(SuggestionValue::Scalar(102.5))
        );
    }

    #[test]
    fn test_complete_set_with_low_progression_maintains() {
        let plan = plan();
        let rules = WorkoutRules::new(&plan);
        let suggestion = rules.decide(
            &PreferenceProfile::new("u1"), // progression_rate 0.5
            &Context::default(),
            &ContextFactors::default(),
            EventType::CompleteSet,
        );
        assert_eq!(suggestion.action, AdjustmentAction::MaintainProgram);
    }

    #[test]
    fn test_time_pressure_drops_a_set() {
        let plan = plan();
        let rules = WorkoutRules::new(&plan);
        let context = Context {
            available_minutes: Some(40.0), // budget 60, ratio < 0.8
            ..Context::default()
        };
        let suggestion = rules.decide(
            &PreferenceProfile::new("u1"),
            &context,
            &ContextFactors::default(),
            EventType::General,
        );
        assert_eq!(suggestion.action, AdjustmentAction::VolumeReduction);
        assert_eq!(suggestion.suggested_value, Some(SuggestionValue::Scalar(2.0)));
        assert!((suggestion.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_struggle_with_rep_series_reduces_element_wise() {
        let mut plan = plan();
        plan.planned_reps = Some(SuggestionValue::Series(vec![10.0, 8.0, 6.0]));
        let rules = WorkoutRules::new(&plan);
        let suggestion = rules.decide(
            &PreferenceProfile::new("u1"),
            &Context::default(),
            &ContextFactors::default(),
            EventType::StruggleSet,
        );
        assert_eq!(
            suggestion.suggested_value,
            Some(SuggestionValue::Series(vec![9.0, 7.0, 5.0]))
        );
    }

    #[test]
    fn test_value_for_maps_actions_to_plan_fields() {
        let plan = plan();
        assert_eq!(
            plan.value_for(AdjustmentAction::WeightIncrease),
            Some(SuggestionValue::Scalar(100.0))
        );
        assert_eq!(
            plan.value_for(AdjustmentAction::VolumeReduction),
            Some(SuggestionValue::Scalar(3.0))
        );
        assert_eq!(plan.value_for(AdjustmentAction::MaintainProgram), None);
    }

    #[tokio::test]
    async fn test_generate_is_infallible_for_unknown_user() {
        let store = Arc::new(crate::store::InMemoryProfileStore::new());
        let engine = WorkoutEngine::new(store, None);
        let recommendation = engine
            .generate("first-timer", &plan(), &Context::default(), EventType::General)
            .await;
        assert!((0.0..=1.0).contains(&recommendation.confidence));
        assert_eq!(recommendation.action, AdjustmentAction::MaintainProgram);
    }
}
