// ABOUTME: Nutrition instantiation: daily macro/hydration recommendations with health-aware safety
// ABOUTME: Recovery-adjusted goals, deficit-driven suggestions, and the independent safety monitor
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Nutrition recommendation engine.
//!
//! Shares the workout instantiation's pipeline (context analysis →
//! suggestion source → personalization → safety → confidence) with two
//! additions of its own:
//!
//! - the [`NutritionSafetyMonitor`], an absolute-threshold check over raw
//!   daily intake that runs independently of any recommendation and is not
//!   mediated by the preference profile;
//! - [`HealthProfile`]-aware constraint enforcement (protein/sodium caps per
//!   medical condition, medication interaction lists) applied to every
//!   recommendation before it is returned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, NutritionSafetyConfig};
use crate::engine::confidence::ConfidenceScorer;
use crate::engine::context::{ContextAnalyzer, ContextFactors};
use crate::engine::feedback::FeedbackLearner;
use crate::engine::insights::ProfileSummary;
use crate::engine::personalization::PersonalizationAdjuster;
use crate::engine::profile::{clamp01, PreferenceProfile};
use crate::engine::suggestion::{EventType, RawSuggestion, SuggestionRules, SuggestionSource};
use crate::errors::AppResult;
use crate::llm::LlmProvider;
use crate::models::{
    AdjustmentAction, Context, Feedback, InteractionRecord, ProfileCategory, Recommendation,
    RiskLevel, SuggestionValue,
};
use crate::store::{ProfileStore, UserLockRegistry};

/// A medication the user takes, with the nutrients it interacts with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    /// Medication name
    pub name: String,
    /// Nutrient tokens this medication interacts with ("protein", "sodium")
    #[serde(default)]
    pub nutrition_interactions: Vec<String>,
}

/// Health profile gating what may be recommended to this user.
///
/// Unlike the preference profile this is declared, not learned: medical
/// conditions, allergies, and medications come from the user's records and
/// the engine only ever reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthProfile {
    /// Named medical conditions ("hypertension", "asthma")
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    /// Food allergies
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Current medications with their interaction lists
    #[serde(default)]
    pub medications: Vec<Medication>,
    /// Diagnosed diabetes
    #[serde(default)]
    pub diabetes: bool,
    /// Diagnosed heart condition
    #[serde(default)]
    pub heart_condition: bool,
    /// Diagnosed kidney issues
    #[serde(default)]
    pub kidney_issues: bool,
    /// Body weight in kilograms, used for per-kg bounds
    pub body_weight_kg: f64,
}

impl HealthProfile {
    /// Minimal profile with no conditions
    #[must_use]
    pub fn new(body_weight_kg: f64) -> Self {
        Self {
            medical_conditions: Vec::new(),
            allergies: Vec::new(),
            medications: Vec::new(),
            diabetes: false,
            heart_condition: false,
            kidney_issues: false,
            body_weight_kg,
        }
    }

    fn has_hypertension(&self) -> bool {
        self.medical_conditions
            .iter()
            .any(|c| c.eq_ignore_ascii_case("hypertension"))
    }

    /// Condition-specific protein ceiling in g/kg, if one applies.
    /// Kidney issues impose the tighter limit and win over diabetes.
    #[must_use]
    pub fn protein_limit_g_per_kg(&self, config: &NutritionSafetyConfig) -> Option<f64> {
        if self.kidney_issues {
            Some(config.kidney_protein_limit_g_per_kg)
        } else if self.diabetes {
            Some(config.diabetes_protein_limit_g_per_kg)
        } else {
            None
        }
    }

    /// Daily sodium limit in mg for this user
    #[must_use]
    pub fn sodium_limit_mg(&self, config: &NutritionSafetyConfig) -> f64 {
        if self.heart_condition || self.has_hypertension() {
            config.cardiac_sodium_limit_mg
        } else {
            config.general_sodium_limit_mg
        }
    }
}

/// Recovery composite consumed as nutrition context.
///
/// The score itself is external (HRV, sleep, stress rolled up by a wearable
/// platform); this engine only thresholds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryMetrics {
    /// Heart rate variability score
    #[serde(default)]
    pub hrv_score: Option<f64>,
    /// Resting heart rate in bpm
    #[serde(default)]
    pub resting_heart_rate: Option<f64>,
    /// Sleep quality on a 0-10 scale
    #[serde(default)]
    pub sleep_quality: Option<f64>,
    /// Last night's sleep duration in hours
    #[serde(default)]
    pub sleep_duration_hours: Option<f64>,
    /// Stress level on a 0-10 scale
    #[serde(default)]
    pub stress_level: Option<f64>,
    /// Hydration status on a 0-100 scale
    #[serde(default)]
    pub hydration_status: Option<f64>,
    /// Composite recovery score on a 0-100 scale
    pub recovery_score: f64,
}

impl RecoveryMetrics {
    /// Metrics carrying only a composite score
    #[must_use]
    pub fn from_score(recovery_score: f64) -> Self {
        Self {
            hrv_score: None,
            resting_heart_rate: None,
            sleep_quality: None,
            sleep_duration_hours: None,
            stress_level: None,
            hydration_status: None,
            recovery_score,
        }
    }

    /// Whether today's goals should get a general recovery boost
    #[must_use]
    pub fn needs_recovery_boost(&self, config: &NutritionSafetyConfig) -> bool {
        self.recovery_score < config.recovery_boost_threshold
    }

    /// Whether protein should be boosted for muscle recovery
    #[must_use]
    pub fn needs_protein_boost(&self, config: &NutritionSafetyConfig) -> bool {
        self.recovery_score < config.protein_boost_threshold
            || self
                .sleep_quality
                .is_some_and(|q| q < config.low_sleep_quality)
    }

    /// Whether hydration should be boosted
    #[must_use]
    pub fn needs_hydration_boost(&self, config: &NutritionSafetyConfig) -> bool {
        self.hydration_status
            .is_some_and(|h| h < config.low_hydration_status)
            || self.recovery_score < config.hydration_boost_threshold
    }
}

/// Running totals of what the user has consumed today
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyIntake {
    /// Calories consumed
    #[serde(default)]
    pub calories: f64,
    /// Protein in grams
    #[serde(default)]
    pub protein_g: f64,
    /// Carbohydrates in grams
    #[serde(default)]
    pub carbs_g: f64,
    /// Fat in grams
    #[serde(default)]
    pub fat_g: f64,
    /// Sugar in grams
    #[serde(default)]
    pub sugar_g: f64,
    /// Sodium in milligrams
    #[serde(default)]
    pub sodium_mg: f64,
    /// Fluid intake in liters
    #[serde(default)]
    pub hydration_liters: f64,
}

/// Daily nutrition targets before recovery adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionGoals {
    /// Calorie target
    pub calories: f64,
    /// Protein target in grams
    pub protein_g: f64,
    /// Carbohydrate target in grams
    pub carbs_g: f64,
    /// Hydration target in liters
    #[serde(default = "default_hydration_goal")]
    pub hydration_liters: f64,
}

fn default_hydration_goal() -> f64 {
    2.5
}

/// Goals after recovery adjustment, with the adjustments spelled out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustedGoals {
    /// The adjusted targets
    pub goals: NutritionGoals,
    /// Human-readable description of each adjustment applied
    pub adjustments_made: Vec<String>,
    /// The recovery score the adjustments were derived from
    pub recovery_score: f64,
}

/// Scale today's goals by recovery state.
///
/// Low recovery raises calories and protein within capped fractions, poor
/// hydration adds half a liter to the target, and short sleep raises carbs
/// proportionally to the hours missed. Pure function of its inputs.
#[must_use]
pub fn recovery_adjusted_goals(
    base: &NutritionGoals,
    recovery: &RecoveryMetrics,
    config: &NutritionSafetyConfig,
) -> AdjustedGoals {
    let mut goals = base.clone();
    let mut adjustments_made = Vec::new();

    if recovery.needs_recovery_boost(config) {
        let boost = ((config.recovery_boost_threshold - recovery.recovery_score) / 100.0).min(0.1);
        goals.calories *= 1.0 + boost;
        adjustments_made.push(format!(
            "Increased calories by {:.1}% for recovery",
            boost * 100.0
        ));
    }

    if recovery.needs_protein_boost(config) {
        let boost = ((config.protein_boost_threshold - recovery.recovery_score) / 100.0)
            .clamp(0.0, 0.2);
        goals.protein_g *= 1.0 + boost;
        adjustments_made.push(format!(
            "Increased protein by {:.1}% for muscle recovery",
            boost * 100.0
        ));
    }

    if recovery.needs_hydration_boost(config) {
        goals.hydration_liters = base.hydration_liters + 0.5;
        adjustments_made.push("Added 0.5L hydration for recovery".to_owned());
    }

    if let Some(sleep) = recovery.sleep_duration_hours {
        if sleep < 7.0 {
            let boost = (7.0 - sleep) * 0.05;
            goals.carbs_g *= 1.0 + boost;
            adjustments_made.push(format!(
                "Increased carbs by {:.1}% due to insufficient sleep",
                boost * 100.0
            ));
        }
    }

    AdjustedGoals {
        goals,
        adjustments_made,
        recovery_score: recovery.recovery_score,
    }
}

/// Category of a safety alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAlertKind {
    /// Calorie intake dangerously below the per-kg minimum
    ExcessiveDeficit,
    /// Calorie intake above the per-kg maximum
    ExcessiveSurplus,
    /// Protein intake below the per-kg minimum
    ProteinDeficiency,
    /// Protein intake above the applicable per-kg maximum
    ExcessiveProtein,
    /// Sodium intake above the applicable daily limit
    ExcessiveSodium,
    /// Fat below the minimum share of calories
    InsufficientFat,
    /// Sugar above the maximum share of calories
    ExcessiveSugar,
}

/// How urgent a safety alert is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Worth flagging, no immediate action needed
    Warning,
    /// Requires user action
    Critical,
}

/// An alert emitted by the safety monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyAlert {
    /// What was violated
    pub kind: SafetyAlertKind,
    /// Alert severity
    pub severity: AlertSeverity,
    /// Human-readable description with the observed and limit values
    pub message: String,
    /// Whether the user must act on this alert
    pub action_required: bool,
}

/// Independent absolute-threshold check over raw daily intake.
///
/// Not mediated by the preference profile and not gated on a recommendation
/// being requested: the monitor runs against whatever the user actually ate.
pub struct NutritionSafetyMonitor;

impl NutritionSafetyMonitor {
    /// Check `intake` against every applicable threshold. Pure.
    #[must_use]
    pub fn check_daily_intake(
        intake: &DailyIntake,
        health: &HealthProfile,
        config: &NutritionSafetyConfig,
    ) -> Vec<SafetyAlert> {
        let mut alerts = Vec::new();

        if health.body_weight_kg > 0.0 {
            let calories_per_kg = intake.calories / health.body_weight_kg;
            if calories_per_kg < config.min_calories_per_kg {
                alerts.push(SafetyAlert {
                    kind: SafetyAlertKind::ExcessiveDeficit,
                    severity: AlertSeverity::Critical,
                    message: format!(
                        "Dangerously low calorie intake: {calories_per_kg:.1} cal/kg (min: {:.0})",
                        config.min_calories_per_kg
                    ),
                    action_required: true,
                });
            } else if calories_per_kg > config.max_calories_per_kg {
                alerts.push(SafetyAlert {
                    kind: SafetyAlertKind::ExcessiveSurplus,
                    severity: AlertSeverity::Warning,
                    message: format!("Very high calorie intake: {calories_per_kg:.1} cal/kg"),
                    action_required: false,
                });
            }

            let protein_per_kg = intake.protein_g / health.body_weight_kg;
            let max_protein = health
                .protein_limit_g_per_kg(config)
                .unwrap_or(config.max_protein_per_kg);
            if protein_per_kg < config.min_protein_per_kg {
                alerts.push(SafetyAlert {
                    kind: SafetyAlertKind::ProteinDeficiency,
                    severity: AlertSeverity::Warning,
                    message: format!(
                        "Low protein intake: {protein_per_kg:.1}g/kg (min: {:.1})",
                        config.min_protein_per_kg
                    ),
                    action_required: true,
                });
            } else if protein_per_kg > max_protein {
                alerts.push(SafetyAlert {
                    kind: SafetyAlertKind::ExcessiveProtein,
                    severity: if health.kidney_issues {
                        AlertSeverity::Critical
                    } else {
                        AlertSeverity::Warning
                    },
                    message: format!(
                        "High protein intake: {protein_per_kg:.1}g/kg (max: {max_protein:.1})"
                    ),
                    action_required: health.kidney_issues,
                });
            }
        }

        let sodium_limit = health
            .sodium_limit_mg(config)
            .min(config.absolute_max_sodium_mg);
        if intake.sodium_mg > sodium_limit {
            alerts.push(SafetyAlert {
                kind: SafetyAlertKind::ExcessiveSodium,
                severity: if health.heart_condition {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                },
                message: format!(
                    "High sodium intake: {:.0}mg (limit: {sodium_limit:.0}mg)",
                    intake.sodium_mg
                ),
                action_required: health.heart_condition,
            });
        }

        if intake.calories > 0.0 {
            let fat_percent = intake.fat_g * 9.0 / intake.calories * 100.0;
            if fat_percent < config.min_fat_percent {
                alerts.push(SafetyAlert {
                    kind: SafetyAlertKind::InsufficientFat,
                    severity: AlertSeverity::Warning,
                    message: format!(
                        "Fat is only {fat_percent:.0}% of calories (min: {:.0}%)",
                        config.min_fat_percent
                    ),
                    action_required: false,
                });
            }

            let sugar_percent = intake.sugar_g * 4.0 / intake.calories * 100.0;
            if sugar_percent > config.max_sugar_percent {
                alerts.push(SafetyAlert {
                    kind: SafetyAlertKind::ExcessiveSugar,
                    severity: if health.diabetes {
                        AlertSeverity::Critical
                    } else {
                        AlertSeverity::Warning
                    },
                    message: format!(
                        "Sugar is {sugar_percent:.0}% of calories (max: {:.0}%)",
                        config.max_sugar_percent
                    ),
                    action_required: health.diabetes,
                });
            }
        }

        alerts
    }
}

/// Why a hydration slot was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationReason {
    /// Steady distribution of the remaining target
    Maintenance,
    /// Front-loaded intake because recovery is poor
    RecoveryBoost,
    /// Follow-up to a recovery boost slot
    RecoverySupport,
    /// Extra intake ahead of common workout hours
    PreWorkout,
}

/// Priority of a hydration slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPriority {
    /// Optional
    Low,
    /// Recommended
    Medium,
    /// Important for recovery
    High,
}

/// One scheduled drink in the hydration plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydrationSlot {
    /// Hour of day (0-23) the slot is scheduled for
    pub hour: u32,
    /// Amount to drink in liters
    pub liters: f64,
    /// Why this slot exists
    pub reason: HydrationReason,
    /// Slot priority
    pub priority: SlotPriority,
}

/// Distribute the remaining hydration target over the rest of the day.
///
/// Slots stop at the configured cutoff hour. Poor recovery front-loads the
/// remainder into two larger slots; otherwise the remainder spreads evenly,
/// with common workout hours (16:00-18:00) weighted up. `current_hour` is a
/// parameter rather than read from the wall clock so the schedule is a pure
/// function; callers pass `Utc::now().hour()` or the user's local hour.
#[must_use]
pub fn hydration_schedule(
    current_hour: u32,
    current_liters: f64,
    target_liters: f64,
    recovery: &RecoveryMetrics,
    config: &NutritionSafetyConfig,
) -> Vec<HydrationSlot> {
    let remaining = target_liters - current_liters;
    if remaining <= 0.0 {
        return vec![HydrationSlot {
            hour: current_hour,
            liters: 0.25,
            reason: HydrationReason::Maintenance,
            priority: SlotPriority::Low,
        }];
    }

    let hours_remaining = config.hydration_cutoff_hour.saturating_sub(current_hour).max(1);

    if recovery.needs_hydration_boost(config) {
        return vec![
            HydrationSlot {
                hour: current_hour,
                liters: (remaining * 0.3).min(0.5),
                reason: HydrationReason::RecoveryBoost,
                priority: SlotPriority::High,
            },
            HydrationSlot {
                hour: (current_hour + 1).min(23),
                liters: (remaining * 0.25).min(0.4),
                reason: HydrationReason::RecoverySupport,
                priority: SlotPriority::Medium,
            },
        ];
    }

    let base_hourly = remaining / f64::from(hours_remaining);
    let mut slots = Vec::new();
    for offset in 0..hours_remaining.min(4) {
        let hour = current_hour + offset;
        if hour > config.hydration_cutoff_hour {
            break;
        }
        let (liters, reason, priority) = if (16..=18).contains(&hour) {
            (base_hourly * 1.2, HydrationReason::PreWorkout, SlotPriority::High)
        } else {
            (base_hourly, HydrationReason::Maintenance, SlotPriority::Medium)
        };
        slots.push(HydrationSlot {
            hour,
            liters: (liters * 100.0).round() / 100.0,
            reason,
            priority,
        });
    }
    slots
}

/// Hydration plan for the rest of the day against the recovery-adjusted
/// target
#[must_use]
pub fn hydration_plan(current_hour: u32, day: &NutritionDay) -> Vec<HydrationSlot> {
    let config = &EngineConfig::global().nutrition;
    let adjusted = recovery_adjusted_goals(&day.goals, &day.recovery, config);
    hydration_schedule(
        current_hour,
        day.intake.hydration_liters,
        adjusted.goals.hydration_liters,
        &day.recovery,
        config,
    )
}

/// The nutrition state a request is evaluated against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionDay {
    /// What the user has consumed so far today
    pub intake: DailyIntake,
    /// Today's base targets
    pub goals: NutritionGoals,
    /// The user's health profile
    pub health: HealthProfile,
    /// Today's recovery metrics
    pub recovery: RecoveryMetrics,
}

impl NutritionDay {
    /// The current intake value an action adjusts, used as the
    /// recommendation's original value
    #[must_use]
    pub fn value_for(&self, action: AdjustmentAction) -> Option<SuggestionValue> {
        match action {
            AdjustmentAction::IncreaseProtein => Some(SuggestionValue::Scalar(self.intake.protein_g)),
            AdjustmentAction::IncreaseHydration => {
                Some(SuggestionValue::Scalar(self.intake.hydration_liters))
            }
            AdjustmentAction::ReduceSugar => Some(SuggestionValue::Scalar(self.intake.sugar_g)),
            AdjustmentAction::ReduceSodium => Some(SuggestionValue::Scalar(self.intake.sodium_mg)),
            _ => None,
        }
    }
}

/// Deficit-driven suggestions against the (recovery-adjusted) goals,
/// highest priority first.
///
/// The ordering doubles as the decision table for [`NutritionRules`]: a
/// diabetes sugar warning outranks a protein deficit, which outranks
/// hydration, which outranks a general recovery focus.
#[must_use]
pub fn deficit_suggestions(
    day: &NutritionDay,
    adjusted: &NutritionGoals,
    config: &NutritionSafetyConfig,
) -> Vec<RawSuggestion> {
    let mut suggestions = Vec::new();

    if day.health.diabetes && day.intake.sugar_g > config.diabetes_sugar_warning_g {
        suggestions.push(RawSuggestion {
            action: AdjustmentAction::ReduceSugar,
            suggested_value: Some(SuggestionValue::Scalar(30.0)),
            reasoning: format!(
                "Sugar intake is high today ({:.0}g). Consider reducing added sugars for the rest of the day.",
                day.intake.sugar_g
            ),
            factors: vec!["diabetes".into(), "high_sugar_intake".into()],
            expected_outcome: "Keep blood sugar within a manageable range".into(),
            risk: RiskLevel::Low,
            confidence: 0.95,
        });
    }

    let protein_deficit = adjusted.protein_g - day.intake.protein_g;
    if protein_deficit > config.protein_deficit_trigger_g {
        let within_limit = day
            .health
            .protein_limit_g_per_kg(config)
            .is_none_or(|limit| protein_deficit <= limit * day.health.body_weight_kg);
        if within_limit {
            let mut confidence = 0.85;
            if day
                .recovery
                .sleep_quality
                .is_some_and(|q| q < config.low_sleep_quality)
            {
                confidence += 0.1;
            }
            suggestions.push(RawSuggestion {
                action: AdjustmentAction::IncreaseProtein,
                suggested_value: Some(SuggestionValue::Scalar(protein_deficit)),
                reasoning: format!(
                    "You need {protein_deficit:.0}g more protein today. Consider lean meats, fish, or protein shakes."
                ),
                factors: vec!["protein_deficit".into(), "recovery_score".into()],
                expected_outcome: "Support muscle recovery and daily protein target".into(),
                risk: RiskLevel::Low,
                confidence: clamp01(confidence),
            });
        }
    }

    let hydration_deficit = adjusted.hydration_liters - day.intake.hydration_liters;
    if hydration_deficit > 0.0 {
        suggestions.push(RawSuggestion {
            action: AdjustmentAction::IncreaseHydration,
            suggested_value: Some(SuggestionValue::Scalar(hydration_deficit)),
            reasoning: format!(
                "Drink {hydration_deficit:.1}L more water today. Spread it throughout the day."
            ),
            factors: vec!["hydration_deficit".into(), "recovery_score".into()],
            expected_outcome: "Reach today's hydration target".into(),
            risk: RiskLevel::VeryLow,
            confidence: 0.9,
        });
    }

    if day.recovery.needs_recovery_boost(config) {
        let reasoning = if day
            .recovery
            .sleep_quality
            .is_some_and(|q| q < config.low_sleep_quality)
        {
            "Poor sleep detected. Consider magnesium-rich foods and avoid caffeine after 2 PM."
        } else if day.recovery.stress_level.is_some_and(|s| s > 7.0) {
            "High stress levels. Focus on omega-3 rich foods and complex carbohydrates."
        } else {
            "Low recovery score. Increase anti-inflammatory foods and ensure adequate protein."
        };
        suggestions.push(RawSuggestion {
            action: AdjustmentAction::RecoveryFocus,
            suggested_value: None,
            reasoning: reasoning.to_owned(),
            factors: vec!["low_recovery_score".into()],
            expected_outcome: "Improved recovery over the next day".into(),
            risk: RiskLevel::VeryLow,
            confidence: 0.75,
        });
    }

    suggestions
}

/// Clamp or replace a suggestion that conflicts with the health profile.
///
/// Mirrors the workout safety enforcer's contract: tighten-only, any change
/// lowers the risk tier and appends a note, and the fired constraint names
/// are returned. Runs after personalization so nothing upstream can loosen
/// the result.
#[must_use]
pub fn enforce_health_constraints(
    suggestion: RawSuggestion,
    day: &NutritionDay,
    config: &NutritionSafetyConfig,
) -> (RawSuggestion, Vec<&'static str>) {
    let mut safe = suggestion;
    let mut fired = Vec::new();

    for medication in &day.health.medications {
        let tag = safe.action.as_str();
        if medication
            .nutrition_interactions
            .iter()
            .any(|nutrient| tag.contains(nutrient.as_str()))
        {
            safe = RawSuggestion::maintain(
                format!(
                    "Holding nutrition targets steady due to a potential interaction with {}.",
                    medication.name
                ),
                0.5,
            );
            fired.push("medication_interaction");
            break;
        }
    }

    if safe.action == AdjustmentAction::IncreaseProtein {
        if let Some(limit) = day.health.protein_limit_g_per_kg(config) {
            let allowed = limit * day.health.body_weight_kg - day.intake.protein_g;
            let suggested = safe
                .suggested_value
                .as_ref()
                .and_then(SuggestionValue::as_scalar)
                .unwrap_or(0.0);
            if allowed <= 0.0 {
                safe = RawSuggestion::maintain(
                    "Protein is already at the safe limit for your medical profile.",
                    0.6,
                );
                fired.push("protein_limit_constraint");
            } else if suggested > allowed {
                safe.suggested_value = Some(SuggestionValue::Scalar(allowed));
                fired.push("protein_limit_constraint");
            }
        }
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

/// Nutrition-domain rules: decision table, prompt, and action vocabulary
pub struct NutritionRules<'a> {
    day: &'a NutritionDay,
    adjusted: &'a NutritionGoals,
}

impl<'a> NutritionRules<'a> {
    /// Rules over one request's day and its adjusted goals
    #[must_use]
    pub const fn new(day: &'a NutritionDay, adjusted: &'a NutritionGoals) -> Self {
        Self { day, adjusted }
    }
}

impl SuggestionRules for NutritionRules<'_> {
    fn domain(&self) -> &'static str {
        "nutrition"
    }

    fn system_prompt(&self) -> String {
        "You are an AI nutrition coach providing personalized daily adjustments.".into()
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
            "- Acceptance Rate: {:.1}/1.0",
            profile.acceptance_rate
        );
        let _ = writeln!(prompt, "- Total Interactions: {}", profile.total_interactions);

        let _ = writeln!(prompt, "\nToday's Intake vs Goals:");
        let _ = writeln!(
            prompt,
            "- Calories: {:.0} of {:.0}",
            self.day.intake.calories, self.adjusted.calories
        );
        let _ = writeln!(
            prompt,
            "- Protein: {:.0}g of {:.0}g",
            self.day.intake.protein_g, self.adjusted.protein_g
        );
        let _ = writeln!(
            prompt,
            "- Carbs: {:.0}g of {:.0}g",
            self.day.intake.carbs_g, self.adjusted.carbs_g
        );
        let _ = writeln!(
            prompt,
            "- Hydration: {:.1}L of {:.1}L",
            self.day.intake.hydration_liters, self.adjusted.hydration_liters
        );
        let _ = writeln!(
            prompt,
            "- Recovery Score: {:.0}/100",
            self.day.recovery.recovery_score
        );

        let _ = writeln!(prompt, "\nCurrent Context:");
        let _ = writeln!(prompt, "- Time: {:?}", context.time_of_day);
        if let Some(stress) = context.stress_level {
            let _ = writeln!(prompt, "- Stress Level: {stress:.0}/10");
        }
        if let Some(sleep) = context.sleep_quality {
            let _ = writeln!(prompt, "- Sleep Quality: {sleep:.0}/10");
        }

        let _ = writeln!(prompt, "\nEvent Type: {}", event.as_str());

        let config = EngineConfig::global();
        let _ = writeln!(prompt, "\nSafety Rules:");
        let _ = writeln!(
            prompt,
            "- Daily sodium must stay under {:.0}mg for this user",
            self.day.health.sodium_limit_mg(&config.nutrition)
        );
        if let Some(limit) = self.day.health.protein_limit_g_per_kg(&config.nutrition) {
            let _ = writeln!(
                prompt,
                "- Protein must stay under {limit:.1}g per kg body weight"
            );
        }
        if self.day.health.diabetes {
            let _ = writeln!(prompt, "- User has diabetes: never suggest added sugar");
        }

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
            "increase_protein" => Some(AdjustmentAction::IncreaseProtein),
            "increase_hydration" => Some(AdjustmentAction::IncreaseHydration),
            "reduce_sugar" => Some(AdjustmentAction::ReduceSugar),
            "reduce_sodium" => Some(AdjustmentAction::ReduceSodium),
            "recovery_focus" => Some(AdjustmentAction::RecoveryFocus),
            "maintain_program" | "maintain" => Some(AdjustmentAction::MaintainProgram),
            _ => None,
        }
    }

    fn decide(
        &self,
        _profile: &PreferenceProfile,
        _context: &Context,
        _factors: &ContextFactors,
        _event: EventType,
    ) -> RawSuggestion {
        let config = &EngineConfig::global().nutrition;
        deficit_suggestions(self.day, self.adjusted, config)
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                RawSuggestion::maintain(
                    "Intake is tracking well against today's goals; no adjustment needed.",
                    0.6,
                )
            })
    }
}

/// Full daily envelope: every safe recommendation plus goals and alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyNutritionReport {
    /// Safety-checked recommendations, highest priority first
    pub recommendations: Vec<Recommendation>,
    /// Recovery-adjusted goals
    pub adjusted_goals: NutritionGoals,
    /// Human-readable goal adjustments applied
    pub adjustments_made: Vec<String>,
    /// Alerts from the independent safety monitor
    pub safety_alerts: Vec<SafetyAlert>,
    /// Recovery score the report was built against
    pub recovery_score: f64,
}

/// Nutrition recommendation engine façade
pub struct NutritionEngine {
    store: Arc<dyn ProfileStore>,
    source: SuggestionSource,
    learner: FeedbackLearner,
}

impl NutritionEngine {
    /// Create an engine over `store`. Passing a model provider selects the
    /// model-backed suggestion source for the process lifetime; `None`
    /// selects the rule-based source.
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>, model: Option<Arc<dyn LlmProvider>>) -> Self {
        let locks = Arc::new(UserLockRegistry::new());
        let source = SuggestionSource::select(model);
        debug!(model_backed = source.is_model_backed(), "Nutrition engine initialized");
        Self {
            learner: FeedbackLearner::new(store.clone(), locks),
            store,
            source,
        }
    }

    /// Generate the single highest-priority safety-checked recommendation.
    /// Never raises: any internal failure returns the documented fallback.
    pub async fn generate(
        &self,
        user_id: &str,
        day: &NutritionDay,
        context: &Context,
        event: EventType,
    ) -> Recommendation {
        match self.generate_inner(user_id, day, context, event).await {
            Ok(recommendation) => recommendation,
            Err(e) => {
                warn!(user_id, "Nutrition pipeline failed: {e}");
                Self::fallback_recommendation()
            }
        }
    }

    async fn generate_inner(
        &self,
        user_id: &str,
        day: &NutritionDay,
        context: &Context,
        event: EventType,
    ) -> AppResult<Recommendation> {
        let config = EngineConfig::global();
        let profile = self.store.get(user_id).await;
        let factors = ContextAnalyzer::analyze(context, &profile, &config.context);

        let adjusted = recovery_adjusted_goals(&day.goals, &day.recovery, &config.nutrition);
        let rules = NutritionRules::new(day, &adjusted.goals);
        let raw = self
            .source
            .generate(&rules, &profile, context, &factors, event)
            .await;

        let original_value = day.value_for(raw.action);
        let adjusted_suggestion = PersonalizationAdjuster::adjust(
            raw,
            original_value.as_ref(),
            &profile,
            &factors,
            &config.personalization,
        );

        let (safe, fired) =
            enforce_health_constraints(adjusted_suggestion, day, &config.nutrition);
        if !fired.is_empty() {
            debug!(user_id, constraints = ?fired, "Health constraints clamped the suggestion");
        }

        Ok(Self::finish(safe, day, &profile, &factors))
    }

    fn finish(
        safe: RawSuggestion,
        day: &NutritionDay,
        profile: &PreferenceProfile,
        factors: &ContextFactors,
    ) -> Recommendation {
        let config = EngineConfig::global();
        let confidence = ConfidenceScorer::score(
            safe.confidence,
            safe.action,
            profile,
            factors,
            &config.confidence,
            &config.context,
        );

        Recommendation {
            id: Uuid::new_v4(),
            action: safe.action,
            original_value: day.value_for(safe.action),
            suggested_value: safe.suggested_value,
            confidence,
            reasoning: safe.reasoning,
            factors: safe.factors,
            expected_outcome: safe.expected_outcome,
            risk: safe.risk,
            alternatives: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// The documented degradation path: conservative, low-confidence, and
    /// explicitly labeled as a fallback.
    fn fallback_recommendation() -> Recommendation {
        Recommendation {
            id: Uuid::new_v4(),
            action: AdjustmentAction::MaintainProgram,
            original_value: None,
            suggested_value: None,
            confidence: 0.3,
            reasoning: "Using fallback recommendation; maintaining current nutrition targets."
                .into(),
            factors: vec!["fallback".into()],
            expected_outcome: "Maintain current nutrition targets".into(),
            risk: RiskLevel::VeryLow,
            alternatives: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Build the full daily envelope: every deficit-driven recommendation
    /// that survives the health constraints, the adjusted goals, and the
    /// safety monitor's alerts. The monitor runs regardless of whether any
    /// recommendation was produced.
    pub async fn daily_report(&self, user_id: &str, day: &NutritionDay, context: &Context) -> DailyNutritionReport {
        let config = EngineConfig::global();
        let profile = self.store.get(user_id).await;
        let factors = ContextAnalyzer::analyze(context, &profile, &config.context);

        let adjusted = recovery_adjusted_goals(&day.goals, &day.recovery, &config.nutrition);
        let safety_alerts =
            NutritionSafetyMonitor::check_daily_intake(&day.intake, &day.health, &config.nutrition);

        let mut recommendations = Vec::new();
        for suggestion in deficit_suggestions(day, &adjusted.goals, &config.nutrition) {
            let original_value = day.value_for(suggestion.action);
            let personalized = PersonalizationAdjuster::adjust(
                suggestion,
                original_value.as_ref(),
                &profile,
                &factors,
                &config.personalization,
            );
            let (safe, fired) = enforce_health_constraints(personalized, day, &config.nutrition);
            if fired.contains(&"medication_interaction") {
                // Filtered entirely: a maintain placeholder adds nothing to
                // the daily envelope.
                warn!(user_id, "Dropped recommendation due to medication interaction");
                continue;
            }
            recommendations.push(Self::finish(safe, day, &profile, &factors));
        }

        DailyNutritionReport {
            recommendations,
            adjusted_goals: adjusted.goals,
            adjustments_made: adjusted.adjustments_made,
            safety_alerts,
            recovery_score: adjusted.recovery_score,
        }
    }

    /// Record feedback for a previously issued recommendation
    pub async fn feedback(&self, user_id: &str, recommendation_id: Uuid, feedback: Feedback) {
        let record = InteractionRecord {
            recommendation_id,
            category: ProfileCategory::Nutrition,
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
