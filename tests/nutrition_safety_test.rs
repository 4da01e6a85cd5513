// ABOUTME: End-to-end tests for the nutrition engine and its independent safety monitor
// ABOUTME: Absolute intake thresholds, health-profile constraints, and the daily report envelope
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::Arc;

use adaptive_coach::api::{CoachApi, NutritionRequest};
use adaptive_coach::config::EngineConfig;
use adaptive_coach::engine::nutrition::{
    hydration_schedule, AlertSeverity, DailyIntake, HealthProfile, NutritionDay, NutritionGoals,
    NutritionSafetyMonitor, RecoveryMetrics, SafetyAlertKind,
};
use adaptive_coach::engine::{EventType, NutritionEngine};
use adaptive_coach::errors::AppError;
use adaptive_coach::llm::{ChatRequest, ChatResponse, LlmProvider};
use adaptive_coach::models::{AdjustmentAction, Context, SuggestionValue};
use adaptive_coach::store::InMemoryProfileStore;
use async_trait::async_trait;

struct GarbageModel;

#[async_trait]
impl LlmProvider for GarbageModel {
    fn name(&self) -> &'static str {
        "garbage"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        Ok(ChatResponse {
            content: "garbage no json".into(),
            model: "test-model".into(),
            usage: None,
            finish_reason: Some("stop".into()),
        })
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

fn day() -> NutritionDay {
    NutritionDay {
        intake: DailyIntake {
            calories: 1800.0,
            protein_g: 90.0,
            carbs_g: 200.0,
            fat_g: 60.0,
            sugar_g: 40.0,
            sodium_mg: 1800.0,
            hydration_liters: 1.5,
        },
        goals: NutritionGoals {
            calories: 2400.0,
            protein_g: 140.0,
            carbs_g: 250.0,
            hydration_liters: 2.5,
        },
        health: HealthProfile::new(80.0),
        recovery: RecoveryMetrics::from_score(75.0),
    }
}

#[test]
fn test_sodium_over_cardiac_limit_is_critical_and_actionable() {
    let config = &EngineConfig::global().nutrition;
    let mut intake = day().intake;
    intake.sodium_mg = 5000.0;
    let mut health = HealthProfile::new(80.0);
    health.heart_condition = true;

    let alerts = NutritionSafetyMonitor::check_daily_intake(&intake, &health, config);
    let sodium = alerts
        .iter()
        .find(|a| a.kind == SafetyAlertKind::ExcessiveSodium)
        .expect("sodium alert");
    assert_eq!(sodium.severity, AlertSeverity::Critical);
    assert!(sodium.action_required);
}

#[test]
fn test_monitor_runs_on_raw_intake_without_any_recommendation() {
    // The monitor sees only what was eaten; no engine, no profile, no
    // recommendation request involved.
    let config = &EngineConfig::global().nutrition;
    let intake = DailyIntake {
        calories: 900.0,
        protein_g: 30.0,
        fat_g: 20.0,
        ..DailyIntake::default()
    };
    let health = HealthProfile::new(80.0);

    let alerts = NutritionSafetyMonitor::check_daily_intake(&intake, &health, config);
    assert!(alerts
        .iter()
        .any(|a| a.kind == SafetyAlertKind::ExcessiveDeficit));
    assert!(alerts
        .iter()
        .any(|a| a.kind == SafetyAlertKind::ProteinDeficiency));
}

#[tokio::test]
async fn test_generate_prefers_protein_deficit() {
    let engine = NutritionEngine::new(Arc::new(InMemoryProfileStore::new()), None);
    let recommendation = engine
        .generate("u1", &day(), &Context::default(), EventType::General)
        .await;
    assert_eq!(recommendation.action, AdjustmentAction::IncreaseProtein);
    // 50g deficit against the unadjusted goals (recovery is fine).
    assert_eq!(
        recommendation.suggested_value,
        Some(SuggestionValue::Scalar(50.0))
    );
}

#[tokio::test]
async fn test_diabetic_sugar_warning_outranks_deficits() {
    let engine = NutritionEngine::new(Arc::new(InMemoryProfileStore::new()), None);
    let mut day = day();
    day.health.diabetes = true;
    day.intake.sugar_g = 70.0;
    let recommendation = engine
        .generate("u1", &day, &Context::default(), EventType::General)
        .await;
    assert_eq!(recommendation.action, AdjustmentAction::ReduceSugar);
}

#[tokio::test]
async fn test_kidney_limit_caps_protein_through_full_pipeline() {
    let engine = NutritionEngine::new(Arc::new(InMemoryProfileStore::new()), None);
    let mut day = day();
    day.health.kidney_issues = true; // 1.2 g/kg * 80 kg = 96 g total
    let recommendation = engine
        .generate("u1", &day, &Context::default(), EventType::General)
        .await;

    assert_eq!(recommendation.action, AdjustmentAction::IncreaseProtein);
    let suggested = recommendation
        .suggested_value
        .as_ref()
        .and_then(SuggestionValue::as_scalar)
        .unwrap();
    // Already at 90g: no more than 6g may be added.
    assert!(suggested <= 6.0 + f64::EPSILON);
    assert!(recommendation.reasoning.contains("Safety constraints applied"));
}

#[tokio::test]
async fn test_garbage_model_output_still_yields_recommendation() {
    let engine = NutritionEngine::new(
        Arc::new(InMemoryProfileStore::new()),
        Some(Arc::new(GarbageModel)),
    );
    let recommendation = engine
        .generate("u1", &day(), &Context::default(), EventType::General)
        .await;
    // The rule table answered; nothing escaped as an error.
    assert_eq!(recommendation.action, AdjustmentAction::IncreaseProtein);
    assert!((0.0..=1.0).contains(&recommendation.confidence));
}

#[tokio::test]
async fn test_daily_report_carries_the_full_envelope() {
    let engine = NutritionEngine::new(Arc::new(InMemoryProfileStore::new()), None);
    let mut day = day();
    day.recovery = RecoveryMetrics {
        sleep_duration_hours: Some(6.0),
        hydration_status: Some(60.0),
        ..RecoveryMetrics::from_score(45.0)
    };
    day.intake.sodium_mg = 4500.0;

    let report = engine.daily_report("u1", &day, &Context::default()).await;

    // Recovery-adjusted goals moved up from the base.
    assert!(report.adjusted_goals.calories > day.goals.calories);
    assert!(report.adjusted_goals.hydration_liters > day.goals.hydration_liters);
    assert!(!report.adjustments_made.is_empty());
    assert!((report.recovery_score - 45.0).abs() < f64::EPSILON);

    // The monitor fired on sodium independently of the recommendations.
    assert!(report
        .safety_alerts
        .iter()
        .any(|a| a.kind == SafetyAlertKind::ExcessiveSodium));

    // Deficit recommendations are present and bounded.
    assert!(!report.recommendations.is_empty());
    for recommendation in &report.recommendations {
        assert!((0.0..=1.0).contains(&recommendation.confidence));
    }
}

#[test]
fn test_hydration_schedule_is_deterministic() {
    let config = &EngineConfig::global().nutrition;
    let recovery = RecoveryMetrics::from_score(80.0);
    let first = hydration_schedule(9, 0.5, 2.5, &recovery, config);
    let second = hydration_schedule(9, 0.5, 2.5, &recovery, config);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.hour, b.hour);
        assert!((a.liters - b.liters).abs() < f64::EPSILON);
        assert_eq!(a.reason, b.reason);
    }
}

#[tokio::test]
async fn test_api_rejects_nonpositive_body_weight() {
    let api = CoachApi::new(Arc::new(InMemoryProfileStore::new()), None);
    let mut day = day();
    day.health.body_weight_kg = 0.0;
    let request = NutritionRequest {
        user_id: "u1".into(),
        day,
        context: Context::default(),
        event_type: EventType::General,
    };
    let err = api.nutrition_recommendation(&request).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
}
