// ABOUTME: Transport-agnostic request/response envelopes and boundary validation
// ABOUTME: The only layer where a malformed request surfaces as an error to the caller
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Engine API
//!
//! Request and response envelopes for the three operations both domain
//! instantiations expose: `generate`, `feedback`, and `insights`. The HTTP
//! front door lives out of process; it deserializes into these types, calls
//! [`CoachApi`], and serializes whatever comes back.
//!
//! Validation happens here and only here. A structurally invalid payload
//! (missing or empty user id, out-of-range rating) is rejected before it
//! reaches the engine; everything past this boundary is infallible by
//! design — `generate` always returns a recommendation, `feedback` always
//! acknowledges, `insights` never mutates.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::insights::ProfileSummary;
use crate::engine::nutrition::{DailyNutritionReport, NutritionDay, NutritionEngine};
use crate::engine::suggestion::EventType;
use crate::engine::workout::{ExerciseSetPlan, WorkoutEngine};
use crate::errors::{AppError, AppResult};
use crate::llm::LlmProvider;
use crate::models::{Context, Feedback, Recommendation};
use crate::store::ProfileStore;

fn validate_user_id(user_id: &str) -> AppResult<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::missing_field("user_id"));
    }
    Ok(())
}

/// Request for a workout recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutRequest {
    /// User the recommendation is for
    pub user_id: String,
    /// Planned parameters of the exercise in progress
    pub plan: ExerciseSetPlan,
    /// Situational signals for this request
    #[serde(default)]
    pub context: Context,
    /// What triggered the request
    #[serde(default = "default_event")]
    pub event_type: EventType,
}

fn default_event() -> EventType {
    EventType::General
}

impl WorkoutRequest {
    /// Check structural validity.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the user id is missing or the plan
    /// names no exercise.
    pub fn validate(&self) -> AppResult<()> {
        validate_user_id(&self.user_id)?;
        if self.plan.exercise_name.trim().is_empty() {
            return Err(AppError::missing_field("plan.exercise_name"));
        }
        Ok(())
    }
}

/// Request for a nutrition recommendation or daily report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionRequest {
    /// User the recommendation is for
    pub user_id: String,
    /// Today's intake, goals, health profile, and recovery state
    pub day: NutritionDay,
    /// Situational signals for this request
    #[serde(default)]
    pub context: Context,
    /// What triggered the request
    #[serde(default = "default_event")]
    pub event_type: EventType,
}

impl NutritionRequest {
    /// Check structural validity.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the user id is missing or the body
    /// weight is not positive (the per-kg safety bounds need it).
    pub fn validate(&self) -> AppResult<()> {
        validate_user_id(&self.user_id)?;
        if self.day.health.body_weight_kg <= 0.0 {
            return Err(AppError::value_out_of_range(
                "day.health.body_weight_kg must be positive",
            ));
        }
        Ok(())
    }
}

/// Feedback submission for a previously issued recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// User submitting the feedback
    pub user_id: String,
    /// The recommendation the feedback refers to
    pub recommendation_id: Uuid,
    /// The feedback payload
    pub feedback: Feedback,
}

impl FeedbackRequest {
    /// Check structural validity.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the user id is missing or the rating
    /// is outside the 1-5 scale.
    pub fn validate(&self) -> AppResult<()> {
        validate_user_id(&self.user_id)?;
        if let Some(rating) = self.feedback.rating {
            if !(1..=5).contains(&rating) {
                return Err(AppError::value_out_of_range("feedback.rating must be 1-5"));
            }
        }
        Ok(())
    }
}

/// Acknowledgement returned for recorded feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAck {
    /// Always true once validation passed
    pub success: bool,
    /// The recommendation the feedback was recorded against
    pub recommendation_id: Uuid,
    /// Human-readable confirmation
    pub message: String,
}

impl FeedbackAck {
    fn recorded(recommendation_id: Uuid) -> Self {
        Self {
            success: true,
            recommendation_id,
            message: "Feedback recorded; future recommendations will reflect it.".into(),
        }
    }
}

/// Which domain engine a feedback or insights call addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Workout tweak engine
    Workout,
    /// Nutrition/hydration engine
    Nutrition,
}

/// The engine pair behind the external interface.
///
/// One instance per process; both engines share the profile store so a
/// user's learning crosses domains.
pub struct CoachApi {
    workout: WorkoutEngine,
    nutrition: NutritionEngine,
}

impl CoachApi {
    /// Build both engines over a shared store. The model provider (when
    /// given) backs both suggestion sources.
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>, model: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            workout: WorkoutEngine::new(store.clone(), model.clone()),
            nutrition: NutritionEngine::new(store, model),
        }
    }

    /// Generate a workout recommendation.
    ///
    /// # Errors
    ///
    /// Only validation errors surface; past validation the engine is
    /// infallible and degrades to its documented fallback internally.
    pub async fn workout_recommendation(
        &self,
        request: &WorkoutRequest,
    ) -> AppResult<Recommendation> {
        request.validate()?;
        Ok(self
            .workout
            .generate(
                &request.user_id,
                &request.plan,
                &request.context,
                request.event_type,
            )
            .await)
    }

    /// Generate the single best nutrition recommendation.
    ///
    /// # Errors
    ///
    /// Only validation errors surface.
    pub async fn nutrition_recommendation(
        &self,
        request: &NutritionRequest,
    ) -> AppResult<Recommendation> {
        request.validate()?;
        Ok(self
            .nutrition
            .generate(
                &request.user_id,
                &request.day,
                &request.context,
                request.event_type,
            )
            .await)
    }

    /// Build the full daily nutrition envelope (recommendations, adjusted
    /// goals, safety alerts).
    ///
    /// # Errors
    ///
    /// Only validation errors surface.
    pub async fn nutrition_daily_report(
        &self,
        request: &NutritionRequest,
    ) -> AppResult<DailyNutritionReport> {
        request.validate()?;
        Ok(self
            .nutrition
            .daily_report(&request.user_id, &request.day, &request.context)
            .await)
    }

    /// Record feedback against the given domain's engine.
    ///
    /// # Errors
    ///
    /// Only validation errors surface; valid feedback always acknowledges.
    pub async fn feedback(
        &self,
        domain: Domain,
        request: &FeedbackRequest,
    ) -> AppResult<FeedbackAck> {
        request.validate()?;
        match domain {
            Domain::Workout => {
                self.workout
                    .feedback(
                        &request.user_id,
                        request.recommendation_id,
                        request.feedback.clone(),
                    )
                    .await;
            }
            Domain::Nutrition => {
                self.nutrition
                    .feedback(
                        &request.user_id,
                        request.recommendation_id,
                        request.feedback.clone(),
                    )
                    .await;
            }
        }
        Ok(FeedbackAck::recorded(request.recommendation_id))
    }

    /// Read-only profile summary for the given domain.
    ///
    /// # Errors
    ///
    /// Only validation errors surface. Never mutates state.
    pub async fn insights(&self, domain: Domain, user_id: &str) -> AppResult<ProfileSummary> {
        validate_user_id(user_id)?;
        Ok(match domain {
            Domain::Workout => self.workout.insights(user_id).await,
            Domain::Nutrition => self.nutrition.insights(user_id).await,
        })
    }
}
