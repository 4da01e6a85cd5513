// ABOUTME: Adaptive coaching recommendation engine with per-user preference learning
// ABOUTME: Context-aware scoring, pluggable suggestion sources, and hard safety bounds
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Adaptive Coach
//!
//! A recommendation engine that proposes context-sensitive adjustments —
//! a workout set's reps/weight/rest, or a day's nutrition and hydration
//! targets — learns from each user's acceptance history, and guarantees
//! every suggestion respects hard domain safety bounds before it reaches
//! the user.
//!
//! Two instantiations share one pipeline: context analysis, a pluggable
//! suggestion source (model-backed with rule-based fallback, or rule-based
//! only), personalization against the learned profile, authoritative safety
//! clamping, and confidence scoring. Feedback flows back through the
//! learner into the profile store.
//!
//! ## Modules
//!
//! - **api**: transport-agnostic request/response envelopes and validation
//! - **engine**: the recommendation core and both domain instantiations
//! - **store**: profile persistence behind a trait (in-memory, JSON file)
//! - **llm**: the external suggestion model's minimal completion contract
//! - **config**: every tunable constant, env-overridable and validated
//! - **errors**: unified error codes and the `AppError` type
//! - **logging**: structured logging setup via `tracing`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use adaptive_coach::api::{CoachApi, WorkoutRequest};
//! use adaptive_coach::engine::{EventType, ExerciseSetPlan};
//! use adaptive_coach::models::{Context, SuggestionValue};
//! use adaptive_coach::store::InMemoryProfileStore;
//!
//! # async fn example() -> Result<(), adaptive_coach::errors::AppError> {
//! let api = CoachApi::new(Arc::new(InMemoryProfileStore::new()), None);
//! let request = WorkoutRequest {
//!     user_id: "athlete-1".into(),
//!     plan: ExerciseSetPlan {
//!         exercise_name: "Back Squat".into(),
//!         planned_sets: Some(3),
//!         planned_reps: Some(SuggestionValue::Scalar(10.0)),
//!         planned_weight: Some(100.0),
//!         planned_rest_seconds: Some(90.0),
//!         current_set: 2,
//!     },
//!     context: Context::default(),
//!     event_type: EventType::StruggleSet,
//! };
//! let recommendation = api.workout_recommendation(&request).await?;
//! println!("{}: {}", recommendation.action.as_str(), recommendation.reasoning);
//! # Ok(())
//! # }
//! ```

/// Request/response envelopes and boundary validation
pub mod api;

/// Engine configuration with environment overrides
pub mod config;

/// The adaptive recommendation core and domain instantiations
pub mod engine;

/// Unified error handling with standard error codes
pub mod errors;

/// LLM provider abstraction for the suggestion model
pub mod llm;

/// Structured logging configuration
pub mod logging;

/// Shared domain types
pub mod models;

/// Profile persistence behind a pluggable trait
pub mod store;

pub use api::CoachApi;
pub use engine::{NutritionEngine, WorkoutEngine};
pub use models::Recommendation;
