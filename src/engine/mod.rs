// ABOUTME: Adaptive recommendation engine core: analysis, suggestion, safety, and learning
// ABOUTME: Module wiring and re-exports for the workout and nutrition instantiations
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Recommendation Engine
//!
//! The adaptive core shared by both domain instantiations. Control flow per
//! request: [`context::ContextAnalyzer`] → [`suggestion::SuggestionSource`] →
//! [`personalization::PersonalizationAdjuster`] → safety enforcement →
//! [`confidence::ConfidenceScorer`]. Feedback flows separately through
//! [`feedback::FeedbackLearner`] into the profile store.

/// Confidence scoring (pure)
pub mod confidence;
/// Context analysis into normalized factor scores (pure)
pub mod context;
/// Feedback learning and pattern re-analysis
pub mod feedback;
/// Read-only profile summaries and trends
pub mod insights;
/// Nutrition instantiation with the independent safety monitor
pub mod nutrition;
/// Personalization rule pipeline
pub mod personalization;
/// Per-user preference profiles
pub mod profile;
/// Hard safety constraint enforcement
pub mod safety;
/// Pluggable suggestion sources and model output parsing
pub mod suggestion;
/// Workout instantiation
pub mod workout;

pub use confidence::ConfidenceScorer;
pub use context::{ContextAnalyzer, ContextFactors};
pub use feedback::FeedbackLearner;
pub use insights::{ProfileSummary, TrendDirection};
pub use nutrition::{
    DailyIntake, DailyNutritionReport, HealthProfile, NutritionDay, NutritionEngine,
    NutritionGoals, NutritionSafetyMonitor, RecoveryMetrics, SafetyAlert,
};
pub use personalization::PersonalizationAdjuster;
pub use profile::PreferenceProfile;
pub use safety::SafetyConstraintEnforcer;
pub use suggestion::{EventType, ParseOutcome, RawSuggestion, SuggestionRules, SuggestionSource};
pub use workout::{ExerciseSetPlan, WorkoutEngine};
