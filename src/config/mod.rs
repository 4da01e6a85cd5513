// ABOUTME: Engine configuration for personalization, learning, and safety bounds
// ABOUTME: OnceLock-backed global with environment overrides and range validation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Engine Configuration
//!
//! Every empirical constant in the engine lives here rather than inline at a
//! call site: EMA learning rates, the conservative personalization factor,
//! the confidence boost for maintain-type actions, context transform
//! parameters, and the hard safety bounds. Values were taken from the
//! behavior observably shipped in the coaching product; they are tunable,
//! not invariants.
//!
//! # Configuration Methods
//!
//! 1. Environment variables (highest priority):
//!    ```bash
//!    export COACH_MIN_REP_FRACTION=0.85
//!    export COACH_MODEL_TIMEOUT_SECS=12
//!    ```
//! 2. Default values (if env vars not set)
//!
//! The loaded configuration is validated once and cached process-wide via
//! [`EngineConfig::global`].

use serde::{Deserialize, Serialize};
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric field is outside its allowed range
    #[error("Value out of range: {0}")]
    ValueOutOfRange(&'static str),

    /// An environment override could not be parsed
    #[error("Parse error for {key}: {value}")]
    Parse {
        /// Environment variable name
        key: &'static str,
        /// Offending value
        value: String,
    },
}

/// Hard safety bounds for workout adjustments.
///
/// Immutable at request time; the enforcer can only tighten suggestions
/// against these, never loosen them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConstraintSet {
    /// Never suggest fewer reps than this fraction of the plan (0.8)
    pub min_rep_fraction: f64,
    /// Max fractional weight increase per session (0.10)
    pub max_weight_increase_fraction: f64,
    /// Minimum rest between sets in seconds (30)
    pub min_rest_seconds: f64,
    /// Max fractional session duration extension (0.20)
    pub max_session_extension_fraction: f64,
}

impl Default for SafetyConstraintSet {
    fn default() -> Self {
        Self {
            min_rep_fraction: 0.8,
            max_weight_increase_fraction: 0.10,
            min_rest_seconds: 30.0,
            max_session_extension_fraction: 0.20,
        }
    }
}

/// Context analyzer transform parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Energy level treated as optimal on the 0-10 scale (7.0)
    pub optimal_energy: f64,
    /// Available/preferred time ratio below which time pressure kicks in (0.8)
    pub time_pressure_ratio: f64,
    /// Crowding impact for a medium-crowded gym (0.3)
    pub medium_crowding_impact: f64,
    /// Crowding impact for a high-crowded gym (0.7)
    pub high_crowding_impact: f64,
    /// Clarity weight for energy alignment (0.3)
    pub clarity_energy_weight: f64,
    /// Clarity weight for (1 - time pressure) (0.2)
    pub clarity_time_weight: f64,
    /// Clarity weight for motivation (0.3)
    pub clarity_motivation_weight: f64,
    /// Clarity weight for (1 - crowding impact) (0.2)
    pub clarity_crowding_weight: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            optimal_energy: 7.0,
            time_pressure_ratio: 0.8,
            medium_crowding_impact: 0.3,
            high_crowding_impact: 0.7,
            clarity_energy_weight: 0.3,
            clarity_time_weight: 0.2,
            clarity_motivation_weight: 0.3,
            clarity_crowding_weight: 0.2,
        }
    }
}

/// Personalization rule thresholds and factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizationConfig {
    /// Form-focus preference above which load increases are damped (0.8)
    pub form_focus_threshold: f64,
    /// Delta scale applied for high form focus (0.95)
    pub conservative_scale: f64,
    /// Volume tolerance below which volume increases become maintain (0.4)
    pub low_volume_tolerance: f64,
    /// Energy alignment below which increases become maintain (0.5)
    pub low_energy_threshold: f64,
    /// Motivation factor below which increases become maintain (0.5)
    pub low_motivation_threshold: f64,
    /// Acceptance rate below which confidence is scaled down (0.3)
    pub low_acceptance_threshold: f64,
    /// Confidence scale for users with low acceptance history (0.8)
    pub low_acceptance_confidence_scale: f64,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            form_focus_threshold: 0.8,
            conservative_scale: 0.95,
            low_volume_tolerance: 0.4,
            low_energy_threshold: 0.5,
            low_motivation_threshold: 0.5,
            low_acceptance_threshold: 0.3,
            low_acceptance_confidence_scale: 0.8,
        }
    }
}

/// Confidence scoring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// Floor of the acceptance scaling term (0.5)
    pub acceptance_floor: f64,
    /// Weight of the acceptance rate in its scaling term (0.5)
    pub acceptance_weight: f64,
    /// Floor of the context clarity scaling term (0.7)
    pub clarity_floor: f64,
    /// Weight of context clarity in its scaling term (0.3)
    pub clarity_weight: f64,
    /// Multiplicative boost for conservative actions (1.1)
    pub conservative_boost: f64,
    /// Interactions required before the maturity boost applies (20)
    pub maturity_min_interactions: u64,
    /// Cap on the maturity boost contribution (0.2)
    pub maturity_cap: f64,
    /// Divisor converting interaction count into the maturity term (100)
    pub maturity_divisor: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            acceptance_floor: 0.5,
            acceptance_weight: 0.5,
            clarity_floor: 0.7,
            clarity_weight: 0.3,
            conservative_boost: 1.1,
            maturity_min_interactions: 20,
            maturity_cap: 0.2,
            maturity_divisor: 100.0,
        }
    }
}

/// Feedback learning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// EMA learning rate for fresh profiles (0.1)
    pub default_learning_rate: f64,
    /// Lower bound of the adaptive learning rate (0.05)
    pub min_learning_rate: f64,
    /// Upper bound of the adaptive learning rate (0.3)
    pub max_learning_rate: f64,
    /// Re-analyze interaction patterns every N interactions (10)
    pub pattern_analysis_every: u64,
    /// Number of recent interactions examined during re-analysis (20)
    pub pattern_window: usize,
    /// Acceptance divergence that triggers a learning-rate increase (0.2)
    pub divergence_threshold: f64,
    /// Learning-rate multiplier on divergence (1.2)
    pub rate_increase_factor: f64,
    /// Learning-rate decay multiplier when stable (0.95)
    pub rate_decay_factor: f64,
    /// Rating treated as neutral on the 1-5 scale (3.0)
    pub rating_midpoint: f64,
    /// Divisor converting a rating offset into a confidence delta (5.0)
    pub rating_divisor: f64,
    /// Responses faster than this many seconds raise confidence (5.0)
    pub fast_response_secs: f64,
    /// Responses slower than this many seconds lower confidence (30.0)
    pub slow_response_secs: f64,
    /// Confidence step applied for response latency (0.01)
    pub latency_confidence_step: f64,
    /// Capacity of the per-profile rejection reason ring (20)
    pub rejection_reason_capacity: usize,
    /// Capacity of the per-user in-memory interaction history (100)
    pub interaction_history_capacity: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            default_learning_rate: 0.1,
            min_learning_rate: 0.05,
            max_learning_rate: 0.3,
            pattern_analysis_every: 10,
            pattern_window: 20,
            divergence_threshold: 0.2,
            rate_increase_factor: 1.2,
            rate_decay_factor: 0.95,
            rating_midpoint: 3.0,
            rating_divisor: 5.0,
            fast_response_secs: 5.0,
            slow_response_secs: 30.0,
            latency_confidence_step: 0.01,
            rejection_reason_capacity: 20,
            interaction_history_capacity: 100,
        }
    }
}

/// Nutrition safety thresholds.
///
/// Per-kg bounds and absolute ceilings checked by the safety monitor, plus
/// the recovery thresholds driving goal adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionSafetyConfig {
    /// Minimum calories per kg body weight per day (15)
    pub min_calories_per_kg: f64,
    /// Maximum calories per kg body weight per day (50)
    pub max_calories_per_kg: f64,
    /// Minimum protein grams per kg body weight (0.8)
    pub min_protein_per_kg: f64,
    /// General maximum protein grams per kg body weight (3.0)
    pub max_protein_per_kg: f64,
    /// Protein ceiling for users with kidney issues (1.2 g/kg)
    pub kidney_protein_limit_g_per_kg: f64,
    /// Protein ceiling for users with diabetes (2.0 g/kg)
    pub diabetes_protein_limit_g_per_kg: f64,
    /// General sodium limit in mg/day (2300)
    pub general_sodium_limit_mg: f64,
    /// Sodium limit for heart/blood-pressure conditions in mg/day (1500)
    pub cardiac_sodium_limit_mg: f64,
    /// Absolute sodium ceiling regardless of conditions in mg/day (4000)
    pub absolute_max_sodium_mg: f64,
    /// Minimum fat as a percentage of calories (15)
    pub min_fat_percent: f64,
    /// Maximum sugar as a percentage of calories (25)
    pub max_sugar_percent: f64,
    /// Recovery score below which goals get a recovery boost (60)
    pub recovery_boost_threshold: f64,
    /// Recovery score below which protein gets boosted (50)
    pub protein_boost_threshold: f64,
    /// Recovery score below which hydration gets boosted (40)
    pub hydration_boost_threshold: f64,
    /// Sleep quality below which protein/sleep adjustments apply (6)
    pub low_sleep_quality: f64,
    /// Hydration status below which hydration gets boosted (70)
    pub low_hydration_status: f64,
    /// Protein deficit in grams that triggers a recommendation (10)
    pub protein_deficit_trigger_g: f64,
    /// Daily sugar grams that trigger a diabetes warning (50)
    pub diabetes_sugar_warning_g: f64,
    /// Hour of day after which hydration slots are not scheduled (22)
    pub hydration_cutoff_hour: u32,
}

impl Default for NutritionSafetyConfig {
    fn default() -> Self {
        Self {
            min_calories_per_kg: 15.0,
            max_calories_per_kg: 50.0,
            min_protein_per_kg: 0.8,
            max_protein_per_kg: 3.0,
            kidney_protein_limit_g_per_kg: 1.2,
            diabetes_protein_limit_g_per_kg: 2.0,
            general_sodium_limit_mg: 2300.0,
            cardiac_sodium_limit_mg: 1500.0,
            absolute_max_sodium_mg: 4000.0,
            min_fat_percent: 15.0,
            max_sugar_percent: 25.0,
            recovery_boost_threshold: 60.0,
            protein_boost_threshold: 50.0,
            hydration_boost_threshold: 40.0,
            low_sleep_quality: 6.0,
            low_hydration_status: 70.0,
            protein_deficit_trigger_g: 10.0,
            diabetes_sugar_warning_g: 50.0,
            hydration_cutoff_hour: 22,
        }
    }
}

/// Suggestion model invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Timeout for a single model call in seconds (8)
    pub timeout_secs: u64,
    /// Sampling temperature for consistent recommendations (0.2)
    pub temperature: f32,
    /// Maximum completion tokens (256)
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8,
            temperature: 0.2,
            max_tokens: 256,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard workout safety bounds
    pub safety: SafetyConstraintSet,
    /// Context analyzer parameters
    pub context: ContextConfig,
    /// Personalization rule parameters
    pub personalization: PersonalizationConfig,
    /// Confidence scoring parameters
    pub confidence: ConfidenceConfig,
    /// Feedback learning parameters
    pub learning: LearningConfig,
    /// Nutrition safety thresholds
    pub nutrition: NutritionSafetyConfig,
    /// Model invocation settings
    pub model: ModelConfig,
}

static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

impl EngineConfig {
    /// Get the global configuration instance (loaded once per process)
    pub fn global() -> &'static Self {
        ENGINE_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                tracing::warn!("Failed to load engine config: {e}, using defaults");
                Self::default()
            })
        })
    }

    /// Load configuration from defaults plus environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override fails to parse or the
    /// resulting configuration fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_f64("COACH_MIN_REP_FRACTION")? {
            self.safety.min_rep_fraction = v;
        }
        if let Some(v) = env_f64("COACH_MAX_WEIGHT_INCREASE")? {
            self.safety.max_weight_increase_fraction = v;
        }
        if let Some(v) = env_f64("COACH_MIN_REST_SECONDS")? {
            self.safety.min_rest_seconds = v;
        }
        if let Some(v) = env_f64("COACH_EMA_ALPHA")? {
            self.learning.default_learning_rate = v;
        }
        if let Some(v) = env_f64("COACH_CONSERVATIVE_SCALE")? {
            self.personalization.conservative_scale = v;
        }
        if let Some(v) = env_f64("COACH_CONSERVATIVE_BOOST")? {
            self.confidence.conservative_boost = v;
        }
        if let Some(v) = env_u64("COACH_MODEL_TIMEOUT_SECS")? {
            self.model.timeout_secs = v;
        }
        Ok(())
    }

    /// Validate that every parameter sits inside its documented range
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range parameter found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.safety.min_rep_fraction) {
            return Err(ConfigError::ValueOutOfRange(
                "safety.min_rep_fraction must be in [0,1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.safety.max_weight_increase_fraction) {
            return Err(ConfigError::ValueOutOfRange(
                "safety.max_weight_increase_fraction must be in [0,1]",
            ));
        }
        if self.safety.min_rest_seconds < 0.0 {
            return Err(ConfigError::ValueOutOfRange(
                "safety.min_rest_seconds must be non-negative",
            ));
        }
        if self.learning.min_learning_rate <= 0.0
            || self.learning.min_learning_rate > self.learning.max_learning_rate
            || self.learning.max_learning_rate > 1.0
        {
            return Err(ConfigError::ValueOutOfRange(
                "learning rate bounds must satisfy 0 < min <= max <= 1",
            ));
        }
        if !(self.learning.min_learning_rate..=self.learning.max_learning_rate)
            .contains(&self.learning.default_learning_rate)
        {
            return Err(ConfigError::ValueOutOfRange(
                "learning.default_learning_rate must sit within its bounds",
            ));
        }
        if self.learning.pattern_analysis_every == 0 {
            return Err(ConfigError::ValueOutOfRange(
                "learning.pattern_analysis_every must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.personalization.conservative_scale) {
            return Err(ConfigError::ValueOutOfRange(
                "personalization.conservative_scale must be in [0,1]",
            ));
        }
        if self.confidence.conservative_boost < 1.0 {
            return Err(ConfigError::ValueOutOfRange(
                "confidence.conservative_boost must be >= 1",
            ));
        }
        let clarity_weights = self.context.clarity_energy_weight
            + self.context.clarity_time_weight
            + self.context.clarity_motivation_weight
            + self.context.clarity_crowding_weight;
        if (clarity_weights - 1.0).abs() > 1e-9 {
            return Err(ConfigError::ValueOutOfRange(
                "context clarity weights must sum to 1.0",
            ));
        }
        if self.model.timeout_secs == 0 {
            return Err(ConfigError::ValueOutOfRange(
                "model.timeout_secs must be positive",
            ));
        }
        Ok(())
    }
}

fn env_f64(key: &'static str) -> Result<Option<f64>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::Parse { key, value: raw }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Parse { key, value: raw }),
        Err(_) => Ok(None),
    }
}
