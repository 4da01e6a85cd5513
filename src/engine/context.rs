// ABOUTME: Context analyzer turning raw situational signals into normalized factor scores
// ABOUTME: Pure, deterministic transforms; absent signals default to neutral values
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Context analysis.
//!
//! Each signal present in a [`Context`] contributes one deterministic
//! transform; anything absent defaults to a neutral score instead of
//! failing. The analyzer is a pure function: identical input always yields
//! identical factors.

use serde::{Deserialize, Serialize};

use crate::config::ContextConfig;
use crate::engine::profile::{clamp01, PreferenceProfile};
use crate::models::{Context, CrowdingLevel};

/// Normalized context factor scores, each in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFactors {
    /// How close reported energy is to the optimal level (1.0 = optimal)
    pub energy_alignment: f64,
    /// How much the available time falls short of the user's budget (0.0 = none)
    pub time_pressure: f64,
    /// Fraction of required equipment currently unavailable
    pub equipment_constraints: f64,
    /// Reported motivation scaled to `[0, 1]` (1.0 = fully motivated)
    pub motivation_factor: f64,
    /// Penalty from gym crowding (0.0 = empty gym)
    pub crowding_impact: f64,
    /// External recovery composite scaled to `[0, 1]` (1.0 = fully recovered)
    pub recovery_factor: f64,
}

impl Default for ContextFactors {
    /// Neutral factors: no signal means no penalty
    fn default() -> Self {
        Self {
            energy_alignment: 1.0,
            time_pressure: 0.0,
            equipment_constraints: 0.0,
            motivation_factor: 1.0,
            crowding_impact: 0.0,
            recovery_factor: 1.0,
        }
    }
}

impl ContextFactors {
    /// Weighted combination of factors expressing how clearly the context
    /// supports a recommendation, in `[0, 1]`
    #[must_use]
    pub fn clarity(&self, config: &ContextConfig) -> f64 {
        clamp01(
            self.energy_alignment * config.clarity_energy_weight
                + (1.0 - self.time_pressure) * config.clarity_time_weight
                + self.motivation_factor * config.clarity_motivation_weight
                + (1.0 - self.crowding_impact) * config.clarity_crowding_weight,
        )
    }
}

/// Stateless analyzer over request contexts
pub struct ContextAnalyzer;

impl ContextAnalyzer {
    /// Compute factor scores for `context` against `profile` preferences.
    ///
    /// Pure: calling this twice with identical inputs yields identical
    /// factors.
    #[must_use]
    pub fn analyze(
        context: &Context,
        profile: &PreferenceProfile,
        config: &ContextConfig,
    ) -> ContextFactors {
        let mut factors = ContextFactors::default();

        if let Some(energy) = context.energy {
            factors.energy_alignment =
                clamp01(1.0 - (energy - config.optimal_energy).abs() / config.optimal_energy);
        }

        if let Some(available) = context.available_minutes {
            if profile.time_budget_minutes > 0.0 {
                let ratio = available / profile.time_budget_minutes;
                if ratio < config.time_pressure_ratio {
                    factors.time_pressure = clamp01(config.time_pressure_ratio - ratio);
                }
            }
        }

        if let Some(equipment) = &context.equipment_availability {
            if !equipment.is_empty() {
                let unavailable = equipment.values().filter(|available| !**available).count();
                factors.equipment_constraints = clamp01(unavailable as f64 / equipment.len() as f64);
            }
        }

        if let Some(motivation) = context.motivation {
            factors.motivation_factor = clamp01(motivation / 10.0);
        }

        if let Some(crowding) = context.crowding {
            factors.crowding_impact = match crowding {
                CrowdingLevel::Low => 0.0,
                CrowdingLevel::Medium => config.medium_crowding_impact,
                CrowdingLevel::High => config.high_crowding_impact,
            };
        }

        if let Some(recovery) = context.recovery_score {
            factors.recovery_factor = clamp01(recovery / 100.0);
        }

        factors
    }
}
