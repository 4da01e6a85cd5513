// ABOUTME: Pluggable suggestion source: model-backed with rule-based fallback, or rule-based only
// ABOUTME: Brace-balanced JSON extraction from model text and Result-style parse outcomes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Suggestion sources.
//!
//! A [`SuggestionSource`] proposes a raw recommendation from profile,
//! context, and domain data. The variant is selected once at engine
//! construction (model loaded → [`SuggestionSource::ModelBacked`], otherwise
//! [`SuggestionSource::RuleBased`]) and never re-selected per request.
//!
//! The model is a black box that returns free text. Its output is parsed by
//! scanning for the first *brace-balanced* JSON object — counting `{`/`}`
//! outside string literals, not naive first/last-brace matching — which
//! tolerates surrounding prose and markdown code fences. Parsing produces a
//! [`ParseOutcome`] rather than an error: a malformed or incomplete object
//! makes this call fall back to the rule table, and nothing propagates to
//! the caller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::engine::context::ContextFactors;
use crate::engine::profile::{clamp01, PreferenceProfile};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{AdjustmentAction, Context, RiskLevel, SuggestionValue};

/// Event that triggered a recommendation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// User is struggling mid-set
    StruggleSet,
    /// User completed the set as planned
    CompleteSet,
    /// User wants to skip the exercise
    SkipExercise,
    /// Anything else, including unknown event tags from newer clients
    #[serde(other)]
    General,
}

impl EventType {
    /// Snake-case wire tag
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StruggleSet => "struggle_set",
            Self::CompleteSet => "complete_set",
            Self::SkipExercise => "skip_exercise",
            Self::General => "general",
        }
    }
}

/// A raw suggestion as proposed by a source, before personalization and
/// safety clamping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSuggestion {
    /// Proposed action
    pub action: AdjustmentAction,
    /// Proposed value, if the action is numeric
    pub suggested_value: Option<SuggestionValue>,
    /// Source reasoning
    pub reasoning: String,
    /// Contributing factors
    pub factors: Vec<String>,
    /// Expected outcome if followed
    pub expected_outcome: String,
    /// Proposed risk tier (safety enforcement may only lower it)
    pub risk: RiskLevel,
    /// Base confidence reported by the source, in `[0, 1]`
    pub confidence: f64,
}

impl RawSuggestion {
    /// Convenience constructor for a maintain-type suggestion
    #[must_use]
    pub fn maintain(reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: AdjustmentAction::MaintainProgram,
            suggested_value: None,
            reasoning: reasoning.into(),
            factors: vec!["user_profile".into(), "stable_context".into()],
            expected_outcome: "Consistent training progression".into(),
            risk: RiskLevel::VeryLow,
            confidence: clamp01(confidence),
        }
    }
}

/// Domain-specific half of a suggestion source.
///
/// Each instantiation (workout, nutrition) supplies its decision table, its
/// prompt, and its closed action vocabulary; the source supplies the model
/// plumbing and the fallback policy.
pub trait SuggestionRules: Send + Sync {
    /// Domain tag for logging ("workout", "nutrition")
    fn domain(&self) -> &'static str;

    /// System prompt framing the model's role
    fn system_prompt(&self) -> String;

    /// User prompt carrying profile, context, domain data, and event guidance
    fn build_prompt(
        &self,
        profile: &PreferenceProfile,
        context: &Context,
        event: EventType,
    ) -> String;

    /// Map a model-proposed action tag onto the domain's closed action set.
    /// Unknown tags mean the output is malformed.
    fn action_from_tag(&self, tag: &str) -> Option<AdjustmentAction>;

    /// Deterministic decision table. Always succeeds.
    fn decide(
        &self,
        profile: &PreferenceProfile,
        context: &Context,
        factors: &ContextFactors,
        event: EventType,
    ) -> RawSuggestion;
}

/// Outcome of parsing model output into a suggestion
#[derive(Debug)]
pub enum ParseOutcome {
    /// A well-formed suggestion was extracted
    Parsed(RawSuggestion),
    /// The output could not be used; carries the reason for logs
    Malformed(String),
}

/// Pluggable suggestion source, selected once at construction
pub enum SuggestionSource {
    /// Generate via the external model, falling back to rules per call
    ModelBacked {
        /// Model provider handle
        provider: Arc<dyn LlmProvider>,
    },
    /// Deterministic decision table only
    RuleBased,
}

impl SuggestionSource {
    /// Select the source variant from model availability
    #[must_use]
    pub fn select(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        provider.map_or(Self::RuleBased, |provider| Self::ModelBacked { provider })
    }

    /// Whether the model-backed path is active
    #[must_use]
    pub const fn is_model_backed(&self) -> bool {
        matches!(self, Self::ModelBacked { .. })
    }

    /// Propose a raw suggestion. Never fails: every model problem (timeout,
    /// transport error, malformed output) falls back to the rule table for
    /// this single call.
    pub async fn generate(
        &self,
        rules: &dyn SuggestionRules,
        profile: &PreferenceProfile,
        context: &Context,
        factors: &ContextFactors,
        event: EventType,
    ) -> RawSuggestion {
        match self {
            Self::RuleBased => rules.decide(profile, context, factors, event),
            Self::ModelBacked { provider } => {
                match Self::try_model(provider.as_ref(), rules, profile, context, event).await {
                    ParseOutcome::Parsed(suggestion) => suggestion,
                    ParseOutcome::Malformed(reason) => {
                        debug!(
                            domain = rules.domain(),
                            event = event.as_str(),
                            "Model output unusable ({reason}), using rule table"
                        );
                        let mut fallback = rules.decide(profile, context, factors, event);
                        fallback.factors.push("model_fallback".into());
                        fallback
                    }
                }
            }
        }
    }

    async fn try_model(
        provider: &dyn LlmProvider,
        rules: &dyn SuggestionRules,
        profile: &PreferenceProfile,
        context: &Context,
        event: EventType,
    ) -> ParseOutcome {
        let config = EngineConfig::global();
        let request = ChatRequest::new(vec![
            ChatMessage::system(rules.system_prompt()),
            ChatMessage::user(rules.build_prompt(profile, context, event)),
        ])
        .with_temperature(config.model.temperature)
        .with_max_tokens(config.model.max_tokens);

        let call = provider.complete(&request);
        let timeout = Duration::from_secs(config.model.timeout_secs);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => parse_model_output(&response.content, rules),
            Ok(Err(e)) => {
                warn!(domain = rules.domain(), "Model call failed: {e}");
                ParseOutcome::Malformed(format!("model call failed: {e}"))
            }
            Err(_) => {
                warn!(
                    domain = rules.domain(),
                    timeout_secs = config.model.timeout_secs,
                    "Model call timed out"
                );
                ParseOutcome::Malformed("model call timed out".into())
            }
        }
    }
}

/// Extract the first brace-balanced JSON object from free text.
///
/// Scans for the first `{` and walks forward counting depth, skipping brace
/// characters inside string literals (including escaped quotes). Returns the
/// complete object slice, or `None` when no balanced object exists.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse model output into a suggestion for the given domain.
///
/// Required fields: `type`, `suggested_value`, `reasoning`. Anything missing,
/// non-JSON, or carrying an action tag outside the domain's closed set
/// produces [`ParseOutcome::Malformed`] — never an error.
#[must_use]
pub fn parse_model_output(content: &str, rules: &dyn SuggestionRules) -> ParseOutcome {
    let Some(json_str) = extract_json_object(content) else {
        return ParseOutcome::Malformed("no balanced JSON object in output".into());
    };

    let value: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(e) => return ParseOutcome::Malformed(format!("invalid JSON: {e}")),
    };

    let Some(tag) = value.get("type").and_then(serde_json::Value::as_str) else {
        return ParseOutcome::Malformed("missing required field: type".into());
    };
    let Some(action) = rules.action_from_tag(tag) else {
        return ParseOutcome::Malformed(format!("unknown action tag: {tag}"));
    };

    let Some(reasoning) = value.get("reasoning").and_then(serde_json::Value::as_str) else {
        return ParseOutcome::Malformed("missing required field: reasoning".into());
    };

    let suggested_value = match value.get("suggested_value") {
        None => return ParseOutcome::Malformed("missing required field: suggested_value".into()),
        Some(raw) => match numeric_value(raw) {
            Some(parsed) => Some(parsed),
            None if action == AdjustmentAction::MaintainProgram
                || action == AdjustmentAction::ExerciseSubstitution
                || action == AdjustmentAction::RecoveryFocus =>
            {
                // Non-numeric actions legitimately carry no value.
                None
            }
            None => {
                return ParseOutcome::Malformed(format!("non-numeric suggested_value: {raw}"));
            }
        },
    };

    let factors = value
        .get("factors")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(ToOwned::to_owned))
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| vec!["model_suggestion".into()]);

    let expected_outcome = value
        .get("expected_outcome")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Improved workout performance")
        .to_owned();

    let risk = value
        .get("risk_assessment")
        .and_then(serde_json::Value::as_str)
        .map_or(RiskLevel::Low, risk_from_str);

    let confidence = value
        .get("confidence_score")
        .and_then(serde_json::Value::as_f64)
        .map_or(0.5, clamp01);

    ParseOutcome::Parsed(RawSuggestion {
        action,
        suggested_value,
        reasoning: reasoning.to_owned(),
        factors,
        expected_outcome,
        risk,
        confidence,
    })
}

fn numeric_value(raw: &serde_json::Value) -> Option<SuggestionValue> {
    match raw {
        serde_json::Value::Number(n) => n.as_f64().map(SuggestionValue::Scalar),
        serde_json::Value::Array(items) => {
            let series: Option<Vec<f64>> = items.iter().map(serde_json::Value::as_f64).collect();
            series.map(SuggestionValue::Series)
        }
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(SuggestionValue::Scalar),
        _ => None,
    }
}

fn risk_from_str(raw: &str) -> RiskLevel {
    match raw.to_lowercase().as_str() {
        "very low" | "very_low" => RiskLevel::VeryLow,
        "moderate" | "medium" => RiskLevel::Moderate,
        "high" => RiskLevel::High,
        _ => RiskLevel::Low,
    }
}
