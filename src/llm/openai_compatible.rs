// ABOUTME: Generic OpenAI-compatible LLM provider for local and cloud endpoints
// ABOUTME: Supports Ollama, vLLM, LocalAI, and any OpenAI-compatible API
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # `OpenAI`-Compatible Provider
//!
//! Generic implementation for any `OpenAI`-compatible completion endpoint,
//! which is how the fine-tuned coaching model is served in practice (Ollama,
//! vLLM, `LocalAI`, or a hosted compatible API).
//!
//! ## Configuration
//!
//! - `LOCAL_LLM_BASE_URL`: Base URL (default: <http://localhost:11434/v1> for Ollama)
//! - `LOCAL_LLM_MODEL`: Model to use (default: `qwen2.5:14b-instruct`)
//! - `LOCAL_LLM_API_KEY`: API key (optional, empty for local servers)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatRequest, ChatResponse, LlmProvider, MessageRole, TokenUsage};
use crate::errors::AppError;

/// Default Ollama endpoint
const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

/// Default model for local inference
const DEFAULT_MODEL: &str = "qwen2.5:14b-instruct";

/// Connection timeout for local servers
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Request timeout (local inference can be slower than cloud)
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Wire Types
// ============================================================================

/// OpenAI-compatible API request structure
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Message structure for OpenAI-compatible API
#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

/// OpenAI-compatible API response structure
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Error response structure
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

// ============================================================================
// Provider
// ============================================================================

/// Configuration for an `OpenAI`-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// API base URL, e.g. `http://localhost:11434/v1`
    pub base_url: String,
    /// Optional bearer token; local servers usually run without one
    pub api_key: Option<String>,
    /// Model used when the request does not name one
    pub default_model: String,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_owned(),
        }
    }
}

/// Provider for any `OpenAI`-compatible completion endpoint
#[derive(Debug)]
pub struct OpenAiCompatibleProvider {
    config: OpenAiCompatibleConfig,
    client: Client,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from explicit configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create a provider from environment configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_env() -> Result<Self, AppError> {
        let config = OpenAiCompatibleConfig {
            base_url: env::var("LOCAL_LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            api_key: env::var("LOCAL_LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            default_model: env::var("LOCAL_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
        };
        Self::new(config)
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn build_body(&self, request: &ChatRequest) -> OpenAiRequest {
        OpenAiRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.default_model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: match m.role {
                        MessageRole::System => "system".to_owned(),
                        MessageRole::User => "user".to_owned(),
                        MessageRole::Assistant => "assistant".to_owned(),
                    },
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai_compatible"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let body = self.build_body(request);
        debug!(model = %body.model, messages = body.messages.len(), "Sending completion request");

        let mut http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| AppError::unavailable(format!("Model endpoint unreachable: {e}")))?;

        let status = response.status();
        let payload = response
            .bytes()
            .await
            .map_err(|e| AppError::external(format!("Failed to read model response: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<OpenAiErrorResponse>(&payload)
                .map_or_else(|_| String::from_utf8_lossy(&payload).into_owned(), |e| e.error.message);
            warn!(status = %status, "Model endpoint returned error: {detail}");
            return Err(AppError::external(format!(
                "Model endpoint returned {status}: {detail}"
            )));
        }

        let parsed: OpenAiResponse = serde_json::from_slice(&payload)
            .map_err(|e| AppError::external(format!("Malformed model response envelope: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external("Model response contained no choices"))?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model.unwrap_or(body.model),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        let mut http_request = self.client.get(self.api_url("models"));
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }
        let response = http_request
            .send()
            .await
            .map_err(|e| AppError::unavailable(format!("Model endpoint unreachable: {e}")))?;
        Ok(response.status().is_success())
    }
}
