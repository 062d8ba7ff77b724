// ABOUTME: OpenAI-compatible chat completions provider used for OpenAI and Perplexity
// ABOUTME: Bearer-authenticated POST to {base}/chat/completions with vendor error mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # `OpenAI`-Compatible Provider
//!
//! Perplexity exposes the same chat completions API as `OpenAI`, so both
//! vendors share this implementation and differ only in their
//! [`OpenAiCompatibleConfig`] preset.

use std::fmt;

use async_trait::async_trait;
use recast_core::constants::llm::{
    OPENAI_API_BASE, OPENAI_DEFAULT_MODEL, PERPLEXITY_API_BASE, PERPLEXITY_DEFAULT_MODEL,
};
use recast_core::errors::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use zeroize::Zeroizing;

use super::{
    content_blocked, map_status_error, map_transport_error, ChatMessage, ChatRequest,
    ChatResponse, LlmProvider, TokenUsage,
};

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for OpenAiMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: Option<String>,
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
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
    #[serde(rename = "total_tokens")]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for an `OpenAI`-compatible endpoint
#[derive(Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API, without the trailing `/chat/completions`
    pub base_url: String,
    /// Bearer API key
    pub api_key: Zeroizing<String>,
    /// Default model to use
    pub default_model: String,
    /// Provider identifier
    pub provider_name: &'static str,
    /// Provider display name
    pub display_name: &'static str,
}

impl OpenAiCompatibleConfig {
    /// Preset for `OpenAI`
    #[must_use]
    pub fn openai(api_key: Zeroizing<String>) -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_owned(),
            api_key,
            default_model: OPENAI_DEFAULT_MODEL.to_owned(),
            provider_name: "openai",
            display_name: "OpenAI",
        }
    }

    /// Preset for Perplexity
    #[must_use]
    pub fn perplexity(api_key: Zeroizing<String>) -> Self {
        Self {
            base_url: PERPLEXITY_API_BASE.to_owned(),
            api_key,
            default_model: PERPLEXITY_DEFAULT_MODEL.to_owned(),
            provider_name: "perplexity",
            display_name: "Perplexity",
        }
    }

    /// Point the preset at another endpoint (proxies, test servers)
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        base_url.clone_into(&mut self.base_url);
        self
    }
}

impl fmt::Debug for OpenAiCompatibleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("default_model", &self.default_model)
            .field("provider_name", &self.provider_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Chat completions provider for `OpenAI` and Perplexity
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from a shared client and a configuration
    #[must_use]
    pub const fn new(client: Client, config: OpenAiCompatibleConfig) -> Self {
        Self { client, config }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn parse_error_response(&self, status: reqwest::StatusCode, body: &str) -> AppError {
        let message = serde_json::from_str::<OpenAiErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |e| e.error.message,
        );
        map_status_error(self.config.display_name, status, &message)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        self.config.provider_name
    }

    fn display_name(&self) -> &'static str {
        self.config.display_name
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(provider = self.config.provider_name))]
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);
        let body = OpenAiRequest {
            model,
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            messages = body.messages.len(),
            max_tokens = ?body.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(self.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to {}: {e}", self.config.display_name);
                map_transport_error(self.config.display_name, &e)
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(self.config.display_name, &e))?;

        if !status.is_success() {
            return Err(self.parse_error_response(status, &text));
        }

        let parsed: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
            error!(
                "Failed to parse {} response: {e}",
                self.config.display_name
            );
            AppError::external_service(
                self.config.display_name,
                format!("Failed to parse response: {e}"),
            )
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            AppError::external_service(self.config.display_name, "API returned no choices")
        })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(content_blocked(self.config.display_name, "content_filter"));
        }

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                AppError::external_service(self.config.display_name, "API returned empty content")
            })?;

        Ok(ChatResponse {
            content,
            model: parsed.model.unwrap_or_else(|| model.to_owned()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.completion,
                total_tokens: u.total,
            }),
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_core::errors::ErrorCode;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            Client::new(),
            OpenAiCompatibleConfig::perplexity(Zeroizing::new("pplx-test".to_owned()))
                .with_base_url("http://localhost:9999/"),
        )
    }

    #[test]
    fn test_presets_and_url() {
        let p = provider();
        assert_eq!(p.name(), "perplexity");
        assert_eq!(p.default_model(), PERPLEXITY_DEFAULT_MODEL);
        assert_eq!(p.api_url(), "http://localhost:9999/chat/completions");
        assert!(!format!("{:?}", p.config).contains("pplx-test"));
    }

    #[test]
    fn test_error_body_is_unwrapped() {
        let err = provider().parse_error_response(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        );
        assert_eq!(err.code, ErrorCode::ExternalAuthFailed);
        assert!(err.message.contains("Incorrect API key provided"));
    }
}
