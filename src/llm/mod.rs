// ABOUTME: LLM provider abstraction for the AI generation path
// ABOUTME: Defines the chat contract implemented by the Gemini and OpenAI-compatible providers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # LLM Provider Service Provider Interface
//!
//! Providers are built per request from the user's own API key and a shared
//! `reqwest::Client`, so no provider state outlives a request.
//!
//! ```rust,no_run
//! use recast_server::llm::{ChatMessage, ChatRequest, LlmProvider};
//!
//! async fn example(provider: &dyn LlmProvider) {
//!     let request = ChatRequest::new(vec![
//!         ChatMessage::system("You rewrite text for social media."),
//!         ChatMessage::user("Summarize: ..."),
//!     ])
//!     .with_max_tokens(256);
//!     let response = provider.complete(&request).await;
//! }
//! ```

mod gemini;
mod openai_compatible;

pub use gemini::GeminiProvider;
pub use openai_compatible::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};

use std::time::Duration;

use async_trait::async_trait;
use recast_core::constants::llm::CONNECT_TIMEOUT_SECS;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use recast_core::models::AiProviderKind;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::LlmConfig;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Configuration for a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Model identifier (provider-specific)
    pub model: Option<String>,
    /// Temperature for response randomness (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a new chat request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the model to use
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from a chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated message content
    pub content: String,
    /// Model used for generation
    pub model: String,
    /// Token usage statistics
    pub usage: Option<TokenUsage>,
    /// Finish reason (stop, length, etc.)
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// LLM provider trait for chat completion
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (`openai`, `gemini`, `perplexity`)
    fn name(&self) -> &'static str;

    /// Human-readable display name for the provider
    fn display_name(&self) -> &'static str;

    /// Default model to use if not specified in request
    fn default_model(&self) -> &str;

    /// Perform a chat completion
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse>;
}

// ============================================================================
// Construction
// ============================================================================

/// Build the shared HTTP client used for every LLM call
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized
pub fn build_http_client(config: &LlmConfig) -> AppResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))
}

/// Instantiate the provider for `kind` with the caller's API key
#[must_use]
pub fn provider_for(
    kind: AiProviderKind,
    api_key: Zeroizing<String>,
    client: Client,
    config: &LlmConfig,
) -> Box<dyn LlmProvider> {
    match kind {
        AiProviderKind::OpenAi => Box::new(OpenAiCompatibleProvider::new(
            client,
            OpenAiCompatibleConfig::openai(api_key).with_base_url(&config.openai_base_url),
        )),
        AiProviderKind::Perplexity => Box::new(OpenAiCompatibleProvider::new(
            client,
            OpenAiCompatibleConfig::perplexity(api_key).with_base_url(&config.perplexity_base_url),
        )),
        AiProviderKind::Gemini => Box::new(
            GeminiProvider::new(client, api_key).with_base_url(&config.gemini_base_url),
        ),
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map a non-success vendor status to an application error
pub(crate) fn map_status_error(provider: &str, status: StatusCode, message: &str) -> AppError {
    match status.as_u16() {
        401 | 403 => AppError::new(
            ErrorCode::ExternalAuthFailed,
            format!("{provider} rejected the API key: {message}"),
        ),
        429 => AppError::new(ErrorCode::ExternalRateLimited, rate_limit_message(provider, message)),
        400 => AppError::invalid_input(format!("{provider} rejected the request: {message}")),
        _ => AppError::external_service(provider, format!("API error ({status}): {message}")),
    }
}

/// Map a transport failure (timeout, DNS, refused connection)
pub(crate) fn map_transport_error(provider: &str, error: &reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::new(
            ErrorCode::ExternalServiceUnavailable,
            format!("{provider} did not respond in time"),
        )
    } else if error.is_connect() {
        AppError::new(
            ErrorCode::ExternalServiceUnavailable,
            format!("Cannot connect to {provider}"),
        )
    } else {
        AppError::external_service(provider, format!("Request failed: {error}"))
    }
}

/// Error for output withheld by a vendor's content filter
pub(crate) fn content_blocked(provider: &str, reason: &str) -> AppError {
    AppError::external_service(
        provider,
        format!("The response was blocked by the provider's safety filters ({reason})"),
    )
}

/// Turn a vendor rate-limit message into one the user can act on
///
/// Recognizes `try again in 20s` / `Please retry in 6.4s` hints.
fn rate_limit_message(provider: &str, message: &str) -> String {
    let lower = message.to_lowercase();
    let hint = ["try again in ", "retry in "]
        .iter()
        .find_map(|marker| lower.find(marker).map(|pos| &lower[pos + marker.len()..]));

    if let Some(after) = hint {
        let number: String = after
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if let Ok(seconds) = number.parse::<f64>() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let seconds = seconds.ceil() as u64;
            return format!("{provider} rate limit reached. Please try again in {seconds} seconds.");
        }
    }
    format!("{provider} rate limit reached. Please wait a moment and try again.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let auth = map_status_error("OpenAI", StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(auth.code, ErrorCode::ExternalAuthFailed);

        let limited = map_status_error("OpenAI", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(limited.code, ErrorCode::ExternalRateLimited);

        let invalid = map_status_error("Gemini", StatusCode::BAD_REQUEST, "bad field");
        assert_eq!(invalid.code, ErrorCode::InvalidInput);

        let other = map_status_error("Perplexity", StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert_eq!(other.code, ErrorCode::ExternalServiceError);
        assert!(other.message.contains("oops"));
    }

    #[test]
    fn test_rate_limit_message_extracts_retry_hint() {
        assert_eq!(
            rate_limit_message("Gemini", "Quota hit. Please retry in 6.406453963s."),
            "Gemini rate limit reached. Please try again in 7 seconds."
        );
        assert_eq!(
            rate_limit_message("OpenAI", "Rate limit reached. Try again in 20s."),
            "OpenAI rate limit reached. Please try again in 20 seconds."
        );
        assert!(rate_limit_message("OpenAI", "nope").contains("wait a moment"));
    }
}
