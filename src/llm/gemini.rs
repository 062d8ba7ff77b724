// ABOUTME: Google Gemini provider using the generateContent REST endpoint
// ABOUTME: Sends system prompts via system_instruction and surfaces safety blocks as errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use recast_core::constants::llm::{GEMINI_API_BASE, GEMINI_DEFAULT_MODEL};
use recast_core::errors::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use zeroize::Zeroizing;

use super::{
    content_blocked, map_status_error, map_transport_error, ChatMessage, ChatRequest,
    ChatResponse, LlmProvider, MessageRole, TokenUsage,
};

const DISPLAY_NAME: &str = "Gemini";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "candidateCount")]
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Google Gemini LLM provider
pub struct GeminiProvider {
    api_key: Zeroizing<String>,
    client: Client,
    base_url: String,
    default_model: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with an API key
    #[must_use]
    pub fn new(client: Client, api_key: Zeroizing<String>) -> Self {
        Self {
            api_key,
            client,
            base_url: GEMINI_API_BASE.to_owned(),
            default_model: GEMINI_DEFAULT_MODEL.to_owned(),
        }
    }

    /// Point the provider at another endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        base_url.clone_into(&mut self.base_url);
        self
    }

    /// Set a custom default model
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn build_url(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }

    /// System messages are merged into `system_instruction`; assistant turns map to `model`
    fn build_request(request: &ChatRequest) -> GeminiRequest {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for ChatMessage { role, content } in &request.messages {
            match role {
                MessageRole::System => system_parts.push(TextPart {
                    text: content.clone(),
                }),
                MessageRole::User | MessageRole::Assistant => contents.push(GeminiContent {
                    role: Some(
                        if *role == MessageRole::Assistant {
                            "model"
                        } else {
                            "user"
                        }
                        .to_owned(),
                    ),
                    parts: vec![TextPart {
                        text: content.clone(),
                    }],
                }),
            }
        }

        let generation_config = (request.temperature.is_some() || request.max_tokens.is_some())
            .then_some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                candidate_count: 1,
            });

        GeminiRequest {
            contents,
            system_instruction: (!system_parts.is_empty()).then_some(GeminiContent {
                role: None,
                parts: system_parts,
            }),
            generation_config,
        }
    }

    fn extract_content(
        response: GeminiResponse,
    ) -> AppResult<(String, Option<String>, Option<TokenUsage>)> {
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(content_blocked(DISPLAY_NAME, &reason));
        }

        let usage = response.usage_metadata.map(|m| TokenUsage {
            prompt_tokens: m.prompt.unwrap_or(0),
            completion_tokens: m.candidates.unwrap_or(0),
            total_tokens: m.total.unwrap_or(0),
        });

        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| AppError::external_service(DISPLAY_NAME, "No candidates in response"))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(content_blocked(DISPLAY_NAME, "SAFETY"));
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AppError::external_service(
                DISPLAY_NAME,
                "API returned empty content",
            ));
        }

        Ok((text, candidate.finish_reason, usage))
    }

    fn map_api_error(status: reqwest::StatusCode, body: &str) -> AppError {
        let message = serde_json::from_str::<GeminiResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| body.chars().take(200).collect(), |e| e.message);
        map_status_error(DISPLAY_NAME, status, &message)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    #[instrument(skip(self, request), fields(provider = "gemini"))]
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = Self::build_request(request);

        debug!("Sending request to Gemini API");

        let response = self
            .client
            .post(self.build_url(model))
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(DISPLAY_NAME, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(DISPLAY_NAME, &e))?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(Self::map_api_error(status, &text));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response");
            AppError::external_service(DISPLAY_NAME, format!("Failed to parse response: {e}"))
        })?;

        if let Some(error) = parsed.error {
            return Err(AppError::external_service(DISPLAY_NAME, error.message));
        }

        let (content, finish_reason, usage) = Self::extract_content(parsed)?;
        Ok(ChatResponse {
            content,
            model: model.to_owned(),
            usage,
            finish_reason,
        })
    }
}

impl Debug for GeminiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_core::errors::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_system_messages_move_to_system_instruction() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("Summarize this."),
        ])
        .with_max_tokens(128);

        let body = serde_json::to_value(GeminiProvider::build_request(&request)).unwrap();
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generation_config"]["maxOutputTokens"], 128);
    }

    #[test]
    fn test_safety_block_is_an_error() {
        let blocked: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = GeminiProvider::extract_content(blocked).unwrap_err();
        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        assert!(err.message.contains("safety filters"));

        let finished: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY", "content": {"parts": []}}]
        }))
        .unwrap();
        assert!(GeminiProvider::extract_content(finished).is_err());
    }

    #[test]
    fn test_text_parts_are_joined() {
        let ok: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "finishReason": "STOP",
                "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "world"}]}
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
        }))
        .unwrap();
        let (text, reason, usage) = GeminiProvider::extract_content(ok).unwrap();
        assert_eq!(text, "Hello world");
        assert_eq!(reason.as_deref(), Some("STOP"));
        assert_eq!(usage.unwrap().total_tokens, 5);
    }
}
