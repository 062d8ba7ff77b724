// ABOUTME: Dispatches logical AI tasks to the user's chosen LLM vendor with their own key
// ABOUTME: Builds prompts and token budgets, and normalizes every outcome to result-or-error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # AI Delegation
//!
//! The delegator never lets vendor errors escape as errors: every call ends in
//! a [`DelegationOutcome`], which serializes to `{"result": ...}` or
//! `{"error": ...}`. There is one request per task, with no retry and no
//! fallback to another vendor.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use recast_core::constants::llm::TOKENS_PER_WORD;
use recast_core::models::{AiProviderKind, Platform};
use recast_repurpose::segment::word_count;
use recast_repurpose::{number_segments, strip_ordinal_suffix, ThreadChunker};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::LlmConfig;
use crate::llm::{provider_for, ChatMessage, ChatRequest, LlmProvider, TokenUsage};
use crate::models::{AudiencePersona, SnippetTemplate};

/// Decrypted API keys by vendor
pub type ProviderKeys = HashMap<AiProviderKind, Zeroizing<String>>;

/// Upper bound on generated headlines
pub const MAX_HEADLINES: u8 = 10;

/// Logical generation tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum AiTask {
    /// Short prose summary
    Summarize,
    /// Numbered tweet thread
    TwitterThread,
    /// `LinkedIn` post
    #[serde(rename = "linkedin_post")]
    LinkedInPost,
    /// Bulleted key takeaways
    KeyPoints,
    /// Newsletter section
    Newsletter,
    /// Same content in a different voice
    RewriteWithTone {
        /// Target tone, e.g. "playful" or "formal"
        tone: String,
    },
    /// Alternative titles
    Headlines {
        /// How many headlines to propose
        count: u8,
    },
}

/// Output-token heuristic for one task
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenProfile {
    /// Output tokens per estimated input token
    pub multiplier: f64,
    /// Lower clamp
    pub min: u32,
    /// Upper clamp
    pub max: u32,
}

impl AiTask {
    /// Task producing snippets for `platform`
    #[must_use]
    pub const fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::TwitterThread => Self::TwitterThread,
            Platform::LinkedinPost => Self::LinkedInPost,
            Platform::Summary => Self::Summarize,
            Platform::KeyPoints => Self::KeyPoints,
            Platform::Newsletter => Self::Newsletter,
        }
    }

    /// Stable task name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::TwitterThread => "twitter_thread",
            Self::LinkedInPost => "linkedin_post",
            Self::KeyPoints => "key_points",
            Self::Newsletter => "newsletter",
            Self::RewriteWithTone { .. } => "rewrite_with_tone",
            Self::Headlines { .. } => "headlines",
        }
    }

    /// Whether the output is post-processed into thread parts
    #[must_use]
    pub const fn is_thread(&self) -> bool {
        matches!(self, Self::TwitterThread)
    }

    /// Token heuristic for this task
    #[must_use]
    pub const fn token_profile(&self) -> TokenProfile {
        let (multiplier, min, max) = match self {
            Self::Summarize => (0.4, 96, 512),
            Self::TwitterThread => (1.0, 256, 2048),
            Self::LinkedInPost => (0.8, 256, 1024),
            Self::KeyPoints => (0.5, 128, 768),
            Self::Newsletter => (1.2, 512, 4096),
            Self::RewriteWithTone { .. } => (1.3, 128, 8192),
            Self::Headlines { .. } => (0.1, 64, 512),
        };
        TokenProfile {
            multiplier,
            min,
            max,
        }
    }

    /// Output token budget for `input` sent to `provider`
    ///
    /// `ceil(ceil(words * 1.5) * multiplier)`, clamped to the task range and
    /// capped at the vendor's output limit.
    #[must_use]
    pub fn max_output_tokens(&self, input: &str, provider: AiProviderKind) -> u32 {
        let profile = self.token_profile();
        #[allow(clippy::cast_precision_loss)]
        let estimated_input = (word_count(input) as f64 * TOKENS_PER_WORD).ceil();
        let raw = (estimated_input * profile.multiplier).ceil();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let raw = raw.min(f64::from(u32::MAX)) as u32;
        raw.clamp(profile.min, profile.max)
            .min(provider.max_output_tokens())
    }

    /// System prompt including persona and template guidance
    #[must_use]
    pub fn system_prompt(&self, context: &PromptContext<'_>) -> String {
        let mut prompt = String::from(
            "You are an expert content strategist who repurposes long-form writing \
             for social platforms. Preserve the author's facts and meaning. Never invent \
             statistics, quotes or links. Reply with the requested text only, without \
             preamble or commentary.",
        );

        let instructions = match self {
            Self::Summarize => {
                "Write a concise summary of three to five sentences in plain prose.".to_owned()
            }
            Self::TwitterThread => "Write a Twitter/X thread. Number every tweet on its own \
                 line as `1/`, `2/`, ... Keep each tweet under 260 characters. Open with a hook \
                 and end with a takeaway."
                .to_owned(),
            Self::LinkedInPost => "Write a LinkedIn post: a one-line hook, two or three short \
                 paragraphs, and a closing question that invites comments. Stay under 3000 \
                 characters."
                .to_owned(),
            Self::KeyPoints => "List the key points as at most seven bullets starting with `• `, \
                 one line each."
                .to_owned(),
            Self::Newsletter => "Write a newsletter section in Markdown: a heading, a short \
                 introduction, the main points as bullets, and a closing line."
                .to_owned(),
            Self::RewriteWithTone { tone } => format!(
                "Rewrite the text in a {} tone. Keep its length and structure roughly the same.",
                tone.trim()
            ),
            Self::Headlines { count } => format!(
                "Propose {} distinct headlines, one per line, without numbering or quotes.",
                (*count).clamp(1, MAX_HEADLINES)
            ),
        };
        prompt.push_str("\n\n");
        prompt.push_str(&instructions);

        if let Some(tone) = context.tone.map(str::trim).filter(|t| !t.is_empty()) {
            let _ = write!(prompt, "\n\nUse a {tone} tone throughout.");
        }

        if let Some(persona) = context.persona {
            prompt.push_str("\n\nWrite for this audience persona:");
            for (label, value) in [
                ("Persona", Some(persona.name.as_str())),
                ("Description", persona.description.as_deref()),
                ("Audience", persona.audience.as_deref()),
                ("Tone", persona.tone.as_deref()),
                ("Goals", persona.goals.as_deref()),
            ] {
                if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                    let _ = write!(prompt, "\n- {label}: {value}");
                }
            }
        }

        if let Some(template) = context.template {
            let _ = write!(
                prompt,
                "\n\nFollow the structure of this template. `{{{{content}}}}` marks where the \
                 generated text goes; keep any other text as written.\n---\n{}\n---",
                template.body.trim()
            );
        }
        prompt
    }

    /// User prompt wrapping the input text
    #[must_use]
    pub fn user_prompt(&self, input: &str) -> String {
        let verb = match self {
            Self::RewriteWithTone { .. } => "Rewrite",
            Self::Headlines { .. } => "Write headlines for",
            _ => "Repurpose",
        };
        format!("{verb} the following text:\n\n{}", input.trim())
    }
}

/// Optional prompt enrichments
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptContext<'a> {
    /// Audience persona
    pub persona: Option<&'a AudiencePersona>,
    /// Structural template
    pub template: Option<&'a SnippetTemplate>,
    /// Voice override, e.g. "witty"
    pub tone: Option<&'a str>,
}

/// Normalized result of one delegated call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DelegationOutcome {
    /// The vendor produced text
    Completed {
        /// Generated text
        result: String,
        /// Model that produced it
        model: String,
        /// Token accounting when reported
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },
    /// The call failed; `error` is safe to show to the user verbatim
    Failed {
        /// User-facing error message
        error: String,
    },
}

impl DelegationOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Whether the call succeeded
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Message for a vendor with no stored key
#[must_use]
pub fn missing_key_message(provider: AiProviderKind) -> String {
    format!(
        "{} API key is not configured. Add it in your settings.",
        provider.display_name()
    )
}

/// Dispatches tasks to vendors
#[derive(Debug, Clone)]
pub struct AiDelegator {
    client: Client,
    config: LlmConfig,
}

impl AiDelegator {
    /// Create a delegator sharing one HTTP client across calls
    #[must_use]
    pub const fn new(client: Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Run `task` on `input` with the user's key for `provider`
    pub async fn delegate(
        &self,
        task: &AiTask,
        provider: AiProviderKind,
        keys: &ProviderKeys,
        input: &str,
        context: &PromptContext<'_>,
    ) -> DelegationOutcome {
        let Some(key) = keys.get(&provider) else {
            return DelegationOutcome::failed(missing_key_message(provider));
        };
        let llm = provider_for(provider, key.clone(), self.client.clone(), &self.config);
        delegate_with(llm.as_ref(), provider, task, input, context).await
    }
}

/// Run `task` against an already constructed provider
pub async fn delegate_with(
    llm: &dyn LlmProvider,
    provider: AiProviderKind,
    task: &AiTask,
    input: &str,
    context: &PromptContext<'_>,
) -> DelegationOutcome {
    if input.trim().is_empty() {
        return DelegationOutcome::failed("There is no text to send to the AI provider.");
    }

    let max_tokens = task.max_output_tokens(input, provider);
    let request = ChatRequest::new(vec![
        ChatMessage::system(task.system_prompt(context)),
        ChatMessage::user(task.user_prompt(input)),
    ])
    .with_temperature(0.7)
    .with_max_tokens(max_tokens);

    match llm.complete(&request).await {
        Ok(response) => {
            info!(
                task = task.name(),
                provider = llm.name(),
                model = %response.model,
                max_tokens,
                "AI task completed"
            );
            DelegationOutcome::Completed {
                result: response.content.trim().to_owned(),
                model: response.model,
                usage: response.usage,
            }
        }
        Err(e) => {
            warn!(
                task = task.name(),
                provider = llm.name(),
                code = ?e.code,
                "AI task failed: {}",
                e.message
            );
            DelegationOutcome::failed(e.message)
        }
    }
}

static NUMBERED_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\s*(?:/\s*\d+|[/.)])\s+").ok());

/// Split AI thread output into numbered tweet parts
///
/// Parts start at lines numbered `1/`, `1.`, `1)` or `1/5`. Without numbering
/// the text is split on blank lines. Any part still over the budget is
/// re-chunked, and the parts are then suffixed ` (i/N)`.
#[must_use]
pub fn split_thread_output(text: &str, chunker: &ThreadChunker) -> Vec<String> {
    let mut parts = numbered_parts(text);
    if parts.len() < 2 {
        parts = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();
    }

    let cores: Vec<String> = parts
        .iter()
        .map(|part| strip_ordinal_suffix(part.trim()).trim().to_owned())
        .filter(|part| !part.is_empty())
        .flat_map(|part| {
            if part.chars().count() > chunker.budget() {
                chunker.chunk_cores(&part)
            } else {
                vec![part]
            }
        })
        .collect();

    number_segments(cores)
}

fn numbered_parts(text: &str) -> Vec<String> {
    let Some(pattern) = NUMBERED_LINE.as_ref() else {
        return Vec::new();
    };
    let mut parts: Vec<String> = Vec::new();
    for line in text.lines() {
        if let Some(found) = pattern.find(line) {
            parts.push(line[found.end()..].trim().to_owned());
        } else if let Some(current) = parts.last_mut() {
            let line = line.trim();
            if !line.is_empty() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(line);
            }
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use recast_core::errors::{AppError, AppResult, ErrorCode};
    use uuid::Uuid;

    use crate::llm::ChatResponse;

    struct FixedProvider(AppResult<String>);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn display_name(&self) -> &'static str {
            "Fixed"
        }
        fn default_model(&self) -> &str {
            "fixed-1"
        }
        async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
            assert!(request.max_tokens.is_some());
            self.0
                .as_ref()
                .map(|content| ChatResponse {
                    content: content.clone(),
                    model: "fixed-1".to_owned(),
                    usage: None,
                    finish_reason: Some("stop".to_owned()),
                })
                .map_err(|e| AppError::new(e.code, e.message.clone()))
        }
    }

    #[test]
    fn test_token_budget_is_clamped() {
        let task = AiTask::Summarize;
        assert_eq!(task.max_output_tokens("one two three", AiProviderKind::OpenAi), 96);

        let long = "word ".repeat(2000);
        assert_eq!(task.max_output_tokens(&long, AiProviderKind::OpenAi), 512);

        // 1000 words -> 1500 tokens -> 1950 with the rewrite multiplier
        let medium = "word ".repeat(1000);
        let rewrite = AiTask::RewriteWithTone {
            tone: "formal".to_owned(),
        };
        assert_eq!(rewrite.max_output_tokens(&medium, AiProviderKind::Gemini), 1950);

        let huge = "word ".repeat(10_000);
        assert_eq!(rewrite.max_output_tokens(&huge, AiProviderKind::OpenAi), 4096);
        assert_eq!(rewrite.max_output_tokens(&huge, AiProviderKind::Gemini), 8192);
    }

    #[test]
    fn test_prompt_includes_persona_and_template() {
        let now = Utc::now();
        let persona = AudiencePersona {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Founders".to_owned(),
            description: None,
            audience: Some("early-stage SaaS founders".to_owned()),
            tone: Some("direct".to_owned()),
            goals: None,
            created_at: now,
            updated_at: now,
        };
        let template = SnippetTemplate {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Hook".to_owned(),
            platform: Platform::LinkedinPost,
            body: "Hot take: {{content}}".to_owned(),
            description: None,
            is_public: false,
            use_count: 0,
            source_template_id: None,
            created_at: now,
            updated_at: now,
        };
        let prompt = AiTask::LinkedInPost.system_prompt(&PromptContext {
            persona: Some(&persona),
            template: Some(&template),
            tone: Some("candid"),
        });
        assert!(prompt.contains("Audience: early-stage SaaS founders"));
        assert!(prompt.contains("Tone: direct"));
        assert!(!prompt.contains("Goals:"));
        assert!(prompt.contains("Hot take: {{content}}"));
        assert!(prompt.contains("`{{content}}` marks"));
        assert!(prompt.contains("Use a candid tone throughout."));
    }

    #[test]
    fn test_task_wire_format() {
        let task: AiTask =
            serde_json::from_str(r#"{"task":"rewrite_with_tone","tone":"playful"}"#).unwrap();
        assert_eq!(
            task,
            AiTask::RewriteWithTone {
                tone: "playful".to_owned()
            }
        );
        let task: AiTask = serde_json::from_str(r#"{"task":"linkedin_post"}"#).unwrap();
        assert_eq!(task, AiTask::LinkedInPost);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let delegator = AiDelegator::new(Client::new(), LlmConfig::default());
        let outcome = delegator
            .delegate(
                &AiTask::Summarize,
                AiProviderKind::Perplexity,
                &ProviderKeys::new(),
                "Some text.",
                &PromptContext::default(),
            )
            .await;
        assert_eq!(
            outcome,
            DelegationOutcome::Failed {
                error: "Perplexity API key is not configured. Add it in your settings.".to_owned()
            }
        );
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({
                "error": "Perplexity API key is not configured. Add it in your settings."
            })
        );
    }

    #[tokio::test]
    async fn test_vendor_errors_are_normalized() {
        let failing = FixedProvider(Err(AppError::new(
            ErrorCode::ExternalRateLimited,
            "Fixed rate limit reached. Please wait a moment and try again.",
        )));
        let outcome = delegate_with(
            &failing,
            AiProviderKind::OpenAi,
            &AiTask::Summarize,
            "Text to summarize.",
            &PromptContext::default(),
        )
        .await;
        assert_eq!(
            outcome,
            DelegationOutcome::Failed {
                error: "Fixed rate limit reached. Please wait a moment and try again.".to_owned()
            }
        );

        let ok = FixedProvider(Ok("  A summary.  ".to_owned()));
        let outcome = delegate_with(
            &ok,
            AiProviderKind::OpenAi,
            &AiTask::Summarize,
            "Text to summarize.",
            &PromptContext::default(),
        )
        .await;
        assert!(outcome.is_completed());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap()["result"],
            "A summary."
        );
    }

    #[test]
    fn test_split_numbered_thread() {
        let output = "1/ Hooks matter.\nReally.\n\n2/ Keep it short.\n3. End strong (3/3)";
        let parts = split_thread_output(output, &ThreadChunker::default());
        assert_eq!(
            parts,
            vec![
                "Hooks matter. Really. (1/3)",
                "Keep it short. (2/3)",
                "End strong (3/3)",
            ]
        );
    }

    #[test]
    fn test_split_unnumbered_thread_and_rechunk_long_parts() {
        let long = "This sentence is padding. ".repeat(20);
        let output = format!("First tweet.\n\n{long}");
        let parts = split_thread_output(&output, &ThreadChunker::default());
        assert!(parts.len() > 2);
        assert!(parts[0].starts_with("First tweet."));
        assert!(parts.iter().all(|p| p.chars().count() <= 280));
        let total = parts.len();
        assert!(parts[total - 1].ends_with(&format!("({total}/{total})")));
    }
}
