// ABOUTME: Repurposing orchestration from a stored content piece to persisted snippet groups
// ABOUTME: Chooses the rule engine or AI delegation, applies persona and template, stores parts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use recast_core::constants::limits::MAX_NAME_CHARS;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use recast_core::models::{AiProviderKind, GenerationMethod, Platform};
use recast_repurpose::{strip_ordinal_suffix, RuleEngine, RuleOutput, SourceContent};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::ai_delegation::{
    split_thread_output, AiDelegator, AiTask, DelegationOutcome, PromptContext,
};
use crate::database::{
    ContentManager, Database, NewSnippetGroup, PersonasManager, SnippetUpdate, SnippetsManager,
    TemplatesManager,
};
use crate::models::{AudiencePersona, ContentPiece, RepurposedSnippet, SnippetTemplate};

/// Body of `POST /api/content/{id}/repurpose`
#[derive(Debug, Clone, Deserialize)]
pub struct RepurposeRequest {
    /// Target platform
    pub platform: Platform,
    /// Rule engine or AI
    #[serde(default)]
    pub method: GenerationMethod,
    /// Vendor for AI generation
    pub provider: Option<AiProviderKind>,
    /// Audience persona (AI only)
    pub persona_id: Option<Uuid>,
    /// Own or public template
    pub template_id: Option<Uuid>,
    /// Voice override (AI only)
    pub tone: Option<String>,
}

/// Outcome of a repurposing run
#[derive(Debug, Clone, Serialize)]
pub struct RepurposeResult {
    /// Group shared by the stored parts; absent when nothing was generated
    pub group_id: Option<Uuid>,
    /// Target platform
    pub platform: Platform,
    /// How the parts were produced
    pub method: GenerationMethod,
    /// Stored parts in order
    pub snippets: Vec<RepurposedSnippet>,
    /// Explanation when no parts were produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Turns content into stored snippet groups
pub struct RepurposeService<'a> {
    database: &'a Database,
    delegator: &'a AiDelegator,
    engine: RuleEngine,
}

impl<'a> RepurposeService<'a> {
    /// Create a service over the shared database and AI delegator
    #[must_use]
    pub fn new(database: &'a Database, delegator: &'a AiDelegator) -> Self {
        Self {
            database,
            delegator,
            engine: RuleEngine::default(),
        }
    }

    /// Generate and store snippets for one content piece
    ///
    /// # Errors
    ///
    /// - `RESOURCE_NOT_FOUND` if the content, persona or template is not usable by the user
    /// - `INVALID_INPUT` for a template of another platform or AI without a provider
    /// - `EXTERNAL_SERVICE_ERROR` with the vendor message when AI generation fails
    #[instrument(skip(self, request), fields(platform = request.platform.as_str()))]
    pub async fn repurpose(
        &self,
        user_id: Uuid,
        content_id: Uuid,
        request: RepurposeRequest,
    ) -> AppResult<RepurposeResult> {
        let pool = self.database.pool().clone();
        let content = ContentManager::new(pool.clone())
            .get(user_id, content_id)
            .await?
            .ok_or_else(|| AppError::not_found("Content"))?;

        let persona = match request.persona_id {
            Some(id) => Some(
                PersonasManager::new(pool.clone())
                    .get(user_id, id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Persona"))?,
            ),
            None => None,
        };

        let template = match request.template_id {
            Some(id) => {
                let template = TemplatesManager::new(pool.clone())
                    .get_usable(user_id, id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Template"))?;
                if template.platform != request.platform {
                    return Err(AppError::invalid_input(format!(
                        "Template '{}' is for {}, not {}",
                        template.name, template.platform, request.platform
                    )));
                }
                Some(template)
            }
            None => None,
        };

        let tone = validate_tone(request.tone.as_deref())?;

        let (output, provider) = match request.method {
            GenerationMethod::RuleBased => {
                (self.generate_rule_based(&content, request.platform, template.as_ref()), None)
            }
            GenerationMethod::Ai => {
                let provider = request.provider.ok_or_else(|| {
                    AppError::new(
                        ErrorCode::MissingRequiredField,
                        "provider is required for AI generation",
                    )
                })?;
                let context = PromptContext {
                    persona: persona.as_ref(),
                    template: template.as_ref(),
                    tone,
                };
                let output = self
                    .generate_ai(user_id, &content, request.platform, provider, &context)
                    .await?;
                (output, Some(provider))
            }
        };

        if output.parts.is_empty() {
            return Ok(RepurposeResult {
                group_id: None,
                platform: request.platform,
                method: request.method,
                snippets: Vec::new(),
                notice: output.notice,
            });
        }

        let (group_id, snippets) = SnippetsManager::new(pool)
            .create_group(
                user_id,
                NewSnippetGroup {
                    content_id,
                    platform: request.platform,
                    method: request.method,
                    provider,
                    parts: output.parts,
                },
            )
            .await?;

        info!(
            %group_id,
            parts = snippets.len(),
            method = request.method.as_str(),
            "Stored repurposed snippets"
        );

        Ok(RepurposeResult {
            group_id: Some(group_id),
            platform: request.platform,
            method: request.method,
            snippets,
            notice: None,
        })
    }

    fn generate_rule_based(
        &self,
        content: &ContentPiece,
        platform: Platform,
        template: Option<&SnippetTemplate>,
    ) -> RuleOutput {
        let source = source_of(content);
        match template {
            Some(template) => self
                .engine
                .generate_with_template(platform, &source, &template.body),
            None => self.engine.generate(platform, &source),
        }
    }

    async fn generate_ai(
        &self,
        user_id: Uuid,
        content: &ContentPiece,
        platform: Platform,
        provider: AiProviderKind,
        context: &PromptContext<'_>,
    ) -> AppResult<RuleOutput> {
        let keys = self.database.get_provider_keys(user_id).await?;
        let task = AiTask::for_platform(platform);
        let input = format!("{}\n\n{}", content.title.trim(), content.original_text.trim());

        let result = completed_text(
            self.delegator
                .delegate(&task, provider, &keys, &input, context)
                .await,
        )?;

        let parts = if platform.is_multi_part() {
            split_thread_output(&result, self.engine.chunker())
        } else {
            vec![result]
        };
        Ok(RuleOutput {
            parts,
            notice: None,
        })
    }

    /// Rewrite one stored snippet in another tone, keeping any ` (i/N)` suffix
    ///
    /// # Errors
    ///
    /// - `RESOURCE_NOT_FOUND` if the snippet is not the user's
    /// - `INVALID_INPUT` for an empty or overlong tone
    /// - `EXTERNAL_SERVICE_ERROR` with the vendor message when the rewrite fails
    pub async fn rewrite_snippet(
        &self,
        user_id: Uuid,
        snippet_id: Uuid,
        provider: AiProviderKind,
        tone: &str,
    ) -> AppResult<RepurposedSnippet> {
        let tone = validate_tone(Some(tone))?
            .ok_or_else(|| AppError::new(ErrorCode::MissingRequiredField, "tone is required"))?;

        let snippets = SnippetsManager::new(self.database.pool().clone());
        let snippet = snippets
            .get(user_id, snippet_id)
            .await?
            .ok_or_else(|| AppError::not_found("Snippet"))?;

        let core = strip_ordinal_suffix(&snippet.text);
        let suffix = &snippet.text[core.len()..];

        let keys = self.database.get_provider_keys(user_id).await?;
        let task = AiTask::RewriteWithTone {
            tone: tone.to_owned(),
        };
        let rewritten = completed_text(
            self.delegator
                .delegate(&task, provider, &keys, core, &PromptContext::default())
                .await,
        )?;

        snippets
            .update(
                user_id,
                snippet_id,
                SnippetUpdate {
                    text: Some(format!("{rewritten}{suffix}")),
                    status: None,
                },
            )
            .await
    }

    /// Run a free-form AI task for the user, returning the normalized outcome
    ///
    /// # Errors
    ///
    /// Returns an error only if the user's keys or persona cannot be loaded
    pub async fn run_task(
        &self,
        user_id: Uuid,
        task: &AiTask,
        provider: AiProviderKind,
        input: &str,
        persona: Option<&AudiencePersona>,
    ) -> AppResult<DelegationOutcome> {
        let keys = self.database.get_provider_keys(user_id).await?;
        let context = PromptContext {
            persona,
            ..PromptContext::default()
        };
        Ok(self
            .delegator
            .delegate(task, provider, &keys, input, &context)
            .await)
    }
}

fn source_of(content: &ContentPiece) -> SourceContent<'_> {
    SourceContent {
        title: &content.title,
        text: &content.original_text,
        tags: &content.tags,
    }
}

fn completed_text(outcome: DelegationOutcome) -> AppResult<String> {
    match outcome {
        DelegationOutcome::Completed { result, .. } => Ok(result),
        DelegationOutcome::Failed { error } => {
            Err(AppError::new(ErrorCode::ExternalServiceError, error))
        }
    }
}

fn validate_tone(tone: Option<&str>) -> AppResult<Option<&str>> {
    let Some(tone) = tone.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if tone.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::new(
            ErrorCode::ValueOutOfRange,
            format!("tone must be at most {MAX_NAME_CHARS} characters"),
        ));
    }
    Ok(Some(tone))
}
