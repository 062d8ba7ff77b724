// ABOUTME: Free-form AI task route: run one task on caller-supplied text
// ABOUTME: Answers the normalized outcome, 200 on success and 502 when the vendor failed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use recast_core::constants::limits::MAX_CONTENT_CHARS;
use recast_core::errors::{AppError, ErrorCode};
use recast_core::models::AiProviderKind;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::database::PersonasManager;
use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::services::ai_delegation::MAX_HEADLINES;
use crate::services::{AiTask, RepurposeService};
use crate::validation;

/// Body of `POST /api/ai/run`
///
/// The task is inlined: `{"task": "headlines", "count": 5, "provider": "openai", "input": "..."}`
#[derive(Debug, Deserialize)]
pub struct RunTaskRequest {
    /// Task and its parameters
    #[serde(flatten)]
    pub task: AiTask,
    /// Vendor
    pub provider: AiProviderKind,
    /// Text to work on
    pub input: String,
    /// Optional audience persona
    #[serde(default)]
    pub persona_id: Option<Uuid>,
}

/// AI task routes
pub struct AiRoutes;

impl AiRoutes {
    /// Create all AI routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/ai/run", post(Self::handle_run))
            .with_state(resources)
    }

    fn validate_task(task: &AiTask) -> Result<(), AppError> {
        match task {
            AiTask::Headlines { count } if *count == 0 || *count > MAX_HEADLINES => {
                Err(AppError::new(
                    ErrorCode::ValueOutOfRange,
                    format!("count must be between 1 and {MAX_HEADLINES}"),
                ))
            }
            AiTask::RewriteWithTone { tone } if tone.trim().is_empty() => Err(AppError::new(
                ErrorCode::MissingRequiredField,
                "tone is required",
            )),
            _ => Ok(()),
        }
    }

    async fn handle_run(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Json(request): Json<RunTaskRequest>,
    ) -> Result<Response, AppError> {
        Self::validate_task(&request.task)?;
        let input = validation::required_text("input", &request.input, MAX_CONTENT_CHARS)?;

        let persona = match request.persona_id {
            Some(id) => Some(
                PersonasManager::new(resources.database.pool().clone())
                    .get(auth.user_id, id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Persona"))?,
            ),
            None => None,
        };

        let outcome = RepurposeService::new(&resources.database, &resources.delegator)
            .run_task(
                auth.user_id,
                &request.task,
                request.provider,
                &input,
                persona.as_ref(),
            )
            .await?;

        info!(
            user_id = %auth.user_id,
            task = request.task.name(),
            provider = request.provider.as_str(),
            completed = outcome.is_completed(),
            "Ran AI task"
        );
        let status = if outcome.is_completed() {
            StatusCode::OK
        } else {
            StatusCode::BAD_GATEWAY
        };
        Ok((status, Json(outcome)).into_response())
    }
}
