// ABOUTME: Snippet route handlers for manual edits, deletion and AI tone rewrites
// ABOUTME: Rewrites keep the part's ordinal suffix so threads stay numbered
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use recast_core::constants::limits::MAX_CONTENT_CHARS;
use recast_core::errors::AppError;
use recast_core::models::{AiProviderKind, SnippetStatus};
use serde::Deserialize;

use super::{deleted_or_not_found, parse_id};
use crate::database::{SnippetUpdate, SnippetsManager};
use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::services::RepurposeService;
use crate::validation;

/// Body of `PUT /api/snippets/{id}`
#[derive(Debug, Deserialize)]
pub struct UpdateSnippetRequest {
    /// Replacement text
    #[serde(default)]
    pub text: Option<String>,
    /// New status
    #[serde(default)]
    pub status: Option<SnippetStatus>,
}

/// Body of `POST /api/snippets/{id}/rewrite`
#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    /// Vendor to use
    pub provider: AiProviderKind,
    /// Target tone
    pub tone: String,
}

/// Snippet routes
pub struct SnippetRoutes;

impl SnippetRoutes {
    /// Create all snippet routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/snippets/:id",
                put(Self::handle_update).delete(Self::handle_delete),
            )
            .route("/api/snippets/:id/rewrite", post(Self::handle_rewrite))
            .with_state(resources)
    }

    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(request): Json<UpdateSnippetRequest>,
    ) -> Result<Response, AppError> {
        let snippet_id = parse_id(&id, "Snippet")?;
        let update = SnippetUpdate {
            text: request
                .text
                .as_deref()
                .map(|text| validation::required_text("text", text, MAX_CONTENT_CHARS))
                .transpose()?,
            status: request.status,
        };
        let snippet = SnippetsManager::new(resources.database.pool().clone())
            .update(auth.user_id, snippet_id, update)
            .await?;
        Ok((StatusCode::OK, Json(snippet)).into_response())
    }

    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let snippet_id = parse_id(&id, "Snippet")?;
        let deleted = SnippetsManager::new(resources.database.pool().clone())
            .delete(auth.user_id, snippet_id)
            .await?;
        deleted_or_not_found(deleted, "Snippet")
    }

    async fn handle_rewrite(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(request): Json<RewriteRequest>,
    ) -> Result<Response, AppError> {
        let snippet_id = parse_id(&id, "Snippet")?;
        let snippet = RepurposeService::new(&resources.database, &resources.delegator)
            .rewrite_snippet(auth.user_id, snippet_id, request.provider, &request.tone)
            .await?;
        Ok((StatusCode::OK, Json(snippet)).into_response())
    }
}
