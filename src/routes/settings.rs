// ABOUTME: Settings route handlers for per-user LLM API keys
// ABOUTME: Keys are encrypted at rest and only ever returned as a masked hint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use recast_core::errors::{AppError, ErrorCode};
use recast_core::models::AiProviderKind;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::deleted_or_not_found;
use crate::middleware::AuthUser;
use crate::resources::ServerResources;

/// Upper bound on a stored vendor key
const MAX_API_KEY_CHARS: usize = 512;

/// Body of `PUT /api/settings/api-keys/{provider}`
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    /// Vendor API key
    pub api_key: String,
}

/// API key settings routes
pub struct SettingsRoutes;

impl SettingsRoutes {
    /// Create all settings routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/settings/api-keys", get(Self::handle_list_keys))
            .route(
                "/api/settings/api-keys/:provider",
                put(Self::handle_set_key).delete(Self::handle_remove_key),
            )
            .with_state(resources)
    }

    fn parse_provider(raw: &str) -> Result<AiProviderKind, AppError> {
        AiProviderKind::parse(raw).ok_or_else(|| {
            AppError::new(
                ErrorCode::InvalidInput,
                format!("Unknown AI provider '{raw}'; expected openai, gemini or perplexity"),
            )
        })
    }

    async fn handle_list_keys(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let keys = resources.database.list_provider_keys(auth.user_id).await?;
        Ok((StatusCode::OK, Json(json!({ "providers": keys }))).into_response())
    }

    async fn handle_set_key(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(provider): Path<String>,
        Json(request): Json<SetApiKeyRequest>,
    ) -> Result<Response, AppError> {
        let provider = Self::parse_provider(&provider)?;
        let api_key = request.api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::new(ErrorCode::MissingRequiredField, "api_key is required"));
        }
        if api_key.chars().count() > MAX_API_KEY_CHARS {
            return Err(AppError::new(
                ErrorCode::ValueOutOfRange,
                format!("api_key must be at most {MAX_API_KEY_CHARS} characters"),
            ));
        }

        resources
            .database
            .set_provider_key(auth.user_id, provider, api_key)
            .await?;
        info!(user_id = %auth.user_id, provider = provider.as_str(), "Stored provider API key");

        Ok((
            StatusCode::OK,
            Json(json!({ "provider": provider, "configured": true })),
        )
            .into_response())
    }

    async fn handle_remove_key(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(provider): Path<String>,
    ) -> Result<Response, AppError> {
        let provider = Self::parse_provider(&provider)?;
        let removed = resources
            .database
            .remove_provider_key(auth.user_id, provider)
            .await?;
        if removed {
            info!(
                user_id = %auth.user_id,
                provider = provider.as_str(),
                "Removed provider API key"
            );
        }
        deleted_or_not_found(removed, "API key")
    }
}
