// ABOUTME: Content route handlers: CRUD, repurposing and snippet listing
// ABOUTME: Validates titles, URLs, tags and folder ownership before touching the database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use recast_core::errors::{AppError, ErrorCode};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{deleted_or_not_found, parse_id};
use crate::database::{
    ContentFilter, ContentManager, ContentUpdate, FoldersManager, NewContent, SnippetsManager,
};
use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::services::{RepurposeRequest, RepurposeService};
use crate::validation;

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`)
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of `POST /api/content`
#[derive(Debug, Deserialize)]
pub struct CreateContentRequest {
    /// Title
    pub title: String,
    /// Source text
    pub original_text: String,
    /// Origin URL
    #[serde(default)]
    pub source_url: Option<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Folder to file it under
    #[serde(default)]
    pub folder_id: Option<Uuid>,
}

/// Body of `PUT /api/content/{id}`; absent fields stay unchanged, `null` clears
#[derive(Debug, Default, Deserialize)]
pub struct UpdateContentRequest {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New source text
    #[serde(default)]
    pub original_text: Option<String>,
    /// New origin URL
    #[serde(default, deserialize_with = "double_option")]
    pub source_url: Option<Option<String>>,
    /// Replacement tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// New folder
    #[serde(default, deserialize_with = "double_option")]
    pub folder_id: Option<Option<Uuid>>,
}

/// Query string of `GET /api/content`
#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    /// Folder filter
    pub folder_id: Option<String>,
    /// Tag filter
    pub tag: Option<String>,
    /// Page size
    pub limit: Option<i64>,
    /// Page offset
    pub offset: Option<i64>,
}

/// Content routes
pub struct ContentRoutes;

impl ContentRoutes {
    /// Create all content routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/content",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/content/:id",
                get(Self::handle_get)
                    .put(Self::handle_update)
                    .delete(Self::handle_delete),
            )
            .route("/api/content/:id/repurpose", post(Self::handle_repurpose))
            .route("/api/content/:id/snippets", get(Self::handle_snippets))
            .with_state(resources)
    }

    fn manager(resources: &ServerResources) -> ContentManager {
        ContentManager::new(resources.database.pool().clone())
    }

    async fn require_folder(
        resources: &ServerResources,
        user_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        if let Some(folder_id) = folder_id {
            FoldersManager::new(resources.database.pool().clone())
                .get(user_id, folder_id)
                .await?
                .ok_or_else(|| AppError::not_found("Folder"))?;
        }
        Ok(())
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Query(query): Query<ContentQuery>,
    ) -> Result<Response, AppError> {
        let folder_id = query
            .folder_id
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| {
                    AppError::new(ErrorCode::InvalidFormat, "folder_id must be a UUID")
                })
            })
            .transpose()?;
        let filter = ContentFilter {
            folder_id,
            tag: query.tag.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty()),
            limit: query.limit,
            offset: query.offset,
        };

        let content = Self::manager(&resources).list(auth.user_id, &filter).await?;
        Ok((StatusCode::OK, Json(json!({ "content": content }))).into_response())
    }

    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Json(request): Json<CreateContentRequest>,
    ) -> Result<Response, AppError> {
        let new = NewContent {
            title: validation::title(&request.title)?,
            original_text: validation::original_text(&request.original_text)?,
            source_url: validation::source_url(request.source_url.as_deref())?,
            tags: validation::tags(&request.tags)?,
            folder_id: request.folder_id,
        };
        Self::require_folder(&resources, auth.user_id, new.folder_id).await?;

        let piece = Self::manager(&resources).create(auth.user_id, new).await?;
        info!(user_id = %auth.user_id, content_id = %piece.id, "Created content");
        Ok((StatusCode::CREATED, Json(piece)).into_response())
    }

    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let content_id = parse_id(&id, "Content")?;
        let piece = Self::manager(&resources)
            .get(auth.user_id, content_id)
            .await?
            .ok_or_else(|| AppError::not_found("Content"))?;
        Ok((StatusCode::OK, Json(piece)).into_response())
    }

    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(request): Json<UpdateContentRequest>,
    ) -> Result<Response, AppError> {
        let content_id = parse_id(&id, "Content")?;
        let update = ContentUpdate {
            title: request.title.as_deref().map(validation::title).transpose()?,
            original_text: request
                .original_text
                .as_deref()
                .map(validation::original_text)
                .transpose()?,
            source_url: request
                .source_url
                .map(|url| validation::source_url(url.as_deref()))
                .transpose()?,
            tags: request.tags.as_deref().map(validation::tags).transpose()?,
            folder_id: request.folder_id,
        };
        if let Some(folder_id) = update.folder_id {
            Self::require_folder(&resources, auth.user_id, folder_id).await?;
        }

        let piece = Self::manager(&resources)
            .update(auth.user_id, content_id, update)
            .await?;
        Ok((StatusCode::OK, Json(piece)).into_response())
    }

    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let content_id = parse_id(&id, "Content")?;
        let deleted = Self::manager(&resources)
            .delete(auth.user_id, content_id)
            .await?;
        deleted_or_not_found(deleted, "Content")
    }

    async fn handle_repurpose(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(request): Json<RepurposeRequest>,
    ) -> Result<Response, AppError> {
        let content_id = parse_id(&id, "Content")?;
        let result = RepurposeService::new(&resources.database, &resources.delegator)
            .repurpose(auth.user_id, content_id, request)
            .await?;
        let status = if result.snippets.is_empty() {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        Ok((status, Json(result)).into_response())
    }

    async fn handle_snippets(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let content_id = parse_id(&id, "Content")?;
        Self::manager(&resources)
            .get(auth.user_id, content_id)
            .await?
            .ok_or_else(|| AppError::not_found("Content"))?;
        let snippets = SnippetsManager::new(resources.database.pool().clone())
            .list_for_content(auth.user_id, content_id)
            .await?;
        Ok((StatusCode::OK, Json(json!({ "snippets": snippets }))).into_response())
    }
}
