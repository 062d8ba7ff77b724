// ABOUTME: Folder route handlers for organizing content pieces
// ABOUTME: Names are unique per user; deleting a folder leaves its content unfiled
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use recast_core::constants::limits::MAX_CONTENT_CHARS;
use recast_core::errors::AppError;
use serde::Deserialize;
use serde_json::json;

use super::{deleted_or_not_found, parse_id};
use crate::database::FoldersManager;
use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::validation;

/// Create or rename a folder
#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    /// Folder name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Folder routes
pub struct FolderRoutes;

impl FolderRoutes {
    /// Create all folder routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/folders",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/folders/:id",
                put(Self::handle_update).delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    fn manager(resources: &ServerResources) -> FoldersManager {
        FoldersManager::new(resources.database.pool().clone())
    }

    fn validated(request: &FolderRequest) -> Result<(String, Option<String>), AppError> {
        Ok((
            validation::name(&request.name)?,
            validation::optional_text(
                "description",
                request.description.as_deref(),
                MAX_CONTENT_CHARS,
            )?,
        ))
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let folders = Self::manager(&resources).list(auth.user_id).await?;
        Ok((StatusCode::OK, Json(json!({ "folders": folders }))).into_response())
    }

    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Json(request): Json<FolderRequest>,
    ) -> Result<Response, AppError> {
        let (name, description) = Self::validated(&request)?;
        let folder = Self::manager(&resources)
            .create(auth.user_id, &name, description.as_deref())
            .await?;
        Ok((StatusCode::CREATED, Json(folder)).into_response())
    }

    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(request): Json<FolderRequest>,
    ) -> Result<Response, AppError> {
        let folder_id = parse_id(&id, "Folder")?;
        let (name, description) = Self::validated(&request)?;
        let folder = Self::manager(&resources)
            .update(auth.user_id, folder_id, &name, description.as_deref())
            .await?;
        Ok((StatusCode::OK, Json(folder)).into_response())
    }

    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let folder_id = parse_id(&id, "Folder")?;
        let deleted = Self::manager(&resources)
            .delete(auth.user_id, folder_id)
            .await?;
        deleted_or_not_found(deleted, "Folder")
    }
}
