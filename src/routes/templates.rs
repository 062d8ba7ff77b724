// ABOUTME: Snippet template route handlers for the own library and the marketplace
// ABOUTME: Public templates are searchable by text and platform and can be cloned
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use recast_core::constants::limits::MAX_CONTENT_CHARS;
use recast_core::errors::{AppError, ErrorCode};
use recast_core::models::Platform;
use recast_repurpose::template::has_placeholders;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{deleted_or_not_found, parse_id};
use crate::database::{TemplateFields, TemplatesManager};
use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::validation;

/// Query string of `GET /api/templates/marketplace`
#[derive(Debug, Default, Deserialize)]
pub struct MarketplaceQuery {
    /// Search in name and description
    pub q: Option<String>,
    /// Platform filter
    pub platform: Option<String>,
    /// Page size
    pub limit: Option<i64>,
    /// Page offset
    pub offset: Option<i64>,
}

/// Template routes
pub struct TemplateRoutes;

impl TemplateRoutes {
    /// Create all template routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/templates",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route("/api/templates/marketplace", get(Self::handle_marketplace))
            .route(
                "/api/templates/:id",
                put(Self::handle_update).delete(Self::handle_delete),
            )
            .route("/api/templates/:id/clone", post(Self::handle_clone))
            .with_state(resources)
    }

    fn manager(resources: &ServerResources) -> TemplatesManager {
        TemplatesManager::new(resources.database.pool().clone())
    }

    fn validated(fields: TemplateFields) -> Result<TemplateFields, AppError> {
        let body = validation::required_text("body", &fields.body, MAX_CONTENT_CHARS)?;
        if !has_placeholders(&body) {
            debug!("Template body has no placeholders; content will be appended");
        }
        Ok(TemplateFields {
            name: validation::name(&fields.name)?,
            platform: fields.platform,
            body,
            description: validation::optional_text(
                "description",
                fields.description.as_deref(),
                MAX_CONTENT_CHARS,
            )?,
            is_public: fields.is_public,
        })
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let templates = Self::manager(&resources).list(auth.user_id).await?;
        Ok((StatusCode::OK, Json(json!({ "templates": templates }))).into_response())
    }

    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Json(fields): Json<TemplateFields>,
    ) -> Result<Response, AppError> {
        let fields = Self::validated(fields)?;
        let template = Self::manager(&resources).create(auth.user_id, fields).await?;
        Ok((StatusCode::CREATED, Json(template)).into_response())
    }

    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(fields): Json<TemplateFields>,
    ) -> Result<Response, AppError> {
        let template_id = parse_id(&id, "Template")?;
        let fields = Self::validated(fields)?;
        let template = Self::manager(&resources)
            .update(auth.user_id, template_id, fields)
            .await?;
        Ok((StatusCode::OK, Json(template)).into_response())
    }

    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let template_id = parse_id(&id, "Template")?;
        let deleted = Self::manager(&resources)
            .delete(auth.user_id, template_id)
            .await?;
        deleted_or_not_found(deleted, "Template")
    }

    async fn handle_marketplace(
        State(resources): State<Arc<ServerResources>>,
        _auth: AuthUser,
        Query(query): Query<MarketplaceQuery>,
    ) -> Result<Response, AppError> {
        let platform = query
            .platform
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Platform::parse(raw).ok_or_else(|| {
                    AppError::new(ErrorCode::InvalidInput, format!("Unknown platform '{raw}'"))
                })
            })
            .transpose()?;

        let templates = Self::manager(&resources)
            .list_marketplace(query.q.as_deref(), platform, query.limit, query.offset)
            .await?;
        Ok((StatusCode::OK, Json(json!({ "templates": templates }))).into_response())
    }

    async fn handle_clone(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let template_id = parse_id(&id, "Template")?;
        let template = Self::manager(&resources)
            .clone_template(auth.user_id, template_id)
            .await?;
        info!(
            user_id = %auth.user_id,
            source_template_id = %template_id,
            template_id = %template.id,
            "Cloned marketplace template"
        );
        Ok((StatusCode::CREATED, Json(template)).into_response())
    }
}
