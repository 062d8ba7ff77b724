// ABOUTME: Audience persona route handlers
// ABOUTME: Personas describe who AI-generated content is written for
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
use serde_json::json;

use super::{deleted_or_not_found, parse_id};
use crate::database::{PersonaFields, PersonasManager};
use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::validation;

/// Persona routes
pub struct PersonaRoutes;

impl PersonaRoutes {
    /// Create all persona routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/personas",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/personas/:id",
                put(Self::handle_update).delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    fn manager(resources: &ServerResources) -> PersonasManager {
        PersonasManager::new(resources.database.pool().clone())
    }

    fn validated(fields: PersonaFields) -> Result<PersonaFields, AppError> {
        let text = |field: &str, value: Option<&str>| {
            validation::optional_text(field, value, MAX_CONTENT_CHARS)
        };
        Ok(PersonaFields {
            name: validation::name(&fields.name)?,
            description: text("description", fields.description.as_deref())?,
            audience: text("audience", fields.audience.as_deref())?,
            tone: text("tone", fields.tone.as_deref())?,
            goals: text("goals", fields.goals.as_deref())?,
        })
    }

    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let personas = Self::manager(&resources).list(auth.user_id).await?;
        Ok((StatusCode::OK, Json(json!({ "personas": personas }))).into_response())
    }

    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Json(fields): Json<PersonaFields>,
    ) -> Result<Response, AppError> {
        let fields = Self::validated(fields)?;
        let persona = Self::manager(&resources).create(auth.user_id, fields).await?;
        Ok((StatusCode::CREATED, Json(persona)).into_response())
    }

    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(fields): Json<PersonaFields>,
    ) -> Result<Response, AppError> {
        let persona_id = parse_id(&id, "Persona")?;
        let fields = Self::validated(fields)?;
        let persona = Self::manager(&resources)
            .update(auth.user_id, persona_id, fields)
            .await?;
        Ok((StatusCode::OK, Json(persona)).into_response())
    }

    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let persona_id = parse_id(&id, "Persona")?;
        let deleted = Self::manager(&resources)
            .delete(auth.user_id, persona_id)
            .await?;
        deleted_or_not_found(deleted, "Persona")
    }
}
