// ABOUTME: Maintenance route handlers guarded by the x-admin-key header
// ABOUTME: Currently only the sweep of expired Twitter OAuth states
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use recast_core::errors::AppError;
use serde_json::json;
use tracing::info;

use crate::database::OAuthStatesManager;
use crate::middleware::AdminKey;
use crate::resources::ServerResources;

/// Maintenance routes
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create all maintenance routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/admin/oauth-states/cleanup",
                post(Self::handle_cleanup_states),
            )
            .with_state(resources)
    }

    async fn handle_cleanup_states(
        State(resources): State<Arc<ServerResources>>,
        _admin: AdminKey,
    ) -> Result<Response, AppError> {
        let deleted = OAuthStatesManager::new(resources.database.pool().clone())
            .delete_expired(Utc::now())
            .await?;
        info!(deleted, "Swept expired OAuth states on request");
        Ok((StatusCode::OK, Json(json!({ "deleted": deleted }))).into_response())
    }
}
