// ABOUTME: Twitter route handlers for the PKCE connect flow and thread publishing
// ABOUTME: The callback is public and always ends in a redirect to the frontend settings page
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use recast_core::errors::AppError;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::services::{CallbackOutcome, CallbackParams, TwitterService};

/// Body of `POST /api/twitter/threads`
#[derive(Debug, Deserialize)]
pub struct PublishThreadRequest {
    /// Snippet group to post
    pub group_id: Uuid,
}

/// Twitter routes
pub struct TwitterRoutes;

impl TwitterRoutes {
    /// Create all Twitter routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/twitter/connect", get(Self::handle_connect))
            .route("/api/twitter/callback", get(Self::handle_callback))
            .route("/api/twitter/status", get(Self::handle_status))
            .route("/api/twitter/disconnect", post(Self::handle_disconnect))
            .route("/api/twitter/threads", post(Self::handle_publish))
            .with_state(resources)
    }

    fn service(resources: &ServerResources) -> Result<TwitterService<'_>, AppError> {
        Ok(TwitterService::new(
            &resources.database,
            resources.require_twitter()?,
            &resources.twitter_api,
        ))
    }

    async fn handle_connect(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let response = Self::service(&resources)?
            .start_connect(auth.user_id)
            .await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Query(params): Query<CallbackParams>,
    ) -> Result<Response, AppError> {
        let outcome = Self::service(&resources)?.handle_callback(params).await;
        if let CallbackOutcome::Connected { username } = &outcome {
            info!(username = %username, "Twitter callback connected an account");
        } else {
            info!(outcome = ?outcome, "Twitter callback did not connect an account");
        }
        Ok(Redirect::to(&outcome.redirect_url(&resources.config.frontend_url)).into_response())
    }

    async fn handle_status(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let status = Self::service(&resources)?.status(auth.user_id).await?;
        Ok((StatusCode::OK, Json(status)).into_response())
    }

    async fn handle_disconnect(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let disconnected = Self::service(&resources)?.disconnect(auth.user_id).await?;
        Ok((
            StatusCode::OK,
            Json(json!({ "disconnected": disconnected })),
        )
            .into_response())
    }

    async fn handle_publish(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Json(request): Json<PublishThreadRequest>,
    ) -> Result<Response, AppError> {
        let thread = Self::service(&resources)?
            .publish_group(auth.user_id, request.group_id)
            .await?;
        info!(
            user_id = %auth.user_id,
            group_id = %thread.group_id,
            tweets = thread.tweets.len(),
            "Published thread"
        );
        Ok((StatusCode::CREATED, Json(thread)).into_response())
    }
}
