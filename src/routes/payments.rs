// ABOUTME: Payment route handlers for Paddle webhooks, manual crypto intents and history
// ABOUTME: The webhook is public and authenticated by its RSA signature instead of a JWT
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use recast_core::errors::{AppError, ErrorCode};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::parse_id;
use crate::middleware::AuthUser;
use crate::resources::ServerResources;
use crate::services::{CreateIntentRequest, PaymentService, WebhookOutcome};

/// Body of `POST /api/payments/crypto/intents/{id}/verify`
#[derive(Debug, Deserialize)]
pub struct VerifyIntentRequest {
    /// Solana signature or Bitcoin txid
    pub reference: String,
}

/// Payment routes
pub struct PaymentRoutes;

impl PaymentRoutes {
    /// Create all payment routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/payments/paddle/webhook",
                post(Self::handle_paddle_webhook),
            )
            .route("/api/payments/crypto/intents", post(Self::handle_create_intent))
            .route(
                "/api/payments/crypto/intents/:id/verify",
                post(Self::handle_verify_intent),
            )
            .route("/api/payments/history", get(Self::handle_history))
            .with_state(resources)
    }

    fn service(resources: &ServerResources) -> PaymentService<'_> {
        PaymentService::new(
            &resources.database,
            &resources.config.paddle,
            &resources.config.crypto_payments,
            &resources.chains,
        )
    }

    async fn handle_paddle_webhook(
        State(resources): State<Arc<ServerResources>>,
        Form(fields): Form<Vec<(String, String)>>,
    ) -> Result<Response, AppError> {
        let outcome = Self::service(&resources)
            .handle_paddle_webhook(&fields)
            .await?;
        if let WebhookOutcome::Applied { user_id } = &outcome {
            info!(user_id = %user_id, "Applied Paddle alert");
        }
        Ok((StatusCode::OK, Json(outcome)).into_response())
    }

    async fn handle_create_intent(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Json(request): Json<CreateIntentRequest>,
    ) -> Result<Response, AppError> {
        let intent = Self::service(&resources)
            .create_intent(auth.user_id, &request)
            .await?;
        Ok((StatusCode::CREATED, Json(intent)).into_response())
    }

    async fn handle_verify_intent(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        Path(id): Path<String>,
        Json(request): Json<VerifyIntentRequest>,
    ) -> Result<Response, AppError> {
        let payment_id = parse_id(&id, "Payment")?;
        let reference = request.reference.trim();
        if reference.is_empty() {
            return Err(AppError::new(
                ErrorCode::MissingRequiredField,
                "reference is required",
            ));
        }
        let verified = Self::service(&resources)
            .verify_intent(auth.user_id, payment_id, reference)
            .await?;
        Ok((StatusCode::OK, Json(verified)).into_response())
    }

    async fn handle_history(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let payments = Self::service(&resources).history(auth.user_id).await?;
        Ok((StatusCode::OK, Json(json!({ "payments": payments }))).into_response())
    }
}
