// ABOUTME: Account route handlers for registration, login and the current user
// ABOUTME: Issues HS256 JWTs and reports plan, subscription and configured AI providers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use recast_core::constants::limits::MAX_NAME_CHARS;
use recast_core::errors::AppError;
use recast_core::models::{AiProviderKind, PaymentProvider, SubscriptionPlan, SubscriptionStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::User;
use crate::resources::ServerResources;
use crate::validation;

/// User registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Login email
    pub email: String,
    /// Plain-text password, at least eight characters
    pub password: String,
    /// Optional display name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// User login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login email
    pub email: String,
    /// Plain-text password
    pub password: String,
}

/// Public view of an account
#[derive(Debug, Serialize)]
pub struct UserInfo {
    /// User id
    pub user_id: Uuid,
    /// Login email
    pub email: String,
    /// Display name
    pub display_name: Option<String>,
    /// Current plan
    pub plan: SubscriptionPlan,
    /// Subscription state
    pub subscription_status: SubscriptionStatus,
    /// Rail funding the plan
    pub subscription_provider: Option<PaymentProvider>,
    /// End of the paid period
    pub current_period_end: Option<DateTime<Utc>>,
    /// Connected Twitter handle
    pub twitter_username: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            plan: user.plan,
            subscription_status: user.subscription_status,
            subscription_provider: user.subscription_provider,
            current_period_end: user.current_period_end,
            twitter_username: user.twitter_username.clone(),
        }
    }
}

/// Token issued by register and login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Bearer token
    pub jwt_token: String,
    /// RFC 3339 expiry
    pub expires_at: String,
    /// The account
    pub user: UserInfo,
}

/// Body of `GET /api/auth/me`
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// The account
    #[serde(flatten)]
    pub user: UserInfo,
    /// Vendors with a stored API key
    pub configured_providers: Vec<AiProviderKind>,
}

/// Account routes
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all account routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/register", post(Self::handle_register))
            .route("/api/auth/login", post(Self::handle_login))
            .route("/api/auth/me", get(Self::handle_me))
            .with_state(resources)
    }

    fn token_response(resources: &ServerResources, user: &User) -> Result<TokenResponse, AppError> {
        let jwt_token = resources.auth.generate_token(user)?;
        let expires_at =
            Utc::now() + Duration::hours(resources.config.security.jwt_expiry_hours);
        Ok(TokenResponse {
            jwt_token,
            expires_at: expires_at.to_rfc3339(),
            user: UserInfo::from(user),
        })
    }

    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<RegisterRequest>,
    ) -> Result<Response, AppError> {
        let email = validation::email(&request.email)?;
        validation::password(&request.password)?;
        let display_name = validation::optional_text(
            "display_name",
            request.display_name.as_deref(),
            MAX_NAME_CHARS,
        )?;

        if resources.database.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::already_exists(format!(
                "An account for {email} already exists"
            )));
        }

        let password_hash = resources.auth.hash_password(&request.password).await?;
        let user = User::new(email, password_hash, display_name);
        resources.database.create_user(&user).await?;
        info!(user_id = %user.id, "Registered new user");

        let body = Self::token_response(&resources, &user)?;
        Ok((StatusCode::CREATED, Json(body)).into_response())
    }

    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<LoginRequest>,
    ) -> Result<Response, AppError> {
        let email = request.email.trim().to_lowercase();
        let Some(user) = resources.database.get_user_by_email(&email).await? else {
            warn!("Login attempt for unknown email");
            return Err(AppError::auth_invalid("Invalid email or password"));
        };

        if !resources
            .auth
            .verify_password(&request.password, &user.password_hash)
            .await?
        {
            warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AppError::auth_invalid("Invalid email or password"));
        }

        info!(user_id = %user.id, "User logged in");
        let body = Self::token_response(&resources, &user)?;
        Ok((StatusCode::OK, Json(body)).into_response())
    }

    async fn handle_me(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
    ) -> Result<Response, AppError> {
        let user = resources.database.require_user(auth.user_id).await?;
        let configured_providers = resources
            .database
            .list_provider_keys(auth.user_id)
            .await?
            .into_iter()
            .map(|summary| summary.provider)
            .collect();

        Ok((
            StatusCode::OK,
            Json(MeResponse {
                user: UserInfo::from(&user),
                configured_providers,
            }),
        )
            .into_response())
    }
}
