// ABOUTME: Request authentication extractors for user and maintenance routes
// ABOUTME: AuthUser validates a bearer JWT; AdminKey compares x-admin-key in constant time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use http::request::Parts;
use recast_core::constants::auth::ADMIN_KEY_HEADER;
use recast_core::errors::{AppError, ErrorCode};
use tracing::field::display;
use tracing::{warn, Span};
use uuid::Uuid;

use crate::crypto::constant_time_eq;
use crate::resources::ServerResources;

/// The caller identified by a valid bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Authenticated user
    pub user_id: Uuid,
    /// Email the token was issued for
    pub email: String,
}

#[async_trait]
impl FromRequestParts<Arc<ServerResources>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        resources: &Arc<ServerResources>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, resources)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        AppError::auth_required()
                    } else {
                        AppError::new(
                            ErrorCode::AuthMalformed,
                            "Authorization header must be 'Bearer <token>'",
                        )
                    }
                })?;

        let authenticated = resources.auth.authenticate(bearer.token())?;
        Span::current().record("user_id", display(authenticated.user_id));
        Ok(Self {
            user_id: authenticated.user_id,
            email: authenticated.email,
        })
    }
}

/// Proof that the request carried the configured admin key
#[derive(Debug, Clone, Copy)]
pub struct AdminKey;

#[async_trait]
impl FromRequestParts<Arc<ServerResources>> for AdminKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        resources: &Arc<ServerResources>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = resources.config.security.admin_api_key.as_ref() else {
            return Err(AppError::config_missing(
                "ADMIN_API_KEY is not set; maintenance endpoints are disabled",
            ));
        };
        let supplied = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(AppError::auth_required)?;

        if constant_time_eq(supplied, expected) {
            Ok(Self)
        } else {
            warn!("Rejected maintenance request with a wrong admin key");
            Err(AppError::auth_invalid("Invalid admin key"))
        }
    }
}
