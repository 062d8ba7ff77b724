// ABOUTME: JWT-based user authentication and password hashing
// ABOUTME: Issues and validates HS256 API tokens and hashes passwords with bcrypt
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Authentication
//!
//! API clients authenticate with a bearer JWT obtained from login or
//! registration. Tokens are HS256-signed with the server secret and scoped to
//! the `recast-api` audience.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use recast_core::constants::auth::JWT_AUDIENCE;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::models::User;

/// `JWT` claims for user authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User `ID`
    pub sub: String,
    /// User email
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Audience
    pub aud: String,
    /// Unique token id
    pub jti: String,
}

/// Identity extracted from a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// User id
    pub user_id: Uuid,
    /// Email at token issue time
    pub email: String,
}

/// Token and password manager
pub struct AuthManager {
    secret: Zeroizing<String>,
    token_expiry_hours: i64,
    bcrypt_cost: u32,
    token_counter: AtomicU64,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager")
            .field("secret", &"[REDACTED]")
            .field("token_expiry_hours", &self.token_expiry_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Create a new authentication manager
    #[must_use]
    pub fn new(secret: Zeroizing<String>, token_expiry_hours: i64, bcrypt_cost: u32) -> Self {
        Self {
            secret,
            token_expiry_hours,
            bcrypt_cost,
            token_counter: AtomicU64::new(0),
        }
    }

    /// Token lifetime in seconds
    #[must_use]
    pub const fn token_expiry_secs(&self) -> i64 {
        self.token_expiry_hours * 3600
    }

    /// Generate a `JWT` for `user`
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails
    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let counter = self.token_counter.fetch_add(1, Ordering::Relaxed);
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
            aud: JWT_AUDIENCE.to_owned(),
            jti: format!("{}-{counter}", Uuid::new_v4()),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a `JWT` and return its claims
    ///
    /// # Errors
    ///
    /// Returns `AUTH_EXPIRED`, `AUTH_MALFORMED` or `AUTH_INVALID` depending on the failure
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(&[JWT_AUDIENCE]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("JWT validation failed: {e}");
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::auth_expired(),
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => {
                    AppError::new(ErrorCode::AuthMalformed, "Token is malformed")
                }
                _ => AppError::auth_invalid("Token is invalid"),
            }
        })
    }

    /// Validate a token and extract the caller identity
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid or its subject is not a UUID
    pub fn authenticate(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| {
                AppError::new(ErrorCode::AuthMalformed, "Token subject is not a user id")
            })?;
        Ok(AuthenticatedUser {
            user_id,
            email: claims.email,
        })
    }

    /// Hash a password on the blocking pool
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails or the blocking task panics
    pub async fn hash_password(&self, password: &str) -> AppResult<String> {
        let password = Zeroizing::new(password.to_owned());
        let cost = self.bcrypt_cost;
        task::spawn_blocking(move || bcrypt::hash(password.as_str(), cost))
            .await
            .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
    }

    /// Check a password against a stored bcrypt hash
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking task panics; a malformed hash counts as a mismatch
    pub async fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let password = Zeroizing::new(password.to_owned());
        let hash = hash.to_owned();
        task::spawn_blocking(move || bcrypt::verify(password.as_str(), &hash).unwrap_or(false))
            .await
            .map_err(|e| AppError::internal(format!("Password verification task failed: {e}")))
    }
}
