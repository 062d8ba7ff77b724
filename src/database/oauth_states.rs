// ABOUTME: Short-lived PKCE state records for the Twitter OAuth2 flow
// ABOUTME: States are single-use: consume deletes and returns the row in one statement
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::{DateTime, Utc};
use recast_core::errors::{AppError, AppResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use zeroize::Zeroizing;

use super::{execute_all, parse_datetime, parse_uuid, timestamp, write_error};
use crate::models::TwitterOAuthState;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[
            r"
            CREATE TABLE IF NOT EXISTS twitter_oauth_states (
                state TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                code_verifier TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_twitter_oauth_states_expires ON twitter_oauth_states(expires_at)",
        ],
    )
    .await
}

/// Store for pending Twitter authorizations
#[derive(Clone)]
pub struct OAuthStatesManager {
    pool: SqlitePool,
}

impl OAuthStatesManager {
    /// Create a new manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new pending authorization
    ///
    /// # Errors
    ///
    /// Returns an error if the state already exists or the insert fails
    pub async fn create(&self, state: &TwitterOAuthState) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO twitter_oauth_states (state, user_id, code_verifier, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&state.state)
        .bind(state.user_id.to_string())
        .bind(state.code_verifier.as_str())
        .bind(timestamp(state.created_at))
        .bind(timestamp(state.expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "store OAuth state", || "OAuth state collision".to_owned()))?;
        Ok(())
    }

    /// Atomically remove and return a state record
    ///
    /// Expired records are returned too; the caller decides how to report them.
    /// Either way the record no longer exists afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails
    pub async fn consume(&self, state: &str) -> AppResult<Option<TwitterOAuthState>> {
        let row = sqlx::query(
            r"
            DELETE FROM twitter_oauth_states WHERE state = $1
            RETURNING state, user_id, code_verifier, created_at, expires_at
            ",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to consume OAuth state: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_id: String = row.get("user_id");
        let verifier: String = row.get("code_verifier");
        let created_at: String = row.get("created_at");
        let expires_at: String = row.get("expires_at");

        Ok(Some(TwitterOAuthState {
            state: row.get("state"),
            user_id: parse_uuid(&user_id)?,
            code_verifier: Zeroizing::new(verifier),
            created_at: parse_datetime(&created_at)?,
            expires_at: parse_datetime(&expires_at)?,
        }))
    }

    /// Delete every record that expired before `now`
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM twitter_oauth_states WHERE expires_at <= $1")
            .bind(timestamp(now))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to delete expired OAuth states: {e}"))
            })?;
        let deleted = result.rows_affected();
        if deleted > 0 {
            debug!(deleted, "Removed expired OAuth states");
        }
        Ok(deleted)
    }
}
