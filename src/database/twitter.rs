// ABOUTME: Twitter connection persistence with access and refresh tokens encrypted at rest
// ABOUTME: One connection per user, replaced on reconnect and refreshed in place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use recast_core::errors::{AppError, AppResult};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    execute_all, optional_timestamp, parse_datetime, parse_optional_datetime, timestamp, Database,
};
use crate::models::TwitterConnection;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[r"
        CREATE TABLE IF NOT EXISTS twitter_connections (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            encrypted_access_token TEXT NOT NULL,
            encrypted_refresh_token TEXT,
            expires_at TEXT,
            scope TEXT,
            twitter_user_id TEXT,
            username TEXT,
            updated_at TEXT NOT NULL
        )
        "],
    )
    .await
}

fn access_context(user_id: Uuid) -> String {
    format!("twitter:access:{user_id}")
}

fn refresh_context(user_id: Uuid) -> String {
    format!("twitter:refresh:{user_id}")
}

impl Database {
    /// Store or replace the user's Twitter connection
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the write fails
    pub async fn save_twitter_connection(&self, connection: &TwitterConnection) -> AppResult<()> {
        let user_id = connection.user_id;
        let access = self
            .cipher()
            .encrypt(&connection.access_token, &access_context(user_id))?;
        let refresh = connection
            .refresh_token
            .as_ref()
            .map(|token| self.cipher().encrypt(token, &refresh_context(user_id)))
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO twitter_connections (
                user_id, encrypted_access_token, encrypted_refresh_token, expires_at,
                scope, twitter_user_id, username, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(user_id) DO UPDATE SET
                encrypted_access_token = excluded.encrypted_access_token,
                encrypted_refresh_token = COALESCE(excluded.encrypted_refresh_token, encrypted_refresh_token),
                expires_at = excluded.expires_at,
                scope = COALESCE(excluded.scope, scope),
                twitter_user_id = COALESCE(excluded.twitter_user_id, twitter_user_id),
                username = COALESCE(excluded.username, username),
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.to_string())
        .bind(access)
        .bind(refresh)
        .bind(optional_timestamp(connection.expires_at))
        .bind(&connection.scope)
        .bind(&connection.twitter_user_id)
        .bind(&connection.username)
        .bind(timestamp(connection.updated_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to save Twitter connection: {e}")))?;
        Ok(())
    }

    /// Load and decrypt the user's Twitter connection
    ///
    /// # Errors
    ///
    /// Returns an error if the query or decryption fails
    pub async fn get_twitter_connection(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<TwitterConnection>> {
        let row = sqlx::query(
            r"
            SELECT encrypted_access_token, encrypted_refresh_token, expires_at, scope,
                   twitter_user_id, username, updated_at
            FROM twitter_connections WHERE user_id = $1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get Twitter connection: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let access: String = row.get("encrypted_access_token");
        let refresh: Option<String> = row.get("encrypted_refresh_token");
        let updated_at: String = row.get("updated_at");

        Ok(Some(TwitterConnection {
            user_id,
            access_token: self.cipher().decrypt(&access, &access_context(user_id))?,
            refresh_token: refresh
                .map(|value| self.cipher().decrypt(&value, &refresh_context(user_id)))
                .transpose()?,
            expires_at: parse_optional_datetime(row.get("expires_at"))?,
            scope: row.get("scope"),
            twitter_user_id: row.get("twitter_user_id"),
            username: row.get("username"),
            updated_at: parse_datetime(&updated_at)?,
        }))
    }

    /// Remove the user's Twitter connection
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_twitter_connection(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM twitter_connections WHERE user_id = $1")
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to delete Twitter connection: {e}")))?;
        self.set_twitter_username(user_id, None).await?;
        Ok(result.rows_affected() > 0)
    }
}
