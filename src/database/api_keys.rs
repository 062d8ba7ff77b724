// ABOUTME: Per-user LLM vendor API keys, encrypted at rest with AES-256-GCM
// ABOUTME: Supports set, remove, masked listing and decrypted lookup for AI delegation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use recast_core::errors::{AppError, AppResult};
use recast_core::models::AiProviderKind;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::{execute_all, parse_datetime, timestamp, Database};

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[r"
        CREATE TABLE IF NOT EXISTS user_api_keys (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            provider TEXT NOT NULL,
            encrypted_key TEXT NOT NULL,
            key_hint TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, provider)
        )
        "],
    )
    .await
}

/// A configured provider as shown to the user (never the key itself)
#[derive(Debug, Clone, Serialize)]
pub struct ProviderKeySummary {
    /// Vendor
    pub provider: AiProviderKind,
    /// Last four characters of the key
    pub hint: String,
    /// When the key was last set
    pub updated_at: DateTime<Utc>,
}

fn key_context(user_id: Uuid, provider: AiProviderKind) -> String {
    format!("api_key:{user_id}:{}", provider.as_str())
}

fn key_hint(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("…{tail}")
}

impl Database {
    /// Store (or replace) the user's key for `provider`
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the write fails
    pub async fn set_provider_key(
        &self,
        user_id: Uuid,
        provider: AiProviderKind,
        api_key: &str,
    ) -> AppResult<()> {
        let encrypted = self
            .cipher()
            .encrypt(api_key, &key_context(user_id, provider))?;

        sqlx::query(
            r"
            INSERT INTO user_api_keys (user_id, provider, encrypted_key, key_hint, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                encrypted_key = excluded.encrypted_key,
                key_hint = excluded.key_hint,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.to_string())
        .bind(provider.as_str())
        .bind(encrypted)
        .bind(key_hint(api_key))
        .bind(timestamp(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store API key: {e}")))?;
        Ok(())
    }

    /// Remove the user's key for `provider`
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn remove_provider_key(
        &self,
        user_id: Uuid,
        provider: AiProviderKind,
    ) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM user_api_keys WHERE user_id = $1 AND provider = $2")
            .bind(user_id.to_string())
            .bind(provider.as_str())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to remove API key: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Configured providers with masked key hints
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_provider_keys(&self, user_id: Uuid) -> AppResult<Vec<ProviderKeySummary>> {
        let rows = sqlx::query(
            r"
            SELECT provider, key_hint, updated_at FROM user_api_keys
            WHERE user_id = $1 ORDER BY provider
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list API keys: {e}")))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let provider: String = row.get("provider");
            let Some(provider) = AiProviderKind::parse(&provider) else {
                continue;
            };
            let updated_at: String = row.get("updated_at");
            summaries.push(ProviderKeySummary {
                provider,
                hint: row.get("key_hint"),
                updated_at: parse_datetime(&updated_at)?,
            });
        }
        Ok(summaries)
    }

    /// Decrypted keys for every configured provider
    ///
    /// Keys that fail to decrypt (for example after an encryption key rotation)
    /// are skipped with a warning so the user sees "not configured" instead of a 500.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_provider_keys(
        &self,
        user_id: Uuid,
    ) -> AppResult<HashMap<AiProviderKind, Zeroizing<String>>> {
        let rows =
            sqlx::query("SELECT provider, encrypted_key FROM user_api_keys WHERE user_id = $1")
                .bind(user_id.to_string())
                .fetch_all(self.pool())
                .await
                .map_err(|e| AppError::database(format!("Failed to load API keys: {e}")))?;

        let mut keys = HashMap::new();
        for row in rows {
            let provider: String = row.get("provider");
            let Some(provider) = AiProviderKind::parse(&provider) else {
                continue;
            };
            let encrypted: String = row.get("encrypted_key");
            match self
                .cipher()
                .decrypt(&encrypted, &key_context(user_id, provider))
            {
                Ok(key) => {
                    keys.insert(provider, key);
                }
                Err(e) => warn!(%user_id, %provider, "Skipping undecryptable API key: {e}"),
            }
        }
        Ok(keys)
    }
}
