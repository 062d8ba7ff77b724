// ABOUTME: Repurposed snippet persistence grouped by generation run
// ABOUTME: A group is written in one transaction so a thread is never stored half-way
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::Utc;
use recast_core::errors::{AppError, AppResult};
use recast_core::models::{AiProviderKind, GenerationMethod, Platform, SnippetStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_all, parse_datetime, parse_uuid, timestamp};
use crate::models::RepurposedSnippet;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[
            r"
            CREATE TABLE IF NOT EXISTS repurposed_snippets (
                id TEXT PRIMARY KEY,
                content_id TEXT NOT NULL REFERENCES content_pieces(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                platform TEXT NOT NULL,
                text TEXT NOT NULL,
                group_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                method TEXT NOT NULL,
                provider TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(group_id, position)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_snippets_content ON repurposed_snippets(content_id, created_at)",
        ],
    )
    .await
}

/// All parts of one generation run
#[derive(Debug, Clone)]
pub struct NewSnippetGroup {
    /// Source content
    pub content_id: Uuid,
    /// Target platform
    pub platform: Platform,
    /// How the parts were produced
    pub method: GenerationMethod,
    /// LLM vendor for AI output
    pub provider: Option<AiProviderKind>,
    /// Part texts in order
    pub parts: Vec<String>,
}

/// Edit of a single snippet
#[derive(Debug, Clone, Default)]
pub struct SnippetUpdate {
    /// Replacement text
    pub text: Option<String>,
    /// New status
    pub status: Option<SnippetStatus>,
}

/// Snippet database operations
#[derive(Clone)]
pub struct SnippetsManager {
    pool: SqlitePool,
}

const SNIPPET_COLUMNS: &str = r"
    id, content_id, user_id, platform, text, group_id, position, status,
    method, provider, created_at, updated_at
";

impl SnippetsManager {
    /// Create a new manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store every part of a run under one fresh `group_id`
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is stored in that case
    pub async fn create_group(
        &self,
        user_id: Uuid,
        group: NewSnippetGroup,
    ) -> AppResult<(Uuid, Vec<RepurposedSnippet>)> {
        let group_id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let mut snippets = Vec::with_capacity(group.parts.len());
        for (position, text) in (0_i64..).zip(group.parts) {
            let snippet = RepurposedSnippet {
                id: Uuid::new_v4(),
                content_id: group.content_id,
                user_id,
                platform: group.platform,
                text,
                group_id,
                position,
                status: SnippetStatus::Draft,
                method: group.method,
                provider: group.provider,
                created_at: now,
                updated_at: now,
            };

            sqlx::query(
                r"
                INSERT INTO repurposed_snippets (
                    id, content_id, user_id, platform, text, group_id, position, status,
                    method, provider, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
                ",
            )
            .bind(snippet.id.to_string())
            .bind(snippet.content_id.to_string())
            .bind(user_id.to_string())
            .bind(snippet.platform.as_str())
            .bind(&snippet.text)
            .bind(group_id.to_string())
            .bind(position)
            .bind(snippet.status.as_str())
            .bind(snippet.method.as_str())
            .bind(snippet.provider.map(|p| p.as_str()))
            .bind(timestamp(now))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to store snippet: {e}")))?;

            snippets.push(snippet);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit snippets: {e}")))?;
        Ok((group_id, snippets))
    }

    /// Snippets for a content piece, grouped by run and ordered by position
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_for_content(
        &self,
        user_id: Uuid,
        content_id: Uuid,
    ) -> AppResult<Vec<RepurposedSnippet>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SNIPPET_COLUMNS} FROM repurposed_snippets
            WHERE content_id = $1 AND user_id = $2
            ORDER BY created_at DESC, group_id, position
            "
        ))
        .bind(content_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list snippets: {e}")))?;
        rows.iter().map(row_to_snippet).collect()
    }

    /// Every part of one group in position order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_group(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> AppResult<Vec<RepurposedSnippet>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SNIPPET_COLUMNS} FROM repurposed_snippets
            WHERE group_id = $1 AND user_id = $2
            ORDER BY position
            "
        ))
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list snippet group: {e}")))?;
        rows.iter().map(row_to_snippet).collect()
    }

    /// Get one of the user's snippets
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(
        &self,
        user_id: Uuid,
        snippet_id: Uuid,
    ) -> AppResult<Option<RepurposedSnippet>> {
        let row = sqlx::query(&format!(
            "SELECT {SNIPPET_COLUMNS} FROM repurposed_snippets WHERE id = $1 AND user_id = $2"
        ))
        .bind(snippet_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get snippet: {e}")))?;
        row.map(|r| row_to_snippet(&r)).transpose()
    }

    /// Edit text and/or status
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the snippet is not the user's
    pub async fn update(
        &self,
        user_id: Uuid,
        snippet_id: Uuid,
        update: SnippetUpdate,
    ) -> AppResult<RepurposedSnippet> {
        let mut snippet = self
            .get(user_id, snippet_id)
            .await?
            .ok_or_else(|| AppError::not_found("Snippet"))?;

        if let Some(text) = update.text {
            snippet.text = text;
        }
        if let Some(status) = update.status {
            snippet.status = status;
        }
        snippet.updated_at = Utc::now();

        sqlx::query(
            r"
            UPDATE repurposed_snippets SET text = $1, status = $2, updated_at = $3
            WHERE id = $4 AND user_id = $5
            ",
        )
        .bind(&snippet.text)
        .bind(snippet.status.as_str())
        .bind(timestamp(snippet.updated_at))
        .bind(snippet_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update snippet: {e}")))?;

        Ok(snippet)
    }

    /// Set the status of every part of a group
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_group_status(
        &self,
        user_id: Uuid,
        group_id: Uuid,
        status: SnippetStatus,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE repurposed_snippets SET status = $1, updated_at = $2
            WHERE group_id = $3 AND user_id = $4
            ",
        )
        .bind(status.as_str())
        .bind(timestamp(Utc::now()))
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update snippet group: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Delete one snippet
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete(&self, user_id: Uuid, snippet_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM repurposed_snippets WHERE id = $1 AND user_id = $2")
            .bind(snippet_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete snippet: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_snippet(row: &SqliteRow) -> AppResult<RepurposedSnippet> {
    let id: String = row.get("id");
    let content_id: String = row.get("content_id");
    let user_id: String = row.get("user_id");
    let group_id: String = row.get("group_id");
    let platform: String = row.get("platform");
    let status: String = row.get("status");
    let method: String = row.get("method");
    let provider: Option<String> = row.get("provider");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(RepurposedSnippet {
        id: parse_uuid(&id)?,
        content_id: parse_uuid(&content_id)?,
        user_id: parse_uuid(&user_id)?,
        platform: Platform::parse(&platform)
            .ok_or_else(|| AppError::internal(format!("Unknown platform '{platform}'")))?,
        text: row.get("text"),
        group_id: parse_uuid(&group_id)?,
        position: row.get("position"),
        status: SnippetStatus::parse(&status),
        method: GenerationMethod::parse(&method),
        provider: provider.as_deref().and_then(AiProviderKind::parse),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
