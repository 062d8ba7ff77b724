// ABOUTME: Content piece persistence: long-form source texts with tags and folders
// ABOUTME: Listing supports folder and tag filters with bounded pagination
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::Utc;
use recast_core::errors::{AppError, AppResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    execute_all, page_bounds, parse_datetime, parse_optional_uuid, parse_uuid, timestamp,
};
use crate::models::ContentPiece;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[
            r"
            CREATE TABLE IF NOT EXISTS content_pieces (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                original_text TEXT NOT NULL,
                source_url TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                folder_id TEXT REFERENCES folders(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_content_pieces_user ON content_pieces(user_id, created_at)",
        ],
    )
    .await
}

/// Fields for a new content piece
#[derive(Debug, Clone, Default)]
pub struct NewContent {
    /// Title
    pub title: String,
    /// Source text
    pub original_text: String,
    /// Origin URL
    pub source_url: Option<String>,
    /// Tags
    pub tags: Vec<String>,
    /// Folder to file it under
    pub folder_id: Option<Uuid>,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ContentUpdate {
    /// New title
    pub title: Option<String>,
    /// New text
    pub original_text: Option<String>,
    /// New origin URL (`Some(None)` clears it)
    pub source_url: Option<Option<String>>,
    /// Replacement tag list
    pub tags: Option<Vec<String>>,
    /// New folder (`Some(None)` unfiles it)
    pub folder_id: Option<Option<Uuid>>,
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    /// Only content in this folder
    pub folder_id: Option<Uuid>,
    /// Only content carrying this tag
    pub tag: Option<String>,
    /// Page size
    pub limit: Option<i64>,
    /// Page offset
    pub offset: Option<i64>,
}

/// Content piece database operations
#[derive(Clone)]
pub struct ContentManager {
    pool: SqlitePool,
}

const CONTENT_COLUMNS: &str =
    "id, user_id, title, original_text, source_url, tags, folder_id, created_at, updated_at";

impl ContentManager {
    /// Create a new manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new content piece
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails
    pub async fn create(&self, user_id: Uuid, new: NewContent) -> AppResult<ContentPiece> {
        let now = Utc::now();
        let piece = ContentPiece {
            id: Uuid::new_v4(),
            user_id,
            title: new.title,
            original_text: new.original_text,
            source_url: new.source_url,
            tags: new.tags,
            folder_id: new.folder_id,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO content_pieces (
                id, user_id, title, original_text, source_url, tags, folder_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ",
        )
        .bind(piece.id.to_string())
        .bind(user_id.to_string())
        .bind(&piece.title)
        .bind(&piece.original_text)
        .bind(&piece.source_url)
        .bind(serde_json::to_string(&piece.tags)?)
        .bind(piece.folder_id.map(|id| id.to_string()))
        .bind(timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create content: {e}")))?;

        Ok(piece)
    }

    /// Get one of the user's content pieces
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(&self, user_id: Uuid, content_id: Uuid) -> AppResult<Option<ContentPiece>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_pieces WHERE id = $1 AND user_id = $2"
        ))
        .bind(content_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get content: {e}")))?;
        row.map(|r| row_to_content(&r)).transpose()
    }

    /// List the user's content, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &ContentFilter,
    ) -> AppResult<Vec<ContentPiece>> {
        let (limit, offset) = page_bounds(filter.limit, filter.offset);
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONTENT_COLUMNS} FROM content_pieces
            WHERE user_id = $1
              AND ($2 IS NULL OR folder_id = $2)
              AND ($3 IS NULL OR EXISTS (
                    SELECT 1 FROM json_each(content_pieces.tags)
                    WHERE lower(json_each.value) = lower($3)
              ))
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(user_id.to_string())
        .bind(filter.folder_id.map(|id| id.to_string()))
        .bind(filter.tag.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list content: {e}")))?;
        rows.iter().map(row_to_content).collect()
    }

    /// Apply a partial update
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the content is not the user's
    pub async fn update(
        &self,
        user_id: Uuid,
        content_id: Uuid,
        update: ContentUpdate,
    ) -> AppResult<ContentPiece> {
        let mut piece = self
            .get(user_id, content_id)
            .await?
            .ok_or_else(|| AppError::not_found("Content"))?;

        if let Some(title) = update.title {
            piece.title = title;
        }
        if let Some(text) = update.original_text {
            piece.original_text = text;
        }
        if let Some(source_url) = update.source_url {
            piece.source_url = source_url;
        }
        if let Some(tags) = update.tags {
            piece.tags = tags;
        }
        if let Some(folder_id) = update.folder_id {
            piece.folder_id = folder_id;
        }
        piece.updated_at = Utc::now();

        sqlx::query(
            r"
            UPDATE content_pieces SET
                title = $1, original_text = $2, source_url = $3, tags = $4,
                folder_id = $5, updated_at = $6
            WHERE id = $7 AND user_id = $8
            ",
        )
        .bind(&piece.title)
        .bind(&piece.original_text)
        .bind(&piece.source_url)
        .bind(serde_json::to_string(&piece.tags)?)
        .bind(piece.folder_id.map(|id| id.to_string()))
        .bind(timestamp(piece.updated_at))
        .bind(content_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update content: {e}")))?;

        Ok(piece)
    }

    /// Delete a content piece and, by cascade, its snippets
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete(&self, user_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM content_pieces WHERE id = $1 AND user_id = $2")
            .bind(content_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete content: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_content(row: &SqliteRow) -> AppResult<ContentPiece> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let tags: String = row.get("tags");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(ContentPiece {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        title: row.get("title"),
        original_text: row.get("original_text"),
        source_url: row.get("source_url"),
        tags: serde_json::from_str(&tags)?,
        folder_id: parse_optional_uuid(row.get("folder_id"))?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
