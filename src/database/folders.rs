// ABOUTME: Folder persistence for organizing content pieces
// ABOUTME: Names are unique per user; deleting a folder detaches its content
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::Utc;
use recast_core::errors::{AppError, AppResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_all, parse_datetime, parse_uuid, timestamp, write_error};
use crate::models::Folder;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[r"
        CREATE TABLE IF NOT EXISTS folders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, name)
        )
        "],
    )
    .await
}

/// Folder database operations
#[derive(Clone)]
pub struct FoldersManager {
    pool: SqlitePool,
}

impl FoldersManager {
    /// Create a new manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a folder
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if the user already has a folder with this name
    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Folder> {
        let now = Utc::now();
        let folder = Folder {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_owned(),
            description: description.map(str::to_owned),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO folders (id, user_id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ",
        )
        .bind(folder.id.to_string())
        .bind(user_id.to_string())
        .bind(&folder.name)
        .bind(&folder.description)
        .bind(timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(e, "create folder", || format!("Folder '{name}' already exists"))
        })?;

        Ok(folder)
    }

    /// Get one of the user's folders
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(&self, user_id: Uuid, folder_id: Uuid) -> AppResult<Option<Folder>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, name, description, created_at, updated_at
            FROM folders WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(folder_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get folder: {e}")))?;
        row.map(|r| row_to_folder(&r)).transpose()
    }

    /// List the user's folders by name
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list(&self, user_id: Uuid) -> AppResult<Vec<Folder>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, name, description, created_at, updated_at
            FROM folders WHERE user_id = $1 ORDER BY name COLLATE NOCASE
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list folders: {e}")))?;
        rows.iter().map(row_to_folder).collect()
    }

    /// Rename or re-describe a folder
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the folder is not the user's, or a conflict on
    /// duplicate name
    pub async fn update(
        &self,
        user_id: Uuid,
        folder_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Folder> {
        let result = sqlx::query(
            r"
            UPDATE folders SET name = $1, description = $2, updated_at = $3
            WHERE id = $4 AND user_id = $5
            ",
        )
        .bind(name)
        .bind(description)
        .bind(timestamp(Utc::now()))
        .bind(folder_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(e, "update folder", || format!("Folder '{name}' already exists"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Folder"));
        }
        self.get(user_id, folder_id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder"))
    }

    /// Delete a folder; its content stays, unfiled
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete(&self, user_id: Uuid, folder_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1 AND user_id = $2")
            .bind(folder_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete folder: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_folder(row: &SqliteRow) -> AppResult<Folder> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Folder {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        name: row.get("name"),
        description: row.get("description"),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
