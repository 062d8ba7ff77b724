// ABOUTME: Snippet template persistence and the community template marketplace
// ABOUTME: Public templates can be searched and cloned into another user's library
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::Utc;
use recast_core::constants::limits::MAX_NAME_CHARS;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use recast_core::models::Platform;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{
    execute_all, page_bounds, parse_datetime, parse_optional_uuid, parse_uuid, timestamp,
    write_error,
};
use crate::models::SnippetTemplate;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[
            r"
            CREATE TABLE IF NOT EXISTS snippet_templates (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                platform TEXT NOT NULL,
                body TEXT NOT NULL,
                description TEXT,
                is_public INTEGER NOT NULL DEFAULT 0,
                use_count INTEGER NOT NULL DEFAULT 0,
                source_template_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, name)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_templates_public ON snippet_templates(is_public, use_count)",
        ],
    )
    .await
}

/// Editable template fields
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateFields {
    /// Name
    pub name: String,
    /// Target platform
    pub platform: Platform,
    /// Body with placeholders
    pub body: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Publish to the marketplace
    #[serde(default)]
    pub is_public: bool,
}

/// Template database operations
#[derive(Clone)]
pub struct TemplatesManager {
    pool: SqlitePool,
}

const TEMPLATE_COLUMNS: &str = r"
    id, user_id, name, platform, body, description, is_public, use_count,
    source_template_id, created_at, updated_at
";

/// Attempts at finding a free name for a clone before giving up
const MAX_CLONE_NAME_ATTEMPTS: u32 = 20;

impl TemplatesManager {
    /// Create a new manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a template
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` on a duplicate name
    pub async fn create(
        &self,
        user_id: Uuid,
        fields: TemplateFields,
    ) -> AppResult<SnippetTemplate> {
        let template = new_template(user_id, fields, None);
        self.insert(&template).await?;
        Ok(template)
    }

    async fn insert(&self, template: &SnippetTemplate) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO snippet_templates (
                id, user_id, name, platform, body, description, is_public, use_count,
                source_template_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $9)
            ",
        )
        .bind(template.id.to_string())
        .bind(template.user_id.to_string())
        .bind(&template.name)
        .bind(template.platform.as_str())
        .bind(&template.body)
        .bind(&template.description)
        .bind(template.is_public)
        .bind(template.source_template_id.map(|id| id.to_string()))
        .bind(timestamp(template.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(e, "create template", || {
                format!("Template '{}' already exists", template.name)
            })
        })?;
        Ok(())
    }

    /// Get one of the user's templates
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(
        &self,
        user_id: Uuid,
        template_id: Uuid,
    ) -> AppResult<Option<SnippetTemplate>> {
        let row = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM snippet_templates WHERE id = $1 AND user_id = $2"
        ))
        .bind(template_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get template: {e}")))?;
        row.map(|r| row_to_template(&r)).transpose()
    }

    /// Get a template the user may apply: their own, or any public one
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_usable(
        &self,
        user_id: Uuid,
        template_id: Uuid,
    ) -> AppResult<Option<SnippetTemplate>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {TEMPLATE_COLUMNS} FROM snippet_templates
            WHERE id = $1 AND (user_id = $2 OR is_public = 1)
            "
        ))
        .bind(template_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get template: {e}")))?;
        row.map(|r| row_to_template(&r)).transpose()
    }

    /// List the user's own templates
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list(&self, user_id: Uuid) -> AppResult<Vec<SnippetTemplate>> {
        let rows = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM snippet_templates WHERE user_id = $1 ORDER BY name COLLATE NOCASE"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list templates: {e}")))?;
        rows.iter().map(row_to_template).collect()
    }

    /// Search public templates, most used first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_marketplace(
        &self,
        query: Option<&str>,
        platform: Option<Platform>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<SnippetTemplate>> {
        let (limit, offset) = page_bounds(limit, offset);
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));

        let rows = sqlx::query(&format!(
            r"
            SELECT {TEMPLATE_COLUMNS} FROM snippet_templates
            WHERE is_public = 1
              AND ($1 IS NULL OR name LIKE $1 ESCAPE '\' OR description LIKE $1 ESCAPE '\')
              AND ($2 IS NULL OR platform = $2)
            ORDER BY use_count DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(pattern)
        .bind(platform.map(|p| p.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list marketplace templates: {e}")))?;
        rows.iter().map(row_to_template).collect()
    }

    /// Replace a template's fields
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the template is not the user's, or a conflict on
    /// duplicate name
    pub async fn update(
        &self,
        user_id: Uuid,
        template_id: Uuid,
        fields: TemplateFields,
    ) -> AppResult<SnippetTemplate> {
        let result = sqlx::query(
            r"
            UPDATE snippet_templates SET
                name = $1, platform = $2, body = $3, description = $4, is_public = $5, updated_at = $6
            WHERE id = $7 AND user_id = $8
            ",
        )
        .bind(&fields.name)
        .bind(fields.platform.as_str())
        .bind(&fields.body)
        .bind(&fields.description)
        .bind(fields.is_public)
        .bind(timestamp(Utc::now()))
        .bind(template_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(e, "update template", || {
                format!("Template '{}' already exists", fields.name)
            })
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Template"));
        }
        self.get(user_id, template_id)
            .await?
            .ok_or_else(|| AppError::not_found("Template"))
    }

    /// Delete a template
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete(&self, user_id: Uuid, template_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM snippet_templates WHERE id = $1 AND user_id = $2")
            .bind(template_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete template: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Copy a public template into the user's library and bump its use count
    ///
    /// The copy is private. When the user already has a template with the same
    /// name, ` (copy)`, ` (copy 2)`, ... is appended until a free name is found.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the template is not public
    pub async fn clone_template(
        &self,
        user_id: Uuid,
        template_id: Uuid,
    ) -> AppResult<SnippetTemplate> {
        let row = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM snippet_templates WHERE id = $1 AND is_public = 1"
        ))
        .bind(template_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get template: {e}")))?;
        let source = row
            .map(|r| row_to_template(&r))
            .transpose()?
            .ok_or_else(|| AppError::not_found("Template"))?;

        let mut copy = None;
        for attempt in 0..MAX_CLONE_NAME_ATTEMPTS {
            let candidate = new_template(
                user_id,
                TemplateFields {
                    name: clone_name(&source.name, attempt),
                    platform: source.platform,
                    body: source.body.clone(),
                    description: source.description.clone(),
                    is_public: false,
                },
                Some(source.id),
            );
            match self.insert(&candidate).await {
                Ok(()) => {
                    copy = Some(candidate);
                    break;
                }
                Err(e) if e.code == ErrorCode::ResourceAlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        let copy = copy.ok_or_else(|| {
            AppError::already_exists(format!("Could not find a free name for '{}'", source.name))
        })?;

        sqlx::query("UPDATE snippet_templates SET use_count = use_count + 1 WHERE id = $1")
            .bind(source.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to bump template use count: {e}")))?;

        info!(%user_id, source = %source.id, copy = %copy.id, "Cloned marketplace template");
        Ok(copy)
    }
}

fn new_template(
    user_id: Uuid,
    fields: TemplateFields,
    source_template_id: Option<Uuid>,
) -> SnippetTemplate {
    let now = Utc::now();
    SnippetTemplate {
        id: Uuid::new_v4(),
        user_id,
        name: fields.name,
        platform: fields.platform,
        body: fields.body,
        description: fields.description,
        is_public: fields.is_public,
        use_count: 0,
        source_template_id,
        created_at: now,
        updated_at: now,
    }
}

/// Candidate name for the `attempt`-th clone of `name`
fn clone_name(name: &str, attempt: u32) -> String {
    let suffix = match attempt {
        0 => return name.to_owned(),
        1 => " (copy)".to_owned(),
        n => format!(" (copy {n})"),
    };
    let keep = MAX_NAME_CHARS.saturating_sub(suffix.chars().count());
    let base: String = name.chars().take(keep).collect();
    format!("{base}{suffix}")
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_template(row: &SqliteRow) -> AppResult<SnippetTemplate> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let platform: String = row.get("platform");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(SnippetTemplate {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        name: row.get("name"),
        platform: Platform::parse(&platform)
            .ok_or_else(|| AppError::internal(format!("Unknown platform '{platform}'")))?,
        body: row.get("body"),
        description: row.get("description"),
        is_public: row.get("is_public"),
        use_count: row.get("use_count"),
        source_template_id: parse_optional_uuid(row.get("source_template_id"))?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
