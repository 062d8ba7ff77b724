// ABOUTME: Audience persona persistence used to steer AI generation
// ABOUTME: Persona names are unique per user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::Utc;
use recast_core::errors::{AppError, AppResult};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_all, parse_datetime, parse_uuid, timestamp, write_error};
use crate::models::AudiencePersona;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[r"
        CREATE TABLE IF NOT EXISTS audience_personas (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            audience TEXT,
            tone TEXT,
            goals TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, name)
        )
        "],
    )
    .await
}

/// Editable persona fields, used for both create and full update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaFields {
    /// Name
    pub name: String,
    /// Who the persona is
    #[serde(default)]
    pub description: Option<String>,
    /// Target audience
    #[serde(default)]
    pub audience: Option<String>,
    /// Tone of voice
    #[serde(default)]
    pub tone: Option<String>,
    /// Content goals
    #[serde(default)]
    pub goals: Option<String>,
}

/// Persona database operations
#[derive(Clone)]
pub struct PersonasManager {
    pool: SqlitePool,
}

const PERSONA_COLUMNS: &str =
    "id, user_id, name, description, audience, tone, goals, created_at, updated_at";

impl PersonasManager {
    /// Create a new manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a persona
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` on a duplicate name
    pub async fn create(&self, user_id: Uuid, fields: PersonaFields) -> AppResult<AudiencePersona> {
        let now = Utc::now();
        let persona = AudiencePersona {
            id: Uuid::new_v4(),
            user_id,
            name: fields.name,
            description: fields.description,
            audience: fields.audience,
            tone: fields.tone,
            goals: fields.goals,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO audience_personas (
                id, user_id, name, description, audience, tone, goals, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ",
        )
        .bind(persona.id.to_string())
        .bind(user_id.to_string())
        .bind(&persona.name)
        .bind(&persona.description)
        .bind(&persona.audience)
        .bind(&persona.tone)
        .bind(&persona.goals)
        .bind(timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(e, "create persona", || {
                format!("Persona '{}' already exists", persona.name)
            })
        })?;

        Ok(persona)
    }

    /// Get one of the user's personas
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(&self, user_id: Uuid, persona_id: Uuid) -> AppResult<Option<AudiencePersona>> {
        let row = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM audience_personas WHERE id = $1 AND user_id = $2"
        ))
        .bind(persona_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get persona: {e}")))?;
        row.map(|r| row_to_persona(&r)).transpose()
    }

    /// List the user's personas by name
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list(&self, user_id: Uuid) -> AppResult<Vec<AudiencePersona>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERSONA_COLUMNS} FROM audience_personas WHERE user_id = $1 ORDER BY name COLLATE NOCASE"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list personas: {e}")))?;
        rows.iter().map(row_to_persona).collect()
    }

    /// Replace a persona's fields
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the persona is not the user's, or a conflict on
    /// duplicate name
    pub async fn update(
        &self,
        user_id: Uuid,
        persona_id: Uuid,
        fields: PersonaFields,
    ) -> AppResult<AudiencePersona> {
        let result = sqlx::query(
            r"
            UPDATE audience_personas SET
                name = $1, description = $2, audience = $3, tone = $4, goals = $5, updated_at = $6
            WHERE id = $7 AND user_id = $8
            ",
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.audience)
        .bind(&fields.tone)
        .bind(&fields.goals)
        .bind(timestamp(Utc::now()))
        .bind(persona_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(e, "update persona", || {
                format!("Persona '{}' already exists", fields.name)
            })
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Persona"));
        }
        self.get(user_id, persona_id)
            .await?
            .ok_or_else(|| AppError::not_found("Persona"))
    }

    /// Delete a persona
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete(&self, user_id: Uuid, persona_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM audience_personas WHERE id = $1 AND user_id = $2")
            .bind(persona_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete persona: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_persona(row: &SqliteRow) -> AppResult<AudiencePersona> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(AudiencePersona {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        name: row.get("name"),
        description: row.get("description"),
        audience: row.get("audience"),
        tone: row.get("tone"),
        goals: row.get("goals"),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
