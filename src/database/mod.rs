// ABOUTME: SQLite persistence layer with schema migrations and per-domain managers
// ABOUTME: Owns the connection pool and the cipher used for secrets at rest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Database
//!
//! `Database` wraps the sqlx pool. User, API-key and Twitter-connection
//! queries live directly on `Database` because they need the secret cipher;
//! the remaining domains get a small `*Manager` that holds a pool clone.
//!
//! Ids are stored as UUID text and timestamps as RFC 3339 text.

/// User accounts and subscription state
pub mod users;

/// Encrypted per-provider LLM API keys
pub mod api_keys;

/// Encrypted Twitter connections
pub mod twitter;

/// Transient PKCE state records
pub mod oauth_states;

/// Content pieces
pub mod content;

/// Repurposed snippets
pub mod snippets;

/// Folders
pub mod folders;

/// Audience personas
pub mod personas;

/// Snippet templates and marketplace
pub mod templates;

/// Payment history and crypto intents
pub mod payments;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use recast_core::constants::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use recast_core::errors::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::crypto::SecretCipher;

pub use content::{ContentFilter, ContentManager, ContentUpdate, NewContent};
pub use folders::FoldersManager;
pub use oauth_states::OAuthStatesManager;
pub use payments::{NewPayment, PaymentsManager};
pub use personas::{PersonaFields, PersonasManager};
pub use snippets::{NewSnippetGroup, SnippetUpdate, SnippetsManager};
pub use templates::{TemplateFields, TemplatesManager};

/// Database handle shared by all request handlers
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
    cipher: SecretCipher,
}

impl Database {
    /// Open (creating if needed) the database and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails or a migration fails
    pub async fn new(database_url: &str, cipher: SecretCipher) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            // Each in-memory connection is its own database, so pin the pool to one.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(10)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool, cipher };
        db.migrate().await?;
        Ok(db)
    }

    /// Run all idempotent schema migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        users::migrate(&self.pool).await?;
        api_keys::migrate(&self.pool).await?;
        twitter::migrate(&self.pool).await?;
        oauth_states::migrate(&self.pool).await?;
        folders::migrate(&self.pool).await?;
        content::migrate(&self.pool).await?;
        snippets::migrate(&self.pool).await?;
        personas::migrate(&self.pool).await?;
        templates::migrate(&self.pool).await?;
        payments::migrate(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Underlying connection pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cipher for secrets at rest
    #[must_use]
    pub const fn cipher(&self) -> &SecretCipher {
        &self.cipher
    }

    /// Liveness check used by the readiness endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not answer
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Database ping failed: {e}")))?;
        Ok(())
    }
}

/// Run a list of DDL statements in order
pub(crate) async fn execute_all(pool: &SqlitePool, statements: &[&str]) -> AppResult<()> {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
    }
    Ok(())
}

/// Map a write error, turning unique-constraint violations into a conflict
pub(crate) fn write_error(
    error: sqlx::Error,
    action: &str,
    conflict: impl FnOnce() -> String,
) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::already_exists(conflict())
        }
        _ => AppError::database(format!("Failed to {action}: {error}")),
    }
}

/// Fixed-width RFC 3339 text so stored timestamps compare correctly as strings
pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn optional_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(timestamp)
}

pub(crate) fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::internal(format!("Invalid UUID: {e}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>) -> AppResult<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_datetime(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::internal(format!("Invalid datetime: {e}")))
}

pub(crate) fn parse_optional_datetime(value: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_datetime).transpose()
}

/// Clamp client pagination to sane bounds
#[must_use]
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}
