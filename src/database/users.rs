// ABOUTME: User account persistence: registration, lookup and subscription updates
// ABOUTME: Implemented directly on Database since every request resolves a user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::Utc;
use recast_core::errors::{AppError, AppResult};
use recast_core::models::{PaymentProvider, SubscriptionPlan, SubscriptionStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    execute_all, optional_timestamp, parse_datetime, parse_optional_datetime, parse_uuid,
    timestamp, write_error, Database,
};
use crate::models::{SubscriptionUpdate, User};

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[r"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            display_name TEXT,
            password_hash TEXT NOT NULL,
            plan TEXT NOT NULL DEFAULT 'free',
            subscription_status TEXT NOT NULL DEFAULT 'inactive',
            subscription_provider TEXT,
            paddle_subscription_id TEXT,
            current_period_end TEXT,
            twitter_username TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "],
    )
    .await
}

const USER_COLUMNS: &str = r"
    id, email, display_name, password_hash, plan, subscription_status,
    subscription_provider, paddle_subscription_id, current_period_end,
    twitter_username, created_at, updated_at
";

impl Database {
    /// Insert a new user
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if the email is taken, or a database error
    pub async fn create_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO users (
                id, email, display_name, password_hash, plan, subscription_status,
                subscription_provider, paddle_subscription_id, current_period_end,
                twitter_username, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.plan.as_str())
        .bind(user.subscription_status.as_str())
        .bind(user.subscription_provider.map(|p| p.as_str()))
        .bind(&user.paddle_subscription_id)
        .bind(optional_timestamp(user.current_period_end))
        .bind(&user.twitter_username)
        .bind(timestamp(user.created_at))
        .bind(timestamp(user.updated_at))
        .execute(self.pool())
        .await
        .map_err(|e| {
            write_error(e, "create user", || {
                "An account with this email already exists".to_owned()
            })
        })?;
        Ok(())
    }

    /// Look up a user by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    /// Look up a user by id, failing with `404` when absent
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the user does not exist
    pub async fn require_user(&self, user_id: Uuid) -> AppResult<User> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Look up a user by email (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get user by email: {e}")))?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    /// Replace a user's subscription fields
    ///
    /// A `None` Paddle subscription id keeps the stored one.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the user does not exist
    pub async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users SET
                plan = $1,
                subscription_status = $2,
                subscription_provider = COALESCE($3, subscription_provider),
                paddle_subscription_id = COALESCE($4, paddle_subscription_id),
                current_period_end = COALESCE($5, current_period_end),
                updated_at = $6
            WHERE id = $7
            ",
        )
        .bind(update.plan.as_str())
        .bind(update.status.as_str())
        .bind(update.provider.map(|p| p.as_str()))
        .bind(&update.paddle_subscription_id)
        .bind(optional_timestamp(update.current_period_end))
        .bind(timestamp(Utc::now()))
        .bind(user_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update subscription: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    /// Change only the subscription status, keeping the plan
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the user does not exist
    pub async fn set_subscription_status(
        &self,
        user_id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET subscription_status = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(timestamp(Utc::now()))
        .bind(user_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update subscription status: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    /// Record (or clear) the connected Twitter handle
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_twitter_username(
        &self,
        user_id: Uuid,
        username: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE users SET twitter_username = $1, updated_at = $2 WHERE id = $3")
            .bind(username)
            .bind(timestamp(Utc::now()))
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to set twitter username: {e}")))?;
        Ok(())
    }
}

fn row_to_user(row: &SqliteRow) -> AppResult<User> {
    let id: String = row.get("id");
    let plan: String = row.get("plan");
    let status: String = row.get("subscription_status");
    let provider: Option<String> = row.get("subscription_provider");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(User {
        id: parse_uuid(&id)?,
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        plan: SubscriptionPlan::parse(&plan).unwrap_or_default(),
        subscription_status: SubscriptionStatus::parse(&status),
        subscription_provider: provider.as_deref().and_then(PaymentProvider::parse),
        paddle_subscription_id: row.get("paddle_subscription_id"),
        current_period_end: parse_optional_datetime(row.get("current_period_end"))?,
        twitter_username: row.get("twitter_username"),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
