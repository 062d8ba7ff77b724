// ABOUTME: Payment history for Paddle charges and manual crypto payment intents
// ABOUTME: External references (order ids, tx signatures, txids) can back only one payment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use chrono::{DateTime, Utc};
use recast_core::errors::{AppError, AppResult};
use recast_core::models::{PaymentProvider, PaymentStatus, SubscriptionPlan};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    execute_all, optional_timestamp, parse_datetime, parse_optional_datetime, parse_uuid,
    timestamp, write_error,
};
use crate::models::Payment;

pub(super) async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    execute_all(
        pool,
        &[
            r"
            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                provider TEXT NOT NULL,
                status TEXT NOT NULL,
                plan TEXT NOT NULL,
                amount INTEGER NOT NULL,
                currency TEXT NOT NULL,
                external_reference TEXT UNIQUE,
                receiving_address TEXT,
                expires_at TEXT,
                created_at TEXT NOT NULL,
                confirmed_at TEXT
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id, created_at)",
        ],
    )
    .await
}

/// A payment to record
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Payment rail
    pub provider: PaymentProvider,
    /// Initial status
    pub status: PaymentStatus,
    /// Plan purchased
    pub plan: SubscriptionPlan,
    /// Amount in minor units
    pub amount: i64,
    /// Currency code
    pub currency: String,
    /// External reference if already known
    pub external_reference: Option<String>,
    /// Address funds are expected at
    pub receiving_address: Option<String>,
    /// Intent expiry
    pub expires_at: Option<DateTime<Utc>>,
}

/// Payment database operations
#[derive(Clone)]
pub struct PaymentsManager {
    pool: SqlitePool,
}

const PAYMENT_COLUMNS: &str = r"
    id, user_id, provider, status, plan, amount, currency, external_reference,
    receiving_address, expires_at, created_at, confirmed_at
";

fn reference_conflict() -> String {
    "This payment reference has already been used".to_owned()
}

impl PaymentsManager {
    /// Create a new manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a payment
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if the external reference is already recorded
    pub async fn create(&self, user_id: Uuid, new: NewPayment) -> AppResult<Payment> {
        let now = Utc::now();
        let confirmed_at = (new.status == PaymentStatus::Confirmed).then_some(now);
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            provider: new.provider,
            status: new.status,
            plan: new.plan,
            amount: new.amount,
            currency: new.currency,
            external_reference: new.external_reference,
            receiving_address: new.receiving_address,
            expires_at: new.expires_at,
            created_at: now,
            confirmed_at,
        };

        sqlx::query(
            r"
            INSERT INTO payments (
                id, user_id, provider, status, plan, amount, currency, external_reference,
                receiving_address, expires_at, created_at, confirmed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(payment.id.to_string())
        .bind(user_id.to_string())
        .bind(payment.provider.as_str())
        .bind(payment.status.as_str())
        .bind(payment.plan.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.external_reference)
        .bind(&payment.receiving_address)
        .bind(optional_timestamp(payment.expires_at))
        .bind(timestamp(now))
        .bind(optional_timestamp(confirmed_at))
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "record payment", reference_conflict))?;

        Ok(payment)
    }

    /// Get one of the user's payments
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(&self, user_id: Uuid, payment_id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND user_id = $2"
        ))
        .bind(payment_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get payment: {e}")))?;
        row.map(|r| row_to_payment(&r)).transpose()
    }

    /// Whether any payment already carries `reference`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn reference_exists(&self, reference: &str) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE external_reference = $1")
                .bind(reference)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::database(format!("Failed to check payment reference: {e}"))
                })?;
        Ok(count > 0)
    }

    /// The user's payment history, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list payments: {e}")))?;
        rows.iter().map(row_to_payment).collect()
    }

    /// Mark a pending intent as paid by `reference`
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if `reference` backs another payment,
    /// or `RESOURCE_NOT_FOUND` if the payment is not pending
    pub async fn confirm(
        &self,
        payment_id: Uuid,
        reference: &str,
        confirmed_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE payments SET status = $1, external_reference = $2, confirmed_at = $3
            WHERE id = $4 AND status = $5
            ",
        )
        .bind(PaymentStatus::Confirmed.as_str())
        .bind(reference)
        .bind(timestamp(confirmed_at))
        .bind(payment_id.to_string())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "confirm payment", reference_conflict))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Pending payment"));
        }
        Ok(())
    }

    /// Move a payment to a terminal status
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_status(&self, payment_id: Uuid, status: PaymentStatus) -> AppResult<()> {
        sqlx::query("UPDATE payments SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(payment_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update payment status: {e}")))?;
        Ok(())
    }
}

fn row_to_payment(row: &SqliteRow) -> AppResult<Payment> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let provider: String = row.get("provider");
    let status: String = row.get("status");
    let plan: String = row.get("plan");
    let created_at: String = row.get("created_at");

    Ok(Payment {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        provider: PaymentProvider::parse(&provider)
            .ok_or_else(|| AppError::internal(format!("Unknown payment provider '{provider}'")))?,
        status: PaymentStatus::parse(&status),
        plan: SubscriptionPlan::parse(&plan).unwrap_or_default(),
        amount: row.get("amount"),
        currency: row.get("currency"),
        external_reference: row.get("external_reference"),
        receiving_address: row.get("receiving_address"),
        expires_at: parse_optional_datetime(row.get("expires_at"))?,
        created_at: parse_datetime(&created_at)?,
        confirmed_at: parse_optional_datetime(row.get("confirmed_at"))?,
    })
}
