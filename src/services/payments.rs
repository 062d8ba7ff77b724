// ABOUTME: Subscription billing workflow for Paddle webhooks and manual crypto payments
// ABOUTME: Applies verified alerts to accounts and confirms crypto intents against the chain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Payments Workflow
//!
//! Paddle alerts are applied only after their signature checks out. Crypto
//! payments start as a pending intent with a fixed amount and address; the
//! user then submits a transaction reference which is looked up on chain.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use recast_core::constants::payments::{CRYPTO_PLAN_DAYS, INTENT_TTL_MINUTES};
use recast_core::errors::{AppError, AppResult, ErrorCode};
use recast_core::models::{PaymentProvider, PaymentStatus, SubscriptionPlan, SubscriptionStatus};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::environment::{ChainConfig, CryptoPaymentsConfig, PaddleConfig};
use crate::database::{Database, NewPayment, PaymentsManager};
use crate::models::{Payment, SubscriptionUpdate, User};
use crate::payments::blockchain::verify_transfer;
use crate::payments::paddle::{self, AlertUser, PaddleAlert};
use crate::payments::{
    BitcoinClient, ChainClient, RetryPolicy, RpcRateLimiter, SolanaClient, Verification,
};

/// Coins accepted for manual payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoCurrency {
    /// Solana, priced in lamports
    Sol,
    /// Bitcoin, priced in satoshis
    Btc,
}

impl CryptoCurrency {
    /// Payment rail for this coin
    #[must_use]
    pub const fn provider(self) -> PaymentProvider {
        match self {
            Self::Sol => PaymentProvider::Solana,
            Self::Btc => PaymentProvider::Bitcoin,
        }
    }

    /// Currency code stored on payments
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sol => "sol",
            Self::Btc => "btc",
        }
    }

    const fn from_provider(provider: PaymentProvider) -> Option<Self> {
        match provider {
            PaymentProvider::Solana => Some(Self::Sol),
            PaymentProvider::Bitcoin => Some(Self::Btc),
            PaymentProvider::Paddle => None,
        }
    }
}

/// Body of `POST /api/payments/crypto/intents`
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    /// Plan to buy
    pub plan: SubscriptionPlan,
    /// Coin to pay with
    pub currency: CryptoCurrency,
}

/// A pending crypto payment the user should now fund
#[derive(Debug, Serialize)]
pub struct PaymentIntent {
    /// Payment to verify later
    pub payment_id: Uuid,
    /// Where to send funds
    pub address: String,
    /// Exact amount in lamports or satoshis
    pub amount: i64,
    /// Coin
    pub currency: CryptoCurrency,
    /// After this the intent can no longer be confirmed
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful verification
#[derive(Debug, Serialize)]
pub struct VerifiedPayment {
    /// The confirmed payment
    pub payment: Payment,
    /// Plan now active
    pub plan: SubscriptionPlan,
    /// End of the paid period
    pub current_period_end: DateTime<Utc>,
}

/// What a webhook did, for logging and the acknowledgement body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum WebhookOutcome {
    /// The account was updated
    Applied {
        /// Affected account
        user_id: Uuid,
    },
    /// Valid alert with nothing to do
    Ignored {
        /// Why nothing happened
        reason: String,
    },
}

/// Chain lookups used for verification
#[derive(Clone)]
pub struct ChainClients {
    solana: Arc<dyn ChainClient>,
    bitcoin: Arc<dyn ChainClient>,
}

impl ChainClients {
    /// Real RPC clients sharing one rate limiter
    #[must_use]
    pub fn new(http: &Client, config: &CryptoPaymentsConfig, limiter: &RpcRateLimiter) -> Self {
        Self {
            solana: Arc::new(SolanaClient::new(
                http.clone(),
                &config.solana.endpoint,
                limiter.clone(),
            )),
            bitcoin: Arc::new(BitcoinClient::new(
                http.clone(),
                &config.bitcoin.endpoint,
                limiter.clone(),
            )),
        }
    }

    /// Use the given clients, e.g. scripted ones in tests
    #[must_use]
    pub fn from_clients(solana: Arc<dyn ChainClient>, bitcoin: Arc<dyn ChainClient>) -> Self {
        Self { solana, bitcoin }
    }

    fn for_currency(&self, currency: CryptoCurrency) -> &dyn ChainClient {
        match currency {
            CryptoCurrency::Sol => self.solana.as_ref(),
            CryptoCurrency::Btc => self.bitcoin.as_ref(),
        }
    }
}

/// Billing operations
pub struct PaymentService<'a> {
    database: &'a Database,
    paddle: &'a PaddleConfig,
    crypto: &'a CryptoPaymentsConfig,
    chains: &'a ChainClients,
}

impl<'a> PaymentService<'a> {
    /// Create the service from shared resources
    #[must_use]
    pub const fn new(
        database: &'a Database,
        paddle: &'a PaddleConfig,
        crypto: &'a CryptoPaymentsConfig,
        chains: &'a ChainClients,
    ) -> Self {
        Self {
            database,
            paddle,
            crypto,
            chains,
        }
    }

    fn payments(&self) -> PaymentsManager {
        PaymentsManager::new(self.database.pool().clone())
    }

    /// Verify and apply a Paddle webhook form
    ///
    /// Alerts for unknown accounts are acknowledged and ignored so Paddle
    /// stops retrying them.
    ///
    /// # Errors
    ///
    /// - `CONFIG_MISSING` when no Paddle public key is configured
    /// - `AUTH_INVALID` when the signature is missing or wrong
    #[instrument(skip_all)]
    pub async fn handle_paddle_webhook(
        &self,
        fields: &[(String, String)],
    ) -> AppResult<WebhookOutcome> {
        let pem = self.paddle.public_key_pem.as_deref().ok_or_else(|| {
            AppError::config_missing("PADDLE_PUBLIC_KEY is not set; Paddle webhooks are refused")
        })?;
        let public_key = paddle::parse_public_key(pem)?;
        paddle::verify_signature(fields, &public_key)?;

        let alert = PaddleAlert::from_fields(fields);
        if let PaddleAlert::Ignored { alert_name } = &alert {
            info!(alert_name = %alert_name, "Ignoring Paddle alert");
            return Ok(WebhookOutcome::Ignored {
                reason: format!("unhandled alert '{alert_name}'"),
            });
        }
        let Some(user) = self.locate_user(alert.user()).await? else {
            warn!("Paddle alert does not match any account");
            return Ok(WebhookOutcome::Ignored {
                reason: "unknown account".to_owned(),
            });
        };

        self.apply_alert(&user, alert).await?;
        Ok(WebhookOutcome::Applied { user_id: user.id })
    }

    async fn locate_user(&self, alert_user: Option<&AlertUser>) -> AppResult<Option<User>> {
        let Some(alert_user) = alert_user else {
            return Ok(None);
        };
        if let Some(user_id) = alert_user.user_id {
            if let Some(user) = self.database.get_user(user_id).await? {
                return Ok(Some(user));
            }
        }
        match alert_user.email.as_deref() {
            Some(email) => self.database.get_user_by_email(email).await,
            None => Ok(None),
        }
    }

    fn mapped_plan(&self, plan_id: Option<&str>, user: &User) -> SubscriptionPlan {
        paddle::plan_for(plan_id, &self.paddle.plan_ids).unwrap_or_else(|| {
            warn!(
                plan_id = plan_id.unwrap_or("-"),
                "Unmapped Paddle plan id, keeping current plan"
            );
            user.plan
        })
    }

    async fn apply_alert(&self, user: &User, alert: PaddleAlert) -> AppResult<()> {
        match alert {
            PaddleAlert::SubscriptionChanged {
                subscription_id,
                plan_id,
                next_bill_date,
                ..
            } => {
                let plan = self.mapped_plan(plan_id.as_deref(), user);
                self.database
                    .update_subscription(
                        user.id,
                        &SubscriptionUpdate {
                            plan,
                            status: SubscriptionStatus::Active,
                            provider: Some(PaymentProvider::Paddle),
                            paddle_subscription_id: subscription_id,
                            current_period_end: next_bill_date,
                        },
                    )
                    .await?;
                info!(user_id = %user.id, plan = plan.as_str(), "Paddle subscription updated");
            }
            PaddleAlert::SubscriptionCancelled { .. } => {
                self.database
                    .set_subscription_status(user.id, SubscriptionStatus::Cancelled)
                    .await?;
                info!(user_id = %user.id, "Paddle subscription cancelled");
            }
            PaddleAlert::PaymentSucceeded {
                subscription_id,
                plan_id,
                order_id,
                amount_cents,
                currency,
                next_bill_date,
                ..
            } => {
                let plan = self.mapped_plan(plan_id.as_deref(), user);
                let recorded = self
                    .payments()
                    .create(
                        user.id,
                        NewPayment {
                            provider: PaymentProvider::Paddle,
                            status: PaymentStatus::Confirmed,
                            plan,
                            amount: amount_cents,
                            currency,
                            external_reference: order_id,
                            receiving_address: None,
                            expires_at: None,
                        },
                    )
                    .await;
                match recorded {
                    Ok(payment) => {
                        info!(
                            user_id = %user.id,
                            payment_id = %payment.id,
                            "Recorded Paddle payment"
                        );
                    }
                    // Paddle redelivers alerts; the order is already on file
                    Err(e) if e.code == ErrorCode::ResourceAlreadyExists => {
                        info!(user_id = %user.id, "Paddle payment already recorded");
                    }
                    Err(e) => return Err(e),
                }
                self.database
                    .update_subscription(
                        user.id,
                        &SubscriptionUpdate {
                            plan,
                            status: SubscriptionStatus::Active,
                            provider: Some(PaymentProvider::Paddle),
                            paddle_subscription_id: subscription_id,
                            current_period_end: next_bill_date,
                        },
                    )
                    .await?;
            }
            PaddleAlert::PaymentFailed { .. } => {
                self.database
                    .set_subscription_status(user.id, SubscriptionStatus::PastDue)
                    .await?;
                warn!(user_id = %user.id, "Paddle renewal failed");
            }
            PaddleAlert::Ignored { .. } => {}
        }
        Ok(())
    }

    fn chain_config(&self, currency: CryptoCurrency) -> &ChainConfig {
        match currency {
            CryptoCurrency::Sol => &self.crypto.solana,
            CryptoCurrency::Btc => &self.crypto.bitcoin,
        }
    }

    /// Open a pending crypto payment for `plan`
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` when the coin has no receiving address or no
    /// price for the plan
    pub async fn create_intent(
        &self,
        user_id: Uuid,
        request: &CreateIntentRequest,
    ) -> AppResult<PaymentIntent> {
        let chain = self.chain_config(request.currency);
        let address = chain.receiving_address.clone().ok_or_else(|| {
            AppError::invalid_input(format!(
                "{} payments are not available",
                request.currency.as_str().to_uppercase()
            ))
        })?;
        let amount = chain
            .prices
            .for_plan(request.plan)
            .and_then(|price| i64::try_from(price).ok())
            .ok_or_else(|| {
                AppError::invalid_input(format!(
                    "The {} plan cannot be bought with {}",
                    request.plan.as_str(),
                    request.currency.as_str().to_uppercase()
                ))
            })?;

        let expires_at = Utc::now() + ChronoDuration::minutes(INTENT_TTL_MINUTES);
        let payment = self
            .payments()
            .create(
                user_id,
                NewPayment {
                    provider: request.currency.provider(),
                    status: PaymentStatus::Pending,
                    plan: request.plan,
                    amount,
                    currency: request.currency.as_str().to_owned(),
                    external_reference: None,
                    receiving_address: Some(address.clone()),
                    expires_at: Some(expires_at),
                },
            )
            .await?;

        info!(
            %user_id,
            payment_id = %payment.id,
            currency = request.currency.as_str(),
            "Created crypto payment intent"
        );
        Ok(PaymentIntent {
            payment_id: payment.id,
            address,
            amount,
            currency: request.currency,
            expires_at,
        })
    }

    /// Confirm a crypto intent with the transaction that paid it
    ///
    /// On success the payment is confirmed and the user's plan is active for
    /// the next 30 days.
    ///
    /// # Errors
    ///
    /// - `RESOURCE_NOT_FOUND` for an unknown intent
    /// - `RESOURCE_ALREADY_EXISTS` when the reference backs another payment
    /// - `INVALID_INPUT` when the intent expired or the transaction failed or
    ///   paid too little
    /// - `RESOURCE_UNAVAILABLE` when the transaction is not visible yet
    #[instrument(skip(self, reference))]
    pub async fn verify_intent(
        &self,
        user_id: Uuid,
        payment_id: Uuid,
        reference: &str,
    ) -> AppResult<VerifiedPayment> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AppError::new(
                ErrorCode::MissingRequiredField,
                "A transaction reference is required",
            ));
        }
        let payments = self.payments();
        let payment = payments
            .get(user_id, payment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))?;
        let currency = CryptoCurrency::from_provider(payment.provider)
            .ok_or_else(|| AppError::invalid_input("Only crypto payments can be verified"))?;

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Confirmed => {
                return Err(AppError::already_exists("This payment is already confirmed"));
            }
            PaymentStatus::Expired => {
                return Err(AppError::invalid_input("This payment intent has expired"));
            }
            PaymentStatus::Failed => {
                return Err(AppError::invalid_input("This payment intent has failed"));
            }
        }
        let now = Utc::now();
        if payment.expires_at.is_some_and(|at| now >= at) {
            payments.set_status(payment.id, PaymentStatus::Expired).await?;
            return Err(AppError::invalid_input("This payment intent has expired"));
        }
        if payments.reference_exists(reference).await? {
            return Err(AppError::already_exists(
                "This payment reference has already been used",
            ));
        }

        let address = payment
            .receiving_address
            .as_deref()
            .ok_or_else(|| AppError::internal("Crypto payment has no receiving address"))?;
        let expected = u64::try_from(payment.amount)
            .map_err(|_| AppError::internal("Crypto payment has a negative amount"))?;
        let policy = RetryPolicy {
            attempts: self.crypto.verify_attempts,
            delay: Duration::from_millis(self.crypto.verify_delay_ms),
        };

        let client = self.chains.for_currency(currency);
        match verify_transfer(client, reference, address, expected, policy).await? {
            Verification::Confirmed { received } => {
                info!(%user_id, %payment_id, received, "Crypto payment confirmed on chain");
            }
            Verification::Pending => {
                return Err(AppError::new(
                    ErrorCode::ResourceUnavailable,
                    "Transaction not found yet. Try again in a few minutes.",
                ));
            }
            Verification::Failed => {
                return Err(AppError::invalid_input("The transaction failed on chain"));
            }
            Verification::Insufficient { received } => {
                return Err(AppError::invalid_input(format!(
                    "The transaction paid {received} to the receiving address; {expected} is required"
                )));
            }
        }

        payments.confirm(payment.id, reference, now).await?;
        let current_period_end = now + ChronoDuration::days(CRYPTO_PLAN_DAYS);
        self.database
            .update_subscription(
                user_id,
                &SubscriptionUpdate {
                    plan: payment.plan,
                    status: SubscriptionStatus::Active,
                    provider: Some(payment.provider),
                    paddle_subscription_id: None,
                    current_period_end: Some(current_period_end),
                },
            )
            .await?;

        let payment = payments
            .get(user_id, payment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))?;
        Ok(VerifiedPayment {
            plan: payment.plan,
            payment,
            current_period_end,
        })
    }

    /// The user's payments, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn history(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        self.payments().list_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_wire_format() {
        let request: CreateIntentRequest =
            serde_json::from_str(r#"{"plan":"pro","currency":"btc"}"#).unwrap();
        assert_eq!(request.plan, SubscriptionPlan::Pro);
        assert_eq!(request.currency, CryptoCurrency::Btc);
        assert_eq!(request.currency.provider(), PaymentProvider::Bitcoin);
        let unsupported = r#"{"plan":"pro","currency":"eth"}"#;
        assert!(serde_json::from_str::<CreateIntentRequest>(unsupported).is_err());
    }

    #[test]
    fn test_paddle_is_not_a_crypto_rail() {
        assert_eq!(CryptoCurrency::from_provider(PaymentProvider::Paddle), None);
        assert_eq!(
            CryptoCurrency::from_provider(PaymentProvider::Solana),
            Some(CryptoCurrency::Sol)
        );
    }

    #[test]
    fn test_webhook_outcome_body() {
        let body = serde_json::to_value(WebhookOutcome::Ignored {
            reason: "unknown account".to_owned(),
        })
        .unwrap();
        assert_eq!(body["result"], "ignored");
        assert_eq!(body["reason"], "unknown account");
    }
}
