// ABOUTME: Paddle classic webhook signature verification and alert parsing
// ABOUTME: Verifies p_signature (RSA PKCS#1 v1.5 over SHA-1 of PHP-serialized fields)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Paddle Webhooks
//!
//! Paddle classic signs every alert: all form fields except `p_signature` are
//! sorted by key, serialized the way PHP's `serialize()` writes a string
//! array, hashed with SHA-1 and signed with the vendor's RSA key.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use recast_core::errors::{AppError, AppResult, ErrorCode};
use recast_core::models::SubscriptionPlan;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use uuid::Uuid;

/// Form field carrying the signature
pub const SIGNATURE_FIELD: &str = "p_signature";

/// Serialize fields as a PHP `array(string => string)` in key order
///
/// String lengths are byte lengths, as PHP counts them.
#[must_use]
pub fn php_serialize(fields: &BTreeMap<&str, &str>) -> String {
    let mut out = format!("a:{}:{{", fields.len());
    for (key, value) in fields {
        let _ = write!(out, "s:{}:\"{key}\";s:{}:\"{value}\";", key.len(), value.len());
    }
    out.push('}');
    out
}

/// Parse a PEM public key in either SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 form
///
/// # Errors
///
/// Returns `CONFIG_INVALID` if the PEM cannot be parsed
pub fn parse_public_key(pem: &str) -> AppResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem.trim())
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem.trim()))
        .map_err(|e| {
            AppError::new(ErrorCode::ConfigInvalid, format!("Invalid PADDLE_PUBLIC_KEY: {e}"))
        })
}

/// Verify the `p_signature` of a webhook form
///
/// # Errors
///
/// Returns `AUTH_INVALID` if the signature is missing, malformed or wrong
pub fn verify_signature(fields: &[(String, String)], public_key: &RsaPublicKey) -> AppResult<()> {
    let signature = fields
        .iter()
        .find(|(key, _)| key == SIGNATURE_FIELD)
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| AppError::auth_invalid("Missing Paddle signature"))?;
    let signature = STANDARD
        .decode(signature.trim())
        .map_err(|_| AppError::auth_invalid("Malformed Paddle signature"))?;

    let signed: BTreeMap<&str, &str> = fields
        .iter()
        .filter(|(key, _)| key != SIGNATURE_FIELD)
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    let digest = Sha1::digest(php_serialize(&signed).as_bytes());

    public_key
        .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
        .map_err(|_| AppError::auth_invalid("Invalid Paddle signature"))
}

#[derive(Deserialize)]
struct Passthrough {
    user_id: Uuid,
}

/// How to find the account an alert is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertUser {
    /// From the `passthrough` JSON set at checkout
    pub user_id: Option<Uuid>,
    /// Customer email, used when passthrough is absent
    pub email: Option<String>,
}

/// A verified Paddle alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaddleAlert {
    /// `subscription_created` or `subscription_updated`
    SubscriptionChanged {
        /// Account
        user: AlertUser,
        /// Paddle subscription id
        subscription_id: Option<String>,
        /// Paddle plan id
        plan_id: Option<String>,
        /// Next renewal
        next_bill_date: Option<DateTime<Utc>>,
    },
    /// `subscription_cancelled`
    SubscriptionCancelled {
        /// Account
        user: AlertUser,
    },
    /// `subscription_payment_succeeded`
    PaymentSucceeded {
        /// Account
        user: AlertUser,
        /// Paddle subscription id
        subscription_id: Option<String>,
        /// Paddle plan id
        plan_id: Option<String>,
        /// Paddle order id
        order_id: Option<String>,
        /// Gross amount in cents
        amount_cents: i64,
        /// ISO currency
        currency: String,
        /// Next renewal
        next_bill_date: Option<DateTime<Utc>>,
    },
    /// `subscription_payment_failed`
    PaymentFailed {
        /// Account
        user: AlertUser,
    },
    /// Any alert Recast does not act on
    Ignored {
        /// The `alert_name` received
        alert_name: String,
    },
}

impl PaddleAlert {
    /// Build an alert from verified form fields
    #[must_use]
    pub fn from_fields(fields: &[(String, String)]) -> Self {
        let map: HashMap<&str, &str> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let get = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let user = AlertUser {
            user_id: get("passthrough").as_deref().and_then(parse_passthrough),
            email: get("email"),
        };
        let next_bill_date = get("next_bill_date").as_deref().and_then(parse_bill_date);

        match map.get("alert_name").copied().unwrap_or_default() {
            "subscription_created" | "subscription_updated" => Self::SubscriptionChanged {
                user,
                subscription_id: get("subscription_id"),
                plan_id: get("subscription_plan_id"),
                next_bill_date,
            },
            "subscription_cancelled" => Self::SubscriptionCancelled { user },
            "subscription_payment_succeeded" => Self::PaymentSucceeded {
                user,
                subscription_id: get("subscription_id"),
                plan_id: get("subscription_plan_id"),
                order_id: get("order_id"),
                amount_cents: get("sale_gross")
                    .as_deref()
                    .and_then(parse_amount_cents)
                    .unwrap_or(0),
                currency: get("currency").unwrap_or_else(|| "USD".to_owned()),
                next_bill_date,
            },
            "subscription_payment_failed" => Self::PaymentFailed { user },
            other => Self::Ignored {
                alert_name: other.to_owned(),
            },
        }
    }

    /// Account the alert refers to, if any
    #[must_use]
    pub const fn user(&self) -> Option<&AlertUser> {
        match self {
            Self::SubscriptionChanged { user, .. }
            | Self::SubscriptionCancelled { user }
            | Self::PaymentSucceeded { user, .. }
            | Self::PaymentFailed { user } => Some(user),
            Self::Ignored { .. } => None,
        }
    }
}

/// Map a Paddle plan id to a plan using the configured table
#[must_use]
pub fn plan_for(
    plan_id: Option<&str>,
    plan_ids: &HashMap<String, SubscriptionPlan>,
) -> Option<SubscriptionPlan> {
    plan_id.and_then(|id| plan_ids.get(id).copied())
}

/// `{"user_id": "<uuid>"}` set as checkout passthrough
#[must_use]
pub fn parse_passthrough(raw: &str) -> Option<Uuid> {
    serde_json::from_str::<Passthrough>(raw)
        .map(|p| p.user_id)
        .ok()
        .or_else(|| Uuid::parse_str(raw.trim()).ok())
}

/// Decimal amount such as `"12.5"` to cents, rounding half away from zero
#[must_use]
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let value: f64 = raw.trim().parse().ok()?;
    value
        .is_finite()
        .then(|| (value * 100.0).round() as i64)
}

/// Paddle bill dates are `YYYY-MM-DD`; taken as midnight UTC
#[must_use]
pub fn parse_bill_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn sign(private_key: &RsaPrivateKey, form: &[(String, String)]) -> String {
        let signed: BTreeMap<&str, &str> = form
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let digest = Sha1::digest(php_serialize(&signed).as_bytes());
        let signature = private_key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .unwrap();
        STANDARD.encode(signature)
    }

    #[test]
    fn test_php_serialize_uses_byte_lengths_in_key_order() {
        let mut map = BTreeMap::new();
        map.insert("b", "é");
        map.insert("a", "x");
        assert_eq!(php_serialize(&map), r#"a:2:{s:1:"a";s:1:"x";s:1:"b";s:2:"é";}"#);
    }

    #[test]
    fn test_signature_roundtrip_and_tamper_detection() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let public_key = parse_public_key(&pem).unwrap();

        let mut form = fields(&[
            ("alert_name", "subscription_cancelled"),
            ("email", "ada@example.com"),
            ("subscription_id", "42"),
        ]);
        let signature = sign(&private_key, &form);
        form.push((SIGNATURE_FIELD.to_owned(), signature));
        assert!(verify_signature(&form, &public_key).is_ok());

        form[1].1 = "mallory@example.com".to_owned();
        let err = verify_signature(&form, &public_key).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);

        let unsigned = fields(&[("alert_name", "subscription_cancelled")]);
        assert!(verify_signature(&unsigned, &public_key).is_err());
    }

    #[test]
    fn test_alert_parsing() {
        let user_id = Uuid::new_v4();
        let passthrough = format!(r#"{{"user_id":"{user_id}"}}"#);
        let alert = PaddleAlert::from_fields(&fields(&[
            ("alert_name", "subscription_payment_succeeded"),
            ("passthrough", &passthrough),
            ("order_id", "ord-1"),
            ("sale_gross", "19.99"),
            ("currency", "EUR"),
            ("subscription_plan_id", "777"),
            ("next_bill_date", "2025-03-01"),
        ]));
        match alert {
            PaddleAlert::PaymentSucceeded {
                user,
                amount_cents,
                currency,
                order_id,
                next_bill_date,
                ..
            } => {
                assert_eq!(user.user_id, Some(user_id));
                assert_eq!(amount_cents, 1999);
                assert_eq!(currency, "EUR");
                assert_eq!(order_id.as_deref(), Some("ord-1"));
                assert_eq!(
                    next_bill_date.map(|d| d.to_rfc3339()),
                    Some("2025-03-01T00:00:00+00:00".to_owned())
                );
            }
            other => panic!("unexpected alert {other:?}"),
        }

        let ignored =
            PaddleAlert::from_fields(&fields(&[("alert_name", "high_risk_transaction_created")]));
        assert!(ignored.user().is_none());
    }

    #[test]
    fn test_plan_mapping() {
        let mut plans = HashMap::new();
        plans.insert("777".to_owned(), SubscriptionPlan::Pro);
        assert_eq!(plan_for(Some("777"), &plans), Some(SubscriptionPlan::Pro));
        assert_eq!(plan_for(Some("1"), &plans), None);
        assert_eq!(plan_for(None, &plans), None);
    }
}
