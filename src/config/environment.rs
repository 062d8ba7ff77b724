// ABOUTME: Environment-based server configuration for HTTP, security, vendors and payments
// ABOUTME: Parses typed settings from env vars with defaults and masks secrets in summaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Environment-only configuration.
//!
//! Every setting comes from an environment variable. [`ServerConfig::from_lookup`]
//! takes any key lookup so tests can supply values without mutating the process
//! environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use recast_core::constants::{auth, llm, media, payments, ports, twitter};
use recast_core::errors::{AppError, AppResult, ErrorCode};
use recast_core::models::SubscriptionPlan;
use tracing::warn;
use zeroize::Zeroizing;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
}

/// Authentication and encryption settings
#[derive(Clone)]
pub struct SecurityConfig {
    /// HS256 signing secret for API tokens
    pub jwt_secret: Zeroizing<String>,
    /// Token lifetime
    pub jwt_expiry_hours: i64,
    /// AES-256 key protecting API keys and OAuth tokens at rest
    pub encryption_key: Zeroizing<[u8; 32]>,
    /// Key guarding maintenance endpoints; `None` disables them
    pub admin_api_key: Option<Zeroizing<String>>,
    /// Allowed CORS origins (`*` for any)
    pub cors_origins: Vec<String>,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("encryption_key", &"[REDACTED]")
            .field("admin_api_key", &self.admin_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("cors_origins", &self.cors_origins)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// LLM vendor endpoints
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `OpenAI` API base URL
    pub openai_base_url: String,
    /// Gemini API base URL
    pub gemini_base_url: String,
    /// Perplexity API base URL
    pub perplexity_base_url: String,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_base_url: llm::OPENAI_API_BASE.to_owned(),
            gemini_base_url: llm::GEMINI_API_BASE.to_owned(),
            perplexity_base_url: llm::PERPLEXITY_API_BASE.to_owned(),
            timeout_secs: llm::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Twitter/X OAuth2 application settings
#[derive(Clone)]
pub struct TwitterConfig {
    /// OAuth2 client id; `None` disables the integration
    pub client_id: Option<String>,
    /// OAuth2 client secret for confidential clients
    pub client_secret: Option<Zeroizing<String>>,
    /// Callback URL registered with Twitter
    pub redirect_uri: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// REST API base URL
    pub api_base_url: String,
}

impl fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Paddle classic webhook settings
#[derive(Debug, Clone, Default)]
pub struct PaddleConfig {
    /// Vendor public key (PEM) used to verify `p_signature`
    pub public_key_pem: Option<String>,
    /// Paddle plan id to internal plan
    pub plan_ids: HashMap<String, SubscriptionPlan>,
}

/// Price of each paid plan in the chain's smallest unit
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanPrices {
    /// Price of the pro plan
    pub pro: u64,
    /// Price of the business plan
    pub business: u64,
}

impl PlanPrices {
    /// Price for `plan`, `None` for the free plan or an unset price
    #[must_use]
    pub const fn for_plan(&self, plan: SubscriptionPlan) -> Option<u64> {
        let price = match plan {
            SubscriptionPlan::Free => 0,
            SubscriptionPlan::Pro => self.pro,
            SubscriptionPlan::Business => self.business,
        };
        if price == 0 {
            None
        } else {
            Some(price)
        }
    }
}

/// One blockchain's receiving settings
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// RPC or indexer endpoint
    pub endpoint: String,
    /// Address payments must be sent to; `None` disables this chain
    pub receiving_address: Option<String>,
    /// Plan prices in lamports or satoshis
    pub prices: PlanPrices,
}

/// Manual crypto payment settings
#[derive(Debug, Clone)]
pub struct CryptoPaymentsConfig {
    /// Solana settings (lamports)
    pub solana: ChainConfig,
    /// Bitcoin settings (satoshis)
    pub bitcoin: ChainConfig,
    /// Minimum spacing between calls to the same endpoint
    pub min_rpc_interval_ms: u64,
    /// Lookups before reporting a transaction as not found
    pub verify_attempts: u32,
    /// Delay between lookups
    pub verify_delay_ms: u64,
}

/// Cloudinary credentials
#[derive(Clone)]
pub struct CloudinaryConfig {
    /// Cloud name
    pub cloud_name: String,
    /// API key
    pub api_key: String,
    /// API secret used to sign uploads
    pub api_secret: Zeroizing<String>,
    /// Upload API base URL
    pub api_base_url: String,
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Database settings
    pub database: DatabaseConfig,
    /// Authentication and encryption
    pub security: SecurityConfig,
    /// Web app base URL used for OAuth redirects
    pub frontend_url: String,
    /// LLM vendor endpoints
    pub llm: LlmConfig,
    /// Twitter/X integration
    pub twitter: TwitterConfig,
    /// Paddle webhooks
    pub paddle: PaddleConfig,
    /// Manual crypto payments
    pub crypto_payments: CryptoPaymentsConfig,
    /// Cloudinary uploads; `None` disables the upload endpoint
    pub cloudinary: Option<CloudinaryConfig>,
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn env_var_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_owned())
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> AppResult<T> {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.parse().map_err(|_| {
                AppError::new(ErrorCode::ConfigInvalid, format!("Invalid {key} value: {raw}"))
            })
        })
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or a production secret is missing
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or a production secret is missing
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let environment = Environment::from_str_or_default(&env.env_var_or("ENVIRONMENT", ""));

        Ok(Self {
            http_port: env.parse_or("HTTP_PORT", ports::DEFAULT_HTTP_PORT)?,
            environment,
            database: DatabaseConfig {
                url: env.env_var_or("DATABASE_URL", "sqlite:./data/recast.db"),
            },
            security: load_security(&env, environment)?,
            frontend_url: env
                .env_var_or("FRONTEND_URL", "http://localhost:5173")
                .trim_end_matches('/')
                .to_owned(),
            llm: LlmConfig {
                openai_base_url: env.env_var_or("OPENAI_BASE_URL", llm::OPENAI_API_BASE),
                gemini_base_url: env.env_var_or("GEMINI_BASE_URL", llm::GEMINI_API_BASE),
                perplexity_base_url: env
                    .env_var_or("PERPLEXITY_BASE_URL", llm::PERPLEXITY_API_BASE),
                timeout_secs: env.parse_or("LLM_TIMEOUT_SECS", llm::DEFAULT_TIMEOUT_SECS)?,
            },
            twitter: TwitterConfig {
                client_id: env.optional("TWITTER_CLIENT_ID"),
                client_secret: env.optional("TWITTER_CLIENT_SECRET").map(Zeroizing::new),
                redirect_uri: env.env_var_or(
                    "TWITTER_REDIRECT_URI",
                    "http://localhost:8081/api/twitter/callback",
                ),
                scopes: parse_list(
                    &env.env_var_or("TWITTER_SCOPES", twitter::DEFAULT_SCOPES),
                    &[' ', ','],
                ),
                auth_url: env.env_var_or("TWITTER_AUTH_URL", twitter::AUTH_URL),
                token_url: env.env_var_or("TWITTER_TOKEN_URL", twitter::TOKEN_URL),
                api_base_url: env.env_var_or("TWITTER_API_BASE_URL", twitter::API_BASE_URL),
            },
            paddle: PaddleConfig {
                public_key_pem: env.optional("PADDLE_PUBLIC_KEY").map(|k| k.replace("\\n", "\n")),
                plan_ids: parse_plan_ids(&env.env_var_or("PADDLE_PLAN_IDS", ""))?,
            },
            crypto_payments: CryptoPaymentsConfig {
                solana: ChainConfig {
                    endpoint: env.env_var_or("SOLANA_RPC_URL", payments::DEFAULT_SOLANA_RPC_URL),
                    receiving_address: env.optional("SOLANA_RECEIVING_ADDRESS"),
                    prices: PlanPrices {
                        pro: env.parse_or("SOLANA_PRICE_PRO_LAMPORTS", 0)?,
                        business: env.parse_or("SOLANA_PRICE_BUSINESS_LAMPORTS", 0)?,
                    },
                },
                bitcoin: ChainConfig {
                    endpoint: env
                        .env_var_or("BITCOIN_INDEXER_URL", payments::DEFAULT_BITCOIN_INDEXER_URL),
                    receiving_address: env.optional("BITCOIN_RECEIVING_ADDRESS"),
                    prices: PlanPrices {
                        pro: env.parse_or("BITCOIN_PRICE_PRO_SATS", 0)?,
                        business: env.parse_or("BITCOIN_PRICE_BUSINESS_SATS", 0)?,
                    },
                },
                min_rpc_interval_ms: env
                    .parse_or("RPC_MIN_INTERVAL_MS", payments::DEFAULT_RPC_MIN_INTERVAL_MS)?,
                verify_attempts: env
                    .parse_or("PAYMENT_VERIFY_ATTEMPTS", payments::DEFAULT_VERIFY_ATTEMPTS)?
                    .max(1),
                verify_delay_ms: env
                    .parse_or("PAYMENT_VERIFY_DELAY_MS", payments::DEFAULT_VERIFY_DELAY_MS)?,
            },
            cloudinary: load_cloudinary(&env),
        })
    }

    /// Human-readable configuration summary with secrets masked
    #[must_use]
    pub fn summary(&self) -> String {
        let enabled = |on: bool| if on { "Enabled" } else { "Disabled" };
        format!(
            "Recast Server Configuration:\n\
             - HTTP Port: {}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Frontend: {}\n\
             - Twitter OAuth: {}\n\
             - Paddle Webhooks: {}\n\
             - Solana Payments: {}\n\
             - Bitcoin Payments: {}\n\
             - Cloudinary Uploads: {}\n\
             - Admin Endpoints: {}",
            self.http_port,
            self.environment,
            mask_database_url(&self.database.url),
            self.frontend_url,
            enabled(self.twitter.client_id.is_some()),
            enabled(self.paddle.public_key_pem.is_some()),
            enabled(self.crypto_payments.solana.receiving_address.is_some()),
            enabled(self.crypto_payments.bitcoin.receiving_address.is_some()),
            enabled(self.cloudinary.is_some()),
            enabled(self.security.admin_api_key.is_some()),
        )
    }
}

fn load_security<F>(env: &EnvReader<F>, environment: Environment) -> AppResult<SecurityConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let jwt_secret = match env.optional("JWT_SECRET") {
        Some(secret) => secret,
        None if environment.is_production() => {
            return Err(AppError::config_missing("JWT_SECRET must be set in production"));
        }
        None => {
            warn!("JWT_SECRET not set, generating an ephemeral secret; tokens will not survive restarts");
            hex::encode(random_bytes::<32>())
        }
    };

    let encryption_key = match env.optional("ENCRYPTION_KEY") {
        Some(encoded) => decode_encryption_key(&encoded)?,
        None if environment.is_production() => {
            return Err(AppError::config_missing("ENCRYPTION_KEY must be set in production"));
        }
        None => {
            warn!("ENCRYPTION_KEY not set, generating an ephemeral key; stored secrets will be unreadable after restart");
            random_bytes::<32>()
        }
    };

    Ok(SecurityConfig {
        jwt_secret: Zeroizing::new(jwt_secret),
        jwt_expiry_hours: env.parse_or("JWT_EXPIRY_HOURS", auth::DEFAULT_JWT_EXPIRY_HOURS)?,
        encryption_key: Zeroizing::new(encryption_key),
        admin_api_key: env.optional("ADMIN_API_KEY").map(Zeroizing::new),
        cors_origins: parse_list(&env.env_var_or("CORS_ORIGINS", "*"), &[',']),
        bcrypt_cost: env.parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
    })
}

fn load_cloudinary<F>(env: &EnvReader<F>) -> Option<CloudinaryConfig>
where
    F: Fn(&str) -> Option<String>,
{
    Some(CloudinaryConfig {
        cloud_name: env.optional("CLOUDINARY_CLOUD_NAME")?,
        api_key: env.optional("CLOUDINARY_API_KEY")?,
        api_secret: Zeroizing::new(env.optional("CLOUDINARY_API_SECRET")?),
        api_base_url: env.env_var_or(
            "CLOUDINARY_API_BASE_URL",
            media::CLOUDINARY_API_BASE,
        ),
    })
}

/// Decode a base64 AES-256 key
///
/// # Errors
///
/// Returns an error unless the value decodes to exactly 32 bytes
pub fn decode_encryption_key(encoded: &str) -> AppResult<[u8; 32]> {
    let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
        AppError::new(ErrorCode::ConfigInvalid, format!("ENCRYPTION_KEY is not valid base64: {e}"))
    })?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        AppError::new(
            ErrorCode::ConfigInvalid,
            format!("ENCRYPTION_KEY must decode to 32 bytes, got {}", bytes.len()),
        )
    })
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Parse `id:plan` pairs separated by commas
fn parse_plan_ids(raw: &str) -> AppResult<HashMap<String, SubscriptionPlan>> {
    let mut plans = HashMap::new();
    for pair in parse_list(raw, &[',']) {
        let (id, plan) = pair.split_once(':').ok_or_else(|| {
            AppError::new(
                ErrorCode::ConfigInvalid,
                format!("Invalid PADDLE_PLAN_IDS entry: {pair}"),
            )
        })?;
        let plan = SubscriptionPlan::parse(plan).ok_or_else(|| {
            AppError::new(
                ErrorCode::ConfigInvalid,
                format!("Unknown plan in PADDLE_PLAN_IDS: {plan}"),
            )
        })?;
        plans.insert(id.trim().to_owned(), plan);
    }
    Ok(plans)
}

fn parse_list(raw: &str, separators: &[char]) -> Vec<String> {
    raw.split(separators)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn mask_database_url(url: &str) -> String {
    match url.split_once('@') {
        Some((_, host)) => format!("***@{host}"),
        None => url.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_in_development() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.http_port, ports::DEFAULT_HTTP_PORT);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.twitter.scopes.len(), 4);
        assert!(config.cloudinary.is_none());
        assert!(config.security.admin_api_key.is_none());
    }

    #[test]
    fn test_production_requires_secrets() {
        let err = ServerConfig::from_lookup(lookup(&[("ENVIRONMENT", "production")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissing);
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("HTTP_PORT", "eighty")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
        assert!(err.message.contains("HTTP_PORT"));
    }

    #[test]
    fn test_encryption_key_must_be_32_bytes() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(decode_encryption_key(&short).is_err());
        let good = STANDARD.encode([7u8; 32]);
        assert_eq!(decode_encryption_key(&good).unwrap(), [7u8; 32]);
    }

    #[test]
    fn test_paddle_plan_ids_and_summary_masking() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PADDLE_PLAN_IDS", "111:pro, 222:business"),
            ("DATABASE_URL", "postgres://user:pw@db.internal/recast"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "shh"),
        ]))
        .unwrap();
        assert_eq!(config.paddle.plan_ids.get("222"), Some(&SubscriptionPlan::Business));
        let summary = config.summary();
        assert!(summary.contains("***@db.internal/recast"));
        assert!(!summary.contains("pw"));
        assert!(!format!("{:?}", config.cloudinary).contains("shh"));
    }

    #[test]
    fn test_plan_prices_skip_free_and_unset() {
        let prices = PlanPrices { pro: 5, business: 0 };
        assert_eq!(prices.for_plan(SubscriptionPlan::Pro), Some(5));
        assert_eq!(prices.for_plan(SubscriptionPlan::Business), None);
        assert_eq!(prices.for_plan(SubscriptionPlan::Free), None);
    }
}
