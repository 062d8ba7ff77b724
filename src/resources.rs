// ABOUTME: Shared server state built once at startup and handed to every route
// ABOUTME: Holds config, database, auth, HTTP clients and the vendor integrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Server Resources
//!
//! Everything a handler needs is created here exactly once and shared behind
//! an `Arc`. Optional integrations (Twitter, Cloudinary) are `None` when their
//! configuration is absent, and the matching routes answer `503`.

use std::sync::Arc;
use std::time::Duration;

use recast_core::errors::{AppError, AppResult};
use reqwest::Client;
use tracing::info;

use crate::auth::AuthManager;
use crate::config::environment::ServerConfig;
use crate::database::Database;
use crate::llm::build_http_client;
use crate::media::CloudinaryClient;
use crate::oauth2_client::{OAuth2Client, OAuth2Config};
use crate::payments::RpcRateLimiter;
use crate::services::{AiDelegator, ChainClients};
use crate::social::TwitterClient;

/// Dependencies shared by all request handlers
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Persistence
    pub database: Database,
    /// Token and password handling
    pub auth: AuthManager,
    /// LLM task dispatch
    pub delegator: AiDelegator,
    /// Twitter OAuth2 client; `None` when no client id is configured
    pub twitter_oauth: Option<OAuth2Client>,
    /// Twitter REST client
    pub twitter_api: TwitterClient,
    /// Blockchain lookups for crypto payments
    pub chains: ChainClients,
    /// Media uploads; `None` when Cloudinary is not configured
    pub cloudinary: Option<CloudinaryClient>,
}

impl ServerResources {
    /// Build the shared state
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(config: ServerConfig, database: Database) -> AppResult<Self> {
        let http = build_http_client(&config.llm)?;
        Ok(Self::with_chains(config, database, http, None))
    }

    /// Build the shared state with caller-provided chain clients
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn with_chain_clients(
        config: ServerConfig,
        database: Database,
        chains: ChainClients,
    ) -> AppResult<Self> {
        let http = build_http_client(&config.llm)?;
        Ok(Self::with_chains(config, database, http, Some(chains)))
    }

    fn with_chains(
        config: ServerConfig,
        database: Database,
        http: Client,
        chains: Option<ChainClients>,
    ) -> Self {
        let auth = AuthManager::new(
            config.security.jwt_secret.clone(),
            config.security.jwt_expiry_hours,
            config.security.bcrypt_cost,
        );
        let chains = chains.unwrap_or_else(|| {
            let limiter = RpcRateLimiter::new(Duration::from_millis(
                config.crypto_payments.min_rpc_interval_ms,
            ));
            ChainClients::new(&http, &config.crypto_payments, &limiter)
        });
        let twitter_oauth = OAuth2Config::twitter(&config.twitter)
            .map(|oauth_config| OAuth2Client::new(oauth_config, http.clone()));
        if twitter_oauth.is_none() {
            info!("Twitter integration disabled: TWITTER_CLIENT_ID is not set");
        }
        let cloudinary = config
            .cloudinary
            .clone()
            .map(|cloudinary| CloudinaryClient::new(http.clone(), cloudinary));

        Self {
            delegator: AiDelegator::new(http.clone(), config.llm.clone()),
            twitter_api: TwitterClient::new(http, &config.twitter.api_base_url),
            config: Arc::new(config),
            database,
            auth,
            twitter_oauth,
            chains,
            cloudinary,
        }
    }

    /// Twitter OAuth client, or `503 CONFIG_MISSING`
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` when Twitter is not configured
    pub fn require_twitter(&self) -> AppResult<&OAuth2Client> {
        self.twitter_oauth
            .as_ref()
            .ok_or_else(|| AppError::config_missing("Twitter integration is not configured"))
    }

    /// Cloudinary client, or `503 CONFIG_MISSING`
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` when Cloudinary is not configured
    pub fn require_cloudinary(&self) -> AppResult<&CloudinaryClient> {
        self.cloudinary
            .as_ref()
            .ok_or_else(|| AppError::config_missing("Media uploads are not configured"))
    }
}
