// ABOUTME: Twitter/X account connection and thread publishing workflow
// ABOUTME: PKCE state lifecycle, callback outcome redirects, token refresh and group posting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Twitter Workflow
//!
//! A pending authorization is a row in `twitter_oauth_states`. The callback
//! consumes it with a single `DELETE … RETURNING`, so a state can be redeemed
//! at most once and no outcome leaves it behind.

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use recast_core::constants::twitter::OAUTH_STATE_TTL_MINUTES;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use recast_core::models::SnippetStatus;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::database::{Database, OAuthStatesManager, SnippetsManager};
use crate::models::{TwitterConnection, TwitterOAuthState};
use crate::oauth2_client::{OAuth2Client, OAuth2Token, PkceParams};
use crate::social::{PostedTweet, TwitterClient};

const STATE_LENGTH: usize = 32;

/// Response of `GET /api/twitter/connect`
#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    /// Where the browser should go next
    pub authorization_url: String,
    /// Opaque state bound to this authorization
    pub state: String,
    /// Lifetime of the pending authorization
    pub expires_in_minutes: i64,
}

/// Query parameters Twitter sends to the callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// State echoed back
    pub state: Option<String>,
    /// Set when the user denied access
    pub error: Option<String>,
}

/// Terminal result of a callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Tokens stored for the user
    Connected {
        /// Connected handle
        username: String,
    },
    /// Unknown or already used state
    InvalidState,
    /// State past its expiry
    Expired,
    /// The user declined or no code was returned
    Denied,
    /// Code exchange or profile lookup failed
    ExchangeFailed,
}

impl CallbackOutcome {
    /// Frontend settings URL reporting this outcome
    #[must_use]
    pub fn redirect_url(&self, frontend_url: &str) -> String {
        let base = frontend_url.trim_end_matches('/');
        let reason = match self {
            Self::Connected { .. } => return format!("{base}/settings?twitter=connected"),
            Self::InvalidState => "invalid_state",
            Self::Expired => "expired",
            Self::Denied => "denied",
            Self::ExchangeFailed => "exchange_failed",
        };
        format!("{base}/settings?twitter=error&reason={reason}")
    }
}

/// Response of `GET /api/twitter/status`
#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    /// Whether tokens are stored
    pub connected: bool,
    /// Connected handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Granted scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Response of `POST /api/twitter/threads`
#[derive(Debug, Serialize)]
pub struct PublishedThread {
    /// Published group
    pub group_id: Uuid,
    /// Tweets in order
    pub tweets: Vec<PostedTweet>,
}

/// Connects accounts and publishes threads
pub struct TwitterService<'a> {
    database: &'a Database,
    oauth: &'a OAuth2Client,
    api: &'a TwitterClient,
}

impl<'a> TwitterService<'a> {
    /// Create the service from shared resources
    #[must_use]
    pub const fn new(
        database: &'a Database,
        oauth: &'a OAuth2Client,
        api: &'a TwitterClient,
    ) -> Self {
        Self {
            database,
            oauth,
            api,
        }
    }

    fn states(&self) -> OAuthStatesManager {
        OAuthStatesManager::new(self.database.pool().clone())
    }

    /// Start an authorization: persist state and verifier, return the URL
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be stored
    pub async fn start_connect(&self, user_id: Uuid) -> AppResult<ConnectResponse> {
        let pkce = PkceParams::generate();
        let now = Utc::now();
        let record = TwitterOAuthState {
            state: random_state(),
            user_id,
            code_verifier: pkce.code_verifier.clone(),
            created_at: now,
            expires_at: now + Duration::minutes(OAUTH_STATE_TTL_MINUTES),
        };
        self.states().create(&record).await?;

        Ok(ConnectResponse {
            authorization_url: self.oauth.authorization_url(&record.state, &pkce)?,
            state: record.state,
            expires_in_minutes: OAUTH_STATE_TTL_MINUTES,
        })
    }

    /// Complete an authorization from the callback query
    ///
    /// Never fails: storage errors are logged and reported as `ExchangeFailed`.
    #[instrument(skip_all)]
    pub async fn handle_callback(&self, params: CallbackParams) -> CallbackOutcome {
        match self.complete_callback(params).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(code = ?e.code, "Twitter callback failed: {}", e.message);
                CallbackOutcome::ExchangeFailed
            }
        }
    }

    async fn complete_callback(&self, params: CallbackParams) -> AppResult<CallbackOutcome> {
        let states = self.states();
        let now = Utc::now();

        let consumed = match params.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => states.consume(state).await?,
            None => None,
        };
        let Some(record) = consumed else {
            states.delete_expired(now).await?;
            return Ok(CallbackOutcome::InvalidState);
        };
        if record.is_expired_at(now) {
            return Ok(CallbackOutcome::Expired);
        }
        if params.error.is_some() {
            info!(user_id = %record.user_id, "User declined Twitter authorization");
            return Ok(CallbackOutcome::Denied);
        }
        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            return Ok(CallbackOutcome::Denied);
        };

        let token = match self.oauth.exchange_code(&code, &record.code_verifier).await {
            Ok(token) => token,
            Err(e) => {
                warn!(user_id = %record.user_id, "Twitter code exchange failed: {}", e.message);
                return Ok(CallbackOutcome::ExchangeFailed);
            }
        };
        let me = match self.api.get_me(&token.access_token).await {
            Ok(me) => me,
            Err(e) => {
                warn!(user_id = %record.user_id, "Twitter profile lookup failed: {}", e.message);
                return Ok(CallbackOutcome::ExchangeFailed);
            }
        };

        let connection = connection_from_token(
            record.user_id,
            token,
            Some(me.id),
            Some(me.username.clone()),
        );
        self.database.save_twitter_connection(&connection).await?;
        self.database
            .set_twitter_username(record.user_id, Some(&me.username))
            .await?;

        info!(user_id = %record.user_id, username = %me.username, "Twitter account connected");
        Ok(CallbackOutcome::Connected {
            username: me.username,
        })
    }

    /// Connection state for the settings page
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be loaded
    pub async fn status(&self, user_id: Uuid) -> AppResult<ConnectionStatus> {
        let connection = self.database.get_twitter_connection(user_id).await?;
        Ok(ConnectionStatus {
            connected: connection.is_some(),
            username: connection.as_ref().and_then(|c| c.username.clone()),
            scope: connection.and_then(|c| c.scope),
        })
    }

    /// Forget the stored tokens and the connected handle
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn disconnect(&self, user_id: Uuid) -> AppResult<bool> {
        let removed = self.database.delete_twitter_connection(user_id).await?;
        self.database.set_twitter_username(user_id, None).await?;
        if removed {
            info!(%user_id, "Twitter account disconnected");
        }
        Ok(removed)
    }

    /// Stored connection with a usable access token, refreshing it if needed
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` when no account is connected, or
    /// `EXTERNAL_AUTH_FAILED` when the token expired without a refresh token
    pub async fn active_connection(&self, user_id: Uuid) -> AppResult<TwitterConnection> {
        let connection = self
            .database
            .get_twitter_connection(user_id)
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::ResourceNotFound, "Twitter account is not connected")
            })?;

        if !connection.needs_refresh(Utc::now()) {
            return Ok(connection);
        }

        let refresh_token = connection.refresh_token.as_ref().ok_or_else(|| {
            AppError::new(
                ErrorCode::ExternalAuthFailed,
                "Twitter access expired. Reconnect your account.",
            )
        })?;
        let token = self.oauth.refresh(refresh_token).await?;
        let refreshed = connection_from_token(
            user_id,
            token,
            connection.twitter_user_id.clone(),
            connection.username.clone(),
        );
        self.database.save_twitter_connection(&refreshed).await?;
        info!(%user_id, "Refreshed Twitter access token");

        // Twitter rotates refresh tokens, but keep the old one if none came back
        Ok(TwitterConnection {
            refresh_token: refreshed
                .refresh_token
                .clone()
                .or_else(|| connection.refresh_token.clone()),
            ..refreshed
        })
    }

    /// Post a stored snippet group as a thread and finalize its snippets
    ///
    /// # Errors
    ///
    /// - `RESOURCE_NOT_FOUND` if the group is empty or not the user's
    /// - `INVALID_INPUT` if a part does not fit in a tweet
    /// - vendor errors from Twitter
    pub async fn publish_group(&self, user_id: Uuid, group_id: Uuid) -> AppResult<PublishedThread> {
        let snippets = SnippetsManager::new(self.database.pool().clone());
        let parts = snippets.list_group(user_id, group_id).await?;
        if parts.is_empty() {
            return Err(AppError::not_found("Snippet group"));
        }
        let texts: Vec<String> = parts.into_iter().map(|s| s.text).collect();

        let connection = self.active_connection(user_id).await?;
        let username = connection.username.as_deref().unwrap_or("i/web");
        let tweets = self
            .api
            .post_thread(&connection.access_token, username, &texts)
            .await?;

        snippets
            .set_group_status(user_id, group_id, SnippetStatus::Finalized)
            .await?;
        Ok(PublishedThread { group_id, tweets })
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

fn connection_from_token(
    user_id: Uuid,
    token: OAuth2Token,
    twitter_user_id: Option<String>,
    username: Option<String>,
) -> TwitterConnection {
    TwitterConnection {
        user_id,
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: token.expires_at,
        scope: token.scope,
        twitter_user_id,
        username,
        updated_at: Utc::now(),
    }
}
