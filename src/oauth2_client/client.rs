// ABOUTME: OAuth2 authorization-code client with PKCE used to connect Twitter/X accounts
// ABOUTME: Builds authorization URLs, exchanges codes and refreshes tokens over HTTP Basic auth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::config::TwitterConfig;

/// Length of generated PKCE code verifiers (RFC 7636 allows 43-128)
pub const CODE_VERIFIER_LENGTH: usize = 64;

const VERIFIER_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// OAuth 2.0 client configuration
#[derive(Clone)]
pub struct OAuth2Config {
    /// OAuth client ID from provider
    pub client_id: String,
    /// Client secret; confidential clients authenticate with HTTP Basic
    pub client_secret: Option<Zeroizing<String>>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Redirect URI for OAuth callbacks
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// Client configuration for Twitter/X, `None` when no client id is set
    #[must_use]
    pub fn twitter(config: &TwitterConfig) -> Option<Self> {
        Some(Self {
            client_id: config.client_id.clone()?,
            client_secret: config.client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        })
    }
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// `PKCE` (Proof Key for Code Exchange) parameters
#[derive(Clone)]
pub struct PkceParams {
    /// Randomly generated code verifier
    pub code_verifier: Zeroizing<String>,
    /// SHA256 hash of code verifier, base64url encoded
    pub code_challenge: String,
    /// Challenge method (always "S256")
    pub code_challenge_method: &'static str,
}

impl PkceParams {
    /// Generate `PKCE` parameters with `S256` challenge method
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code_verifier: String = (0..CODE_VERIFIER_LENGTH)
            .map(|_| char::from(VERIFIER_CHARS[rng.gen_range(0..VERIFIER_CHARS.len())]))
            .collect();
        let code_challenge = Self::challenge_for(&code_verifier);

        Self {
            code_verifier: Zeroizing::new(code_verifier),
            code_challenge,
            code_challenge_method: "S256",
        }
    }

    /// `BASE64URL(SHA256(verifier))` without padding
    #[must_use]
    pub fn challenge_for(code_verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
    }
}

impl fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish_non_exhaustive()
    }
}

/// OAuth 2.0 access token with expiration and refresh capabilities
#[derive(Clone)]
pub struct OAuth2Token {
    /// The access token string
    pub access_token: Zeroizing<String>,
    /// Token type (usually "bearer")
    pub token_type: String,
    /// Expiration timestamp (UTC)
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token, present when `offline.access` was granted
    pub refresh_token: Option<Zeroizing<String>>,
    /// Granted OAuth scopes
    pub scope: Option<String>,
}

impl OAuth2Token {
    /// Check if the token is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now())
    }
}

impl fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth 2.0 token response from provider
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// OAuth 2.0 client for the authorization-code grant
pub struct OAuth2Client {
    config: OAuth2Config,
    client: Client,
}

impl OAuth2Client {
    /// Create a new `OAuth2` client with the given configuration
    #[must_use]
    pub const fn new(config: OAuth2Config, client: Client) -> Self {
        Self { config, client }
    }

    /// Get the `OAuth2` configuration
    #[must_use]
    pub const fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Authorization URL carrying the state and the `S256` challenge
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization URL is malformed
    pub fn authorization_url(&self, state: &str, pkce: &PkceParams) -> AppResult<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AppError::config(format!("Invalid OAuth authorization URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", pkce.code_challenge_method);

        Ok(url.to_string())
    }

    /// Exchange an authorization code and its PKCE verifier for tokens
    ///
    /// # Errors
    ///
    /// Returns `EXTERNAL_AUTH_FAILED` if the provider rejects the code
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<OAuth2Token> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        self.token_request(&params).await
    }

    /// Trade a refresh token for a new access token
    ///
    /// # Errors
    ///
    /// Returns `EXTERNAL_AUTH_FAILED` if the provider rejects the refresh token
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<OAuth2Token> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> AppResult<OAuth2Token> {
        let mut request = self.client.post(&self.config.token_url).form(params);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(&self.config.client_id, Some(secret.as_str()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("OAuth", format!("Token request failed: {e}"))
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                AppError::external_service("OAuth", format!("Token response unreadable: {e}"))
            })?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
                |_| body.chars().take(200).collect::<String>(),
                |e| e.error_description.unwrap_or(e.error),
            );
            warn!(status = %status, "OAuth token endpoint rejected the request");
            return Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                format!("Token endpoint returned {status}: {reason}"),
            ));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::external_service("OAuth", format!("Invalid token response: {e}"))
        })?;
        debug!(expires_in = ?token.expires_in, "OAuth token received");
        Ok(Self::token_from_response(token, Utc::now()))
    }

    fn token_from_response(response: TokenResponse, now: DateTime<Utc>) -> OAuth2Token {
        OAuth2Token {
            access_token: Zeroizing::new(response.access_token),
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|seconds| now + Duration::seconds(seconds)),
            refresh_token: response.refresh_token.map(Zeroizing::new),
            scope: response.scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuth2Config {
        OAuth2Config {
            client_id: "client-123".to_owned(),
            client_secret: Some(Zeroizing::new("shh".to_owned())),
            auth_url: "https://twitter.com/i/oauth2/authorize".to_owned(),
            token_url: "https://api.twitter.com/2/oauth2/token".to_owned(),
            redirect_uri: "http://localhost:8081/api/twitter/callback".to_owned(),
            scopes: vec!["tweet.read".to_owned(), "tweet.write".to_owned()],
        }
    }

    #[test]
    fn test_pkce_verifier_and_challenge() {
        let pkce = PkceParams::generate();
        assert_eq!(pkce.code_verifier.len(), CODE_VERIFIER_LENGTH);
        assert!(pkce
            .code_verifier
            .bytes()
            .all(|b| VERIFIER_CHARS.contains(&b)));
        assert_eq!(pkce.code_challenge, PkceParams::challenge_for(&pkce.code_verifier));
        assert!(!format!("{pkce:?}").contains(pkce.code_verifier.as_str()));

        // RFC 7636 appendix B
        assert_eq!(
            PkceParams::challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_authorization_url_contains_pkce_and_state() {
        let client = OAuth2Client::new(config(), Client::new());
        let pkce = PkceParams::generate();
        let url = Url::parse(&client.authorization_url("state-xyz", &pkce).unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("state").as_deref(), Some("state-xyz"));
        assert_eq!(get("scope").as_deref(), Some("tweet.read tweet.write"));
        assert_eq!(get("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(get("code_challenge"), Some(pkce.code_challenge));
        assert_eq!(get("response_type").as_deref(), Some("code"));
    }

    #[test]
    fn test_token_expiry_is_absolute() {
        let now = Utc::now();
        let token = OAuth2Client::token_from_response(
            TokenResponse {
                access_token: "a".to_owned(),
                token_type: "bearer".to_owned(),
                expires_in: Some(7200),
                refresh_token: Some("r".to_owned()),
                scope: None,
            },
            now,
        );
        assert_eq!(token.expires_at, Some(now + Duration::seconds(7200)));
        assert!(!token.is_expired());
        assert!(!format!("{token:?}").contains("\"a\""));
    }
}
