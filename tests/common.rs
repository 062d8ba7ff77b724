// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds an in-memory server, issues requests through the router and registers users
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `recast_server`
//!
//! Every helper works against `sqlite::memory:` and the real router, so tests
//! exercise the same extractors, validation and error mapping as production.

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Once};

use anyhow::{anyhow, ensure, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use recast_server::config::environment::ServerConfig;
use recast_server::crypto::SecretCipher;
use recast_server::database::Database;
use recast_server::resources::ServerResources;
use recast_server::server::build_router;
use recast_server::services::ChainClients;
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::Level;

static INIT_LOGGER: Once = Once::new();

/// Admin key configured for every test server
pub const TEST_ADMIN_KEY: &str = "test-admin-key";

/// Password used for registered test users
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Configuration for an in-memory test server; `overrides` win over the defaults
pub fn test_config(overrides: &[(&str, &str)]) -> Result<ServerConfig> {
    let mut vars: HashMap<String, String> = [
        ("ENVIRONMENT", "testing".to_owned()),
        ("DATABASE_URL", "sqlite::memory:".to_owned()),
        ("JWT_SECRET", "integration-test-secret".to_owned()),
        ("ENCRYPTION_KEY", STANDARD.encode([7u8; 32])),
        ("ADMIN_API_KEY", TEST_ADMIN_KEY.to_owned()),
        ("BCRYPT_COST", "4".to_owned()),
        ("FRONTEND_URL", "https://app.recast.test".to_owned()),
        ("PAYMENT_VERIFY_DELAY_MS", "0".to_owned()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect();
    for (key, value) in overrides {
        vars.insert((*key).to_owned(), (*value).to_owned());
    }
    Ok(ServerConfig::from_lookup(|key| vars.get(key).cloned())?)
}

/// Open the configured database
pub async fn create_test_database(config: &ServerConfig) -> Result<Database> {
    init_test_logging();
    let cipher = SecretCipher::new(*config.security.encryption_key);
    Ok(Database::new(&config.database.url, cipher).await?)
}

/// A router over fresh resources plus a handle on those resources
pub struct TestServer {
    /// Router with every route and layer
    pub app: Router,
    /// Shared state behind the router
    pub resources: Arc<ServerResources>,
}

impl TestServer {
    /// Server with default configuration
    pub async fn new() -> Result<Self> {
        Self::with_config(test_config(&[])?).await
    }

    /// Server with explicit configuration
    pub async fn with_config(config: ServerConfig) -> Result<Self> {
        let database = create_test_database(&config).await?;
        let resources = Arc::new(ServerResources::new(config, database)?);
        Ok(Self::from_resources(resources))
    }

    /// Server whose blockchain lookups are scripted
    pub async fn with_chains(config: ServerConfig, chains: ChainClients) -> Result<Self> {
        let database = create_test_database(&config).await?;
        let resources = Arc::new(ServerResources::with_chain_clients(config, database, chains)?);
        Ok(Self::from_resources(resources))
    }

    fn from_resources(resources: Arc<ServerResources>) -> Self {
        Self {
            app: build_router(Arc::clone(&resources)),
            resources,
        }
    }

    /// Send a request and return the raw response parts
    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, body.to_vec()))
    }

    /// Send an optional JSON body with an optional bearer token
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let (status, _, bytes) = self.send(request).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok((status, value))
    }

    /// `GET` with a bearer token
    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.json(Method::GET, uri, Some(token), None).await
    }

    /// `POST` a JSON body with a bearer token
    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.json(Method::POST, uri, Some(token), Some(body)).await
    }

    /// `PUT` a JSON body with a bearer token
    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.json(Method::PUT, uri, Some(token), Some(body)).await
    }

    /// `DELETE` with a bearer token
    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.json(Method::DELETE, uri, Some(token), None).await
    }

    /// Register `email` and return its JWT
    pub async fn register(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": TEST_PASSWORD })),
            )
            .await?;
        ensure!(status == StatusCode::CREATED, "register failed: {status} {body}");
        body["jwt_token"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("register response has no token: {body}"))
    }

    /// Create a content piece and return its id
    pub async fn create_content(&self, token: &str, title: &str, text: &str) -> Result<String> {
        let (status, body) = self
            .post(
                "/api/content",
                token,
                json!({ "title": title, "original_text": text, "tags": ["rust", "async"] }),
            )
            .await?;
        ensure!(status == StatusCode::CREATED, "create content failed: {status} {body}");
        body["id"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("content response has no id: {body}"))
    }
}

/// A long paragraph-structured article that needs several tweets
pub fn long_article() -> String {
    let paragraph = "Rust gives you memory safety without a garbage collector. \
        The borrow checker catches data races at compile time. \
        Async functions compile to state machines that do not allocate per poll. \
        Tokio schedules those futures across a work-stealing thread pool.";
    [paragraph; 4].join("\n\n")
}
