// ABOUTME: Main library entry point for the Recast content repurposing API
// ABOUTME: Persistence, auth, AI delegation, publishing, payments and the axum REST surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

#![deny(unsafe_code)]

//! # Recast Server
//!
//! A multi-tenant REST API that turns long-form content into tweet threads,
//! `LinkedIn` posts, summaries, key points and newsletter sections.
//!
//! ## Features
//!
//! - **Rule-based repurposing**: deterministic generators from `recast-repurpose`
//! - **AI repurposing**: OpenAI, Gemini and Perplexity with each user's own key
//! - **Twitter publishing**: OAuth 2.0 PKCE connection and thread posting
//! - **Billing**: Paddle webhooks plus manually verified SOL and BTC payments
//! - **Media**: signed Cloudinary uploads
//!
//! ## Architecture
//!
//! - **routes**: thin axum handlers, one `*Routes` type per domain
//! - **services**: business rules shared by handlers and tests
//! - **database**: SQLite via sqlx with per-domain managers
//! - **llm**, **social**, **payments**, **media**: outbound HTTP integrations
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use recast_server::config::environment::ServerConfig;
//! use recast_core::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Recast configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// JWT issuing and validation, password hashing
pub mod auth;

/// Environment-driven configuration
pub mod config;

/// Secret encryption and constant-time comparison
pub mod crypto;

/// SQLite persistence
pub mod database;

/// LLM vendor clients
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Media storage integrations
pub mod media;

/// Request id, authentication and CORS layers
pub mod middleware;

/// Persistent domain records
pub mod models;

/// OAuth 2.0 client with PKCE
pub mod oauth2_client;

/// Paddle signatures and blockchain verification
pub mod payments;

/// Shared handler state
pub mod resources;

/// REST route modules
pub mod routes;

/// Router assembly and serving
pub mod server;

/// Business logic services
pub mod services;

/// Social publishing clients
pub mod social;

/// Request field validation
pub mod validation;
