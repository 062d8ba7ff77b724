// ABOUTME: OAuth 2.0 client used to connect third-party publishing accounts
// ABOUTME: Authorization-code flow with PKCE, code exchange and token refresh
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # OAuth 2.0 Client Module
//!
//! Recast acts as an OAuth 2.0 client towards Twitter/X. The pending state
//! and verifier of each authorization live in the `twitter_oauth_states`
//! table (see [`crate::database::OAuthStatesManager`]).

/// Core OAuth 2.0 client implementation
pub mod client;

pub use client::{OAuth2Client, OAuth2Config, OAuth2Token, PkceParams};
