// ABOUTME: Social platform publishing integrations
// ABOUTME: Currently Twitter/X thread publishing over the v2 API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

/// Twitter/X v2 client
pub mod twitter;

pub use twitter::{tweet_url, validate_thread, PostedTweet, TwitterClient, TwitterUser};
