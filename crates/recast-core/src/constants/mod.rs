// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Limits, OAuth, LLM and payment constants shared across Recast crates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Constants module
//!
//! Constants are grouped into small domain modules rather than one flat list.

/// Network ports
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}

/// Input validation limits
pub mod limits {
    /// Maximum characters in a content title
    pub const MAX_TITLE_CHARS: usize = 200;
    /// Maximum characters of original text accepted per content piece
    pub const MAX_CONTENT_CHARS: usize = 100_000;
    /// Maximum characters in folder, persona and template names
    pub const MAX_NAME_CHARS: usize = 100;
    /// Maximum number of tags per content piece
    pub const MAX_TAGS: usize = 20;
    /// Minimum password length
    pub const MIN_PASSWORD_CHARS: usize = 8;
    /// Default page size for list endpoints
    pub const DEFAULT_PAGE_SIZE: i64 = 50;
    /// Maximum page size for list endpoints
    pub const MAX_PAGE_SIZE: i64 = 200;
    /// Maximum upload size accepted by the media endpoint (10 MiB)
    pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
}

/// Twitter/X platform constants
pub mod twitter {
    /// Authorization endpoint
    pub const AUTH_URL: &str = "https://twitter.com/i/oauth2/authorize";
    /// Token endpoint
    pub const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
    /// API base URL
    pub const API_BASE_URL: &str = "https://api.twitter.com/2";
    /// Default scopes requested on connect
    pub const DEFAULT_SCOPES: &str = "tweet.read tweet.write users.read offline.access";
    /// Maximum characters in a single tweet
    pub const MAX_TWEET_CHARS: usize = 280;
    /// Space reserved at the end of each thread part for the ` (i/N)` suffix
    pub const THREAD_SUFFIX_RESERVE: usize = 10;
    /// Pause between consecutive tweets of a thread
    pub const THREAD_POST_DELAY_MS: u64 = 500;
    /// Lifetime of a pending OAuth state record
    pub const OAUTH_STATE_TTL_MINUTES: i64 = 15;
    /// Interval of the background sweep of expired OAuth states
    pub const OAUTH_STATE_SWEEP_SECS: u64 = 300;
}

/// LLM provider constants
pub mod llm {
    /// `OpenAI` API base URL
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
    /// Default `OpenAI` model
    pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
    /// Maximum output tokens requested from `OpenAI`
    pub const OPENAI_MAX_OUTPUT_TOKENS: u32 = 4096;

    /// Gemini API base URL
    pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
    /// Default Gemini model
    pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
    /// Maximum output tokens requested from Gemini
    pub const GEMINI_MAX_OUTPUT_TOKENS: u32 = 8192;

    /// Perplexity API base URL
    pub const PERPLEXITY_API_BASE: &str = "https://api.perplexity.ai";
    /// Default Perplexity model
    pub const PERPLEXITY_DEFAULT_MODEL: &str = "sonar";
    /// Maximum output tokens requested from Perplexity
    pub const PERPLEXITY_MAX_OUTPUT_TOKENS: u32 = 4096;

    /// Estimated tokens per input word
    pub const TOKENS_PER_WORD: f64 = 1.5;
    /// Default request timeout for LLM calls
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
    /// Connect timeout for LLM calls
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
}

/// Payment constants
pub mod payments {
    /// Minutes a crypto payment intent stays valid
    pub const INTENT_TTL_MINUTES: i64 = 60;
    /// Days of access granted by a confirmed one-off crypto payment
    pub const CRYPTO_PLAN_DAYS: i64 = 30;
    /// Default minimum spacing between calls to the same blockchain endpoint
    pub const DEFAULT_RPC_MIN_INTERVAL_MS: u64 = 1_000;
    /// Default number of lookups before a transaction is reported as not found
    pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;
    /// Default delay between transaction lookups
    pub const DEFAULT_VERIFY_DELAY_MS: u64 = 2_000;
    /// Default Solana JSON-RPC endpoint
    pub const DEFAULT_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
    /// Default Esplora-compatible Bitcoin indexer
    pub const DEFAULT_BITCOIN_INDEXER_URL: &str = "https://mempool.space/api";
}

/// Cloudinary constants
pub mod media {
    /// Upload API base URL
    pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
    /// Folder uploads are stored under
    pub const UPLOAD_FOLDER: &str = "recast";
}

/// JWT constants
pub mod auth {
    /// Audience claim for API tokens
    pub const JWT_AUDIENCE: &str = "recast-api";
    /// Default token lifetime in hours
    pub const DEFAULT_JWT_EXPIRY_HOURS: i64 = 24;
    /// Header carrying the admin key for maintenance endpoints
    pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
}
