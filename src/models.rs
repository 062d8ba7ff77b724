// ABOUTME: Persistent domain records: users, content, snippets, taxonomies, payments, OAuth state
// ABOUTME: Plain data structs shared by database managers, services and route DTOs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Data Models
//!
//! Every record is owned by a user. Ownership is enforced by the database
//! managers, which always filter by `user_id`.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use recast_core::models::{
    AiProviderKind, GenerationMethod, PaymentProvider, PaymentStatus, Platform, SnippetStatus,
    SubscriptionPlan, SubscriptionStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Login email, unique
    pub email: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// bcrypt hash
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Current plan
    pub plan: SubscriptionPlan,
    /// Subscription state
    pub subscription_status: SubscriptionStatus,
    /// Rail that funds the current plan
    pub subscription_provider: Option<PaymentProvider>,
    /// Paddle subscription id
    pub paddle_subscription_id: Option<String>,
    /// End of the paid period
    pub current_period_end: Option<DateTime<Utc>>,
    /// Connected Twitter handle
    pub twitter_username: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new free-plan user
    #[must_use]
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            password_hash,
            plan: SubscriptionPlan::Free,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_provider: None,
            paddle_subscription_id: None,
            current_period_end: None,
            twitter_username: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Subscription fields updated together by payment flows
#[derive(Debug, Clone)]
pub struct SubscriptionUpdate {
    /// New plan
    pub plan: SubscriptionPlan,
    /// New status
    pub status: SubscriptionStatus,
    /// Funding rail
    pub provider: Option<PaymentProvider>,
    /// Paddle subscription id, kept when `None`
    pub paddle_subscription_id: Option<String>,
    /// End of the paid period
    pub current_period_end: Option<DateTime<Utc>>,
}

/// A long-form source text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPiece {
    /// Unique identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Title
    pub title: String,
    /// Original text
    pub original_text: String,
    /// Where the text came from
    pub source_url: Option<String>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Containing folder
    pub folder_id: Option<Uuid>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// One generated derivative unit (a tweet, a post, a summary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepurposedSnippet {
    /// Unique identifier
    pub id: Uuid,
    /// Source content
    pub content_id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Target platform
    pub platform: Platform,
    /// Generated text
    pub text: String,
    /// Shared by all parts of one multi-part output
    pub group_id: Uuid,
    /// Zero-based order within the group
    pub position: i64,
    /// Lifecycle status
    pub status: SnippetStatus,
    /// How it was produced
    pub method: GenerationMethod,
    /// LLM vendor when `method` is AI
    pub provider: Option<AiProviderKind>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A user folder for organizing content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Name, unique per user
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Target audience description injected into AI prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudiencePersona {
    /// Unique identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Name, unique per user
    pub name: String,
    /// Who the persona is
    pub description: Option<String>,
    /// Audience the content is written for
    pub audience: Option<String>,
    /// Preferred tone of voice
    pub tone: Option<String>,
    /// What the content should achieve
    pub goals: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Reusable snippet structure, optionally shared in the marketplace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetTemplate {
    /// Unique identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Name, unique per user
    pub name: String,
    /// Platform the template targets
    pub platform: Platform,
    /// Body with `{{title}}`, `{{content}}` and `{{tags}}` placeholders
    pub body: String,
    /// Optional description
    pub description: Option<String>,
    /// Listed in the marketplace
    pub is_public: bool,
    /// Number of marketplace clones
    pub use_count: i64,
    /// Template this one was cloned from
    pub source_template_id: Option<Uuid>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// An entry in a user's payment history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: Uuid,
    /// Payer
    pub user_id: Uuid,
    /// Payment rail
    pub provider: PaymentProvider,
    /// Status
    pub status: PaymentStatus,
    /// Plan purchased
    pub plan: SubscriptionPlan,
    /// Amount in minor units (cents, lamports, satoshis)
    pub amount: i64,
    /// Currency code (`usd`, `sol`, `btc`, ...)
    pub currency: String,
    /// Paddle order id, Solana signature or Bitcoin txid
    pub external_reference: Option<String>,
    /// Address the payer must send funds to
    pub receiving_address: Option<String>,
    /// When a pending intent lapses
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// When funds were confirmed
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Pending PKCE authorization for Twitter
#[derive(Clone)]
pub struct TwitterOAuthState {
    /// Opaque `state` parameter
    pub state: String,
    /// User who started the flow
    pub user_id: Uuid,
    /// PKCE code verifier
    pub code_verifier: Zeroizing<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

impl TwitterOAuthState {
    /// Whether the state can no longer be used at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for TwitterOAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterOAuthState")
            .field("state", &self.state)
            .field("user_id", &self.user_id)
            .field("code_verifier", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Decrypted Twitter connection for one user
#[derive(Clone)]
pub struct TwitterConnection {
    /// Owner
    pub user_id: Uuid,
    /// OAuth2 access token
    pub access_token: Zeroizing<String>,
    /// OAuth2 refresh token (requires `offline.access`)
    pub refresh_token: Option<Zeroizing<String>>,
    /// Access token expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes
    pub scope: Option<String>,
    /// Twitter account id
    pub twitter_user_id: Option<String>,
    /// Twitter handle
    pub username: Option<String>,
    /// When the account was connected or last refreshed
    pub updated_at: DateTime<Utc>,
}

impl TwitterConnection {
    /// Whether the access token must be refreshed before use
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires| expires - Duration::minutes(1) <= now)
    }
}

impl fmt::Debug for TwitterConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterConnection")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
