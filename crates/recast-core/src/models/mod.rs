// ABOUTME: Shared domain enums for content platforms, providers, subscriptions and payments
// ABOUTME: Each enum round-trips through a stable lowercase string used in JSON and SQLite
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Shared Domain Enums
//!
//! These enums are stored as TEXT columns and exchanged as snake_case JSON
//! strings. `as_str` and `parse` are the single source of truth for both.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::llm;

/// Target platform of a repurposed snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Multi-part tweet thread
    TwitterThread,
    /// Single `LinkedIn` post
    LinkedinPost,
    /// Short prose summary
    Summary,
    /// Bulleted key points
    KeyPoints,
    /// Newsletter section
    Newsletter,
}

impl Platform {
    /// All supported platforms
    pub const ALL: [Self; 5] = [
        Self::TwitterThread,
        Self::LinkedinPost,
        Self::Summary,
        Self::KeyPoints,
        Self::Newsletter,
    ];

    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TwitterThread => "twitter_thread",
            Self::LinkedinPost => "linkedin_post",
            Self::Summary => "summary",
            Self::KeyPoints => "key_points",
            Self::Newsletter => "newsletter",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Whether outputs for this platform are split into ordered parts
    #[must_use]
    pub const fn is_multi_part(&self) -> bool {
        matches!(self, Self::TwitterThread)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetStatus {
    /// Freshly generated, editable
    #[default]
    Draft,
    /// Approved or published
    Finalized,
    /// Hidden from default listings
    Archived,
}

impl SnippetStatus {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
            Self::Archived => "archived",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "finalized" => Self::Finalized,
            "archived" => Self::Archived,
            _ => Self::Draft,
        }
    }
}

/// How a snippet was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    /// Deterministic rule engine
    #[default]
    RuleBased,
    /// Delegated to an LLM provider
    Ai,
}

impl GenerationMethod {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::Ai => "ai",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "ai" {
            Self::Ai
        } else {
            Self::RuleBased
        }
    }
}

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProviderKind {
    /// `OpenAI` chat completions
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini
    Gemini,
    /// Perplexity (OpenAI-compatible API)
    Perplexity,
}

impl AiProviderKind {
    /// All supported providers
    pub const ALL: [Self; 3] = [Self::OpenAi, Self::Gemini, Self::Perplexity];

    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Perplexity => "perplexity",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Human-readable vendor name
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Gemini",
            Self::Perplexity => "Perplexity",
        }
    }

    /// Largest output token budget we request from this vendor
    #[must_use]
    pub const fn max_output_tokens(&self) -> u32 {
        match self {
            Self::OpenAi => llm::OPENAI_MAX_OUTPUT_TOKENS,
            Self::Gemini => llm::GEMINI_MAX_OUTPUT_TOKENS,
            Self::Perplexity => llm::PERPLEXITY_MAX_OUTPUT_TOKENS,
        }
    }
}

impl fmt::Display for AiProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    /// Free tier
    #[default]
    Free,
    /// Individual paid tier
    Pro,
    /// Team tier
    Business,
}

impl SubscriptionPlan {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Business => "business",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "business" => Some(Self::Business),
            _ => None,
        }
    }
}

/// State of a user's subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed or lapsed
    #[default]
    Inactive,
    /// Paid and current
    Active,
    /// Last renewal failed
    PastDue,
    /// Cancelled by the user or provider
    Cancelled,
}

impl SubscriptionStatus {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "cancelled" => Self::Cancelled,
            _ => Self::Inactive,
        }
    }
}

/// Payment rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// Paddle card subscriptions
    Paddle,
    /// Manual SOL transfer
    Solana,
    /// Manual BTC transfer
    Bitcoin,
}

impl PaymentProvider {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paddle => "paddle",
            Self::Solana => "solana",
            Self::Bitcoin => "bitcoin",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paddle" => Some(Self::Paddle),
            "solana" => Some(Self::Solana),
            "bitcoin" => Some(Self::Bitcoin),
            _ => None,
        }
    }
}

/// State of a single payment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting confirmation
    #[default]
    Pending,
    /// Funds received
    Confirmed,
    /// Provider reported a failure
    Failed,
    /// Intent lapsed before payment arrived
    Expired,
}

impl PaymentStatus {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => Self::Confirmed,
            "failed" => Self::Failed,
            "expired" => Self::Expired,
            _ => Self::Pending,
        }
    }
}
