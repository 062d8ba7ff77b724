// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: AI delegation and the repurposing workflow, reusable outside HTTP handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Domain service layer
//!
//! Route handlers stay thin: they validate and authenticate, then call into
//! these services, which own the business rules.

/// AI task prompts, token budgets and outcome normalization
pub mod ai_delegation;

/// Content to snippet-group workflow
pub mod repurpose;

/// Twitter connection and thread publishing
pub mod twitter;

/// Paddle webhooks and manual crypto payments
pub mod payments;

pub use ai_delegation::{AiDelegator, AiTask, DelegationOutcome, PromptContext, ProviderKeys};
pub use payments::{
    ChainClients, CreateIntentRequest, CryptoCurrency, PaymentService, WebhookOutcome,
};
pub use repurpose::{RepurposeRequest, RepurposeResult, RepurposeService};
pub use twitter::{CallbackOutcome, CallbackParams, TwitterService};
