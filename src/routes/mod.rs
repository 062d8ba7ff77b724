// ABOUTME: Route module organization for the Recast REST API
// ABOUTME: One module per domain, each exposing a `*Routes` type that builds its axum Router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! REST routes
//!
//! Each domain module contains only route definitions and thin handlers that
//! validate input, authenticate, and delegate to the database managers or the
//! service layer.

/// Maintenance endpoints guarded by the admin key
pub mod admin;
/// Free-form AI task endpoint
pub mod ai;
/// Registration, login and the current user
pub mod auth;
/// Content CRUD, repurposing and snippet listing
pub mod content;
/// Folder CRUD
pub mod folders;
/// Liveness and readiness
pub mod health;
/// Paddle webhooks, crypto intents and payment history
pub mod payments;
/// Audience persona CRUD
pub mod personas;
/// Per-provider LLM API keys
pub mod settings;
/// Snippet edits and AI rewrites
pub mod snippets;
/// Own templates and the community marketplace
pub mod templates;
/// Twitter connection and thread publishing
pub mod twitter;
/// Media uploads
pub mod uploads;

pub use admin::AdminRoutes;
pub use ai::AiRoutes;
pub use auth::AuthRoutes;
pub use content::ContentRoutes;
pub use folders::FolderRoutes;
pub use health::HealthRoutes;
pub use payments::PaymentRoutes;
pub use personas::PersonaRoutes;
pub use settings::SettingsRoutes;
pub use snippets::SnippetRoutes;
pub use templates::TemplateRoutes;
pub use twitter::TwitterRoutes;
pub use uploads::UploadRoutes;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recast_core::errors::AppError;
use uuid::Uuid;

/// `204 No Content` when `deleted`, otherwise a 404 for `resource`
fn deleted_or_not_found(deleted: bool, resource: &str) -> Result<Response, AppError> {
    if deleted {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(AppError::not_found(resource))
    }
}

/// Parse a path id, reporting malformed ids as 404 like any unknown entity
fn parse_id(raw: &str, resource: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(resource))
}
