// ABOUTME: HTTP middleware for request ids, authentication and cross-origin access
// ABOUTME: Bearer-token and admin-key extractors plus the layers applied to every route
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

/// Bearer JWT and admin key extractors
pub mod auth;
/// CORS layer from configured origins
pub mod cors;
/// `x-request-id` propagation
pub mod request_id;

pub use auth::{AdminKey, AuthUser};
pub use cors::setup_cors;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
