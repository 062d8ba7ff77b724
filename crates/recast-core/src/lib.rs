// ABOUTME: Core types and constants for the Recast content repurposing platform
// ABOUTME: Foundation crate with error handling, shared domain enums, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

#![deny(unsafe_code)]

//! # Recast Core
//!
//! Foundation crate providing shared types and constants for the Recast
//! platform. It changes rarely, which keeps incremental builds of the server
//! crate fast.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Application-wide constants organized by domain
//! - **models**: Enums shared by the repurposing engine and the server

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Shared domain enums (platform, provider, subscription, payment)
pub mod models;
