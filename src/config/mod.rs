// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Re-exports the environment-driven ServerConfig and its sections
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Configuration module for the Recast server

/// Environment and server configuration
pub mod environment;

pub use environment::{
    ChainConfig, CloudinaryConfig, CryptoPaymentsConfig, DatabaseConfig, Environment, LlmConfig,
    PaddleConfig, PlanPrices, SecurityConfig, ServerConfig, TwitterConfig,
};
