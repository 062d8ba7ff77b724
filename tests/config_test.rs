// ABOUTME: Integration tests for loading server configuration from the process environment
// ABOUTME: Environment-mutating tests are serialized with serial_test
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::env;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use recast_core::errors::ErrorCode;
use recast_server::config::environment::{Environment, ServerConfig};
use serial_test::serial;

const MANAGED_VARS: &[&str] = &[
    "ENVIRONMENT",
    "JWT_SECRET",
    "ENCRYPTION_KEY",
    "HTTP_PORT",
    "PAYMENT_VERIFY_ATTEMPTS",
    "PADDLE_PUBLIC_KEY",
    "TWITTER_CLIENT_ID",
    "FRONTEND_URL",
];

/// Clear the variables these tests touch, then apply `vars`
fn with_env(vars: &[(&str, &str)]) {
    for key in MANAGED_VARS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }
}

#[test]
#[serial]
fn test_production_refuses_to_start_without_secrets() {
    with_env(&[("ENVIRONMENT", "production")]);
    let err = ServerConfig::from_env().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigMissing);
    assert!(err.message.contains("JWT_SECRET"));

    with_env(&[("ENVIRONMENT", "production"), ("JWT_SECRET", "s3cret")]);
    let err = ServerConfig::from_env().unwrap_err();
    assert!(err.message.contains("ENCRYPTION_KEY"));

    let key = STANDARD.encode([9u8; 32]);
    with_env(&[
        ("ENVIRONMENT", "production"),
        ("JWT_SECRET", "s3cret"),
        ("ENCRYPTION_KEY", key.as_str()),
    ]);
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.environment, Environment::Production);
    assert_eq!(*config.security.encryption_key, [9u8; 32]);
    with_env(&[]);
}

#[test]
#[serial]
fn test_environment_values_are_parsed() {
    with_env(&[
        ("HTTP_PORT", "9191"),
        ("PAYMENT_VERIFY_ATTEMPTS", "0"),
        ("PADDLE_PUBLIC_KEY", "-----BEGIN PUBLIC KEY-----\\nAAAA\\n-----END PUBLIC KEY-----"),
        ("TWITTER_CLIENT_ID", "client"),
        ("FRONTEND_URL", "https://app.recast.test/"),
    ]);
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.http_port, 9191);
    assert_eq!(config.crypto_payments.verify_attempts, 1);
    assert_eq!(
        config.paddle.public_key_pem.as_deref(),
        Some("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----")
    );
    assert_eq!(config.frontend_url, "https://app.recast.test");
    assert!(config.summary().contains("Twitter OAuth: Enabled"));
    with_env(&[]);
}

#[test]
#[serial]
fn test_malformed_values_are_config_errors() {
    with_env(&[("ENCRYPTION_KEY", "not base64!")]);
    let err = ServerConfig::from_env().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);

    with_env(&[("HTTP_PORT", "70000")]);
    assert!(ServerConfig::from_env().is_err());
    with_env(&[]);
}
