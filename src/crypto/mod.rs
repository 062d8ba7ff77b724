// ABOUTME: Cryptographic helpers for secrets at rest and signature comparison
// ABOUTME: Re-exports the AES-GCM SecretCipher and a constant-time string comparison
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Cryptography used by the server

/// AES-256-GCM secret encryption
pub mod cipher;

pub use cipher::SecretCipher;

use subtle::ConstantTimeEq;

/// Compare two secrets without leaking the position of the first difference
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("admin-key", "admin-key"));
        assert!(!constant_time_eq("admin-key", "admin-kez"));
        assert!(!constant_time_eq("short", "longer"));
    }
}
