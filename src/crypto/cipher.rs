// ABOUTME: AES-256-GCM encryption of secrets stored in the database
// ABOUTME: Prepends a random 96-bit nonce and binds each ciphertext to a context label
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use recast_core::errors::{AppError, AppResult};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Encrypts and decrypts short secrets (API keys, OAuth tokens)
///
/// Output format: `base64(nonce || ciphertext || tag)`. The `context` string
/// is authenticated as associated data, so a ciphertext copied into another
/// column or row fails to decrypt.
#[derive(Clone)]
pub struct SecretCipher {
    key: Zeroizing<[u8; 32]>,
    rng: SystemRandom,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretCipher {
    /// Create a cipher from a 256-bit key
    #[must_use]
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
            rng: SystemRandom::new(),
        }
    }

    fn sealing_key(&self) -> AppResult<LessSafeKey> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key[..])?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypt `plaintext` bound to `context`
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG or the AEAD operation fails
    pub fn encrypt(&self, plaintext: &str, context: &str) -> AppResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut data = plaintext.as_bytes().to_vec();
        self.sealing_key()?
            .seal_in_place_append_tag(nonce, Aad::from(context.as_bytes()), &mut data)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(data);
        Ok(STANDARD.encode(combined))
    }

    /// Decrypt a value produced by [`SecretCipher::encrypt`] with the same `context`
    ///
    /// # Errors
    ///
    /// Returns an error if the value is malformed, was tampered with, or the key differs
    pub fn decrypt(&self, encoded: &str, context: &str) -> AppResult<Zeroizing<String>> {
        let combined = STANDARD.decode(encoded)?;
        if combined.len() < NONCE_LEN {
            return Err(AppError::invalid_input("Encrypted value is too short"));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce_array: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| AppError::internal("Invalid nonce length"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_array);

        let mut data = ciphertext.to_vec();
        let plaintext = self
            .sealing_key()?
            .open_in_place(nonce, Aad::from(context.as_bytes()), &mut data)
            .map_err(|_| AppError::internal("Failed to decrypt stored secret"))?;

        String::from_utf8(plaintext.to_vec())
            .map(Zeroizing::new)
            .map_err(|e| AppError::internal(format!("Decrypted secret is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let cipher = SecretCipher::new([3u8; 32]);
        let a = cipher.encrypt("sk-test", "api_key:openai").unwrap();
        let b = cipher.encrypt("sk-test", "api_key:openai").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a, "api_key:openai").unwrap().as_str(), "sk-test");
    }

    #[test]
    fn test_wrong_key_or_context_fails() {
        let cipher = SecretCipher::new([3u8; 32]);
        let other = SecretCipher::new([4u8; 32]);
        let sealed = cipher.encrypt("secret", "twitter:access").unwrap();

        assert!(other.decrypt(&sealed, "twitter:access").is_err());
        assert!(cipher.decrypt(&sealed, "twitter:refresh").is_err());
        assert!(cipher.decrypt("AAAA", "twitter:access").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let cipher = SecretCipher::new([9u8; 32]);
        assert!(format!("{cipher:?}").contains("REDACTED"));
    }
}
