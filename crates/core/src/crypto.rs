//! Credential vault: authenticated encryption of OAuth tokens at rest.
//!
//! Tokens are sealed with AES-256-GCM under a single process-wide key. The
//! stored blob is `base64(nonce || ciphertext || tag)`, so a ciphertext is
//! self-contained and fits in one text column.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Key size in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// AES-GCM nonce size in bytes.
pub const NONCE_LENGTH: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Failed to encrypt token")]
    Encryption,

    /// The blob was malformed, truncated, tampered with, or sealed under a
    /// different key. Never carries partial plaintext.
    #[error("Failed to decrypt token")]
    Decryption,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Encrypts and decrypts provider tokens with a fixed symmetric key.
#[derive(Clone)]
pub struct TokenVault {
    cipher: Aes256Gcm,
}

impl fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVault").finish_non_exhaustive()
    }
}

impl TokenVault {
    /// Build a vault from a 64-character hex key (32 bytes).
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not valid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Build a vault from raw key bytes.
    pub fn from_bytes(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKey(format!(
                "expected {KEY_LENGTH} bytes, got {}",
                key.len()
            )));
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Seal `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LENGTH + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(STANDARD.encode(blob))
    }

    /// Open a blob produced by [`TokenVault::encrypt`].
    pub fn decrypt(&self, blob: &str) -> Result<String, CryptoError> {
        let bytes = STANDARD
            .decode(blob.trim())
            .map_err(|_| CryptoError::Decryption)?;
        if bytes.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(CryptoError::Decryption);
        }

        let (nonce, sealed) = bytes.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
    }

    /// Encrypt an optional value, passing `None` through.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
