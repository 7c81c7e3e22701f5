//! Record encryption
//!
//! Sensitive records are sealed with AES-256-GCM before they are placed in a
//! block. The key is the SHA-256 digest of the configured passphrase. Sealed
//! values are `base64(nonce || ciphertext)`, so they never start with `{`
//! and can be told apart from plain JSON envelopes on read.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::errors::{DbError, DbResult};

/// GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// Symmetric cipher for record payloads
#[derive(Clone)]
pub struct Cipher {
    inner: Aes256Gcm,
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Derive a cipher from a passphrase
    pub fn from_passphrase(passphrase: &str) -> DbResult<Self> {
        if passphrase.is_empty() {
            return Err(DbError::Encryption("encryption key is empty".into()));
        }
        let digest = Sha256::digest(passphrase.as_bytes());
        let inner = Aes256Gcm::new_from_slice(&digest)
            .map_err(|e| DbError::Encryption(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Seal a plaintext payload
    pub fn encrypt(&self, plaintext: &str) -> DbResult<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .inner
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| DbError::Encryption("failed to encrypt record".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Open a sealed payload
    pub fn decrypt(&self, sealed: &str) -> DbResult<String> {
        let bytes = STANDARD
            .decode(sealed.trim())
            .map_err(|e| DbError::Encryption(format!("invalid sealed value: {}", e)))?;
        if bytes.len() <= NONCE_SIZE {
            return Err(DbError::Encryption("sealed value is truncated".into()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .inner
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DbError::Encryption("failed to decrypt record".into()))?;

        String::from_utf8(plaintext).map_err(|e| DbError::Encryption(e.to_string()))
    }
}

/// Whether a stored value looks like a sealed payload rather than JSON
pub fn is_sealed(value: &str) -> bool {
    !value.trim_start().starts_with('{')
}
