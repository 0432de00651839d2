//! Token encryption at rest
//!
//! OAuth tokens are sealed with AES-256-GCM before they reach the database.
//! A blob is `base64(nonce || ciphertext || tag)` with a fresh 96-bit nonce
//! per call, so encrypting the same token twice never yields the same text.
//!
//! # Examples
//!
//! ```
//! use libcrosscast::cipher::SecretCipher;
//! use secrecy::ExposeSecret;
//!
//! let cipher = SecretCipher::from_key_bytes(&[7u8; 32]);
//! let blob = cipher.encrypt("access-token").unwrap();
//! assert_eq!(cipher.decrypt(&blob).unwrap().expose_secret(), "access-token");
//! ```

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::error::{CipherError, Result};

/// Length of the AES-256 key in bytes
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[cfg(feature = "dev-key")]
const DEV_KEY: &[u8; KEY_LEN] = b"crosscast-development-key-32byte";

/// Symmetric cipher for OAuth tokens
#[derive(Clone)]
pub struct SecretCipher {
    aead: Aes256Gcm,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretCipher {
    pub fn from_key_bytes(key: &[u8; KEY_LEN]) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Build a cipher from a base64-encoded 32-byte key
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKey` if the text is not base64 or does not
    /// decode to exactly 32 bytes.
    pub fn from_base64_key(key: &SecretString) -> Result<Self> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(key.expose_secret().trim())
                .map_err(|_| CipherError::InvalidKey("not valid base64".to_string()))?,
        );

        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
            .into());
        }

        let aead = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        Ok(Self { aead })
    }

    /// Build the process-wide cipher from the configured key
    ///
    /// Without a key this fails, unless the crate was built with the
    /// `dev-key` feature, in which case a fixed development key is used.
    pub fn from_configured_key(key: Option<&SecretString>) -> Result<Self> {
        match key {
            Some(key) => Self::from_base64_key(key),
            None => Self::fallback(),
        }
    }

    #[cfg(feature = "dev-key")]
    fn fallback() -> Result<Self> {
        tracing::warn!("ENCRYPTION_KEY is not set; using the built-in development key");
        Ok(Self::from_key_bytes(DEV_KEY))
    }

    #[cfg(not(feature = "dev-key"))]
    fn fallback() -> Result<Self> {
        Err(CipherError::MissingKey.into())
    }

    /// Generate a random key, base64-encoded, suitable for `ENCRYPTION_KEY`
    pub fn generate_key() -> String {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::thread_rng().fill_bytes(key.as_mut_slice());
        STANDARD.encode(key.as_slice())
    }

    /// Encrypt a token for storage
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(STANDARD.encode(blob))
    }

    /// Decrypt a stored blob back into the token
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Decryption` if the blob is malformed, was
    /// modified, or was sealed under a different key.
    pub fn decrypt(&self, blob: &str) -> Result<SecretString> {
        let raw = STANDARD
            .decode(blob.trim())
            .map_err(|_| CipherError::Decryption)?;

        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Decryption.into());
        }

        let (nonce, payload) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| CipherError::Decryption)?;

        let text = String::from_utf8(plaintext).map_err(|e| {
            drop(Zeroizing::new(e.into_bytes()));
            CipherError::Decryption
        })?;
        Ok(SecretString::from(text))
    }
}
