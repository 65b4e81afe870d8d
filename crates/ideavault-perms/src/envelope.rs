//! Encrypted document envelope.
//!
//! A document is encrypted exactly once, under a fresh per-document
//! [`EncryptionKey`]. The key itself never travels with the envelope; it is
//! wrapped separately for each reader (see [`crate::wrap`]).

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{PermsError, Result};

/// Format identifier for encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

impl EncryptionFormat {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(EncryptionFormat::ChaCha20Poly1305),
            other => Err(PermsError::Serialization(format!(
                "unknown encryption format: {}",
                other
            ))),
        }
    }
}

/// An encrypted payload envelope.
///
/// This structure wraps encrypted data and provides the metadata
/// needed to decrypt it (assuming the reader has the key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt plaintext with the given key.
    pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Encrypt plaintext under a freshly generated document key.
    ///
    /// Returns the envelope together with the key that opens it.
    pub fn seal(plaintext: &[u8]) -> Result<(Self, EncryptionKey)> {
        EncryptedPayloadBuilder::new(plaintext).build()
    }

    /// Decrypt with the given key.
    ///
    /// Fails with [`PermsError::Decryption`] if the key, nonce or ciphertext
    /// do not match what produced this envelope.
    pub fn decrypt(&self, key: &EncryptionKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }
}

/// Builder for encrypting a document under a fresh content key.
pub struct EncryptedPayloadBuilder<'a> {
    plaintext: &'a [u8],
    content_key: EncryptionKey,
}

impl<'a> EncryptedPayloadBuilder<'a> {
    /// Start building an encrypted payload.
    pub fn new(plaintext: &'a [u8]) -> Self {
        Self {
            plaintext,
            content_key: EncryptionKey::generate(),
        }
    }

    /// Build the encrypted payload, handing back the content key.
    pub fn build(self) -> Result<(EncryptedPayload, EncryptionKey)> {
        let payload = EncryptedPayload::encrypt(self.plaintext, &self.content_key)?;
        Ok((payload, self.content_key))
    }
}
