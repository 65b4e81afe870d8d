//! Key wrapping via X25519 key agreement.
//!
//! When a reader is granted VIEW access, the document's content key is
//! wrapped for that reader's X25519 public key. The document itself is
//! never re-encrypted; only the key is.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret};
use crate::error::{PermsError, Result};

/// A content key encrypted for exactly one recipient.
///
/// The key is encrypted using ephemeral X25519 ECDH + ChaCha20-Poly1305. The
/// wrapping key is derived with the document identifier as context, so a
/// wrapped key only opens for the document it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// The symmetric key, encrypted with the derived wrapping key.
    pub encrypted_key: Vec<u8>,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,
}

impl WrappedKey {
    /// Wrap a content key for a recipient.
    ///
    /// # Arguments
    /// * `content_key` - The document key to share
    /// * `recipient_public` - Recipient's X25519 public key
    /// * `context` - The document identifier bytes the key belongs to
    pub fn wrap(
        content_key: &EncryptionKey,
        recipient_public: &X25519PublicKey,
        context: &[u8],
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(recipient_public);
        let wrap_key = shared.derive_wrapping_key(context);

        let nonce = EncryptionNonce::generate();
        let encrypted_key = wrap_key.encrypt(content_key.as_bytes(), &nonce)?;

        Ok(Self {
            ephemeral_public,
            encrypted_key,
            nonce,
        })
    }

    /// Recover the content key using the recipient's secret key.
    ///
    /// Fails with [`PermsError::KeyUnwrap`] for the wrong recipient, the wrong
    /// document context, or corrupted data.
    pub fn unwrap(&self, recipient_secret: &X25519StaticSecret, context: &[u8]) -> Result<EncryptionKey> {
        let shared = recipient_secret.diffie_hellman(&self.ephemeral_public);
        let wrap_key = shared.derive_wrapping_key(context);

        let key_bytes = Zeroizing::new(
            wrap_key
                .decrypt(&self.encrypted_key, &self.nonce)
                .map_err(|_| PermsError::KeyUnwrap("wrapped key does not open with this private key".into()))?,
        );

        let arr: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            PermsError::KeyUnwrap(format!(
                "invalid key length: expected 32, got {}",
                key_bytes.len()
            ))
        })?;

        Ok(EncryptionKey::from_bytes(arr))
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| PermsError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PermsError::Serialization(e.to_string()))
    }
}
