//! Long-term user key pairs.
//!
//! A user's key pair has two halves: an Ed25519 key for signing the content
//! hash of documents they upload, and an X25519 key that document keys are
//! wrapped to. The public halves are stored in the clear; the secret halves
//! only ever leave memory protected under the master key (see [`crate::protect`]).

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use ideavault_core::{Ed25519PublicKey, Keypair};

use crate::crypto::{X25519PublicKey, X25519StaticSecret};
use crate::error::{PermsError, Result};

/// Length of a serialized [`UserSecretKey`].
pub const SECRET_KEY_LEN: usize = 64;

/// The public half of a user's key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublicKey {
    /// Verifies document signatures.
    pub signing: Ed25519PublicKey,
    /// Receives wrapped document keys.
    pub exchange: X25519PublicKey,
}

/// The secret half of a user's key pair. Both halves zeroize on drop.
pub struct UserSecretKey {
    signing: Keypair,
    exchange: X25519StaticSecret,
}

impl UserSecretKey {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        Self {
            signing: Keypair::generate(),
            exchange: X25519StaticSecret::generate(),
        }
    }

    /// Derive the public half.
    pub fn public_key(&self) -> UserPublicKey {
        UserPublicKey {
            signing: self.signing.public_key(),
            exchange: self.exchange.public_key(),
        }
    }

    /// Key used to sign uploaded documents.
    pub fn signing(&self) -> &Keypair {
        &self.signing
    }

    /// Key used to unwrap document keys.
    pub fn exchange(&self) -> &X25519StaticSecret {
        &self.exchange
    }

    /// Serialize the secret material as `signing_seed || exchange_secret`.
    pub fn to_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        out[..32].copy_from_slice(self.signing.seed().as_ref());
        out[32..].copy_from_slice(self.exchange.to_bytes().as_ref());
        out
    }

    /// Rebuild from serialized secret material.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(PermsError::KeyFormat(format!(
                "secret key must be {} bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            )));
        }
        let mut seed = Zeroizing::new([0u8; 32]);
        let mut exchange = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&bytes[..32]);
        exchange.copy_from_slice(&bytes[32..]);
        Ok(Self {
            signing: Keypair::from_seed(&seed),
            exchange: X25519StaticSecret::from_bytes(*exchange),
        })
    }
}

impl std::fmt::Debug for UserSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSecretKey({:?})", self.signing.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_bytes_roundtrip() {
        let secret = UserSecretKey::generate();
        let restored = UserSecretKey::from_bytes(secret.to_bytes().as_ref()).unwrap();
        assert_eq!(secret.public_key(), restored.public_key());
    }

    #[test]
    fn test_secret_from_short_bytes_is_key_format_error() {
        assert!(matches!(
            UserSecretKey::from_bytes(&[0u8; 32]),
            Err(PermsError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_halves_are_independent() {
        let secret = UserSecretKey::generate();
        let public = secret.public_key();
        assert_ne!(public.signing.as_bytes(), public.exchange.as_bytes());
    }
}
