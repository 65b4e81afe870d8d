//! At-rest protection of user private keys.
//!
//! Private keys are sealed under a process-wide [`MasterKey`] that is derived
//! once from a long-lived secret and never stored alongside user records.
//! Records carry a [`KeyFormat`] tag; anything not sealed under the current
//! format cannot be opened and surfaces as [`PermsError::KeyFormat`].

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{PermsError, Result};
use crate::identity::UserSecretKey;

/// Context string for master key derivation.
const MASTER_KEY_CONTEXT: &str = "ideavault-custodian-v1-master-key";

/// Key that protects every user's private key at rest. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Derive the master key from a long-lived secret.
    pub fn derive(secret: &[u8]) -> Self {
        Self(blake3::derive_key(MASTER_KEY_CONTEXT, secret))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    fn cipher_key(&self) -> EncryptionKey {
        EncryptionKey::from_bytes(self.0)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Scheme a protected key was sealed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyFormat {
    /// AES-CBC sealed PEM keys from before the key-format migration.
    LegacyCbc = 0,
    /// ChaCha20-Poly1305 over `signing_seed || exchange_secret`.
    ChaCha20Poly1305V1 = 1,
}

impl KeyFormat {
    /// The format new registrations are sealed under.
    pub const CURRENT: KeyFormat = KeyFormat::ChaCha20Poly1305V1;

    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(KeyFormat::LegacyCbc),
            1 => Ok(KeyFormat::ChaCha20Poly1305V1),
            other => Err(PermsError::KeyFormat(format!("unknown key format tag {}", other))),
        }
    }
}

/// A private key as persisted: sealed, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedKey {
    pub format: KeyFormat,
    pub nonce: EncryptionNonce,
    pub ciphertext: Vec<u8>,
}

/// Seal a user's secret key under the master key.
pub fn protect(secret: &UserSecretKey, master: &MasterKey) -> Result<ProtectedKey> {
    let nonce = EncryptionNonce::generate();
    let ciphertext = master.cipher_key().encrypt(secret.to_bytes().as_ref(), &nonce)?;
    Ok(ProtectedKey {
        format: KeyFormat::CURRENT,
        nonce,
        ciphertext,
    })
}

/// Open a protected key.
///
/// Every failure here means the record cannot be used without
/// re-registration, so all of them map to [`PermsError::KeyFormat`].
pub fn unprotect(protected: &ProtectedKey, master: &MasterKey) -> Result<UserSecretKey> {
    if protected.format != KeyFormat::CURRENT {
        return Err(PermsError::KeyFormat(format!(
            "private key stored under {:?}; account must be re-registered",
            protected.format
        )));
    }

    let plaintext = master
        .cipher_key()
        .decrypt(&protected.ciphertext, &protected.nonce)
        .map(Zeroizing::new)
        .map_err(|_| {
            PermsError::KeyFormat(
                "private key does not open under the current master key; account must be re-registered"
                    .into(),
            )
        })?;

    UserSecretKey::from_bytes(&plaintext)
}
