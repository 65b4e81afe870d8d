//! Key material for document envelopes.
//!
//! Every idea version is sealed under its own [`EncryptionKey`]. Readers
//! never receive that key in the clear: the grantor runs an X25519 agreement
//! between a one-shot [`EphemeralKeyPair`] and the reader's exchange key,
//! and the resulting [`SharedKey`] is stretched into a wrapping key bound to
//! the idea id. The reader repeats the agreement with their
//! [`X25519StaticSecret`] to recover it.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{PermsError, Result};

const WRAPPING_CONTEXT: &str = "ideavault-perms-v1-key-wrap";

/// The public exchange key that document keys are wrapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn point(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

/// The exchange half of a user's private key. Zeroized on drop.
///
/// Only ever held unprotected for the duration of one request.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(seed.as_mut());
        Self(StaticSecret::from(*seed))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Raw secret for protection under the master key.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(*PublicKey::from(&self.0).as_bytes())
    }

    /// Reader side of the agreement, against the ephemeral key stored in a
    /// wrapped key.
    pub fn diffie_hellman(&self, ephemeral_public: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.0.diffie_hellman(&ephemeral_public.point()).as_bytes())
    }
}

/// Output of one X25519 agreement. Never used directly as a cipher key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Stretch into the key that seals a document key for one idea.
    ///
    /// `idea` is the idea id; a wrapped key issued for one idea does not
    /// open under another.
    pub fn derive_wrapping_key(&self, idea: &[u8]) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key(WRAPPING_CONTEXT);
        hasher.update(&self.0);
        hasher.update(idea);
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

/// A ChaCha20-Poly1305 key: a document key, a wrapping key, or the key that
/// protects private keys at rest. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// A fresh document key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Seal `plaintext`. The output carries the 16-byte tag.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.cipher()
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| PermsError::Encryption(e.to_string()))
    }

    /// Open `ciphertext`. Any change to the key, nonce or bytes fails the tag.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.cipher()
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| PermsError::Decryption("authentication tag mismatch".into()))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// 96-bit ChaCha20-Poly1305 nonce, drawn at random for every seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// Grantor side of a key wrap. One pair per wrapped key.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey(*PublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    /// Stored alongside the wrapped key so the reader can redo the agreement.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Agree with the reader's exchange key. Consumes the ephemeral secret.
    pub fn diffie_hellman(self, reader: &X25519PublicKey) -> SharedKey {
        SharedKey(*self.secret.diffie_hellman(&reader.point()).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDEA: &[u8] = b"idea-0001";

    /// Wrapping keys derived by the grantor for `granted` and by the reader for `opened`.
    fn grant_to(
        reader: &X25519StaticSecret,
        granted: &[u8],
        opened: &[u8],
    ) -> (EncryptionKey, EncryptionKey) {
        let grantor = EphemeralKeyPair::generate();
        let ephemeral_public = grantor.public_key();

        let sealing = grantor.diffie_hellman(&reader.public_key()).derive_wrapping_key(granted);
        let opening = reader.diffie_hellman(&ephemeral_public).derive_wrapping_key(opened);
        (sealing, opening)
    }

    #[test]
    fn test_reader_derives_the_grantors_wrapping_key() {
        let reader = X25519StaticSecret::generate();
        let (sealing, opening) = grant_to(&reader, IDEA, IDEA);
        assert_eq!(sealing.as_bytes(), opening.as_bytes());
    }

    #[test]
    fn test_wrapping_key_is_bound_to_the_idea() {
        let reader = X25519StaticSecret::generate();
        let (sealing, opening) = grant_to(&reader, b"idea-0002", IDEA);
        assert_ne!(sealing.as_bytes(), opening.as_bytes());
    }

    #[test]
    fn test_each_grant_uses_a_fresh_ephemeral_key() {
        assert_ne!(
            EphemeralKeyPair::generate().public_key(),
            EphemeralKeyPair::generate().public_key()
        );
    }

    #[test]
    fn test_exchange_secret_restores_from_bytes() {
        let secret = X25519StaticSecret::generate();
        let restored = X25519StaticSecret::from_bytes(*secret.to_bytes());
        assert_eq!(secret.public_key(), restored.public_key());
    }

    #[test]
    fn test_document_key_seals_and_opens() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();

        let sealed = key.encrypt(b"draft chapter", &nonce).unwrap();
        assert_eq!(sealed.len(), b"draft chapter".len() + 16);
        assert_eq!(key.decrypt(&sealed, &nonce).unwrap(), b"draft chapter");
    }

    #[test]
    fn test_sealed_document_rejects_other_key_or_nonce() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();
        let sealed = key.encrypt(b"draft chapter", &nonce).unwrap();

        assert!(matches!(
            EncryptionKey::generate().decrypt(&sealed, &nonce),
            Err(PermsError::Decryption(_))
        ));
        assert!(matches!(
            key.decrypt(&sealed, &EncryptionNonce::generate()),
            Err(PermsError::Decryption(_))
        ));
    }

    #[test]
    fn test_key_debug_hides_material() {
        let key = EncryptionKey::from_bytes([0xab; 32]);
        assert_eq!(format!("{:?}", key), "EncryptionKey(..)");
    }
}
