//! Hashing and signature primitives.
//!
//! Wraps Blake3 content hashing and Ed25519 authorship signatures with
//! strong types. Everything here is a pure function over byte buffers.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CoreError;

/// Domain separator prepended to a content hash before signing.
pub const SIGN_DOMAIN: &[u8] = b"ideavault-content-v1:";

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash a plaintext document.
pub fn content_hash(plaintext: &[u8]) -> Blake3Hash {
    Blake3Hash::hash(plaintext)
}

/// The message actually signed for a content hash.
fn signed_message(hash: &Blake3Hash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SIGN_DOMAIN.len() + 32);
    buf.extend_from_slice(SIGN_DOMAIN);
    buf.extend_from_slice(hash.as_bytes());
    buf
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }

    /// Check a content signature. Any failure (bad key, bad signature) is `false`.
    pub fn verify_content(&self, hash: &Blake3Hash, signature: &Ed25519Signature) -> bool {
        self.verify(&signed_message(hash), signature).is_ok()
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A signing keypair.
///
/// This wraps ed25519-dalek's SigningKey, which zeroizes itself on drop.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Sign the content hash of a plaintext document.
    pub fn sign_content(&self, hash: &Blake3Hash) -> Ed25519Signature {
        self.sign(&signed_message(hash))
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_content_signature_roundtrip() {
        let keypair = Keypair::generate();
        let hash = content_hash(b"hello");
        let signature = keypair.sign_content(&hash);

        assert!(keypair.public_key().verify_content(&hash, &signature));
    }

    #[test]
    fn test_other_key_rejects_signature() {
        let owner = Keypair::generate();
        let other = Keypair::generate();
        let hash = content_hash(b"hello");
        let signature = owner.sign_content(&hash);

        assert!(!other.public_key().verify_content(&hash, &signature));
    }

    #[test]
    fn test_tampered_hash_rejected() {
        let keypair = Keypair::generate();
        let signature = keypair.sign_content(&content_hash(b"hello"));

        assert!(!keypair
            .public_key()
            .verify_content(&content_hash(b"hellO"), &signature));
    }

    #[test]
    fn test_content_signature_is_domain_separated() {
        let keypair = Keypair::generate();
        let hash = content_hash(b"hello");

        // A raw signature over the hash bytes must not pass as a content signature
        let raw = keypair.sign(hash.as_bytes());
        assert!(!keypair.public_key().verify_content(&hash, &raw));
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(*kp1.seed(), seed);
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = content_hash(b"test data");
        let recovered = Blake3Hash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, recovered);
        assert!(Blake3Hash::from_hex("abcd").is_err());
    }

    proptest! {
        #[test]
        fn prop_sign_verify_any_payload(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
            let keypair = Keypair::generate();
            let hash = content_hash(&payload);
            let signature = keypair.sign_content(&hash);
            prop_assert!(keypair.public_key().verify_content(&hash, &signature));
        }
    }
}
