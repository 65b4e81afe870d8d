//! # IdeaVault Core
//!
//! Pure primitives for IdeaVault: record identifiers, roles and capability
//! vocabulary, content hashing, and authorship signatures.
//!
//! This crate contains no I/O, no storage, no key wrapping. It is pure
//! computation over the values every other crate passes around.
//!
//! ## Key Types
//!
//! - [`UserId`], [`IdeaId`], [`AclEntryId`] - Typed record identifiers
//! - [`Role`], [`ObjectType`], [`Permission`] - The access-control vocabulary
//! - [`Subject`] - An authenticated requester (`id` + `role`)
//! - [`Blake3Hash`] - Content hash of a plaintext document
//! - [`Keypair`] / [`Ed25519PublicKey`] - Authorship signatures
//!
//! ## Signatures
//!
//! Signatures are always computed over the content hash of the *plaintext*,
//! never over ciphertext. See [`Keypair::sign_content`].

pub mod crypto;
pub mod error;
pub mod types;

pub use crypto::{content_hash, Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair, SIGN_DOMAIN};
pub use error::{CoreError, Result};
pub use types::{AclEntryId, IdeaId, ObjectType, Permission, Role, Subject, UserId};
