//! # IdeaVault Permissions
//!
//! Envelope encryption, key wrapping and capability-based access control.
//!
//! ## Encryption Model
//!
//! Each idea version uses a two-layer key model:
//!
//! 1. **Document Key**: a fresh symmetric key (ChaCha20-Poly1305) that encrypts the payload
//! 2. **Wrapped Keys**: the document key sealed for each reader via X25519 ECDH
//!
//! Adding a reader never re-encrypts the document. New versions get a new
//! document key, which is re-wrapped for every inherited reader.
//!
//! ## Access Model
//!
//! - **AclEntry**: one capability (object type + permission) on one idea
//! - **Access**: the evaluated state of a subject against an idea
//! - **GrantPlan**: a capability to create on a new version, computed without key material
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ideavault_perms::{EncryptedPayload, UserSecretKey, WrappedKey};
//!
//! let reader = UserSecretKey::generate();
//! let (envelope, key) = EncryptedPayload::seal(b"draft").unwrap();
//! let wrapped = WrappedKey::wrap(&key, &reader.public_key().exchange, b"idea").unwrap();
//!
//! let opened = wrapped.unwrap(reader.exchange(), b"idea").unwrap();
//! assert_eq!(envelope.decrypt(&opened).unwrap(), b"draft");
//! ```

pub mod acl;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod evaluator;
pub mod identity;
pub mod plan;
pub mod protect;
pub mod wrap;

pub use acl::{AclEntry, AclKey, CollaboratorRequest, Grant, OWNER_GRANTS};
pub use crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, SharedKey, X25519PublicKey,
    X25519StaticSecret,
};
pub use envelope::{EncryptedPayload, EncryptedPayloadBuilder, EncryptionFormat};
pub use error::{PermsError, Result};
pub use evaluator::{evaluate, has_capability, is_owner, Access, AclIndex};
pub use identity::{UserPublicKey, UserSecretKey};
pub use plan::{materialize, plan_grants, AclMode, GrantPlan, RecipientGrants};
pub use protect::{protect, unprotect, KeyFormat, MasterKey, ProtectedKey};
pub use wrap::WrappedKey;
