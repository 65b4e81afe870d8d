//! # IdeaVault
//!
//! The unified API for IdeaVault: documents ("ideas") that are encrypted at
//! rest, signed by their owner, and shared capability by capability.
//!
//! ## Overview
//!
//! - **Envelope encryption**: each idea version gets its own document key,
//!   wrapped separately for every holder of a view grant
//! - **Authorship**: the owner signs the content hash; anyone can verify it
//! - **Capabilities**: ACL entries scoped by object type (`Idea`, `Comment`,
//!   `AuditLog`) and permission (`VIEW`, `VERIFY`, ...)
//! - **Version chains**: new versions can inherit their parent's grants,
//!   re-wrapped under the new document key
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ideavault::{DocumentInfo, Vault, VaultConfig, VersionOptions};
//! use ideavault::core::{Role, Subject};
//! use ideavault::perms::{CollaboratorRequest, Grant};
//! use ideavault::store::SqliteStore;
//!
//! async fn example() -> ideavault::Result<()> {
//!     let store = SqliteStore::open("vault.db")?;
//!     let vault = Vault::new(store, VaultConfig::from_env()?);
//!
//!     let alice = vault.register_user("alice@example.com", "Correct-Horse-9", Role::Owner).await?;
//!     vault.register_user("bob@example.com", "Battery-Staple-7", Role::Viewer).await?;
//!
//!     let subject = Subject::new(alice.id, alice.role);
//!     let receipt = vault
//!         .upload_document(
//!             &subject,
//!             b"hello",
//!             DocumentInfo::new("Greeting", "hello.txt", "text/plain"),
//!             &[CollaboratorRequest::new("bob@example.com", [Grant::view()])],
//!             VersionOptions::new_chain(),
//!         )
//!         .await?;
//!
//!     let outcome = vault.view_document(&subject, receipt.idea_id).await?;
//!     assert_eq!(outcome.content.as_deref(), Some(&b"hello"[..]));
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `ideavault::core` - Identifiers, roles, hashing and signatures
//! - `ideavault::perms` - Encryption, key wrapping and ACL evaluation
//! - `ideavault::store` - Storage abstraction and SQLite

pub mod config;
pub mod custodian;
pub mod error;
pub mod vault;
pub mod versioning;

// Re-export component crates
pub use ideavault_core as core;
pub use ideavault_perms as perms;
pub use ideavault_store as store;

// Re-export main types for convenience
pub use config::{PasswordPolicy, VaultConfig};
pub use custodian::{Credential, KeyCustodian};
pub use error::{ErrorKind, Result, VaultError};
pub use vault::{
    AccessListing, DocumentInfo, IntegrityStatus, IntegrityVerdict, PublicVerification,
    UploadReceipt, Vault, ViewOutcome, VERIFY_ONLY_MESSAGE,
};
pub use versioning::VersionOptions;

// Re-export commonly used types
pub use ideavault_core::{IdeaId, ObjectType, Permission, Role, Subject, UserId};
pub use ideavault_perms::{AclMode, CollaboratorRequest, Grant};
