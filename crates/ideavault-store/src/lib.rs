//! # IdeaVault Store
//!
//! Storage abstraction for IdeaVault. Provides a trait-based interface for
//! users, idea versions and ACL entries with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`CreateResult`] - Result of creating an idea version
//! - [`UpsertResult`] - Result of granting an ACL entry
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ideavault_store::{AclFilter, SqliteStore, Store};
//! use ideavault_core::IdeaId;
//!
//! async fn example(idea: IdeaId) {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!
//!     // Every capability granted on one idea version
//!     let entries = store.find_acl(&AclFilter::object(idea)).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic creation**: an idea row and its ACL entries land in one transaction
//! - **Version conflicts**: a taken `(root, version)` returns `VersionConflict`
//! - **Grant upserts**: re-granting only backfills a missing wrapped key

pub mod error;
pub mod memory;
pub mod migration;
pub mod records;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use records::{FileMetadata, Idea, User};
pub use sqlite::SqliteStore;
pub use traits::{AclFilter, CreateResult, Store, UpsertResult};

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
