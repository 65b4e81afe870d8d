//! Store trait: the abstract interface for user, idea and ACL persistence.
//!
//! This trait allows the vault to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use ideavault_core::{AclEntryId, IdeaId, UserId};
use ideavault_perms::AclEntry;

use crate::error::{Result, StoreError};
use crate::records::{Idea, User};

/// Result of creating an idea version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateResult {
    /// The idea and all of its ACL entries were written.
    Created,
    /// Another idea already holds this `(root, version)`. Nothing was written.
    VersionConflict,
}

/// Result of upserting an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    /// No entry existed for this subject, object and capability.
    Inserted,
    /// An existing keyless `Idea`/`View` entry received a wrapped key.
    KeyBackfilled,
    /// An equivalent entry already existed.
    Unchanged,
}

/// Selects ACL entries. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AclFilter {
    pub subject: Option<UserId>,
    pub object: Option<IdeaId>,
}

impl AclFilter {
    /// All entries on one idea.
    pub fn object(object: IdeaId) -> Self {
        Self {
            object: Some(object),
            ..Self::default()
        }
    }

    pub fn subject(mut self, subject: UserId) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn matches(&self, entry: &AclEntry) -> bool {
        self.subject.map_or(true, |s| s == entry.subject)
            && self.object.map_or(true, |o| o == entry.object)
    }
}

/// Reject an entry that breaks the key-carrying rules before it is written.
pub(crate) fn check_entry(entry: &AclEntry) -> Result<()> {
    entry
        .validate()
        .map_err(|e| StoreError::InvalidData(format!("ACL entry {}: {}", entry.id, e)))
}

/// The Store trait: async interface for vault persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Atomic creation**: an idea and its ACL entries are written together
///   or not at all, so a reader never sees an idea without its owner entries.
/// - **Version uniqueness**: `(root, version)` is unique; a clash is reported
///   as [`CreateResult::VersionConflict`], not an error.
/// - **Entry uniqueness**: `(subject, object, object_type, permission)` is
///   unique; re-granting only ever backfills a missing wrapped key.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // User Directory
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new user. Fails with `Conflict` if the email or id is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Find a user by (lowercase) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Idea Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an idea version together with its ACL entries, atomically.
    ///
    /// Fails with `InvalidData` if any entry carries a wrapped key on a
    /// capability other than `Idea`/`View`.
    async fn create_idea(&self, idea: &Idea, entries: &[AclEntry]) -> Result<CreateResult>;

    /// Get an idea version by ID.
    async fn get_idea(&self, id: &IdeaId) -> Result<Option<Idea>>;

    /// Highest version recorded under `root`, if any.
    async fn max_version(&self, root: &IdeaId) -> Result<Option<u32>>;

    // ─────────────────────────────────────────────────────────────────────────
    // ACL Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Entries matching `filter`, oldest first.
    async fn find_acl(&self, filter: &AclFilter) -> Result<Vec<AclEntry>>;

    /// Get an ACL entry by ID.
    async fn get_acl_entry(&self, id: &AclEntryId) -> Result<Option<AclEntry>>;

    /// Insert an entry, or backfill the wrapped key of an existing keyless one.
    ///
    /// Entries are checked as in [`Store::create_idea`].
    async fn upsert_acl_entry(&self, entry: &AclEntry) -> Result<UpsertResult>;

    /// Delete an entry. Returns whether it existed.
    async fn delete_acl_entry(&self, id: &AclEntryId) -> Result<bool>;
}
