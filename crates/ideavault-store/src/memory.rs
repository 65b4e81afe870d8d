//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use ideavault_core::{AclEntryId, IdeaId, UserId};
use ideavault_perms::{AclEntry, AclKey};

use crate::error::{Result, StoreError};
use crate::records::{Idea, User};
use crate::traits::{check_entry, AclFilter, CreateResult, Store, UpsertResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<UserId, User>,

    /// Email index: email -> user id.
    emails: HashMap<String, UserId>,

    ideas: HashMap<IdeaId, Idea>,

    /// Version index: (root, version) -> idea id.
    versions: HashMap<(IdeaId, u32), IdeaId>,

    /// ACL entries ordered by (time-ordered) id.
    acl: BTreeMap<AclEntryId, AclEntry>,

    /// Uniqueness index: (subject, object, capability) -> entry id.
    acl_keys: HashMap<AclKey, AclEntryId>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.write()?;

        if inner.emails.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }

        inner.emails.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn create_idea(&self, idea: &Idea, entries: &[AclEntry]) -> Result<CreateResult> {
        let mut inner = self.write()?;

        if inner.versions.contains_key(&(idea.root, idea.version)) {
            return Ok(CreateResult::VersionConflict);
        }
        if inner.ideas.contains_key(&idea.id) {
            return Err(StoreError::Conflict(format!("idea {} already exists", idea.id)));
        }
        // Validate the whole batch before touching anything
        for entry in entries {
            check_entry(entry)?;
            if inner.acl_keys.contains_key(&entry.key()) || inner.acl.contains_key(&entry.id) {
                return Err(StoreError::Conflict(format!(
                    "duplicate ACL entry {}/{} for {}",
                    entry.object_type, entry.permission, entry.subject
                )));
            }
        }
        let mut batch_keys = HashSet::new();
        if !entries.iter().all(|e| batch_keys.insert(e.key())) {
            return Err(StoreError::Conflict("duplicate ACL entry within batch".into()));
        }

        inner.versions.insert((idea.root, idea.version), idea.id);
        inner.ideas.insert(idea.id, idea.clone());
        for entry in entries {
            inner.acl_keys.insert(entry.key(), entry.id);
            inner.acl.insert(entry.id, entry.clone());
        }

        Ok(CreateResult::Created)
    }

    async fn get_idea(&self, id: &IdeaId) -> Result<Option<Idea>> {
        Ok(self.read()?.ideas.get(id).cloned())
    }

    async fn max_version(&self, root: &IdeaId) -> Result<Option<u32>> {
        let inner = self.read()?;
        Ok(inner
            .versions
            .keys()
            .filter(|(r, _)| r == root)
            .map(|&(_, v)| v)
            .max())
    }

    async fn find_acl(&self, filter: &AclFilter) -> Result<Vec<AclEntry>> {
        let inner = self.read()?;
        Ok(inner
            .acl
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn get_acl_entry(&self, id: &AclEntryId) -> Result<Option<AclEntry>> {
        Ok(self.read()?.acl.get(id).cloned())
    }

    async fn upsert_acl_entry(&self, entry: &AclEntry) -> Result<UpsertResult> {
        check_entry(entry)?;
        let mut inner = self.write()?;
        let key = entry.key();

        let existing_id = inner.acl_keys.get(&key).copied();
        let Some(existing_id) = existing_id else {
            inner.acl_keys.insert(key, entry.id);
            inner.acl.insert(entry.id, entry.clone());
            return Ok(UpsertResult::Inserted);
        };

        let existing = inner
            .acl
            .get_mut(&existing_id)
            .ok_or_else(|| StoreError::InvalidData(format!("dangling ACL index for {}", existing_id)))?;

        if existing.wrapped_key.is_none() && entry.wrapped_key.is_some() {
            existing.wrapped_key = entry.wrapped_key.clone();
            Ok(UpsertResult::KeyBackfilled)
        } else {
            Ok(UpsertResult::Unchanged)
        }
    }

    async fn delete_acl_entry(&self, id: &AclEntryId) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.acl.remove(id) {
            Some(entry) => {
                inner.acl_keys.remove(&entry.key());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
