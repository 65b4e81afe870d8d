//! The Vault: unified API for IdeaVault.
//!
//! The Vault brings together the custodian, the access evaluator and the
//! store. Every operation evaluates access fresh, opens the caller's key for
//! the duration of the call only, and verifies signatures against the
//! idea owner's key.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ideavault_core::{
    content_hash, AclEntryId, Blake3Hash, IdeaId, ObjectType, Permission, Role, Subject, UserId,
};
use ideavault_perms::{
    evaluate, has_capability, is_owner, Access, AclEntry, CollaboratorRequest, EncryptedPayloadBuilder, Grant,
    WrappedKey,
};
use ideavault_store::{
    now_millis, AclFilter, CreateResult, FileMetadata, Idea, Store, UpsertResult, User,
};

use crate::config::VaultConfig;
use crate::custodian::KeyCustodian;
use crate::error::{Result, VaultError};
use crate::versioning::{self, VersionOptions};

/// Shown in place of content to subjects holding only `Verify`.
pub const VERIFY_ONLY_MESSAGE: &str = "content hidden, verify-only access";

/// Shown in place of content to admins holding no document key.
pub const NO_ADMIN_KEY_MESSAGE: &str = "content hidden, administrator holds no key for this idea";

/// Descriptive fields supplied with an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: String,
    /// File name and type. `size` is set from the uploaded bytes.
    pub file: FileMetadata,
}

impl DocumentInfo {
    pub fn new(title: impl Into<String>, file_name: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            file: FileMetadata {
                file_name: file_name.into(),
                file_type: file_type.into(),
                size: 0,
            },
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub idea_id: IdeaId,
    pub version: u32,
    pub root: IdeaId,
    pub content_hash: Blake3Hash,
}

/// Whether stored content still matches what its owner signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityStatus {
    Verified,
    Compromised,
}

/// What a subject gets back from viewing an idea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOutcome {
    pub idea_id: IdeaId,
    pub title: String,
    pub metadata: FileMetadata,
    pub version: u32,
    pub root: IdeaId,
    pub owner: UserId,
    pub content_hash: Blake3Hash,
    /// Plaintext, for subjects holding a document key.
    pub content: Option<Vec<u8>>,
    pub integrity: IntegrityStatus,
    pub can_view: bool,
    /// Why `content` is withheld, if it is.
    pub message: Option<String>,
}

/// Result of comparing a candidate file against a stored idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityVerdict {
    Match,
    Mismatch,
}

/// Unauthenticated proof of authorship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicVerification {
    pub idea_id: IdeaId,
    pub title: String,
    pub version: u32,
    pub owner_email: String,
    pub content_hash: Blake3Hash,
    pub signature_valid: bool,
}

/// One ACL entry as shown to the idea's owner. Wrapped keys are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListing {
    pub entry_id: AclEntryId,
    pub subject: UserId,
    /// `None` if the holder's account no longer exists.
    pub email: Option<String>,
    pub object_type: ObjectType,
    pub permission: Permission,
    pub has_key: bool,
}

impl AccessListing {
    fn new(entry: &AclEntry, email: Option<String>) -> Self {
        Self {
            entry_id: entry.id,
            subject: entry.subject,
            email,
            object_type: entry.object_type,
            permission: entry.permission,
            has_key: entry.wrapped_key.is_some(),
        }
    }
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Registering accounts
/// - Uploading and versioning ideas
/// - Viewing, downloading and verifying ideas
/// - Granting, revoking and listing access
pub struct Vault<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Opens users' private keys.
    custodian: KeyCustodian<S>,
    /// Configuration.
    config: VaultConfig,
}

impl<S: Store> Vault<S> {
    /// Create a new vault instance.
    pub fn new(store: S, config: VaultConfig) -> Self {
        let store = Arc::new(store);
        let custodian = KeyCustodian::new(
            store.clone(),
            config.master_key.clone(),
            config.password_policy.clone(),
        );
        Self {
            store,
            custodian,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn custodian(&self) -> &KeyCustodian<S> {
        &self.custodian
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an account. See [`KeyCustodian::register`].
    pub async fn register_user(&self, email: &str, password: &str, role: Role) -> Result<User> {
        self.custodian.register(email, password, role).await
    }

    /// Check a password. See [`KeyCustodian::check_password`].
    pub async fn check_password(&self, email: &str, password: &str) -> Result<User> {
        self.custodian.check_password(email, password).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt, sign and store a document, optionally as a new version.
    ///
    /// The content is hashed, encrypted under a fresh document key and
    /// signed with the uploader's key; the document key is then wrapped for
    /// the uploader and every keyed grant. The idea and its ACL are written
    /// in one batch.
    pub async fn upload_document(
        &self,
        subject: &Subject,
        content: &[u8],
        info: DocumentInfo,
        collaborators: &[CollaboratorRequest],
        versioning: VersionOptions,
    ) -> Result<UploadReceipt> {
        if !matches!(subject.role, Role::Owner | Role::Admin) {
            return Err(VaultError::Forbidden(format!(
                "role {} may not upload documents",
                subject.role
            )));
        }

        let title = info.title.trim();
        if title.is_empty() {
            return Err(VaultError::InvalidInput("title is required".into()));
        }

        let position = versioning::locate(&*self.store, subject, &versioning).await?;
        let (requests, mut recipients) =
            versioning::resolve_collaborators(&*self.store, collaborators).await?;

        let credential = self.custodian.resolve(subject.id).await?;
        let owner_exchange = credential.user.public_key.exchange;
        recipients.insert(subject.id, owner_exchange);

        let hash = content_hash(content);
        let (payload, key) = EncryptedPayloadBuilder::new(content).build()?;
        let signature = credential.secret().signing().sign_content(&hash);

        let metadata = FileMetadata {
            size: content.len() as u64,
            ..info.file
        };

        for attempt in 0..=self.config.version_retries {
            let id = IdeaId::new();
            let (root, version) = versioning::allocate(&*self.store, &position, id).await?;

            let owner_key = WrappedKey::wrap(&key, &owner_exchange, id.as_bytes())?;
            let entries = versioning::build_entries(
                &*self.store,
                &position,
                &requests,
                subject.id,
                id,
                &key,
                recipients.clone(),
            )
            .await?;

            let idea = Idea {
                id,
                owner: subject.id,
                title: title.to_string(),
                metadata: metadata.clone(),
                version,
                root,
                payload: payload.clone(),
                owner_key,
                content_hash: hash,
                signature,
                created_at: now_millis(),
            };

            match self.store.create_idea(&idea, &entries).await? {
                CreateResult::Created => {
                    info!(
                        idea = %id,
                        root = %root,
                        version,
                        grants = entries.len(),
                        "uploaded idea"
                    );
                    return Ok(UploadReceipt {
                        idea_id: id,
                        version,
                        root,
                        content_hash: hash,
                    });
                }
                CreateResult::VersionConflict => {
                    debug!(root = %root, version, attempt, "version taken, reallocating");
                }
            }
        }

        warn!(owner = %subject.id, retries = self.config.version_retries, "version allocation exhausted");
        Err(VaultError::Conflict(format!(
            "could not allocate a version after {} retries",
            self.config.version_retries
        )))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────

    /// View an idea.
    ///
    /// Holders of a document key get the plaintext. Verify-only holders get
    /// the integrity status with content withheld. A failed signature or
    /// hash check is reported as [`IntegrityStatus::Compromised`].
    pub async fn view_document(&self, subject: &Subject, idea_id: IdeaId) -> Result<ViewOutcome> {
        let idea = self.idea(idea_id).await?;
        let access = self.access(subject, &idea).await?;
        if access.is_denied() {
            return Err(denied(&idea));
        }
        let signature_valid = self.signature_valid(&idea).await?;

        let (content, message) = match (document_key(&access, &idea), &access) {
            (Some(wrapped), _) => (Some(self.open(subject.id, &idea, wrapped).await?), None),
            (None, Access::Administrator { .. }) => (None, Some(NO_ADMIN_KEY_MESSAGE.to_string())),
            (None, _) => (None, Some(VERIFY_ONLY_MESSAGE.to_string())),
        };

        let hash_matches = content
            .as_deref()
            .map_or(true, |plaintext| content_hash(plaintext) == idea.content_hash);

        let integrity = if signature_valid && hash_matches {
            IntegrityStatus::Verified
        } else {
            warn!(idea = %idea.id, signature_valid, hash_matches, "idea failed integrity check");
            IntegrityStatus::Compromised
        };

        Ok(ViewOutcome {
            idea_id: idea.id,
            title: idea.title,
            metadata: idea.metadata,
            version: idea.version,
            root: idea.root,
            owner: idea.owner,
            content_hash: idea.content_hash,
            can_view: content.is_some(),
            content,
            integrity,
            message,
        })
    }

    /// Decrypt an idea's content for download.
    ///
    /// Requires a document key. Content that does not hash to the recorded
    /// value, or whose signature does not verify, is refused.
    pub async fn download_document(&self, subject: &Subject, idea_id: IdeaId) -> Result<Vec<u8>> {
        let idea = self.idea(idea_id).await?;
        let access = self.access(subject, &idea).await?;

        let wrapped = match (document_key(&access, &idea), &access) {
            (Some(wrapped), _) => wrapped,
            (None, Access::VerifyOnly) => {
                return Err(VaultError::Forbidden(format!(
                    "verify-only access to {} cannot download content",
                    idea.id
                )))
            }
            (None, Access::Administrator { .. }) => {
                return Err(VaultError::Forbidden(NO_ADMIN_KEY_MESSAGE.to_string()))
            }
            (None, _) => return Err(denied(&idea)),
        };

        let plaintext = self.open(subject.id, &idea, wrapped).await?;

        if content_hash(&plaintext) != idea.content_hash {
            warn!(idea = %idea.id, "decrypted content does not match recorded hash");
            return Err(VaultError::IntegrityMismatch(format!(
                "content of {} does not match its recorded hash",
                idea.id
            )));
        }
        if !self.signature_valid(&idea).await? {
            warn!(idea = %idea.id, "signature does not verify against owner key");
            return Err(VaultError::IntegrityMismatch(format!(
                "signature of {} does not verify against its owner's key",
                idea.id
            )));
        }

        Ok(plaintext)
    }

    /// Compare `candidate` against a stored idea without disclosing content.
    ///
    /// `Match` requires both the recorded hash and the owner's signature.
    pub async fn verify_integrity(
        &self,
        subject: &Subject,
        idea_id: IdeaId,
        candidate: &[u8],
    ) -> Result<IntegrityVerdict> {
        let idea = self.idea(idea_id).await?;
        if self.access(subject, &idea).await?.is_denied() {
            return Err(denied(&idea));
        }

        let verdict = if content_hash(candidate) == idea.content_hash && self.signature_valid(&idea).await? {
            IntegrityVerdict::Match
        } else {
            IntegrityVerdict::Mismatch
        };

        debug!(idea = %idea.id, subject = %subject.id, ?verdict, "verified candidate");
        Ok(verdict)
    }

    /// Public authorship check. Needs no account.
    pub async fn public_verify(&self, idea_id: IdeaId) -> Result<PublicVerification> {
        let idea = self.idea(idea_id).await?;
        let owner = self.owner_of(&idea).await?;
        let signature_valid = owner
            .public_key
            .signing
            .verify_content(&idea.content_hash, &idea.signature);

        Ok(PublicVerification {
            idea_id: idea.id,
            title: idea.title,
            version: idea.version,
            owner_email: owner.email,
            content_hash: idea.content_hash,
            signature_valid,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access Management
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `permissions` on an idea to the user registered as `recipient_email`.
    ///
    /// Only the owner may grant, since keyed grants receive the idea's
    /// document key unwrapped with the owner's own private key and wrapped
    /// for the recipient. Re-granting an existing capability only backfills a
    /// missing key. Returns the number of entries inserted or backfilled.
    pub async fn grant_access(
        &self,
        owner: &Subject,
        idea_id: IdeaId,
        recipient_email: &str,
        permissions: &[Grant],
    ) -> Result<usize> {
        let grants: BTreeSet<Grant> = permissions.iter().copied().collect();
        if grants.is_empty() {
            return Err(VaultError::InvalidInput("at least one permission is required".into()));
        }

        let idea = self.idea(idea_id).await?;
        require_owner(owner, &idea, "grant access")?;
        let recipient = self.custodian.find_by_email(recipient_email).await?;

        let wrapped = if grants.iter().any(Grant::requires_key) {
            let credential = self.custodian.resolve(owner.id).await?;
            let key = idea
                .owner_key
                .unwrap(credential.secret().exchange(), idea.id.as_bytes())?;
            Some(WrappedKey::wrap(&key, &recipient.public_key.exchange, idea.id.as_bytes())?)
        } else {
            None
        };

        let mut changed = 0;
        for grant in grants {
            let key = if grant.requires_key() { wrapped.clone() } else { None };
            let entry = AclEntry::new(recipient.id, idea.id, grant, key);
            match self.store.upsert_acl_entry(&entry).await? {
                UpsertResult::Inserted | UpsertResult::KeyBackfilled => changed += 1,
                UpsertResult::Unchanged => {}
            }
        }

        info!(
            idea = %idea.id,
            recipient = %recipient.id,
            granted_by = %owner.id,
            changed,
            "granted access"
        );
        Ok(changed)
    }

    /// Delete one ACL entry. The owner's own entries cannot be revoked.
    pub async fn revoke_access(&self, owner: &Subject, entry_id: AclEntryId) -> Result<()> {
        let entry = self
            .store
            .get_acl_entry(&entry_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("ACL entry {}", entry_id)))?;
        let idea = self.idea(entry.object).await?;
        require_owner(owner, &idea, "revoke access")?;

        if entry.subject == idea.owner {
            return Err(VaultError::InvalidInput(format!(
                "cannot revoke the owner's own {}/{} entry",
                entry.object_type, entry.permission
            )));
        }

        if !self.store.delete_acl_entry(&entry_id).await? {
            return Err(VaultError::NotFound(format!("ACL entry {}", entry_id)));
        }

        info!(
            idea = %idea.id,
            subject = %entry.subject,
            object_type = entry.object_type.as_str(),
            permission = entry.permission.as_str(),
            revoked_by = %owner.id,
            "revoked access"
        );
        Ok(())
    }

    /// Every ACL entry on an idea, with holders' emails.
    pub async fn list_access(&self, owner: &Subject, idea_id: IdeaId) -> Result<Vec<AccessListing>> {
        let idea = self.idea(idea_id).await?;
        require_owner(owner, &idea, "list access")?;

        let entries = self.store.find_acl(&AclFilter::object(idea.id)).await?;
        let mut listings = Vec::with_capacity(entries.len());
        for entry in &entries {
            let email = self.store.get_user(&entry.subject).await?.map(|u| u.email);
            listings.push(AccessListing::new(entry, email));
        }
        Ok(listings)
    }

    /// Check a single capability, e.g. before serving an idea's comments.
    pub async fn authorize(
        &self,
        subject: &Subject,
        idea_id: IdeaId,
        object_type: ObjectType,
        permission: Permission,
    ) -> Result<()> {
        let idea = self.idea(idea_id).await?;
        let entries = self.store.find_acl(&AclFilter::object(idea.id)).await?;

        if has_capability(subject, idea.id, idea.owner, &entries, object_type, permission) {
            Ok(())
        } else {
            Err(VaultError::Forbidden(format!(
                "{}/{} on {} not granted",
                object_type, permission, idea.id
            )))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn idea(&self, id: IdeaId) -> Result<Idea> {
        self.store
            .get_idea(&id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("idea {}", id)))
    }

    async fn access(&self, subject: &Subject, idea: &Idea) -> Result<Access> {
        let entries = self.store.find_acl(&AclFilter::object(idea.id)).await?;
        Ok(evaluate(subject, idea.id, idea.owner, &entries))
    }

    async fn owner_of(&self, idea: &Idea) -> Result<User> {
        self.store
            .get_user(&idea.owner)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("owner of idea {}", idea.id)))
    }

    /// Verify the idea's signature against its owner's key.
    async fn signature_valid(&self, idea: &Idea) -> Result<bool> {
        let owner = self.owner_of(idea).await?;
        Ok(owner
            .public_key
            .signing
            .verify_content(&idea.content_hash, &idea.signature))
    }

    /// Unwrap the document key with `holder`'s private key and decrypt.
    async fn open(&self, holder: UserId, idea: &Idea, wrapped: &WrappedKey) -> Result<Vec<u8>> {
        let credential = self.custodian.resolve(holder).await?;
        let key = wrapped.unwrap(credential.secret().exchange(), idea.id.as_bytes())?;
        Ok(idea.payload.decrypt(&key)?)
    }
}

/// The wrapped key `access` decrypts with, if any.
fn document_key<'a>(access: &'a Access, idea: &'a Idea) -> Option<&'a WrappedKey> {
    match access {
        Access::Owner => Some(&idea.owner_key),
        Access::ViewGrant { wrapped_key } => Some(wrapped_key),
        Access::Administrator { wrapped_key } => wrapped_key.as_ref(),
        Access::VerifyOnly | Access::NoAccess => None,
    }
}

/// Owner authority check for grant, revoke and list. Admins are refused.
fn require_owner(subject: &Subject, idea: &Idea, action: &str) -> Result<()> {
    if is_owner(subject, idea.owner) {
        Ok(())
    } else {
        Err(VaultError::Forbidden(format!(
            "only the owner of {} may {}",
            idea.id, action
        )))
    }
}

fn denied(idea: &Idea) -> VaultError {
    VaultError::Forbidden(format!("no access to idea {}", idea.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use ideavault_store::MemoryStore;

    use crate::error::ErrorKind;
    use crate::testutil::{register, upload, vault};

    /// Delegates to a memory store but reports every version as taken.
    #[derive(Default)]
    struct ContendedStore {
        inner: MemoryStore,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Store for ContendedStore {
        async fn insert_user(&self, user: &User) -> ideavault_store::Result<()> {
            self.inner.insert_user(user).await
        }
        async fn get_user(&self, id: &UserId) -> ideavault_store::Result<Option<User>> {
            self.inner.get_user(id).await
        }
        async fn find_user_by_email(&self, email: &str) -> ideavault_store::Result<Option<User>> {
            self.inner.find_user_by_email(email).await
        }
        async fn create_idea(&self, _: &Idea, _: &[AclEntry]) -> ideavault_store::Result<CreateResult> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(CreateResult::VersionConflict)
        }
        async fn get_idea(&self, id: &IdeaId) -> ideavault_store::Result<Option<Idea>> {
            self.inner.get_idea(id).await
        }
        async fn max_version(&self, root: &IdeaId) -> ideavault_store::Result<Option<u32>> {
            self.inner.max_version(root).await
        }
        async fn find_acl(&self, filter: &AclFilter) -> ideavault_store::Result<Vec<AclEntry>> {
            self.inner.find_acl(filter).await
        }
        async fn get_acl_entry(&self, id: &AclEntryId) -> ideavault_store::Result<Option<AclEntry>> {
            self.inner.get_acl_entry(id).await
        }
        async fn upsert_acl_entry(&self, entry: &AclEntry) -> ideavault_store::Result<UpsertResult> {
            self.inner.upsert_acl_entry(entry).await
        }
        async fn delete_acl_entry(&self, id: &AclEntryId) -> ideavault_store::Result<bool> {
            self.inner.delete_acl_entry(id).await
        }
    }

    #[tokio::test]
    async fn test_upload_retries_then_conflicts() {
        let vault = Vault::new(
            ContendedStore::default(),
            VaultConfig::new("vault tests").with_version_retries(2),
        );
        let alice = register(&vault, "alice@example.com", Role::Owner).await;

        let err = upload(&vault, &alice, b"contended").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(vault.store().attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_viewer_role_cannot_upload() {
        let vault = vault();
        let viewer = register(&vault, "viewer@example.com", Role::Viewer).await;
        let verifier = register(&vault, "verifier@example.com", Role::Verifier).await;

        assert_eq!(upload(&vault, &viewer, b"x").await.unwrap_err().kind(), ErrorKind::Forbidden);
        assert_eq!(upload(&vault, &verifier, b"x").await.unwrap_err().kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_title_required() {
        let vault = vault();
        let alice = register(&vault, "alice@example.com", Role::Owner).await;

        let err = vault
            .upload_document(
                &alice,
                b"untitled",
                DocumentInfo::new("   ", "a.txt", "text/plain"),
                &[],
                VersionOptions::new_chain(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_upload_records_size_and_owner_grants() {
        let vault = vault();
        let alice = register(&vault, "alice@example.com", Role::Owner).await;

        let receipt = upload(&vault, &alice, b"twelve bytes").await.unwrap();
        let idea = vault.store().get_idea(&receipt.idea_id).await.unwrap().unwrap();

        assert_eq!(idea.metadata.size, 12);
        assert_eq!(receipt.content_hash, content_hash(b"twelve bytes"));
        assert!(idea.is_root());

        let entries = vault.store().find_acl(&AclFilter::object(idea.id)).await.unwrap();
        assert_eq!(entries.len(), ideavault_perms::OWNER_GRANTS.len());
        assert!(entries.iter().all(|e| e.subject == alice.id));
    }

    #[tokio::test]
    async fn test_admin_without_key_sees_metadata_only() {
        let vault = vault();
        let alice = register(&vault, "alice@example.com", Role::Owner).await;
        let admin = register(&vault, "admin@example.com", Role::Admin).await;
        let receipt = upload(&vault, &alice, b"secret plans").await.unwrap();

        let outcome = vault.view_document(&admin, receipt.idea_id).await.unwrap();
        assert!(!outcome.can_view);
        assert!(outcome.content.is_none());
        assert_eq!(outcome.message.as_deref(), Some(NO_ADMIN_KEY_MESSAGE));
        assert_eq!(outcome.integrity, IntegrityStatus::Verified);

        assert_eq!(
            vault.download_document(&admin, receipt.idea_id).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }

    #[tokio::test]
    async fn test_admin_cannot_grant_revoke_or_list() {
        let vault = vault();
        let alice = register(&vault, "alice@example.com", Role::Owner).await;
        let admin = register(&vault, "admin@example.com", Role::Admin).await;
        let dave = register(&vault, "dave@example.com", Role::Viewer).await;
        let receipt = upload(&vault, &alice, b"secret plans").await.unwrap();

        for recipient in ["dave@example.com", "admin@example.com"] {
            let err = vault
                .grant_access(&admin, receipt.idea_id, recipient, &[Grant::view()])
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }

        assert_eq!(
            vault.download_document(&dave, receipt.idea_id).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            vault.download_document(&admin, receipt.idea_id).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        let entries = vault.store().find_acl(&AclFilter::object(receipt.idea_id)).await.unwrap();
        assert!(entries.iter().all(|e| e.subject == alice.id));

        assert_eq!(
            vault.list_access(&admin, receipt.idea_id).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        let own_entry = entries[0].id;
        assert_eq!(
            vault.revoke_access(&admin, own_entry).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }

    #[tokio::test]
    async fn test_denied_view_skips_owner_lookup() {
        let vault = vault();
        let alice = register(&vault, "alice@example.com", Role::Owner).await;
        let bob = register(&vault, "bob@example.com", Role::Viewer).await;
        let receipt = upload(&vault, &alice, b"private").await.unwrap();

        // Point the idea at an owner that no longer resolves
        let mut idea = vault.store().get_idea(&receipt.idea_id).await.unwrap().unwrap();
        idea.id = IdeaId::new();
        idea.root = idea.id;
        idea.owner = UserId::new();
        vault.store().create_idea(&idea, &[]).await.unwrap();

        let err = vault.view_document(&bob, idea.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_authorize_sub_resources() {
        let vault = vault();
        let alice = register(&vault, "alice@example.com", Role::Owner).await;
        let bob = register(&vault, "bob@example.com", Role::Viewer).await;
        let receipt = upload(&vault, &alice, b"discussable").await.unwrap();

        let post = Grant::new(ObjectType::Comment, Permission::Post);
        assert!(vault
            .authorize(&bob, receipt.idea_id, ObjectType::Comment, Permission::Post)
            .await
            .is_err());

        assert_eq!(
            vault.grant_access(&alice, receipt.idea_id, "bob@example.com", &[post]).await.unwrap(),
            1
        );
        vault
            .authorize(&bob, receipt.idea_id, ObjectType::Comment, Permission::Post)
            .await
            .unwrap();
        vault
            .authorize(&alice, receipt.idea_id, ObjectType::AuditLog, Permission::View)
            .await
            .unwrap();

        // A comment grant discloses nothing about the document itself
        assert_eq!(
            vault.view_document(&bob, receipt.idea_id).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }
}
