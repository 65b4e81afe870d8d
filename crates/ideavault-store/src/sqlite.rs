//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for IdeaVault. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use ideavault_core::{
    AclEntryId, Blake3Hash, Ed25519PublicKey, Ed25519Signature, IdeaId, Role, UserId,
};
use ideavault_perms::{
    AclEntry, EncryptedPayload, EncryptionFormat, EncryptionNonce, KeyFormat, ProtectedKey,
    UserPublicKey, WrappedKey, X25519PublicKey,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::records::{FileMetadata, Idea, User};
use crate::traits::{check_entry, AclFilter, CreateResult, Store, UpsertResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row Conversion
// ─────────────────────────────────────────────────────────────────────────────

fn conversion<E>(ty: Type) -> impl FnOnce(E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| rusqlite::Error::FromSqlConversionFailure(0, ty, Box::new(e))
}

/// Read a fixed-size blob column.
fn blob<const N: usize>(row: &Row<'_>, col: &str) -> rusqlite::Result<[u8; N]> {
    let bytes: Vec<u8> = row.get(col)?;
    bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(0, col.into(), Type::Blob))
}

/// Read a text column through `FromStr`.
fn parsed<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(col)?;
    s.parse().map_err(conversion(Type::Text))
}

fn wrapped_key(bytes: &[u8]) -> rusqlite::Result<WrappedKey> {
    WrappedKey::from_bytes(bytes).map_err(conversion(Type::Blob))
}

fn encode_key(key: &WrappedKey) -> Result<Vec<u8>> {
    key.to_bytes()
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId::from_bytes(blob(row, "id")?),
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        password_salt: row.get("password_salt")?,
        role: parsed::<Role>(row, "role")?,
        public_key: UserPublicKey {
            signing: Ed25519PublicKey::from_bytes(blob(row, "signing_key")?),
            exchange: X25519PublicKey::from_bytes(blob(row, "exchange_key")?),
        },
        protected_key: ProtectedKey {
            format: KeyFormat::from_u8(row.get("key_format")?).map_err(conversion(Type::Integer))?,
            nonce: EncryptionNonce::from_bytes(blob(row, "key_nonce")?),
            ciphertext: row.get("key_ciphertext")?,
        },
        created_at: row.get("created_at")?,
    })
}

fn row_to_idea(row: &Row<'_>) -> rusqlite::Result<Idea> {
    let owner_key: Vec<u8> = row.get("owner_key")?;
    let content_hash: String = row.get("content_hash")?;

    Ok(Idea {
        id: IdeaId::from_bytes(blob(row, "id")?),
        owner: UserId::from_bytes(blob(row, "owner_id")?),
        title: row.get("title")?,
        metadata: FileMetadata {
            file_name: row.get("file_name")?,
            file_type: row.get("file_type")?,
            size: row.get::<_, i64>("file_size")? as u64,
        },
        version: row.get("version")?,
        root: IdeaId::from_bytes(blob(row, "root_id")?),
        payload: EncryptedPayload {
            format: EncryptionFormat::from_u8(row.get("payload_format")?)
                .map_err(conversion(Type::Integer))?,
            nonce: EncryptionNonce::from_bytes(blob(row, "payload_nonce")?),
            ciphertext: row.get("ciphertext")?,
        },
        owner_key: wrapped_key(&owner_key)?,
        content_hash: Blake3Hash::from_hex(&content_hash).map_err(conversion(Type::Text))?,
        signature: Ed25519Signature::from_bytes(blob(row, "signature")?),
        created_at: row.get("created_at")?,
    })
}

fn row_to_acl(row: &Row<'_>) -> rusqlite::Result<AclEntry> {
    let key: Option<Vec<u8>> = row.get("wrapped_key")?;

    Ok(AclEntry {
        id: AclEntryId::from_bytes(blob(row, "id")?),
        subject: UserId::from_bytes(blob(row, "subject_id")?),
        object: IdeaId::from_bytes(blob(row, "object_id")?),
        object_type: parsed(row, "object_type")?,
        permission: parsed(row, "permission")?,
        wrapped_key: key.as_deref().map(wrapped_key).transpose()?,
    })
}

/// An ACL entry with its wrapped key pre-encoded for binding.
struct EncodedEntry {
    entry: AclEntry,
    wrapped_key: Option<Vec<u8>>,
}

impl EncodedEntry {
    fn new(entry: &AclEntry) -> Result<Self> {
        Ok(Self {
            entry: entry.clone(),
            wrapped_key: entry.wrapped_key.as_ref().map(encode_key).transpose()?,
        })
    }
}

const INSERT_ACL: &str = "INSERT INTO acl_entries (
        id, subject_id, object_id, object_type, permission, wrapped_key
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

fn insert_acl(conn: &Connection, encoded: &EncodedEntry) -> Result<()> {
    let e = &encoded.entry;
    conn.execute(
        INSERT_ACL,
        params![
            e.id.as_bytes().as_slice(),
            e.subject.as_bytes().as_slice(),
            e.object.as_bytes().as_slice(),
            e.object_type.as_str(),
            e.permission.as_str(),
            encoded.wrapped_key,
        ],
    )?;
    Ok(())
}

const USER_COLUMNS: &str = "id, email, password_hash, password_salt, role, signing_key,
    exchange_key, key_format, key_nonce, key_ciphertext, created_at";

const IDEA_COLUMNS: &str = "id, owner_id, title, file_name, file_type, file_size, version,
    root_id, payload_format, payload_nonce, ciphertext, owner_key, content_hash, signature,
    created_at";

const ACL_COLUMNS: &str = "id, subject_id, object_id, object_type, permission, wrapped_key";

#[async_trait]
impl Store for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // User Directory
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<()> {
        let user = user.clone();

        self.run(move |conn| {
            let taken: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM users WHERE email = ?1 OR id = ?2",
                    params![user.email, user.id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if taken.is_some() {
                return Err(StoreError::Conflict(format!(
                    "user {} <{}> already registered",
                    user.id, user.email
                )));
            }

            conn.execute(
                &format!(
                    "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    USER_COLUMNS
                ),
                params![
                    user.id.as_bytes().as_slice(),
                    user.email,
                    user.password_hash,
                    user.password_salt,
                    user.role.as_str(),
                    user.public_key.signing.as_bytes().as_slice(),
                    user.public_key.exchange.as_bytes().as_slice(),
                    user.protected_key.format.to_u8(),
                    user.protected_key.nonce.as_bytes().as_slice(),
                    user.protected_key.ciphertext,
                    user.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.as_bytes().as_slice()],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Idea Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_idea(&self, idea: &Idea, entries: &[AclEntry]) -> Result<CreateResult> {
        entries.iter().try_for_each(check_entry)?;
        let idea = idea.clone();
        let owner_key = encode_key(&idea.owner_key)?;
        let entries = entries
            .iter()
            .map(EncodedEntry::new)
            .collect::<Result<Vec<_>>>()?;

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let taken: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM ideas WHERE root_id = ?1 AND version = ?2",
                    params![idea.root.as_bytes().as_slice(), idea.version],
                    |row| row.get(0),
                )
                .optional()?;

            if taken.is_some() {
                return Ok(CreateResult::VersionConflict);
            }

            tx.execute(
                &format!(
                    "INSERT INTO ideas ({}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    IDEA_COLUMNS
                ),
                params![
                    idea.id.as_bytes().as_slice(),
                    idea.owner.as_bytes().as_slice(),
                    idea.title,
                    idea.metadata.file_name,
                    idea.metadata.file_type,
                    idea.metadata.size as i64,
                    idea.version,
                    idea.root.as_bytes().as_slice(),
                    idea.payload.format.to_u8(),
                    idea.payload.nonce.as_bytes().as_slice(),
                    idea.payload.ciphertext,
                    owner_key,
                    idea.content_hash.to_hex(),
                    idea.signature.as_bytes().as_slice(),
                    idea.created_at,
                ],
            )?;

            for encoded in &entries {
                insert_acl(&tx, encoded)?;
            }

            // Dropping the transaction on any error above rolls everything back
            tx.commit()?;
            Ok(CreateResult::Created)
        })
        .await
    }

    async fn get_idea(&self, id: &IdeaId) -> Result<Option<Idea>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM ideas WHERE id = ?1", IDEA_COLUMNS),
                params![id.as_bytes().as_slice()],
                row_to_idea,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn max_version(&self, root: &IdeaId) -> Result<Option<u32>> {
        let root = *root;

        self.run(move |conn| {
            conn.query_row(
                "SELECT MAX(version) FROM ideas WHERE root_id = ?1",
                params![root.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .map_err(StoreError::from)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ACL Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn find_acl(&self, filter: &AclFilter) -> Result<Vec<AclEntry>> {
        let filter = *filter;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM acl_entries
                 WHERE (?1 IS NULL OR subject_id = ?1)
                   AND (?2 IS NULL OR object_id = ?2)
                 ORDER BY id",
                ACL_COLUMNS
            ))?;

            let entries = stmt
                .query_map(
                    params![
                        filter.subject.map(|s| s.as_bytes().to_vec()),
                        filter.object.map(|o| o.as_bytes().to_vec()),
                    ],
                    row_to_acl,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(entries)
        })
        .await
    }

    async fn get_acl_entry(&self, id: &AclEntryId) -> Result<Option<AclEntry>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM acl_entries WHERE id = ?1", ACL_COLUMNS),
                params![id.as_bytes().as_slice()],
                row_to_acl,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn upsert_acl_entry(&self, entry: &AclEntry) -> Result<UpsertResult> {
        check_entry(entry)?;
        let encoded = EncodedEntry::new(entry)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let e = &encoded.entry;

            let existing: Option<(Vec<u8>, Option<Vec<u8>>)> = tx
                .query_row(
                    "SELECT id, wrapped_key FROM acl_entries
                     WHERE subject_id = ?1 AND object_id = ?2
                       AND object_type = ?3 AND permission = ?4",
                    params![
                        e.subject.as_bytes().as_slice(),
                        e.object.as_bytes().as_slice(),
                        e.object_type.as_str(),
                        e.permission.as_str(),
                    ],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let result = match (existing, &encoded.wrapped_key) {
                (None, _) => {
                    insert_acl(&tx, &encoded)?;
                    UpsertResult::Inserted
                }
                (Some((id, None)), Some(key)) => {
                    tx.execute(
                        "UPDATE acl_entries SET wrapped_key = ?1 WHERE id = ?2",
                        params![key, id],
                    )?;
                    UpsertResult::KeyBackfilled
                }
                (Some(_), _) => UpsertResult::Unchanged,
            };

            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn delete_acl_entry(&self, id: &AclEntryId) -> Result<bool> {
        let id = *id;

        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM acl_entries WHERE id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{owner_entries, sample_idea, sample_user};
    use ideavault_core::{ObjectType, Permission};
    use ideavault_perms::Grant;

    #[tokio::test]
    async fn test_user_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let alice = sample_user("alice@example.com");

        store.insert_user(&alice).await.unwrap();

        assert_eq!(store.get_user(&alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(
            store.find_user_by_email("alice@example.com").await.unwrap(),
            Some(alice)
        );
        assert!(store.find_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_user(&sample_user("bob@example.com")).await.unwrap();

        let result = store.insert_user(&sample_user("bob@example.com")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_idea_roundtrip_with_entries() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::new();
        let idea = sample_idea(owner, None, 1);
        let mut entries = owner_entries(owner, idea.id);

        let result = store.create_idea(&idea, &entries).await.unwrap();
        assert_eq!(result, CreateResult::Created);

        assert_eq!(store.get_idea(&idea.id).await.unwrap(), Some(idea.clone()));
        entries.sort_by_key(|e| e.id);
        assert_eq!(store.find_acl(&AclFilter::object(idea.id)).await.unwrap(), entries);
    }

    #[tokio::test]
    async fn test_version_conflict_rolls_back() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::new();
        let v1 = sample_idea(owner, None, 1);
        let v2 = sample_idea(owner, Some(v1.id), 2);
        store.create_idea(&v1, &[]).await.unwrap();
        store.create_idea(&v2, &[]).await.unwrap();

        let clash = sample_idea(owner, Some(v1.id), 2);
        let result = store
            .create_idea(&clash, &owner_entries(owner, clash.id))
            .await
            .unwrap();

        assert_eq!(result, CreateResult::VersionConflict);
        assert!(store.get_idea(&clash.id).await.unwrap().is_none());
        assert!(store.find_acl(&AclFilter::object(clash.id)).await.unwrap().is_empty());
        assert_eq!(store.max_version(&v1.id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_failed_entry_insert_rolls_back_idea() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::new();
        let idea = sample_idea(owner, None, 1);
        let mut entries = owner_entries(owner, idea.id);
        // Same capability twice violates the entry uniqueness constraint
        entries.push(AclEntry::new(owner, idea.id, Grant::verify(), None));

        assert!(store.create_idea(&idea, &entries).await.is_err());
        assert!(store.get_idea(&idea.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_max_version_of_unknown_root() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.max_version(&IdeaId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_acl_filters() {
        let store = SqliteStore::open_memory().unwrap();
        let bob = UserId::new();
        let carol = UserId::new();
        let idea = IdeaId::new();

        for entry in [
            AclEntry::new(bob, idea, Grant::verify(), None),
            AclEntry::new(bob, idea, Grant::new(ObjectType::Comment, Permission::Post), None),
            AclEntry::new(carol, idea, Grant::verify(), None),
            AclEntry::new(carol, IdeaId::new(), Grant::verify(), None),
        ] {
            store.upsert_acl_entry(&entry).await.unwrap();
        }

        let all = store.find_acl(&AclFilter::object(idea)).await.unwrap();
        assert_eq!(all.len(), 3);

        let bobs = store.find_acl(&AclFilter::object(idea).subject(bob)).await.unwrap();
        assert_eq!(bobs.len(), 2);

        let carols = store.find_acl(&AclFilter::object(idea).subject(carol)).await.unwrap();
        assert_eq!(carols.len(), 1);
        assert_eq!(carols[0].grant(), Grant::verify());

        let everywhere = store.find_acl(&AclFilter::default().subject(carol)).await.unwrap();
        assert_eq!(everywhere.len(), 2);
    }

    #[tokio::test]
    async fn test_keyed_verify_entry_is_rejected() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::new();
        let idea = sample_idea(owner, None, 1);
        let mut entries = owner_entries(owner, idea.id);
        let keyed_verify =
            AclEntry::new(owner, idea.id, Grant::verify(), entries[0].wrapped_key.clone());

        let err = store.upsert_acl_entry(&keyed_verify).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));

        entries[1] = keyed_verify;
        let err = store.create_idea(&idea, &entries).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
        assert!(store.get_idea(&idea.id).await.unwrap().is_none());
        assert_eq!(store.max_version(&idea.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_backfill_and_delete() {
        let store = SqliteStore::open_memory().unwrap();
        let bob = UserId::new();
        let idea = IdeaId::new();

        let keyless = AclEntry::new(bob, idea, Grant::view(), None);
        assert_eq!(store.upsert_acl_entry(&keyless).await.unwrap(), UpsertResult::Inserted);

        let keyed = owner_entries(bob, idea).remove(0);
        assert_eq!(store.upsert_acl_entry(&keyed).await.unwrap(), UpsertResult::KeyBackfilled);
        assert_eq!(store.upsert_acl_entry(&keyed).await.unwrap(), UpsertResult::Unchanged);

        let stored = store.get_acl_entry(&keyless.id).await.unwrap().unwrap();
        assert_eq!(stored.wrapped_key, keyed.wrapped_key);

        assert!(store.delete_acl_entry(&keyless.id).await.unwrap());
        assert!(store.get_acl_entry(&keyless.id).await.unwrap().is_none());
        assert!(!store.delete_acl_entry(&keyless.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");
        let owner = UserId::new();
        let idea = sample_idea(owner, None, 1);

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .create_idea(&idea, &owner_entries(owner, idea.id))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_idea(&idea.id).await.unwrap(), Some(idea));
    }
}
