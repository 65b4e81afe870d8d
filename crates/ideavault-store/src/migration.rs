//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            debug!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, crate::now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Registered accounts
        CREATE TABLE users (
            id BLOB PRIMARY KEY,              -- 16 bytes, UUIDv7
            email TEXT NOT NULL UNIQUE,       -- lowercase
            password_hash TEXT NOT NULL,      -- Argon2id PHC string
            password_salt TEXT NOT NULL,      -- hex
            role TEXT NOT NULL,
            signing_key BLOB NOT NULL,        -- 32 bytes, Ed25519 public key
            exchange_key BLOB NOT NULL,       -- 32 bytes, X25519 public key
            key_format INTEGER NOT NULL,      -- KeyFormat tag of the protected key
            key_nonce BLOB NOT NULL,          -- 12 bytes
            key_ciphertext BLOB NOT NULL,     -- private key sealed under the master key
            created_at INTEGER NOT NULL
        );

        -- Idea versions (immutable once written)
        CREATE TABLE ideas (
            id BLOB PRIMARY KEY,
            owner_id BLOB NOT NULL,
            title TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_type TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            version INTEGER NOT NULL,
            root_id BLOB NOT NULL,            -- equal to id for version 1
            payload_format INTEGER NOT NULL,
            payload_nonce BLOB NOT NULL,      -- 12 bytes
            ciphertext BLOB NOT NULL,
            owner_key BLOB NOT NULL,          -- CBOR WrappedKey
            content_hash TEXT NOT NULL,       -- hex Blake3 of the plaintext
            signature BLOB NOT NULL,          -- 64 bytes, Ed25519
            created_at INTEGER NOT NULL,

            UNIQUE(root_id, version)
        );

        -- Capability grants
        CREATE TABLE acl_entries (
            id BLOB PRIMARY KEY,
            subject_id BLOB NOT NULL,
            object_id BLOB NOT NULL,
            object_type TEXT NOT NULL,
            permission TEXT NOT NULL,
            wrapped_key BLOB,                 -- CBOR WrappedKey, Idea/VIEW only

            UNIQUE(subject_id, object_id, object_type, permission)
        );

        CREATE INDEX idx_ideas_owner ON ideas(owner_id);
        CREATE INDEX idx_acl_object ON acl_entries(object_id);
        CREATE INDEX idx_acl_subject ON acl_entries(subject_id);
        "#,
    )?;

    Ok(())
}
