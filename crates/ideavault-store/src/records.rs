//! Persisted record types.
//!
//! Records are immutable snapshots; the store never mutates an idea after
//! creation, and user key material is only ever held in protected form.

use serde::{Deserialize, Serialize};

use ideavault_core::{Blake3Hash, Ed25519Signature, IdeaId, Role, UserId};
use ideavault_perms::{EncryptedPayload, ProtectedKey, UserPublicKey, WrappedKey};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Unique, stored lowercase.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Hex of the salt embedded in `password_hash`.
    pub password_salt: String,
    pub role: Role,
    pub public_key: UserPublicKey,
    pub protected_key: ProtectedKey,
    pub created_at: i64,
}

/// Client-supplied description of an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_type: String,
    pub size: u64,
}

/// One version of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Idea {
    pub id: IdeaId,
    pub owner: UserId,
    pub title: String,
    pub metadata: FileMetadata,
    /// Starts at 1; unique per root.
    pub version: u32,
    /// First version of the chain. Equal to `id` for version 1.
    pub root: IdeaId,
    pub payload: EncryptedPayload,
    /// Document key wrapped for the owner.
    pub owner_key: WrappedKey,
    /// Blake3 of the plaintext.
    pub content_hash: Blake3Hash,
    /// Owner's signature over `content_hash`.
    pub signature: Ed25519Signature,
    pub created_at: i64,
}

impl Idea {
    pub fn is_root(&self) -> bool {
        self.root == self.id
    }
}
