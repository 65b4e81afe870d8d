//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::PathBuf;

use ideavault::{DocumentInfo, UploadReceipt, Vault, VaultConfig, VersionOptions};
use ideavault_core::{IdeaId, Role, Subject};
use ideavault_perms::{AclMode, CollaboratorRequest};
use ideavault_store::{MemoryStore, SqliteStore, Store, User};
use tempfile::TempDir;

/// Password every fixture user registers with.
pub const PASSWORD: &str = "Correct-Horse-9";

/// Master secret of fixture vaults.
pub const MASTER_SECRET: &str = "ideavault testkit master secret";

const DATABASE_FILE: &str = "vault.db";

/// A registered user and the subject they act as.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user: User,
    pub subject: Subject,
    pub email: String,
}

impl From<User> for TestUser {
    fn from(user: User) -> Self {
        Self {
            subject: Subject::new(user.id, user.role),
            email: user.email.clone(),
            user,
        }
    }
}

/// A vault with four registered users:
///
/// - `alice`: uploads and owns documents (`OWNER` role)
/// - `bob`: typical collaborator (`VIEWER` role)
/// - `carol`: auditor (`VERIFIER` role)
/// - `dave`: never granted anything (`VIEWER` role)
pub struct VaultFixture<S: Store = MemoryStore> {
    pub vault: Vault<S>,
    pub alice: TestUser,
    pub bob: TestUser,
    pub carol: TestUser,
    pub dave: TestUser,
    /// Keeps an on-disk database alive for the fixture's lifetime.
    dir: Option<TempDir>,
}

impl VaultFixture<MemoryStore> {
    /// Fixture over an in-memory store.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_store(MemoryStore::new(), None).await
    }
}

impl VaultFixture<SqliteStore> {
    /// Fixture over a SQLite database in a temporary directory.
    pub async fn sqlite() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let store = SqliteStore::open(dir.path().join(DATABASE_FILE))?;
        Self::with_store(store, Some(dir)).await
    }
}

impl<S: Store> VaultFixture<S> {
    async fn with_store(store: S, dir: Option<TempDir>) -> anyhow::Result<Self> {
        let vault = Vault::new(store, VaultConfig::new(MASTER_SECRET));
        let alice = register(&vault, "alice@example.com", Role::Owner).await?;
        let bob = register(&vault, "bob@example.com", Role::Viewer).await?;
        let carol = register(&vault, "carol@example.com", Role::Verifier).await?;
        let dave = register(&vault, "dave@example.com", Role::Viewer).await?;

        Ok(Self {
            vault,
            alice,
            bob,
            carol,
            dave,
            dir,
        })
    }

    /// Path of the on-disk database, for tests that tamper with stored rows.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.path().join(DATABASE_FILE))
    }

    /// Register one more user.
    pub async fn register(&self, email: &str, role: Role) -> anyhow::Result<TestUser> {
        register(&self.vault, email, role).await
    }

    /// Upload `content` as the first version of a new chain.
    pub async fn upload(
        &self,
        owner: &TestUser,
        content: &[u8],
        collaborators: &[CollaboratorRequest],
    ) -> anyhow::Result<UploadReceipt> {
        let receipt = self
            .vault
            .upload_document(
                &owner.subject,
                content,
                document_info(content),
                collaborators,
                VersionOptions::new_chain(),
            )
            .await?;
        Ok(receipt)
    }

    /// Upload `content` as a new version of `parent`.
    pub async fn upload_version(
        &self,
        owner: &TestUser,
        parent: IdeaId,
        mode: AclMode,
        content: &[u8],
        collaborators: &[CollaboratorRequest],
    ) -> anyhow::Result<UploadReceipt> {
        let receipt = self
            .vault
            .upload_document(
                &owner.subject,
                content,
                document_info(content),
                collaborators,
                VersionOptions::next_of(parent, mode),
            )
            .await?;
        Ok(receipt)
    }
}

async fn register<S: Store>(vault: &Vault<S>, email: &str, role: Role) -> anyhow::Result<TestUser> {
    Ok(vault.register_user(email, PASSWORD, role).await?.into())
}

fn document_info(content: &[u8]) -> DocumentInfo {
    DocumentInfo::new(
        format!("idea of {} bytes", content.len()),
        "idea.txt",
        "text/plain",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_users() {
        let fx = VaultFixture::new().await.unwrap();

        assert_eq!(fx.alice.subject.role, Role::Owner);
        assert_eq!(fx.carol.subject.role, Role::Verifier);
        assert_eq!(fx.bob.email, "bob@example.com");

        let ids = [fx.alice.user.id, fx.bob.user.id, fx.carol.user.id, fx.dave.user.id];
        for (i, a) in ids.iter().enumerate() {
            assert!(ids[i + 1..].iter().all(|b| a != b));
        }
    }

    #[tokio::test]
    async fn test_sqlite_fixture_upload() {
        let fx = VaultFixture::sqlite().await.unwrap();
        let receipt = fx.upload(&fx.alice, b"on disk", &[]).await.unwrap();

        assert_eq!(receipt.version, 1);
        assert_eq!(receipt.root, receipt.idea_id);
    }
}
