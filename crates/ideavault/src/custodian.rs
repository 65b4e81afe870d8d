//! Key custodian: account registration and private key recovery.
//!
//! Every user's key pair is generated here at registration. The secret half
//! is sealed under the master key before it reaches the store, and is only
//! reopened for the duration of one operation as a [`Credential`].

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::{info, warn};
use zeroize::Zeroizing;

use ideavault_core::{Role, UserId};
use ideavault_perms::{protect, unprotect, MasterKey, UserSecretKey};
use ideavault_store::{now_millis, Store, StoreError, User};

use crate::config::PasswordPolicy;
use crate::error::{Result, VaultError};

/// A user record together with its opened secret key.
///
/// Request-scoped. The secret key zeroizes when the credential is dropped.
pub struct Credential {
    pub user: User,
    secret: UserSecretKey,
}

impl Credential {
    pub fn secret(&self) -> &UserSecretKey {
        &self.secret
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user.id)
            .field("secret", &"..")
            .finish()
    }
}

/// Trim and lowercase an email address, rejecting obviously malformed ones.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(VaultError::InvalidInput(format!("invalid email address {:?}", email))),
    }
}

/// Holds the master key and opens users' private keys on demand.
pub struct KeyCustodian<S: Store> {
    store: Arc<S>,
    master_key: MasterKey,
    policy: PasswordPolicy,
}

impl<S: Store> KeyCustodian<S> {
    pub fn new(store: Arc<S>, master_key: MasterKey, policy: PasswordPolicy) -> Self {
        Self {
            store,
            master_key,
            policy,
        }
    }

    /// Create an account with a fresh key pair.
    ///
    /// Fails with `InvalidInput` on a malformed email, a password that does
    /// not meet the policy, or an email that is already registered.
    pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<User> {
        let email = normalize_email(email)?;
        self.policy.check(password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(VaultError::InvalidInput(format!("{} is already registered", email)));
        }

        let (password_hash, password_salt) = hash_password(Zeroizing::new(password.to_owned())).await?;

        let secret = UserSecretKey::generate();
        let user = User {
            id: UserId::new(),
            email,
            password_hash,
            password_salt,
            role,
            public_key: secret.public_key(),
            protected_key: protect(&secret, &self.master_key)?,
            created_at: now_millis(),
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration
            Err(StoreError::Conflict(msg)) => return Err(VaultError::InvalidInput(msg)),
            Err(e) => return Err(e.into()),
        }

        info!(user = %user.id, role = user.role.as_str(), "registered user");
        Ok(user)
    }

    /// Check a password and return the account.
    ///
    /// Unknown emails and wrong passwords fail identically.
    pub async fn check_password(&self, email: &str, password: &str) -> Result<User> {
        let rejected = || VaultError::Forbidden("invalid email or password".into());

        let email = normalize_email(email).map_err(|_| rejected())?;
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            return Err(rejected());
        };

        if verify_password(Zeroizing::new(password.to_owned()), user.password_hash.clone()).await? {
            Ok(user)
        } else {
            warn!(user = %user.id, "password check failed");
            Err(rejected())
        }
    }

    /// Look up a user by email.
    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        let email = normalize_email(email)?;
        self.store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("user {}", email)))
    }

    /// Open the private key of `user_id`.
    ///
    /// A key stored in a retired format, or one that does not open under the
    /// current master key, fails with `KeyFormat`: the account has to be
    /// registered again.
    pub async fn resolve(&self, user_id: UserId) -> Result<Credential> {
        let user = self
            .store
            .get_user(&user_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("user {}", user_id)))?;

        let secret = unprotect(&user.protected_key, &self.master_key).map_err(|e| {
            warn!(user = %user_id, error = %e, "stored private key cannot be opened");
            VaultError::from(e)
        })?;

        Ok(Credential { user, secret })
    }
}

async fn hash_password(password: Zeroizing<String>) -> Result<(String, String)> {
    let salt_bytes: [u8; 16] = rand::random();

    let hashed = tokio::task::spawn_blocking(move || {
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok::<_, argon2::password_hash::Error>(hash.to_string())
    })
    .await
    .map_err(|e| StoreError::InvalidData(format!("password task failed: {}", e)))?
    .map_err(|e| VaultError::InvalidInput(format!("password hashing failed: {}", e)))?;

    Ok((hashed, hex::encode(salt_bytes)))
}

async fn verify_password(password: Zeroizing<String>, stored: String) -> Result<bool> {
    let verified = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored)?;
        let verified = Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok();
        Ok::<_, argon2::password_hash::Error>(verified)
    })
    .await
    .map_err(|e| StoreError::InvalidData(format!("password task failed: {}", e)))?
    .map_err(|e| StoreError::InvalidData(format!("stored password hash is malformed: {}", e)))?;

    Ok(verified)
}
