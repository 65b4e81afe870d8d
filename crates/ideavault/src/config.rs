//! Vault configuration.
//!
//! The master key is derived once, when the config is built, and handed to
//! the custodian. Nothing here reads ambient state after construction.

use std::fmt;

use ideavault_perms::MasterKey;

use crate::error::{Result, VaultError};

/// Environment variable holding the master secret.
pub const MASTER_SECRET_VAR: &str = "IDEAVAULT_MASTER_SECRET";

/// Environment variable overriding [`VaultConfig::version_retries`].
pub const VERSION_RETRIES_VAR: &str = "IDEAVAULT_VERSION_RETRIES";

/// How many times an upload re-allocates its version number after losing a race.
pub const DEFAULT_VERSION_RETRIES: u32 = 3;

/// Password requirements enforced at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_upper: true,
            require_lower: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

impl PasswordPolicy {
    /// Check `password`, naming the first unmet requirement.
    pub fn check(&self, password: &str) -> Result<()> {
        let unmet = if password.chars().count() < self.min_length {
            Some(format!("at least {} characters", self.min_length))
        } else if self.require_upper && !password.chars().any(char::is_uppercase) {
            Some("an uppercase letter".to_string())
        } else if self.require_lower && !password.chars().any(char::is_lowercase) {
            Some("a lowercase letter".to_string())
        } else if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            Some("a digit".to_string())
        } else if self.require_symbol && password.chars().all(char::is_alphanumeric) {
            Some("a symbol".to_string())
        } else {
            None
        };

        match unmet {
            Some(requirement) => Err(VaultError::InvalidInput(format!(
                "password must contain {}",
                requirement
            ))),
            None => Ok(()),
        }
    }
}

/// Configuration for the Vault.
#[derive(Clone)]
pub struct VaultConfig {
    /// Key protecting every stored private key.
    pub master_key: MasterKey,
    /// Version allocation retries on a concurrent upload.
    pub version_retries: u32,
    /// Registration password rules.
    pub password_policy: PasswordPolicy,
}

impl VaultConfig {
    /// Config with defaults and a master key derived from `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            master_key: MasterKey::derive(secret.as_ref()),
            version_retries: DEFAULT_VERSION_RETRIES,
            password_policy: PasswordPolicy::default(),
        }
    }

    /// Read [`MASTER_SECRET_VAR`] (required) and [`VERSION_RETRIES_VAR`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), with variables supplied by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(MASTER_SECRET_VAR)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VaultError::InvalidInput(format!("{} is not set", MASTER_SECRET_VAR)))?;

        let mut config = Self::new(secret.as_bytes());

        if let Some(raw) = lookup(VERSION_RETRIES_VAR) {
            config.version_retries = raw.trim().parse().map_err(|_| {
                VaultError::InvalidInput(format!("{} must be a number, got {:?}", VERSION_RETRIES_VAR, raw))
            })?;
        }

        Ok(config)
    }

    pub fn with_version_retries(mut self, retries: u32) -> Self {
        self.version_retries = retries;
        self
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("master_key", &"..")
            .field("version_retries", &self.version_retries)
            .field("password_policy", &self.password_policy)
            .finish()
    }
}
