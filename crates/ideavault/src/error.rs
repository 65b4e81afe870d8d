//! Error types for the Vault.

use ideavault_core::CoreError;
use ideavault_perms::PermsError;
use ideavault_store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`VaultError`], for mapping to transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidInput,
    KeyFormat,
    Decryption,
    KeyUnwrap,
    IntegrityMismatch,
    Conflict,
    Storage,
}

/// Errors that can occur during Vault operations.
///
/// Cryptographic failures keep their own variants; they are never reported
/// as `Forbidden`, since the remedy (re-register, re-upload) differs from
/// requesting access.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Idea, user or ACL entry absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// No access, or an owner-only operation attempted by someone else.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored private key cannot be opened; the account must re-register.
    #[error("key format error: {0}")]
    KeyFormat(String),

    /// Ciphertext did not authenticate under the document key.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// A wrapped document key did not open with the subject's private key.
    #[error("key unwrap error: {0}")]
    KeyUnwrap(String),

    /// Content hash or signature check failed.
    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    /// Version allocation kept colliding with concurrent uploads.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage backend fault.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::NotFound(_) => ErrorKind::NotFound,
            VaultError::Forbidden(_) => ErrorKind::Forbidden,
            VaultError::InvalidInput(_) => ErrorKind::InvalidInput,
            VaultError::KeyFormat(_) => ErrorKind::KeyFormat,
            VaultError::Decryption(_) => ErrorKind::Decryption,
            VaultError::KeyUnwrap(_) => ErrorKind::KeyUnwrap,
            VaultError::IntegrityMismatch(_) => ErrorKind::IntegrityMismatch,
            VaultError::Conflict(_) => ErrorKind::Conflict,
            VaultError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<PermsError> for VaultError {
    fn from(err: PermsError) -> Self {
        match err {
            PermsError::Encryption(e) => VaultError::Decryption(format!("cipher failure: {}", e)),
            PermsError::Decryption(e) => VaultError::Decryption(e),
            PermsError::KeyUnwrap(e) => VaultError::KeyUnwrap(e),
            PermsError::KeyFormat(e) => VaultError::KeyFormat(e),
            PermsError::InvalidGrant(e) => VaultError::InvalidInput(e),
            PermsError::Serialization(e) => VaultError::InvalidInput(e),
            PermsError::Core(e) => e.into(),
        }
    }
}

impl From<CoreError> for VaultError {
    fn from(err: CoreError) -> Self {
        VaultError::InvalidInput(err.to_string())
    }
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_errors_keep_their_kind() {
        let unwrap: VaultError = PermsError::KeyUnwrap("bad".into()).into();
        assert_eq!(unwrap.kind(), ErrorKind::KeyUnwrap);

        let decrypt: VaultError = PermsError::Decryption("tag".into()).into();
        assert_eq!(decrypt.kind(), ErrorKind::Decryption);

        let format: VaultError = PermsError::KeyFormat("legacy".into()).into();
        assert_eq!(format.kind(), ErrorKind::KeyFormat);
    }

    #[test]
    fn test_core_errors_are_invalid_input() {
        let err: VaultError = ideavault_core::IdeaId::parse("nope").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("nope"));
    }
}
