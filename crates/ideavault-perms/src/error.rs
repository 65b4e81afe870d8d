//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur during cipher, wrapping and ACL operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Encryption error.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Ciphertext did not authenticate under the given key and nonce.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// A wrapped key could not be opened by the presented private key.
    #[error("key unwrap error: {0}")]
    KeyUnwrap(String),

    /// A protected private key was stored under an incompatible scheme.
    #[error("key format error: {0}")]
    KeyFormat(String),

    /// An ACL entry or grant request violates the data model.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] ideavault_core::CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
