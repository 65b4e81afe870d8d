//! Error types for IdeaVault Core.

use thiserror::Error;

/// Core errors that can occur while parsing or verifying primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid {kind} identifier: {value}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
