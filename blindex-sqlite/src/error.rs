//! Error types for the encrypted record store.

use crate::cipher::CipherError;

/// Main error type for store and reindex operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A create or update would duplicate another live record's exact index
    /// for a unique attribute. Recoverable and field-scoped: surface it to
    /// the user as a validation failure on the named field.
    #[error("{field} is already taken by another record")]
    UniquenessConflict {
        /// The attribute whose uniqueness constraint was violated.
        field: &'static str,
    },

    /// No live record with the given id.
    #[error("record not found: {0}")]
    NotFound(i64),

    /// The external field cipher failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Blind index derivation was misconfigured.
    #[error(transparent)]
    Index(#[from] blindex::error::Error),

    /// Prefix-set serialization failed.
    #[error("index serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Underlying database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
