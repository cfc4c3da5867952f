//! Error types for blind index operations.

/// Main error type for blind index operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The hashing key is missing or empty. This is a fatal configuration
    /// error: hashing with an empty key collapses every record onto a
    /// degenerate index space, defeating uniqueness and search at once.
    #[error("index key must not be empty")]
    EmptyIndexKey,

    /// The hashing key could not be decoded or was rejected by the MAC.
    #[error("invalid index key: {0}")]
    InvalidIndexKey(String),
}
