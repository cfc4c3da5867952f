//! Index key handling.
//!
//! The hashing key is an explicit object constructed once and passed into
//! the [`BlindIndexer`](crate::indexer::BlindIndexer), never read from
//! ambient global state. Tests inject fixed keys; production attaches a
//! version tag per stored index so keys can be rotated gradually.

use crate::error::Error;
use secrecy::{ExposeSecret, SecretVec};

/// Secret key for blind index derivation.
///
/// Construction fails immediately on empty key material, so every
/// downstream hash is guaranteed to be keyed.
///
/// # Example
///
/// ```
/// use blindex::key::IndexKey;
///
/// let key = IndexKey::new(vec![7u8; 32]).unwrap().with_version(2);
/// assert_eq!(key.version(), 2);
///
/// assert!(IndexKey::new(vec![]).is_err());
/// ```
pub struct IndexKey {
    secret: SecretVec<u8>,
    version: u32,
}

impl IndexKey {
    /// Creates a new index key from raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyIndexKey`] if `secret` is empty.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::EmptyIndexKey);
        }
        Ok(Self { secret: SecretVec::new(secret), version: 1 })
    }

    /// Creates an index key from a hex-encoded string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIndexKey`] if `encoded` is not valid hex,
    /// or [`Error::EmptyIndexKey`] if it decodes to nothing.
    pub fn from_hex(encoded: &str) -> Result<Self, Error> {
        let secret =
            hex::decode(encoded.trim()).map_err(|e| Error::InvalidIndexKey(e.to_string()))?;
        Self::new(secret)
    }

    /// Sets the key version tag, recorded alongside every stored index.
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Returns the key version tag.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Exposes the raw key material for MAC construction.
    #[must_use]
    pub(crate) fn expose(&self) -> &[u8] {
        self.secret.expose_secret()
    }
}

impl Clone for IndexKey {
    fn clone(&self) -> Self {
        // SecretVec is not Clone; rebuild the wrapper around a copy.
        Self { secret: SecretVec::new(self.secret.expose_secret().clone()), version: self.version }
    }
}

impl std::fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexKey").field("version", &self.version).finish_non_exhaustive()
    }
}
