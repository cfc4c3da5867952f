//! # blindex
//!
//! Blind indexes for encrypted PII fields: deterministic, keyed, one-way
//! hashes stored beside ciphertext so that a column can be unique-checked
//! and prefix-searched without ever being decrypted.
//!
//! ## Features
//!
//! - Per-kind normalization (email, phone, person name)
//! - Exact indexes (HMAC-SHA-256) for equality and uniqueness
//! - Bounded prefix-hash sets for "starts with" search
//! - Explicit, versioned index keys for test injection and gradual rotation
//!
//! ## Example
//!
//! ```rust
//! use blindex::prelude::*;
//!
//! let key = IndexKey::new(vec![42u8; 32])?;
//! let indexer = BlindIndexer::new(key)?;
//!
//! let stored = indexer.attribute_index("Maria Dela Cruz", FieldKind::Name).unwrap();
//! let query = indexer.search_query("mar");
//!
//! // "mar" is a prefix of the stored token "maria".
//! assert!(stored.prefix().contains(&query.token_hashes()[0]));
//! # Ok::<(), blindex::error::Error>(())
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod indexer;
pub mod key;
pub mod normalize;
pub mod query;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::error::Error;
    pub use crate::indexer::{AttributeIndex, BlindIndexer, IndexTag, MAX_PREFIX_LEN};
    pub use crate::key::IndexKey;
    pub use crate::normalize::{normalize, FieldKind};
    pub use crate::query::SearchQuery;
}
