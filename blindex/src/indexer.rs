//! Keyed blind index derivation.
//!
//! A blind index is a deterministic, one-way HMAC-SHA-256 of a normalized
//! value, stored beside the ciphertext. The exact index supports equality
//! and uniqueness; the prefix index set supports "starts with" search. Both
//! are pure functions of (normalized plaintext, secret key): recomputing
//! from the same inputs always reproduces byte-identical output.

use std::collections::BTreeSet;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::Error;
use crate::key::IndexKey;
use crate::normalize::{normalize, FieldKind};

type HmacSha256 = Hmac<Sha256>;

/// Longest token prefix that is indexed, in characters.
///
/// This bounds both storage (tags per token) and query cost, at the price
/// that a query token longer than `MAX_PREFIX_LEN` characters can never
/// match through the prefix mechanism.
pub const MAX_PREFIX_LEN: usize = 10;

/// Length of a rendered tag: hex of a full HMAC-SHA-256 output.
pub const TAG_LEN: usize = 64;

/// A single blind index tag: 64 lowercase hex characters.
///
/// Tags are one-way under the secret key; without the key, recovering the
/// plaintext requires brute force. `Ord` is derived so that tag sets have a
/// stable serialized order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexTag(String);

impl IndexTag {
    /// Returns the tag as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IndexTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The derived indexes for one non-empty PII attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeIndex {
    exact: IndexTag,
    prefix: BTreeSet<IndexTag>,
    key_version: u32,
}

impl AttributeIndex {
    /// Exact index: tag over the entire normalized value. Keys uniqueness
    /// checks and exact lookups.
    #[must_use]
    pub fn exact(&self) -> &IndexTag {
        &self.exact
    }

    /// Prefix index: unordered set of tags over bounded-length prefixes of
    /// each token. Compared as a set, never a sequence.
    #[must_use]
    pub fn prefix(&self) -> &BTreeSet<IndexTag> {
        &self.prefix
    }

    /// Version of the key that derived these tags.
    #[must_use]
    pub const fn key_version(&self) -> u32 {
        self.key_version
    }
}

/// Derives deterministic blind index tags from normalized values.
///
/// # Example
///
/// ```
/// use blindex::indexer::BlindIndexer;
/// use blindex::key::IndexKey;
/// use blindex::normalize::FieldKind;
///
/// let key = IndexKey::new(vec![42u8; 32]).unwrap();
/// let indexer = BlindIndexer::new(key).unwrap();
///
/// let index = indexer.attribute_index("Maria Dela Cruz", FieldKind::Name).unwrap();
/// // "maria" contributes 5 prefixes, "dela" 4, "cruz" 4.
/// assert_eq!(index.prefix().len(), 13);
///
/// assert!(indexer.attribute_index("  ", FieldKind::Name).is_none());
/// ```
pub struct BlindIndexer {
    // Prototype MAC, cloned per derivation so hashing itself is infallible.
    mac: HmacSha256,
    key_version: u32,
}

impl BlindIndexer {
    /// Creates a blind indexer from a validated key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIndexKey`] if the MAC rejects the key
    /// material. An empty key is already rejected by
    /// [`IndexKey::new`](crate::key::IndexKey::new), so a constructed
    /// indexer is always usably keyed.
    pub fn new(key: IndexKey) -> Result<Self, Error> {
        let mac = HmacSha256::new_from_slice(key.expose())
            .map_err(|e| Error::InvalidIndexKey(e.to_string()))?;
        Ok(Self { mac, key_version: key.version() })
    }

    /// Returns the version tag of the key behind this indexer.
    #[must_use]
    pub const fn key_version(&self) -> u32 {
        self.key_version
    }

    /// HMAC-SHA-256 of `normalized` under the secret key, rendered as a
    /// fixed-length hex tag.
    #[must_use]
    pub fn exact_hash(&self, normalized: &str) -> IndexTag {
        let mut mac = self.mac.clone();
        mac.update(normalized.as_bytes());
        IndexTag(hex::encode(mac.finalize().into_bytes()))
    }

    /// Tags for every character prefix of every whitespace-delimited token
    /// of `normalized`, up to [`MAX_PREFIX_LEN`] characters per token.
    ///
    /// Short prefixes (one or two characters) have very low entropy and are
    /// expected to collide across many plaintexts; matches on them are
    /// intentionally high-recall.
    #[must_use]
    pub fn prefix_hashes(&self, normalized: &str) -> BTreeSet<IndexTag> {
        let mut tags = BTreeSet::new();
        for token in normalized.split_whitespace() {
            let mut prefix = String::new();
            for c in token.chars().take(MAX_PREFIX_LEN) {
                prefix.push(c);
                tags.insert(self.exact_hash(&prefix));
            }
        }
        tags
    }

    /// Normalizes a raw value and derives its exact and prefix indexes.
    ///
    /// Returns `None` when normalization yields nothing: an empty value has
    /// no index, never a hash of the empty string.
    #[must_use]
    pub fn attribute_index(&self, raw: &str, kind: FieldKind) -> Option<AttributeIndex> {
        let normalized = normalize(raw, kind)?;
        Some(AttributeIndex {
            exact: self.exact_hash(&normalized),
            prefix: self.prefix_hashes(&normalized),
            key_version: self.key_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_indexer() -> BlindIndexer {
        BlindIndexer::new(IndexKey::new(vec![42u8; 32]).unwrap()).unwrap()
    }

    #[test]
    fn test_exact_hash_deterministic() {
        let indexer = test_indexer();
        assert_eq!(indexer.exact_hash("maria"), indexer.exact_hash("maria"));
    }

    #[test]
    fn test_exact_hash_distinct_values() {
        let indexer = test_indexer();
        assert_ne!(indexer.exact_hash("maria"), indexer.exact_hash("mario"));
    }

    #[test]
    fn test_exact_hash_distinct_keys() {
        let a = test_indexer();
        let b = BlindIndexer::new(IndexKey::new(vec![43u8; 32]).unwrap()).unwrap();
        assert_ne!(a.exact_hash("maria"), b.exact_hash("maria"));
    }

    #[test]
    fn test_tag_is_fixed_length_hex() {
        let tag = test_indexer().exact_hash("alice@example.com");
        assert_eq!(tag.as_str().len(), TAG_LEN);
        assert!(tag.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_prefix_hashes_match_formula() {
        let indexer = test_indexer();
        let tags = indexer.prefix_hashes("maria cruz");

        let mut expected = BTreeSet::new();
        for token in ["maria", "cruz"] {
            for i in 1..=token.len() {
                expected.insert(indexer.exact_hash(&token[..i]));
            }
        }
        assert_eq!(tags, expected);
    }

    #[test]
    fn test_prefix_hashes_capped_at_ten_chars() {
        let indexer = test_indexer();
        let tags = indexer.prefix_hashes("konstantinopolis");

        assert_eq!(tags.len(), MAX_PREFIX_LEN);
        assert!(tags.contains(&indexer.exact_hash("konstantin")));
        assert!(!tags.contains(&indexer.exact_hash("konstantino")));
        assert!(!tags.contains(&indexer.exact_hash("konstantinopolis")));
    }

    #[test]
    fn test_prefix_hashes_union_deduplicates() {
        let indexer = test_indexer();
        // Both tokens share the full "ana" prefix chain.
        let tags = indexer.prefix_hashes("ana ana");
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_prefix_hashes_counts_characters_not_bytes() {
        let indexer = test_indexer();
        // 11 two-byte characters: the cap must fall at 10 characters.
        let tags = indexer.prefix_hashes("ééééééééééé");
        assert_eq!(tags.len(), MAX_PREFIX_LEN);
    }

    #[test]
    fn test_attribute_index_empty_value() {
        let indexer = test_indexer();
        assert!(indexer.attribute_index("", FieldKind::Email).is_none());
        assert!(indexer.attribute_index(" \t ", FieldKind::Name).is_none());
    }

    #[test]
    fn test_attribute_index_normalizes_before_hashing() {
        let indexer = test_indexer();
        let a = indexer.attribute_index("A@B.com", FieldKind::Email).unwrap();
        let b = indexer.attribute_index("a@b.com", FieldKind::Email).unwrap();
        assert_eq!(a.exact(), b.exact());
        assert_eq!(a.prefix(), b.prefix());
    }

    #[test]
    fn test_attribute_index_carries_key_version() {
        let key = IndexKey::new(vec![42u8; 32]).unwrap().with_version(7);
        let indexer = BlindIndexer::new(key).unwrap();
        let index = indexer.attribute_index("maria", FieldKind::Name).unwrap();
        assert_eq!(index.key_version(), 7);
    }

    #[test]
    fn test_key_version_does_not_change_tags() {
        let v1 = BlindIndexer::new(IndexKey::new(vec![42u8; 32]).unwrap()).unwrap();
        let v2 =
            BlindIndexer::new(IndexKey::new(vec![42u8; 32]).unwrap().with_version(2)).unwrap();
        assert_eq!(v1.exact_hash("maria"), v2.exact_hash("maria"));
    }
}
