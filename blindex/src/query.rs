//! Search query planning.
//!
//! A raw user query is lowercased and whitespace-tokenized; each token is
//! hashed in full under the index key. Tokens combine with logical AND, and
//! within a token the configured attributes combine with logical OR. The
//! storage layer composes the actual predicate.

use crate::indexer::{BlindIndexer, IndexTag};

/// A planned search query: the trimmed raw text plus one tag per token.
///
/// Query tokens are hashed without truncation, so a token longer than
/// [`MAX_PREFIX_LEN`](crate::indexer::MAX_PREFIX_LEN) characters can never
/// match a stored prefix set. That is a deliberate, documented limitation
/// of the prefix mechanism, not an oversight of the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    raw: String,
    token_hashes: Vec<IndexTag>,
}

impl SearchQuery {
    /// Returns the trimmed raw query text, for plaintext `LIKE` matching on
    /// non-PII columns.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns one tag per query token, in token order.
    #[must_use]
    pub fn token_hashes(&self) -> &[IndexTag] {
        &self.token_hashes
    }

    /// An empty or whitespace-only query matches everything: callers get an
    /// unfiltered predicate, not an empty result.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.token_hashes.is_empty()
    }
}

impl BlindIndexer {
    /// Plans a search over blind-indexed attributes.
    #[must_use]
    pub fn search_query(&self, raw: &str) -> SearchQuery {
        let trimmed = raw.trim();
        let token_hashes =
            trimmed.to_lowercase().split_whitespace().map(|t| self.exact_hash(t)).collect();
        SearchQuery { raw: trimmed.to_owned(), token_hashes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::IndexKey;

    fn test_indexer() -> BlindIndexer {
        BlindIndexer::new(IndexKey::new(vec![42u8; 32]).unwrap()).unwrap()
    }

    #[test]
    fn test_query_tokens_are_lowercased() {
        let indexer = test_indexer();
        let query = indexer.search_query("  MAR ");
        assert_eq!(query.token_hashes(), &[indexer.exact_hash("mar")]);
        assert_eq!(query.raw(), "MAR");
    }

    #[test]
    fn test_query_splits_on_whitespace() {
        let indexer = test_indexer();
        let query = indexer.search_query("maria  cruz");
        assert_eq!(
            query.token_hashes(),
            &[indexer.exact_hash("maria"), indexer.exact_hash("cruz")]
        );
    }

    #[test]
    fn test_empty_query_matches_all() {
        let indexer = test_indexer();
        assert!(indexer.search_query("").is_match_all());
        assert!(indexer.search_query("   ").is_match_all());
        assert!(!indexer.search_query("m").is_match_all());
    }

    #[test]
    fn test_long_token_hashed_in_full() {
        let indexer = test_indexer();
        let query = indexer.search_query("konstantinopolis");
        // Hashed as-is: will never appear in a prefix set capped at 10.
        assert_eq!(query.token_hashes(), &[indexer.exact_hash("konstantinopolis")]);
    }
}
