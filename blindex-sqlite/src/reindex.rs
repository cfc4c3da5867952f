//! Batch backfill and recomputation of blind indexes.
//!
//! The reindexer walks live rows in primary-key order, in fixed-size
//! batches, decrypting each attribute and recomputing its indexes through
//! the exact same derivation path the write path uses, never a second,
//! divergent one. Recomputation does not depend on an index's previous
//! value, so an interrupted run can simply be started again: a completed
//! `All` pass is byte-identical whether it ran once or was resumed.
//!
//! A backfill is not a semantic edit: only index columns and the key
//! version tag are written, never `updated_at` or other bookkeeping.

use blindex::indexer::BlindIndexer;
use rusqlite::params;
use tracing::{info, warn};

use crate::cipher::FieldCipher;
use crate::error::StoreError;
use crate::schema::PII_FIELDS;
use crate::store::{map_constraint, EncryptedRecordStore};

/// Rows recomputed per transaction. Bounds memory to a constant footprint
/// regardless of table size; batches run strictly sequentially.
pub const REINDEX_BATCH_SIZE: usize = 100;

/// Which rows a reindex pass touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReindexScope {
    /// Every live row. Also the repair path after out-of-band ciphertext
    /// mutation or a key rotation.
    All,
    /// Only rows where some attribute has ciphertext but a missing exact
    /// index or a missing/empty prefix set. Does not detect
    /// stale-but-present indexes. A value that legitimately normalizes to
    /// nothing (a whitespace-only name, say) has ciphertext with null
    /// indexes by design, so its row is reselected on every pass; the
    /// rewrite is byte-identical, but it counts toward
    /// [`ReindexSummary::processed`] each time.
    #[default]
    MissingOnly,
}

/// Outcome of a reindex pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReindexSummary {
    /// Rows whose indexes were recomputed and written.
    pub processed: u64,
    /// Rows selected by the scope when the pass started.
    pub total: u64,
    /// Rows skipped because an attribute could not be decrypted or a
    /// recomputed unique index collided with another live row.
    pub skipped: u64,
}

impl<C: FieldCipher> EncryptedRecordStore<C> {
    /// Recomputes blind indexes for existing rows.
    ///
    /// Skip-and-report policy: a row whose ciphertext fails to decrypt, or
    /// whose recomputed unique index collides with another live row, is
    /// logged and counted in [`ReindexSummary::skipped`]; the pass
    /// continues. Anything else aborts with an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on storage failure.
    pub fn reindex(&mut self, scope: ReindexScope) -> Result<ReindexSummary, StoreError> {
        let filter = match scope {
            ReindexScope::All => String::new(),
            ReindexScope::MissingOnly => format!(" AND ({})", missing_filter()),
        };

        let total: u64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM employees WHERE deleted_at IS NULL{filter}"),
            [],
            |row| row.get(0),
        )?;
        let mut summary = ReindexSummary { total, ..ReindexSummary::default() };

        let select = format!(
            "SELECT id, first_name_ct, last_name_ct, email_ct, phone_ct \
             FROM employees WHERE deleted_at IS NULL AND id > ?1{filter} \
             ORDER BY id LIMIT {REINDEX_BATCH_SIZE}"
        );

        let mut last_id = 0i64;
        loop {
            let tx = self.conn.transaction()?;

            let batch: Vec<(i64, Vec<Option<Vec<u8>>>)> = {
                let mut stmt = tx.prepare(&select)?;
                let rows = stmt
                    .query_map(params![last_id], |row| {
                        let id: i64 = row.get(0)?;
                        let mut ciphertexts = Vec::with_capacity(PII_FIELDS.len());
                        for i in 0..PII_FIELDS.len() {
                            ciphertexts.push(row.get(i + 1)?);
                        }
                        Ok((id, ciphertexts))
                    })?
                    .collect::<Result<_, _>>()?;
                rows
            };
            if batch.is_empty() {
                break;
            }

            for (id, ciphertexts) in &batch {
                last_id = *id;
                match recompute_row(&self.indexer, &self.cipher, &tx, *id, ciphertexts) {
                    Ok(()) => summary.processed += 1,
                    Err(StoreError::Cipher(e)) => {
                        warn!(id, error = %e, "skipping row: undecryptable ciphertext");
                        summary.skipped += 1;
                    }
                    Err(StoreError::UniquenessConflict { field }) => {
                        warn!(id, field, "skipping row: recomputed index collides");
                        summary.skipped += 1;
                    }
                    Err(other) => return Err(other),
                }
            }

            tx.commit()?;
            info!(last_id, processed = summary.processed, "reindex batch committed");
        }

        info!(
            processed = summary.processed,
            total = summary.total,
            skipped = summary.skipped,
            ?scope,
            "reindex complete"
        );
        Ok(summary)
    }
}

/// Recomputes one row's indexes from its decrypted attribute values,
/// writing only index columns and the key version tag.
fn recompute_row<C: FieldCipher>(
    indexer: &BlindIndexer,
    cipher: &C,
    tx: &rusqlite::Transaction<'_>,
    id: i64,
    ciphertexts: &[Option<Vec<u8>>],
) -> Result<(), StoreError> {
    let mut index_values: Vec<Option<String>> = Vec::with_capacity(PII_FIELDS.len() * 2);
    for (def, ciphertext) in PII_FIELDS.iter().zip(ciphertexts) {
        match ciphertext {
            None => {
                index_values.push(None);
                index_values.push(None);
            }
            Some(bytes) => {
                let plaintext = cipher.decrypt(def.name, bytes)?;
                match indexer.attribute_index(&plaintext, def.kind) {
                    Some(index) => {
                        index_values.push(Some(index.exact().as_str().to_owned()));
                        index_values.push(Some(serde_json::to_string(index.prefix())?));
                    }
                    None => {
                        index_values.push(None);
                        index_values.push(None);
                    }
                }
            }
        }
    }

    tx.execute(
        "UPDATE employees SET \
            first_name_exact_index = ?1, first_name_prefix_index = ?2, \
            last_name_exact_index = ?3, last_name_prefix_index = ?4, \
            email_exact_index = ?5, email_prefix_index = ?6, \
            phone_exact_index = ?7, phone_prefix_index = ?8, \
            index_key_version = ?9 \
         WHERE id = ?10",
        params![
            index_values[0],
            index_values[1],
            index_values[2],
            index_values[3],
            index_values[4],
            index_values[5],
            index_values[6],
            index_values[7],
            indexer.key_version(),
            id,
        ],
    )
    .map_err(map_constraint)?;
    Ok(())
}

/// Selects rows where any attribute has ciphertext but a missing exact
/// index, or a missing/empty prefix set.
fn missing_filter() -> String {
    PII_FIELDS
        .iter()
        .map(|def| {
            format!(
                "({ct} IS NOT NULL AND ({exact} IS NULL OR {prefix} IS NULL OR {prefix} = '[]'))",
                ct = def.ct_column(),
                exact = def.exact_column(),
                prefix = def.prefix_column(),
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scope_is_missing_only() {
        assert_eq!(ReindexScope::default(), ReindexScope::MissingOnly);
    }

    #[test]
    fn test_missing_filter_covers_every_field() {
        let filter = missing_filter();
        for def in &PII_FIELDS {
            assert!(filter.contains(&def.ct_column()));
            assert!(filter.contains(&def.exact_column()));
            assert!(filter.contains(&def.prefix_column()));
        }
    }
}
