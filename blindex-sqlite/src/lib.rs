//! # blindex-sqlite
//!
//! SQLite-backed record store for blind-indexed PII. Employee records keep
//! their name, email and phone only as ciphertext, while deterministic
//! keyed hashes stored beside it enforce uniqueness (no two live records
//! share an email or phone) and answer prefix search ("mar" finds "Maria")
//! without ever decrypting the searched columns.
//!
//! The field-level cipher is an external collaborator behind the
//! [`FieldCipher`] trait; this crate owns the write path (recompute +
//! persist indexes transactionally with the row), the uniqueness
//! constraint, search composition, and batch reindexing.

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cipher;
pub mod error;
pub mod reindex;
mod schema;
pub mod store;

pub use cipher::{CipherError, FieldCipher};
pub use error::StoreError;
pub use reindex::{ReindexScope, ReindexSummary, REINDEX_BATCH_SIZE};
pub use store::{EmployeePatch, EncryptedRecordStore, NewEmployee, StoredEmployee};
