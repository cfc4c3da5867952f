//! The encrypted record store.
//!
//! Owns the write path for blind-indexed employee records: every create and
//! update recomputes the affected attributes' exact and prefix indexes and
//! persists them in the same transaction as the row, so a reader can never
//! observe a committed row whose ciphertext and indexes disagree. Index
//! recomputation is an explicit step of `create`/`update`; there is no
//! hidden lifecycle hook another code path could accidentally skip.

use blindex::indexer::BlindIndexer;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use tracing::debug;

use crate::cipher::FieldCipher;
use crate::error::StoreError;
use crate::schema::{self, FieldDef, PII_FIELDS};

/// Input for creating an employee record.
///
/// PII values are raw plaintext; the store normalizes, hashes and encrypts
/// them. `None` values are stored with no ciphertext and no indexes.
#[derive(Debug, Clone, Default)]
pub struct NewEmployee {
    /// Non-PII plaintext identifier, matched with `LIKE` during search.
    pub employee_code: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Partial update of an employee record.
///
/// `None` means "absent from the payload": the stored ciphertext and index
/// are left untouched. This is an explicit staleness risk if some other
/// path mutates the ciphertext without going through [`EncryptedRecordStore::update`];
/// the repair path is a full reindex. To clear a value, pass an empty
/// string: it encrypts but normalizes to nothing, so the indexes go null.
#[derive(Debug, Clone, Default)]
pub struct EmployeePatch {
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A stored employee row. PII attributes come back as opaque ciphertext;
/// decryption for display is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEmployee {
    pub id: i64,
    pub employee_code: String,
    pub first_name: Option<Vec<u8>>,
    pub last_name: Option<Vec<u8>>,
    pub email: Option<Vec<u8>>,
    pub phone: Option<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

/// The three persisted facets of one attribute write.
pub(crate) struct DerivedAttribute {
    pub(crate) ciphertext: Option<Vec<u8>>,
    pub(crate) exact: Option<String>,
    pub(crate) prefix: Option<String>,
}

impl DerivedAttribute {
    const fn absent() -> Self {
        Self { ciphertext: None, exact: None, prefix: None }
    }
}

/// Store for employee records whose PII is kept encrypted but remains
/// unique-checkable and prefix-searchable through blind indexes.
///
/// # Example
///
/// ```rust,ignore
/// use blindex::prelude::*;
/// use blindex_sqlite::{EncryptedRecordStore, NewEmployee};
/// use rusqlite::Connection;
///
/// let indexer = BlindIndexer::new(IndexKey::new(vec![42u8; 32])?)?;
/// let mut store = EncryptedRecordStore::new(
///     Connection::open("hr.db")?, indexer, platform_cipher)?;
///
/// store.create(&NewEmployee {
///     employee_code: "EMP-0001".into(),
///     first_name: Some("Maria".into()),
///     last_name: Some("Dela Cruz".into()),
///     email: Some("maria@example.com".into()),
///     phone: Some("+63 2 8888 1234".into()),
/// })?;
///
/// let hits = store.search("mar")?;
/// assert_eq!(hits.len(), 1);
/// ```
pub struct EncryptedRecordStore<C: FieldCipher> {
    pub(crate) conn: Connection,
    pub(crate) indexer: BlindIndexer,
    pub(crate) cipher: C,
}

impl<C: FieldCipher> EncryptedRecordStore<C> {
    /// Opens the store over a connection, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if schema creation fails.
    pub fn new(conn: Connection, indexer: BlindIndexer, cipher: C) -> Result<Self, StoreError> {
        schema::init(&conn)?;
        Ok(Self { conn, indexer, cipher })
    }

    /// Creates a record, deriving and persisting all indexes in the same
    /// transaction as the row insert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniquenessConflict`] when another live record
    /// already claims the same normalized email or phone; the conflict is
    /// decided by the unique constraint at commit, so exactly one of two
    /// concurrent claims succeeds.
    pub fn create(&mut self, new: &NewEmployee) -> Result<i64, StoreError> {
        let values = [
            new.first_name.as_deref(),
            new.last_name.as_deref(),
            new.email.as_deref(),
            new.phone.as_deref(),
        ];
        let mut derived = Vec::with_capacity(PII_FIELDS.len());
        for (def, value) in PII_FIELDS.iter().zip(values) {
            derived.push(self.derive(def, value)?);
        }

        let now = now_rfc3339();
        let key_version = self.indexer.key_version();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO employees (employee_code,
                first_name_ct, first_name_exact_index, first_name_prefix_index,
                last_name_ct, last_name_exact_index, last_name_prefix_index,
                email_ct, email_exact_index, email_prefix_index,
                phone_ct, phone_exact_index, phone_prefix_index,
                index_key_version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                new.employee_code,
                derived[0].ciphertext,
                derived[0].exact,
                derived[0].prefix,
                derived[1].ciphertext,
                derived[1].exact,
                derived[1].prefix,
                derived[2].ciphertext,
                derived[2].exact,
                derived[2].prefix,
                derived[3].ciphertext,
                derived[3].exact,
                derived[3].prefix,
                key_version,
                now,
                now,
            ],
        )
        .map_err(map_constraint)?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(id, code = %new.employee_code, "created employee record");
        Ok(id)
    }

    /// Updates a record, recomputing indexes only for the attributes
    /// present in the patch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no live record has this id, or
    /// [`StoreError::UniquenessConflict`] as for [`create`](Self::create).
    pub fn update(&mut self, id: i64, patch: &EmployeePatch) -> Result<(), StoreError> {
        let mut assignments: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(code) = &patch.employee_code {
            assignments.push("employee_code = ?".to_owned());
            values.push(Box::new(code.clone()));
        }

        let supplied = [
            patch.first_name.as_deref(),
            patch.last_name.as_deref(),
            patch.email.as_deref(),
            patch.phone.as_deref(),
        ];
        let mut any_pii = false;
        for (def, value) in PII_FIELDS.iter().zip(supplied) {
            let Some(value) = value else { continue };
            any_pii = true;
            let derived = self.derive(def, Some(value))?;
            assignments.push(format!("{} = ?", def.ct_column()));
            values.push(Box::new(derived.ciphertext));
            assignments.push(format!("{} = ?", def.exact_column()));
            values.push(Box::new(derived.exact));
            assignments.push(format!("{} = ?", def.prefix_column()));
            values.push(Box::new(derived.prefix));
        }
        if any_pii {
            assignments.push("index_key_version = ?".to_owned());
            values.push(Box::new(self.indexer.key_version()));
        }

        assignments.push("updated_at = ?".to_owned());
        values.push(Box::new(now_rfc3339()));
        values.push(Box::new(id));

        let sql = format!(
            "UPDATE employees SET {} WHERE id = ? AND deleted_at IS NULL",
            assignments.join(", ")
        );

        let tx = self.conn.transaction()?;
        let changed = tx
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))
            .map_err(map_constraint)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        tx.commit()?;

        debug!(id, "updated employee record");
        Ok(())
    }

    /// Soft-deletes a record. Its indexes stop participating in uniqueness
    /// and search immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no live record has this id.
    pub fn delete(&mut self, id: i64) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE employees SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![now_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "soft-deleted employee record");
        Ok(())
    }

    /// Fetches a live record by id, ciphertext and all.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no live record has this id.
    pub fn get(&self, id: i64) -> Result<StoredEmployee, StoreError> {
        self.conn
            .query_row(
                &format!("{SELECT_EMPLOYEE} WHERE deleted_at IS NULL AND id = ?1"),
                params![id],
                row_to_employee,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    /// Searches live records without decrypting anything.
    ///
    /// The predicate is: `employee_code LIKE %query%`, OR every query token
    /// has its hash in at least one attribute's prefix-index set (tokens
    /// AND together, attributes OR within a token). An empty or
    /// whitespace-only query matches everything; callers must account for
    /// that, it is not an empty result.
    ///
    /// Rows come back in primary-key order with their ciphertext intact;
    /// ordering for display, pagination and decryption are caller concerns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub fn search(&self, raw_query: &str) -> Result<Vec<StoredEmployee>, StoreError> {
        let query = self.indexer.search_query(raw_query);

        let mut sql = format!("{SELECT_EMPLOYEE} WHERE deleted_at IS NULL");
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if !query.is_match_all() {
            values.push(Box::new(query.raw().to_owned()));

            let mut token_clauses = Vec::with_capacity(query.token_hashes().len());
            for (i, tag) in query.token_hashes().iter().enumerate() {
                let param = i + 2;
                let attr_clauses: Vec<String> = PII_FIELDS
                    .iter()
                    .map(|def| {
                        let col = def.prefix_column();
                        format!(
                            "({col} IS NOT NULL AND EXISTS (SELECT 1 FROM json_each({col}) \
                             WHERE json_each.value = ?{param}))"
                        )
                    })
                    .collect();
                token_clauses.push(format!("({})", attr_clauses.join(" OR ")));
                values.push(Box::new(tag.as_str().to_owned()));
            }

            sql.push_str(&format!(
                " AND (employee_code LIKE '%' || ?1 || '%' OR ({}))",
                token_clauses.join(" AND ")
            ));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), row_to_employee)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Escape hatch to the underlying connection, for migrations and
    /// operational tooling. Mutating index columns through it bypasses
    /// every guarantee this store makes.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the store, handing the connection back. Used when swapping
    /// in a new indexer (e.g. after a key version bump) over the same
    /// database.
    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Encrypts and index-derives one attribute value.
    pub(crate) fn derive(
        &self,
        def: &FieldDef,
        value: Option<&str>,
    ) -> Result<DerivedAttribute, StoreError> {
        let Some(value) = value else {
            return Ok(DerivedAttribute::absent());
        };
        let ciphertext = Some(self.cipher.encrypt(def.name, value)?);
        match self.indexer.attribute_index(value, def.kind) {
            Some(index) => Ok(DerivedAttribute {
                ciphertext,
                exact: Some(index.exact().as_str().to_owned()),
                prefix: Some(serde_json::to_string(index.prefix())?),
            }),
            // Whitespace-only value: ciphertext exists, indexes stay null.
            None => Ok(DerivedAttribute { ciphertext, exact: None, prefix: None }),
        }
    }
}

const SELECT_EMPLOYEE: &str = "SELECT id, employee_code, first_name_ct, last_name_ct, \
     email_ct, phone_ct, created_at, updated_at FROM employees";

fn row_to_employee(row: &Row<'_>) -> rusqlite::Result<StoredEmployee> {
    Ok(StoredEmployee {
        id: row.get(0)?,
        employee_code: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Maps a unique-constraint violation on an exact-index column to the
/// field-scoped conflict error; everything else passes through.
pub(crate) fn map_constraint(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            for def in &PII_FIELDS {
                if def.unique && message.contains(&def.exact_column()) {
                    return StoreError::UniquenessConflict { field: def.name };
                }
            }
        }
    }
    StoreError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherError;
    use blindex::key::IndexKey;
    use blindex::normalize::FieldKind;

    struct PlainCipher;

    impl FieldCipher for PlainCipher {
        fn encrypt(&self, _field: &str, plaintext: &str) -> Result<Vec<u8>, CipherError> {
            Ok(plaintext.as_bytes().to_vec())
        }

        fn decrypt(&self, _field: &str, ciphertext: &[u8]) -> Result<String, CipherError> {
            String::from_utf8(ciphertext.to_vec()).map_err(|e| CipherError(e.to_string()))
        }
    }

    fn test_store() -> EncryptedRecordStore<PlainCipher> {
        let indexer = BlindIndexer::new(IndexKey::new(vec![42u8; 32]).unwrap()).unwrap();
        EncryptedRecordStore::new(
            Connection::open_in_memory().unwrap(),
            indexer,
            PlainCipher,
        )
        .unwrap()
    }

    #[test]
    fn test_derive_absent_value() {
        let store = test_store();
        let derived = store.derive(&PII_FIELDS[0], None).unwrap();
        assert!(derived.ciphertext.is_none());
        assert!(derived.exact.is_none());
        assert!(derived.prefix.is_none());
    }

    #[test]
    fn test_derive_whitespace_value_has_ciphertext_but_no_index() {
        let store = test_store();
        let derived = store.derive(&PII_FIELDS[0], Some("   ")).unwrap();
        assert!(derived.ciphertext.is_some());
        assert!(derived.exact.is_none());
        assert!(derived.prefix.is_none());
    }

    #[test]
    fn test_derive_prefix_serializes_sorted() {
        let store = test_store();
        let derived = store.derive(&PII_FIELDS[0], Some("Maria")).unwrap();
        let tags: Vec<String> = serde_json::from_str(&derived.prefix.unwrap()).unwrap();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);
        assert_eq!(tags.len(), 5);
    }

    #[test]
    fn test_derive_uses_field_kind() {
        let store = test_store();
        let phone = store.derive(&PII_FIELDS[3], Some("+1 (555) 010")).unwrap();
        let expected = store.indexer.exact_hash("1555010");
        assert_eq!(phone.exact.as_deref(), Some(expected.as_str()));
        assert_eq!(PII_FIELDS[3].kind, FieldKind::Phone);
    }

    #[test]
    fn test_get_missing_record() {
        let store = test_store();
        assert!(matches!(store.get(404), Err(StoreError::NotFound(404))));
    }
}
