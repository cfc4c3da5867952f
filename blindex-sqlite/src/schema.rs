//! Table layout for blind-indexed employee records.
//!
//! Per indexed attribute `<attr>` the table carries three columns: the
//! opaque ciphertext `<attr>_ct`, a nullable fixed-length `<attr>_exact_index`
//! tag, and a nullable `<attr>_prefix_index` JSON array of tags. Uniqueness
//! is keyed on the exact-index hash, never on the ciphertext, and is scoped
//! to non-deleted rows via partial unique indexes.

use blindex::normalize::FieldKind;
use rusqlite::Connection;

use crate::error::StoreError;

/// One blind-indexed PII attribute of an employee record.
pub(crate) struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub unique: bool,
}

impl FieldDef {
    pub fn ct_column(&self) -> String {
        format!("{}_ct", self.name)
    }

    pub fn exact_column(&self) -> String {
        format!("{}_exact_index", self.name)
    }

    pub fn prefix_column(&self) -> String {
        format!("{}_prefix_index", self.name)
    }
}

/// The indexed attributes, in schema order.
pub(crate) const PII_FIELDS: [FieldDef; 4] = [
    FieldDef { name: "first_name", kind: FieldKind::Name, unique: false },
    FieldDef { name: "last_name", kind: FieldKind::Name, unique: false },
    FieldDef { name: "email", kind: FieldKind::Email, unique: true },
    FieldDef { name: "phone", kind: FieldKind::Phone, unique: true },
];

/// Creates the employees table and its partial unique indexes.
pub(crate) fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_code TEXT NOT NULL,
            first_name_ct BLOB,
            first_name_exact_index TEXT,
            first_name_prefix_index TEXT,
            last_name_ct BLOB,
            last_name_exact_index TEXT,
            last_name_prefix_index TEXT,
            email_ct BLOB,
            email_exact_index TEXT,
            email_prefix_index TEXT,
            phone_ct BLOB,
            phone_exact_index TEXT,
            phone_prefix_index TEXT,
            index_key_version INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS employees_email_exact_index_unique
            ON employees(email_exact_index)
            WHERE deleted_at IS NULL AND email_exact_index IS NOT NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS employees_phone_exact_index_unique
            ON employees(phone_exact_index)
            WHERE deleted_at IS NULL AND phone_exact_index IS NOT NULL;

        CREATE INDEX IF NOT EXISTS employees_employee_code
            ON employees(employee_code);
        ",
    )?;
    Ok(())
}
