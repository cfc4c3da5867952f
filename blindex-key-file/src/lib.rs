//! File-based index key source for blindex.
//!
//! Stores the blind-index hashing key in the filesystem; suitable for
//! development and testing environments. Layout:
//!
//! ```text
//! keys/
//! └── index.key      (32 bytes, hex-encoded, 0600 permissions)
//! ```
//!
//! The key must stay stable for the lifetime of the indexed records:
//! rotating it invalidates every previously computed index until a full
//! reindex pass runs.

#![warn(clippy::pedantic, clippy::nursery)]

use std::fs;
use std::path::{Path, PathBuf};

use blindex::key::IndexKey;

/// Size of a generated index key in bytes.
pub const KEY_SIZE: usize = 32;

/// File name of the index key inside the key directory.
pub const KEY_FILE_NAME: &str = "index.key";

/// Errors from the file-based key source.
#[derive(Debug, thiserror::Error)]
pub enum KeyFileError {
    /// A key file already exists; refusing to overwrite key material.
    #[error("key file already exists: {0}")]
    AlreadyExists(PathBuf),

    /// No key file found at the expected location.
    #[error("key file not found: {0}")]
    NotFound(PathBuf),

    /// The key file content was rejected (bad hex, empty).
    #[error(transparent)]
    Key(#[from] blindex::error::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-based source for the blind-index hashing key.
pub struct FileKeySource {
    key_path: PathBuf,
}

impl FileKeySource {
    /// Points at a key directory. The directory does not need to exist yet
    /// for [`generate`](Self::generate).
    #[must_use]
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self { key_path: key_dir.into().join(KEY_FILE_NAME) }
    }

    /// Generates a fresh 32-byte key and writes it hex-encoded with 0600
    /// permissions. Refuses to overwrite an existing key file, since doing
    /// so would orphan every index derived from the old key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFileError::AlreadyExists`] if a key file is already
    /// present, or [`KeyFileError::Io`] on filesystem failure.
    pub fn generate(&self) -> Result<PathBuf, KeyFileError> {
        if self.key_path.exists() {
            return Err(KeyFileError::AlreadyExists(self.key_path.clone()));
        }
        if let Some(dir) = self.key_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut material = vec![0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut material);

        fs::write(&self.key_path, hex::encode(&material))?;
        restrict_permissions(&self.key_path)?;

        zeroize::Zeroize::zeroize(&mut material);
        Ok(self.key_path.clone())
    }

    /// Loads and validates the key file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFileError::NotFound`] if the file is missing, or
    /// [`KeyFileError::Key`] if its content is not a usable key.
    pub fn load(&self) -> Result<IndexKey, KeyFileError> {
        if !self.key_path.exists() {
            return Err(KeyFileError::NotFound(self.key_path.clone()));
        }
        let encoded = fs::read_to_string(&self.key_path)?;
        Ok(IndexKey::from_hex(&encoded)?)
    }

    /// Returns the path of the key file.
    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = FileKeySource::new(dir.path());

        source.generate().unwrap();
        let key = source.load().unwrap();

        // Generated material is usable as an index key.
        assert!(blindex::indexer::BlindIndexer::new(key).is_ok());
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let source = FileKeySource::new(dir.path());

        source.generate().unwrap();
        let result = source.generate();
        assert!(matches!(result, Err(KeyFileError::AlreadyExists(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = FileKeySource::new(dir.path());

        let result = source.load();
        assert!(matches!(result, Err(KeyFileError::NotFound(_))));
    }

    #[test]
    fn test_load_rejects_corrupt_key_file() {
        let dir = TempDir::new().unwrap();
        let source = FileKeySource::new(dir.path());

        fs::write(source.key_path(), "zz not hex").unwrap();
        let result = source.load();
        assert!(matches!(result, Err(KeyFileError::Key(_))));
    }

    #[test]
    fn test_load_rejects_empty_key_file() {
        let dir = TempDir::new().unwrap();
        let source = FileKeySource::new(dir.path());

        fs::write(source.key_path(), "").unwrap();
        let result = source.load();
        assert!(matches!(result, Err(KeyFileError::Key(blindex::error::Error::EmptyIndexKey))));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = FileKeySource::new(dir.path());
        source.generate().unwrap();

        let mode = fs::metadata(source.key_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_distinct_generations_distinct_keys() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let a = FileKeySource::new(dir_a.path());
        let b = FileKeySource::new(dir_b.path());
        a.generate().unwrap();
        b.generate().unwrap();

        let ka = fs::read_to_string(a.key_path()).unwrap();
        let kb = fs::read_to_string(b.key_path()).unwrap();
        assert_ne!(ka, kb);
    }
}
