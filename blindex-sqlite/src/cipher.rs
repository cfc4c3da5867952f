//! The field-level cipher boundary.
//!
//! Encrypting and decrypting PII values is an external capability: this
//! crate only requires that the plaintext is obtainable when needed, either
//! at write time (already in hand) or by decrypting during a reindex pass.
//! Ciphertext bytes are stored and returned opaquely.

/// Error raised by a [`FieldCipher`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("field cipher error: {0}")]
pub struct CipherError(pub String);

/// Field-level encryption capability, implemented by the surrounding
/// platform (e.g. an AEAD vault managing ciphertext, IV and auth tag per
/// value).
///
/// Implementations must be thread-safe (`Send + Sync`) and must be able to
/// decrypt any ciphertext they previously produced for the same field.
pub trait FieldCipher: Send + Sync {
    /// Encrypts one field value.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if encryption fails.
    fn encrypt(&self, field: &str, plaintext: &str) -> Result<Vec<u8>, CipherError>;

    /// Decrypts one field value back to plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if the ciphertext cannot be decrypted.
    fn decrypt(&self, field: &str, ciphertext: &[u8]) -> Result<String, CipherError>;
}
