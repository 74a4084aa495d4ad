//! Error types for Cipherlite operations.
//!
//! `InvalidKeyFormat`, `KeyAlreadySet` and `NotADatabase` are the kinds a
//! caller is expected to match on. `NotADatabase` deliberately carries no
//! detail: a wrong key, a missing key and a corrupt file all look the same.

use thiserror::Error;

/// Result type alias for Cipherlite operations.
pub type Result<T> = std::result::Result<T, CipherliteError>;

/// Core error type for Cipherlite operations.
#[derive(Debug, Error)]
pub enum CipherliteError {
    /// Malformed raw key (odd-length hex, non-hex characters, wrong length)
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// A second key directive on the same connection
    #[error("A cipher key is already set for this connection")]
    KeyAlreadySet,

    /// First-page validation failed, or the engine rejected the decoded bytes
    #[error("File is not a database")]
    NotADatabase,

    /// Invalid caller input (empty passphrase, bad page size)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation issued in a state that does not allow it
    #[error("Misuse: {0}")]
    Misuse(String),

    /// Encryption, decryption or key derivation error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Configuration could not be read or is out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite { source: rusqlite::Error },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl From<rusqlite::Error> for CipherliteError {
    fn from(err: rusqlite::Error) -> Self {
        // The engine's own structural checks surface the same kind as a failed
        // first-page validation.
        if err.sqlite_error_code() == Some(rusqlite::ErrorCode::NotADatabase) {
            return CipherliteError::NotADatabase;
        }
        CipherliteError::Sqlite { source: err }
    }
}

impl From<toml::de::Error> for CipherliteError {
    fn from(err: toml::de::Error) -> Self {
        CipherliteError::Config(err.to_string())
    }
}
