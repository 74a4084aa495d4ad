//! # Cipherlite
//!
//! Transparent page-level encryption for SQLite database files.
//!
//! Every page is encrypted before it is written to disk and decrypted after
//! it is read, so the engine only ever sees plaintext while the file holds
//! nothing but ciphertext (plus a per-file salt). A file opened without a
//! key behaves like an ordinary SQLite database.
//!
//! ## Architecture
//!
//! - **crypto**: key resolution, key derivation, and the page cipher provider
//! - **storage**: database files, the encrypting pager, first-page validation
//! - **connection**: the SQL-facing connection that drives the pager
//! - **config**: page size and KDF parameters, loaded from TOML
//!
//! ## Errors
//!
//! A wrong key, a missing key, and a corrupted file are reported the same
//! way: [`CipherliteError::NotADatabase`].

pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod storage;

pub use config::{CipherConfig, KdfConfig};
pub use connection::Connection;
pub use crypto::{CipherProvider, KeyDirective, PageCipher, XtsProvider};
pub use error::{CipherliteError, Result};
pub use storage::{CipherPhase, DatabaseFile, MemoryFile, OsFile};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
