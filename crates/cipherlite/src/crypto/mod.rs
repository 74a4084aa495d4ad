//! Cryptographic operations for Cipherlite.
//!
//! - **AES-256-XTS** page encryption, page number as tweak
//! - **Argon2id** passphrase key derivation with a per-file salt
//! - **HKDF-SHA256** expansion of the canonical key into the two XTS subkeys
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the database file
//! - Offline brute-force of the passphrase (memory-hard KDF)
//! - Learning whether a guessed key is partially right (single failure kind)
//!
//! We do NOT defend against:
//! - Tampering with individual pages (XTS is not authenticated)
//! - Compromised OS / access to process memory

pub mod key;
pub mod provider;
pub mod resolver;

pub use key::{derive_key, CanonicalKey, KEY_LENGTH, SALT_LENGTH};
pub use provider::{CipherProvider, PageCipher, PageNumber, XtsProvider};
pub use resolver::{parse_raw_key, KeyDirective, PreparedKey};
