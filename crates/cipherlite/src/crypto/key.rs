//! Canonical key material and passphrase key derivation.
//!
//! Every key directive ends up as a [`CanonicalKey`]: 32 bytes of secret
//! plus the identifier of the provider that will consume it.

use argon2::Argon2;
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::KdfConfig;
use crate::error::{CipherliteError, Result};

/// Length of a canonical key in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// Length of the per-file salt stored in the first bytes of an encrypted file.
pub const SALT_LENGTH: usize = 16;

/// Fixed-length key used for page encryption.
///
/// Key bytes are zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CanonicalKey {
    key: [u8; KEY_LENGTH],
    #[zeroize(skip)]
    provider: String,
}

impl CanonicalKey {
    /// Wrap raw key bytes for the named provider.
    ///
    /// # Security
    ///
    /// The caller is responsible for ensuring the bytes come from a secure source.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH], provider: impl Into<String>) -> Self {
        Self {
            key: bytes,
            provider: provider.into(),
        }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate cipher setup.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl std::fmt::Debug for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanonicalKey")
            .field("key", &"[REDACTED]")
            .field("provider", &self.provider)
            .finish()
    }
}

/// Derive a 256-bit key from a passphrase using Argon2id.
///
/// # Arguments
///
/// * `passphrase` - The passphrase to derive from; must not be empty
/// * `salt` - The per-file salt, at least [`SALT_LENGTH`] bytes
/// * `kdf` - Argon2id memory, iteration and lane counts
/// * `provider` - Identifier of the provider the key is meant for
///
/// # Returns
///
/// A [`CanonicalKey`] for the page cipher. Same passphrase, salt and
/// parameters always produce the same key, across processes and versions.
///
/// # Examples
///
/// ```
/// use cipherlite::crypto::derive_key;
/// use cipherlite::KdfConfig;
/// use secrecy::SecretString;
///
/// let kdf = KdfConfig { memory_kib: 1024, iterations: 1, parallelism: 1 };
/// let passphrase = SecretString::from("meow".to_string());
/// let key = derive_key(&passphrase, b"unique-per-file!", &kdf, "rustcrypto")?;
/// assert_eq!(key.provider(), "rustcrypto");
/// # Ok::<(), cipherlite::CipherliteError>(())
/// ```
///
/// # Errors
///
/// Returns `CipherliteError::InvalidInput` for an empty passphrase or a salt
/// shorter than [`SALT_LENGTH`], and `CipherliteError::Config` for parameters
/// Argon2 rejects.
pub fn derive_key(
    passphrase: &SecretString,
    salt: &[u8],
    kdf: &KdfConfig,
    provider: &str,
) -> Result<CanonicalKey> {
    if passphrase.expose_secret().is_empty() {
        return Err(CipherliteError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if salt.len() < SALT_LENGTH {
        return Err(CipherliteError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            SALT_LENGTH
        )));
    }

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        kdf.argon2_params()?,
    );

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key_bytes)
        .map_err(|e| CipherliteError::Crypto(format!("Key derivation failed: {}", e)))?;

    let key = CanonicalKey::from_bytes(key_bytes, provider);
    key_bytes.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> KdfConfig {
        KdfConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn test_key_derivation_deterministic() {
        let salt = b"unique-salt-1234";

        let key1 = derive_key(&secret("meow"), salt, &fast_kdf(), "test").unwrap();
        let key2 = derive_key(&secret("meow"), salt, &fast_kdf(), "test").unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_key_derivation_known_answer() {
        // Argon2id v0x13, m = 1024 KiB, t = 1, p = 1.
        let key = derive_key(&secret("meow"), b"fixed-salt-12345", &fast_kdf(), "test").unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "3a62ae7ad2433f4db80af762a520d0e4f3a265daa03bf70b483bd8fb5d270e29"
        );
    }

    #[test]
    fn test_different_salt_different_key() {
        let key1 = derive_key(&secret("meow"), b"salt1-1234567890", &fast_kdf(), "test").unwrap();
        let key2 = derive_key(&secret("meow"), b"salt2-1234567890", &fast_kdf(), "test").unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_passphrase_different_key() {
        let salt = b"fixed-salt-12345";

        let key1 = derive_key(&secret("meow"), salt, &fast_kdf(), "test").unwrap();
        let key2 = derive_key(&secret("woof"), salt, &fast_kdf(), "test").unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_params_change_key() {
        let salt = b"fixed-salt-12345";
        let heavier = KdfConfig {
            iterations: 2,
            ..fast_kdf()
        };

        let key1 = derive_key(&secret("meow"), salt, &fast_kdf(), "test").unwrap();
        let key2 = derive_key(&secret("meow"), salt, &heavier, "test").unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let result = derive_key(&secret(""), b"salt-12345678901", &fast_kdf(), "test");
        assert!(matches!(result, Err(CipherliteError::InvalidInput(_))));
    }

    #[test]
    fn test_short_salt_rejected() {
        let result = derive_key(&secret("meow"), b"short", &fast_kdf(), "test");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Salt must be at least 16 bytes"));
    }

    #[test]
    fn test_canonical_key_debug_redacts() {
        let key = CanonicalKey::from_bytes([0xAB; KEY_LENGTH], "test");

        let debug_output = format!("{:?}", key);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("abab"));
        assert!(!debug_output.contains("171"));
    }

    #[test]
    fn test_canonical_key_carries_provider() {
        let key = CanonicalKey::from_bytes([0u8; KEY_LENGTH], "rustcrypto");
        assert_eq!(key.provider(), "rustcrypto");
    }
}
