//! Key directives and their normalization into canonical keys.
//!
//! Resolution happens in two steps. [`PreparedKey::prepare`] runs when the
//! caller sets the key: it rejects malformed input immediately and never
//! touches the file. [`PreparedKey::resolve`] runs at the first page access,
//! once the salt stored in the file is known.

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::crypto::key::{CanonicalKey, KEY_LENGTH};
use crate::crypto::provider::CipherProvider;
use crate::error::{CipherliteError, Result};

/// Caller instruction selecting the key for a connection.
#[derive(Debug, Default)]
pub enum KeyDirective {
    /// No encryption.
    #[default]
    None,
    /// Passphrase run through the provider's key derivation.
    Derived(SecretString),
    /// Hex-encoded raw key, used as-is.
    Raw(SecretString),
}

impl KeyDirective {
    pub fn derived(passphrase: impl Into<String>) -> Self {
        Self::Derived(SecretString::from(passphrase.into()))
    }

    /// Raw key given as hex. An optional `0x` prefix is accepted.
    pub fn raw_hex(hex: impl Into<String>) -> Self {
        Self::Raw(SecretString::from(hex.into()))
    }

    pub fn raw_bytes(bytes: &[u8]) -> Self {
        Self::Raw(SecretString::from(hex::encode(bytes)))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A validated key directive awaiting the file salt.
#[derive(Debug)]
pub enum PreparedKey {
    Passphrase(SecretString),
    Raw(CanonicalKey),
}

impl PreparedKey {
    /// Validate a directive. Returns `None` for [`KeyDirective::None`].
    ///
    /// # Errors
    ///
    /// - `CipherliteError::InvalidKeyFormat` for malformed raw keys
    /// - `CipherliteError::InvalidInput` for an empty passphrase
    pub fn prepare(directive: KeyDirective, provider: &dyn CipherProvider) -> Result<Option<Self>> {
        match directive {
            KeyDirective::None => Ok(None),
            KeyDirective::Derived(passphrase) => {
                if passphrase.expose_secret().is_empty() {
                    return Err(CipherliteError::InvalidInput(
                        "Passphrase cannot be empty".to_string(),
                    ));
                }
                Ok(Some(Self::Passphrase(passphrase)))
            }
            KeyDirective::Raw(hex) => {
                let bytes = parse_raw_key(hex.expose_secret(), provider.key_len())?;
                let mut key: [u8; KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
                    CipherliteError::InvalidKeyFormat(format!(
                        "Raw key must be {} bytes (got {})",
                        KEY_LENGTH,
                        bytes.len()
                    ))
                })?;
                let canonical = CanonicalKey::from_bytes(key, provider.name());
                zeroize::Zeroize::zeroize(&mut key);
                Ok(Some(Self::Raw(canonical)))
            }
        }
    }

    /// Produce the canonical key for a file with the given salt.
    pub fn resolve(&self, provider: &dyn CipherProvider, salt: &[u8]) -> Result<CanonicalKey> {
        match self {
            Self::Passphrase(passphrase) => provider.derive_key(passphrase, salt),
            Self::Raw(key) => Ok(key.clone()),
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Passphrase(_))
    }
}

/// Decode a hex raw key of exactly `expected_len` bytes.
///
/// Surrounding whitespace and a `0x` / `0X` prefix are ignored.
///
/// # Arguments
///
/// * `input` - Hex digits, upper or lower case
/// * `expected_len` - Required decoded length, usually the provider's `key_len()`
///
/// # Returns
///
/// The decoded bytes, zeroized when dropped.
///
/// # Errors
///
/// `CipherliteError::InvalidKeyFormat` on an odd number of digits, a non-hex
/// character, or a decoded length other than `expected_len`.
///
/// # Examples
///
/// ```
/// use cipherlite::crypto::parse_raw_key;
///
/// let key = parse_raw_key("0x00ff00ff", 4)?;
/// assert_eq!(key.as_slice(), &[0x00, 0xff, 0x00, 0xff]);
/// assert!(parse_raw_key("abc", 4).is_err());
/// # Ok::<(), cipherlite::CipherliteError>(())
/// ```
pub fn parse_raw_key(input: &str, expected_len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() % 2 != 0 {
        return Err(CipherliteError::InvalidKeyFormat(
            "Raw key has an odd number of hex digits".to_string(),
        ));
    }

    let bytes = Zeroizing::new(hex::decode(digits).map_err(|_| {
        CipherliteError::InvalidKeyFormat("Raw key contains non-hex characters".to_string())
    })?);

    if bytes.len() != expected_len {
        return Err(CipherliteError::InvalidKeyFormat(format!(
            "Raw key must be {} bytes (got {})",
            expected_len,
            bytes.len()
        )));
    }

    Ok(bytes)
}
