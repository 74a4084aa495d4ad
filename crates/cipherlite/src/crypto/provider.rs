//! Cipher providers.
//!
//! A [`CipherProvider`] turns key directives into [`CanonicalKey`]s and keys
//! into [`PageCipher`]s. Providers are constructed explicitly and handed to
//! each connection, so tests can substitute their own.
//!
//! The default [`XtsProvider`] encrypts pages with AES-256-XTS, using the
//! page number as the XTS tweak. XTS is length-preserving, so a page keeps
//! its size on disk, and deterministic: the same content, key and page number
//! always produce the same ciphertext while equal pages at different page
//! numbers encrypt differently.

use aes::cipher::KeyInit;
use aes::Aes256;
use hkdf::Hkdf;
use secrecy::SecretString;
use sha2::Sha256;
use xts_mode::{get_tweak_default, Xts128};
use zeroize::Zeroizing;

use crate::config::KdfConfig;
use crate::crypto::key::{derive_key, CanonicalKey, KEY_LENGTH};
use crate::error::{CipherliteError, Result};

/// Page numbers are 1-based, as in the SQLite file format.
pub type PageNumber = u32;

/// Smallest buffer XTS can process.
const MIN_SECTOR_LEN: usize = 16;

/// Encrypts and decrypts whole pages in place.
pub trait PageCipher: Send + Sync {
    fn encrypt_page(&self, pgno: PageNumber, page: &mut [u8]) -> Result<()>;

    fn decrypt_page(&self, pgno: PageNumber, page: &mut [u8]) -> Result<()>;
}

/// Key derivation and page cipher construction for one cryptographic back end.
pub trait CipherProvider: Send + Sync + std::fmt::Debug {
    /// Identifier reported by connection introspection.
    fn name(&self) -> &str;

    /// Required length of a raw key in bytes.
    fn key_len(&self) -> usize {
        KEY_LENGTH
    }

    /// Derive a key from a passphrase and the file salt.
    fn derive_key(&self, passphrase: &SecretString, salt: &[u8]) -> Result<CanonicalKey>;

    /// Build the page cipher for a canonical key.
    fn page_cipher(&self, key: &CanonicalKey) -> Result<Box<dyn PageCipher>>;
}

/// AES-256-XTS pages with Argon2id passphrase derivation.
#[derive(Debug, Clone, Default)]
pub struct XtsProvider {
    kdf: KdfConfig,
}

impl XtsProvider {
    pub const NAME: &'static str = "rustcrypto";

    /// HKDF info string separating the two XTS subkeys from other uses of the key.
    const SUBKEY_INFO: &'static [u8] = b"cipherlite page xts-aes-256";

    pub fn new(kdf: KdfConfig) -> Self {
        Self { kdf }
    }
}

impl CipherProvider for XtsProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn derive_key(&self, passphrase: &SecretString, salt: &[u8]) -> Result<CanonicalKey> {
        derive_key(passphrase, salt, &self.kdf, Self::NAME)
    }

    fn page_cipher(&self, key: &CanonicalKey) -> Result<Box<dyn PageCipher>> {
        // XTS needs two independent AES keys; expand the canonical key into both.
        let mut subkeys = Zeroizing::new([0u8; 2 * KEY_LENGTH]);
        Hkdf::<Sha256>::new(None, key.as_bytes())
            .expand(Self::SUBKEY_INFO, subkeys.as_mut_slice())
            .map_err(|e| CipherliteError::Crypto(format!("Subkey expansion failed: {}", e)))?;

        let data_cipher = Aes256::new_from_slice(&subkeys[..KEY_LENGTH])
            .map_err(|e| CipherliteError::Crypto(format!("Invalid AES key: {}", e)))?;
        let tweak_cipher = Aes256::new_from_slice(&subkeys[KEY_LENGTH..])
            .map_err(|e| CipherliteError::Crypto(format!("Invalid AES key: {}", e)))?;

        Ok(Box::new(XtsPageCipher {
            cipher: Xts128::new(data_cipher, tweak_cipher),
        }))
    }
}

struct XtsPageCipher {
    cipher: Xts128<Aes256>,
}

impl XtsPageCipher {
    fn check_len(page: &[u8]) -> Result<()> {
        if page.len() < MIN_SECTOR_LEN {
            return Err(CipherliteError::Crypto(format!(
                "Page region too short for XTS ({} bytes)",
                page.len()
            )));
        }
        Ok(())
    }
}

impl PageCipher for XtsPageCipher {
    fn encrypt_page(&self, pgno: PageNumber, page: &mut [u8]) -> Result<()> {
        Self::check_len(page)?;
        self.cipher
            .encrypt_sector(page, get_tweak_default(u128::from(pgno)));
        Ok(())
    }

    fn decrypt_page(&self, pgno: PageNumber, page: &mut [u8]) -> Result<()> {
        Self::check_len(page)?;
        self.cipher
            .decrypt_sector(page, get_tweak_default(u128::from(pgno)));
        Ok(())
    }
}
