//! Per-connection cipher state machine.
//!
//! ```text
//!            set_key             first page ok
//! Unkeyed ───────────► Keyed ───────────────► Keyed (validated)
//!    │                   │
//!    │ first page bad    │ first page bad
//!    ▼                   ▼
//!  Failed ◄──────────────┘
//! ```
//!
//! An unkeyed connection also validates its first page (plaintext magic).
//! `Failed` is terminal: every later operation reports `NotADatabase`.

use tracing::{info, warn};

use crate::crypto::{
    CipherProvider, KeyDirective, PageCipher, PreparedKey, SALT_LENGTH,
};
use crate::error::{CipherliteError, Result};

/// Externally visible phase of a connection's cipher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherPhase {
    Unkeyed,
    Keyed { validated: bool },
    Failed,
}

/// Key material in use once the file salt is known.
pub struct ActiveCipher {
    salt: [u8; SALT_LENGTH],
    cipher: Box<dyn PageCipher>,
}

impl ActiveCipher {
    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    pub fn cipher(&self) -> &dyn PageCipher {
        self.cipher.as_ref()
    }
}

impl std::fmt::Debug for ActiveCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveCipher")
            .field("cipher", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug)]
pub struct CipherState {
    provider_name: String,
    key: Option<PreparedKey>,
    active: Option<ActiveCipher>,
    /// First page checked (or file found empty). Applies to unkeyed connections too.
    validated: bool,
    failed: bool,
}

impl CipherState {
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            key: None,
            active: None,
            validated: false,
            failed: false,
        }
    }

    pub fn phase(&self) -> CipherPhase {
        if self.failed {
            CipherPhase::Failed
        } else if self.key.is_some() {
            CipherPhase::Keyed {
                validated: self.validated,
            }
        } else {
            CipherPhase::Unkeyed
        }
    }

    /// Apply a key directive. Legal once, before the first page access.
    ///
    /// `KeyDirective::None` is accepted and leaves the connection unkeyed.
    ///
    /// # Errors
    ///
    /// - `KeyAlreadySet` if a key was already set
    /// - `Misuse` if pages were already accessed without a key
    /// - `NotADatabase` if the connection already failed validation
    /// - `InvalidKeyFormat` / `InvalidInput` from the resolver
    pub fn set_key(&mut self, directive: KeyDirective, provider: &dyn CipherProvider) -> Result<()> {
        self.ensure_usable()?;
        if self.key.is_some() {
            return Err(CipherliteError::KeyAlreadySet);
        }
        if self.validated {
            return Err(CipherliteError::Misuse(
                "The cipher key must be set before the first page access".to_string(),
            ));
        }

        match PreparedKey::prepare(directive, provider)? {
            Some(prepared) => {
                info!(
                    provider = provider.name(),
                    derived = prepared.is_derived(),
                    "cipher key set"
                );
                self.key = Some(prepared);
            }
            None => info!("empty key directive, connection stays unkeyed"),
        }
        Ok(())
    }

    /// Resolve the prepared key against the file salt and build the page cipher.
    pub fn activate(&mut self, provider: &dyn CipherProvider, salt: [u8; SALT_LENGTH]) -> Result<()> {
        self.ensure_usable()?;
        if self.active.is_some() {
            return Ok(());
        }
        let prepared = self
            .key
            .as_ref()
            .ok_or_else(|| CipherliteError::Misuse("No cipher key set".to_string()))?;
        let key = prepared.resolve(provider, &salt)?;
        let cipher = provider.page_cipher(&key)?;
        self.active = Some(ActiveCipher { salt, cipher });
        Ok(())
    }

    pub fn active(&self) -> Option<&ActiveCipher> {
        self.active.as_ref()
    }

    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn mark_validated(&mut self) {
        if !self.validated {
            info!(keyed = self.is_keyed(), "first page validated");
        }
        self.validated = true;
    }

    /// Enter the terminal failed state. Key material is dropped.
    pub fn fail(&mut self) {
        if !self.failed {
            warn!(keyed = self.is_keyed(), "first page validation failed");
        }
        self.failed = true;
        self.active = None;
    }

    pub fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(CipherliteError::NotADatabase);
        }
        Ok(())
    }

    /// Provider identifier, available once a key is set.
    pub fn provider_name(&self) -> Option<&str> {
        self.key.as_ref().map(|_| self.provider_name.as_str())
    }
}
