//! Page I/O interceptor.
//!
//! The pager sits between the storage engine's page reads/writes and the
//! underlying file. With a key active it encrypts every page on write and
//! decrypts on read; without one, bytes pass through untouched. The first
//! read of page 1 is handed to the format validator.
//!
//! Encrypted page 1 keeps the 16-byte salt in place of the magic:
//!
//! ```text
//!             Engine view                       On disk
//!        ┌──────────────────┐            ┌──────────────────┐
//!        │ magic (16)       │            │ salt (16)        │
//!        ├──────────────────┤  ───────►  ├──────────────────┤
//!        │ header + content │            │ XTS(bytes 16..,  │
//!        │                  │            │     tweak = 1)   │
//!        └──────────────────┘            └──────────────────┘
//! ```
//!
//! All other pages are encrypted whole with their page number as tweak.

use std::sync::Arc;

use tracing::debug;

use crate::crypto::{CipherProvider, KeyDirective, PageNumber, SALT_LENGTH};
use crate::error::{CipherliteError, Result};
use crate::storage::file::DatabaseFile;
use crate::storage::format::{self, HEADER_LENGTH, MAGIC_LENGTH, SQLITE_MAGIC};
use crate::storage::state::{CipherPhase, CipherState};

pub struct Pager<F: DatabaseFile> {
    file: F,
    provider: Arc<dyn CipherProvider>,
    state: CipherState,
    configured_page_size: usize,
    /// Set by `open`; `None` until the first page access.
    page_size: Option<usize>,
}

impl<F: DatabaseFile> Pager<F> {
    pub fn new(file: F, provider: Arc<dyn CipherProvider>, page_size: usize) -> Self {
        let state = CipherState::new(provider.name());
        Self {
            file,
            provider,
            state,
            configured_page_size: page_size,
            page_size: None,
        }
    }

    pub fn set_key(&mut self, directive: KeyDirective) -> Result<()> {
        self.state.set_key(directive, self.provider.as_ref())
    }

    pub fn phase(&self) -> CipherPhase {
        self.state.phase()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.state.provider_name()
    }

    pub fn is_keyed(&self) -> bool {
        self.state.is_keyed()
    }

    pub fn is_open(&self) -> bool {
        self.page_size.is_some()
    }

    pub fn ensure_usable(&self) -> Result<()> {
        self.state.ensure_usable()
    }

    /// Move the connection to the failed state.
    pub fn fail(&mut self) {
        self.state.fail();
    }

    pub fn page_size(&self) -> Result<usize> {
        self.page_size
            .ok_or_else(|| CipherliteError::Misuse("Pager is not open".to_string()))
    }

    /// First page access: fix the page size and arm the cipher.
    ///
    /// A keyed pager takes the page size from configuration and the salt from
    /// the first 16 bytes of the file, generating a fresh salt for an empty
    /// file. An unkeyed pager reads the page size from the plaintext header.
    /// Calling `open` again only recounts pages.
    ///
    /// # Returns
    ///
    /// The number of pages in the file. Page 1 is validated by the first
    /// `read_page` that follows; an empty file counts as validated.
    ///
    /// # Errors
    ///
    /// - `CipherliteError::NotADatabase` if the file is too short, has no
    ///   magic while unkeyed, or is not a whole number of pages
    /// - `CipherliteError::Crypto` if the salt cannot be generated
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use cipherlite::storage::{MemoryFile, Pager};
    /// use cipherlite::{KdfConfig, KeyDirective, XtsProvider};
    ///
    /// let provider = Arc::new(XtsProvider::new(KdfConfig::default()));
    /// let mut pager = Pager::new(MemoryFile::new(), provider, 4096);
    /// pager.set_key(KeyDirective::raw_bytes(&[7u8; 32]))?;
    /// assert_eq!(pager.open()?, 0);
    /// # Ok::<(), cipherlite::CipherliteError>(())
    /// ```
    pub fn open(&mut self) -> Result<PageNumber> {
        self.state.ensure_usable()?;
        if self.page_size.is_some() {
            return self.page_count();
        }

        let len = self.file.len()?;
        let page_size = if self.state.is_keyed() {
            self.open_keyed(len)?
        } else {
            self.open_plaintext(len)?
        };

        if len % page_size as u64 != 0 {
            self.state.fail();
            return Err(CipherliteError::NotADatabase);
        }

        self.page_size = Some(page_size);
        if len == 0 {
            self.state.mark_validated();
        }
        debug!(page_size, file_len = len, keyed = self.state.is_keyed(), "pager opened");
        self.page_count()
    }

    fn open_keyed(&mut self, len: u64) -> Result<usize> {
        let page_size = self.configured_page_size;
        let mut salt = [0u8; SALT_LENGTH];
        if len == 0 {
            getrandom::getrandom(&mut salt).map_err(|e| {
                CipherliteError::Crypto(format!("Failed to generate salt: {}", e))
            })?;
        } else if len < page_size as u64 {
            self.state.fail();
            return Err(CipherliteError::NotADatabase);
        } else {
            self.file.read_at(0, &mut salt)?;
        }
        self.state.activate(self.provider.as_ref(), salt)?;
        Ok(page_size)
    }

    fn open_plaintext(&mut self, len: u64) -> Result<usize> {
        if len == 0 {
            return Ok(self.configured_page_size);
        }
        if len < HEADER_LENGTH as u64 {
            self.state.fail();
            return Err(CipherliteError::NotADatabase);
        }
        let mut prefix = [0u8; HEADER_LENGTH];
        self.file.read_at(0, &mut prefix)?;
        match format::plaintext_page_size(&prefix) {
            Some(page_size) => Ok(page_size),
            None => {
                self.state.fail();
                Err(CipherliteError::NotADatabase)
            }
        }
    }

    pub fn page_count(&self) -> Result<PageNumber> {
        let page_size = self.page_size()? as u64;
        let count = self.file.len()? / page_size;
        PageNumber::try_from(count)
            .map_err(|_| CipherliteError::Storage("Too many pages".to_string()))
    }

    fn offset(&self, pgno: PageNumber) -> Result<u64> {
        if pgno == 0 {
            return Err(CipherliteError::Storage(
                "Page numbers start at 1".to_string(),
            ));
        }
        Ok(u64::from(pgno - 1) * self.page_size()? as u64)
    }

    /// Read one page, decrypting it if a key is active.
    ///
    /// Page 1 is validated before any other page is returned: reading page
    /// `n > 1` first reads and checks page 1, so a wrong key fails here
    /// rather than handing out garbage.
    ///
    /// # Errors
    ///
    /// - `CipherliteError::NotADatabase` if page 1 fails validation (the
    ///   pager then stays failed)
    /// - `CipherliteError::Misuse` if the pager is not open
    pub fn read_page(&mut self, pgno: PageNumber) -> Result<Vec<u8>> {
        self.state.ensure_usable()?;
        let page_size = self.page_size()?;
        let offset = self.offset(pgno)?;

        if pgno != 1 && !self.state.is_validated() {
            self.read_page(1)?;
        }

        let mut page = vec![0u8; page_size];
        self.file.read_at(offset, &mut page)?;

        if let Some(active) = self.state.active() {
            if pgno == 1 {
                active
                    .cipher()
                    .decrypt_page(pgno, &mut page[MAGIC_LENGTH..])?;
                page[..MAGIC_LENGTH].copy_from_slice(SQLITE_MAGIC);
            } else {
                active.cipher().decrypt_page(pgno, &mut page)?;
            }
        }

        if pgno == 1 && !self.state.is_validated() {
            match format::validate_first_page(&page, self.state.is_keyed(), page_size) {
                Ok(_) => self.state.mark_validated(),
                Err(e) => {
                    self.state.fail();
                    return Err(e);
                }
            }
        }

        Ok(page)
    }

    /// Write one page, encrypting it if a key is active.
    pub fn write_page(&mut self, pgno: PageNumber, data: &[u8]) -> Result<()> {
        self.state.ensure_usable()?;
        if !self.state.is_validated() {
            return Err(CipherliteError::Misuse(
                "Pages cannot be written before the first page is validated".to_string(),
            ));
        }
        let page_size = self.page_size()?;
        if data.len() != page_size {
            return Err(CipherliteError::Storage(format!(
                "Page {} is {} bytes, expected {}",
                pgno,
                data.len(),
                page_size
            )));
        }
        let offset = self.offset(pgno)?;

        let mut page = data.to_vec();
        if let Some(active) = self.state.active() {
            if pgno == 1 {
                active
                    .cipher()
                    .encrypt_page(pgno, &mut page[MAGIC_LENGTH..])?;
                page[..MAGIC_LENGTH].copy_from_slice(active.salt());
            } else {
                active.cipher().encrypt_page(pgno, &mut page)?;
            }
        }

        self.file.write_at(offset, &page)
    }

    /// Drop pages past `page_count`.
    pub fn truncate(&mut self, page_count: PageNumber) -> Result<()> {
        self.state.ensure_usable()?;
        let page_size = self.page_size()? as u64;
        self.file.set_len(u64::from(page_count) * page_size)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }
}
