//! Database connections.
//!
//! A [`Connection`] pairs one SQLite engine (an in-memory `rusqlite`
//! database) with one [`Pager`]. Opening a connection does not touch the
//! file; the key, if any, is set next, and the first statement loads the
//! file page by page through the pager. Committed changes are written back
//! as whole pages, and only the pages that changed.
//!
//! ```no_run
//! use cipherlite::{Connection, KeyDirective};
//!
//! let mut conn = Connection::open("secrets.db".as_ref())?;
//! conn.set_key(KeyDirective::derived("meow"))?;
//! conn.execute_batch("CREATE TABLE notes (body TEXT)")?;
//! conn.execute("INSERT INTO notes (body) VALUES (?1)", ["hello"])?;
//! conn.close()?;
//! # Ok::<(), cipherlite::CipherliteError>(())
//! ```

use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use rusqlite::serialize::OwnedData;
use rusqlite::{DatabaseName, Params, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::config::CipherConfig;
use crate::crypto::{CipherProvider, KeyDirective, PageNumber, XtsProvider};
use crate::error::{CipherliteError, Result};
use crate::storage::file::{DatabaseFile, OsFile};
use crate::storage::format;
use crate::storage::pager::Pager;
use crate::storage::state::CipherPhase;

pub struct Connection<F: DatabaseFile = OsFile> {
    id: Uuid,
    pager: Pager<F>,
    engine: rusqlite::Connection,
    /// Plaintext image as last loaded or flushed.
    persisted: Vec<u8>,
    loaded: bool,
}

impl Connection<OsFile> {
    /// Open a database file with the default configuration and provider.
    ///
    /// The file is created if missing. Nothing is read until the first statement.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, &CipherConfig::default())
    }

    pub fn open_with_config(path: &Path, config: &CipherConfig) -> Result<Self> {
        let provider = Arc::new(XtsProvider::new(config.kdf.clone()));
        Self::open_with(path, config, provider)
    }

    /// Open with an explicitly constructed cipher provider.
    ///
    /// The provider is shared, so one instance can serve many connections.
    /// Nothing is read from the file until the first statement; set the key
    /// with [`Connection::set_key`] before that.
    ///
    /// # Arguments
    ///
    /// * `path` - Database file, created empty if it does not exist
    /// * `config` - Page size and KDF parameters; must match the ones the
    ///   file was created with
    /// * `provider` - Cipher provider used for key derivation and pages
    ///
    /// # Errors
    ///
    /// Returns `CipherliteError::Config` for an invalid configuration and
    /// `CipherliteError::Io` if the file cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use std::sync::Arc;
    /// use cipherlite::{CipherConfig, Connection, KeyDirective, XtsProvider};
    ///
    /// let config = CipherConfig::default();
    /// let provider = Arc::new(XtsProvider::new(config.kdf.clone()));
    ///
    /// let mut conn = Connection::open_with(Path::new("notes.db"), &config, provider)?;
    /// conn.set_key(KeyDirective::derived("correct horse battery staple"))?;
    /// conn.execute_batch("CREATE TABLE IF NOT EXISTS notes (body TEXT)")?;
    /// conn.close()?;
    /// # Ok::<(), cipherlite::CipherliteError>(())
    /// ```
    pub fn open_with(
        path: &Path,
        config: &CipherConfig,
        provider: Arc<dyn CipherProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let file = OsFile::open(path)?;
        Self::with_file(file, config, provider)
    }
}

impl<F: DatabaseFile> Connection<F> {
    /// Build a connection over any [`DatabaseFile`].
    pub fn with_file(file: F, config: &CipherConfig, provider: Arc<dyn CipherProvider>) -> Result<Self> {
        config.validate()?;
        let engine = rusqlite::Connection::open_in_memory()?;
        let id = Uuid::new_v4();
        debug!(connection = %id, provider = provider.name(), "connection opened");

        Ok(Self {
            id,
            pager: Pager::new(file, provider, config.page_size),
            engine,
            persisted: Vec::new(),
            loaded: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Set the cipher key. Legal once, before the first statement.
    ///
    /// # Errors
    ///
    /// - `CipherliteError::InvalidKeyFormat` for a malformed raw key
    /// - `CipherliteError::InvalidInput` for an empty passphrase
    /// - `CipherliteError::KeyAlreadySet` on a second key
    /// - `CipherliteError::Misuse` after the file was read without a key
    pub fn set_key(&mut self, directive: KeyDirective) -> Result<()> {
        self.pager.set_key(directive)
    }

    /// Identifier of the active cipher provider; `None` until a key is set.
    pub fn cipher_provider(&self) -> Option<&str> {
        self.pager.provider_name()
    }

    pub fn is_encrypted(&self) -> bool {
        self.pager.is_keyed()
    }

    pub fn phase(&self) -> CipherPhase {
        self.pager.phase()
    }

    /// Execute one statement. Changes are written to the file unless a
    /// transaction is open.
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> Result<usize> {
        self.ensure_loaded()?;
        let result = self.engine.execute(sql, params);
        self.finish_statement(result)
    }

    /// Execute several statements separated by semicolons.
    ///
    /// Outside a transaction each statement commits on its own. If a later
    /// statement fails, the ones before it stay committed and are still
    /// written to the file before the error is returned.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.ensure_loaded()?;
        let result = self.engine.execute_batch(sql);
        self.finish_statement(result)
    }

    pub fn query_row<T, P, M>(&mut self, sql: &str, params: P, map: M) -> Result<T>
    where
        P: Params,
        M: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.ensure_loaded()?;
        let result = self.engine.query_row(sql, params, map);
        self.check(result)
    }

    pub fn query_rows<T, P, M>(&mut self, sql: &str, params: P, map: M) -> Result<Vec<T>>
    where
        P: Params,
        M: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.ensure_loaded()?;
        let result = Self::collect_rows(&self.engine, sql, params, map);
        self.check(result)
    }

    /// Run `work` in a transaction; committed pages are flushed afterwards.
    ///
    /// The transaction rolls back if `work` returns an error.
    pub fn transaction<T, W>(&mut self, work: W) -> Result<T>
    where
        W: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.ensure_loaded()?;
        let result = Self::run_transaction(&mut self.engine, work);
        let value = self.fail_on_not_a_database(result)?;
        self.flush()?;
        Ok(value)
    }

    /// Write every page that changed since the last load or flush.
    ///
    /// The file's page size is fixed when it is first opened. If the engine's
    /// page size is changed afterwards (`PRAGMA page_size` followed by
    /// `VACUUM`), every flush fails with `CipherliteError::Storage` and the
    /// file keeps its last flushed contents.
    pub fn flush(&mut self) -> Result<()> {
        self.pager.ensure_usable()?;
        if !self.loaded {
            return Ok(());
        }
        if !self.engine.is_autocommit() {
            return Err(CipherliteError::Misuse(
                "Cannot flush while a transaction is open".to_string(),
            ));
        }

        let image = self.snapshot()?;
        let page_size = self.pager.page_size()?;
        if image.len() % page_size != 0 {
            return Err(CipherliteError::Storage(format!(
                "Database image of {} bytes is not a whole number of {}-byte pages",
                image.len(),
                page_size
            )));
        }
        if !image.is_empty() && format::header_page_size(&image) != Some(page_size) {
            return Err(CipherliteError::Storage(
                "Engine page size differs from the file page size".to_string(),
            ));
        }

        let old_count = self.persisted.len() / page_size;
        let new_count = image.len() / page_size;
        let mut written = 0usize;
        for (index, page) in image.chunks(page_size).enumerate() {
            let start = index * page_size;
            if self.persisted.get(start..start + page_size) == Some(page) {
                continue;
            }
            self.pager.write_page(to_page_number(index + 1)?, page)?;
            written += 1;
        }
        if new_count < old_count {
            self.pager.truncate(to_page_number(new_count)?)?;
        }
        if written > 0 || new_count < old_count {
            self.pager.sync()?;
        }

        debug!(
            connection = %self.id,
            written,
            pages = new_count,
            "flushed database image"
        );
        self.persisted = image;
        Ok(())
    }

    /// Flush and close. An open transaction is rolled back first.
    ///
    /// A connection that failed validation closes without touching the file.
    pub fn close(mut self) -> Result<()> {
        if self.pager.ensure_usable().is_ok() {
            if !self.engine.is_autocommit() {
                self.engine.execute_batch("ROLLBACK")?;
            }
            self.flush()?;
        }
        debug!(connection = %self.id, "connection closed");
        self.engine.close().map_err(|(_, e)| CipherliteError::from(e))
    }

    /// First page access: read the file through the pager into the engine.
    fn ensure_loaded(&mut self) -> Result<()> {
        self.pager.ensure_usable()?;
        if self.loaded {
            return Ok(());
        }

        let page_count = self.pager.open()?;
        let page_size = self.pager.page_size()?;

        if page_count == 0 {
            self.engine
                .pragma_update(None, "page_size", page_size as i64)?;
        } else {
            let mut image = Vec::with_capacity(page_count as usize * page_size);
            for pgno in 1..=page_count {
                image.extend_from_slice(&self.pager.read_page(pgno)?);
            }
            match self.install_image(&image) {
                Ok(()) => {}
                Err(CipherliteError::NotADatabase) => {
                    self.pager.fail();
                    return Err(CipherliteError::NotADatabase);
                }
                Err(e) => return Err(e),
            }
            self.persisted = image;
        }

        debug!(
            connection = %self.id,
            pages = page_count,
            page_size,
            "loaded database image"
        );
        self.loaded = true;
        Ok(())
    }

    fn install_image(&mut self, image: &[u8]) -> Result<()> {
        let owned = owned_data_from_bytes(image)?;
        self.engine.deserialize(DatabaseName::Main, owned, false)?;
        // Make the engine parse the header and schema now rather than on the
        // caller's first statement.
        self.engine
            .query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        let page_count: i64 = self
            .engine
            .query_row("PRAGMA page_count", [], |row| row.get(0))?;
        if page_count == 0 {
            return Ok(Vec::new());
        }
        let data = self.engine.serialize(DatabaseName::Main)?;
        Ok(data.to_vec())
    }

    fn flush_if_autocommit(&mut self) -> Result<()> {
        if self.engine.is_autocommit() {
            self.flush()?;
        }
        Ok(())
    }

    /// Convert an engine result, failing the connection if the engine
    /// rejected the decoded pages.
    fn check<T>(&mut self, result: rusqlite::Result<T>) -> Result<T> {
        self.fail_on_not_a_database(result.map_err(CipherliteError::from))
    }

    fn fail_on_not_a_database<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(result, Err(CipherliteError::NotADatabase)) {
            self.pager.fail();
        }
        result
    }

    /// Flush after a statement whether or not it succeeded: statements that
    /// committed before a failure must reach the file too.
    fn finish_statement<T>(&mut self, result: rusqlite::Result<T>) -> Result<T> {
        let result = self.check(result);
        if self.pager.ensure_usable().is_err() {
            return result;
        }
        let flushed = self.flush_if_autocommit();
        let value = result?;
        flushed?;
        Ok(value)
    }

    fn run_transaction<T, W>(engine: &mut rusqlite::Connection, work: W) -> Result<T>
    where
        W: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = engine.transaction()?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn collect_rows<T, P, M>(
        engine: &rusqlite::Connection,
        sql: &str,
        params: P,
        map: M,
    ) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        M: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = engine.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<rusqlite::Result<Vec<T>>>();
        rows
    }
}

impl<F: DatabaseFile> std::fmt::Debug for Connection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("loaded", &self.loaded)
            .finish()
    }
}

fn to_page_number(value: usize) -> Result<PageNumber> {
    PageNumber::try_from(value)
        .map_err(|_| CipherliteError::Storage("Too many pages".to_string()))
}

/// Copy a plaintext image into a buffer SQLite can take ownership of.
fn owned_data_from_bytes(image: &[u8]) -> Result<OwnedData> {
    if image.is_empty() {
        return Err(CipherliteError::Storage("Database image is empty".to_string()));
    }

    let size: i32 = image
        .len()
        .try_into()
        .map_err(|_| CipherliteError::Storage("Database image too large".to_string()))?;

    // SAFETY: sqlite3_malloc returns either null or `size` writable bytes.
    let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
    let ptr = NonNull::new(raw)
        .ok_or_else(|| CipherliteError::Storage("SQLite allocation failed".to_string()))?;

    // SAFETY: `ptr` is a fresh allocation of exactly `image.len()` bytes, so it
    // cannot overlap `image`. OwnedData frees it with sqlite3_free.
    unsafe {
        std::ptr::copy_nonoverlapping(image.as_ptr(), ptr.as_ptr(), image.len());
        Ok(OwnedData::from_raw_nonnull(ptr, image.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfConfig;
    use crate::storage::file::MemoryFile;
    use crate::storage::format::SQLITE_MAGIC;

    const RAW_KEY: &str = "06fde20554abf0e09997a5df9bf6b44d343ed5bb6fea54b2788ef577e0f27434";

    fn config() -> CipherConfig {
        CipherConfig {
            page_size: 1024,
            kdf: KdfConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        }
    }

    fn connect(file: &MemoryFile) -> Connection<MemoryFile> {
        let config = config();
        let provider = Arc::new(XtsProvider::new(config.kdf.clone()));
        Connection::with_file(file.clone(), &config, provider).unwrap()
    }

    fn count(conn: &mut Connection<MemoryFile>) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
    }

    #[test]
    fn test_open_does_not_touch_file() {
        let file = MemoryFile::new();
        let conn = connect(&file);
        assert_eq!(conn.phase(), CipherPhase::Unkeyed);
        conn.close().unwrap();
        assert!(file.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_unkeyed_file_starts_with_magic() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        conn.close().unwrap();

        let bytes = file.snapshot().unwrap();
        assert_eq!(&bytes[..16], SQLITE_MAGIC);
        assert_eq!(bytes.len() % 1024, 0);
    }

    #[test]
    fn test_keyed_round_trip() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        conn.execute("INSERT INTO t (x) VALUES (?1)", [42]).unwrap();
        conn.close().unwrap();

        assert_ne!(&file.snapshot().unwrap()[..16], SQLITE_MAGIC);

        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        let x: i64 = conn
            .query_row("SELECT x FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(x, 42);
        assert_eq!(conn.phase(), CipherPhase::Keyed { validated: true });
    }

    #[test]
    fn test_wrong_key_leaves_connection_failed() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::derived("meow")).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        conn.close().unwrap();
        let before = file.snapshot().unwrap();

        let mut conn = connect(&file);
        conn.set_key(KeyDirective::derived("woof")).unwrap();
        assert!(matches!(count(&mut conn), Err(CipherliteError::NotADatabase)));
        assert_eq!(conn.phase(), CipherPhase::Failed);
        assert!(matches!(
            conn.execute_batch("CREATE TABLE u (y)"),
            Err(CipherliteError::NotADatabase)
        ));
        conn.close().unwrap();

        assert_eq!(file.snapshot().unwrap(), before);
    }

    #[test]
    fn test_set_key_after_first_statement() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        assert!(matches!(
            conn.set_key(KeyDirective::derived("meow")),
            Err(CipherliteError::Misuse(_))
        ));

        let mut keyed = connect(&MemoryFile::new());
        keyed.set_key(KeyDirective::derived("meow")).unwrap();
        keyed.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        assert!(matches!(
            keyed.set_key(KeyDirective::derived("meow")),
            Err(CipherliteError::KeyAlreadySet)
        ));
    }

    #[test]
    fn test_cipher_provider_introspection() {
        let mut conn = connect(&MemoryFile::new());
        assert_eq!(conn.cipher_provider(), None);
        assert!(!conn.is_encrypted());

        conn.set_key(KeyDirective::derived("meow")).unwrap();
        assert_eq!(conn.cipher_provider(), Some("rustcrypto"));
        assert!(conn.is_encrypted());
    }

    #[test]
    fn test_only_changed_pages_are_rewritten() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        conn.execute_batch(
            "CREATE TABLE a (x BLOB); CREATE TABLE b (y BLOB);",
        )
        .unwrap();
        conn.execute("INSERT INTO a (x) VALUES (zeroblob(500))", [])
            .unwrap();
        conn.execute("INSERT INTO b (y) VALUES (zeroblob(500))", [])
            .unwrap();
        let before = file.snapshot().unwrap();

        conn.execute("INSERT INTO b (y) VALUES (zeroblob(10))", [])
            .unwrap();
        let after = file.snapshot().unwrap();
        assert_eq!(before.len(), after.len());

        let changed = before
            .chunks(1024)
            .zip(after.chunks(1024))
            .filter(|(old, new)| old != new)
            .count();
        assert!(changed >= 1);
        assert!(changed < before.len() / 1024);
    }

    #[test]
    fn test_shrinking_database_truncates_file() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        conn.execute_batch("CREATE TABLE t (x BLOB)").unwrap();
        conn.execute("INSERT INTO t (x) VALUES (zeroblob(20000))", [])
            .unwrap();
        let grown = file.snapshot().unwrap().len();

        conn.execute_batch("DELETE FROM t; VACUUM;").unwrap();
        let shrunk = file.snapshot().unwrap().len();
        assert!(shrunk < grown);
        conn.close().unwrap();

        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        assert_eq!(
            conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get::<_, i64>(0))
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_transaction_commit_and_rollback() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::derived("meow")).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        conn.transaction(|tx| {
            tx.execute("INSERT INTO t (x) VALUES (1)", [])?;
            tx.execute("INSERT INTO t (x) VALUES (2)", [])?;
            Ok(())
        })
        .unwrap();

        let result: Result<()> = conn.transaction(|tx| {
            tx.execute("INSERT INTO t (x) VALUES (3)", [])?;
            Err(CipherliteError::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(count(&mut conn).unwrap(), 2);
        conn.close().unwrap();

        let mut conn = connect(&file);
        conn.set_key(KeyDirective::derived("meow")).unwrap();
        assert_eq!(count(&mut conn).unwrap(), 2);
    }

    #[test]
    fn test_open_transaction_is_not_flushed() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        conn.execute_batch("BEGIN; INSERT INTO t (x) VALUES (1);")
            .unwrap();
        assert!(matches!(conn.flush(), Err(CipherliteError::Misuse(_))));
        conn.close().unwrap();

        let mut conn = connect(&file);
        assert_eq!(count(&mut conn).unwrap(), 0);
    }

    #[test]
    fn test_query_rows() {
        let mut conn = connect(&MemoryFile::new());
        conn.execute_batch(
            "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2), (3);",
        )
        .unwrap();
        let rows: Vec<i64> = conn
            .query_rows("SELECT x FROM t ORDER BY x", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_batch_keeps_earlier_statements() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        let result = conn.execute_batch("INSERT INTO t (x) VALUES (1); INSERT INTO missing VALUES (1);");
        assert!(matches!(result, Err(CipherliteError::Sqlite { .. })));
        assert_eq!(count(&mut conn).unwrap(), 1);
        assert_eq!(conn.phase(), CipherPhase::Keyed { validated: true });
        drop(conn);

        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        assert_eq!(count(&mut conn).unwrap(), 1);
    }

    #[test]
    fn test_failed_statement_leaves_file_readable() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.execute_batch("CREATE TABLE t (x INTEGER UNIQUE)").unwrap();
        conn.execute("INSERT INTO t (x) VALUES (?1)", [1]).unwrap();
        assert!(conn.execute("INSERT INTO t (x) VALUES (?1)", [1]).is_err());
        drop(conn);

        let mut conn = connect(&file);
        assert_eq!(count(&mut conn).unwrap(), 1);
    }

    #[test]
    fn test_not_a_database_inside_transaction_fails_connection() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::derived("meow")).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        let result: Result<()> = conn.transaction(|tx| {
            tx.execute("INSERT INTO t (x) VALUES (1)", [])?;
            Err(CipherliteError::NotADatabase)
        });
        assert!(matches!(result, Err(CipherliteError::NotADatabase)));
        assert_eq!(conn.phase(), CipherPhase::Failed);
        assert!(matches!(count(&mut conn), Err(CipherliteError::NotADatabase)));
    }

    #[test]
    fn test_page_size_change_never_corrupts_file() {
        let file = MemoryFile::new();
        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        conn.execute("INSERT INTO t (x) VALUES (1)", []).unwrap();
        let before = file.snapshot().unwrap();

        // Whether the engine honours the new size or not, the file must stay
        // readable with the configured page size.
        match conn.execute_batch("PRAGMA page_size = 4096; VACUUM;") {
            Ok(()) => {}
            Err(CipherliteError::Storage(_)) => {
                assert_eq!(file.snapshot().unwrap(), before);
                assert!(matches!(conn.flush(), Err(CipherliteError::Storage(_))));
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
        drop(conn);

        let mut conn = connect(&file);
        conn.set_key(KeyDirective::raw_hex(RAW_KEY)).unwrap();
        assert_eq!(count(&mut conn).unwrap(), 1);
    }
}
