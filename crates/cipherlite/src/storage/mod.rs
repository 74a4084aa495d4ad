//! Page-level storage underneath the engine.
//!
//! ## Architecture
//!
//! - **file**: byte-addressed database files (`OsFile`, `MemoryFile`)
//! - **pager**: the page I/O interceptor, encrypts on write and decrypts on read
//! - **state**: per-connection cipher state machine
//! - **format**: first-page validation
//!
//! Nothing in this module knows about SQL; the engine adapter in
//! `crate::connection` moves whole pages in and out of the pager.

pub mod file;
pub mod format;
pub mod pager;
pub mod state;

// Re-export public types
pub use file::{DatabaseFile, MemoryFile, OsFile};
pub use format::{classify_first_page, validate_first_page, HeaderClass, SQLITE_MAGIC};
pub use pager::Pager;
pub use state::{CipherPhase, CipherState};
