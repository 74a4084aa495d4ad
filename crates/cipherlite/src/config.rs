//! Connection configuration.
//!
//! Configuration is plain TOML:
//!
//! ```toml
//! page_size = 4096
//!
//! [kdf]
//! memory_kib = 65536
//! iterations = 3
//! parallelism = 1
//! ```
//!
//! The page size of an encrypted file cannot be read before the file is
//! decrypted, so it must be configured identically on every open. The same
//! holds for the KDF parameters of passphrase-derived keys.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CipherliteError, Result};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

const MIN_PAGE_SIZE: usize = 512;
const MAX_PAGE_SIZE: usize = 65536;

/// Argon2id defaults: 64 MB, 3 iterations, single lane.
const DEFAULT_KDF_MEMORY_KIB: u32 = 64 * 1024;
const DEFAULT_KDF_ITERATIONS: u32 = 3;
const DEFAULT_KDF_PARALLELISM: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Page size used for fresh databases and for reading encrypted files.
    pub page_size: usize,
    pub kdf: KdfConfig,
}

/// Argon2id parameters for passphrase-derived keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            kdf: KdfConfig::default(),
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_KDF_MEMORY_KIB,
            iterations: DEFAULT_KDF_ITERATIONS,
            parallelism: DEFAULT_KDF_PARALLELISM,
        }
    }
}

impl CipherConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: CipherConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CipherliteError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CipherliteError::Config(e.to_string()))
    }

    /// Check ranges. Called by every constructor that accepts a config.
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two()
            || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size)
        {
            return Err(CipherliteError::Config(format!(
                "page_size must be a power of two between {} and {} (got {})",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }
        self.kdf.validate()
    }
}

impl KdfConfig {
    pub fn validate(&self) -> Result<()> {
        self.argon2_params().map(|_| ())
    }

    pub(crate) fn argon2_params(&self) -> Result<argon2::Params> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| CipherliteError::Config(format!("Invalid KDF parameters: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CipherConfig::default();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.kdf.memory_kib, 64 * 1024);
        assert_eq!(config.kdf.iterations, 3);
        assert_eq!(config.kdf.parallelism, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CipherConfig::from_toml_str("page_size = 8192\n").unwrap();
        assert_eq!(config.page_size, 8192);
        assert_eq!(config.kdf, KdfConfig::default());
    }

    #[test]
    fn test_full_toml() {
        let config = CipherConfig::from_toml_str(
            r#"
            page_size = 1024

            [kdf]
            memory_kib = 1024
            iterations = 1
            parallelism = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.page_size, 1024);
        assert_eq!(config.kdf.memory_kib, 1024);
        assert_eq!(config.kdf.iterations, 1);
    }

    #[test]
    fn test_rejects_bad_page_size() {
        for size in [0, 100, 256, 3000, 131072] {
            let toml = format!("page_size = {}\n", size);
            let result = CipherConfig::from_toml_str(&toml);
            assert!(
                matches!(result, Err(CipherliteError::Config(_))),
                "page size {} should be rejected",
                size
            );
        }
    }

    #[test]
    fn test_rejects_bad_kdf_params() {
        let result = CipherConfig::from_toml_str("[kdf]\niterations = 0\n");
        assert!(matches!(result, Err(CipherliteError::Config(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let result = CipherConfig::from_toml_str("page_size = \"big\"");
        assert!(matches!(result, Err(CipherliteError::Config(_))));
    }

    #[test]
    fn test_load_and_round_trip() {
        let config = CipherConfig {
            page_size: 2048,
            kdf: KdfConfig {
                memory_kib: 2048,
                iterations: 2,
                parallelism: 1,
            },
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = CipherConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CipherConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(CipherliteError::Config(_))));
    }
}
