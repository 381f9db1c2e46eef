//! Store configuration
//!
//! Configuration is plain data: the embedding application decides where it
//! comes from. [`StoreConfig::from_toml_str`] and [`StoreConfig::load`] cover
//! the common case of a TOML file.
//!
//! ```toml
//! data_path = "/var/lib/app/tenants"
//! file_extension = "db"
//! busy_timeout_ms = 5000
//! journal_mode = "wal"
//! sync_mode = "full"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use strata_core::errors::StrataError;

use crate::errors::{io_error, Result};

const DEFAULT_FILE_EXTENSION: &str = "db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// SQLite journal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log
    #[default]
    Wal,
    /// Rollback journal, deleted on commit
    Delete,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// SQLite `synchronous` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Sync on every commit
    #[default]
    Full,
    /// Sync at checkpoints only (durable in WAL mode except on power loss)
    Normal,
}

impl SyncMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
        }
    }
}

/// Configuration shared by every tenant file a manager opens
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per tenant
    pub data_path: PathBuf,
    /// Extension of tenant files, without the dot
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// How long a connection waits on a locked file before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub journal_mode: JournalMode,
    #[serde(default)]
    pub sync_mode: SyncMode,
}

fn default_file_extension() -> String {
    DEFAULT_FILE_EXTENSION.to_string()
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl StoreConfig {
    /// Defaults for everything but the data directory
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            file_extension: default_file_extension(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::default(),
            sync_mode: SyncMode::default(),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(source).map_err(|e| StrataError::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| io_error("load_config", e))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_path.as_os_str().is_empty() {
            return Err(StrataError::Config {
                reason: "data_path must not be empty".to_string(),
            });
        }
        if self.file_extension.is_empty()
            || self
                .file_extension
                .contains(|c: char| c == '.' || std::path::is_separator(c))
        {
            return Err(StrataError::Config {
                reason: format!("invalid file_extension '{}'", self.file_extension),
            });
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = StoreConfig::from_toml_str(r#"data_path = "/tmp/tenants""#).unwrap();

        assert_eq!(config, StoreConfig::new("/tmp/tenants"));
        assert_eq!(config.journal_mode, JournalMode::Wal);
        assert_eq!(config.sync_mode, SyncMode::Full);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_full_toml() {
        let config = StoreConfig::from_toml_str(
            r#"
            data_path = "data"
            file_extension = "sqlite"
            busy_timeout_ms = 250
            journal_mode = "delete"
            sync_mode = "normal"
            "#,
        )
        .unwrap();

        assert_eq!(config.file_extension, "sqlite");
        assert_eq!(config.busy_timeout().as_millis(), 250);
        assert_eq!(config.journal_mode.pragma_value(), "DELETE");
        assert_eq!(config.sync_mode.pragma_value(), "NORMAL");
    }

    #[test]
    fn test_missing_data_path_is_config_error() {
        let err = StoreConfig::from_toml_str("busy_timeout_ms = 1").unwrap_err();
        assert_eq!(err.code(), "ERR_CONFIG");
    }

    #[test]
    fn test_extension_with_separator_rejected() {
        let mut config = StoreConfig::new("data");
        config.file_extension = "db/x".to_string();
        assert!(config.validate().is_err());
    }
}
