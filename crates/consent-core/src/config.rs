//! Ledger configuration
//!
//! Loaded from TOML, then overridden by `CONSENT_LEDGER_*` environment
//! variables, then validated.
//!
//! ```toml
//! separator_policy = "reject"
//! max_cells = 100000
//!
//! [storage]
//! backend = "file"
//! path = "/var/lib/consent/cells.json"
//! ```

use crate::errors::{LedgerError, Result};
use crate::identifiers::SeparatorPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables recognised by [`LedgerConfig::merge_with_env`]
pub const ENV_PREFIX: &str = "CONSENT_LEDGER_";

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Cells live in process memory only
    #[default]
    Memory,
    /// Cells are persisted to a JSON snapshot file
    File,
}

impl StorageBackend {
    /// Parse a backend name
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(LedgerError::invalid(format!(
                "unknown storage backend '{other}', expected 'memory' or 'file'"
            ))),
        }
    }
}

/// Storage section of the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to open
    pub backend: StorageBackend,
    /// Snapshot path, required by the file backend
    pub path: Option<PathBuf>,
}

/// Top-level ledger configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Treatment of identifiers containing the key separator
    pub separator_policy: SeparatorPolicy,
    /// Maximum number of cells the store may allocate
    pub max_cells: Option<u64>,
    /// Storage backend settings
    pub storage: StorageConfig,
}

impl LedgerConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from `CONSENT_LEDGER_*` pairs
    ///
    /// Setting `STORAGE_PATH` without `STORAGE_BACKEND` selects the file
    /// backend.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut backend_set = false;
        let mut path_set = false;

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match name {
                "SEPARATOR_POLICY" => self.separator_policy = SeparatorPolicy::parse(value)?,
                "MAX_CELLS" => {
                    let limit = value.trim().parse::<u64>().map_err(|e| {
                        LedgerError::invalid(format!("{ENV_PREFIX}MAX_CELLS '{value}': {e}"))
                    })?;
                    self.max_cells = Some(limit);
                }
                "STORAGE_BACKEND" => {
                    self.storage.backend = StorageBackend::parse(value)?;
                    backend_set = true;
                }
                "STORAGE_PATH" => {
                    self.storage.path = Some(PathBuf::from(value));
                    path_set = true;
                }
                _ => tracing::debug!(variable = name, "ignoring unknown ledger variable"),
            }
        }

        if path_set && !backend_set {
            self.storage.backend = StorageBackend::File;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_cells == Some(0) {
            return Err(LedgerError::invalid("max_cells must be greater than zero"));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(LedgerError::invalid(
                "storage.path is required when storage.backend = \"file\"",
            ));
        }
        Ok(())
    }
}
