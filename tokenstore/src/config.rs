// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokenstore_db::ConnectionOptions;

use crate::error::{Error, IoContext, Result};

/// Environment variable naming a TOML configuration file.
pub const CONFIG_ENV: &str = "TOKENSTORE_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per token
    pub base_dir: PathBuf,

    /// How long a statement waits on another connection's lock
    pub busy_timeout_ms: u64,

    /// Log every SQL statement at trace level
    pub trace_sql: bool,

    /// Do not report lock contention through the error handler
    pub quiet_busy: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./tokens"),
            busy_timeout_ms: 15_000,
            trace_sql: false,
            quiet_busy: false,
        }
    }
}

impl StoreConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: StoreConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `TOKENSTORE_CONFIG`, or the defaults when unset.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.busy_timeout_ms == 0 {
            return Err(Error::config("busy_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Connection settings for the token named `label`.
    pub fn connection_options(&self, label: &str) -> ConnectionOptions {
        ConnectionOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            trace: self.trace_sql,
            quiet_busy: self.quiet_busy,
            label: label.to_owned(),
        }
    }
}
