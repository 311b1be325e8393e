//! Connection settings for the SQLite driver.
//!
//! Settings are read once, when the provider is built, so that a misconfiguration fails before
//! the first statement runs.

use std::{path::PathBuf, time::Duration};

pub const DB_PATH_VAR: &str = "MEMBER_DB_PATH";
pub const BUSY_TIMEOUT_VAR: &str = "MEMBER_DB_BUSY_TIMEOUT_MS";

const DEFAULT_DB_PATH: &str = "./data/member.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file (default: `./data/member.db`)
    pub path: PathBuf,
    /// How long a connection waits on a locked database (default: 5s)
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl SqliteConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_VAR) {
            if path.trim().is_empty() {
                return Err(ConfigError::Empty { field: DB_PATH_VAR });
            }
            config.path = PathBuf::from(path);
        }

        if let Some(timeout) = lookup(BUSY_TIMEOUT_VAR) {
            let millis = timeout
                .trim()
                .parse::<u64>()
                .map_err(|err| ConfigError::Invalid {
                    field: BUSY_TIMEOUT_VAR,
                    message: format!("{timeout:?} is not a number of milliseconds: {err}"),
                })?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error for {field}: must not be empty")]
    Empty { field: &'static str },

    #[error("configuration error for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}
