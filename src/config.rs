//! Application configuration
//!
//! Loaded from an optional JSON file; every field has a default. The
//! `SCHOOL_DB` environment variable overrides the database path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RecordsResult;
use crate::sqlite::{school_schema, SqliteConfig};

/// Environment variable that overrides [`AppConfig::db_path`].
pub const DB_PATH_ENV: &str = "SCHOOL_DB";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file (default: "school.db")
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Enforce foreign keys (default: true)
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("school.db")
}

fn default_foreign_keys() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            foreign_keys: default_foreign_keys(),
        }
    }
}

impl AppConfig {
    /// Reads `path` if given, otherwise starts from defaults, then applies
    /// the environment override.
    pub fn load(path: Option<&Path>) -> RecordsResult<Self> {
        let config = match path {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        Ok(config.with_db_override(std::env::var(DB_PATH_ENV).ok()))
    }

    /// Replaces the database path when `value` is a non-empty string.
    pub fn with_db_override(mut self, value: Option<String>) -> Self {
        if let Some(path) = value.filter(|v| !v.trim().is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        self
    }

    /// Store configuration for the school schema.
    pub fn sqlite(&self) -> SqliteConfig {
        SqliteConfig {
            foreign_keys: self.foreign_keys,
            ..SqliteConfig::new(self.db_path.to_string_lossy(), school_schema())
        }
    }
}
