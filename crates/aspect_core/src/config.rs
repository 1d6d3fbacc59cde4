//! Engine configuration stored as JSON next to the database.
//!
//! # Responsibility
//! - Describe which backend the engine targets and how it logs.
//! - Create a default SQLite configuration on first start.
//!
//! # Invariants
//! - A missing config file is replaced by the default, never an error.
//! - Relative SQLite paths resolve against the config directory.

use crate::db::Dialect;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "aspect_store.json";
pub const DEFAULT_SQLITE_FILE: &str = "aspect_store.sqlite3";
pub const DEFAULT_PAGE_SIZE: u32 = 500;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "config io at `{}`: {source}", path.display()),
            Self::Parse(err) => write!(f, "config parse: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// Absolute directory for rolling log files.
    pub dir: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy_timeout_ms: Option<u64>,
}

impl EngineConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            logging: None,
            page_size: Some(DEFAULT_PAGE_SIZE),
            busy_timeout_ms: Some(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `aspect_store.json` from `base_dir`, writing the default SQLite
    /// config first when the file does not exist.
    pub fn load_or_init(base_dir: &Path) -> Result<Self, ConfigError> {
        fs::create_dir_all(base_dir).map_err(|source| ConfigError::Io {
            path: base_dir.to_path_buf(),
            source,
        })?;
        let config_path = base_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::load(&config_path);
        }
        let default = Self::default_sqlite(DEFAULT_SQLITE_FILE);
        let payload = serde_json::to_string_pretty(&default)?;
        fs::write(&config_path, payload).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        Ok(default)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == Some(0) {
            return Err(ConfigError::Invalid("page_size must be positive".to_string()));
        }
        match &self.database {
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } if url.trim().is_empty() => {
                Err(ConfigError::Invalid(format!(
                    "{} backend needs a url",
                    self.backend_name()
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self.database {
            DatabaseConfig::Sqlite { .. } => Dialect::Sqlite,
            DatabaseConfig::Postgres { .. } => Dialect::Postgres,
            DatabaseConfig::Mysql { .. } => Dialect::Mysql,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.dialect().name()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> Result<PathBuf, ConfigError> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let candidate =
                    PathBuf::from(path.clone().unwrap_or_else(|| DEFAULT_SQLITE_FILE.to_string()));
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(ConfigError::Invalid(format!(
                "{} config has no sqlite path",
                self.backend_name()
            ))),
        }
    }
}
