//! Runtime configuration.
//!
//! Loaded from an optional `qtask.toml`, then overridden by `QTASK_*`
//! environment variables. Every field has a default, so a missing file is
//! not an error.

use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use crate::service::task_manager::DEFAULT_NAMESPACE_KEY;
use crate::service::transfer::EXPORT_FILE_PREFIX;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

/// Conventional config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "qtask.toml";

const ENV_DB_FILE: &str = "QTASK_DB_FILE";
const ENV_NAMESPACE_KEY: &str = "QTASK_NAMESPACE_KEY";
const ENV_LOG_LEVEL: &str = "QTASK_LOG_LEVEL";
const ENV_LOG_DIR: &str = "QTASK_LOG_DIR";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(toml::de::Error),
    InvalidValue { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidValue { field, message } => write!(f, "invalid `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QTaskConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file name, resolved against the data directory.
    pub db_file: String,
    /// Durable key holding the task snapshot.
    pub namespace_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: "qtask.sqlite3".to_string(),
            namespace_key: DEFAULT_NAMESPACE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging is off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_prefix: EXPORT_FILE_PREFIX.to_string(),
        }
    }
}

impl QTaskConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// [`QTaskConfig::load`] followed by process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `QTASK_*` overrides read through `lookup`, then re-validates.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_DB_FILE) {
            self.storage.db_file = value;
        }
        if let Some(value) = lookup(ENV_NAMESPACE_KEY) {
            self.storage.namespace_key = value;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            self.logging.dir = Some(PathBuf::from(value)).filter(|dir| !dir.as_os_str().is_empty());
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.db_file.trim().is_empty() {
            return Err(invalid("storage.db_file", "must not be empty"));
        }
        if self.storage.namespace_key.trim().is_empty() {
            return Err(invalid("storage.namespace_key", "must not be empty"));
        }
        if self.export.file_prefix.trim().is_empty() {
            return Err(invalid("export.file_prefix", "must not be empty"));
        }
        normalize_level(&self.logging.level)
            .map_err(|err| invalid("logging.level", err.to_string()))?;
        if let Some(dir) = &self.logging.dir {
            normalize_log_dir(dir).map_err(|err| invalid("logging.dir", err.to_string()))?;
        }
        Ok(())
    }

    /// Database path inside `data_dir`.
    pub fn db_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.storage.db_file.trim())
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, QTaskConfig};
    use std::collections::HashMap;
    use std::path::Path;

    #[test]
    fn defaults_are_valid() {
        let config = QTaskConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.storage.namespace_key, "qtask_manager_tasks");
        assert_eq!(config.export.file_prefix, "qtask-backup");
        assert_eq!(config.logging.dir, None);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = QTaskConfig::from_toml_str(
            r#"
[storage]
namespace_key = "work_tasks"

[logging]
level = "warn"
"#,
        )
        .expect("config should parse");

        assert_eq!(config.storage.namespace_key, "work_tasks");
        assert_eq!(config.storage.db_file, "qtask.sqlite3");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn env_overrides_win_and_are_validated() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("QTASK_NAMESPACE_KEY", "env_tasks"),
            ("QTASK_LOG_LEVEL", "error"),
        ]);
        let mut config = QTaskConfig::default();
        config
            .apply_env_overrides(|name| env.get(name).map(|value| value.to_string()))
            .expect("overrides should apply");
        assert_eq!(config.storage.namespace_key, "env_tasks");
        assert_eq!(config.logging.level, "error");

        let err = config
            .apply_env_overrides(|name| (name == "QTASK_LOG_DIR").then(|| "relative/logs".to_string()))
            .expect_err("relative log dir must be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "logging.dir",
                ..
            }
        ));
    }

    #[test]
    fn blank_namespace_key_is_rejected() {
        let err = QTaskConfig::from_toml_str("[storage]\nnamespace_key = \"  \"\n")
            .expect_err("blank key must fail");
        assert!(err.to_string().contains("storage.namespace_key"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = QTaskConfig::load(Path::new("/definitely/not/here/qtask.toml"))
            .expect("missing file should fall back");
        assert_eq!(config, QTaskConfig::default());
    }

    #[test]
    fn db_path_joins_data_dir() {
        let config = QTaskConfig::default();
        assert_eq!(
            config.db_path(Path::new("/data")),
            Path::new("/data/qtask.sqlite3")
        );
    }
}
