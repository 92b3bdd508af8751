//! Debugger configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{DebuggerError, Result};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "NEO_DEBUGGER_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebuggerConfig {
    /// Items drained from an iterator when a stack is serialised.
    pub max_iterator_result_items: usize,
    /// Gas limit of every engine, in datoshi.
    pub max_gas: i64,
    /// Block timestamp new sessions report, in milliseconds.
    pub default_timestamp: Option<u64>,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            max_iterator_result_items: 100,
            max_gas: 2_000_000_000,
            default_timestamp: None,
        }
    }
}

impl DebuggerConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DebuggerError::ConfigError(e.to_string()).into())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DebuggerError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load from `explicit`, else `$NEO_DEBUGGER_CONFIG`, else the user config
    /// directory. Falls back to defaults when no file is found.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(PathBuf::from(path));
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("neo-debugger").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_keys_use_defaults() {
        let config = DebuggerConfig::from_toml("max_gas = 10").unwrap();
        assert_eq!(config.max_gas, 10);
        assert_eq!(config.max_iterator_result_items, 100);
        assert_eq!(config.default_timestamp, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = DebuggerConfig::from_toml("max_gass = 10").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::ConfigError(_))
        ));
    }

    #[test]
    fn explicit_path_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_iterator_result_items = 5\ndefault_timestamp = 1700000000000").unwrap();
        let config = DebuggerConfig::discover(Some(file.path())).unwrap();
        assert_eq!(config.max_iterator_result_items, 5);
        assert_eq!(config.default_timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn unreadable_path_is_config_error() {
        let err = DebuggerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("configuration error"));
    }
}
