//! Global Configuration (~/.strata/config.toml)
//!
//! Handles user-level preferences stored in `~/.strata/config.toml`.

use crate::project::{DumpConfig, LoggingConfig};
use crate::{read_file, ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.strata/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default logging preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Default dump preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump: Option<DumpConfig>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = read_file(path)?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(logging) = &self.logging {
            logging.validate()?;
        }
        Ok(())
    }

    /// Get the global config file path (~/.strata/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".strata").join("config.toml"))
    }

    /// Get the default log level
    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if let Some(logging) = &other.logging {
            self.logging
                .get_or_insert_with(LoggingConfig::default)
                .merge(logging);
        }
        if let Some(dump) = &other.dump {
            self.dump.get_or_insert_with(DumpConfig::default).merge(dump);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_config() {
        let toml = r#"
[logging]
level = "info"

[dump]
print_vregs = false
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level(), Some("info"));
    }

    #[test]
    fn test_runtime_section_is_project_only() {
        let toml = r#"
[runtime]
arch = "arm64"
"#;
        assert!(toml::from_str::<GlobalConfig>(toml).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = GlobalConfig {
            logging: Some(LoggingConfig {
                level: Some("loud".to_string()),
            }),
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = GlobalConfig::default();
        let override_config = GlobalConfig {
            logging: Some(LoggingConfig {
                level: Some("trace".to_string()),
            }),
            ..Default::default()
        };

        base.merge(&override_config);
        assert_eq!(base.log_level(), Some("trace"));
    }
}
