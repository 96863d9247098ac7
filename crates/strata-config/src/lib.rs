//! Strata Configuration System
//!
//! Provides configuration management for the Strata runtime and tools:
//! - Project configuration (strata.toml)
//! - Global user configuration (~/.strata/config.toml)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.strata/config.toml)
//! 2. Project config (./strata.toml)
//! 3. Environment variables (STRATA_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use strata_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("walking {} stacks", config.arch());
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid value '{value}' in environment variable {var}")]
    InvalidEnv { var: String, value: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Architecture names accepted by `runtime.arch`
pub const ARCH_NAMES: &[&str] = &["arm", "arm64", "x86", "x86_64", "host"];

/// Policies accepted by `runtime.unwind_policy`
pub const UNWIND_POLICIES: &[&str] = &["all", "skip-inlined", "only-inlined"];

/// Levels accepted by `logging.level`
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Check `value` against a closed set of names
pub(crate) fn validate_choice(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected one of {}, got '{}'", allowed.join(", "), value),
    })
}

/// Read a config file, mapping a missing file to [`ConfigError::NotFound`]
pub(crate) fn read_file(path: &std::path::Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::IoError(e)
        }
    })
}

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use project::{DumpConfig, LoggingConfig, ProjectConfig, RuntimeConfig};
