//! Project Configuration (strata.toml)
//!
//! Handles project-level configuration stored in `strata.toml` at the project root.

use crate::{read_file, validate_choice, ConfigError, ConfigResult};
use crate::{ARCH_NAMES, LOG_LEVELS, UNWIND_POLICIES};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Project configuration from strata.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Stack walking and calling-convention settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,

    /// Logging configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Debug dump configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump: Option<DumpConfig>,
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Target architecture ("arm", "arm64", "x86", "x86_64", "host")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Use the hard-float variant of the 32-bit ARM calling convention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm32_hard_float: Option<bool>,

    /// Verify every reference on the stack when a walker is created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_call_stack: Option<bool>,

    /// Inlined frame handling ("all", "skip-inlined", "only-inlined")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwind_policy: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Maximum level ("error", "warn", "info", "debug", "trace")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Debug dump configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DumpConfig {
    /// Print virtual registers under each frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print_vregs: Option<bool>,

    /// Spill slots reserved by the demo compiled frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_spill_slots: Option<usize>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = read_file(path)?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(runtime) = &self.runtime {
            runtime.validate()?;
        }
        if let Some(logging) = &self.logging {
            logging.validate()?;
        }
        Ok(())
    }

    /// Get the configured architecture name, if present
    pub fn arch(&self) -> Option<&str> {
        self.runtime.as_ref().and_then(|r| r.arch.as_deref())
    }

    /// Get the configured unwind policy, if present
    pub fn unwind_policy(&self) -> Option<&str> {
        self.runtime.as_ref().and_then(|r| r.unwind_policy.as_deref())
    }

    /// Get the configured log level, if present
    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    /// Get or create the runtime section
    pub fn runtime_mut(&mut self) -> &mut RuntimeConfig {
        self.runtime.get_or_insert_with(RuntimeConfig::default)
    }

    /// Get or create the logging section
    pub fn logging_mut(&mut self) -> &mut LoggingConfig {
        self.logging.get_or_insert_with(LoggingConfig::default)
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if let Some(runtime) = &other.runtime {
            self.runtime_mut().merge(runtime);
        }
        if let Some(logging) = &other.logging {
            self.logging_mut().merge(logging);
        }
        if let Some(dump) = &other.dump {
            self.dump.get_or_insert_with(DumpConfig::default).merge(dump);
        }
    }
}

impl RuntimeConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(arch) = &self.arch {
            validate_choice("runtime.arch", arch, ARCH_NAMES)?;
        }
        if let Some(policy) = &self.unwind_policy {
            validate_choice("runtime.unwind_policy", policy, UNWIND_POLICIES)?;
        }
        Ok(())
    }

    fn merge(&mut self, other: &RuntimeConfig) {
        if other.arch.is_some() {
            self.arch = other.arch.clone();
        }
        if other.arm32_hard_float.is_some() {
            self.arm32_hard_float = other.arm32_hard_float;
        }
        if other.verify_call_stack.is_some() {
            self.verify_call_stack = other.verify_call_stack;
        }
        if other.unwind_policy.is_some() {
            self.unwind_policy = other.unwind_policy.clone();
        }
    }
}

impl LoggingConfig {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        if let Some(level) = &self.level {
            validate_choice("logging.level", level, LOG_LEVELS)?;
        }
        Ok(())
    }

    pub(crate) fn merge(&mut self, other: &LoggingConfig) {
        if other.level.is_some() {
            self.level = other.level.clone();
        }
    }
}

impl DumpConfig {
    pub(crate) fn merge(&mut self, other: &DumpConfig) {
        if other.print_vregs.is_some() {
            self.print_vregs = other.print_vregs;
        }
        if other.max_spill_slots.is_some() {
            self.max_spill_slots = other.max_spill_slots;
        }
    }
}
