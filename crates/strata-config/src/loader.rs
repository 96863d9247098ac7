//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::ProjectConfig;
use crate::{validate_choice, ConfigError, ConfigResult, ARCH_NAMES, LOG_LEVELS};
use std::env;
use std::path::{Path, PathBuf};

/// File name searched for when walking up from the working directory
pub const PROJECT_CONFIG_FILE: &str = "strata.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.strata/config.toml) - lowest priority
/// 2. Project config (./strata.toml) - overrides global
/// 3. Environment variables (STRATA_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where strata.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use `path` instead of ~/.strata/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find strata.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        // A broken or missing home directory never blocks a project
        let global_config = self.load_global_config().unwrap_or_default();

        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config), or the default config with no
    /// root when no strata.toml exists above `start_dir`
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.strata/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognised variables: STRATA_ARCH, STRATA_VERIFY_CALL_STACK, STRATA_LOG
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(arch) = env::var("STRATA_ARCH") {
            validate_choice("STRATA_ARCH", &arch, ARCH_NAMES).map_err(|_| {
                ConfigError::InvalidEnv {
                    var: "STRATA_ARCH".to_string(),
                    value: arch.clone(),
                }
            })?;
            config.runtime_mut().arch = Some(arch);
        }

        if let Ok(verify) = env::var("STRATA_VERIFY_CALL_STACK") {
            config.runtime_mut().verify_call_stack =
                Some(parse_env_bool("STRATA_VERIFY_CALL_STACK", &verify)?);
        }

        if let Ok(level) = env::var("STRATA_LOG") {
            let level = level.to_lowercase();
            validate_choice("STRATA_LOG", &level, LOG_LEVELS).map_err(|_| {
                ConfigError::InvalidEnv {
                    var: "STRATA_LOG".to_string(),
                    value: level.clone(),
                }
            })?;
            config.logging_mut().level = Some(level);
        }

        Ok(config)
    }

    /// Get the global configuration directory (~/.strata)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".strata"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env_bool(var: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Effective architecture name (project > "host")
    pub fn arch(&self) -> &str {
        self.project.arch().unwrap_or("host")
    }

    /// Effective unwind policy (project > "all")
    pub fn unwind_policy(&self) -> &str {
        self.project.unwind_policy().unwrap_or("all")
    }

    /// Whether walkers verify the stack on creation
    pub fn verify_call_stack(&self) -> bool {
        self.project
            .runtime
            .as_ref()
            .and_then(|r| r.verify_call_stack)
            .unwrap_or(false)
    }

    /// Explicit hard-float choice for 32-bit ARM, if any
    pub fn arm32_hard_float(&self) -> Option<bool> {
        self.project.runtime.as_ref().and_then(|r| r.arm32_hard_float)
    }

    /// Effective log level (project > global > "warn")
    pub fn log_level(&self) -> &str {
        self.project
            .log_level()
            .or_else(|| self.global.log_level())
            .unwrap_or("warn")
    }

    /// Effective vreg printing (project > global > false)
    pub fn print_vregs(&self) -> bool {
        self.project
            .dump
            .as_ref()
            .and_then(|d| d.print_vregs)
            .or_else(|| self.global.dump.as_ref().and_then(|d| d.print_vregs))
            .unwrap_or(false)
    }

    /// Effective spill slot count (project > global)
    pub fn max_spill_slots(&self) -> Option<usize> {
        self.project
            .dump
            .as_ref()
            .and_then(|d| d.max_spill_slots)
            .or_else(|| self.global.dump.as_ref().and_then(|d| d.max_spill_slots))
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has strata.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
