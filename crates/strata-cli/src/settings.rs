//! Options resolution for the CLI
//!
//! Settings come from `strata.toml` (searched upward from the working
//! directory), the global config, `STRATA_*` variables, then command flags.

use anyhow::{Context, Result};
use std::path::Path;
use strata_config::{Config, ConfigLoader};
use strata_runtime::{AbiTraits, Arch, RuntimeOptions};

/// Load layered configuration. An explicit `--config` file must exist.
pub fn load(config_file: Option<&Path>) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    match config_file {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to read working directory")?;
            loader.load_from_directory(&cwd).context("Failed to load strata.toml")
        }
    }
}

/// Typed options for a loaded configuration.
pub fn resolve(config: &Config) -> Result<RuntimeOptions> {
    RuntimeOptions::from_config(config).context("Invalid runtime configuration")
}

/// Apply an `--arch` flag. The configured ABI only survives when the
/// architecture stays the same.
pub fn with_arch(mut options: RuntimeOptions, arch: Option<&str>) -> Result<RuntimeOptions> {
    if let Some(name) = arch {
        let arch: Arch = name.parse()?;
        if arch != options.arch {
            options.arch = arch;
            options.abi = arch.abi();
        }
    }
    Ok(options)
}

/// Apply a `--hard-float` flag; only 32-bit ARM has a choice.
pub fn with_hard_float(mut options: RuntimeOptions, hard_float: bool) -> RuntimeOptions {
    if hard_float && options.arch == Arch::Aarch32 {
        options.abi = AbiTraits::aarch32(true);
    }
    options
}
