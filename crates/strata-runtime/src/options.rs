//! Runtime options resolved from layered configuration
//!
//! [`strata_config`] keeps settings as validated text so it does not depend
//! on this crate. [`RuntimeOptions`] turns them into typed values.

use crate::arch::{AbiTraits, Arch, ArchParseError};
use crate::walker::{UnwindPolicy, UnwindPolicyParseError, WalkContext};
use log::LevelFilter;
use strata_config::Config;
use thiserror::Error;

/// Default number of spill slots given to demo compiled frames
pub const DEFAULT_SPILL_SLOTS: usize = 4;

/// Errors converting configuration into runtime options
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error(transparent)]
    Arch(#[from] ArchParseError),

    #[error(transparent)]
    UnwindPolicy(#[from] UnwindPolicyParseError),

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

/// Typed runtime settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub arch: Arch,
    /// Calling convention used for native frames
    pub abi: AbiTraits,
    pub verify_call_stack: bool,
    pub unwind_policy: UnwindPolicy,
    pub log_level: LevelFilter,
    pub print_vregs: bool,
    pub max_spill_slots: usize,
}

impl RuntimeOptions {
    /// Defaults for `arch`: its default ABI, no verification, every frame.
    ///
    /// # Panics
    ///
    /// Panics for `Arch::None`.
    pub fn for_arch(arch: Arch) -> Self {
        Self {
            arch,
            abi: arch.abi(),
            verify_call_stack: false,
            unwind_policy: UnwindPolicy::All,
            log_level: LevelFilter::Warn,
            print_vregs: false,
            max_spill_slots: DEFAULT_SPILL_SLOTS,
        }
    }

    /// Resolve a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, OptionsError> {
        let arch: Arch = config.arch().parse()?;
        let abi = match (arch, config.arm32_hard_float()) {
            (Arch::Aarch32, Some(hard_float)) => AbiTraits::aarch32(hard_float),
            _ => arch.abi(),
        };
        let log_level = config
            .log_level()
            .parse()
            .map_err(|_| OptionsError::LogLevel(config.log_level().to_string()))?;

        Ok(Self {
            arch,
            abi,
            verify_call_stack: config.verify_call_stack(),
            unwind_policy: config.unwind_policy().parse()?,
            log_level,
            print_vregs: config.print_vregs(),
            max_spill_slots: config.max_spill_slots().unwrap_or(DEFAULT_SPILL_SLOTS),
        })
    }

    /// Apply the ABI and verification settings to a walk context.
    pub fn apply<'a>(&self, ctx: WalkContext<'a>) -> WalkContext<'a> {
        ctx.with_abi(self.abi)
            .with_verify_call_stack(self.verify_call_stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strata_config::ProjectConfig;

    fn config(toml: &str) -> Config {
        Config {
            project: toml::from_str::<ProjectConfig>(toml).unwrap(),
            ..Config::default()
        }
    }

    #[test]
    fn test_from_default_config() {
        if crate::arch::RUNTIME_ARCH == Arch::None {
            return;
        }
        let options = RuntimeOptions::from_config(&Config::default()).unwrap();
        assert_eq!(options.arch, crate::arch::RUNTIME_ARCH);
        assert_eq!(options.unwind_policy, UnwindPolicy::All);
        assert_eq!(options.log_level, LevelFilter::Warn);
        assert_eq!(options.max_spill_slots, DEFAULT_SPILL_SLOTS);
    }

    #[test]
    fn test_arm32_hard_float_override() {
        let options = RuntimeOptions::from_config(&config(
            r#"
[runtime]
arch = "arm"
arm32_hard_float = true
unwind_policy = "only-inlined"

[logging]
level = "trace"

[dump]
print_vregs = true
max_spill_slots = 10
"#,
        ))
        .unwrap();

        assert_eq!(options.abi, AbiTraits::aarch32(true));
        assert_eq!(options.unwind_policy, UnwindPolicy::OnlyInlined);
        assert_eq!(options.log_level, LevelFilter::Trace);
        assert!(options.print_vregs);
        assert_eq!(options.max_spill_slots, 10);
    }

    #[test]
    fn test_hard_float_ignored_off_arm() {
        let options = RuntimeOptions::from_config(&config(
            r#"
[runtime]
arch = "x86"
arm32_hard_float = true
"#,
        ))
        .unwrap();

        assert_eq!(options.abi, Arch::X86.abi());
    }
}
