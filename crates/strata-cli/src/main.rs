use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use log::debug;
use std::io;
use std::path::PathBuf;
use strata_runtime::{RuntimeOptions, UnwindPolicy};

mod commands;
mod logger;
mod settings;

/// Stack introspection and calling-convention inspector for the Strata VM.
///
/// Strata describes how compiled, interpreted and native frames are laid out
/// on each supported architecture and how arguments cross between them.
/// This CLI prints those layouts and walks example stacks.
///
/// EXAMPLES:
///     strata layout --arch arm64            Compiled frame regions
///     strata args --arch x86_64 --shorty VIJ Native argument placement
///     strata marshal --arch arm --shorty VFD Argument area sizes
///     strata archs                          Architecture table
///     strata demo --arch arm64 --vregs      Walk a mixed stack
///
/// ENVIRONMENT VARIABLES:
///     STRATA_ARCH               Default architecture
///     STRATA_VERIFY_CALL_STACK  Verify stacks before walking them
///     STRATA_LOG                Log level (error, warn, info, debug, trace)
///     STRATA_JSON               Set to '1' for JSON output by default
#[derive(Parser)]
#[command(name = "strata")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Use this strata.toml instead of searching from the working directory
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled frame layout of an architecture
    ///
    /// Lists every frame region with its frame-pointer slot, size and
    /// stack-pointer slot.
    ///
    /// EXAMPLES:
    ///     strata layout --arch arm64
    ///     strata layout --arch x86 --spills 6 --json
    #[command(visible_alias = "l")]
    Layout {
        /// Target architecture (arm, arm64, x86, x86_64, host)
        #[arg(long, short = 'a')]
        arch: Option<String>,
        /// Requested spill slots (rounded up for register pairing)
        #[arg(long, short = 's')]
        spills: Option<usize>,
        /// Output as JSON
        #[arg(long, env = "STRATA_JSON")]
        json: bool,
    },

    /// Show where a native method finds its managed arguments
    ///
    /// EXAMPLES:
    ///     strata args --arch arm64 --shorty VF
    ///     strata args --arch arm --shorty VFDF --hard-float
    ///     strata args --arch x86_64 --shorty VIL --instance
    #[command(visible_alias = "a")]
    Args {
        #[arg(long, short = 'a')]
        arch: Option<String>,
        /// Signature: return type then parameters (e.g. VIJ)
        #[arg(long)]
        shorty: String,
        /// The method takes a receiver
        #[arg(long)]
        instance: bool,
        /// Use the VFP calling convention on 32-bit ARM
        #[arg(long)]
        hard_float: bool,
        #[arg(long, env = "STRATA_JSON")]
        json: bool,
    },

    /// Size the argument areas of a call signature
    ///
    /// EXAMPLES:
    ///     strata marshal --arch arm64 --shorty VIIIIIIIII
    ///     strata marshal --arch arm --shorty VFD --hard-float
    #[command(visible_alias = "m")]
    Marshal {
        #[arg(long, short = 'a')]
        arch: Option<String>,
        #[arg(long)]
        shorty: String,
        #[arg(long)]
        hard_float: bool,
        #[arg(long, env = "STRATA_JSON")]
        json: bool,
    },

    /// List supported architectures
    Archs {
        #[arg(long, env = "STRATA_JSON")]
        json: bool,
    },

    /// Build a mixed interpreted/compiled stack and walk it
    ///
    /// EXAMPLES:
    ///     strata demo
    ///     strata demo --arch arm --policy skip-inlined
    ///     strata demo --arch x86_64 --vregs --verify
    #[command(visible_alias = "d")]
    Demo {
        #[arg(long, short = 'a')]
        arch: Option<String>,
        /// Frames to report: all, skip-inlined, only-inlined
        #[arg(long, short = 'p')]
        policy: Option<String>,
        /// Print virtual registers under each frame
        #[arg(long)]
        vregs: bool,
        /// Verify every reference on the stack before walking it
        #[arg(long)]
        verify: bool,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     strata completions bash > /etc/bash_completion.d/strata
    ///     strata completions zsh > ~/.zfunc/_strata
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = settings::load(cli.config.as_deref())?;
    let options = settings::resolve(&config)?;
    logger::init(logger::verbosity(options.log_level, cli.verbose))
        .context("Failed to install logger")?;
    if let Some(root) = config.project_root() {
        debug!("using project config under {}", root.display());
    }

    match cli.command {
        Commands::Layout { arch, spills, json } => {
            let options = settings::with_arch(options, arch.as_deref())?;
            let spills = spills.unwrap_or(options.max_spill_slots);
            commands::layout::run(options.arch, spills, json)?;
        }
        Commands::Args {
            arch,
            shorty,
            instance,
            hard_float,
            json,
        } => {
            let options = settings::with_arch(options, arch.as_deref())?;
            let options = settings::with_hard_float(options, hard_float);
            commands::args::run(options.abi, &shorty, instance, json)?;
        }
        Commands::Marshal {
            arch,
            shorty,
            hard_float,
            json,
        } => {
            let options = settings::with_arch(options, arch.as_deref())?;
            let options = settings::with_hard_float(options, hard_float);
            commands::marshal::run(options.abi, &shorty, json)?;
        }
        Commands::Archs { json } => {
            commands::archs::run(json)?;
        }
        Commands::Demo {
            arch,
            policy,
            vregs,
            verify,
        } => {
            let mut options: RuntimeOptions = settings::with_arch(options, arch.as_deref())?;
            if let Some(policy) = policy {
                options.unwind_policy = policy.parse::<UnwindPolicy>()?;
            }
            options.print_vregs |= vregs;
            options.verify_call_stack |= verify;
            commands::demo::run(&options)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut io::stdout());
        }
    }

    Ok(())
}
