//! Marshal command - argument area sizes for a call signature

use super::args::describe;
use anyhow::{Context, Result};
use serde::Serialize;
use strata_runtime::{AbiTraits, ArgCounter, Shorty};

#[derive(Debug, Serialize)]
pub struct MarshalReport {
    pub arch: &'static str,
    pub hard_float: bool,
    pub shorty: String,
    pub locations: Vec<String>,
    pub gpr_arg_bytes: usize,
    pub fpr_arg_bytes: usize,
    pub stack_arg_bytes: usize,
    pub stack_spilled_args: usize,
    pub stack_space_size: usize,
}

pub fn report(abi: AbiTraits, shorty: &str) -> Result<MarshalReport> {
    let shorty: Shorty = shorty
        .parse()
        .with_context(|| format!("Invalid shorty '{shorty}'"))?;
    let pointer_size = abi.pointer_size();
    let mut counter = ArgCounter::new(abi);
    let locations = shorty
        .params()
        .iter()
        .filter_map(|ty| ty.arg_kind(pointer_size))
        .map(|kind| describe(counter.count_kind(kind)))
        .collect();

    Ok(MarshalReport {
        arch: abi.arch.name(),
        hard_float: abi.hard_float,
        shorty: shorty.to_string(),
        locations,
        gpr_arg_bytes: counter.gpr_arg_bytes(),
        fpr_arg_bytes: counter.fpr_arg_bytes(),
        stack_arg_bytes: counter.stack_arg_bytes(),
        stack_spilled_args: counter.stack_spilled_args(),
        stack_space_size: counter.stack_space_size(),
    })
}

pub fn render(report: &MarshalReport) -> String {
    format!(
        "{} {}: [{}]\n  gpr {} bytes, fpr {} bytes, stack {} bytes ({} args)\n  reserve {} bytes\n",
        report.arch,
        report.shorty,
        report.locations.join(", "),
        report.gpr_arg_bytes,
        report.fpr_arg_bytes,
        report.stack_arg_bytes,
        report.stack_spilled_args,
        report.stack_space_size
    )
}

pub fn run(abi: AbiTraits, shorty: &str, json: bool) -> Result<()> {
    let report = report(abi, shorty)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_runtime::Arch;

    #[test]
    fn test_nine_ints_spill_one_on_arm64() {
        let report = report(Arch::Aarch64.abi(), "VIIIIIIIII").unwrap();
        assert_eq!(report.gpr_arg_bytes, 64);
        assert_eq!(report.stack_arg_bytes, 8);
        assert_eq!(report.stack_spilled_args, 1);
        assert_eq!(report.locations.last().map(String::as_str), Some("stack+0"));
    }

    #[test]
    fn test_soft_float_arm_uses_core_registers() {
        let report = report(AbiTraits::aarch32(false), "VFD").unwrap();
        assert_eq!(report.fpr_arg_bytes, 0);
        assert_eq!(report.locations, vec!["gpr+0", "gpr+8"]);
    }

    #[test]
    fn test_hard_float_arm_back_fills_singles() {
        let report = report(AbiTraits::aarch32(true), "VFDF").unwrap();
        assert_eq!(report.locations, vec!["fpr+0", "fpr+8", "fpr+4"]);
    }
}
