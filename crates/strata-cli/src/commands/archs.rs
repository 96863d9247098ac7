//! Architecture table command

use anyhow::Result;
use serde::Serialize;
use strata_runtime::frame::layout::OffsetUnit;
use strata_runtime::{Arch, CFrameLayout};

#[derive(Debug, Serialize)]
struct ArchRow {
    name: &'static str,
    display_name: &'static str,
    pointer_size: usize,
    gp_arg_regs: usize,
    fp_arg_regs: usize,
    hard_float: bool,
    callee_gp: String,
    callee_fp: String,
    caller_gp: usize,
    caller_fp: usize,
    frame_slots: usize,
    supports_osr: bool,
}

fn range(arch: Arch, is_fp: bool) -> String {
    let regs = arch.callee_regs(is_fp);
    if regs.is_empty() {
        "-".to_string()
    } else {
        format!("{}-{}", regs.first, regs.last)
    }
}

fn rows() -> Vec<ArchRow> {
    Arch::ALL
        .iter()
        .map(|&arch| {
            let abi = arch.abi();
            ArchRow {
                name: arch.name(),
                display_name: arch.display_name(),
                pointer_size: arch.pointer_size(),
                gp_arg_regs: abi.num_gp_arg_regs,
                fp_arg_regs: abi.num_fp_arg_regs,
                hard_float: abi.hard_float,
                callee_gp: range(arch, false),
                callee_fp: range(arch, true),
                caller_gp: arch.caller_regs_count(false),
                caller_fp: arch.caller_regs_count(true),
                frame_slots: CFrameLayout::new(arch, 0).frame_size(OffsetUnit::Slots),
                supports_osr: arch.supports_osr(),
            }
        })
        .collect()
}

pub fn run(json: bool) -> Result<()> {
    let rows = rows();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!(
        "{:<8}{:>5}{:>5}{:>5}  {:<10}{:<10}{:>7}{:>7}{:>7}  osr",
        "arch", "ptr", "gp", "fp", "callee", "callee_fp", "caller", "c_fp", "slots"
    );
    for row in rows {
        println!(
            "{:<8}{:>5}{:>5}{:>5}  {:<10}{:<10}{:>7}{:>7}{:>7}  {}",
            row.name,
            row.pointer_size,
            row.gp_arg_regs,
            row.fp_arg_regs,
            row.callee_gp,
            row.callee_fp,
            row.caller_gp,
            row.caller_fp,
            row.frame_slots,
            if row.supports_osr { "yes" } else { "no" }
        );
    }
    Ok(())
}
