//! Frame layout command - print the compiled frame regions of an architecture

use anyhow::Result;
use serde::Serialize;
use strata_runtime::frame::layout::{LayoutRegion, OffsetUnit};
use strata_runtime::{Arch, CFrameLayout};

#[derive(Debug, Serialize)]
struct LayoutReport {
    arch: &'static str,
    slot_size: usize,
    frame_slots: usize,
    frame_bytes: usize,
    first_spill_slot: usize,
    regions: Vec<LayoutRegion>,
}

fn report(arch: Arch, spills: usize) -> LayoutReport {
    let layout = CFrameLayout::new(arch, spills);
    LayoutReport {
        arch: arch.name(),
        slot_size: layout.slot_size(),
        frame_slots: layout.frame_size(OffsetUnit::Slots),
        frame_bytes: layout.frame_size(OffsetUnit::Bytes),
        first_spill_slot: layout.first_spill_slot(),
        regions: layout.regions(),
    }
}

/// Render the region table of `arch` with `spills` requested spill slots.
pub fn render(arch: Arch, spills: usize) -> String {
    let report = report(arch, spills);
    let mut out = format!(
        "{} frame: {} slots, {} bytes ({}-byte slots)\n",
        arch.display_name(),
        report.frame_slots,
        report.frame_bytes,
        report.slot_size
    );
    out.push_str(&format!(
        "{:<16}{:>8}{:>8}{:>10}\n",
        "region", "fp_slot", "size", "sp_slot"
    ));
    for region in &report.regions {
        out.push_str(&format!(
            "{:<16}{:>8}{:>8}{:>10}\n",
            region.name, region.start, region.size, region.sp_offset
        ));
    }
    out
}

pub fn run(arch: Arch, spills: usize, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report(arch, spills))?);
    } else {
        print!("{}", render(arch, spills));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_every_region() {
        let text = render(Arch::Aarch64, 0);
        assert!(text.starts_with("AARCH64 frame: "));
        for name in ["return_address", "prev_frame", "callee_gp", "caller_fp", "spills"] {
            assert!(text.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_report_matches_layout() {
        let report = report(Arch::X86_64, 3);
        let layout = CFrameLayout::new(Arch::X86_64, 3);
        assert_eq!(report.frame_bytes, layout.frame_size(OffsetUnit::Bytes));
        assert_eq!(report.regions, layout.regions());
    }
}
