//! Human-readable call stack dumps

use super::StackWalker;
use crate::frame::layout::CFrameLayout;
use crate::vreg::{VRegInfo, VRegLocation, VRegValue};
use std::fmt::{self, Write};

impl StackWalker<'_> {
    /// Walks the rest of the stack, writing one line per frame and, with
    /// `print_vregs`, one line per live virtual register.
    pub fn dump<W: Write>(mut self, out: &mut W, print_vregs: bool) -> fmt::Result {
        writeln!(out, "Strata call stack:")?;
        let mut index = 0usize;
        while self.has_frame() {
            self.write_frame_line(out, index)?;
            if print_vregs {
                let compiled = self.is_cframe();
                for (info, value) in self.vregs() {
                    write_vreg_line(out, &info, &value, compiled)?;
                }
            }
            self.next_frame();
            index += 1;
        }
        Ok(())
    }

    fn write_frame_line<W: Write>(&self, out: &mut W, index: usize) -> fmt::Result {
        let method = self.method();
        write!(out, "{index:>4}: {:016x} in {}", self.fp(), method.name)?;
        if self.is_native() {
            return writeln!(out, " (native)");
        }
        match self.cframe() {
            Some(frame) => {
                let osr = if frame.is_osr() { "/osr" } else { "" };
                let inlined = if self.is_inlined() { ", inlined" } else { "" };
                write!(out, " (compiled{osr}: npc={:#x}{inlined})", self.native_pc())?;
            }
            None => write!(out, " (managed)")?,
        }
        if let Some(line) = method.source_line(self.bytecode_pc()) {
            write!(out, " at line {line}")?;
        }
        writeln!(out)
    }

    /// Writes the raw layout of the current frame.
    pub fn dump_frame<W: Write>(&self, out: &mut W) -> fmt::Result {
        if let Some(frame) = self.cframe() {
            let layout = CFrameLayout::new(self.ctx.arch, 0);
            let max_slot = self
                .vregs()
                .filter(|(info, _)| info.location == VRegLocation::Slot && info.value >= 0)
                .map(|(info, _)| info.value as usize)
                .max()
                .unwrap_or(0)
                .max(layout.first_spill_slot());
            return frame.dump(out, max_slot);
        }
        if let Some(frame) = self.iframe() {
            writeln!(
                out,
                "IFRAME: addr={:#x}, method={}, bytecode_offset={}, nregs={}",
                frame.address(),
                self.method().name,
                frame.bytecode_offset(),
                frame.num_vregs()
            )?;
            for (info, value) in self.vregs() {
                write_vreg_line(out, &info, &value, false)?;
            }
        }
        Ok(())
    }
}

fn write_vreg_line<W: Write>(out: &mut W, info: &VRegInfo, value: &VRegValue, compiled: bool) -> fmt::Result {
    write!(
        out,
        "     {:>4} = {:<20}{:<12}",
        info.name(),
        value.render(info.vtype),
        info.vtype.as_str()
    )?;
    if compiled {
        writeln!(out, "{}:{}", info.location.as_str(), info.value)
    } else {
        writeln!(out, "-")
    }
}
