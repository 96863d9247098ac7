//! Where each callee-saved register of a compiled frame currently lives
//!
//! A callee-saved register keeps its value across a call only because some
//! younger frame spilled it in its prologue. To read register `r` as frame
//! `P` sees it, the walker needs the save slot of the nearest younger frame
//! that saved `r`. [`CalleeStorage`] records one such slot pointer per
//! callee-saved register and is threaded from frame to frame:
//!
//! - if the younger frame saved `r`, the pointer is recomputed against that
//!   frame's save area
//! - otherwise it is inherited unchanged from the younger frame's storage
//!
//! Save areas are packed: only the registers in the saver's mask occupy
//! slots, highest register first, directly below the area pointer.

use crate::arch::Arch;
use crate::error::{stack_corruption, StackCorruption};
use crate::memory::{Address, StackMemory};

/// Upper bound on callee-saved GP + FP registers of any architecture.
pub const MAX_CALLEE_REGS: usize = 64;

/// A register save area written by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveArea {
    /// Registers are stored below this address
    pub callee_stack: Address,
    pub gp_mask: u32,
    pub fp_mask: u32,
}

impl SaveArea {
    /// A bridge frame saves every callee-saved register of the architecture.
    pub fn full(arch: Arch, callee_stack: Address) -> Self {
        Self {
            callee_stack,
            gp_mask: arch.callee_regs_mask(false),
            fp_mask: arch.callee_regs_mask(true),
        }
    }

    /// Address of the save slot for `reg` in this area, `None` if the area
    /// does not contain it.
    pub fn slot_address(&self, arch: Arch, reg: u32, is_fp: bool) -> Option<Address> {
        let ptr = arch.pointer_size() as u64;
        let gp_count = arch.callee_regs_count(false) as u64;
        let mut start = self.callee_stack.wrapping_sub(gp_count * ptr);
        let (mask, count) = if is_fp {
            let fp_count = arch.callee_regs_count(true) as u64;
            start = start.wrapping_sub(fp_count * ptr);
            (self.fp_mask, fp_count)
        } else {
            (self.gp_mask, gp_count)
        };
        if reg >= 32 || mask & (1u32 << reg) == 0 {
            return None;
        }
        let above = u64::from((mask >> reg).count_ones());
        Some(start.wrapping_add((count - above) * ptr))
    }
}

#[derive(Clone, Copy)]
pub struct CalleeStorage {
    slots: [Option<Address>; MAX_CALLEE_REGS],
    /// Callee-saved registers the owning frame spills itself
    pub callee_regs_mask: u32,
    pub callee_fp_regs_mask: u32,
}

impl CalleeStorage {
    /// Storage with no known save slots.
    pub const fn new(callee_regs_mask: u32, callee_fp_regs_mask: u32) -> Self {
        Self {
            slots: [None; MAX_CALLEE_REGS],
            callee_regs_mask,
            callee_fp_regs_mask,
        }
    }

    /// Fills the slot table from the save area of the younger frame, taking
    /// registers that frame did not save from `prev`.
    pub fn fill(&mut self, arch: Arch, area: SaveArea, prev: Option<&CalleeStorage>) {
        for is_fp in [false, true] {
            for reg in arch.callee_regs(is_fp).iter() {
                let index = Self::index(arch, reg, is_fp);
                self.slots[index] = match area.slot_address(arch, reg, is_fp) {
                    Some(addr) => Some(addr),
                    None => prev.and_then(|p| p.slots[index]),
                };
            }
        }
    }

    fn index(arch: Arch, reg: u32, is_fp: bool) -> usize {
        let offset = (reg - arch.first_callee_reg(is_fp)) as usize;
        if is_fp {
            arch.callee_regs_count(false) + offset
        } else {
            offset
        }
    }

    pub fn slot(&self, arch: Arch, reg: u32, is_fp: bool) -> Option<Address> {
        if !arch.callee_regs(is_fp).contains(reg) {
            return None;
        }
        self.slots[Self::index(arch, reg, is_fp)]
    }

    fn slot_or_fatal(&self, arch: Arch, reg: u32, is_fp: bool) -> Address {
        match self.slot(arch, reg, is_fp) {
            Some(addr) => addr,
            None => stack_corruption(StackCorruption::CalleeSlotMissing { reg }),
        }
    }

    pub fn read(&self, memory: &dyn StackMemory, arch: Arch, reg: u32, is_fp: bool) -> u64 {
        let addr = self.slot_or_fatal(arch, reg, is_fp);
        memory.read_slot(addr, arch.pointer_size())
    }

    pub fn write(&self, memory: &dyn StackMemory, arch: Arch, reg: u32, is_fp: bool, value: u64) {
        let addr = self.slot_or_fatal(arch, reg, is_fp);
        memory.write_slot(addr, arch.pointer_size(), value);
    }

    pub fn mask(&self, is_fp: bool) -> u32 {
        if is_fp {
            self.callee_fp_regs_mask
        } else {
            self.callee_regs_mask
        }
    }
}

impl std::fmt::Debug for CalleeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let known = self.slots.iter().filter(|s| s.is_some()).count();
        f.debug_struct("CalleeStorage")
            .field("callee_regs_mask", &format_args!("{:#x}", self.callee_regs_mask))
            .field(
                "callee_fp_regs_mask",
                &format_args!("{:#x}", self.callee_fp_regs_mask),
            )
            .field("known_slots", &known)
            .finish()
    }
}
