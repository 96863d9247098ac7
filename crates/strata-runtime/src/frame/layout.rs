//! Compiled-frame layout calculator
//!
//! A compiled frame is addressed in pointer-sized slots counted from the
//! frame pointer toward lower addresses:
//!
//! ```text
//!   -2   outgoing stack argument
//!   -1   return address
//!    0   previous frame        <-- fp
//!    1   method
//!    2   flags
//!  3..4  data (deopt code entry)
//!  5..8  locals
//!    9.. callee GP | callee FP | caller GP | caller FP | spills
//! ```
//!
//! Everything past slot 9 depends on the architecture's register sets and the
//! rounded spill count, so all offsets are pure functions of `(arch, spills)`.

use crate::arch::Arch;
use serde::Serialize;

/// A fixed header region, in frame-pointer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    pub start: isize,
    pub size: isize,
}

impl StackRegion {
    pub const fn end(&self) -> isize {
        self.start + self.size
    }
}

pub const STACK_ARG_SLOT: StackRegion = StackRegion { start: -2, size: 1 };
pub const LR_SLOT: StackRegion = StackRegion { start: -1, size: 1 };
pub const PREV_FRAME_SLOT: StackRegion = StackRegion { start: 0, size: 1 };
pub const METHOD_SLOT: StackRegion = StackRegion { start: 1, size: 1 };
pub const FLAGS_SLOT: StackRegion = StackRegion { start: 2, size: 1 };
pub const DATA_REGION: StackRegion = StackRegion { start: 3, size: 2 };
pub const LOCALS_REGION: StackRegion = StackRegion { start: 5, size: 4 };

/// Return address through flags.
pub const HEADER_SIZE: isize = FLAGS_SLOT.end() - LR_SLOT.start;

pub const LOCALS_START_SLOT: usize = 5;
pub const STACK_START_SLOT: usize = 9;
pub const CALLEE_REGS_START_SLOT: usize = STACK_START_SLOT;

/// Values stored in a frame's method slot instead of a method pointer when
/// the frame is a transition between execution tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameBridgeKind {
    InterpreterToCompiledCode = 1,
    CompiledCodeToInterpreter = 2,
    Bypass = 3,
}

impl FrameBridgeKind {
    pub const fn marker(self) -> u64 {
        self as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetOrigin {
    Sp,
    Fp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    Bytes,
    Slots,
}

/// Slot layout of one compiled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CFrameLayout {
    arch: Arch,
    spills_count: usize,
}

impl CFrameLayout {
    /// Builds the layout for `spills` requested spill slots.
    ///
    /// The count is rounded so that the spill area ends on the pairing
    /// boundary the architecture's paired load/store instructions need.
    ///
    /// # Panics
    ///
    /// Panics for `Arch::None`.
    pub const fn new(arch: Arch, spills: usize) -> Self {
        let mut layout = CFrameLayout {
            arch,
            spills_count: 0,
        };
        layout.spills_count = layout.align_spill_count(spills);
        layout
    }

    // Spills start right after fp and lr, so the total has to be odd.
    const fn align_spill_count(&self, spills: usize) -> usize {
        let mut count = spills;
        match self.arch {
            Arch::Aarch64 | Arch::X86_64 => {
                if (self.spills_start_slot() + count) % 2 == 0 {
                    count += 1;
                }
            }
            Arch::Aarch32 => {
                // one spill slot is two words for ldrd/strd of FP registers
                count = (count + 1) * 2;
                if (self.spills_start_slot() + count) % 2 == 0 {
                    count += 1;
                }
            }
            Arch::X86 => {}
            Arch::None => panic!("Arch::None has no frame layout"),
        }
        count
    }

    pub const fn arch(&self) -> Arch {
        self.arch
    }

    /// Spill slots after rounding.
    pub const fn slots_count(&self) -> usize {
        self.spills_count
    }

    pub const fn slot_size(&self) -> usize {
        self.arch.pointer_size()
    }

    pub const fn locals_count() -> usize {
        STACK_START_SLOT - LOCALS_START_SLOT
    }

    pub const fn stack_start_slot(&self) -> usize {
        STACK_START_SLOT
    }

    pub const fn stack_args_start_slot(&self) -> isize {
        STACK_ARG_SLOT.start
    }

    // ── Register areas (absolute frame-pointer slots) ─────────────────

    pub const fn callee_regs_start_slot(&self) -> usize {
        CALLEE_REGS_START_SLOT
    }

    pub const fn callee_fp_regs_start_slot(&self) -> usize {
        self.callee_regs_start_slot() + self.callee_registers_count(false)
    }

    pub const fn caller_regs_start_slot(&self) -> usize {
        self.callee_fp_regs_start_slot() + self.callee_registers_count(true)
    }

    pub const fn caller_fp_regs_start_slot(&self) -> usize {
        self.caller_regs_start_slot() + self.caller_registers_count(false)
    }

    pub const fn spills_start_slot(&self) -> usize {
        self.caller_fp_regs_start_slot() + self.caller_registers_count(true)
    }

    pub const fn callee_registers_count(&self, is_fp: bool) -> usize {
        self.arch.callee_regs_count(is_fp)
    }

    pub const fn caller_registers_count(&self, is_fp: bool) -> usize {
        self.arch.caller_regs_count(is_fp)
    }

    // ── Slots relative to the register area (slot 9) ──────────────────

    /// Number of register save slots, which is also the first spill slot.
    pub const fn first_spill_slot(&self) -> usize {
        self.callee_registers_count(false)
            + self.callee_registers_count(true)
            + self.caller_registers_count(false)
            + self.caller_registers_count(true)
    }

    /// `None` when the frame has no spill slots.
    pub const fn last_spill_slot(&self) -> Option<usize> {
        if self.spills_count == 0 {
            None
        } else {
            Some(self.first_spill_slot() + self.spills_count - 1)
        }
    }

    pub const fn callee_first_slot(&self, is_fp: bool) -> usize {
        if is_fp {
            self.callee_registers_count(false)
        } else {
            0
        }
    }

    /// Last slot of a callee area. For an empty area this is one below the
    /// first slot, so the result is signed.
    pub const fn callee_last_slot(&self, is_fp: bool) -> isize {
        self.callee_first_slot(is_fp) as isize + self.callee_registers_count(is_fp) as isize - 1
    }

    pub const fn caller_first_slot(&self, is_fp: bool) -> usize {
        let base = (self.callee_last_slot(true) + 1) as usize;
        if is_fp {
            base + self.caller_registers_count(false)
        } else {
            base
        }
    }

    pub const fn caller_last_slot(&self, is_fp: bool) -> isize {
        self.caller_first_slot(is_fp) as isize + self.caller_registers_count(is_fp) as isize - 1
    }

    // ── Offsets ───────────────────────────────────────────────────────

    pub const fn frame_size(&self, unit: OffsetUnit) -> usize {
        // +1 for the return address slot
        let slots = STACK_START_SLOT + self.first_spill_slot() + self.spills_count + 1;
        match unit {
            OffsetUnit::Slots => slots,
            OffsetUnit::Bytes => slots * self.slot_size(),
        }
    }

    /// Converts a frame-pointer slot number into an offset.
    ///
    /// From the stack pointer the offset is `frame_size - slot - 2`: one slot
    /// for the return address and one fence slot.
    pub const fn offset(&self, slot: isize, origin: OffsetOrigin, unit: OffsetUnit) -> isize {
        let slots = match origin {
            OffsetOrigin::Sp => self.frame_size(OffsetUnit::Slots) as isize - slot - 2,
            OffsetOrigin::Fp => slot,
        };
        match unit {
            OffsetUnit::Slots => slots,
            OffsetUnit::Bytes => slots * self.slot_size() as isize,
        }
    }

    pub const fn method_offset(&self, origin: OffsetOrigin, unit: OffsetUnit) -> isize {
        self.offset(METHOD_SLOT.start, origin, unit)
    }

    pub const fn return_address_offset(&self, origin: OffsetOrigin, unit: OffsetUnit) -> isize {
        self.offset(LR_SLOT.start, origin, unit)
    }

    pub const fn free_slot_offset(&self, origin: OffsetOrigin, unit: OffsetUnit) -> isize {
        self.offset(LOCALS_START_SLOT as isize, origin, unit)
    }

    /// Offset of spill slot `spill`. On 32-bit targets a spill slot spans
    /// two words, addressed by its upper one.
    pub const fn spill_offset(&self, spill: usize, origin: OffsetOrigin, unit: OffsetUnit) -> isize {
        let shift = if self.arch.is_64_bits() { 0 } else { 1 };
        let slot = STACK_START_SLOT + self.first_spill_slot() + (spill << shift) + shift;
        self.offset(slot as isize, origin, unit)
    }

    pub const fn spill_offset_from_sp_in_bytes(&self, spill: usize) -> isize {
        self.spill_offset(spill, OffsetOrigin::Sp, OffsetUnit::Bytes)
    }

    pub const fn bytes_offset_sp(&self, slot: isize) -> isize {
        self.offset(slot, OffsetOrigin::Sp, OffsetUnit::Bytes)
    }

    /// Named regions in address order, used by tooling.
    pub fn regions(&self) -> Vec<LayoutRegion> {
        let mut regions = vec![
            LayoutRegion::new("stack_arg", STACK_ARG_SLOT.start, 1),
            LayoutRegion::new("return_address", LR_SLOT.start, 1),
            LayoutRegion::new("prev_frame", PREV_FRAME_SLOT.start, 1),
            LayoutRegion::new("method", METHOD_SLOT.start, 1),
            LayoutRegion::new("flags", FLAGS_SLOT.start, 1),
            LayoutRegion::new("data", DATA_REGION.start, DATA_REGION.size as usize),
            LayoutRegion::new("locals", LOCALS_REGION.start, LOCALS_REGION.size as usize),
        ];
        let areas = [
            ("callee_gp", self.callee_regs_start_slot(), self.callee_registers_count(false)),
            ("callee_fp", self.callee_fp_regs_start_slot(), self.callee_registers_count(true)),
            ("caller_gp", self.caller_regs_start_slot(), self.caller_registers_count(false)),
            ("caller_fp", self.caller_fp_regs_start_slot(), self.caller_registers_count(true)),
            ("spills", self.spills_start_slot(), self.spills_count),
        ];
        for (name, start, size) in areas {
            regions.push(LayoutRegion::new(name, start as isize, size));
        }
        for region in &mut regions {
            region.sp_offset = self.offset(region.start, OffsetOrigin::Sp, OffsetUnit::Slots);
        }
        regions
    }
}

/// One row of [`CFrameLayout::regions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutRegion {
    pub name: &'static str,
    pub start: isize,
    pub size: usize,
    pub sp_offset: isize,
}

impl LayoutRegion {
    fn new(name: &'static str, start: isize, size: usize) -> Self {
        Self {
            name,
            start,
            size,
            sp_offset: 0,
        }
    }
}

/// Bits of the flags slot.
pub mod flags {
    pub const SHOULD_DEOPTIMIZE: u64 = 1;
    pub const KIND_SHIFT: u32 = 1;
    pub const KIND_MASK: u64 = 0b11 << KIND_SHIFT;
}

/// Kind field of the flags slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CFrameKind {
    Default = 0,
    Osr = 1,
    Jni = 2,
}

impl CFrameKind {
    pub const fn from_flags(bits: u64) -> Option<Self> {
        match (bits & flags::KIND_MASK) >> flags::KIND_SHIFT {
            0 => Some(CFrameKind::Default),
            1 => Some(CFrameKind::Osr),
            2 => Some(CFrameKind::Jni),
            _ => None,
        }
    }

    pub const fn to_flags(self, should_deoptimize: bool) -> u64 {
        ((self as u64) << flags::KIND_SHIFT)
            | if should_deoptimize {
                flags::SHOULD_DEOPTIMIZE
            } else {
                0
            }
    }
}
