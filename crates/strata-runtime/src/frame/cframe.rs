//! View over one compiled frame
//!
//! Slot `k` of the header lives at `fp - k * ptr`; register-area slot `s`
//! (the numbering virtual-register locations use) lives at
//! `fp - (9 + s) * ptr`. A 64-bit value on a 32-bit target takes slot `s`
//! for its low word and slot `s - 1` for its high word.

use super::callee::CalleeStorage;
use super::layout::{
    flags, CFrameKind, CFrameLayout, DATA_REGION, FLAGS_SLOT, LR_SLOT, METHOD_SLOT,
    PREV_FRAME_SLOT, STACK_START_SLOT,
};
use super::offset_slots;
use crate::arch::Arch;
use crate::error::{stack_corruption, StackCorruption};
use crate::memory::{Address, StackMemory};
use crate::vreg::{VRegInfo, VRegLocation};
use std::fmt::{self, Write};

#[derive(Clone, Copy)]
pub struct CFrame<'m> {
    memory: &'m dyn StackMemory,
    arch: Arch,
    fp: Address,
}

impl<'m> CFrame<'m> {
    pub fn new(memory: &'m dyn StackMemory, arch: Arch, fp: Address) -> Self {
        Self { memory, arch, fp }
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// The frame pointer, which is also the frame's identity.
    pub fn frame_origin(&self) -> Address {
        self.fp
    }

    fn word(&self) -> usize {
        self.arch.pointer_size()
    }

    fn header_addr(&self, slot: isize) -> Address {
        offset_slots(self.fp, self.arch, -(slot as i64))
    }

    fn read_header(&self, slot: isize) -> u64 {
        self.memory.read_slot(self.header_addr(slot), self.word())
    }

    fn write_header(&self, slot: isize, value: u64) {
        self.memory
            .write_slot(self.header_addr(slot), self.word(), value);
    }

    // ── Header ────────────────────────────────────────────────────────

    pub fn prev_frame(&self) -> Address {
        self.read_header(PREV_FRAME_SLOT.start)
    }

    pub fn set_prev_frame(&self, prev: Address) {
        self.write_header(PREV_FRAME_SLOT.start, prev);
    }

    /// Raw method slot: a method pointer, or a bridge marker when the frame
    /// is a boundary record.
    pub fn method_ptr(&self) -> Address {
        self.read_header(METHOD_SLOT.start)
    }

    pub fn set_method(&self, method: Address) {
        self.write_header(METHOD_SLOT.start, method);
    }

    pub fn lr(&self) -> u64 {
        self.read_header(LR_SLOT.start)
    }

    pub fn set_lr(&self, lr: u64) {
        self.write_header(LR_SLOT.start, lr);
    }

    pub fn flags(&self) -> u64 {
        self.read_header(FLAGS_SLOT.start)
    }

    pub fn set_flags(&self, bits: u64) {
        self.write_header(FLAGS_SLOT.start, bits);
    }

    pub fn kind(&self) -> Option<CFrameKind> {
        CFrameKind::from_flags(self.flags())
    }

    pub fn is_osr(&self) -> bool {
        self.kind() == Some(CFrameKind::Osr)
    }

    pub fn is_jni(&self) -> bool {
        self.kind() == Some(CFrameKind::Jni)
    }

    pub fn should_deoptimize(&self) -> bool {
        self.flags() & flags::SHOULD_DEOPTIMIZE != 0
    }

    pub fn set_should_deoptimize(&self, value: bool) {
        let bits = self.flags() & !flags::SHOULD_DEOPTIMIZE;
        self.set_flags(bits | u64::from(value));
    }

    /// Backup code entry kept for frames whose method was deoptimized while
    /// they were running.
    pub fn deopt_code_entry(&self) -> Address {
        self.read_header(DATA_REGION.start)
    }

    pub fn set_deopt_code_entry(&self, entry: Address) {
        self.write_header(DATA_REGION.start, entry);
    }

    // ── Register area ─────────────────────────────────────────────────

    pub fn stack_origin(&self) -> Address {
        self.header_addr(STACK_START_SLOT as isize)
    }

    /// Pointer the next older frame's callee-register lookups start from.
    pub fn callee_save_stack(&self) -> Address {
        self.header_addr(STACK_START_SLOT as isize - 1)
    }

    pub fn caller_save_stack(&self) -> Address {
        let layout = CFrameLayout::new(self.arch, 0);
        self.header_addr(layout.caller_regs_start_slot() as isize - 1)
    }

    pub fn slot_address(&self, slot: i32) -> Address {
        offset_slots(self.stack_origin(), self.arch, -i64::from(slot))
    }

    pub fn value_from_slot(&self, slot: i32) -> u64 {
        self.memory.read_slot(self.slot_address(slot), self.word())
    }

    pub fn set_value_to_slot(&self, slot: i32, value: u64) {
        self.memory
            .write_slot(self.slot_address(slot), self.word(), value);
    }

    /// Reads a value that may span two slots on 32-bit targets.
    pub fn read_value(&self, slot: i32, wide: bool) -> u64 {
        if self.arch.is_64_bits() || !wide {
            return self.value_from_slot(slot);
        }
        let low = self.value_from_slot(slot);
        let high = self.value_from_slot(slot - 1);
        low | (high << 32)
    }

    pub fn write_value(&self, slot: i32, value: u64, wide: bool) {
        if self.arch.is_64_bits() || !wide {
            self.set_value_to_slot(slot, value);
            return;
        }
        self.set_value_to_slot(slot, value & 0xffff_ffff);
        self.set_value_to_slot(slot - 1, value >> 32);
    }

    /// Register-area slot of a caller-saved register, `None` for other
    /// registers.
    pub fn caller_reg_slot(&self, reg: u32, is_fp: bool) -> Option<i32> {
        if reg >= 32 || self.arch.caller_regs_mask(is_fp) & (1u32 << reg) == 0 {
            return None;
        }
        let layout = CFrameLayout::new(self.arch, 0);
        let offset = (reg - self.arch.first_caller_reg(is_fp)) as isize;
        Some((layout.caller_last_slot(is_fp) - offset) as i32)
    }

    /// Reads machine register `reg` as this frame sees it.
    pub fn read_register(&self, reg: u32, is_fp: bool, wide: bool, callees: &CalleeStorage) -> u64 {
        if let Some(slot) = self.caller_reg_slot(reg, is_fp) {
            return self.read_value(slot, wide);
        }
        self.check_callee_reg(reg, is_fp);
        let low = callees.read(self.memory, self.arch, reg, is_fp);
        if self.arch.is_64_bits() || !wide {
            return low;
        }
        let high = callees.read(self.memory, self.arch, reg + 1, is_fp);
        low | (high << 32)
    }

    fn check_callee_reg(&self, reg: u32, is_fp: bool) {
        if !self.arch.callee_regs(is_fp).contains(reg) {
            stack_corruption(StackCorruption::RegisterOutOfRange {
                reg,
                arch: self.arch.display_name(),
            });
        }
    }

    /// Stores `value` wherever `info` says the virtual register lives.
    ///
    /// # Panics
    ///
    /// Panics for constants, which are immutable, and for dead locations.
    pub fn set_vreg_value(&self, info: &VRegInfo, value: u64, callees: &CalleeStorage) {
        let wide = info.has_64bit_value();
        match info.location {
            VRegLocation::Slot => self.write_value(info.value, value, wide),
            VRegLocation::Register | VRegLocation::FpRegister => {
                let is_fp = info.location == VRegLocation::FpRegister;
                let reg = info.value as u32;
                if let Some(slot) = self.caller_reg_slot(reg, is_fp) {
                    self.write_value(slot, value, wide);
                    return;
                }
                self.check_callee_reg(reg, is_fp);
                if self.arch.is_64_bits() || !wide {
                    callees.write(self.memory, self.arch, reg, is_fp, value);
                } else {
                    callees.write(self.memory, self.arch, reg, is_fp, value & 0xffff_ffff);
                    callees.write(self.memory, self.arch, reg + 1, is_fp, value >> 32);
                }
            }
            VRegLocation::Constant => panic!("modifying constants is not permitted ({info})"),
            VRegLocation::None | VRegLocation::Invalid => {
                panic!("cannot write a virtual register without a location ({info})")
            }
        }
    }

    // ── Dump ──────────────────────────────────────────────────────────

    /// Writes the header and register areas. `max_slot` bounds the spill
    /// slots printed, counted like register-area slots.
    pub fn dump<W: Write>(&self, out: &mut W, max_slot: usize) -> fmt::Result {
        if self.is_jni() {
            return writeln!(out, "JNI CFRAME: fp={:#x}", self.fp);
        }
        let layout = CFrameLayout::new(self.arch, 0);
        let spill_start = layout.first_spill_slot();
        let max_spill = max_slot.saturating_sub(spill_start);

        writeln!(out, "****************************************")?;
        writeln!(
            out,
            "* CFRAME: fp={:#x}, max_spill_slot={max_spill}",
            self.fp
        )?;
        self.dump_word(out, self.header_addr(LR_SLOT.start), "lr", self.lr())?;
        self.dump_word(
            out,
            self.header_addr(PREV_FRAME_SLOT.start),
            "prev",
            self.prev_frame(),
        )?;
        self.dump_word(
            out,
            self.header_addr(METHOD_SLOT.start),
            "method",
            self.method_ptr(),
        )?;

        let mut slot = 0i32;
        let sections = [
            ("Callee saved registers", 'x', self.arch.callee_regs(false)),
            ("Callee saved FP registers", 'd', self.arch.callee_regs(true)),
            ("Caller saved registers", 'x', self.arch.caller_regs(false)),
            ("Caller saved FP registers", 'd', self.arch.caller_regs(true)),
        ];
        for (title, prefix, range) in sections {
            writeln!(out, " [{title}]")?;
            for reg in range.iter().rev() {
                let label = format!("{prefix}{reg}:{slot}");
                self.dump_word(out, self.slot_address(slot), &label, self.value_from_slot(slot))?;
                slot += 1;
            }
        }
        writeln!(out, " [Locals]")?;
        for spill in 0..=max_spill {
            let label = format!("s{spill}:{slot}");
            self.dump_word(out, self.slot_address(slot), &label, self.value_from_slot(slot))?;
            slot += 1;
        }
        writeln!(out, "* CFRAME END")?;
        writeln!(out, "****************************************")
    }

    fn dump_word<W: Write>(&self, out: &mut W, addr: Address, label: &str, value: u64) -> fmt::Result {
        writeln!(out, " {addr:#x}: {label:>16} {value:#x}")
    }
}

impl fmt::Debug for CFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CFrame")
            .field("arch", &self.arch)
            .field("fp", &format_args!("{:#x}", self.fp))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::callee::SaveArea;
    use crate::memory::SimulatedStack;
    use crate::vreg::VRegType;
    use pretty_assertions::assert_eq;

    const FP: Address = 0x1800;

    fn stack() -> SimulatedStack {
        SimulatedStack::new(0x1000, 0x1000)
    }

    #[test]
    fn test_header_round_trip() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::Aarch64, FP);
        frame.set_prev_frame(0x1900);
        frame.set_method(0xabc0);
        frame.set_lr(0x4444);
        frame.set_flags(CFrameKind::Osr.to_flags(false));
        frame.set_should_deoptimize(true);

        assert_eq!(stack.read_slot(FP, 8), 0x1900);
        assert_eq!(stack.read_slot(FP - 8, 8), 0xabc0);
        assert_eq!(stack.read_slot(FP + 8, 8), 0x4444);
        assert!(frame.is_osr());
        assert!(!frame.is_jni());
        assert!(frame.should_deoptimize());
        frame.set_should_deoptimize(false);
        assert!(frame.is_osr());
        assert!(!frame.should_deoptimize());
    }

    #[test]
    fn test_deopt_entry_in_data_slot() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::X86_64, FP);
        frame.set_deopt_code_entry(0x7777);
        assert_eq!(stack.read_slot(FP - 24, 8), 0x7777);
        assert_eq!(frame.deopt_code_entry(), 0x7777);
    }

    #[test]
    fn test_slot_addressing() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::Aarch64, FP);
        assert_eq!(frame.stack_origin(), FP - 72);
        assert_eq!(frame.callee_save_stack(), FP - 64);
        assert_eq!(frame.slot_address(0), FP - 72);
        assert_eq!(frame.slot_address(-11), FP + 16);
        assert_eq!(frame.caller_save_stack(), FP - 26 * 8);
    }

    #[test]
    fn test_wide_values_on_32_bit() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::Aarch32, FP);
        frame.write_value(4, 0x1122_3344_5566_7788, true);
        assert_eq!(frame.value_from_slot(4), 0x5566_7788);
        assert_eq!(frame.value_from_slot(3), 0x1122_3344);
        assert_eq!(frame.read_value(4, true), 0x1122_3344_5566_7788);
        // contiguous little-endian in memory
        assert_eq!(stack.read_slot(frame.slot_address(4), 8), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_caller_register_slots() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::Aarch64, FP);
        // x0 is the last caller GP slot, x18 the first
        assert_eq!(frame.caller_reg_slot(0, false), Some(36));
        assert_eq!(frame.caller_reg_slot(18, false), Some(18));
        assert_eq!(frame.caller_reg_slot(19, false), None);
        assert_eq!(frame.caller_reg_slot(0, true), Some(68));
    }

    #[test]
    fn test_set_vreg_value_locations() {
        let stack = stack();
        let arch = Arch::Aarch64;
        let frame = CFrame::new(&stack, arch, FP);
        let mut callees = CalleeStorage::new(0, 0);
        callees.fill(arch, SaveArea::full(arch, 0x1f00), None);

        frame.set_vreg_value(&VRegInfo::slot(70, VRegType::Int64, 0), 5, &callees);
        assert_eq!(frame.value_from_slot(70), 5);

        frame.set_vreg_value(&VRegInfo::register(2, false, VRegType::Int32, 1), 6, &callees);
        assert_eq!(frame.value_from_slot(34), 6);

        frame.set_vreg_value(&VRegInfo::register(20, false, VRegType::Object, 2), 7, &callees);
        assert_eq!(callees.read(&stack, arch, 20, false), 7);
        assert_eq!(frame.read_register(20, false, false, &callees), 7);
    }

    #[test]
    #[should_panic(expected = "modifying constants")]
    fn test_constants_are_immutable() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::Aarch64, FP);
        let callees = CalleeStorage::new(0, 0);
        frame.set_vreg_value(&VRegInfo::constant(0, 0, VRegType::Int32, 0), 1, &callees);
    }

    #[test]
    #[should_panic(expected = "outside the X86_64 register ranges")]
    fn test_unknown_register_is_fatal() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::X86_64, FP);
        let callees = CalleeStorage::new(0, 0);
        frame.read_register(20, false, false, &callees);
    }

    #[test]
    fn test_jni_dump_is_one_line() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::Aarch64, FP);
        frame.set_flags(CFrameKind::Jni.to_flags(false));
        let mut out = String::new();
        frame.dump(&mut out, 0).unwrap();
        assert_eq!(out, "JNI CFRAME: fp=0x1800\n");
    }

    #[test]
    fn test_dump_lists_every_register_area() {
        let stack = stack();
        let frame = CFrame::new(&stack, Arch::X86_64, FP);
        frame.set_method(0x40);
        let mut out = String::new();
        frame.dump(&mut out, 31).unwrap();
        assert!(out.starts_with("****************************************\n* CFRAME: fp=0x1800, max_spill_slot=1\n"));
        assert!(out.contains(" [Callee saved registers]\n"));
        assert!(out.contains("x15:0"));
        assert!(out.contains(" [Caller saved FP registers]\n"));
        assert!(out.contains("s1:31"));
        assert!(out.ends_with("* CFRAME END\n****************************************\n"));
    }
}
