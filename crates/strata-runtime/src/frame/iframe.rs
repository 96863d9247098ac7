//! Interpreter frame records
//!
//! An interpreter frame is a flat record at ascending addresses:
//!
//! ```text
//! addr + 0p   previous frame (interpreter frame or boundary record)
//! addr + 1p   method pointer
//! addr + 2p   bytecode offset
//! addr + 3p   number of virtual registers
//! addr + 4p   accumulator: u64 value, u64 tag
//!             vregs: u64 value, u64 tag each
//! ```
//!
//! The method field sits at `+1p`, the same place an interpreter-side
//! boundary keeps its bridge marker.

use super::offset_slots;
use crate::arch::Arch;
use crate::memory::{Address, StackMemory};
use crate::vreg::VRegType;
use std::fmt;

pub const PREV_FRAME_FIELD: i64 = 0;
pub const METHOD_FIELD: i64 = 1;
pub const BYTECODE_OFFSET_FIELD: i64 = 2;
pub const NUM_VREGS_FIELD: i64 = 3;
/// Pointer-size fields before the accumulator
pub const HEADER_FIELDS: i64 = 4;
/// Bytes per (value, tag) pair
pub const VREG_SIZE: usize = 16;

/// Tag words stored next to each interpreter value.
pub mod tag {
    /// Bit 0 marks a reference
    pub const OBJECT: u64 = 1;
    pub const INT: u64 = 6;
    pub const DOUBLE: u64 = 8;
    pub const STRING: u64 = 17;

    pub const fn is_object(tag: u64) -> bool {
        tag & OBJECT != 0
    }
}

/// Header plus accumulator plus `num_vregs` registers, in bytes.
pub const fn frame_size(arch: Arch, num_vregs: usize) -> usize {
    HEADER_FIELDS as usize * arch.pointer_size() + VREG_SIZE * (num_vregs + 1)
}

#[derive(Clone, Copy)]
pub struct IFrame<'m> {
    memory: &'m dyn StackMemory,
    arch: Arch,
    addr: Address,
}

impl<'m> IFrame<'m> {
    pub fn new(memory: &'m dyn StackMemory, arch: Arch, addr: Address) -> Self {
        Self { memory, arch, addr }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    fn field(&self, index: i64) -> u64 {
        let addr = offset_slots(self.addr, self.arch, index);
        self.memory.read_slot(addr, self.arch.pointer_size())
    }

    fn set_field(&self, index: i64, value: u64) {
        let addr = offset_slots(self.addr, self.arch, index);
        self.memory.write_slot(addr, self.arch.pointer_size(), value);
    }

    pub fn prev_frame(&self) -> Address {
        self.field(PREV_FRAME_FIELD)
    }

    pub fn set_prev_frame(&self, prev: Address) {
        self.set_field(PREV_FRAME_FIELD, prev);
    }

    pub fn method_ptr(&self) -> Address {
        self.field(METHOD_FIELD)
    }

    pub fn set_method(&self, method: Address) {
        self.set_field(METHOD_FIELD, method);
    }

    pub fn bytecode_offset(&self) -> u32 {
        self.field(BYTECODE_OFFSET_FIELD) as u32
    }

    pub fn set_bytecode_offset(&self, offset: u32) {
        self.set_field(BYTECODE_OFFSET_FIELD, u64::from(offset));
    }

    pub fn num_vregs(&self) -> usize {
        self.field(NUM_VREGS_FIELD) as usize
    }

    pub fn set_num_vregs(&self, count: usize) {
        self.set_field(NUM_VREGS_FIELD, count as u64);
    }

    fn pair_addr(&self, pair: usize) -> Address {
        offset_slots(self.addr, self.arch, HEADER_FIELDS) + (pair * VREG_SIZE) as u64
    }

    fn read_pair(&self, pair: usize) -> (u64, u64) {
        let addr = self.pair_addr(pair);
        (
            self.memory.read_slot(addr, 8),
            self.memory.read_slot(addr + 8, 8),
        )
    }

    fn write_pair(&self, pair: usize, value: u64, tag: u64) {
        let addr = self.pair_addr(pair);
        self.memory.write_slot(addr, 8, value);
        self.memory.write_slot(addr + 8, 8, tag);
    }

    /// Accumulator as (value, tag).
    pub fn acc(&self) -> (u64, u64) {
        self.read_pair(0)
    }

    pub fn set_acc(&self, value: u64, tag: u64) {
        self.write_pair(0, value, tag);
    }

    fn check_index(&self, index: usize) {
        let count = self.num_vregs();
        if index >= count {
            panic!("vreg index {index} out of range for a frame with {count} registers");
        }
    }

    /// Register `index` as (value, tag).
    ///
    /// # Panics
    ///
    /// Panics when `index` is not below [`IFrame::num_vregs`].
    pub fn vreg(&self, index: usize) -> (u64, u64) {
        self.check_index(index);
        self.read_pair(index + 1)
    }

    pub fn set_vreg(&self, index: usize, value: u64, tag: u64) {
        self.check_index(index);
        self.write_pair(index + 1, value, tag);
    }

    pub fn vreg_tag(&self, index: usize) -> u64 {
        self.vreg(index).1
    }

    /// Type reported for a value carrying `tag`.
    pub const fn vreg_type_for_tag(tag: u64) -> VRegType {
        if tag::is_object(tag) {
            VRegType::Object
        } else if tag == tag::DOUBLE {
            VRegType::Float64
        } else if tag == tag::INT {
            VRegType::Int32
        } else {
            VRegType::Int64
        }
    }
}

impl fmt::Debug for IFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IFrame")
            .field("arch", &self.arch)
            .field("addr", &format_args!("{:#x}", self.addr))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SimulatedStack;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_fields_on_32_bit() {
        let stack = SimulatedStack::new(0x1000, 0x100);
        let frame = IFrame::new(&stack, Arch::Aarch32, 0x1000);
        frame.set_prev_frame(0x2000);
        frame.set_method(0x3000);
        frame.set_bytecode_offset(12);
        frame.set_num_vregs(2);
        frame.set_acc(5, tag::INT);
        frame.set_vreg(1, 0x1234, tag::OBJECT);

        assert_eq!(stack.read_slot(0x1004, 4), 0x3000);
        assert_eq!(frame.prev_frame(), 0x2000);
        assert_eq!(frame.bytecode_offset(), 12);
        assert_eq!(frame.acc(), (5, tag::INT));
        // acc starts at 16, vreg 1 at 16 + 32
        assert_eq!(stack.read_slot(0x1030, 8), 0x1234);
        assert_eq!(frame.vreg(1), (0x1234, tag::OBJECT));
        assert_eq!(frame_size(Arch::Aarch32, 2), 16 + 48);
    }

    #[rstest]
    #[case(tag::OBJECT, VRegType::Object)]
    #[case(tag::STRING, VRegType::Object)]
    #[case(tag::DOUBLE, VRegType::Float64)]
    #[case(tag::INT, VRegType::Int32)]
    #[case(0, VRegType::Int64)]
    fn test_tag_types(#[case] tag: u64, #[case] expected: VRegType) {
        assert_eq!(IFrame::vreg_type_for_tag(tag), expected);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_vreg_index_checked() {
        let stack = SimulatedStack::new(0x1000, 0x100);
        let frame = IFrame::new(&stack, Arch::Aarch64, 0x1000);
        frame.set_num_vregs(1);
        frame.vreg(1);
    }
}
