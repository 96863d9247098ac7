//! Argument locations of a dynamic-language native frame
//!
//! Dynamic methods are entered with `(Method*, argc, vregs...)`, where each
//! vreg is a 16-byte (value, tag) pair and `argc` does not count the leading
//! function object. The two header words take the first GP argument
//! registers; pairs go to the remaining GP registers while a whole pair
//! still fits, then to the caller's stack.

use super::jni::{ArgRegSlots, CALLER_STACK_ARGS_SLOT};
use crate::arch::AbiTraits;
use crate::frame::CFrame;
use crate::vreg::{vreg_index, VRegInfo, VRegType};
use std::iter::FusedIterator;

/// Bytes of one (value, tag) pair.
const VREG_BYTES: usize = 16;
const HEADER_WORDS: usize = 2;

#[derive(Debug, Clone)]
pub struct DynamicArgIter {
    gpr_begin: i32,
    num_gp: usize,
    words_per_vreg: usize,
    regs_fit: usize,
    count: usize,
    position: usize,
}

impl DynamicArgIter {
    /// Iterator over the function object plus `num_args` arguments.
    pub fn new(abi: AbiTraits, num_args: usize) -> Self {
        let slots = ArgRegSlots::new(&abi);
        let words_per_vreg = VREG_BYTES / abi.pointer_size();
        let num_gp = abi.num_gp_arg_regs;
        let regs_fit = if num_gp >= HEADER_WORDS {
            (num_gp - HEADER_WORDS) / words_per_vreg
        } else {
            0
        };
        Self {
            gpr_begin: slots.gpr_begin,
            num_gp,
            words_per_vreg,
            regs_fit,
            count: num_args + 1,
            position: 0,
        }
    }

    /// Reads the argument count saved by `frame` and iterates over it.
    pub fn for_frame(frame: &CFrame<'_>, abi: AbiTraits) -> Self {
        let probe = Self::new(abi, 0);
        let argc = frame.value_from_slot(probe.header_slot(1)) as u32;
        Self::new(abi, argc as usize)
    }

    /// Slot of header word `word` (0 = `Method*`, 1 = `argc`).
    pub fn header_slot(&self, word: usize) -> i32 {
        if word < self.num_gp {
            self.gpr_begin - word as i32
        } else {
            CALLER_STACK_ARGS_SLOT - (word - self.num_gp) as i32
        }
    }

    /// Slot of the value word of vreg `index`. Its tag sits
    /// [`tag_offset`](Self::tag_offset) slots further down.
    pub fn vreg_slot(&self, index: usize) -> i32 {
        let w = self.words_per_vreg as i32;
        if index < self.regs_fit {
            return self.gpr_begin - (HEADER_WORDS as i32 + index as i32 * w);
        }
        let stack_base = (HEADER_WORDS - self.num_gp.min(HEADER_WORDS)) as i32;
        let on_stack = (index - self.regs_fit) as i32;
        CALLER_STACK_ARGS_SLOT - stack_base - on_stack * w
    }

    /// Offset from a value slot to its tag slot.
    pub fn tag_offset(&self) -> i32 {
        (self.words_per_vreg / 2) as i32
    }

    pub fn regs_fit(&self) -> usize {
        self.regs_fit
    }
}

impl Iterator for DynamicArgIter {
    type Item = VRegInfo;

    fn next(&mut self) -> Option<VRegInfo> {
        if self.position >= self.count {
            return None;
        }
        let info = VRegInfo::slot(
            self.vreg_slot(self.position),
            VRegType::Int64,
            vreg_index(self.position),
        );
        self.position += 1;
        Some(info)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.position;
        (left, Some(left))
    }
}

impl ExactSizeIterator for DynamicArgIter {}

impl FusedIterator for DynamicArgIter {}

impl PartialEq for DynamicArgIter {
    fn eq(&self, other: &Self) -> bool {
        let left = self.len();
        if left == 0 || other.len() == 0 {
            return left == other.len();
        }
        self.gpr_begin == other.gpr_begin
            && self.num_gp == other.num_gp
            && self.words_per_vreg == other.words_per_vreg
            && self.count == other.count
            && self.position == other.position
    }
}

impl Eq for DynamicArgIter {}
