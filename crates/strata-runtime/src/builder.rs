//! Lays frames out in a [`SimulatedStack`]
//!
//! The builder grows the stack downward from the top of the simulated range,
//! so frames are pushed oldest first and every push returns the address the
//! next (younger) frame links to. Frame shapes follow the same layout code
//! the walker reads them with, which makes the builder the reference for
//! what a well-formed stack looks like on each architecture.

use crate::arch::marshal::{ArgKind, ArgPlacer};
use crate::arch::{AbiTraits, Arch};
use crate::frame::boundary::{COMPILER_BOUNDARY, INTERPRETER_BOUNDARY};
use crate::frame::iframe::{self, tag, IFrame};
use crate::frame::layout::{CFrameKind, CFrameLayout, FrameBridgeKind, OffsetUnit};
use crate::frame::{offset_slots, CFrame, SaveArea};
use crate::memory::{Address, SimulatedStack, StackMemory};
use crate::method::Method;
use crate::vreg::dynamic::DynamicArgIter;
use crate::vreg::jni::{self, ArgRegSlots, JniArgIter, CALLER_STACK_ARGS_SLOT};
use log::trace;

const STACK_ALIGNMENT: u64 = 16;

fn align_down(addr: Address) -> Address {
    addr & !(STACK_ALIGNMENT - 1)
}

/// An interpreter value with its tag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaggedValue {
    pub value: u64,
    pub tag: u64,
}

impl TaggedValue {
    pub const fn new(value: u64, tag: u64) -> Self {
        Self { value, tag }
    }

    pub const fn int(value: i32) -> Self {
        Self::new(value as u32 as u64, tag::INT)
    }

    pub fn double(value: f64) -> Self {
        Self::new(value.to_bits(), tag::DOUBLE)
    }

    pub const fn object(addr: Address) -> Self {
        Self::new(addr, tag::OBJECT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterpretedFrame {
    pub method: Address,
    pub bytecode_offset: u32,
    pub acc: TaggedValue,
    pub vregs: Vec<TaggedValue>,
}

impl InterpretedFrame {
    pub fn new(method: Address, bytecode_offset: u32) -> Self {
        Self {
            method,
            bytecode_offset,
            ..Self::default()
        }
    }

    pub fn with_acc(mut self, acc: TaggedValue) -> Self {
        self.acc = acc;
        self
    }

    pub fn with_vregs(mut self, vregs: Vec<TaggedValue>) -> Self {
        self.vregs = vregs;
        self
    }
}

/// Value of one machine register at the moment a frame was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedReg {
    pub reg: u32,
    pub is_fp: bool,
    pub value: u64,
}

impl SavedReg {
    pub const fn gp(reg: u32, value: u64) -> Self {
        Self {
            reg,
            is_fp: false,
            value,
        }
    }

    pub const fn fp(reg: u32, value: u64) -> Self {
        Self {
            reg,
            is_fp: true,
            value,
        }
    }
}

/// Contents of one compiled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFrame {
    pub method: Address,
    pub prev: Address,
    pub return_address: u64,
    pub kind: CFrameKind,
    pub should_deoptimize: bool,
    pub spills: usize,
    /// Callee-saved registers this frame's prologue spills
    pub callee_regs_mask: u32,
    pub callee_fp_regs_mask: u32,
    /// Values of the spilled callee-saved registers; each must be in the mask
    pub saved: Vec<SavedReg>,
    /// Raw words of the register area as (slot, value)
    pub slots: Vec<(i32, u64)>,
    /// Caller-saved registers spilled around a call
    pub caller_regs: Vec<SavedReg>,
}

impl CompiledFrame {
    pub fn new(method: Address, prev: Address, return_address: u64) -> Self {
        Self {
            method,
            prev,
            return_address,
            kind: CFrameKind::Default,
            should_deoptimize: false,
            spills: 0,
            callee_regs_mask: 0,
            callee_fp_regs_mask: 0,
            saved: Vec::new(),
            slots: Vec::new(),
            caller_regs: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: CFrameKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn deoptimize(mut self) -> Self {
        self.should_deoptimize = true;
        self
    }

    pub fn with_spills(mut self, spills: usize) -> Self {
        self.spills = spills;
        self
    }

    /// Records that this frame saved `reg` and what the register held.
    pub fn with_saved(mut self, saved: SavedReg) -> Self {
        if saved.is_fp {
            self.callee_fp_regs_mask |= 1 << saved.reg;
        } else {
            self.callee_regs_mask |= 1 << saved.reg;
        }
        self.saved.push(saved);
        self
    }

    pub fn with_slot(mut self, slot: i32, value: u64) -> Self {
        self.slots.push((slot, value));
        self
    }

    pub fn with_caller_reg(mut self, saved: SavedReg) -> Self {
        self.caller_regs.push(saved);
        self
    }
}

pub struct FrameBuilder<'s> {
    stack: &'s SimulatedStack,
    arch: Arch,
    abi: AbiTraits,
    sp: Address,
}

impl<'s> FrameBuilder<'s> {
    pub fn new(stack: &'s SimulatedStack, arch: Arch) -> Self {
        Self {
            stack,
            arch,
            abi: arch.abi(),
            sp: align_down(stack.top()),
        }
    }

    pub fn with_abi(mut self, abi: AbiTraits) -> Self {
        self.abi = abi;
        self
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Lowest address in use so far.
    pub fn sp(&self) -> Address {
        self.sp
    }

    fn word(&self) -> usize {
        self.arch.pointer_size()
    }

    fn write_word(&self, addr: Address, value: u64) {
        self.stack.write_slot(addr, self.word(), value);
    }

    fn full_area_bytes(&self) -> u64 {
        let count = self.arch.callee_regs_count(false) + self.arch.callee_regs_count(true);
        (count * self.word()) as u64
    }

    fn save_registers(&self, area: SaveArea, saved: &[SavedReg]) {
        for reg in saved {
            match area.slot_address(self.arch, reg.reg, reg.is_fp) {
                Some(addr) => self.write_word(addr, reg.value),
                None => panic!(
                    "register {} is not in the save mask of the area at {:#x}",
                    reg.reg, area.callee_stack
                ),
            }
        }
    }

    /// Pushes an interpreter frame whose previous frame is `prev`.
    pub fn push_interpreted(&mut self, frame: &InterpretedFrame, prev: Address) -> Address {
        let size = iframe::frame_size(self.arch, frame.vregs.len()) as u64;
        let addr = align_down(self.sp - size);
        let view = IFrame::new(self.stack, self.arch, addr);
        view.set_prev_frame(prev);
        view.set_method(frame.method);
        view.set_bytecode_offset(frame.bytecode_offset);
        view.set_num_vregs(frame.vregs.len());
        view.set_acc(frame.acc.value, frame.acc.tag);
        for (index, vreg) in frame.vregs.iter().enumerate() {
            view.set_vreg(index, vreg.value, vreg.tag);
        }
        self.sp = addr;
        trace!("built interpreted frame at {addr:#x}");
        addr
    }

    /// Pushes the record compiled code leaves when it calls into the
    /// interpreter. `prev_fp` is the calling compiled frame, `saved` the
    /// callee-saved registers the bridge preserves.
    pub fn push_c2i_boundary(&mut self, prev_fp: Address, return_address: u64, saved: &[SavedReg]) -> Address {
        let ptr = offset_slots(self.sp, self.arch, -3);
        let geometry = INTERPRETER_BOUNDARY;
        self.write_word(offset_slots(ptr, self.arch, geometry.prev), prev_fp);
        self.write_word(
            offset_slots(ptr, self.arch, geometry.marker),
            FrameBridgeKind::CompiledCodeToInterpreter.marker(),
        );
        self.write_word(offset_slots(ptr, self.arch, geometry.return_address), return_address);

        let callee_stack = offset_slots(ptr, self.arch, geometry.callee_stack);
        self.save_registers(SaveArea::full(self.arch, callee_stack), saved);
        self.sp = align_down(callee_stack - self.full_area_bytes());
        trace!("built C2I record at {ptr:#x}");
        ptr
    }

    /// Pushes a compiler-side bridge record (`InterpreterToCompiledCode` or
    /// `Bypass`) and returns its frame pointer.
    pub fn push_compiler_boundary(
        &mut self,
        kind: FrameBridgeKind,
        prev: Address,
        return_address: u64,
        saved: &[SavedReg],
    ) -> Address {
        assert!(
            kind != FrameBridgeKind::CompiledCodeToInterpreter,
            "compiled-to-interpreter records are pushed with push_c2i_boundary"
        );
        let fp = offset_slots(self.sp, self.arch, -2);
        let geometry = COMPILER_BOUNDARY;
        self.write_word(offset_slots(fp, self.arch, geometry.prev), prev);
        self.write_word(offset_slots(fp, self.arch, geometry.marker), kind.marker());
        self.write_word(offset_slots(fp, self.arch, geometry.return_address), return_address);

        let callee_stack = offset_slots(fp, self.arch, geometry.callee_stack);
        self.save_registers(SaveArea::full(self.arch, callee_stack), saved);
        self.sp = align_down(callee_stack - self.full_area_bytes());
        trace!("built {kind:?} record at {fp:#x}");
        fp
    }

    /// Pushes a compiled frame and returns its frame pointer.
    pub fn push_compiled(&mut self, frame: &CompiledFrame) -> Address {
        let fp = self.place_compiled(frame, frame.kind, 0);
        trace!("built compiled frame at {fp:#x}");
        fp
    }

    /// Pushes a JNI frame for `method` with its arguments already stored
    /// where the prologue spills them. `args` holds the receiver (for
    /// instance methods) and then the declared parameters.
    pub fn push_native(&mut self, frame: &CompiledFrame, method: &Method, args: &[u64]) -> Address {
        let stack_bytes = jni::stack_arg_bytes(self.abi, method);
        let fp = self.place_compiled(frame, CFrameKind::Jni, stack_bytes);
        let view = CFrame::new(self.stack, self.arch, fp);

        let mut placer = ArgPlacer::new(self.abi);
        let method_slot = ArgRegSlots::new(&self.abi).slot_of(placer.place(ArgKind::pointer(self.word())));
        view.set_value_to_slot(method_slot, frame.method);
        for (info, value) in JniArgIter::new(self.abi, method).zip(args) {
            view.write_value(info.value, *value, info.has_64bit_value());
        }
        trace!("built native frame at {fp:#x}");
        fp
    }

    /// Pushes a native frame of a dynamic method. `args[0]` is the function
    /// object, the rest are the call arguments.
    pub fn push_dynamic(&mut self, frame: &CompiledFrame, args: &[TaggedValue]) -> Address {
        let argc = args.len().saturating_sub(1);
        let iter = DynamicArgIter::new(self.abi, argc);
        let words_per_vreg = (16 / self.word()) as i32;
        let lowest = (0..args.len())
            .map(|index| iter.vreg_slot(index) - (words_per_vreg - 1))
            .chain([iter.header_slot(0), iter.header_slot(1)])
            .min()
            .unwrap_or(0);
        let stack_bytes = if lowest <= CALLER_STACK_ARGS_SLOT {
            (CALLER_STACK_ARGS_SLOT - lowest + 1) as usize * self.word()
        } else {
            0
        };

        let fp = self.place_compiled(frame, CFrameKind::Jni, stack_bytes);
        let view = CFrame::new(self.stack, self.arch, fp);
        view.set_value_to_slot(iter.header_slot(0), frame.method);
        view.set_value_to_slot(iter.header_slot(1), argc as u64);
        let tag_offset = iter.tag_offset();
        for (info, arg) in iter.zip(args) {
            view.write_value(info.value, arg.value, true);
            view.write_value(info.value - tag_offset, arg.tag, true);
        }
        trace!("built dynamic frame at {fp:#x} with {argc} arguments");
        fp
    }

    fn place_compiled(&mut self, frame: &CompiledFrame, kind: CFrameKind, stack_arg_bytes: usize) -> Address {
        let word = self.word() as u64;
        let reserved = (stack_arg_bytes as u64).max(word);
        let fp = self.sp - reserved - 2 * word;
        let view = CFrame::new(self.stack, self.arch, fp);

        view.set_prev_frame(frame.prev);
        view.set_lr(frame.return_address);
        view.set_method(frame.method);
        view.set_flags(kind.to_flags(frame.should_deoptimize));

        let area = SaveArea {
            callee_stack: view.callee_save_stack(),
            gp_mask: frame.callee_regs_mask,
            fp_mask: frame.callee_fp_regs_mask,
        };
        self.save_registers(area, &frame.saved);
        for saved in &frame.caller_regs {
            match view.caller_reg_slot(saved.reg, saved.is_fp) {
                Some(slot) => view.set_value_to_slot(slot, saved.value),
                None => panic!("register {} is not caller-saved on {}", saved.reg, self.arch),
            }
        }
        for &(slot, value) in &frame.slots {
            view.set_value_to_slot(slot, value);
        }

        let layout = CFrameLayout::new(self.arch, frame.spills);
        let depth = (layout.frame_size(OffsetUnit::Slots) - 2) as i64;
        self.sp = align_down(offset_slots(fp, self.arch, -depth));
        fp
    }
}

impl std::fmt::Debug for FrameBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuilder")
            .field("arch", &self.arch)
            .field("sp", &format_args!("{:#x}", self.sp))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::boundary;
    use pretty_assertions::assert_eq;

    fn stack() -> SimulatedStack {
        SimulatedStack::new(0x10_0000, 0x4000)
    }

    #[test]
    fn test_interpreted_frame_round_trip() {
        let stack = stack();
        let mut builder = FrameBuilder::new(&stack, Arch::Aarch64);
        let frame = InterpretedFrame::new(0x5000, 7)
            .with_acc(TaggedValue::int(3))
            .with_vregs(vec![TaggedValue::object(0x9000), TaggedValue::double(1.5)]);
        let addr = builder.push_interpreted(&frame, 0);
        assert_eq!(addr % 16, 0);
        let view = IFrame::new(&stack, Arch::Aarch64, addr);
        assert_eq!(view.method_ptr(), 0x5000);
        assert_eq!(view.bytecode_offset(), 7);
        assert_eq!(view.acc(), (3, tag::INT));
        assert_eq!(view.vreg(0), (0x9000, tag::OBJECT));
        assert_eq!(view.vreg(1).0, 1.5f64.to_bits());
    }

    #[test]
    fn test_c2i_record_geometry() {
        let stack = stack();
        let arch = Arch::X86_64;
        let mut builder = FrameBuilder::new(&stack, arch);
        let ptr = builder.push_c2i_boundary(0x1234, 0x4444, &[SavedReg::gp(12, 99)]);
        assert!(boundary::is_interpreter_boundary(&stack, arch, ptr));
        assert_eq!(boundary::prev(&stack, arch, INTERPRETER_BOUNDARY, ptr), 0x1234);
        assert_eq!(
            boundary::return_address(&stack, arch, INTERPRETER_BOUNDARY, ptr),
            0x4444
        );
        let area = SaveArea::full(arch, ptr - 8);
        let slot = area.slot_address(arch, 12, false).unwrap();
        assert_eq!(stack.read_slot(slot, 8), 99);
        assert!(builder.sp() < slot);
    }

    #[test]
    fn test_compiled_frame_header() {
        let stack = stack();
        let arch = Arch::Aarch64;
        let mut builder = FrameBuilder::new(&stack, arch);
        let frame = CompiledFrame::new(0x7000, 0x1111, 0x2222)
            .with_kind(CFrameKind::Osr)
            .deoptimize()
            .with_saved(SavedReg::gp(19, 0xaa))
            .with_slot(40, 0xbb);
        let fp = builder.push_compiled(&frame);
        let view = CFrame::new(&stack, arch, fp);
        assert_eq!(view.prev_frame(), 0x1111);
        assert_eq!(view.lr(), 0x2222);
        assert_eq!(view.method_ptr(), 0x7000);
        assert!(view.is_osr());
        assert!(view.should_deoptimize());
        assert_eq!(view.value_from_slot(40), 0xbb);
        // x19 alone in the mask sits right below the save pointer
        assert_eq!(stack.read_slot(view.callee_save_stack() - 8, 8), 0xaa);
        let layout = CFrameLayout::new(arch, 0);
        assert!(builder.sp() <= fp - 8 * (layout.frame_size(OffsetUnit::Slots) as u64 - 2));
    }

    #[test]
    fn test_native_frame_arguments() {
        let stack = stack();
        let arch = Arch::Aarch64;
        let method = Method::new("sum", "VIIIIIIIII".parse().unwrap()).native();
        let mut builder = FrameBuilder::new(&stack, arch);
        let args: Vec<u64> = (1..=9).collect();
        let fp = builder.push_native(&CompiledFrame::new(0x8000, 0, 0), &method, &args);
        let view = CFrame::new(&stack, arch, fp);
        assert!(view.is_jni());
        assert_eq!(view.value_from_slot(33), 0x8000);
        assert_eq!(view.value_from_slot(32), 1);
        assert_eq!(view.value_from_slot(-11), 8);
        assert_eq!(view.value_from_slot(-12), 9);
    }

    #[test]
    fn test_dynamic_frame_arguments() {
        let stack = stack();
        let arch = Arch::Aarch32;
        let mut builder = FrameBuilder::new(&stack, arch).with_abi(AbiTraits::aarch32(false));
        let args = [TaggedValue::object(0x40), TaggedValue::int(5)];
        let fp = builder.push_dynamic(&CompiledFrame::new(0x8000, 0, 0), &args);
        let view = CFrame::new(&stack, arch, fp);
        let iter = DynamicArgIter::new(AbiTraits::aarch32(false), 1);
        assert_eq!(view.value_from_slot(iter.header_slot(1)), 1);
        // everything after the header is on the caller's stack on 32-bit ARM
        assert_eq!(view.read_value(-11, true), 0x40);
        assert_eq!(view.read_value(-13, true), tag::OBJECT);
        assert_eq!(view.read_value(-15, true), 5);
    }
}
