//! Stack walker
//!
//! [`StackWalker`] is a cursor over one thread's call stack. It starts at
//! the youngest frame and moves toward the oldest, presenting interpreted
//! frames, compiled frames and the methods inlined into compiled frames as
//! one sequence. Boundary records between tiers are stepped over, never
//! reported.
//!
//! Classification is driven by the markers boundary records leave in known
//! slots (see [`crate::frame::boundary`]). A compiler-side BYPASS record is
//! always recognized before a frame is taken for an ordinary one: a BYPASS
//! sitting behind a compiled-to-interpreter record means the compiled caller
//! is one record further up.
//!
//! Corrupted stacks (null or unregistered method pointers, unknown markers,
//! missing stack maps) are fatal, see [`crate::error`].

mod dump;
mod verify;

pub use verify::ObjectInspector;

use crate::arch::{AbiTraits, Arch};
use crate::error::{stack_corruption, StackCorruption};
use crate::frame::boundary::{self, CompilerMarker, COMPILER_BOUNDARY, INTERPRETER_BOUNDARY};
use crate::frame::iframe::tag;
use crate::frame::layout::FrameBridgeKind;
use crate::frame::{CFrame, CalleeStorage, IFrame, SaveArea};
use crate::memory::{Address, StackMemory};
use crate::method::{Method, MethodTable};
use crate::stackmap::{CodeInfo, StackMap, StackMapProvider};
use crate::thread::ThreadSnapshot;
use crate::vreg::{vreg_index, DynamicArgIter, JniArgIter, VRegInfo, VRegLocation, VRegValue};
use log::{debug, trace};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Everything a walk reads besides the frames themselves.
#[derive(Clone, Copy)]
pub struct WalkContext<'a> {
    pub memory: &'a dyn StackMemory,
    pub arch: Arch,
    /// Calling convention native frames were entered with
    pub abi: AbiTraits,
    pub methods: &'a dyn MethodTable,
    pub stack_maps: &'a dyn StackMapProvider,
    /// Needed only to verify object references
    pub objects: Option<&'a dyn ObjectInspector>,
    pub verify_call_stack: bool,
}

impl<'a> WalkContext<'a> {
    pub fn new(
        memory: &'a dyn StackMemory,
        arch: Arch,
        methods: &'a dyn MethodTable,
        stack_maps: &'a dyn StackMapProvider,
    ) -> Self {
        Self {
            memory,
            arch,
            abi: arch.abi(),
            methods,
            stack_maps,
            objects: None,
            verify_call_stack: false,
        }
    }

    pub fn with_abi(mut self, abi: AbiTraits) -> Self {
        self.abi = abi;
        self
    }

    pub fn with_objects(mut self, objects: &'a dyn ObjectInspector) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn with_verify_call_stack(mut self, verify: bool) -> Self {
        self.verify_call_stack = verify;
        self
    }
}

impl fmt::Debug for WalkContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkContext")
            .field("arch", &self.arch)
            .field("abi", &self.abi)
            .field("has_objects", &self.objects.is_some())
            .field("verify_call_stack", &self.verify_call_stack)
            .finish()
    }
}

/// Which frames the walker stops on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnwindPolicy {
    /// Every physical frame and every inlined method
    #[default]
    All,
    /// Physical frames only
    SkipInlined,
    /// The top physical frame and its inlined methods, then stop
    OnlyInlined,
}

impl UnwindPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            UnwindPolicy::All => "all",
            UnwindPolicy::SkipInlined => "skip-inlined",
            UnwindPolicy::OnlyInlined => "only-inlined",
        }
    }
}

impl fmt::Display for UnwindPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown unwind policy '{0}' (expected one of: all, skip-inlined, only-inlined)")]
pub struct UnwindPolicyParseError(pub String);

impl FromStr for UnwindPolicy {
    type Err = UnwindPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all" | "default" => Ok(UnwindPolicy::All),
            "skip-inlined" => Ok(UnwindPolicy::SkipInlined),
            "only-inlined" => Ok(UnwindPolicy::OnlyInlined),
            _ => Err(UnwindPolicyParseError(s.to_string())),
        }
    }
}

/// Tier of the frame below the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    None,
    Interpreter,
    Compiler,
}

/// Non-advancing handle on the frame [`StackWalker::next_frame`] would
/// move to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAccessor {
    None,
    Interpreted(Address),
    Compiled(Address),
}

#[derive(Clone, Copy)]
struct CompiledState<'a> {
    frame: CFrame<'a>,
    method_ptr: Address,
    method: &'a Method,
    code: Option<&'a CodeInfo>,
    stack_map: Option<&'a StackMap>,
    native_pc: u64,
    is_native: bool,
    /// `Some(d)` while positioned on the method inlined at depth `d`
    inline_depth: Option<usize>,
    callees: CalleeStorage,
}

#[derive(Clone, Copy)]
enum Position<'a> {
    Interpreted(IFrame<'a>),
    Compiled(CompiledState<'a>),
    Exhausted,
}

pub struct StackWalker<'a> {
    ctx: WalkContext<'a>,
    policy: UnwindPolicy,
    position: Position<'a>,
}

impl<'a> StackWalker<'a> {
    /// Starts at the frame `fp`. For a compiled top frame `native_pc` is
    /// where it stopped; `fp` may also point at a compiled-to-interpreter
    /// record left by a runtime call.
    pub fn new(
        ctx: WalkContext<'a>,
        fp: Address,
        is_compiled: bool,
        native_pc: u64,
        policy: UnwindPolicy,
    ) -> Self {
        debug!(
            "stack walker: arch={} fp={fp:#x} compiled={is_compiled} npc={native_pc:#x} policy={policy}",
            ctx.arch
        );
        let mut walker = Self {
            ctx,
            policy,
            position: Position::Exhausted,
        };
        walker.position = walker.top_frame(fp, is_compiled, native_pc);
        walker
    }

    /// Starts at the thread's current frame, verifying the whole stack first
    /// when the context asks for it in debug builds.
    pub fn from_thread(ctx: WalkContext<'a>, thread: &ThreadSnapshot, policy: UnwindPolicy) -> Self {
        if ctx.verify_call_stack && cfg!(debug_assertions) {
            Self::new(
                ctx,
                thread.current_frame,
                thread.is_compiled,
                thread.native_pc,
                UnwindPolicy::All,
            )
            .verify();
        }
        Self::new(
            ctx,
            thread.current_frame,
            thread.is_compiled,
            thread.native_pc,
            policy,
        )
    }

    /// Moves back to the thread's current frame.
    pub fn reset(&mut self, thread: &ThreadSnapshot) {
        self.position = self.top_frame(thread.current_frame, thread.is_compiled, thread.native_pc);
    }

    pub fn context(&self) -> &WalkContext<'a> {
        &self.ctx
    }

    pub fn policy(&self) -> UnwindPolicy {
        self.policy
    }

    // ── Frame discovery ───────────────────────────────────────────────

    fn top_frame(&self, fp: Address, is_compiled: bool, native_pc: u64) -> Position<'a> {
        if fp == 0 {
            return Position::Exhausted;
        }
        if !is_compiled {
            return Position::Interpreted(self.interpreted_at(fp));
        }
        if boundary::is_interpreter_boundary(self.ctx.memory, self.ctx.arch, fp) {
            return self.frame_behind_c2i(fp);
        }
        self.compiled_at(fp, native_pc, None, None)
    }

    fn interpreted_at(&self, addr: Address) -> IFrame<'a> {
        trace!("interpreted frame at {addr:#x}");
        IFrame::new(self.ctx.memory, self.ctx.arch, addr)
    }

    /// The compiled frame that called into the interpreter through the
    /// record at `ptr`.
    fn frame_behind_c2i(&self, ptr: Address) -> Position<'a> {
        let (memory, arch) = (self.ctx.memory, self.ctx.arch);
        let bp = boundary::prev(memory, arch, INTERPRETER_BOUNDARY, ptr);
        if boundary::marker(memory, arch, COMPILER_BOUNDARY, bp) == FrameBridgeKind::Bypass.marker() {
            trace!("C2I at {ptr:#x} returns through BYPASS at {bp:#x}");
            let fp = boundary::prev(memory, arch, COMPILER_BOUNDARY, bp);
            let npc = boundary::return_address(memory, arch, COMPILER_BOUNDARY, bp);
            let area = SaveArea::full(arch, boundary::callee_stack(arch, COMPILER_BOUNDARY, bp));
            return self.compiled_at(fp, npc, Some(area), None);
        }
        trace!("C2I at {ptr:#x} returns to compiled frame {bp:#x}");
        let npc = boundary::return_address(memory, arch, INTERPRETER_BOUNDARY, ptr);
        let area = SaveArea::full(arch, boundary::callee_stack(arch, INTERPRETER_BOUNDARY, ptr));
        self.compiled_at(bp, npc, Some(area), None)
    }

    fn compiled_at(
        &self,
        fp: Address,
        native_pc: u64,
        area: Option<SaveArea>,
        younger: Option<&CalleeStorage>,
    ) -> Position<'a> {
        let arch = self.ctx.arch;
        let frame = CFrame::new(self.ctx.memory, arch, fp);
        let method_ptr = frame.method_ptr();
        if method_ptr == 0 {
            stack_corruption(StackCorruption::NullMethod { frame: fp });
        }
        let Some(method) = self.ctx.methods.method(method_ptr) else {
            stack_corruption(StackCorruption::UnknownMethod {
                frame: fp,
                method: method_ptr,
            });
        };
        let is_native = frame.is_jni() || method.is_native;
        let code = self.ctx.stack_maps.code_info(method_ptr);

        let (gp_mask, fp_mask) = match code {
            Some(info) if !is_native => (info.callee_regs_mask, info.callee_fp_regs_mask),
            _ => (arch.callee_regs_mask(false), arch.callee_regs_mask(true)),
        };
        let stack_map = if is_native {
            None
        } else {
            match code.and_then(|info| info.stack_map(native_pc)) {
                Some(map) => Some(map),
                None => stack_corruption(StackCorruption::MissingStackMap {
                    method: method_ptr,
                    npc: native_pc,
                }),
            }
        };
        let inline_depth = match stack_map {
            Some(map) if self.policy != UnwindPolicy::SkipInlined => map.inline_depth().checked_sub(1),
            _ => None,
        };

        let mut callees = CalleeStorage::new(gp_mask, fp_mask);
        if let Some(area) = area {
            callees.fill(arch, area, younger);
        }
        trace!(
            "compiled frame at {fp:#x}: {} npc={native_pc:#x} native={is_native} inline_depth={inline_depth:?}",
            method.name
        );
        Position::Compiled(CompiledState {
            frame,
            method_ptr,
            method,
            code,
            stack_map,
            native_pc,
            is_native,
            inline_depth,
            callees,
        })
    }

    fn successor(&self) -> Position<'a> {
        match &self.position {
            Position::Exhausted => Position::Exhausted,
            Position::Interpreted(frame) => self.after_interpreted(frame),
            Position::Compiled(state) => self.after_compiled(state),
        }
    }

    fn after_interpreted(&self, frame: &IFrame<'a>) -> Position<'a> {
        if self.policy == UnwindPolicy::OnlyInlined {
            return Position::Exhausted;
        }
        let prev = frame.prev_frame();
        if prev == 0 {
            return Position::Exhausted;
        }
        if boundary::is_interpreter_boundary(self.ctx.memory, self.ctx.arch, prev) {
            return self.frame_behind_c2i(prev);
        }
        Position::Interpreted(self.interpreted_at(prev))
    }

    fn after_compiled(&self, state: &CompiledState<'a>) -> Position<'a> {
        if let Some(depth) = state.inline_depth {
            if self.policy != UnwindPolicy::SkipInlined {
                let mut next = *state;
                next.inline_depth = depth.checked_sub(1);
                return Position::Compiled(next);
            }
        }
        if self.policy == UnwindPolicy::OnlyInlined {
            return Position::Exhausted;
        }
        let (memory, arch) = (self.ctx.memory, self.ctx.arch);
        let prev = state.frame.prev_frame();
        if prev == 0 {
            return Position::Exhausted;
        }
        match boundary::compiler_marker(memory, arch, prev) {
            CompilerMarker::I2C => {
                let interpreted = boundary::prev(memory, arch, COMPILER_BOUNDARY, prev);
                trace!("I2C at {prev:#x} returns to {interpreted:#x}");
                if interpreted == 0 {
                    Position::Exhausted
                } else if boundary::is_interpreter_boundary(memory, arch, interpreted) {
                    self.frame_behind_c2i(interpreted)
                } else {
                    Position::Interpreted(self.interpreted_at(interpreted))
                }
            }
            CompilerMarker::Bypass => {
                let caller = boundary::prev(memory, arch, COMPILER_BOUNDARY, prev);
                trace!("BYPASS at {prev:#x} returns to {caller:#x}");
                if caller == 0 {
                    return Position::Exhausted;
                }
                if boundary::is_interpreter_boundary(memory, arch, caller) {
                    return self.frame_behind_c2i(caller);
                }
                let npc = boundary::return_address(memory, arch, COMPILER_BOUNDARY, prev);
                let area = SaveArea::full(arch, boundary::callee_stack(arch, COMPILER_BOUNDARY, prev));
                self.compiled_at(caller, npc, Some(area), None)
            }
            CompilerMarker::Method(_) => {
                let area = SaveArea {
                    callee_stack: state.frame.callee_save_stack(),
                    gp_mask: state.callees.callee_regs_mask,
                    fp_mask: state.callees.callee_fp_regs_mask,
                };
                self.compiled_at(prev, state.frame.lr(), Some(area), Some(&state.callees))
            }
        }
    }

    /// Moves to the next older frame. Does nothing once the walker is
    /// exhausted.
    pub fn next_frame(&mut self) {
        self.position = self.successor();
    }

    /// Where [`next_frame`](Self::next_frame) would go, without moving.
    pub fn peek_next_frame(&self) -> FrameAccessor {
        match self.successor() {
            Position::Exhausted => FrameAccessor::None,
            Position::Interpreted(frame) => FrameAccessor::Interpreted(frame.address()),
            Position::Compiled(state) => FrameAccessor::Compiled(state.frame.frame_origin()),
        }
    }

    /// Tier of the physical frame below the current one, from the marker
    /// its record carries.
    pub fn previous_frame_kind(&self) -> FrameKind {
        let (memory, arch) = (self.ctx.memory, self.ctx.arch);
        match &self.position {
            Position::Exhausted => FrameKind::None,
            Position::Compiled(state) => {
                let prev = state.frame.prev_frame();
                if prev == 0 {
                    FrameKind::None
                } else if boundary::marker(memory, arch, COMPILER_BOUNDARY, prev)
                    == FrameBridgeKind::InterpreterToCompiledCode.marker()
                {
                    FrameKind::Interpreter
                } else {
                    FrameKind::Compiler
                }
            }
            Position::Interpreted(frame) => {
                let prev = frame.prev_frame();
                if prev == 0 {
                    FrameKind::None
                } else if boundary::is_interpreter_boundary(memory, arch, prev) {
                    FrameKind::Compiler
                } else {
                    FrameKind::Interpreter
                }
            }
        }
    }

    /// True when the compiler-side record at `prev` leads back into the
    /// interpreter: an I2C record, or a BYPASS whose caller is itself a
    /// compiled-to-interpreter record.
    pub fn is_compiler_bound_frame(&self, prev: Address) -> bool {
        let (memory, arch) = (self.ctx.memory, self.ctx.arch);
        let marker = boundary::marker(memory, arch, COMPILER_BOUNDARY, prev);
        if marker == FrameBridgeKind::InterpreterToCompiledCode.marker() {
            return true;
        }
        if marker != FrameBridgeKind::Bypass.marker() {
            return false;
        }
        let caller = boundary::prev(memory, arch, COMPILER_BOUNDARY, prev);
        caller != 0 && boundary::is_interpreter_boundary(memory, arch, caller)
    }

    // ── Current frame ─────────────────────────────────────────────────

    pub fn has_frame(&self) -> bool {
        !matches!(self.position, Position::Exhausted)
    }

    fn current(&self) -> &Position<'a> {
        if !self.has_frame() {
            panic!("stack walker is exhausted");
        }
        &self.position
    }

    pub fn is_cframe(&self) -> bool {
        matches!(self.current(), Position::Compiled(_))
    }

    pub fn is_inlined(&self) -> bool {
        matches!(self.current(), Position::Compiled(state) if state.inline_depth.is_some())
    }

    pub fn is_native(&self) -> bool {
        matches!(self.current(), Position::Compiled(state) if state.is_native)
    }

    /// Inline depth of the current method, `None` for a physical frame.
    pub fn inline_depth(&self) -> Option<usize> {
        match self.current() {
            Position::Compiled(state) => state.inline_depth,
            _ => None,
        }
    }

    pub fn cframe(&self) -> Option<CFrame<'a>> {
        match self.current() {
            Position::Compiled(state) => Some(state.frame),
            _ => None,
        }
    }

    pub fn iframe(&self) -> Option<IFrame<'a>> {
        match self.current() {
            Position::Interpreted(frame) => Some(*frame),
            _ => None,
        }
    }

    fn lookup_method(&self, frame: Address, method: Address) -> &'a Method {
        match self.ctx.methods.method(method) {
            Some(found) => found,
            None => stack_corruption(StackCorruption::UnknownMethod { frame, method }),
        }
    }

    /// Method executing in the current frame, the inlined callee when the
    /// walker stands on one.
    pub fn method(&self) -> &'a Method {
        match self.current() {
            Position::Interpreted(frame) => self.lookup_method(frame.address(), frame.method_ptr()),
            Position::Compiled(state) => match (state.inline_depth, state.stack_map) {
                (Some(depth), Some(map)) => {
                    self.lookup_method(state.frame.frame_origin(), map.inlined[depth].method)
                }
                _ => state.method,
            },
            Position::Exhausted => unreachable!(),
        }
    }

    pub fn bytecode_pc(&self) -> u32 {
        match self.current() {
            Position::Interpreted(frame) => frame.bytecode_offset(),
            Position::Compiled(state) => match (state.inline_depth, state.stack_map) {
                (Some(depth), Some(map)) => map.inlined[depth].bytecode_pc,
                (None, Some(map)) => map.bytecode_pc,
                _ => 0,
            },
            Position::Exhausted => unreachable!(),
        }
    }

    /// Native pc of a compiled frame, 0 for interpreted frames.
    pub fn native_pc(&self) -> u64 {
        match self.current() {
            Position::Compiled(state) => state.native_pc,
            _ => 0,
        }
    }

    pub fn fp(&self) -> Address {
        match self.current() {
            Position::Interpreted(frame) => frame.address(),
            Position::Compiled(state) => state.frame.frame_origin(),
            Position::Exhausted => unreachable!(),
        }
    }

    /// Callee-saved registers the current compiled frame spills itself.
    pub fn callee_regs_mask(&self, is_fp: bool) -> u32 {
        match self.current() {
            Position::Compiled(state) => state.callees.mask(is_fp),
            _ => 0,
        }
    }

    // ── Virtual registers ─────────────────────────────────────────────

    /// Lazily yields every live virtual register of the current frame with
    /// its value.
    pub fn vregs(&self) -> VRegs<'_, 'a> {
        let source = match self.current() {
            Position::Interpreted(frame) => VRegSource::Interpreted {
                next: 0,
                count: frame.num_vregs(),
            },
            Position::Compiled(state) if state.is_native && state.method.is_dynamic => {
                VRegSource::Dynamic(DynamicArgIter::for_frame(&state.frame, self.ctx.abi))
            }
            Position::Compiled(state) if state.is_native => {
                VRegSource::Jni(JniArgIter::new(self.ctx.abi, state.method))
            }
            Position::Compiled(state) => {
                let infos = state.stack_map.map_or(&[][..], |map| map.vregs_at(state.inline_depth));
                VRegSource::Compiled(infos.iter())
            }
            Position::Exhausted => unreachable!(),
        };
        VRegs {
            walker: self,
            source,
        }
    }

    /// Reference-holding registers of the current frame.
    pub fn objects(&self) -> impl Iterator<Item = (VRegInfo, VRegValue)> + '_ {
        self.vregs().filter(|(_, value)| value.has_object())
    }

    /// Hands every non-null reference of the current frame to `visitor`.
    pub fn visit_roots(&self, mut visitor: impl FnMut(&VRegInfo, Address)) {
        for (info, value) in self.objects() {
            if let Some(object) = value.as_reference() {
                visitor(&info, object);
            }
        }
    }

    /// Value of `info` in the current frame.
    pub fn read_vreg(&self, info: &VRegInfo) -> VRegValue {
        match self.current() {
            Position::Interpreted(frame) => {
                let (value, tag) = if info.is_acc {
                    frame.acc()
                } else {
                    frame.vreg(info.index as usize)
                };
                VRegValue::new(value, tag::is_object(tag))
            }
            Position::Compiled(state) if state.is_native && state.method.is_dynamic => {
                let tag_offset = DynamicArgIter::new(self.ctx.abi, 0).tag_offset();
                let value = state.frame.read_value(info.value, true);
                let tag = state.frame.read_value(info.value - tag_offset, true);
                VRegValue::new(value, tag::is_object(tag))
            }
            Position::Compiled(state) => self.read_compiled(state, info),
            Position::Exhausted => unreachable!(),
        }
    }

    fn read_compiled(&self, state: &CompiledState<'a>, info: &VRegInfo) -> VRegValue {
        let wide = info.has_64bit_value();
        let bits = match info.location {
            VRegLocation::Slot => state.frame.read_value(info.value, wide),
            VRegLocation::Register | VRegLocation::FpRegister => state.frame.read_register(
                info.value as u32,
                info.location == VRegLocation::FpRegister,
                wide,
                &state.callees,
            ),
            VRegLocation::Constant => {
                let low = u64::from(self.constant(state, info.constant_low_index()));
                if wide {
                    low | (u64::from(self.constant(state, info.constant_hi_index())) << 32)
                } else {
                    low
                }
            }
            VRegLocation::None | VRegLocation::Invalid => {
                panic!("{info} has no location to read from")
            }
        };
        VRegValue::new(bits, info.is_object())
    }

    fn constant(&self, state: &CompiledState<'a>, index: usize) -> u32 {
        match state.code.and_then(|code| code.constant(index)) {
            Some(value) => value,
            None => stack_corruption(StackCorruption::MissingConstant {
                method: state.method_ptr,
                index,
            }),
        }
    }

    /// Value of virtual register `index` (not the accumulator).
    ///
    /// # Panics
    ///
    /// Panics when the current frame has no live register with that index.
    pub fn vreg_value(&self, index: usize) -> VRegValue {
        if let Position::Interpreted(frame) = self.current() {
            let (value, tag) = frame.vreg(index);
            return VRegValue::new(value, tag::is_object(tag));
        }
        match self
            .vregs()
            .find(|(info, _)| !info.is_acc && usize::from(info.index) == index)
        {
            Some((_, value)) => value,
            None => panic!("no live virtual register v{index} in the current frame"),
        }
    }

    /// Stores `value` into the register `info` describes.
    ///
    /// # Panics
    ///
    /// Panics when an interpreted register would change between reference
    /// and scalar, and when `info` is a constant.
    pub fn set_vreg_value(&mut self, info: &VRegInfo, value: VRegValue) {
        match self.current() {
            Position::Interpreted(frame) => {
                let (_, tag) = if info.is_acc {
                    frame.acc()
                } else {
                    frame.vreg(info.index as usize)
                };
                if tag::is_object(tag) != value.has_object() {
                    panic!(
                        "{} holds a {} and cannot take a {}",
                        info.name(),
                        kind_name(tag::is_object(tag)),
                        kind_name(value.has_object())
                    );
                }
                if info.is_acc {
                    frame.set_acc(value.bits(), tag);
                } else {
                    frame.set_vreg(info.index as usize, value.bits(), tag);
                }
            }
            Position::Compiled(state) => {
                state
                    .frame
                    .set_vreg_value(info, value.bits(), &state.callees);
            }
            Position::Exhausted => unreachable!(),
        }
    }
}

fn kind_name(is_object: bool) -> &'static str {
    if is_object {
        "reference"
    } else {
        "scalar"
    }
}

impl fmt::Debug for StackWalker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("StackWalker");
        dbg.field("arch", &self.ctx.arch).field("policy", &self.policy);
        match &self.position {
            Position::Exhausted => dbg.field("frame", &"exhausted"),
            Position::Interpreted(frame) => dbg.field("frame", frame),
            Position::Compiled(state) => dbg
                .field("frame", &state.frame)
                .field("inline_depth", &state.inline_depth),
        };
        dbg.finish()
    }
}

enum VRegSource<'a> {
    Interpreted { next: usize, count: usize },
    Compiled(std::slice::Iter<'a, VRegInfo>),
    Jni(JniArgIter<'a>),
    Dynamic(DynamicArgIter),
}

/// Iterator returned by [`StackWalker::vregs`]. Interpreted frames yield
/// their registers first and the accumulator last.
pub struct VRegs<'w, 'a> {
    walker: &'w StackWalker<'a>,
    source: VRegSource<'a>,
}

impl Iterator for VRegs<'_, '_> {
    type Item = (VRegInfo, VRegValue);

    fn next(&mut self) -> Option<Self::Item> {
        let info = match &mut self.source {
            VRegSource::Interpreted { next, count } => {
                if *next > *count {
                    return None;
                }
                let index = *next;
                *next += 1;
                let is_acc = index == *count;
                let frame = self.walker.iframe()?;
                let tag = if is_acc { frame.acc().1 } else { frame.vreg_tag(index) };
                VRegInfo::slot(index as i32, IFrame::vreg_type_for_tag(tag), vreg_index(index))
                    .with_acc(is_acc)
            }
            VRegSource::Compiled(infos) => *infos.by_ref().find(|info| info.is_live())?,
            VRegSource::Jni(iter) => iter.next()?,
            VRegSource::Dynamic(iter) => iter.next()?,
        };
        Some((info, self.walker.read_vreg(&info)))
    }
}
