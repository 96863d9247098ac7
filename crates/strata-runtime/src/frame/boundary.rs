//! Boundary records left where execution crosses between tiers
//!
//! Both sides store a previous-frame pointer, a bridge marker and a return
//! address around a base pointer, at different offsets:
//!
//! | side        | marker | prev | return | callee saves |
//! |-------------|--------|------|--------|--------------|
//! | interpreter | +1p    | 0    | +2p    | -1p          |
//! | compiler    | -1p    | 0    | +1p    | -2p          |
//!
//! A compiled frame keeps its method pointer where the compiler-side marker
//! goes, so a marker value that is not a known bridge kind is read as a
//! method pointer.

use super::layout::FrameBridgeKind;
use super::offset_slots;
use crate::arch::Arch;
use crate::error::{stack_corruption, StackCorruption};
use crate::memory::{Address, StackMemory};

/// Pointer-slot offsets of a boundary record relative to its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryGeometry {
    pub marker: i64,
    pub prev: i64,
    pub return_address: i64,
    pub callee_stack: i64,
}

pub const INTERPRETER_BOUNDARY: BoundaryGeometry = BoundaryGeometry {
    marker: 1,
    prev: 0,
    return_address: 2,
    callee_stack: -1,
};

pub const COMPILER_BOUNDARY: BoundaryGeometry = BoundaryGeometry {
    marker: -1,
    prev: 0,
    return_address: 1,
    callee_stack: -2,
};

/// Values up to this bound in a compiler-side marker slot are reserved for
/// markers and can never be method pointers.
pub const MAX_RESERVED_MARKER: u64 = 0xfff;

fn read(memory: &dyn StackMemory, arch: Arch, ptr: Address, offset: i64) -> u64 {
    memory.read_slot(offset_slots(ptr, arch, offset), arch.pointer_size())
}

pub fn prev(memory: &dyn StackMemory, arch: Arch, geometry: BoundaryGeometry, ptr: Address) -> Address {
    read(memory, arch, ptr, geometry.prev)
}

pub fn marker(memory: &dyn StackMemory, arch: Arch, geometry: BoundaryGeometry, ptr: Address) -> u64 {
    read(memory, arch, ptr, geometry.marker)
}

pub fn return_address(
    memory: &dyn StackMemory,
    arch: Arch,
    geometry: BoundaryGeometry,
    ptr: Address,
) -> u64 {
    read(memory, arch, ptr, geometry.return_address)
}

/// Address below which the boundary saved the callee registers.
pub fn callee_stack(arch: Arch, geometry: BoundaryGeometry, ptr: Address) -> Address {
    offset_slots(ptr, arch, geometry.callee_stack)
}

/// What the compiler-side marker slot of a frame holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerMarker {
    /// Interpreter called into compiled code
    I2C,
    /// Compiled code called a runtime stub directly
    Bypass,
    Method(Address),
}

/// Classifies the compiler-side marker of the frame at `frame`.
///
/// A null value and unassigned reserved values are fatal: they mean the
/// frame pointer chain led somewhere that is not a frame.
pub fn classify_compiler_marker(frame: Address, marker: u64) -> CompilerMarker {
    match marker {
        0 => stack_corruption(StackCorruption::NullMethod { frame }),
        m if m == FrameBridgeKind::InterpreterToCompiledCode.marker() => CompilerMarker::I2C,
        m if m == FrameBridgeKind::Bypass.marker() => CompilerMarker::Bypass,
        m if m <= MAX_RESERVED_MARKER => {
            stack_corruption(StackCorruption::UnknownBoundaryMarker { frame, marker: m })
        }
        method => CompilerMarker::Method(method),
    }
}

pub fn compiler_marker(memory: &dyn StackMemory, arch: Arch, frame: Address) -> CompilerMarker {
    let value = marker(memory, arch, COMPILER_BOUNDARY, frame);
    classify_compiler_marker(frame, value)
}

/// True when `ptr` is an interpreter-side record of a compiled-to-interpreter
/// transition.
pub fn is_interpreter_boundary(memory: &dyn StackMemory, arch: Arch, ptr: Address) -> bool {
    marker(memory, arch, INTERPRETER_BOUNDARY, ptr)
        == FrameBridgeKind::CompiledCodeToInterpreter.marker()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SimulatedStack;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1, CompilerMarker::I2C)]
    #[case(3, CompilerMarker::Bypass)]
    #[case(0x1000, CompilerMarker::Method(0x1000))]
    #[case(0xdead_beef, CompilerMarker::Method(0xdead_beef))]
    fn test_classify(#[case] marker: u64, #[case] expected: CompilerMarker) {
        assert_eq!(classify_compiler_marker(0x100, marker), expected);
    }

    #[rstest]
    #[case(2)]
    #[case(4)]
    #[case(0xfff)]
    #[should_panic(expected = "unknown boundary marker")]
    fn test_reserved_markers_are_fatal(#[case] marker: u64) {
        classify_compiler_marker(0x100, marker);
    }

    #[test]
    #[should_panic(expected = "null method")]
    fn test_null_marker_is_fatal() {
        classify_compiler_marker(0x100, 0);
    }

    #[test]
    fn test_geometry_reads() {
        let stack = SimulatedStack::new(0x1000, 0x100);
        let arch = Arch::Aarch64;
        stack.write_slot(0x1040, 8, 0x1080);
        stack.write_slot(0x1048, 8, 2);
        stack.write_slot(0x1050, 8, 0x4242);

        assert!(is_interpreter_boundary(&stack, arch, 0x1040));
        assert_eq!(prev(&stack, arch, INTERPRETER_BOUNDARY, 0x1040), 0x1080);
        assert_eq!(return_address(&stack, arch, INTERPRETER_BOUNDARY, 0x1040), 0x4242);
        assert_eq!(callee_stack(arch, INTERPRETER_BOUNDARY, 0x1040), 0x1038);

        stack.write_slot(0x1018, 8, 1);
        assert_eq!(compiler_marker(&stack, arch, 0x1020), CompilerMarker::I2C);
        assert_eq!(callee_stack(arch, COMPILER_BOUNDARY, 0x1020), 0x1010);
    }
}
