//! Corrupted-stack conditions
//!
//! None of these are recoverable. A walker that loses track of the stack
//! cannot let managed code continue, so every variant is raised through
//! [`stack_corruption`], which logs and panics. Release builds abort on
//! panic.

use crate::memory::Address;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackCorruption {
    #[error("unknown boundary marker {marker:#x} in frame at {frame:#x}")]
    UnknownBoundaryMarker { frame: Address, marker: u64 },

    #[error("compiled frame at {frame:#x} has a null method")]
    NullMethod { frame: Address },

    #[error("method pointer {method:#x} in frame at {frame:#x} is not registered")]
    UnknownMethod { frame: Address, method: Address },

    #[error("callee-saved register {reg} has no save slot")]
    CalleeSlotMissing { reg: u32 },

    #[error("register {reg} is outside the {arch} register ranges")]
    RegisterOutOfRange { reg: u32, arch: &'static str },

    #[error("no stack map for method {method:#x} at native pc {npc:#x}")]
    MissingStackMap { method: Address, npc: u64 },

    #[error("constant pool index {index} out of range for method {method:#x}")]
    MissingConstant { method: Address, index: usize },

    #[error("object {object:#x} in {vreg} does not point to a reachable class")]
    UnreachableObject { object: Address, vreg: String },

    #[error("virtual register index {index} does not fit a register number")]
    VRegIndexOverflow { index: usize },

    #[error("{vreg} holds a reference in a {location} location")]
    InvalidObjectLocation {
        vreg: String,
        location: &'static str,
    },
}

/// Reports a corrupted stack and never returns.
#[cold]
#[track_caller]
pub fn stack_corruption(err: StackCorruption) -> ! {
    log::error!("stack corruption: {err}");
    panic!("stack corruption: {err}");
}
