//! Views over the frames that make up a call stack
//!
//! - [`CFrame`]: a compiled frame shaped by [`layout::CFrameLayout`]
//! - [`IFrame`]: an interpreter frame record
//! - [`boundary`]: the bridge records left where execution switches tier
//!
//! Views are cheap `Copy` handles: a memory reference, the architecture and
//! a frame address. They read and write through [`StackMemory`] and never
//! cache anything.
//!
//! [`StackMemory`]: crate::memory::StackMemory

pub mod boundary;
pub mod callee;
pub mod cframe;
pub mod iframe;
pub mod layout;

pub use callee::{CalleeStorage, SaveArea};
pub use cframe::CFrame;
pub use iframe::IFrame;
pub use layout::{CFrameKind, CFrameLayout, FrameBridgeKind};

use crate::arch::Arch;
use crate::memory::Address;

/// Address of pointer-sized slot `slots` away from `base` (positive is
/// toward higher addresses).
pub(crate) fn offset_slots(base: Address, arch: Arch, slots: i64) -> Address {
    base.wrapping_add_signed(slots * arch.pointer_size() as i64)
}
