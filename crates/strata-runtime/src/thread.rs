//! What a stopped thread tells the walker about its stack

use crate::memory::Address;

/// Top-of-stack state of a thread stopped at a safe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadSnapshot {
    /// Youngest frame: an interpreter frame, a compiled frame, or the
    /// compiled-to-interpreter record of a runtime call
    pub current_frame: Address,
    pub is_compiled: bool,
    /// Native pc at the last managed-to-native transition
    pub native_pc: u64,
}

impl ThreadSnapshot {
    pub fn interpreted(frame: Address) -> Self {
        Self {
            current_frame: frame,
            is_compiled: false,
            native_pc: 0,
        }
    }

    pub fn compiled(frame: Address, native_pc: u64) -> Self {
        Self {
            current_frame: frame,
            is_compiled: true,
            native_pc,
        }
    }
}
