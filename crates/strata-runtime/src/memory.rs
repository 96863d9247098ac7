//! Address spaces the walker can read frames from
//!
//! Frames are plain memory. The walker never dereferences a pointer
//! directly; it asks a [`StackMemory`] for little-endian words of a given
//! width. [`NativeMemory`] is the live process, [`SimulatedStack`] is a
//! byte buffer mapped at an arbitrary base address so that frames of any
//! architecture can be built and walked on any host.

use std::cell::RefCell;
use std::fmt;

/// A target address. Wide enough for every supported architecture.
pub type Address = u64;

/// Word-granular access to the memory that holds the call stack.
///
/// Writes take `&self`: the walker patches values in place (deoptimization
/// and debugger writes) while frames of the same stack are borrowed.
pub trait StackMemory {
    /// Reads `size` bytes (1, 2, 4 or 8) at `addr`, zero-extended.
    fn read_slot(&self, addr: Address, size: usize) -> u64;

    /// Writes the low `size` bytes of `value` at `addr`.
    fn write_slot(&self, addr: Address, size: usize, value: u64);
}

/// The current process's own memory.
#[derive(Debug, Clone, Copy)]
pub struct NativeMemory {
    _private: (),
}

impl NativeMemory {
    /// # Safety
    ///
    /// Every address later passed to this value must be valid for the
    /// requested access, and the thread owning the stack must be stopped at
    /// a safe point for as long as the value is used.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl StackMemory for NativeMemory {
    fn read_slot(&self, addr: Address, size: usize) -> u64 {
        let ptr = addr as usize as *const u8;
        // SAFETY: validity of `addr` is the contract of `NativeMemory::new`
        unsafe {
            match size {
                1 => u64::from(ptr.read()),
                2 => u64::from(ptr.cast::<u16>().read_unaligned()),
                4 => u64::from(ptr.cast::<u32>().read_unaligned()),
                8 => ptr.cast::<u64>().read_unaligned(),
                _ => panic!("unsupported access width {size}"),
            }
        }
    }

    fn write_slot(&self, addr: Address, size: usize, value: u64) {
        let ptr = addr as usize as *mut u8;
        // SAFETY: validity of `addr` is the contract of `NativeMemory::new`
        unsafe {
            match size {
                1 => ptr.write(value as u8),
                2 => ptr.cast::<u16>().write_unaligned(value as u16),
                4 => ptr.cast::<u32>().write_unaligned(value as u32),
                8 => ptr.cast::<u64>().write_unaligned(value),
                _ => panic!("unsupported access width {size}"),
            }
        }
    }
}

/// A zero-initialised byte buffer mapped at `[base, base + len)`.
///
/// Accesses outside the mapping panic; on a real stack they would fault.
pub struct SimulatedStack {
    base: Address,
    bytes: RefCell<Vec<u8>>,
}

impl SimulatedStack {
    pub fn new(base: Address, len: usize) -> Self {
        Self {
            base,
            bytes: RefCell::new(vec![0; len]),
        }
    }

    pub fn base(&self) -> Address {
        self.base
    }

    /// One past the highest mapped address. Stacks grow down from here.
    pub fn top(&self) -> Address {
        self.base + self.len() as Address
    }

    pub fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, addr: Address, size: usize) -> bool {
        addr >= self.base
            && addr
                .checked_add(size as Address)
                .is_some_and(|end| end <= self.top())
    }

    fn range(&self, addr: Address, size: usize) -> std::ops::Range<usize> {
        if !self.contains(addr, size) {
            panic!(
                "access of {size} bytes at {addr:#x} outside simulated stack [{:#x}, {:#x})",
                self.base,
                self.top()
            );
        }
        let start = (addr - self.base) as usize;
        start..start + size
    }
}

impl StackMemory for SimulatedStack {
    fn read_slot(&self, addr: Address, size: usize) -> u64 {
        assert!(size <= 8, "unsupported access width {size}");
        let range = self.range(addr, size);
        let mut word = [0u8; 8];
        word[..size].copy_from_slice(&self.bytes.borrow()[range]);
        u64::from_le_bytes(word)
    }

    fn write_slot(&self, addr: Address, size: usize, value: u64) {
        assert!(size <= 8, "unsupported access width {size}");
        let range = self.range(addr, size);
        self.bytes.borrow_mut()[range].copy_from_slice(&value.to_le_bytes()[..size]);
    }
}

impl fmt::Debug for SimulatedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedStack")
            .field("base", &format_args!("{:#x}", self.base))
            .field("len", &self.len())
            .finish()
    }
}
