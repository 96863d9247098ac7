//! ABI argument marshalling - counting, reading and writing call arguments
//!
//! Managed code calling into native code (and back) has to lay arguments out
//! exactly as the platform calling convention does. Three roles share that
//! job:
//! - [`ArgCounter`] sizes the GP-register, FP-register and stack areas
//! - [`ArgWriter`] stores values into those areas
//! - [`ArgReader`] loads them back in the same order
//!
//! All three drive the same [`ArgPlacer`] state machine, so their cursors can
//! never disagree about where an argument lives.
//!
//! # Placement rules
//!
//! - An argument occupies `max(size, register width)` bytes of its register
//!   area, aligned to that width.
//! - Once a register area is exhausted, further arguments of that class go to
//!   the stack, aligned to their natural size and advancing by at least one
//!   pointer.
//! - Without hardware FP argument registers, floats are passed as integers.
//! - 32-bit ARM hard-float back-fills single-precision values into the free
//!   half of a double register, until the first FP value lands on the stack.

use super::AbiTraits;

/// Machine-level class of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Integer { size: usize, signed: bool },
    Float { size: usize },
}

impl ArgKind {
    pub const fn size(&self) -> usize {
        match *self {
            ArgKind::Integer { size, .. } | ArgKind::Float { size } => size,
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, ArgKind::Float { .. })
    }

    /// Unsigned integer of pointer width.
    pub const fn pointer(pointer_size: usize) -> Self {
        ArgKind::Integer {
            size: pointer_size,
            signed: false,
        }
    }
}

/// Where a placed argument lives, as a byte offset into its area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgLocation {
    Gpr(usize),
    Fpr(usize),
    Stack(usize),
}

/// A Rust value that can travel through the calling convention.
///
/// `to_bits` yields the raw little-endian payload in the low `KIND.size()`
/// bytes; `from_bits` ignores anything above them.
pub trait AbiArg: Copy {
    const KIND: ArgKind;

    fn to_bits(self) -> u64;

    fn from_bits(bits: u64) -> Self;
}

macro_rules! impl_abi_int {
    ($($ty:ty => $unsigned:ty, $signed:expr);* $(;)?) => {
        $(
            impl AbiArg for $ty {
                const KIND: ArgKind = ArgKind::Integer {
                    size: std::mem::size_of::<$ty>(),
                    signed: $signed,
                };

                fn to_bits(self) -> u64 {
                    self as $unsigned as u64
                }

                fn from_bits(bits: u64) -> Self {
                    bits as $unsigned as $ty
                }
            }
        )*
    };
}

impl_abi_int! {
    i8 => u8, true;
    u8 => u8, false;
    i16 => u16, true;
    u16 => u16, false;
    i32 => u32, true;
    u32 => u32, false;
    i64 => u64, true;
    u64 => u64, false;
}

impl AbiArg for bool {
    const KIND: ArgKind = ArgKind::Integer {
        size: 1,
        signed: false,
    };

    fn to_bits(self) -> u64 {
        u64::from(self)
    }

    fn from_bits(bits: u64) -> Self {
        bits & 0xff != 0
    }
}

impl AbiArg for f32 {
    const KIND: ArgKind = ArgKind::Float { size: 4 };

    fn to_bits(self) -> u64 {
        u64::from(f32::to_bits(self))
    }

    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl AbiArg for f64 {
    const KIND: ArgKind = ArgKind::Float { size: 8 };

    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

pub(crate) const fn round_up(value: usize, align: usize) -> usize {
    if align == 0 {
        return value;
    }
    (value + align - 1) / align * align
}

/// The placement state machine shared by counter, reader and writer.
#[derive(Debug, Clone)]
pub struct ArgPlacer {
    abi: AbiTraits,
    gpr_bytes: usize,
    fpr_bytes: usize,
    stack_bytes: usize,
    stack_args: usize,
    /// Free upper half of a double register (32-bit ARM hard-float only)
    half_slot: Option<usize>,
    fp_on_stack: bool,
}

impl ArgPlacer {
    pub fn new(abi: AbiTraits) -> Self {
        Self {
            abi,
            gpr_bytes: 0,
            fpr_bytes: 0,
            stack_bytes: 0,
            stack_args: 0,
            half_slot: None,
            fp_on_stack: false,
        }
    }

    pub fn abi(&self) -> &AbiTraits {
        &self.abi
    }

    /// Decide where the next argument of `kind` goes and advance.
    pub fn place(&mut self, kind: ArgKind) -> ArgLocation {
        match kind {
            ArgKind::Float { size } if self.abi.hard_float => {
                if self.abi.packs_fp_halves() {
                    self.place_packed_fp(size)
                } else {
                    self.place_fp(size)
                }
            }
            _ => self.place_gp(kind.size()),
        }
    }

    fn place_gp(&mut self, size: usize) -> ArgLocation {
        let bytes = size.max(self.abi.pointer_size());
        self.gpr_bytes = round_up(self.gpr_bytes, bytes);
        if self.gpr_bytes < self.abi.gp_arg_num_bytes() {
            let offset = self.gpr_bytes;
            self.gpr_bytes += bytes;
            return ArgLocation::Gpr(offset);
        }
        self.place_stack(size)
    }

    fn place_fp(&mut self, size: usize) -> ArgLocation {
        let bytes = size.max(self.abi.fpr_size);
        self.fpr_bytes = round_up(self.fpr_bytes, bytes);
        if self.fpr_bytes < self.abi.fp_arg_num_bytes() {
            let offset = self.fpr_bytes;
            self.fpr_bytes += bytes;
            return ArgLocation::Fpr(offset);
        }
        self.place_stack(size)
    }

    /// AAPCS VFP allocation: singles take the lowest free `s` register
    /// (including the upper half of a double skipped earlier), doubles take
    /// the next even pair.
    fn place_packed_fp(&mut self, size: usize) -> ArgLocation {
        const SINGLE: usize = 4;
        const DOUBLE: usize = 8;
        let limit = self.abi.fp_arg_num_bytes();

        if !self.fp_on_stack {
            if size == SINGLE {
                if let Some(half) = self.half_slot.take() {
                    if half == self.fpr_bytes {
                        self.fpr_bytes += SINGLE;
                    }
                    return ArgLocation::Fpr(half);
                }
                if self.fpr_bytes < limit {
                    let offset = self.fpr_bytes;
                    self.half_slot = Some(offset + SINGLE);
                    self.fpr_bytes += SINGLE;
                    return ArgLocation::Fpr(offset);
                }
            } else {
                let offset = round_up(self.fpr_bytes, DOUBLE);
                if offset + DOUBLE <= limit {
                    self.fpr_bytes = offset + DOUBLE;
                    return ArgLocation::Fpr(offset);
                }
            }
        }
        self.fp_on_stack = true;
        self.place_stack(size)
    }

    fn place_stack(&mut self, size: usize) -> ArgLocation {
        self.stack_bytes = round_up(self.stack_bytes, size);
        let offset = self.stack_bytes;
        self.stack_bytes += size.max(self.abi.pointer_size());
        self.stack_args += 1;
        ArgLocation::Stack(offset)
    }
}

/// Sizes the argument areas for a call signature.
#[derive(Debug, Clone)]
pub struct ArgCounter {
    placer: ArgPlacer,
}

impl ArgCounter {
    pub fn new(abi: AbiTraits) -> Self {
        Self {
            placer: ArgPlacer::new(abi),
        }
    }

    pub fn count<T: AbiArg>(&mut self) {
        self.count_kind(T::KIND);
    }

    pub fn count_kind(&mut self, kind: ArgKind) -> ArgLocation {
        self.placer.place(kind)
    }

    pub fn gpr_arg_bytes(&self) -> usize {
        self.placer.gpr_bytes
    }

    pub fn fpr_arg_bytes(&self) -> usize {
        self.placer.fpr_bytes
    }

    pub fn stack_arg_bytes(&self) -> usize {
        self.placer.stack_bytes
    }

    /// Number of arguments that did not fit into registers.
    pub fn stack_spilled_args(&self) -> usize {
        self.placer.stack_args
    }

    /// Bytes to reserve for the whole argument block (register save areas
    /// plus stack arguments), rounded to a double word.
    pub fn stack_space_size(&self) -> usize {
        let abi = self.placer.abi();
        round_up(
            abi.fp_arg_num_bytes() + abi.gp_arg_num_bytes() + self.placer.stack_bytes,
            2 * abi.pointer_size(),
        )
    }

    /// [`stack_space_size`](Self::stack_space_size) in pointer-sized slots.
    pub fn stack_size(&self) -> usize {
        self.stack_space_size() / self.placer.abi().pointer_size()
    }
}

fn store(area: &mut [u8], offset: usize, size: usize, bits: u64) {
    area[offset..offset + size].copy_from_slice(&bits.to_le_bytes()[..size]);
}

fn load(area: &[u8], offset: usize, size: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..size].copy_from_slice(&area[offset..offset + size]);
    u64::from_le_bytes(bytes)
}

fn sign_extend(bits: u64, size: usize) -> u64 {
    let shift = 64 - 8 * size as u32;
    (((bits << shift) as i64) >> shift) as u64
}

/// Stores arguments into caller-provided register and stack areas.
///
/// Narrow integers headed for a GP register are widened to the full
/// register, sign- or zero-extended by their signedness.
pub struct ArgWriter<'a> {
    placer: ArgPlacer,
    gpr_args: &'a mut [u8],
    fpr_args: &'a mut [u8],
    stack_args: &'a mut [u8],
}

impl<'a> ArgWriter<'a> {
    pub fn new(
        abi: AbiTraits,
        gpr_args: &'a mut [u8],
        fpr_args: &'a mut [u8],
        stack_args: &'a mut [u8],
    ) -> Self {
        Self {
            placer: ArgPlacer::new(abi),
            gpr_args,
            fpr_args,
            stack_args,
        }
    }

    pub fn write<T: AbiArg>(&mut self, value: T) -> ArgLocation {
        self.write_bits(T::KIND, value.to_bits())
    }

    /// Untyped variant of [`write`](Self::write) for signatures only known
    /// at run time.
    pub fn write_bits(&mut self, kind: ArgKind, bits: u64) -> ArgLocation {
        let location = self.placer.place(kind);
        let size = kind.size();
        match location {
            ArgLocation::Gpr(offset) => {
                let width = self.placer.abi().pointer_size();
                match kind {
                    ArgKind::Integer { signed, .. } if size < width => {
                        let widened = if signed {
                            sign_extend(bits, size)
                        } else {
                            bits & ((1u64 << (8 * size)) - 1)
                        };
                        store(self.gpr_args, offset, width, widened);
                    }
                    _ => store(self.gpr_args, offset, size, bits),
                }
            }
            ArgLocation::Fpr(offset) => store(self.fpr_args, offset, size, bits),
            ArgLocation::Stack(offset) => store(self.stack_args, offset, size, bits),
        }
        location
    }
}

/// Loads arguments in the order an [`ArgWriter`] stored them.
pub struct ArgReader<'a> {
    placer: ArgPlacer,
    gpr_args: &'a [u8],
    fpr_args: &'a [u8],
    stack_args: &'a [u8],
}

impl<'a> ArgReader<'a> {
    pub fn new(
        abi: AbiTraits,
        gpr_args: &'a [u8],
        fpr_args: &'a [u8],
        stack_args: &'a [u8],
    ) -> Self {
        Self {
            placer: ArgPlacer::new(abi),
            gpr_args,
            fpr_args,
            stack_args,
        }
    }

    pub fn read<T: AbiArg>(&mut self) -> T {
        T::from_bits(self.read_bits(T::KIND))
    }

    pub fn read_bits(&mut self, kind: ArgKind) -> u64 {
        let size = kind.size();
        match self.placer.place(kind) {
            ArgLocation::Gpr(offset) => load(self.gpr_args, offset, size),
            ArgLocation::Fpr(offset) => load(self.fpr_args, offset, size),
            ArgLocation::Stack(offset) => load(self.stack_args, offset, size),
        }
    }
}
