//! Architecture descriptors
//!
//! Everything that determines the shape of a compiled frame on a given CPU:
//! pointer size, code alignment, and the caller-/callee-saved register sets.
//!
//! Each supported architecture has one immutable [`ArchTraits`] record. The
//! register-range helpers on [`Arch`] derive first/last/count values from the
//! masks in that record. A range spans any holes in its mask, so the count is
//! `last - first + 1`, not the population count.
//!
//! `Arch::None` only marks "no current architecture" for host tooling. Asking
//! it for any property is a programming error and panics.

pub mod abi;
pub mod marshal;

pub use abi::AbiTraits;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of CPU architectures the runtime knows how to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Arch {
    None,
    Aarch32,
    Aarch64,
    X86,
    X86_64,
}

/// Architecture of the process this crate was compiled for.
#[cfg(target_arch = "arm")]
pub const RUNTIME_ARCH: Arch = Arch::Aarch32;
#[cfg(target_arch = "aarch64")]
pub const RUNTIME_ARCH: Arch = Arch::Aarch64;
#[cfg(target_arch = "x86")]
pub const RUNTIME_ARCH: Arch = Arch::X86;
#[cfg(target_arch = "x86_64")]
pub const RUNTIME_ARCH: Arch = Arch::X86_64;
#[cfg(not(any(
    target_arch = "arm",
    target_arch = "aarch64",
    target_arch = "x86",
    target_arch = "x86_64"
)))]
pub const RUNTIME_ARCH: Arch = Arch::None;

/// Per-architecture constant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchTraits {
    pub code_alignment: usize,
    pub instruction_alignment: usize,
    pub instruction_max_size_bits: usize,
    pub pointer_size: usize,
    pub is_64_bits: bool,
    /// Register permanently holding the current thread pointer
    pub thread_reg: u32,
    pub caller_reg_mask: u32,
    pub caller_fp_reg_mask: u32,
    pub callee_reg_mask: u32,
    pub callee_fp_reg_mask: u32,
    pub supports_osr: bool,
    pub supports_deoptimization: bool,
}

const AARCH32_TRAITS: ArchTraits = ArchTraits {
    code_alignment: 8,
    instruction_alignment: 2,
    instruction_max_size_bits: 32,
    pointer_size: 4,
    is_64_bits: false,
    thread_reg: 10,
    caller_reg_mask: 0x0000_000f,
    caller_fp_reg_mask: 0x0000_ffff,
    callee_reg_mask: 0x0000_07f0,
    callee_fp_reg_mask: 0x0000_ff00,
    supports_osr: false,
    supports_deoptimization: true,
};

const AARCH64_TRAITS: ArchTraits = ArchTraits {
    code_alignment: 16,
    instruction_alignment: 4,
    instruction_max_size_bits: 32,
    pointer_size: 8,
    is_64_bits: true,
    thread_reg: 28,
    caller_reg_mask: 0x0007_ffff,
    caller_fp_reg_mask: 0xffff_00ff,
    callee_reg_mask: 0x1ff8_0000,
    callee_fp_reg_mask: 0x0000_ff00,
    supports_osr: true,
    supports_deoptimization: true,
};

const X86_TRAITS: ArchTraits = ArchTraits {
    code_alignment: 16,
    instruction_alignment: 1,
    instruction_max_size_bits: 8,
    pointer_size: 4,
    is_64_bits: false,
    thread_reg: 0,
    caller_reg_mask: 0,
    caller_fp_reg_mask: 0,
    callee_reg_mask: 0x0000_0001,
    callee_fp_reg_mask: 0x0000_0001,
    supports_osr: false,
    supports_deoptimization: false,
};

const X86_64_TRAITS: ArchTraits = ArchTraits {
    code_alignment: 16,
    instruction_alignment: 1,
    instruction_max_size_bits: 8,
    pointer_size: 8,
    is_64_bits: true,
    // %r15
    thread_reg: 15,
    // %rax, %rcx, %rdx, %rsi, %rdi, %r8, %r9, %r10, %r11
    caller_reg_mask: 0x0000_01ff,
    caller_fp_reg_mask: 0x0000_ffff,
    // %rbx, %r12, %r13, %r14, %r15
    callee_reg_mask: 0x0000_f800,
    // xmm registers are all volatile in the SysV ABI
    callee_fp_reg_mask: 0,
    supports_osr: false,
    supports_deoptimization: true,
};

/// A contiguous register range derived from a save mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegRange {
    pub first: u32,
    pub last: u32,
}

impl RegRange {
    /// Empty range: `first > last` and `count() == 0`.
    pub const EMPTY: RegRange = RegRange { first: 1, last: 0 };

    pub const fn from_mask(mask: u32) -> Self {
        if mask == 0 {
            return Self::EMPTY;
        }
        RegRange {
            first: mask.trailing_zeros(),
            last: 31 - mask.leading_zeros(),
        }
    }

    pub const fn count(&self) -> usize {
        if self.first > self.last {
            0
        } else {
            (self.last - self.first + 1) as usize
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub const fn contains(&self, reg: u32) -> bool {
        reg >= self.first && reg <= self.last
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.first..=self.last
    }
}

impl Arch {
    /// Every architecture that has a traits table.
    pub const ALL: [Arch; 4] = [Arch::Aarch32, Arch::Aarch64, Arch::X86, Arch::X86_64];

    /// Constant table for this architecture.
    ///
    /// # Panics
    ///
    /// Panics for `Arch::None`.
    pub const fn traits(self) -> &'static ArchTraits {
        match self {
            Arch::Aarch32 => &AARCH32_TRAITS,
            Arch::Aarch64 => &AARCH64_TRAITS,
            Arch::X86 => &X86_TRAITS,
            Arch::X86_64 => &X86_64_TRAITS,
            Arch::None => panic!("Arch::None has no architecture traits"),
        }
    }

    pub const fn pointer_size(self) -> usize {
        self.traits().pointer_size
    }

    pub const fn is_64_bits(self) -> bool {
        self.traits().is_64_bits
    }

    pub const fn code_alignment(self) -> usize {
        self.traits().code_alignment
    }

    pub const fn instruction_alignment(self) -> usize {
        self.traits().instruction_alignment
    }

    pub const fn instruction_max_size_bits(self) -> usize {
        self.traits().instruction_max_size_bits
    }

    pub const fn thread_reg(self) -> u32 {
        self.traits().thread_reg
    }

    pub const fn supports_osr(self) -> bool {
        self.traits().supports_osr
    }

    pub const fn supports_deoptimization(self) -> bool {
        self.traits().supports_deoptimization
    }

    // ── Register sets ──────────────────────────────────────────────────

    pub const fn caller_regs_mask(self, is_fp: bool) -> u32 {
        let traits = self.traits();
        if is_fp {
            traits.caller_fp_reg_mask
        } else {
            traits.caller_reg_mask
        }
    }

    pub const fn callee_regs_mask(self, is_fp: bool) -> u32 {
        let traits = self.traits();
        if is_fp {
            traits.callee_fp_reg_mask
        } else {
            traits.callee_reg_mask
        }
    }

    pub const fn callee_regs(self, is_fp: bool) -> RegRange {
        RegRange::from_mask(self.callee_regs_mask(is_fp))
    }

    pub const fn caller_regs(self, is_fp: bool) -> RegRange {
        RegRange::from_mask(self.caller_regs_mask(is_fp))
    }

    pub const fn first_callee_reg(self, is_fp: bool) -> u32 {
        self.callee_regs(is_fp).first
    }

    pub const fn last_callee_reg(self, is_fp: bool) -> u32 {
        self.callee_regs(is_fp).last
    }

    pub const fn callee_regs_count(self, is_fp: bool) -> usize {
        self.callee_regs(is_fp).count()
    }

    pub const fn first_caller_reg(self, is_fp: bool) -> u32 {
        self.caller_regs(is_fp).first
    }

    pub const fn last_caller_reg(self, is_fp: bool) -> u32 {
        self.caller_regs(is_fp).last
    }

    pub const fn caller_regs_count(self, is_fp: bool) -> usize {
        self.caller_regs(is_fp).count()
    }

    // ── Names ──────────────────────────────────────────────────────────

    /// Lenient lookup used by tooling: unknown names map to `Arch::None`.
    pub fn from_name(name: &str) -> Arch {
        match name {
            "arm64" => Arch::Aarch64,
            "arm" => Arch::Aarch32,
            "x86" => Arch::X86,
            "x86_64" => Arch::X86_64,
            _ => Arch::None,
        }
    }

    /// Short lowercase name, the inverse of [`Arch::from_name`].
    pub const fn name(self) -> &'static str {
        match self {
            Arch::Aarch64 => "arm64",
            Arch::Aarch32 => "arm",
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::None => "none",
        }
    }

    /// Upper-case identifier used in dumps.
    pub const fn display_name(self) -> &'static str {
        match self {
            Arch::None => "NONE",
            Arch::Aarch32 => "AARCH32",
            Arch::Aarch64 => "AARCH64",
            Arch::X86 => "X86",
            Arch::X86_64 => "X86_64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Error returned when parsing an architecture name strictly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown architecture '{0}' (expected one of: arm, arm64, x86, x86_64, host)")]
pub struct ArchParseError(pub String);

impl FromStr for Arch {
    type Err = ArchParseError;

    /// Strict parse. Accepts `host` for [`RUNTIME_ARCH`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let arch = match lowered.as_str() {
            "host" => RUNTIME_ARCH,
            "aarch64" => Arch::Aarch64,
            "aarch32" | "arm32" => Arch::Aarch32,
            "amd64" => Arch::X86_64,
            other => Arch::from_name(other),
        };
        if arch == Arch::None {
            return Err(ArchParseError(s.to_string()));
        }
        Ok(arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Arch::Aarch32, false, 4, 10, 7)]
    #[case(Arch::Aarch32, true, 8, 15, 8)]
    #[case(Arch::Aarch64, false, 19, 28, 10)]
    #[case(Arch::Aarch64, true, 8, 15, 8)]
    #[case(Arch::X86, false, 0, 0, 1)]
    #[case(Arch::X86_64, false, 11, 15, 5)]
    fn test_callee_ranges(
        #[case] arch: Arch,
        #[case] is_fp: bool,
        #[case] first: u32,
        #[case] last: u32,
        #[case] count: usize,
    ) {
        assert_eq!(arch.first_callee_reg(is_fp), first);
        assert_eq!(arch.last_callee_reg(is_fp), last);
        assert_eq!(arch.callee_regs_count(is_fp), count);
    }

    #[rstest]
    #[case(Arch::Aarch32, false, 4)]
    #[case(Arch::Aarch32, true, 16)]
    #[case(Arch::Aarch64, false, 19)]
    #[case(Arch::Aarch64, true, 32)]
    #[case(Arch::X86, false, 0)]
    #[case(Arch::X86, true, 0)]
    #[case(Arch::X86_64, false, 9)]
    #[case(Arch::X86_64, true, 16)]
    fn test_caller_counts(#[case] arch: Arch, #[case] is_fp: bool, #[case] count: usize) {
        assert_eq!(arch.caller_regs_count(is_fp), count);
    }

    #[test]
    fn test_x86_64_fp_callee_set_is_empty() {
        let range = Arch::X86_64.callee_regs(true);
        assert!(range.first > range.last);
        assert_eq!(range.count(), 0);
        assert_eq!(range.iter().count(), 0);
    }

    #[test]
    fn test_ranges_are_ordered_unless_empty() {
        for arch in Arch::ALL {
            for is_fp in [false, true] {
                for range in [arch.callee_regs(is_fp), arch.caller_regs(is_fp)] {
                    if range.count() == 0 {
                        assert!(range.first > range.last);
                    } else {
                        assert!(range.first <= range.last);
                    }
                }
            }
        }
    }

    #[test]
    fn test_pointer_sizes() {
        assert_eq!(Arch::Aarch32.pointer_size(), 4);
        assert_eq!(Arch::Aarch64.pointer_size(), 8);
        assert_eq!(Arch::X86.pointer_size(), 4);
        assert_eq!(Arch::X86_64.pointer_size(), 8);
        assert!(Arch::Aarch64.supports_osr());
        assert!(!Arch::X86.supports_deoptimization());
    }

    #[test]
    #[should_panic(expected = "Arch::None")]
    fn test_none_has_no_traits() {
        let _ = Arch::None.pointer_size();
    }

    #[test]
    fn test_name_round_trip() {
        for arch in Arch::ALL {
            assert_eq!(Arch::from_name(arch.name()), arch);
        }
        assert_eq!(Arch::from_name("mips"), Arch::None);
        assert_eq!(Arch::None.name(), "none");
    }

    #[test]
    fn test_strict_parse() {
        assert_eq!("ARM64".parse::<Arch>(), Ok(Arch::Aarch64));
        assert_eq!("amd64".parse::<Arch>(), Ok(Arch::X86_64));
        assert!("sparc".parse::<Arch>().is_err());
        assert_eq!(Arch::Aarch64.to_string(), "AARCH64");
    }
}
