//! Argument-passing conventions per architecture

use super::Arch;
use serde::Serialize;

/// Calling-convention record: how many arguments travel in registers and
/// whether floating-point values get their own register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbiTraits {
    pub arch: Arch,
    pub num_gp_arg_regs: usize,
    pub num_fp_arg_regs: usize,
    pub gpr_size: usize,
    /// Width of one FP argument register; zero when `hard_float` is false.
    pub fpr_size: usize,
    pub hard_float: bool,
}

impl AbiTraits {
    /// Default calling convention of `arch`.
    ///
    /// For 32-bit ARM the soft-float variant is the default unless the
    /// `arm32-hard-float` feature is enabled.
    ///
    /// # Panics
    ///
    /// Panics for `Arch::None`.
    pub const fn for_arch(arch: Arch) -> Self {
        match arch {
            Arch::Aarch32 => Self::aarch32(cfg!(feature = "arm32-hard-float")),
            Arch::Aarch64 => AbiTraits {
                arch,
                num_gp_arg_regs: 8,
                num_fp_arg_regs: 8,
                gpr_size: 8,
                fpr_size: 8,
                hard_float: true,
            },
            Arch::X86_64 => AbiTraits {
                arch,
                num_gp_arg_regs: 6,
                num_fp_arg_regs: 8,
                gpr_size: 8,
                fpr_size: 8,
                hard_float: true,
            },
            // cdecl: everything goes through the stack
            Arch::X86 => AbiTraits {
                arch,
                num_gp_arg_regs: 0,
                num_fp_arg_regs: 0,
                gpr_size: 4,
                fpr_size: 0,
                hard_float: false,
            },
            Arch::None => panic!("Arch::None has no calling convention"),
        }
    }

    /// 32-bit ARM AAPCS, either with VFP argument registers (`s0`-`s15`)
    /// or with floats passed in core registers.
    pub const fn aarch32(hard_float: bool) -> Self {
        if hard_float {
            AbiTraits {
                arch: Arch::Aarch32,
                num_gp_arg_regs: 4,
                num_fp_arg_regs: 16,
                gpr_size: 4,
                fpr_size: 4,
                hard_float: true,
            }
        } else {
            AbiTraits {
                arch: Arch::Aarch32,
                num_gp_arg_regs: 4,
                num_fp_arg_regs: 0,
                gpr_size: 4,
                fpr_size: 0,
                hard_float: false,
            }
        }
    }

    pub const fn pointer_size(&self) -> usize {
        self.arch.pointer_size()
    }

    pub const fn gp_arg_num_bytes(&self) -> usize {
        self.num_gp_arg_regs * self.pointer_size()
    }

    pub const fn fp_arg_num_bytes(&self) -> usize {
        self.num_fp_arg_regs * self.pointer_size()
    }

    /// 32-bit ARM hard-float packs pairs of singles into one double register.
    pub const fn packs_fp_halves(&self) -> bool {
        matches!(self.arch, Arch::Aarch32) && self.hard_float
    }
}

impl Arch {
    /// Default calling convention for this architecture.
    pub const fn abi(self) -> AbiTraits {
        AbiTraits::for_arch(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Arch::Aarch64, 8, 8, 64, 64)]
    #[case(Arch::X86_64, 6, 8, 48, 64)]
    #[case(Arch::X86, 0, 0, 0, 0)]
    fn test_arg_register_budgets(
        #[case] arch: Arch,
        #[case] gp: usize,
        #[case] fp: usize,
        #[case] gp_bytes: usize,
        #[case] fp_bytes: usize,
    ) {
        let abi = arch.abi();
        assert_eq!(abi.num_gp_arg_regs, gp);
        assert_eq!(abi.num_fp_arg_regs, fp);
        assert_eq!(abi.gp_arg_num_bytes(), gp_bytes);
        assert_eq!(abi.fp_arg_num_bytes(), fp_bytes);
    }

    #[test]
    fn test_aarch32_variants() {
        let soft = AbiTraits::aarch32(false);
        assert!(!soft.hard_float);
        assert_eq!(soft.fp_arg_num_bytes(), 0);
        assert!(!soft.packs_fp_halves());

        let hard = AbiTraits::aarch32(true);
        assert_eq!(hard.num_fp_arg_regs, 16);
        assert_eq!(hard.fpr_size, 4);
        assert_eq!(hard.fp_arg_num_bytes(), 64);
        assert!(hard.packs_fp_halves());
    }

    #[test]
    fn test_default_aarch32_follows_feature() {
        assert_eq!(
            Arch::Aarch32.abi().hard_float,
            cfg!(feature = "arm32-hard-float")
        );
    }
}
