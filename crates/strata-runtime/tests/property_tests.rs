//! Property tests for frame layout and argument marshalling

use proptest::prelude::*;
use strata_runtime::frame::layout::OffsetUnit;
use strata_runtime::{AbiTraits, ArgCounter, ArgKind, ArgReader, ArgWriter, Arch, CFrameLayout};

fn any_arch() -> impl Strategy<Value = Arch> {
    prop::sample::select(Arch::ALL.to_vec())
}

fn any_abi() -> impl Strategy<Value = AbiTraits> {
    prop::sample::select(vec![
        Arch::Aarch64.abi(),
        Arch::X86_64.abi(),
        Arch::X86.abi(),
        AbiTraits::aarch32(false),
        AbiTraits::aarch32(true),
    ])
}

fn any_kind() -> impl Strategy<Value = ArgKind> {
    prop_oneof![
        (prop::sample::select(vec![1usize, 2, 4, 8]), any::<bool>())
            .prop_map(|(size, signed)| ArgKind::Integer { size, signed }),
        prop::sample::select(vec![4usize, 8]).prop_map(|size| ArgKind::Float { size }),
    ]
}

fn mask(size: usize) -> u64 {
    if size == 8 {
        u64::MAX
    } else {
        (1u64 << (8 * size)) - 1
    }
}

proptest! {
    #[test]
    fn layout_regions_ascend(arch in any_arch(), spills in 0usize..512) {
        let layout = CFrameLayout::new(arch, spills);
        let regions = layout.regions();
        for pair in regions.windows(2) {
            prop_assert!(pair[0].start + pair[0].size as isize <= pair[1].start);
        }
        prop_assert_eq!(
            layout.frame_size(OffsetUnit::Bytes),
            layout.frame_size(OffsetUnit::Slots) * arch.pointer_size()
        );
        prop_assert!(layout.slots_count() >= spills);
    }

    #[test]
    fn layout_is_deterministic(arch in any_arch(), spills in 0usize..512) {
        prop_assert_eq!(CFrameLayout::new(arch, spills), CFrameLayout::new(arch, spills));
        prop_assert_eq!(
            CFrameLayout::new(arch, spills).regions(),
            CFrameLayout::new(arch, spills).regions()
        );
    }

    #[test]
    fn marshalled_arguments_round_trip(
        abi in any_abi(),
        args in prop::collection::vec((any_kind(), any::<u64>()), 0..24),
    ) {
        let mut counter = ArgCounter::new(abi);
        for (kind, _) in &args {
            counter.count_kind(*kind);
        }
        let mut gpr = vec![0u8; abi.gp_arg_num_bytes()];
        let mut fpr = vec![0u8; abi.fp_arg_num_bytes()];
        let mut stack = vec![0u8; counter.stack_arg_bytes()];

        let mut writer = ArgWriter::new(abi, &mut gpr, &mut fpr, &mut stack);
        for (kind, bits) in &args {
            writer.write_bits(*kind, *bits);
        }

        let mut reader = ArgReader::new(abi, &gpr, &fpr, &stack);
        for (kind, bits) in &args {
            prop_assert_eq!(reader.read_bits(*kind), bits & mask(kind.size()));
        }
    }
}

#[test]
fn test_callee_ranges_are_consistent() {
    for arch in Arch::ALL {
        for is_fp in [false, true] {
            let count = arch.callee_regs_count(is_fp);
            if count == 0 {
                assert!(arch.callee_regs(is_fp).is_empty(), "{arch} fp={is_fp}");
            } else {
                assert!(arch.first_callee_reg(is_fp) <= arch.last_callee_reg(is_fp));
                assert_eq!(
                    count,
                    (arch.last_callee_reg(is_fp) - arch.first_callee_reg(is_fp) + 1) as usize
                );
            }
        }
    }
}
