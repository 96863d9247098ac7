//! Argument locations of a native (JNI) method's compiled frame
//!
//! A native frame's prologue stores the incoming argument registers into
//! its caller-saved area: FP argument registers first (lowest address), GP
//! argument registers above them. Arguments that did not fit arrive on the
//! caller's stack, right above the return address. Walking the signature
//! with the same [`ArgPlacer`] the call used gives every argument's slot.

use crate::arch::marshal::{ArgCounter, ArgKind, ArgLocation, ArgPlacer};
use crate::arch::AbiTraits;
use crate::frame::layout::{CFrameLayout, STACK_START_SLOT};
use crate::method::{Method, TypeId};
use crate::vreg::VRegInfo;
use std::iter::FusedIterator;

/// Register-area slot of the first word above the return address.
pub const CALLER_STACK_ARGS_SLOT: i32 = -11;

/// Where the saved argument registers sit in the register area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgRegSlots {
    pointer_size: usize,
    /// Slot of FP argument byte 0
    pub fp_begin: i32,
    /// Slot of GP argument byte 0
    pub gpr_begin: i32,
}

impl ArgRegSlots {
    /// Every architecture, 32-bit ARM included, derives its bases from the
    /// caller-saved area; ARM does not pin the register block at slot 24.
    pub fn new(abi: &AbiTraits) -> Self {
        let layout = CFrameLayout::new(abi.arch, 0);
        let mut in_regs = (layout.caller_regs_start_slot() - STACK_START_SLOT) as i32;
        if abi.arch == crate::arch::Arch::X86_64 {
            in_regs += 1;
        }
        let pointer_size = abi.pointer_size();
        let fp_words = (abi.fp_arg_num_bytes() / pointer_size) as i32;
        let gp_words = abi.num_gp_arg_regs as i32;
        let fp_begin = in_regs - 1 + fp_words;
        Self {
            pointer_size,
            fp_begin,
            gpr_begin: fp_begin + gp_words,
        }
    }

    /// Register-area slot holding the first word of an argument placed at
    /// `location`.
    pub fn slot_of(&self, location: ArgLocation) -> i32 {
        let words = |offset: usize| (offset / self.pointer_size) as i32;
        match location {
            ArgLocation::Gpr(offset) => self.gpr_begin - words(offset),
            ArgLocation::Fpr(offset) => self.fp_begin - words(offset),
            ArgLocation::Stack(offset) => CALLER_STACK_ARGS_SLOT - words(offset),
        }
    }
}

/// Yields one [`VRegInfo`] per managed argument of a native method: the
/// receiver for instance methods, then each declared parameter.
///
/// The leading `Method*` argument is placed but not reported.
#[derive(Debug, Clone)]
pub struct JniArgIter<'a> {
    placer: ArgPlacer,
    slots: ArgRegSlots,
    receiver: bool,
    params: &'a [TypeId],
    position: usize,
}

impl<'a> JniArgIter<'a> {
    pub fn new(abi: AbiTraits, method: &'a Method) -> Self {
        let mut placer = ArgPlacer::new(abi);
        placer.place(ArgKind::pointer(abi.pointer_size()));
        Self {
            placer,
            slots: ArgRegSlots::new(&abi),
            receiver: !method.is_static,
            params: method.shorty.params(),
            position: 0,
        }
    }

    fn total(&self) -> usize {
        self.params.len() + usize::from(self.receiver)
    }

    fn type_at(&self, position: usize) -> TypeId {
        match (self.receiver, position) {
            (true, 0) => TypeId::Reference,
            (true, p) => self.params[p - 1],
            (false, p) => self.params[p],
        }
    }
}

impl Iterator for JniArgIter<'_> {
    type Item = VRegInfo;

    fn next(&mut self) -> Option<VRegInfo> {
        if self.position >= self.total() {
            return None;
        }
        let ty = self.type_at(self.position);
        let pointer_size = self.placer.abi().pointer_size();
        let kind = ty.arg_kind(pointer_size)?;
        let location = self.placer.place(kind);
        let info = VRegInfo::slot(
            self.slots.slot_of(location),
            ty.vreg_type(),
            super::vreg_index(self.position),
        );
        self.position += 1;
        Some(info)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total() - self.position;
        (left, Some(left))
    }
}

impl ExactSizeIterator for JniArgIter<'_> {}

impl FusedIterator for JniArgIter<'_> {}

impl PartialEq for JniArgIter<'_> {
    fn eq(&self, other: &Self) -> bool {
        let left = self.len();
        if left == 0 || other.len() == 0 {
            return left == other.len();
        }
        self.slots == other.slots
            && self.receiver == other.receiver
            && self.params == other.params
            && self.position == other.position
    }
}

/// Bytes of stack arguments a call to `method` through `abi` pushes.
pub fn stack_arg_bytes(abi: AbiTraits, method: &Method) -> usize {
    let pointer_size = abi.pointer_size();
    let mut counter = ArgCounter::new(abi);
    counter.count_kind(ArgKind::pointer(pointer_size));
    if !method.is_static {
        counter.count_kind(ArgKind::pointer(pointer_size));
    }
    for kind in method
        .shorty
        .params()
        .iter()
        .filter_map(|ty| ty.arg_kind(pointer_size))
    {
        counter.count_kind(kind);
    }
    counter.stack_arg_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Arch;
    use crate::method::Shorty;
    use crate::vreg::VRegType;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn method(shorty: &str) -> Method {
        Method::new("test", Shorty::parse(shorty).unwrap()).native()
    }

    fn slots(iter: JniArgIter<'_>) -> Vec<i32> {
        iter.map(|info| info.value).collect()
    }

    #[rstest]
    #[case(Arch::Aarch64.abi(), 25, 33)]
    #[case(AbiTraits::aarch32(true), 30, 34)]
    #[case(AbiTraits::aarch32(false), 14, 18)]
    #[case(Arch::X86_64.abi(), 13, 19)]
    #[case(Arch::X86.abi(), 1, 1)]
    fn test_register_bases(#[case] abi: AbiTraits, #[case] fp_begin: i32, #[case] gpr_begin: i32) {
        let slots = ArgRegSlots::new(&abi);
        assert_eq!((slots.fp_begin, slots.gpr_begin), (fp_begin, gpr_begin));
    }

    #[test]
    fn test_len_matches_yielded_args() {
        let shorty = Shorty::new(TypeId::Void, [TypeId::I32, TypeId::Void]);
        let m = Method::new("test", shorty).native();
        let iter = JniArgIter::new(Arch::X86_64.abi(), &m);
        assert_eq!(iter.len(), 1);
        assert_eq!(iter.count(), 1);
    }

    #[test]
    fn test_static_float_on_aarch64() {
        let m = method("VF");
        let mut iter = JniArgIter::new(Arch::Aarch64.abi(), &m);
        assert_eq!(iter.len(), 1);
        let info = iter.next().unwrap();
        assert_eq!(info.value, 25);
        assert_eq!(info.vtype, VRegType::Float32);
        assert_eq!(info.index, 0);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_instance_method_reports_receiver() {
        let m = method("VIJ").instance();
        let infos: Vec<_> = JniArgIter::new(Arch::Aarch64.abi(), &m).collect();
        // Method* in x0, receiver x1, int x2, long x3
        assert_eq!(infos.iter().map(|i| i.value).collect::<Vec<_>>(), vec![32, 31, 30]);
        assert_eq!(infos[0].vtype, VRegType::Object);
        assert_eq!(infos[2].vtype, VRegType::Int64);
    }

    #[test]
    fn test_overflow_goes_to_caller_stack() {
        let m = method("VIIIIIIIII");
        let got = slots(JniArgIter::new(Arch::Aarch64.abi(), &m));
        // x1..x7 take seven ints, the last two go above the return address
        assert_eq!(got, vec![32, 31, 30, 29, 28, 27, 26, -11, -12]);
        assert_eq!(stack_arg_bytes(Arch::Aarch64.abi(), &m), 16);
    }

    #[test]
    fn test_x86_everything_on_stack() {
        let m = method("VIJ");
        let got = slots(JniArgIter::new(Arch::X86.abi(), &m));
        // Method* at -11, int at -12, long at -13/-14
        assert_eq!(got, vec![-12, -13]);
        assert_eq!(stack_arg_bytes(Arch::X86.abi(), &m), 16);
    }

    #[test]
    fn test_aarch32_long_skips_odd_register() {
        let m = method("VIJ");
        let got = slots(JniArgIter::new(AbiTraits::aarch32(false), &m));
        // r0 Method*, r1 int, r2/r3 long
        assert_eq!(got, vec![17, 16]);
    }

    #[test]
    fn test_exhausted_iterators_compare_equal() {
        let a = method("VI");
        let b = method("VDD");
        let mut left = JniArgIter::new(Arch::Aarch64.abi(), &a);
        let mut right = JniArgIter::new(Arch::X86_64.abi(), &b);
        assert_ne!(left, right);
        left.by_ref().for_each(drop);
        right.by_ref().for_each(drop);
        assert_eq!(left, right);
    }
}
