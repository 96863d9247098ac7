use super::StackWalker;
use crate::error::{stack_corruption, StackCorruption};
use crate::memory::Address;
use crate::vreg::VRegLocation;
use log::debug;

/// Heap-side check used by stack verification.
pub trait ObjectInspector {
    /// True when `object` points to an object whose class can be reached.
    fn has_reachable_class(&self, object: Address) -> bool;
}

impl StackWalker<'_> {
    /// Walks the rest of the stack checking every reference.
    ///
    /// A reference must not live in an FP register or the constant pool,
    /// and when the context has an [`ObjectInspector`] every non-null
    /// reference must reach its class. Violations are fatal.
    pub fn verify(mut self) {
        let inspector = self.ctx.objects;
        let mut frames = 0usize;
        while self.has_frame() {
            let compiled = self.is_cframe();
            for (info, value) in self.objects() {
                if compiled
                    && matches!(
                        info.location,
                        VRegLocation::FpRegister | VRegLocation::Constant
                    )
                {
                    stack_corruption(StackCorruption::InvalidObjectLocation {
                        vreg: info.name(),
                        location: info.location.as_str(),
                    });
                }
                let (Some(inspector), Some(object)) = (inspector, value.as_reference()) else {
                    continue;
                };
                if !inspector.has_reachable_class(object) {
                    stack_corruption(StackCorruption::UnreachableObject {
                        object,
                        vreg: info.name(),
                    });
                }
            }
            frames += 1;
            self.next_frame();
        }
        debug!("verified {frames} frames");
    }
}
