//! Strata Runtime - stack introspection and calling conventions
//!
//! This library answers "what is on the call stack, and where does each
//! value live?" for a VM that mixes interpreted and compiled frames:
//! - Per-architecture register and ABI descriptors
//! - Compiled-frame layout and argument marshalling
//! - Argument location iterators for native and dynamic frames
//! - A stack walker that crosses interpreter/compiler boundaries
//!
//! Every algorithm takes an explicit [`Arch`], so frames of any supported
//! architecture can be built and inspected on any host.

/// Strata runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod arch;
pub mod builder;
pub mod error;
pub mod frame;
pub mod memory;
pub mod method;
pub mod options;
pub mod stackmap;
pub mod thread;
pub mod vreg;
pub mod walker;

pub use arch::marshal::{AbiArg, ArgCounter, ArgKind, ArgLocation, ArgReader, ArgWriter};
pub use arch::{AbiTraits, Arch, ArchParseError, ArchTraits, RegRange, RUNTIME_ARCH};
pub use builder::{CompiledFrame, FrameBuilder, InterpretedFrame, SavedReg, TaggedValue};
pub use error::{stack_corruption, StackCorruption};
pub use frame::layout::{CFrameLayout, FrameBridgeKind};
pub use frame::{CFrame, IFrame};
pub use memory::{Address, NativeMemory, SimulatedStack, StackMemory};
pub use method::{Method, MethodRegistry, MethodTable, Shorty, ShortyError, TypeId};
pub use options::{OptionsError, RuntimeOptions};
pub use stackmap::{CodeInfo, StackMap, StackMapProvider, StackMapTable};
pub use thread::ThreadSnapshot;
pub use vreg::{DynamicArgIter, JniArgIter, VRegInfo, VRegLocation, VRegType, VRegValue};
pub use walker::{
    FrameAccessor, FrameKind, ObjectInspector, StackWalker, UnwindPolicy, UnwindPolicyParseError,
    VRegs, WalkContext,
};
