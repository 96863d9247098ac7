//! Register metadata recorded by the compiler for compiled code
//!
//! For every safepoint of a compiled method the compiler records a
//! [`StackMap`]: the bytecode position it corresponds to, the chain of
//! methods inlined at that point, and where each live virtual register sits
//! at each inline depth. The walker only consumes this data.

use crate::memory::Address;
use crate::vreg::VRegInfo;
use std::collections::{BTreeMap, HashMap};

/// One inlined callee at a safepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineInfo {
    pub method: Address,
    pub bytecode_pc: u32,
}

/// Safepoint metadata at one native pc.
///
/// `inlined` is ordered outermost first. `vregs[0]` describes the physical
/// method, `vregs[d + 1]` the callee at inline depth `d`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackMap {
    pub bytecode_pc: u32,
    pub inlined: Vec<InlineInfo>,
    pub vregs: Vec<Vec<VRegInfo>>,
}

impl StackMap {
    pub fn new(bytecode_pc: u32) -> Self {
        Self {
            bytecode_pc,
            inlined: Vec::new(),
            vregs: vec![Vec::new()],
        }
    }

    pub fn with_vregs(mut self, vregs: Vec<VRegInfo>) -> Self {
        self.vregs[0] = vregs;
        self
    }

    /// Appends a deeper inlined callee with its own virtual registers.
    pub fn with_inlined(mut self, method: Address, bytecode_pc: u32, vregs: Vec<VRegInfo>) -> Self {
        self.inlined.push(InlineInfo {
            method,
            bytecode_pc,
        });
        self.vregs.push(vregs);
        self
    }

    pub fn inline_depth(&self) -> usize {
        self.inlined.len()
    }

    /// Registers at `depth`, where `None` is the physical method.
    pub fn vregs_at(&self, depth: Option<usize>) -> &[VRegInfo] {
        let index = depth.map_or(0, |d| d + 1);
        self.vregs.get(index).map_or(&[], Vec::as_slice)
    }
}

/// Per-method compiled-code record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeInfo {
    /// Callee-saved GP registers the method's prologue spills
    pub callee_regs_mask: u32,
    pub callee_fp_regs_mask: u32,
    /// Constant pool referenced by `VRegLocation::Constant` entries
    pub constants: Vec<u32>,
    stack_maps: BTreeMap<u64, StackMap>,
}

impl CodeInfo {
    pub fn new(callee_regs_mask: u32, callee_fp_regs_mask: u32) -> Self {
        Self {
            callee_regs_mask,
            callee_fp_regs_mask,
            constants: Vec::new(),
            stack_maps: BTreeMap::new(),
        }
    }

    pub fn with_constants(mut self, constants: Vec<u32>) -> Self {
        self.constants = constants;
        self
    }

    pub fn add_stack_map(&mut self, native_pc: u64, map: StackMap) -> &mut Self {
        self.stack_maps.insert(native_pc, map);
        self
    }

    pub fn stack_map(&self, native_pc: u64) -> Option<&StackMap> {
        self.stack_maps.get(&native_pc)
    }

    pub fn constant(&self, index: usize) -> Option<u32> {
        self.constants.get(index).copied()
    }
}

/// Source of compiled-code metadata.
pub trait StackMapProvider {
    fn code_info(&self, method: Address) -> Option<&CodeInfo>;

    fn stack_map(&self, method: Address, native_pc: u64) -> Option<&StackMap> {
        self.code_info(method)?.stack_map(native_pc)
    }
}

/// In-memory [`StackMapProvider`].
#[derive(Debug, Default, Clone)]
pub struct StackMapTable {
    code: HashMap<Address, CodeInfo>,
}

impl StackMapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Address, info: CodeInfo) -> &mut CodeInfo {
        let slot = self.code.entry(method).or_default();
        *slot = info;
        slot
    }
}

impl StackMapProvider for StackMapTable {
    fn code_info(&self, method: Address) -> Option<&CodeInfo> {
        self.code.get(&method)
    }
}
