//! Shared fixtures for the runtime integration tests

#![allow(dead_code)]

use strata_runtime::{
    Address, Arch, CodeInfo, FrameBuilder, Method, MethodRegistry, SimulatedStack, StackMap,
    StackMapTable, StackWalker, UnwindPolicy, WalkContext,
};

pub const STACK_BASE: Address = 0x10_0000;
pub const STACK_LEN: usize = 0x1_0000;

/// A simulated stack plus the method and stack map tables a walk needs.
pub struct Fixture {
    pub arch: Arch,
    pub stack: SimulatedStack,
    pub methods: MethodRegistry,
    pub maps: StackMapTable,
}

impl Fixture {
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            stack: SimulatedStack::new(STACK_BASE, STACK_LEN),
            methods: MethodRegistry::new(),
            maps: StackMapTable::new(),
        }
    }

    pub fn method(&mut self, addr: Address, name: &str, shorty: &str) -> &mut Self {
        let method = Method::new(name, shorty.parse().expect("valid shorty"));
        self.methods.register(addr, method);
        self
    }

    /// Registers compiled code for `addr` with one stack map at `npc`.
    pub fn compiled(&mut self, addr: Address, callee_mask: u32, npc: u64, map: StackMap) -> &mut Self {
        let mut info = CodeInfo::new(callee_mask, 0);
        info.add_stack_map(npc, map);
        self.maps.insert(addr, info);
        self
    }

    pub fn builder(&self) -> FrameBuilder<'_> {
        FrameBuilder::new(&self.stack, self.arch)
    }

    pub fn ctx(&self) -> WalkContext<'_> {
        WalkContext::new(&self.stack, self.arch, &self.methods, &self.maps)
    }

    pub fn walker(&self, fp: Address, is_compiled: bool, npc: u64, policy: UnwindPolicy) -> StackWalker<'_> {
        StackWalker::new(self.ctx(), fp, is_compiled, npc, policy)
    }
}

/// Names of every method the walker stops on, youngest first.
pub fn method_names(mut walker: StackWalker<'_>) -> Vec<String> {
    let mut names = Vec::new();
    while walker.has_frame() {
        names.push(walker.method().name.clone());
        walker.next_frame();
    }
    names
}

/// Number of `next_frame` calls that land on another frame.
pub fn transitions(mut walker: StackWalker<'_>) -> usize {
    let mut count = 0;
    while walker.has_frame() {
        walker.next_frame();
        if walker.has_frame() {
            count += 1;
        }
    }
    count
}
