//! Demo command - build a mixed stack in simulated memory and walk it
//!
//! The stack, youngest first:
//!
//! ```text
//! Worker.callback   interpreted, holds a reference and an int
//! C2I               compiled code called back into the interpreter
//! Helper.compute    inlined into Worker.run
//! Worker.run        compiled, one spill slot and one callee-saved register
//! I2C               interpreter entered compiled code
//! Main.main         interpreted entry frame
//! ```

use anyhow::Result;
use log::info;
use strata_runtime::{
    Address, CFrameLayout, CodeInfo, CompiledFrame, FrameBridgeKind, FrameBuilder,
    InterpretedFrame, Method, MethodRegistry, RuntimeOptions, SavedReg, Shorty, SimulatedStack,
    StackMap, StackMapTable, StackWalker, TaggedValue, ThreadSnapshot, TypeId, VRegInfo, VRegType,
    WalkContext,
};

const STACK_BASE: Address = 0x7f00_0000;
const STACK_LEN: usize = 0x1_0000;

const MAIN: Address = 0x1_0000;
const WORKER: Address = 0x1_1000;
const HELPER: Address = 0x1_2000;
const CALLBACK: Address = 0x1_3000;

const WORKER_NPC: u64 = 0x2c;
const I2C_RETURN: u64 = 0x5000;
const CALLBACK_OBJECT: Address = 0x7000_0040;

/// The demo stack: simulated memory plus the tables needed to walk it.
pub struct DemoStack {
    pub stack: SimulatedStack,
    pub methods: MethodRegistry,
    pub maps: StackMapTable,
    pub top: Address,
}

fn void_method(name: &str) -> Method {
    Method::new(name, Shorty::new(TypeId::Void, []))
}

/// Lay out the demo stack for `options.arch`.
pub fn build(options: &RuntimeOptions) -> DemoStack {
    let arch = options.arch;
    let spills = options.max_spill_slots.max(1);
    let spill_slot = CFrameLayout::new(arch, spills).first_spill_slot() as i32;
    let saved_reg = arch.first_callee_reg(false);

    let mut methods = MethodRegistry::new();
    methods
        .register(MAIN, void_method("Main.main").with_line(0, 3).with_line(10, 4))
        .register(WORKER, void_method("Worker.run").with_line(0, 12))
        .register(HELPER, void_method("Helper.compute").with_line(0, 30))
        .register(CALLBACK, void_method("Worker.callback").instance().with_line(0, 41));

    let mut maps = StackMapTable::new();
    let mut code = CodeInfo::new(1 << saved_reg, 0).with_constants(vec![100]);
    code.add_stack_map(
        WORKER_NPC,
        StackMap::new(8)
            .with_vregs(vec![
                VRegInfo::slot(spill_slot, VRegType::Int32, 0),
                VRegInfo::register(saved_reg, false, VRegType::Int32, 1),
            ])
            .with_inlined(
                HELPER,
                2,
                vec![VRegInfo::constant(0, 0, VRegType::Int32, 0)],
            ),
    );
    maps.insert(WORKER, code);

    let stack = SimulatedStack::new(STACK_BASE, STACK_LEN);
    let top = {
        let mut builder = FrameBuilder::new(&stack, arch).with_abi(options.abi);
        let main = builder.push_interpreted(
            &InterpretedFrame::new(MAIN, 10).with_vregs(vec![TaggedValue::int(7)]),
            0,
        );
        let i2c = builder.push_compiler_boundary(
            FrameBridgeKind::InterpreterToCompiledCode,
            main,
            I2C_RETURN,
            &[],
        );
        let worker = builder.push_compiled(
            &CompiledFrame::new(WORKER, i2c, I2C_RETURN)
                .with_spills(spills)
                .with_saved(SavedReg::gp(saved_reg, 21))
                .with_slot(spill_slot, 42),
        );
        let c2i = builder.push_c2i_boundary(worker, WORKER_NPC, &[]);
        builder.push_interpreted(
            &InterpretedFrame::new(CALLBACK, 0)
                .with_acc(TaggedValue::int(1))
                .with_vregs(vec![TaggedValue::object(CALLBACK_OBJECT), TaggedValue::int(9)]),
            c2i,
        )
    };
    info!("demo stack for {arch}: top frame at {top:#x}");

    DemoStack {
        stack,
        methods,
        maps,
        top,
    }
}

impl DemoStack {
    pub fn walker(&self, options: &RuntimeOptions) -> StackWalker<'_> {
        let ctx = options.apply(WalkContext::new(
            &self.stack,
            options.arch,
            &self.methods,
            &self.maps,
        ));
        StackWalker::from_thread(ctx, &ThreadSnapshot::interpreted(self.top), options.unwind_policy)
    }
}

/// Walk the demo stack and render the dump.
pub fn render(options: &RuntimeOptions) -> Result<String> {
    let demo = build(options);
    let mut out = String::new();
    demo.walker(options).dump(&mut out, options.print_vregs)?;
    Ok(out)
}

pub fn run(options: &RuntimeOptions) -> Result<()> {
    print!("{}", render(options)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_runtime::{AbiTraits, Arch, UnwindPolicy};

    fn frame_names(options: &RuntimeOptions) -> Vec<String> {
        let demo = build(options);
        let mut walker = demo.walker(options);
        let mut names = Vec::new();
        while walker.has_frame() {
            names.push(walker.method().name.clone());
            walker.next_frame();
        }
        names
    }

    #[test]
    fn test_demo_walks_every_arch() {
        for arch in Arch::ALL {
            let options = RuntimeOptions::for_arch(arch);
            assert_eq!(
                frame_names(&options),
                vec!["Worker.callback", "Helper.compute", "Worker.run", "Main.main"],
                "{arch}"
            );
        }
    }

    #[test]
    fn test_demo_skip_inlined() {
        let options = RuntimeOptions {
            unwind_policy: UnwindPolicy::SkipInlined,
            ..RuntimeOptions::for_arch(Arch::Aarch64)
        };
        assert_eq!(
            frame_names(&options),
            vec!["Worker.callback", "Worker.run", "Main.main"]
        );
    }

    #[test]
    fn test_demo_compiled_values() {
        let options = RuntimeOptions {
            abi: AbiTraits::aarch32(true),
            ..RuntimeOptions::for_arch(Arch::Aarch32)
        };
        let demo = build(&options);
        let mut walker = demo.walker(&options);
        walker.next_frame();
        assert_eq!(walker.method().name, "Helper.compute");
        assert_eq!(walker.vreg_value(0).as_i32(), 100);
        walker.next_frame();
        assert_eq!(walker.vreg_value(0).as_i32(), 42);
        assert_eq!(walker.vreg_value(1).as_i32(), 21);
    }

    #[test]
    fn test_demo_dump_with_vregs() {
        let options = RuntimeOptions {
            print_vregs: true,
            ..RuntimeOptions::for_arch(Arch::X86_64)
        };
        let out = render(&options).unwrap();
        assert!(out.starts_with("Strata call stack:\n"));
        assert!(out.contains("in Worker.run (compiled: npc=0x2c) at line 12"));
        assert!(out.contains("in Helper.compute (compiled: npc=0x2c, inlined) at line 30"));
        assert!(out.contains("0x70000040"));
        assert!(out.contains("CONSTANT:0"));
    }

    #[test]
    fn test_demo_verifies_cleanly() {
        let options = RuntimeOptions::for_arch(Arch::Aarch64);
        let demo = build(&options);
        demo.walker(&options).verify();
    }
}
