//! Native argument command - where a native method finds its managed arguments

use anyhow::{Context, Result};
use serde::Serialize;
use strata_runtime::vreg::jni::stack_arg_bytes;
use strata_runtime::{AbiTraits, ArgCounter, ArgKind, ArgLocation, JniArgIter, Method, Shorty};

#[derive(Debug, Serialize)]
pub struct ArgRow {
    pub name: String,
    pub vtype: &'static str,
    pub location: String,
    /// Register-area slot the walker reads the argument from
    pub slot: i32,
}

#[derive(Debug, Serialize)]
pub struct ArgsReport {
    pub arch: &'static str,
    pub hard_float: bool,
    pub shorty: String,
    pub method_location: String,
    pub stack_arg_bytes: usize,
    pub args: Vec<ArgRow>,
}

pub fn describe(loc: ArgLocation) -> String {
    match loc {
        ArgLocation::Gpr(offset) => format!("gpr+{offset}"),
        ArgLocation::Fpr(offset) => format!("fpr+{offset}"),
        ArgLocation::Stack(offset) => format!("stack+{offset}"),
    }
}

/// Place the arguments of a native method with signature `shorty`.
pub fn report(abi: AbiTraits, shorty: &str, instance: bool) -> Result<ArgsReport> {
    let shorty: Shorty = shorty
        .parse()
        .with_context(|| format!("Invalid shorty '{shorty}'"))?;
    let mut method = Method::new("native", shorty).native();
    if instance {
        method = method.instance();
    }

    let pointer_size = abi.pointer_size();
    let mut counter = ArgCounter::new(abi);
    let method_location = counter.count_kind(ArgKind::pointer(pointer_size));
    let receiver = instance.then(|| ArgKind::pointer(pointer_size));
    let kinds = receiver
        .into_iter()
        .chain(method.shorty.params().iter().filter_map(|ty| ty.arg_kind(pointer_size)));
    let locations: Vec<ArgLocation> = kinds.map(|kind| counter.count_kind(kind)).collect();

    let args = JniArgIter::new(abi, &method)
        .zip(locations)
        .map(|(info, location)| ArgRow {
            name: if instance && info.index == 0 {
                "this".to_string()
            } else {
                info.name()
            },
            vtype: info.vtype.as_str(),
            location: describe(location),
            slot: info.value,
        })
        .collect();

    Ok(ArgsReport {
        arch: abi.arch.name(),
        hard_float: abi.hard_float,
        shorty: method.shorty.to_string(),
        method_location: describe(method_location),
        stack_arg_bytes: stack_arg_bytes(abi, &method),
        args,
    })
}

pub fn render(report: &ArgsReport) -> String {
    let float = if report.hard_float { "hard-float" } else { "soft-float" };
    let mut out = format!(
        "{} ({float}) native {}: Method* in {}, {} bytes on stack\n",
        report.arch, report.shorty, report.method_location, report.stack_arg_bytes
    );
    for row in &report.args {
        out.push_str(&format!(
            "  {:>4}  {:<8}  {:<10}  slot {}\n",
            row.name, row.vtype, row.location, row.slot
        ));
    }
    out
}

pub fn run(abi: AbiTraits, shorty: &str, instance: bool, json: bool) -> Result<()> {
    let report = report(abi, shorty, instance)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}
