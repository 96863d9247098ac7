//! End-to-end tests for the `strata` binary
//!
//! Every command runs in a scratch directory with `HOME` pointed at it, so
//! no user configuration leaks in.

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn strata(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("strata");
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("STRATA_ARCH")
        .env_remove("STRATA_VERIFY_CALL_STACK")
        .env_remove("STRATA_LOG")
        .env_remove("STRATA_JSON");
    cmd
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("layout"))
        .stdout(predicate::str::contains("marshal"))
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_long_help_shows_examples() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXAMPLES"))
        .stdout(predicate::str::contains("STRATA_ARCH"));
}

// ============================================================================
// Layout, args, marshal
// ============================================================================

#[test]
fn test_layout_arm64() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["layout", "--arch", "arm64", "--spills", "0"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("AARCH64 frame: 80 slots, 640 bytes"))
        .stdout(predicate::str::contains("callee_gp"));
}

#[test]
fn test_layout_json() {
    let dir = TempDir::new().unwrap();
    let output = strata(&dir)
        .args(["layout", "--arch", "x86_64", "--spills", "1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["arch"], "x86_64");
    assert_eq!(json["frame_slots"], 42);
    let names: Vec<_> = json["regions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|region| region["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("stack_arg"));
    assert_eq!(names.last().map(String::as_str), Some("spills"));
}

#[test]
fn test_args_hard_float_arm() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["args", "--arch", "arm", "--shorty", "VF", "--hard-float"])
        .assert()
        .success()
        .stdout(predicate::str::contains("arm (hard-float) native VF"))
        .stdout(predicate::str::contains("fpr+0"));
}

#[test]
fn test_args_invalid_shorty() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["args", "--arch", "arm64", "--shorty", "IV"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid shorty 'IV'"));
}

#[test]
fn test_marshal_spills_ninth_int() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["marshal", "--arch", "arm64", "--shorty", "VIIIIIIIII"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gpr 64 bytes, fpr 0 bytes, stack 8 bytes (1 args)"));
}

#[test]
fn test_unknown_arch() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["layout", "--arch", "sparc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown architecture 'sparc'"));
}

#[test]
fn test_archs_json() {
    let dir = TempDir::new().unwrap();
    let output = strata(&dir).args(["archs", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(4));
}

// ============================================================================
// Demo and configuration
// ============================================================================

#[test]
fn test_demo_walks_mixed_stack() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["demo", "--arch", "arm64"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Strata call stack:"))
        .stdout(predicate::str::contains("in Worker.callback (managed) at line 41"))
        .stdout(predicate::str::contains("in Helper.compute (compiled: npc=0x2c, inlined)"))
        .stdout(predicate::str::contains("in Main.main (managed) at line 4"));
}

#[test]
fn test_demo_policy_flag() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["demo", "--arch", "x86", "--policy", "skip-inlined"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Helper.compute").not());
}

#[test]
fn test_demo_reads_project_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("strata.toml"),
        r#"
[runtime]
arch = "arm"
unwind_policy = "skip-inlined"

[dump]
print_vregs = true
"#,
    )
    .unwrap();

    strata(&dir)
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("Worker.run (compiled: npc=0x2c) at line 12"))
        .stdout(predicate::str::contains("REGISTER:4"))
        .stdout(predicate::str::contains("Helper.compute").not());
}

#[test]
fn test_env_arch_override() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .env("STRATA_ARCH", "x86")
        .arg("layout")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("X86 frame:"));
}

#[test]
fn test_invalid_project_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("strata.toml"), "[runtime]\narch = \"vax\"\n").unwrap();
    strata(&dir)
        .arg("archs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load strata.toml"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    strata(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strata"));
}
