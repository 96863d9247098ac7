//! Configuration loading and precedence tests

use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use strata_config::{ConfigError, ConfigLoader, ProjectConfig};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> std::path::PathBuf {
    let config_path = dir.join("strata.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

fn isolated_loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::new().with_global_config_path(dir.path().join("global.toml"))
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let config = isolated_loader(&temp_dir)
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(!config.is_project());
    assert_eq!(config.arch(), "host");
}

#[test]
#[serial]
fn test_load_from_nested_subdirectory() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[runtime]
arch = "arm"
arm32_hard_float = true
"#,
    );

    let sub2 = temp_dir.path().join("sub1").join("sub2");
    fs::create_dir_all(&sub2).unwrap();

    let config = isolated_loader(&temp_dir).load_from_directory(&sub2).unwrap();

    assert_eq!(config.arch(), "arm");
    assert_eq!(config.arm32_hard_float(), Some(true));
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

#[test]
#[serial]
fn test_load_with_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "");

    let config = isolated_loader(&temp_dir)
        .load_from_directory(temp_dir.path())
        .unwrap();

    // Every section is optional
    assert!(config.is_project());
    assert_eq!(config.project, ProjectConfig::default());
}

#[test]
#[serial]
fn test_load_from_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
[dump]
max_spill_slots = 12
"#,
    );

    let config = isolated_loader(&temp_dir).load_from_file(&path).unwrap();

    assert_eq!(config.max_spill_slots(), Some(12));
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = ProjectConfig::load_from_file(&temp_dir.path().join("strata.toml"));

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

#[test]
fn test_invalid_toml_syntax() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[runtime\narch = ");

    let result = ProjectConfig::load_from_file(&path);

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
fn test_unknown_section_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
[package]
name = "strata"
"#,
    );

    assert!(ProjectConfig::load_from_file(&path).is_err());
}

#[rstest]
#[case("[runtime]\narch = \"riscv\"", "runtime.arch")]
#[case("[runtime]\nunwind_policy = \"inner\"", "runtime.unwind_policy")]
#[case("[logging]\nlevel = \"chatty\"", "logging.level")]
fn test_invalid_enumerated_values(#[case] content: &str, #[case] field: &str) {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), content);

    match ProjectConfig::load_from_file(&path) {
        Err(ConfigError::InvalidValue { field: got, .. }) => assert_eq!(got, field),
        other => panic!("expected InvalidValue for {field}, got {other:?}"),
    }
}

#[rstest]
#[case("arm")]
#[case("arm64")]
#[case("x86")]
#[case("x86_64")]
#[case("host")]
fn test_valid_arch_names(#[case] arch: &str) {
    let content = format!("[runtime]\narch = \"{arch}\"");
    let config: ProjectConfig = toml::from_str(&content).unwrap();

    assert!(config.validate().is_ok());
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[test]
#[serial]
fn test_global_config_fills_gaps() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("global.toml"),
        r#"
[logging]
level = "info"

[dump]
print_vregs = true
max_spill_slots = 4
"#,
    )
    .unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[dump]
max_spill_slots = 16
"#,
    );

    let config = isolated_loader(&temp_dir)
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert_eq!(config.log_level(), "info");
    assert!(config.print_vregs());
    assert_eq!(config.max_spill_slots(), Some(16));
}

#[test]
#[serial]
fn test_env_overrides_project() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[runtime]
verify_call_stack = false

[logging]
level = "error"
"#,
    );

    env::set_var("STRATA_VERIFY_CALL_STACK", "1");
    env::set_var("STRATA_LOG", "TRACE");
    let result = isolated_loader(&temp_dir).load_from_directory(temp_dir.path());
    env::remove_var("STRATA_VERIFY_CALL_STACK");
    env::remove_var("STRATA_LOG");

    let config = result.unwrap();
    assert!(config.verify_call_stack());
    assert_eq!(config.log_level(), "trace");
}

#[test]
#[serial]
fn test_env_invalid_arch() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("STRATA_ARCH", "sparc");
    let result = isolated_loader(&temp_dir).load_from_directory(temp_dir.path());
    env::remove_var("STRATA_ARCH");

    match result {
        Err(ConfigError::InvalidEnv { var, value }) => {
            assert_eq!(var, "STRATA_ARCH");
            assert_eq!(value, "sparc");
        }
        other => panic!("expected InvalidEnv, got {other:?}"),
    }
}

#[test]
fn test_serialized_config_snapshot() {
    let config: ProjectConfig = toml::from_str(
        r#"
[runtime]
arch = "arm64"
unwind_policy = "skip-inlined"

[dump]
print_vregs = true
"#,
    )
    .unwrap();

    insta::assert_snapshot!(toml::to_string(&config).unwrap(), @r###"
    [runtime]
    arch = "arm64"
    unwind_policy = "skip-inlined"

    [dump]
    print_vregs = true
    "###);
}
