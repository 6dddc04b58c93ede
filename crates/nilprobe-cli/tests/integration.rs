#![allow(deprecated)]
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(format!("{name}.json"))
}

/// Command running in an empty directory so no nilprobe.toml is picked up.
fn nilprobe(cwd: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nilprobe").unwrap();
    cmd.current_dir(cwd.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_version() {
    Command::cargo_bin("nilprobe")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"nilprobe \d+\.\d+\.\d+").unwrap());
}

#[test]
fn test_check_reports_traces() {
    let dir = tempfile::tempdir().unwrap();
    nilprobe(&dir)
        .arg("check")
        .arg(fixture("testdata"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "testdata/testdata.go:9:16: possible nil pointer dereference: (*A)(nil).X\n",
        ))
        .stdout(predicate::str::contains(
            "testdata/testdata.go:45:19: possible nil pointer dereference: expectNonNilParam(nil)\n\ttestdata/testdata.go:25:8: possible nil pointer dereference: a.X\n",
        ))
        .stderr(predicate::str::contains("Found 3 trace(s)"));
}

#[test]
fn test_check_clean_program_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut ir: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture("recursion")).unwrap()).unwrap();
    let funcs = ir["packages"][0]["functions"].as_array_mut().unwrap();
    funcs.retain(|f| {
        let name = f["short_name"].as_str().unwrap();
        name == "walk" || name == "ping" || name == "pong"
    });
    let path = dir.path().join("clean.json");
    std::fs::write(&path, serde_json::to_string(&ir).unwrap()).unwrap();

    nilprobe(&dir)
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No issues found (3 functions analyzed"));
}

#[test]
fn test_check_json_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = nilprobe(&dir)
        .args(["check", "--format", "json"])
        .arg(fixture("interproc"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["tool"], "nilprobe");
    assert_eq!(report["summary"]["traces"], 2);
    let diags = report["diagnostics"].as_array().unwrap();
    assert_eq!(diags[1]["trace"].as_array().unwrap().len(), 3);
    assert_eq!(diags[1]["function"], "interproc.twoLevels");
}

#[test]
fn test_check_sarif_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = nilprobe(&dir)
        .args(["check", "--format", "sarif"])
        .arg(fixture("closure"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let log: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(log["version"], "2.1.0");
    let results = log["runs"][0]["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["ruleId"], "NIL001");
}

#[test]
fn test_max_traces_flag() {
    let dir = tempfile::tempdir().unwrap();
    nilprobe(&dir)
        .args(["check", "--max-traces", "1"])
        .arg(fixture("testdata"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("(*A)(nil).X"))
        .stdout(predicate::str::contains("expectNonNilParam").not())
        .stderr(predicate::str::contains("2 more trace(s) not shown"));
}

#[test]
fn test_config_file_in_cwd_is_used() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("nilprobe.toml"), "[output]\nformat = \"json\"\n").unwrap();
    let output = nilprobe(&dir)
        .arg("check")
        .arg(fixture("maps"))
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["traces"], 3);
}

#[test]
fn test_invalid_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("nilprobe.toml"), "[output\n").unwrap();
    nilprobe(&dir)
        .arg("check")
        .arg(fixture("maps"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn test_missing_file_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    nilprobe(&dir)
        .args(["check", "does-not-exist.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does-not-exist.json"));
}

#[test]
fn test_invalid_json_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    nilprobe(&dir)
        .arg("check")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid IR JSON"));
}

#[test]
fn test_bad_usage_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    nilprobe(&dir).arg("check").assert().code(2);
    nilprobe(&dir)
        .args(["check", "x.json", "--format", "html"])
        .assert()
        .code(2);
}

#[test]
fn test_debug_flag_logs_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    nilprobe(&dir)
        .args(["check", "--debug"])
        .arg(fixture("testdata"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DEBUG"))
        .stdout(predicate::str::contains("DEBUG").not());
}

#[test]
fn test_init_creates_config() {
    let dir = tempfile::tempdir().unwrap();
    nilprobe(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created nilprobe.toml"));
    let content = std::fs::read_to_string(dir.path().join("nilprobe.toml")).unwrap();
    assert!(content.contains("[analysis]"));
    assert!(content.contains("max_call_depth = 64"));

    nilprobe(&dir)
        .arg("init")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
}
