//! CLI integration tests for tessera
//!
//! Tests the tessera CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../tessera-core/tests/fixtures")
        .join(name)
}

/// Helper to create a command isolated from the user's configuration
#[allow(deprecated)]
fn tessera_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tessera").unwrap();
    cmd.env("TESSERA_CONFIG_DIR", config_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn plan_args() -> Vec<String> {
    vec![
        "plan".to_string(),
        fixture("weld_cell.json").display().to_string(),
        fixture("weld_roles.json").display().to_string(),
    ]
}

#[test]
fn test_plan_solves_weld_cell() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .args(plan_args())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Solved: 7 goal(s) in 4 subtask(s), 0 unallocated"))
        .stdout(predicate::str::contains("welded(s4), welded(s5), welded(s6)"));
}

#[test]
fn test_plan_json_report() {
    let dir = TempDir::new().unwrap();
    let output = tessera_cmd(&dir)
        .args(plan_args())
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"]["status"], "solved");
    assert_eq!(report["outcome"]["subtasks"].as_array().unwrap().len(), 4);
    assert_eq!(report["seed"], 42);
    assert_eq!(report["domain"], "weld-cell");
}

#[test]
fn test_plan_writes_report_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    tessera_cmd(&dir)
        .args(plan_args())
        .args(["--seed", "9", "--quiet", "--output"])
        .arg(&path)
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["seed"], 9);
}

#[test]
fn test_plan_unsatisfiable_exit_code() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .args(["config", "set", "constraints.binary_predicates", "reachable"])
        .assert()
        .success();
    tessera_cmd(&dir)
        .args(plan_args())
        .args(["-k", "1"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Unsatisfiable"))
        .stdout(predicate::str::contains("bound is 1"));
}

#[test]
fn test_plan_allocation_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    let mut problem: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture("weld_cell.json")).unwrap()).unwrap();
    problem["agent_types"] = serde_json::json!(["robot"]);
    let path = dir.path().join("no_painter.json");
    std::fs::write(&path, problem.to_string()).unwrap();

    tessera_cmd(&dir)
        .arg("plan")
        .arg(&path)
        .arg(fixture("weld_roles.json"))
        .assert()
        .code(3)
        .stdout(predicate::str::contains("UNALLOCATED"));
}

#[test]
fn test_plan_reports_error_code() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("strict.toml");
    std::fs::write(&config, "[constraints]\ntype_predicates = [\"colour_of\"]\n").unwrap();

    tessera_cmd(&dir)
        .args(plan_args())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E601"))
        .stderr(predicate::str::contains("colour_of"));
}

#[test]
fn test_plan_with_toml_schema() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .arg("plan")
        .arg(fixture("weld_cell.json"))
        .arg(fixture("weld_roles.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Solved"));
}

#[test]
fn test_plan_missing_problem_fails() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .args(["plan", "does-not-exist.json"])
        .arg(fixture("weld_roles.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read problem document"));
}

#[test]
fn test_graph_text() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .arg("graph")
        .arg(fixture("weld_cell.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Causal graph"))
        .stdout(predicate::str::contains("docked -> welded"))
        .stdout(predicate::str::contains("component(s)"));
}

#[test]
fn test_graph_json() {
    let dir = TempDir::new().unwrap();
    let output = tessera_cmd(&dir)
        .args(["--format", "json", "graph"])
        .arg(fixture("weld_cell.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graph["goals"].as_array().unwrap().len(), 7);
    assert!(graph["causal_graph"]["reachable"].as_array().unwrap().contains(&"welded".into()));
}

#[test]
fn test_config_set_get_roundtrip() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .args(["config", "set", "retry.max_subtasks", "12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set retry.max_subtasks = 12"));
    tessera_cmd(&dir)
        .args(["config", "get", "retry.max_subtasks"])
        .assert()
        .success()
        .stdout("12\n");
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_list_and_reset() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .args(["config", "set", "seed", "7"])
        .assert()
        .success();
    tessera_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seed = 7"))
        .stdout(predicate::str::contains("roles.on_missing = partial"));
    tessera_cmd(&dir).args(["config", "reset"]).assert().success();
    tessera_cmd(&dir)
        .args(["config", "get", "seed"])
        .assert()
        .success()
        .stdout("42\n");
}

#[test]
fn test_config_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .args(["config", "set", "clustering.colour", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("clustering.colour"));
}

#[test]
fn test_config_path() {
    let dir = TempDir::new().unwrap();
    tessera_cmd(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
