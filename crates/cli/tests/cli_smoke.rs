//! CLI smoke tests for pkgraph.
//!
//! Every command runs offline against the fixture specs.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn pkgraph() -> Command {
  cargo_bin_cmd!("pkgraph")
}

fn fixture(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

fn temp_spec(content: &str) -> (TempDir, PathBuf) {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("spec.yml");
  std::fs::write(&path, content).unwrap();
  (temp, path)
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  pkgraph()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  pkgraph()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("pkgraph"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["validate", "render", "targets", "describe", "graph"] {
    pkgraph()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_accepts_valid_spec() {
  pkgraph()
    .arg("validate")
    .arg(fixture("hello.yml"))
    .assert()
    .success()
    .stderr(predicate::str::contains("is valid"));
}

#[test]
fn validate_reports_violations() {
  pkgraph()
    .arg("validate")
    .arg(fixture("invalid.yml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("missing.patch"))
    .stderr(predicate::str::contains("1 violation(s)"));
}

#[test]
fn validate_json_output() {
  pkgraph()
    .args(["validate", "--json"])
    .arg(fixture("invalid.yml"))
    .assert()
    .failure()
    .stdout(predicate::str::contains("\"valid\": false"));
}

#[test]
fn validate_rejects_malformed_yaml() {
  let (_temp, path) = temp_spec("name: [unterminated\n");
  pkgraph()
    .arg("validate")
    .arg(&path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to parse spec"));
}

#[test]
fn validate_missing_file_fails() {
  pkgraph()
    .arg("validate")
    .arg("/nonexistent/spec.yml")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read spec file"));
}

// =============================================================================
// render
// =============================================================================

#[test]
fn render_rpm_uses_arg_defaults() {
  pkgraph()
    .arg("render")
    .arg(fixture("hello.yml"))
    .assert()
    .success()
    .stdout(predicate::str::starts_with("Name: hello\nVersion: 1.0\n"))
    .stdout(predicate::str::contains("Source0: greeting\nSource1: build.sh\n"));
}

#[test]
fn render_applies_supplied_args() {
  pkgraph()
    .args(["render", "--arg", "VERSION=2.0"])
    .arg(fixture("hello.yml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Version: 2.0\n"));
}

#[test]
fn render_deb_control() {
  pkgraph()
    .args(["render", "--format", "deb"])
    .arg(fixture("hello.yml"))
    .assert()
    .success()
    .stdout(predicate::str::starts_with("Source: hello\n"))
    .stdout(predicate::str::contains("Description: Says hello\n"));
}

#[test]
fn render_rejects_unknown_format() {
  pkgraph()
    .args(["render", "--format", "apk"])
    .arg(fixture("hello.yml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("expected rpm or deb"));
}

#[test]
fn render_fails_on_undefined_arg() {
  let (_temp, path) = temp_spec("name: undefined\nversion: \"${NOPE}\"\n");
  pkgraph()
    .arg("render")
    .arg(&path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("NOPE"));
}

// =============================================================================
// targets & describe
// =============================================================================

#[test]
fn targets_lists_builtin_routes() {
  pkgraph()
    .arg("targets")
    .arg(fixture("hello.yml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("debug/resolve"))
    .stdout(predicate::str::contains("mariner2/rpm"))
    .stdout(predicate::str::contains("jammy/deb/debug/control"));
}

#[test]
fn targets_filters_by_path() {
  pkgraph()
    .args(["targets", "--json"])
    .arg(fixture("hello.yml"))
    .arg("jammy")
    .assert()
    .success()
    .stdout(predicate::str::contains("jammy/deb"))
    .stdout(predicate::str::contains("mariner2").not());
}

#[test]
fn describe_lists_subrequests() {
  pkgraph()
    .arg("describe")
    .assert()
    .success()
    .stdout(predicate::str::contains("list-targets"))
    .stdout(predicate::str::contains("describe"));
}

// =============================================================================
// graph
// =============================================================================

#[test]
fn graph_prints_operations() {
  pkgraph()
    .arg("graph")
    .arg(fixture("hello.yml"))
    .arg("mariner2/rpm/debug/spec")
    .assert()
    .success()
    .stdout(predicate::str::contains("mkfile"))
    .stdout(predicate::str::contains("Generate rpm spec file"));
}

#[test]
fn graph_fans_out_per_platform() {
  pkgraph()
    .args(["graph", "--platform", "linux/amd64", "--platform", "linux/arm64"])
    .arg(fixture("hello.yml"))
    .arg("debug/resolve")
    .assert()
    .success()
    .stderr(predicate::str::contains("linux/amd64:"))
    .stderr(predicate::str::contains("linux/arm64:"));
}

#[test]
fn graph_json_contains_resolved_spec() {
  pkgraph()
    .args(["graph", "--json", "--arg", "VERSION=3.1"])
    .arg(fixture("hello.yml"))
    .arg("debug/resolve")
    .assert()
    .success()
    .stdout(predicate::str::contains("version: '3.1'").or(predicate::str::contains("version: \\\"3.1\\\"")));
}

#[test]
fn graph_unknown_target_fails() {
  pkgraph()
    .arg("graph")
    .arg(fixture("hello.yml"))
    .arg("nope")
    .assert()
    .failure()
    .stderr(predicate::str::contains("nope"));
}
