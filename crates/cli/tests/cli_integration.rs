//! CLI integration tests for the `derive` and `replay` subcommands.
//!
//! Uses `assert_cmd` to spawn the `amr-oracle` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to the sample corpus resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SAMPLE: &str = "fixtures/sample.amr";

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `amr-oracle` binary, rooted at workspace.
fn oracle() -> Command {
    let mut cmd = cargo_bin_cmd!("amr-oracle");
    cmd.current_dir(workspace_root());
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    oracle()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Transition oracle for aligned AMR corpora",
        ));
}

#[test]
fn version_exits_0() {
    oracle()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("amr-oracle"));
}

// ──────────────────────────────────────────────
// 2. derive
// ──────────────────────────────────────────────

#[test]
fn derive_prints_text_report() {
    oracle()
        .args(["derive", "--in-amr", SAMPLE])
        .assert()
        .success()
        .stdout(predicate::str::contains("Oracle Report"))
        .stdout(predicate::str::contains(
            "Sentences: 4 derived, 0 failed, 1 skipped",
        ))
        .stdout(predicate::str::contains("skipped no-root: 1"))
        .stdout(predicate::str::contains("New,York (city,name)"));
}

#[test]
fn placeholders_remove_the_stall() {
    oracle()
        .args(["derive", "--in-amr", SAMPLE, "--add-unaligned", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unaligned concepts bound: 1"))
        .stdout(predicate::str::contains("Anomalies").not());
}

#[test]
fn derive_json_report() {
    let out = oracle()
        .args(["--output", "json", "derive", "--in-amr", SAMPLE, "--add-unaligned", "1"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["derived"], 4);
    assert_eq!(report["skipped"]["no-root"], 1);
    assert_eq!(report["stats"]["actions"]["MERGE"]["New,York"], 1);
    assert_eq!(report["stats"]["entity_rules"]["hits"]["name"], 1);
}

#[test]
fn derive_writes_all_outputs() {
    let dir = TempDir::new().unwrap();
    let path = |name: &str| dir.path().join(name);
    oracle()
        .args(["--quiet", "derive", "--in-amr", SAMPLE])
        .arg("--out-oracle")
        .arg(path("train.oracle"))
        .arg("--out-amr")
        .arg(path("train.amr"))
        .arg("--out-sentences")
        .arg(path("train.en"))
        .arg("--out-actions")
        .arg(path("train.actions"))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let sentences = fs::read_to_string(path("train.en")).unwrap();
    let lines: Vec<&str> = sentences.lines().collect();
    assert_eq!(lines, ["The dog runs", "New York", "The boy is unhappy", "Want to go"]);

    let actions = fs::read_to_string(path("train.actions")).unwrap();
    assert_eq!(
        actions.lines().next(),
        Some("SHIFT REDUCE SHIFT CONFIRM(dog) SHIFT CONFIRM(run-01) LA(:ARG0) SHIFT LA(root) REDUCE REDUCE REDUCE CLOSE")
    );

    let oracle_text = fs::read_to_string(path("train.oracle")).unwrap();
    assert!(oracle_text.starts_with("The\tdog\truns\t<ROOT>\nSHIFT\tREDUCE\t"));

    let amr = fs::read_to_string(path("train.amr")).unwrap();
    assert!(amr.contains("# ::id sample.3"));
    assert!(amr.contains(":polarity -"));
}

#[test]
fn failed_sentence_is_reported_and_left_out_of_outputs() {
    let dir = TempDir::new().unwrap();
    let corpus = dir.path().join("mixed.amr");
    fs::write(
        &corpus,
        "# ::id amb.1\n# ::tok x y\n\
# ::node\t0\ta\t0-1\n# ::node\t1\tb\t0-2\n# ::node\t2\tc\t0-1\n\
# ::root\t0\ta\n# ::edge\tc\tARG0\ta\t2\t0\n\n\
# ::id ok.2\n# ::tok The dog runs\n\
# ::node\t0\trun-01\t2-3\n# ::node\t1\tdog\t1-2\n\
# ::root\t0\trun-01\n# ::edge\trun-01\tARG0\tdog\t0\t1\n",
    )
    .unwrap();
    let sentences = dir.path().join("out.en");
    oracle()
        .args(["derive", "--in-amr"])
        .arg(&corpus)
        .arg("--out-sentences")
        .arg(&sentences)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Sentences: 1 derived, 1 failed, 0 skipped",
        ))
        .stdout(predicate::str::contains(
            "Failed sentences are omitted from every output file",
        ))
        .stdout(predicate::str::contains("ambiguous-subgraph: 1"));

    assert_eq!(fs::read_to_string(&sentences).unwrap(), "The dog runs\n");
}

#[test]
fn config_file_is_applied() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("oracle.toml");
    fs::write(&cfg, "add_unaligned = 1\nthreads = 1\n").unwrap();
    oracle()
        .args(["derive", "--in-amr", SAMPLE, "--config"])
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::contains("Unaligned concepts bound: 1"));
}

#[test]
fn bad_config_key_exits_1() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("oracle.toml");
    fs::write(&cfg, "add_unalinged = 1\n").unwrap();
    oracle()
        .args(["derive", "--in-amr", SAMPLE, "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}

#[test]
fn missing_corpus_exits_1() {
    oracle()
        .args(["derive", "--in-amr", "fixtures/nope.amr"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read error"));
}

#[test]
fn missing_corpus_json_error() {
    oracle()
        .args(["--output", "json", "derive", "--in-amr", "fixtures/nope.amr"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("{\"error\": \"read error"));
}

// ──────────────────────────────────────────────
// 3. replay
// ──────────────────────────────────────────────

#[test]
fn replay_rebuilds_graphs_from_trace() {
    let dir = TempDir::new().unwrap();
    let trace = dir.path().join("train.oracle");
    oracle()
        .args(["--quiet", "derive", "--in-amr", SAMPLE, "--out-oracle"])
        .arg(&trace)
        .assert()
        .success();

    oracle()
        .args(["replay", "--in-oracle"])
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("# ::tok New York"))
        .stdout(predicate::str::contains("(c / city"))
        .stdout(predicate::str::contains(":op2 \"York\""));
}

#[test]
fn replay_without_entity_rules_keeps_heads() {
    let dir = TempDir::new().unwrap();
    let trace = dir.path().join("one.oracle");
    fs::write(&trace, "Paris\t<ROOT>\nSHIFT\tENTITY(city,name)\tSHIFT\tLA(root)\tREDUCE\tREDUCE\n\n").unwrap();
    oracle()
        .args(["replay", "--no-entity-rules", "--in-oracle"])
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("(c / city)"))
        .stdout(predicate::str::contains(":name").not());
}

#[test]
fn impossible_trace_exits_1() {
    let dir = TempDir::new().unwrap();
    let trace = dir.path().join("bad.oracle");
    fs::write(&trace, "a\t<ROOT>\nSHIFT\tLA(:ARG0)\n\n").unwrap();
    oracle()
        .args(["replay", "--in-oracle"])
        .arg(&trace)
        .assert()
        .failure()
        .stderr(predicate::str::contains("trace 1: LA needs 2 stack item(s), found 1"));
}
