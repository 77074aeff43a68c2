//! E2E CLI tests covering the annotation round trip:
//! - `ecgl init` and `ecgl catalog` over a CSV with a bad row
//! - classifier queue, disagreement, reviewer queue
//! - validation failures surfacing as coded JSON errors
//! - strip rendering to PNG
//!
//! Each test runs `ecgl` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SIGNALS_CSV: &str = "\
SignalID,ECGSignal,HeartRate,MeanBPM
201,\"0, 120, -80, 300, 40\",72,71.5
202,\"5,7,9\",88,
oops,\"1,2\",60,
203,\"1,1,1\",64,
";

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the ecgl binary, rooted in `dir`.
fn ecgl(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ecgl"));
    cmd.current_dir(dir);
    cmd.env("ECGLABEL_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join(".user-config"));
    cmd.env_remove("ECGLABEL_RATER");
    cmd.env_remove("FORMAT");
    cmd
}

fn project() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    ecgl(dir.path()).arg("init").assert().success();
    fs::write(dir.path().join("signals.csv"), SIGNALS_CSV).expect("write signals");
    dir
}

fn json(dir: &Path, args: &[&str]) -> Value {
    let output = ecgl(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("ecgl should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

fn record(dir: &Path, rater: &str, signal: &str, label: &str) {
    ecgl(dir)
        .args(["--rater", rater, "record", "--signal", signal, "--label", label])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_twice_without_force_fails() {
    let dir = project();
    ecgl(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn commands_outside_a_project_explain_how_to_start() {
    let dir = tempfile::tempdir().expect("temp dir");
    ecgl(dir.path())
        .args(["conflicts", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"))
        .stderr(predicate::str::contains("ecgl init"));
}

#[test]
fn catalog_reports_skipped_rows() {
    let dir = project();
    let report = json(dir.path(), &["catalog"]);
    assert_eq!(report["signals"], 3);
    assert_eq!(report["skipped"], 1);
    let warnings = report["warnings"].as_array().expect("warning list");
    assert!(
        warnings
            .iter()
            .any(|w| w["identifier"] == "oops" && w["skipped"] == true)
    );
}

#[test]
fn classifier_queue_then_conflict_then_review() {
    let dir = project();
    let d = dir.path();

    let next = json(d, &["--rater", "user1", "next"]);
    assert_eq!(next["signal"]["id"], 201);
    assert_eq!(next["remaining"], 3);
    assert_eq!(next["role"], "classifier");

    record(d, "user1", "201", "normal");
    record(d, "user2", "201", "Fibrillation");
    record(d, "user1", "202", "Noisy");
    record(d, "user2", "202", "noisy");

    let next = json(d, &["--rater", "user1", "next"]);
    assert_eq!(next["signal"]["id"], 203);

    let conflicts = json(d, &["conflicts"]);
    let list = conflicts["conflicts"].as_array().expect("conflict list");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["signal_id"], 201);
    assert_eq!(list[0]["votes"]["user1"], "Normal");
    assert_eq!(list[0]["votes"]["user2"], "Fibrillation");
    assert_eq!(conflicts["agreement"]["agreed"], 1);

    let next = json(d, &["--rater", "user3", "next"]);
    assert_eq!(next["role"], "reviewer");
    assert_eq!(next["signal"]["id"], 201);

    ecgl(d)
        .args(["--rater", "user3", "record", "--signal", "201", "--label", "other"])
        .args(["--comment", "baseline wander"])
        .assert()
        .success();

    let progress = json(d, &["--rater", "user3", "progress"]);
    assert_eq!(progress["raters"][0]["role"], "reviewer");
    assert_eq!(progress["raters"][0]["reviewed"], 1);
    assert_eq!(progress["raters"][0]["total"], 1);

    let next = json(d, &["--rater", "user3", "next"]);
    assert!(next["signal"].is_null());

    let log = fs::read_to_string(d.join(".ecglabel/annotations.log")).expect("log");
    assert!(log.contains("201\tuser3\tOther\t"));
    assert!(log.trim_end().ends_with("\"baseline wander\""));
}

#[test]
fn tertile_pair_disagreement_is_queued_for_review() {
    let dir = tempfile::tempdir().expect("temp dir");
    let d = dir.path();
    ecgl(d).arg("init").assert().success();
    let csv: String = std::iter::once("id,signal,hr\n".to_string())
        .chain((1..=6).map(|i| format!("{i},\"0,1\",60\n")))
        .collect();
    fs::write(d.join("signals.csv"), csv).expect("write signals");
    fs::write(
        d.join(".ecglabel/config.toml"),
        "[assignment]\nscheme = \"overlapping-tertile\"\n\n\
         [[raters]]\nid = \"a\"\n\n[[raters]]\nid = \"b\"\n\n[[raters]]\nid = \"c\"\n\n\
         [[raters]]\nid = \"lead\"\nrole = \"reviewer\"\n",
    )
    .expect("write config");

    record(d, "a", "3", "normal");
    record(d, "b", "3", "fibrillation");
    ecgl(d)
        .args(["--rater", "c", "--json", "record", "--signal", "3", "--label", "normal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2002"));

    let conflicts = json(d, &["conflicts"]);
    let list = conflicts["conflicts"].as_array().expect("conflict list");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["signal_id"], 3);

    let next = json(d, &["--rater", "lead", "next"]);
    assert_eq!(next["signal"]["id"], 3);
}

#[test]
fn repeated_votes_are_listed_with_conflicts() {
    let dir = project();
    let d = dir.path();
    record(d, "user1", "201", "normal");
    record(d, "user1", "201", "noisy");
    record(d, "user2", "201", "noisy");

    let conflicts = json(d, &["conflicts"]);
    // first vote wins by default, so user1 still says Normal
    assert_eq!(conflicts["conflicts"][0]["votes"]["user1"], "Normal");
    let repeated = conflicts["repeated_votes"].as_array().expect("repeated list");
    assert_eq!(repeated.len(), 1);
    assert_eq!(repeated[0]["signal_id"], 201);
    assert_eq!(repeated[0]["rater"], "user1");
    assert_eq!(repeated[0]["events"], 2);
}

#[test]
fn progress_text_uses_classic_wording() {
    let dir = project();
    record(dir.path(), "user1", "201", "normal");
    ecgl(dir.path())
        .args(["--format", "text", "progress", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user1\tSignals classified 1/3"))
        .stdout(predicate::str::contains("user3\tConflict signals reviewed 0/0"));
}

#[test]
fn invalid_label_is_rejected_with_code_and_nothing_written() {
    let dir = project();
    let before = fs::read_to_string(dir.path().join(".ecglabel/annotations.log")).expect("log");

    ecgl(dir.path())
        .args(["--rater", "user1", "--json", "record", "--signal", "201", "--label", "asystole"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2004"));

    let after = fs::read_to_string(dir.path().join(".ecglabel/annotations.log")).expect("log");
    assert_eq!(before, after);
}

#[test]
fn unknown_signal_and_unknown_rater_are_coded_errors() {
    let dir = project();
    ecgl(dir.path())
        .args(["--rater", "user1", "--json", "record", "--signal", "999", "--label", "normal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));

    ecgl(dir.path())
        .args(["--rater", "ghost", "--json", "next"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2003"));
}

#[test]
fn multi_line_comment_is_rejected() {
    let dir = project();
    ecgl(dir.path())
        .args(["--rater", "user1", "--json", "record", "--signal", "201"])
        .args(["--label", "normal", "--comment", "first\nsecond"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2005"));
}

#[test]
fn rater_identity_is_required_for_next() {
    let dir = project();
    ecgl(dir.path())
        .arg("next")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rater identity required"));

    ecgl(dir.path())
        .env("ECGLABEL_RATER", "user2")
        .args(["next", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rater\": \"user2\""));
}

#[test]
fn render_writes_a_png() {
    let dir = project();
    let out = dir.path().join("201.png");
    let report = json(
        dir.path(),
        &["render", "--signal", "201", "--out", out.to_str().expect("utf-8 path")],
    );
    assert_eq!(report["signal_id"], 201);
    assert_eq!(report["geometry"]["samples_drawn"], 5);

    let bytes = fs::read(&out).expect("png written");
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn next_can_render_the_offered_strip() {
    let dir = project();
    let out = dir.path().join("next.png");
    let next = json(
        dir.path(),
        &["--rater", "user2", "next", "--png", out.to_str().expect("utf-8 path")],
    );
    assert_eq!(next["signal"]["id"], 201);
    assert!(out.exists());
}
