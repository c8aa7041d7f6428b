//! End-to-end CLI tests for the skinvault binary.
//!
//! Only offline surfaces are exercised here (help, version, flag
//! validation, the validate subcommand); the crawl itself runs until
//! interrupted and is covered by the pipeline integration tests.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn skinvault() -> Command {
    Command::cargo_bin("skinvault").expect("binary should build")
}

#[test]
fn test_help_lists_operator_options() {
    skinvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--pages"))
        .stdout(predicate::str::contains("--load-delay"))
        .stdout(predicate::str::contains("--retries"))
        .stdout(predicate::str::contains("--concurrent"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--save-dir"));
}

#[test]
fn test_version_flag() {
    skinvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("skinvault"));
}

#[test]
fn test_unknown_flag_fails() {
    skinvault().arg("--bogus").assert().failure();
}

#[test]
fn test_zero_concurrent_rejected() {
    skinvault().args(["-c", "0"]).assert().failure();
}

#[test]
fn test_validate_empty_store_reports_consistent() {
    let temp = TempDir::new().expect("temp dir");
    skinvault()
        .current_dir(temp.path())
        .args(["--save-dir", "skins", "--db", "skins.db", "-q", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 artifacts"));
}

#[test]
fn test_validate_flags_stray_artifact() {
    let temp = TempDir::new().expect("temp dir");
    let skins = temp.path().join("skins");
    std::fs::create_dir_all(&skins).expect("create skins dir");
    std::fs::write(skins.join("deadbeef.png"), b"png bytes").expect("seed artifact");

    skinvault()
        .current_dir(temp.path())
        .args(["--save-dir", "skins", "--db", "skins.db", "-q", "validate"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1 artifacts"))
        .stdout(predicate::str::contains("missing: deadbeef"));
}
