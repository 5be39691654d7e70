//! CLI surface checks through the real binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn edgewatch() -> Command {
    Command::cargo_bin("edgewatch").expect("binary builds")
}

#[test]
fn help_lists_core_commands() {
    edgewatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("portfolio"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    edgewatch().arg("bogus").assert().failure();
}

#[test]
fn db_migrate_bootstraps_a_fresh_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("test.db");

    edgewatch()
        .args(["--db", db.to_str().unwrap(), "db", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migrations up to date"));
    assert!(db.exists());
}

#[test]
fn commands_refuse_an_unmigrated_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("fresh.db");

    // No migrate first: schema mismatch is a system error (exit 2).
    edgewatch()
        .args(["--db", db.to_str().unwrap(), "alerts", "list"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("schema mismatch"));
}

#[test]
fn alert_lifecycle_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");
    let db = db.to_str().unwrap();

    edgewatch().args(["--db", db, "db", "migrate"]).assert().success();

    edgewatch()
        .args([
            "--db", db, "alerts", "add", "price", "FED-24DEC", "0.60", "above",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("created"));

    edgewatch()
        .args(["--db", db, "alerts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FED-24DEC"))
        .stdout(predicate::str::contains("active"));
}

#[test]
fn invalid_alert_kind_is_a_user_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");
    let db = db.to_str().unwrap();

    edgewatch().args(["--db", db, "db", "migrate"]).assert().success();

    edgewatch()
        .args([
            "--db", db, "alerts", "add", "vibes", "FED-24DEC", "0.60", "above",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn prune_defaults_to_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("prune.db");
    let db = db.to_str().unwrap();

    edgewatch().args(["--db", db, "db", "migrate"]).assert().success();

    edgewatch()
        .args(["--db", db, "db", "prune", "--older-than-days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would delete"))
        .stdout(predicate::str::contains("dry run"));
}

#[test]
fn invalid_environment_variable_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("env.db");

    edgewatch()
        .env("ENVIRONMENT", "staging")
        .args(["--db", db.to_str().unwrap(), "db", "migrate"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ENVIRONMENT"));
}
