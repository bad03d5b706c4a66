//! Tests for binaries built with an external `tempo_entry` linked in.
//!
//! Run with an object produced by `tempo-conformance emit`, e.g.
//!
//! ```text
//! tempo-conformance emit --variant int_arithmetic -o /tmp/entry.o
//! TEMPO_ENTRY_OBJECT=/tmp/entry.o TEMPO_ENTRY_VARIANT=int_arithmetic \
//!     cargo test -p tempo-cli --features linked-entry
//! ```

#![cfg(feature = "linked-entry")]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

const LINKED_VARIANT: &str = env!("TEMPO_LINKED_VARIANT");

#[test]
fn verify_runs_the_driver_over_the_linked_entry() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = cargo_bin_cmd!("tempo-conformance")
        .current_dir(dir.path())
        .args(["verify", "--linked", "--repeat", "3", "--format", "json"])
        .output()?;
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["passed"], true);
    let reports = report["reports"].as_array().expect("reports array");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["variant"], LINKED_VARIANT);
    let cases = reports[0]["cases"].as_array().expect("cases array");
    // Three invocations per case plus one replay each.
    assert_eq!(reports[0]["invocations"], cases.len() * 4);
    Ok(())
}

#[test]
fn host_calls_the_linked_entry() {
    let assert = cargo_bin_cmd!("tempo-host").arg("10").assert();
    match LINKED_VARIANT {
        "int_to_int" => {
            assert
                .success()
                .stdout(predicate::str::is_match(r"^-?\d+\n$").expect("valid regex"));
        }
        other => {
            assert
                .code(1)
                .stdout(predicate::str::is_empty())
                .stderr(predicate::str::contains(format!(
                    "needs an int_to_int entry point, found {other}"
                )));
        }
    }
}

#[test]
fn host_still_rejects_malformed_literals() {
    cargo_bin_cmd!("tempo-host")
        .arg("12abc")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Fatal error: Invalid integer '12abc'"));
}
