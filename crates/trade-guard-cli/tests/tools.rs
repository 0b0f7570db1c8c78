use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use std::path::Path;

fn write_reference_pack(dir: &Path) {
    write(
        dir.join("sanctions.json"),
        r#"[{
            "unique_id": "OFSI-1001",
            "name": "Petrov Industrial Supplies",
            "entity_type": "organization",
            "regime_code": "RUS",
            "regime_name": "Russia",
            "nationality": "Russia",
            "address_country": "Russia"
        }]"#,
    )
    .unwrap();
    write(
        dir.join("tariff_codes.json"),
        r#"[{
            "code": "8518300000",
            "description": "Headphones and earphones",
            "chapter": "85",
            "heading": "8518",
            "subheading": "851830"
        }]"#,
    )
    .unwrap();
}

fn cmd() -> Command {
    Command::cargo_bin("trade-guard-cli").unwrap()
}

#[test]
fn validate_code_accepts_a_dotted_code() {
    cmd()
        .args(["validate-code", "8518.30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("8518.30: valid"))
        .stdout(predicate::str::contains("normalized: 8518300000"))
        .stdout(predicate::str::contains("chapter 85 / heading 8518"));
}

#[test]
fn validate_code_rejects_a_bad_chapter() {
    cmd()
        .args(["validate-code", "0012345678"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invalid"));
}

#[test]
fn validate_code_json_carries_the_normalization() {
    let output = cmd()
        .args(["validate-code", "8518.30", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["normalized"], "8518300000");
    assert_eq!(value["is_valid_format"], true);
}

#[test]
fn screen_reports_an_exact_match() {
    let temp = tempfile::tempdir().unwrap();
    write_reference_pack(temp.path());

    cmd()
        .args([
            "--reference-dir",
            temp.path().to_str().unwrap(),
            "screen",
            "Petrov Industrial Supplies",
            "--country",
            "Russia",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 match(es)"))
        .stdout(predicate::str::contains("Petrov Industrial Supplies"))
        .stdout(predicate::str::contains("relevance 1.00"));
}

#[test]
fn screen_strict_drops_weak_matches() {
    let temp = tempfile::tempdir().unwrap();
    write_reference_pack(temp.path());

    cmd()
        .args([
            "--reference-dir",
            temp.path().to_str().unwrap(),
            "screen",
            "Petrov Metals",
            "--strict",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches"));
}

#[test]
fn screen_json_lists_match_details() {
    let temp = tempfile::tempdir().unwrap();
    write_reference_pack(temp.path());

    let output = cmd()
        .args([
            "--reference-dir",
            temp.path().to_str().unwrap(),
            "screen",
            "Petrov Industrial Supplies",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["matched"], true);
    assert_eq!(value["exact_matches"], 1);
}

#[test]
fn list_workers_names_builtins_and_roster() {
    let temp = tempfile::tempdir().unwrap();
    let roster = temp.path().join("workers.yaml");
    write(
        &roster,
        "- id: document-consistency\n  instructions: Cross-check the paperwork.\n- id: value-reasonableness\n  instructions: Sanity-check declared values.\n",
    )
    .unwrap();

    cmd()
        .args([
            "list-workers",
            "--with-llm",
            "--workers",
            roster.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("sanctions-screening"))
        .stdout(predicate::str::contains("tariff-validation"))
        .stdout(predicate::str::contains("document-consistency"))
        .stdout(predicate::str::contains("value-reasonableness"));
}
