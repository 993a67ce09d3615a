//! Edge cases: malformed inputs, missing data, configuration and determinism

mod common;

use common::{
    funnelkit, funnelkit_in, run_json, setup_standard_dataset, write_standard_dataset,
    write_step, write_table, CONFIRMATION, HOME, PAYMENT, SEARCH, USERS,
};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// ============================================================================
// Load Failures
// ============================================================================

#[test]
fn test_missing_source_file_fails() {
    let tmp = setup_standard_dataset();
    fs::remove_file(tmp.path().join(SEARCH)).unwrap();

    funnelkit_in(tmp.path())
        .arg("funnel")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("search_page_table.csv"));
}

#[test]
fn test_duplicate_user_in_step_table_fails() {
    let tmp = setup_standard_dataset();
    write_step(tmp.path(), PAYMENT, &["1", "2", "2"], "payment_page");

    funnelkit_in(tmp.path())
        .arg("merge")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate user identifier '2'"));

    assert!(!tmp.path().join("merged.csv").exists());
}

#[test]
fn test_step_table_without_page_column_fails() {
    let tmp = setup_standard_dataset();
    write_table(tmp.path(), HOME, &["user_id", "stage"], &[&["1", "home_page"]]);

    funnelkit_in(tmp.path())
        .arg("ab")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'page'"));
}

#[test]
fn test_users_without_variant_column_fails() {
    let tmp = setup_standard_dataset();
    write_table(
        tmp.path(),
        USERS,
        &["user_id", "device", "sex"],
        &[&["1", "Desktop", "Male"]],
    );

    funnelkit_in(tmp.path())
        .arg("merge")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'version'"));
}

// ============================================================================
// Significance Edge Cases
// ============================================================================

#[test]
fn test_no_confirmations_reports_significance_inline() {
    let tmp = setup_standard_dataset();
    write_table(tmp.path(), CONFIRMATION, &["user_id", "page"], &[]);

    let json = run_json(tmp.path(), &["ab"]);
    assert_eq!(json["significance"]["status"], "unavailable");
    assert!(json["significance"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Cannot compute significance"));
    // Conversion tables are still produced
    assert_eq!(json["overall"].as_array().unwrap().len(), 2);
    assert_eq!(json["overall"][0]["conversion_rate"], 0.0);

    funnelkit_in(tmp.path())
        .arg("ab")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cannot compute significance"));
}

#[test]
fn test_empty_selection_reports_significance_inline() {
    let tmp = setup_standard_dataset();
    let json = run_json(tmp.path(), &["report", "--ab-sex", "Other"]);

    assert_eq!(json["ab"]["users"], 0);
    assert_eq!(json["ab"]["overall"].as_array().unwrap().len(), 0);
    assert_eq!(json["significance"]["status"], "unavailable");
}

// ============================================================================
// Data Shape Edge Cases
// ============================================================================

#[test]
fn test_null_tokens_count_as_unreached() {
    let tmp = setup_standard_dataset();
    write_table(
        tmp.path(),
        SEARCH,
        &["user_id", "page"],
        &[
            &["1", "search_page"],
            &["2", "None"],
            &["3", "null"],
            &["4", "N/A"],
        ],
    );

    let json = run_json(tmp.path(), &["funnel"]);
    assert_eq!(json["overall"]["steps"][1]["users"], 1);
}

#[test]
fn test_non_monotonic_conversion_exceeds_100() {
    let tmp = setup_standard_dataset();
    write_step(tmp.path(), PAYMENT, &["1"], "payment_page");
    write_step(tmp.path(), CONFIRMATION, &["1", "2"], "payment_confirmation_page");

    let json = run_json(tmp.path(), &["funnel"]);
    assert_eq!(json["overall"]["steps"][3]["users"], 2);
    assert_eq!(json["overall"]["steps"][3]["conversion_rate"], 200.0);
    assert_eq!(json["metrics"]["payment_to_confirmation"], 200.0);
}

#[test]
fn test_ids_sort_numerically_then_lexically() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_table(
        dir,
        USERS,
        &["user_id", "device", "sex", "version"],
        &[
            &["10", "Desktop", "Male", "A"],
            &["abc", "Mobile", "Female", "B"],
            &["2", "Mobile", "Male", "A"],
        ],
    );
    write_step(dir, HOME, &["10", "2", "1"], "home_page");
    write_step(dir, SEARCH, &[], "search_page");
    write_step(dir, PAYMENT, &[], "payment_page");
    write_step(dir, CONFIRMATION, &[], "payment_confirmation_page");

    let output = funnelkit_in(dir)
        .args(["merge", "-o", "csv"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let ids: Vec<&str> = stdout
        .lines()
        .skip(1)
        .map(|l| l.split(',').next().unwrap())
        .collect();
    // User 1 only appears in the homepage table
    assert_eq!(ids, vec!["1", "2", "10", "abc"]);
}

#[test]
fn test_unnamed_index_column_is_dropped() {
    let tmp = setup_standard_dataset();
    fs::write(
        tmp.path().join(SEARCH),
        "Unnamed: 0,user_id,page\n0,1,search_page\n1,2,search_page\n",
    )
    .unwrap();

    let output = funnelkit_in(tmp.path())
        .args(["merge", "-o", "csv"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let header = stdout.lines().next().unwrap();
    assert!(!header.contains("Unnamed"));
    assert!(header.ends_with("Homepage,Search,Payment,Confirmation"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_in_data_dir_renames_columns() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_standard_dataset(dir);
    fs::write(
        dir.join(USERS),
        "user_id,device,gender,group\n1,Desktop,Male,A\n2,Mobile,Female,B\n",
    )
    .unwrap();
    fs::write(
        dir.join("funnelkit.yaml"),
        "columns:\n  gender: gender\n  variant: group\n",
    )
    .unwrap();

    let json = run_json(dir, &["ab", "--missing", "exclude"]);
    // Users 3-5 only appear in step tables, so their gender is missing
    assert_eq!(json["users"], 2);
    assert_eq!(json["overall"][0]["variant"], "A");
}

#[test]
fn test_config_markers_drive_conversion_cards() {
    let tmp = setup_standard_dataset();
    let config = tmp.path().join("custom.yaml");
    fs::write(&config, "markers:\n  homepage: landing_page\n").unwrap();

    let json = run_json(
        tmp.path(),
        &["funnel", "--config", config.to_str().unwrap()],
    );
    // Non-null reach is unaffected, marker reach finds nobody
    assert_eq!(json["overall"]["steps"][0]["users"], 4);
    assert_eq!(json["metrics"]["home_users"], 0);
    assert_eq!(json["metrics"]["home_to_confirmation"], 0.0);
}

#[test]
fn test_invalid_config_fails() {
    let tmp = setup_standard_dataset();
    fs::write(tmp.path().join("funnelkit.yaml"), "colums:\n  gender: sex\n").unwrap();

    funnelkit_in(tmp.path())
        .arg("funnel")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

#[test]
fn test_data_dir_from_environment() {
    let tmp = setup_standard_dataset();
    let elsewhere = TempDir::new().unwrap();

    funnelkit()
        .current_dir(elsewhere.path())
        .env("FUNNELKIT_DATA_DIR", tmp.path())
        .args(["funnel", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"users\": 4"));
}

// ============================================================================
// Determinism and Logging
// ============================================================================

#[test]
fn test_outputs_are_deterministic() {
    let tmp = setup_standard_dataset();

    for command in ["funnel", "ab"] {
        let first = funnelkit_in(tmp.path())
            .args([command, "-o", "json"])
            .output()
            .unwrap();
        let second = funnelkit_in(tmp.path())
            .args([command, "-o", "json"])
            .output()
            .unwrap();
        assert_eq!(first.stdout, second.stdout, "{} output differs", command);
    }
}

#[test]
fn test_verbose_logs_to_stderr() {
    let tmp = setup_standard_dataset();

    funnelkit_in(tmp.path())
        .args(["-v", "merge", "--no-export"])
        .assert()
        .success()
        .stderr(predicate::str::contains("merged source tables"));
}

#[test]
fn test_quiet_suppresses_warnings() {
    let tmp = setup_standard_dataset();
    write_table(tmp.path(), CONFIRMATION, &["user_id", "page"], &[]);

    funnelkit_in(tmp.path())
        .args(["-q", "ab"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}
