//! Shared test helpers for integration tests

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get a funnelkit command isolated from the caller's environment
pub fn funnelkit() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("funnelkit"));
    cmd.env_remove("FUNNELKIT_DATA_DIR")
        .env_remove("FUNNELKIT_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to run funnelkit against a data directory
pub fn funnelkit_in(dir: &Path) -> Command {
    let mut cmd = funnelkit();
    cmd.current_dir(dir).arg("--data-dir").arg(dir);
    cmd
}

pub const USERS: &str = "user_table.csv";
pub const HOME: &str = "home_page_table.csv";
pub const SEARCH: &str = "search_page_table.csv";
pub const PAYMENT: &str = "payment_page_table.csv";
pub const CONFIRMATION: &str = "payment_confirmation_table.csv";

/// Write a CSV file with a leading unnamed index column
pub fn write_table(dir: &Path, file: &str, headers: &[&str], rows: &[&[&str]]) {
    let mut out = format!(",{}\n", headers.join(","));
    for (i, row) in rows.iter().enumerate() {
        out.push_str(&format!("{},{}\n", i, row.join(",")));
    }
    fs::write(dir.join(file), out).unwrap();
}

/// Write a step table where every listed user carries `marker`
pub fn write_step(dir: &Path, file: &str, ids: &[&str], marker: &str) {
    let rows: Vec<Vec<&str>> = ids.iter().map(|id| vec![*id, marker]).collect();
    let rows: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
    write_table(dir, file, &["user_id", "page"], &rows);
}

/// Five users over two variants:
///
/// | id | device  | sex    | version | reached                        |
/// |----|---------|--------|---------|--------------------------------|
/// | 1  | Desktop | Male   | A       | home, search, payment, confirm |
/// | 2  | Mobile  | Female | B       | home, search, payment          |
/// | 3  | Mobile  | Male   | A       | home, search                   |
/// | 4  | Desktop | Female | B       | home, search, payment, confirm |
/// | 5  | Mobile  | (NA)   | A       | home                           |
pub fn write_standard_dataset(dir: &Path) {
    write_table(
        dir,
        USERS,
        &["user_id", "date", "device", "sex", "version"],
        &[
            &["1", "2015-01-01", "Desktop", "Male", "A"],
            &["2", "2015-01-02", "Mobile", "Female", "B"],
            &["3", "2015-01-02", "Mobile", "Male", "A"],
            &["4", "2015-01-03", "Desktop", "Female", "B"],
            &["5", "2015-01-04", "Mobile", "NA", "A"],
        ],
    );
    write_step(dir, HOME, &["1", "2", "3", "4", "5"], "home_page");
    write_step(dir, SEARCH, &["1", "2", "3", "4"], "search_page");
    write_step(dir, PAYMENT, &["1", "2", "4"], "payment_page");
    write_step(dir, CONFIRMATION, &["1", "4"], "payment_confirmation_page");
}

/// Temp directory holding the standard dataset
pub fn setup_standard_dataset() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_standard_dataset(tmp.path());
    tmp
}

/// Run a command with `-o json` and parse stdout
pub fn run_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = funnelkit_in(dir)
        .args(args)
        .args(["-o", "json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}
