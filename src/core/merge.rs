//! Full outer join of the source tables into one record per user
//!
//! Tables are joined on the user identifier in fixed order: users, Homepage,
//! Search, Payment, Confirmation. A user present in any table appears exactly
//! once in the result. When several tables carry the same attribute, the
//! last non-null value in join order wins.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::core::config::ColumnConfig;
use crate::core::loader::SourceTables;
use crate::core::record::{Dimension, FunnelStep, UserRecord};
use crate::core::table::SourceTable;

/// A user identifier appeared twice in one source table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Duplicate user identifier '{user_id}' in table '{table}'")]
pub struct DuplicateKeyError {
    pub table: String,
    pub user_id: String,
}

/// Sort key for user identifiers: integers in numeric order, then text
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdKey {
    Int(i64, String),
    Text(String),
}

impl IdKey {
    fn new(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => IdKey::Int(n, raw.to_string()),
            Err(_) => IdKey::Text(raw.to_string()),
        }
    }
}

impl Ord for IdKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Raw text breaks ties between spellings like "7" and "07"
            (IdKey::Int(a, ra), IdKey::Int(b, rb)) => a.cmp(b).then_with(|| ra.cmp(rb)),
            (IdKey::Int(..), IdKey::Text(_)) => Ordering::Less,
            (IdKey::Text(_), IdKey::Int(..)) => Ordering::Greater,
            (IdKey::Text(a), IdKey::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for IdKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What a source column maps to in a [`UserRecord`]
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Key,
    Dimension(Dimension),
    Step(FunnelStep),
    Extra(&'a str),
}

fn column_target<'a>(column: &'a str, columns: &ColumnConfig) -> Target<'a> {
    if column == columns.user_id {
        Target::Key
    } else if column == columns.gender {
        Target::Dimension(Dimension::Gender)
    } else if column == columns.device {
        Target::Dimension(Dimension::Device)
    } else if column == columns.variant {
        Target::Dimension(Dimension::Variant)
    } else if let Some(step) = FunnelStep::from_name(column) {
        Target::Step(step)
    } else {
        Target::Extra(column)
    }
}

/// The merged, user-level table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTable {
    columns: ColumnConfig,
    headers: Vec<String>,
    records: Vec<UserRecord>,
}

impl MergedTable {
    /// Build a merged table directly from records, sorted by user identifier.
    ///
    /// Used for in-memory analysis and tests; identifiers must be unique.
    pub fn from_records(
        records: Vec<UserRecord>,
        columns: &ColumnConfig,
    ) -> Result<Self, DuplicateKeyError> {
        let mut by_id = BTreeMap::new();
        for record in records {
            let key = IdKey::new(&record.user_id);
            if by_id.contains_key(&key) {
                return Err(DuplicateKeyError {
                    table: "records".to_string(),
                    user_id: record.user_id,
                });
            }
            by_id.insert(key, record);
        }

        let mut headers = vec![
            columns.user_id.clone(),
            columns.gender.clone(),
            columns.device.clone(),
            columns.variant.clone(),
        ];
        headers.extend(FunnelStep::ALL.iter().map(|s| s.name().to_string()));

        Ok(Self {
            columns: columns.clone(),
            headers,
            records: by_id.into_values().collect(),
        })
    }

    /// Column names of the merged table in export order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, user_id: &str) -> Option<&UserRecord> {
        self.records.iter().find(|r| r.user_id == user_id)
    }

    /// Distinct values of a dimension in first-appearance order.
    /// When `include_missing` is set and some record lacks the dimension,
    /// `None` is appended last.
    pub fn observed_values(&self, dimension: Dimension, include_missing: bool) -> Vec<Option<String>> {
        distinct_values(self.records.iter(), dimension, include_missing)
    }

    /// Value of a named merged-table column for one record
    pub fn value<'r>(&self, record: &'r UserRecord, column: &str) -> Option<&'r str> {
        match column_target(column, &self.columns) {
            Target::Key => Some(record.user_id.as_str()),
            Target::Dimension(dimension) => record.dimension(dimension),
            Target::Step(step) => record.step(step),
            Target::Extra(name) => record.extra.get(name).map(String::as_str),
        }
    }

    /// Write the merged table as CSV, nulls as empty cells
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        self.write_delimited(writer, b',')
    }

    /// Write the merged table with a custom field delimiter
    pub fn write_delimited<W: Write>(&self, writer: W, delimiter: u8) -> Result<(), csv::Error> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for record in &self.records {
            csv_writer.write_record(
                self.headers
                    .iter()
                    .map(|column| self.value(record, column).unwrap_or("")),
            )?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Export the merged table to a CSV file
    pub fn export(&self, path: &Path) -> Result<(), csv::Error> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)?;
        tracing::info!(path = %path.display(), rows = self.len(), "exported merged table");
        Ok(())
    }
}

/// Distinct dimension values in first-appearance order, missing last
pub fn distinct_values<'a>(
    records: impl Iterator<Item = &'a UserRecord>,
    dimension: Dimension,
    include_missing: bool,
) -> Vec<Option<String>> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    let mut has_missing = false;
    for record in records {
        match record.dimension(dimension) {
            Some(value) => {
                if seen.insert(value) {
                    values.push(Some(value.to_string()));
                }
            }
            None => has_missing = true,
        }
    }
    if include_missing && has_missing {
        values.push(None);
    }
    values
}

/// Outer-join the source tables on the user identifier
pub fn merge_sources(
    sources: &SourceTables,
    columns: &ColumnConfig,
) -> Result<MergedTable, DuplicateKeyError> {
    let mut by_id: BTreeMap<IdKey, UserRecord> = BTreeMap::new();
    let mut headers = vec![columns.user_id.clone()];

    for table in sources.in_join_order() {
        join_table(&mut by_id, &mut headers, table, columns)?;
    }

    let merged = MergedTable {
        columns: columns.clone(),
        headers,
        records: by_id.into_values().collect(),
    };
    tracing::info!(users = merged.len(), "merged source tables");
    Ok(merged)
}

fn join_table(
    by_id: &mut BTreeMap<IdKey, UserRecord>,
    headers: &mut Vec<String>,
    table: &SourceTable,
    columns: &ColumnConfig,
) -> Result<(), DuplicateKeyError> {
    for header in table.headers() {
        if !headers.contains(header) {
            headers.push(header.clone());
        }
    }

    let Some(key_idx) = table.column_index(&columns.user_id) else {
        // Loader guarantees the key column; nothing to join otherwise
        tracing::warn!(table = table.name(), "table has no user id column, skipped");
        return Ok(());
    };

    let targets: Vec<Target<'_>> = table
        .headers()
        .iter()
        .map(|h| column_target(h, columns))
        .collect();

    let mut seen = HashSet::new();
    for row in table.rows() {
        let Some(user_id) = row[key_idx].as_deref() else {
            continue;
        };
        if !seen.insert(user_id) {
            return Err(DuplicateKeyError {
                table: table.name().to_string(),
                user_id: user_id.to_string(),
            });
        }

        let record = by_id
            .entry(IdKey::new(user_id))
            .or_insert_with(|| UserRecord::new(user_id));

        for (target, cell) in targets.iter().zip(row) {
            match *target {
                Target::Key => {}
                Target::Dimension(dimension) => record.set_dimension(dimension, cell.clone()),
                Target::Step(step) => record.set_step(step, cell.clone()),
                Target::Extra(name) => record.set_extra(name, cell.clone()),
            }
        }
    }

    tracing::debug!(table = table.name(), rows = table.len(), total = by_id.len(), "joined table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FunnelConfig;
    use crate::core::loader::USERS_TABLE;

    fn step(name: &str, rows: &[&[&str]]) -> SourceTable {
        SourceTable::from_literal(name, &["user_id", "page"], rows)
    }

    fn sources(users: SourceTable, steps: [SourceTable; 4]) -> SourceTables {
        SourceTables::new(users, steps, &FunnelConfig::default()).unwrap()
    }

    fn basic_sources() -> SourceTables {
        sources(
            SourceTable::from_literal(
                USERS_TABLE,
                &["user_id", "date", "device", "sex", "version"],
                &[
                    &["1", "2015-01-01", "Desktop", "Female", "A"],
                    &["2", "2015-01-02", "Mobile", "Male", "B"],
                    &["10", "2015-01-03", "Desktop", "Male", "A"],
                ],
            ),
            [
                step("Homepage", &[&["1", "home_page"], &["2", "home_page"]]),
                step("Search", &[&["2", "search_page"]]),
                step("Payment", &[&["2", "payment_page"], &["99", "payment_page"]]),
                step("Confirmation", &[&["99", "payment_confirmation_page"]]),
            ],
        )
    }

    #[test]
    fn test_outer_join_keeps_every_user_once() {
        let merged = merge_sources(&basic_sources(), &ColumnConfig::default()).unwrap();
        let ids: Vec<&str> = merged.records().iter().map(|r| r.user_id.as_str()).collect();
        // 99 only appears in step tables; numeric ordering puts 10 after 2
        assert_eq!(ids, vec!["1", "2", "10", "99"]);
    }

    #[test]
    fn test_unmatched_fields_are_null() {
        let merged = merge_sources(&basic_sources(), &ColumnConfig::default()).unwrap();

        let user_1 = merged.get("1").unwrap();
        assert_eq!(user_1.step(FunnelStep::Homepage), Some("home_page"));
        assert!(!user_1.reached(FunnelStep::Search));
        assert_eq!(user_1.extra.get("date").map(String::as_str), Some("2015-01-01"));

        let user_99 = merged.get("99").unwrap();
        assert_eq!(user_99.gender, None);
        assert_eq!(user_99.variant, None);
        assert!(user_99.reached(FunnelStep::Payment));
        assert!(user_99.reached(FunnelStep::Confirmation));
        assert!(!user_99.reached(FunnelStep::Homepage));
    }

    #[test]
    fn test_duplicate_key_in_source_fails() {
        let tables = sources(
            SourceTable::from_literal(USERS_TABLE, &["user_id", "device", "sex", "version"], &[]),
            [
                step("Homepage", &[&["1", "home_page"], &["1", "home_page"]]),
                step("Search", &[]),
                step("Payment", &[]),
                step("Confirmation", &[]),
            ],
        );
        let err = merge_sources(&tables, &ColumnConfig::default()).unwrap_err();
        assert_eq!(
            err,
            DuplicateKeyError {
                table: "Homepage".to_string(),
                user_id: "1".to_string()
            }
        );
    }

    #[test]
    fn test_last_merge_wins_for_dimensions() {
        let tables = sources(
            SourceTable::from_literal(
                USERS_TABLE,
                &["user_id", "device", "sex", "version"],
                &[&["1", "Desktop", "Male", "A"]],
            ),
            [
                step("Homepage", &[&["1", "home_page"]]),
                SourceTable::from_literal(
                    "Search",
                    &["user_id", "page", "device"],
                    &[&["1", "search_page", "Mobile"]],
                ),
                SourceTable::from_literal(
                    "Payment",
                    &["user_id", "page", "device"],
                    &[&["1", "payment_page", ""]],
                ),
                step("Confirmation", &[]),
            ],
        );
        let merged = merge_sources(&tables, &ColumnConfig::default()).unwrap();
        // Search overrides users; Payment's null leaves Search's value in place
        assert_eq!(merged.get("1").unwrap().device.as_deref(), Some("Mobile"));
    }

    #[test]
    fn test_headers_follow_join_order() {
        let merged = merge_sources(&basic_sources(), &ColumnConfig::default()).unwrap();
        assert_eq!(
            merged.headers(),
            &[
                "user_id",
                "date",
                "device",
                "sex",
                "version",
                "Homepage",
                "Search",
                "Payment",
                "Confirmation"
            ]
        );
    }

    #[test]
    fn test_write_csv() {
        let merged = merge_sources(&basic_sources(), &ColumnConfig::default()).unwrap();
        let mut out = Vec::new();
        merged.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "user_id,date,device,sex,version,Homepage,Search,Payment,Confirmation"
        );
        assert_eq!(lines[1], "1,2015-01-01,Desktop,Female,A,home_page,,,");
        assert_eq!(lines[4], "99,,,,,,,payment_page,payment_confirmation_page");
    }

    #[test]
    fn test_observed_values() {
        let merged = merge_sources(&basic_sources(), &ColumnConfig::default()).unwrap();
        assert_eq!(
            merged.observed_values(Dimension::Gender, false),
            vec![Some("Female".to_string()), Some("Male".to_string())]
        );
        assert_eq!(
            merged.observed_values(Dimension::Gender, true),
            vec![Some("Female".to_string()), Some("Male".to_string()), None]
        );
    }

    #[test]
    fn test_id_ordering() {
        let mut keys = vec![IdKey::new("b"), IdKey::new("10"), IdKey::new("a"), IdKey::new("9")];
        keys.sort();
        assert_eq!(
            keys,
            vec![IdKey::new("9"), IdKey::new("10"), IdKey::new("a"), IdKey::new("b")]
        );
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let records = vec![UserRecord::new("1"), UserRecord::new("1")];
        assert!(MergedTable::from_records(records, &ColumnConfig::default()).is_err());
    }
}
