//! Minimal in-memory tabular representation for CSV sources
//!
//! Cells are `Option<String>`: a cell is null when it is empty or spells one
//! of the common missing-value tokens (see [`NULL_TOKENS`]).

use std::io::Read;

/// Cell spellings read as null
pub const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "<NA>"];

/// Whether a raw CSV cell represents a missing value
pub fn is_null_cell(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw.trim())
}

/// A named table of string cells with a header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl SourceTable {
    /// Build a table from headers and rows.
    ///
    /// Short rows are padded with nulls, long rows are truncated to the header width.
    pub fn new(
        name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Parse a CSV document with a header row
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|cell| {
                    if is_null_cell(cell) {
                        None
                    } else {
                        Some(cell.trim().to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        Ok(Self::new(name, headers, rows))
    }

    /// Convenience constructor for string literals, mostly for tests.
    /// Cells go through the same null detection as CSV input.
    pub fn from_literal(name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| (!is_null_cell(cell)).then(|| cell.to_string()))
                        .collect()
                })
                .collect(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Drop artifact index columns: empty headers and headers starting with `prefix`
    pub fn drop_index_columns(mut self, prefix: &str) -> Self {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|h| !(h.is_empty() || (!prefix.is_empty() && h.starts_with(prefix))))
            .collect();

        if keep.iter().all(|k| *k) {
            return self;
        }

        let dropped: Vec<&String> = self
            .headers
            .iter()
            .zip(&keep)
            .filter(|(_, k)| !**k)
            .map(|(h, _)| h)
            .collect();
        tracing::debug!(table = %self.name, ?dropped, "dropping index columns");

        self.headers = retain_by_mask(std::mem::take(&mut self.headers), &keep);
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|row| retain_by_mask(row, &keep))
            .collect();
        self
    }

    /// Rename a column. Returns `false` when `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, k)| k.then_some(item))
        .collect()
}
