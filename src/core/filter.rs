//! Dimension filters applied before aggregation
//!
//! A row passes a dimension filter only when its value for that dimension is
//! in the selected set. Missing is a value of its own (`None`) and must be
//! selected explicitly. An empty selection therefore passes no rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::merge::MergedTable;
use crate::core::record::{Dimension, UserRecord};

/// Selected values for one dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// No restriction on this dimension
    #[default]
    Any,
    /// Only these values (`None` = missing) pass
    Only(BTreeSet<Option<String>>),
}

impl Selection {
    /// Exact-match selection from a list of values
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Selection::Only(values.into_iter().map(|v| v.map(Into::into)).collect())
    }

    /// Selection passing nothing
    pub fn none() -> Self {
        Selection::Only(BTreeSet::new())
    }

    /// Every value observed in the table, optionally including missing
    pub fn observed(table: &MergedTable, dimension: Dimension, include_missing: bool) -> Self {
        Selection::Only(table.observed_values(dimension, include_missing).into_iter().collect())
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Selection::Any => true,
            Selection::Only(values) => values.contains(&value.map(str::to_string)),
        }
    }
}

/// Active selections for the filterable dimensions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub gender: Selection,
    pub device: Selection,
}

impl FilterSet {
    /// No restriction on any dimension
    pub fn all() -> Self {
        Self::default()
    }

    /// Every observed gender and device value; missing only when asked for
    pub fn observed(table: &MergedTable, include_missing: bool) -> Self {
        Self {
            gender: Selection::observed(table, Dimension::Gender, include_missing),
            device: Selection::observed(table, Dimension::Device, include_missing),
        }
    }

    pub fn with_gender(mut self, selection: Selection) -> Self {
        self.gender = selection;
        self
    }

    pub fn with_device(mut self, selection: Selection) -> Self {
        self.device = selection;
        self
    }

    pub fn matches(&self, record: &UserRecord) -> bool {
        self.gender.matches(record.dimension(Dimension::Gender))
            && self.device.matches(record.dimension(Dimension::Device))
    }

    /// Borrow the rows passing every filter, in table order
    pub fn apply<'a>(&self, table: &'a MergedTable) -> Vec<&'a UserRecord> {
        let rows: Vec<&UserRecord> = table.records().iter().filter(|r| self.matches(r)).collect();
        tracing::debug!(total = table.len(), kept = rows.len(), "applied dimension filters");
        rows
    }
}
