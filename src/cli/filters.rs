//! Dimension filter arguments shared by the analysis commands
//!
//! Without `--sex`/`--device` a command selects every observed value. Users
//! whose gender or device is missing pass only when missing is included,
//! which the funnel view leaves off and the A/B view turns on by default.

use clap::ValueEnum;
use std::collections::BTreeSet;

use crate::core::filter::{FilterSet, Selection};
use crate::core::merge::MergedTable;
use crate::core::record::Dimension;

/// Whether users with a missing dimension value pass the filters
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MissingFilter {
    /// Keep users with a missing gender or device
    Include,
    /// Drop users with a missing gender or device
    Exclude,
}

impl MissingFilter {
    pub fn includes(&self) -> bool {
        matches!(self, MissingFilter::Include)
    }
}

impl std::fmt::Display for MissingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingFilter::Include => write!(f, "include"),
            MissingFilter::Exclude => write!(f, "exclude"),
        }
    }
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Gender values to keep (comma-separated; default: every observed value)
    #[arg(long, value_delimiter = ',')]
    pub sex: Option<Vec<String>>,

    /// Device values to keep (comma-separated; default: every observed value)
    #[arg(long, value_delimiter = ',')]
    pub device: Option<Vec<String>>,

    /// Keep or drop users whose gender or device is missing
    #[arg(long)]
    pub missing: Option<MissingFilter>,
}

impl FilterArgs {
    /// Build the filter set against the observed values of `table`
    ///
    /// `default_missing` applies only to dimensions left at their default
    /// selection. An explicit value list includes missing only when
    /// `--missing include` is given.
    pub fn to_filter_set(&self, table: &MergedTable, default_missing: MissingFilter) -> FilterSet {
        FilterSet {
            gender: self.selection(self.sex.as_deref(), table, Dimension::Gender, default_missing),
            device: self.selection(self.device.as_deref(), table, Dimension::Device, default_missing),
        }
    }

    fn selection(
        &self,
        values: Option<&[String]>,
        table: &MergedTable,
        dimension: Dimension,
        default_missing: MissingFilter,
    ) -> Selection {
        match values {
            None => {
                let missing = self.missing.unwrap_or(default_missing);
                Selection::observed(table, dimension, missing.includes())
            }
            Some(values) => {
                let mut selected: BTreeSet<Option<String>> = values
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(|v| Some(v.to_string()))
                    .collect();
                if self.missing == Some(MissingFilter::Include) {
                    selected.insert(None);
                }
                Selection::Only(selected)
            }
        }
    }
}
