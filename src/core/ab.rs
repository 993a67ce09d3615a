//! A/B aggregation: confirmation distribution and Payment → Confirmation
//! conversion per variant, optionally sliced by a second dimension
//!
//! Grouping only emits observed key combinations and skips rows whose key is
//! missing. Groups come out in sorted key order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::filter::FilterSet;
use crate::core::merge::MergedTable;
use crate::core::record::{Dimension, FunnelStep, UserRecord};

/// Confirmed users attributed to one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCount {
    pub variant: String,
    pub confirmed_users: usize,
}

/// Conversion of Payment-reaching users for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRow {
    pub variant: String,

    /// Value of the slicing dimension; absent for the per-variant table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,

    /// Fraction converted (0-1)
    pub conversion_rate: f64,
    pub converted: usize,
    pub sample_size: usize,
}

/// Conversion by variant and one extra dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedConversion {
    pub dimension: Dimension,
    pub rows: Vec<ConversionRow>,
}

/// Everything the A/B view shows for one filter selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbAnalysis {
    pub users: usize,
    pub confirmations: Vec<VariantCount>,
    pub overall: Vec<ConversionRow>,
    pub by_gender: SegmentedConversion,
    pub by_device: SegmentedConversion,
}

/// Distinct confirmed users per variant
pub fn confirmation_distribution(rows: &[&UserRecord]) -> Vec<VariantCount> {
    let mut users: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in rows.iter().filter(|r| r.reached(FunnelStep::Confirmation)) {
        if let Some(variant) = record.dimension(Dimension::Variant) {
            users.entry(variant).or_default().insert(record.user_id.as_str());
        }
    }
    users
        .into_iter()
        .map(|(variant, ids)| VariantCount {
            variant: variant.to_string(),
            confirmed_users: ids.len(),
        })
        .collect()
}

#[derive(Default)]
struct Tally {
    converted: usize,
    total: usize,
}

impl Tally {
    fn add(&mut self, converted: bool) {
        self.total += 1;
        if converted {
            self.converted += 1;
        }
    }

    fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.converted as f64 / self.total as f64
        }
    }
}

/// Rows that reached Payment, paired with whether they also confirmed
fn payment_outcomes<'a>(rows: &'a [&'a UserRecord]) -> impl Iterator<Item = (&'a UserRecord, bool)> + 'a {
    rows.iter()
        .copied()
        .filter(|r| r.reached(FunnelStep::Payment))
        .map(|r| (r, r.reached(FunnelStep::Confirmation)))
}

/// Payment → Confirmation conversion per variant
pub fn conversion_by_variant(rows: &[&UserRecord]) -> Vec<ConversionRow> {
    let mut groups: BTreeMap<&str, Tally> = BTreeMap::new();
    for (record, converted) in payment_outcomes(rows) {
        if let Some(variant) = record.dimension(Dimension::Variant) {
            groups.entry(variant).or_default().add(converted);
        }
    }
    groups
        .into_iter()
        .map(|(variant, tally)| ConversionRow {
            variant: variant.to_string(),
            segment: None,
            conversion_rate: tally.rate(),
            converted: tally.converted,
            sample_size: tally.total,
        })
        .collect()
}

/// Payment → Confirmation conversion per (variant, dimension value)
pub fn conversion_by_segment(rows: &[&UserRecord], dimension: Dimension) -> SegmentedConversion {
    let mut groups: BTreeMap<(&str, &str), Tally> = BTreeMap::new();
    for (record, converted) in payment_outcomes(rows) {
        let variant = record.dimension(Dimension::Variant);
        let segment = record.dimension(dimension);
        if let (Some(variant), Some(segment)) = (variant, segment) {
            groups.entry((variant, segment)).or_default().add(converted);
        }
    }
    let rows = groups
        .into_iter()
        .map(|((variant, segment), tally)| ConversionRow {
            variant: variant.to_string(),
            segment: Some(segment.to_string()),
            conversion_rate: tally.rate(),
            converted: tally.converted,
            sample_size: tally.total,
        })
        .collect();
    SegmentedConversion { dimension, rows }
}

/// Filter the merged table and compute the full A/B view
pub fn analyze_ab(table: &MergedTable, filters: &FilterSet) -> AbAnalysis {
    let rows = filters.apply(table);
    analyze_rows(&rows)
}

/// Compute the A/B view over already-filtered rows
pub fn analyze_rows(rows: &[&UserRecord]) -> AbAnalysis {
    let analysis = AbAnalysis {
        users: rows.len(),
        confirmations: confirmation_distribution(rows),
        overall: conversion_by_variant(rows),
        by_gender: conversion_by_segment(rows, Dimension::Gender),
        by_device: conversion_by_segment(rows, Dimension::Device),
    };
    tracing::debug!(
        variants = analysis.overall.len(),
        confirmations = analysis.confirmations.len(),
        "computed A/B conversion"
    );
    analysis
}
