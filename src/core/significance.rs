//! Chi-square test of independence between variant and confirmation
//!
//! The contingency table cross-tabulates every filtered row with a variant
//! (rows) against whether Confirmation is non-null (columns). Unlike the A/B
//! conversion rates, rows are not restricted to users who reached Payment.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::config::SignificanceConfig;
use crate::core::filter::FilterSet;
use crate::core::merge::MergedTable;
use crate::core::record::{Dimension, FunnelStep, UserRecord};

/// Column labels of the contingency table
pub const OUTCOME_LABELS: [&str; 2] = ["not confirmed", "confirmed"];

/// The test statistic is undefined for this table
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsufficientDataError {
    #[error("no rows with a variant value")]
    Empty,

    #[error("variant '{0}' has no observations")]
    ZeroRow(String),

    #[error("no users are {0}")]
    ZeroColumn(&'static str),

    #[error("chi-square distribution unavailable: {0}")]
    Distribution(String),
}

/// Observed counts of variant × confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    /// Row labels, sorted
    pub variants: Vec<String>,
    /// `[not confirmed, confirmed]` per variant
    pub counts: Vec<[u64; 2]>,
}

impl ContingencyTable {
    /// Cross-tabulate rows; rows without a variant are dropped
    pub fn from_rows(rows: &[&UserRecord]) -> Self {
        let mut cells: BTreeMap<&str, [u64; 2]> = BTreeMap::new();
        for record in rows {
            if let Some(variant) = record.dimension(Dimension::Variant) {
                let col = usize::from(record.reached(FunnelStep::Confirmation));
                cells.entry(variant).or_default()[col] += 1;
            }
        }
        Self {
            variants: cells.keys().map(|v| v.to_string()).collect(),
            counts: cells.into_values().collect(),
        }
    }

    /// Build from explicit counts (labels must be unique)
    pub fn from_counts(rows: Vec<(String, [u64; 2])>) -> Self {
        let (variants, counts) = rows.into_iter().unzip();
        Self { variants, counts }
    }

    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row[0] + row[1]).collect()
    }

    pub fn column_totals(&self) -> [u64; 2] {
        self.counts
            .iter()
            .fold([0, 0], |acc, row| [acc[0] + row[0], acc[1] + row[1]])
    }

    pub fn total(&self) -> u64 {
        self.row_totals().iter().sum()
    }

    /// (rows − 1) × (cols − 1)
    pub fn degrees_of_freedom(&self) -> usize {
        self.variants.len().saturating_sub(1) * (OUTCOME_LABELS.len() - 1)
    }

    /// Expected frequencies under independence: row total × column total / N
    pub fn expected(&self) -> Vec<[f64; 2]> {
        let total = self.total() as f64;
        let cols = self.column_totals();
        self.row_totals()
            .into_iter()
            .map(|row| {
                [
                    row as f64 * cols[0] as f64 / total,
                    row as f64 * cols[1] as f64 / total,
                ]
            })
            .collect()
    }

    fn check_defined(&self) -> Result<(), InsufficientDataError> {
        if self.variants.is_empty() || self.total() == 0 {
            return Err(InsufficientDataError::Empty);
        }
        if let Some(idx) = self.row_totals().iter().position(|t| *t == 0) {
            return Err(InsufficientDataError::ZeroRow(self.variants[idx].clone()));
        }
        if let Some(idx) = self.column_totals().iter().position(|t| *t == 0) {
            return Err(InsufficientDataError::ZeroColumn(OUTCOME_LABELS[idx]));
        }
        Ok(())
    }
}

/// Outcome of the threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Significant,
    NotSignificant,
}

impl Verdict {
    /// Strictly below `alpha` is significant
    pub fn from_p_value(p_value: f64, alpha: f64) -> Self {
        if p_value < alpha {
            Verdict::Significant
        } else {
            Verdict::NotSignificant
        }
    }

    pub fn is_significant(&self) -> bool {
        matches!(self, Verdict::Significant)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Significant => write!(f, "significant difference"),
            Verdict::NotSignificant => write!(f, "no significant difference"),
        }
    }
}

/// Result of the chi-square test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareTest {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    pub observed: ContingencyTable,
    pub expected: Vec<[f64; 2]>,
    pub yates_correction: bool,
    pub alpha: f64,
    pub verdict: Verdict,
}

impl ChiSquareTest {
    /// One-line human summary of the verdict
    pub fn summary(&self) -> String {
        match self.verdict {
            Verdict::Significant => format!(
                "Statistically significant difference in confirmation rates between variants (p < {})",
                self.alpha
            ),
            Verdict::NotSignificant => format!(
                "No statistically significant difference in confirmation rates between variants (p ≥ {})",
                self.alpha
            ),
        }
    }
}

/// Run the chi-square independence test on a contingency table
pub fn chi_square_test(
    table: &ContingencyTable,
    settings: &SignificanceConfig,
) -> Result<ChiSquareTest, InsufficientDataError> {
    table.check_defined()?;

    let expected = table.expected();
    let dof = table.degrees_of_freedom();
    let yates = settings.yates_correction && dof == 1;

    let (statistic, p_value) = if dof == 0 {
        // A single variant: nothing to compare against
        (0.0, 1.0)
    } else {
        let statistic = chi_square_statistic(&table.counts, &expected, yates);
        let dist = ChiSquared::new(dof as f64)
            .map_err(|e| InsufficientDataError::Distribution(e.to_string()))?;
        let p_value = (1.0 - dist.cdf(statistic)).clamp(0.0, 1.0);
        (statistic, p_value)
    };

    let verdict = Verdict::from_p_value(p_value, settings.alpha);
    tracing::info!(statistic, p_value, dof, %verdict, "chi-square test");

    Ok(ChiSquareTest {
        statistic,
        p_value,
        degrees_of_freedom: dof,
        observed: table.clone(),
        expected,
        yates_correction: yates,
        alpha: settings.alpha,
        verdict,
    })
}

/// Σ (O − E)² / E, with each |O − E| shrunk by up to 0.5 under Yates' correction
fn chi_square_statistic(observed: &[[u64; 2]], expected: &[[f64; 2]], yates: bool) -> f64 {
    observed
        .iter()
        .flatten()
        .zip(expected.iter().flatten())
        .map(|(&o, &e)| {
            let mut diff = (o as f64 - e).abs();
            if yates {
                diff -= diff.min(0.5);
            }
            diff * diff / e
        })
        .sum()
}

/// Filter the merged table, cross-tabulate and test
pub fn test_significance(
    table: &MergedTable,
    filters: &FilterSet,
    settings: &SignificanceConfig,
) -> Result<ChiSquareTest, InsufficientDataError> {
    let rows = filters.apply(table);
    chi_square_test(&ContingencyTable::from_rows(&rows), settings)
}
