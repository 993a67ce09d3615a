//! Full analysis report: every computed table in one serializable document
//!
//! The significance test is the only step allowed to fail without aborting;
//! its failure is recorded inline and the rest of the report is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::ab::{self, AbAnalysis};
use crate::core::config::{ConfigError, FunnelConfig};
use crate::core::filter::FilterSet;
use crate::core::funnel::{self, FunnelAnalysis};
use crate::core::loader::{self, LoadError, SourceTables};
use crate::core::merge::{self, DuplicateKeyError, MergedTable};
use crate::core::record::FunnelStep;
use crate::core::significance::{self, ChiSquareTest};

/// Fatal errors of the load → merge pipeline
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),
}

/// Load the source tables from `data_dir` and merge them
pub fn load_merged(
    data_dir: &Path,
    config: &FunnelConfig,
) -> Result<(SourceTables, MergedTable), AnalysisError> {
    let sources = loader::load_sources(data_dir, config)?;
    let merged = merge::merge_sources(&sources, &config.columns)?;
    Ok((sources, merged))
}

/// Row counts of the inputs and of the merged table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub users: usize,
    pub homepage: usize,
    pub search: usize,
    pub payment: usize,
    pub confirmation: usize,
    pub merged: usize,
}

impl SourceSummary {
    pub fn new(sources: &SourceTables, merged: &MergedTable) -> Self {
        Self {
            users: sources.users.len(),
            homepage: sources.step(FunnelStep::Homepage).len(),
            search: sources.step(FunnelStep::Search).len(),
            payment: sources.step(FunnelStep::Payment).len(),
            confirmation: sources.step(FunnelStep::Confirmation).len(),
            merged: merged.len(),
        }
    }
}

/// Significance result, or why it could not be computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignificanceOutcome {
    Computed(ChiSquareTest),
    Unavailable { message: String },
}

impl SignificanceOutcome {
    pub fn test(&self) -> Option<&ChiSquareTest> {
        match self {
            SignificanceOutcome::Computed(test) => Some(test),
            SignificanceOutcome::Unavailable { .. } => None,
        }
    }
}

/// Message shown in place of the chi-square result when it is undefined
pub fn unavailable_message(reason: &impl std::fmt::Display) -> String {
    format!("Cannot compute significance: {}", reason)
}

/// Run the chi-square test, turning insufficient data into an inline message
pub fn significance_outcome(
    merged: &MergedTable,
    filters: &FilterSet,
    config: &FunnelConfig,
) -> SignificanceOutcome {
    match significance::test_significance(merged, filters, &config.significance) {
        Ok(test) => SignificanceOutcome::Computed(test),
        Err(e) => {
            tracing::warn!(reason = %e, "significance test skipped");
            SignificanceOutcome::Unavailable {
                message: unavailable_message(&e),
            }
        }
    }
}

/// Everything the toolkit computes for one pair of filter selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub sources: SourceSummary,
    pub funnel_filters: FilterSet,
    pub ab_filters: FilterSet,
    pub funnel: FunnelAnalysis,
    pub ab: AbAnalysis,
    pub significance: SignificanceOutcome,
}

/// Compute the funnel and A/B views and the chi-square test
pub fn build_report(
    sources: &SourceTables,
    merged: &MergedTable,
    funnel_filters: FilterSet,
    ab_filters: FilterSet,
    config: &FunnelConfig,
) -> AnalysisReport {
    let funnel = funnel::analyze_funnel(merged, &funnel_filters, &config.markers);
    let ab = ab::analyze_ab(merged, &ab_filters);
    let significance = significance_outcome(merged, &ab_filters, config);

    AnalysisReport {
        generated_at: Utc::now(),
        sources: SourceSummary::new(sources, merged),
        funnel_filters,
        ab_filters,
        funnel,
        ab,
        significance,
    }
}
