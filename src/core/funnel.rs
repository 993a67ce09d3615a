//! Funnel aggregation: step reach counts, conversion cards and sliced funnels
//!
//! Two reach definitions coexist and are both kept:
//! - funnel counts treat a step as reached when its field is non-null
//! - conversion cards count distinct users whose field equals the step marker

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::config::StepMarkers;
use crate::core::filter::FilterSet;
use crate::core::merge::{distinct_values, MergedTable};
use crate::core::record::{Dimension, FunnelStep, UserRecord};

/// Title used for the unsliced funnel
pub const OVERALL_TITLE: &str = "Overall Funnel";

/// `downstream / upstream * 100`, or 0 when nobody reached the upstream step
pub fn conversion_rate(downstream: usize, upstream: usize) -> f64 {
    if upstream == 0 {
        0.0
    } else {
        downstream as f64 / upstream as f64 * 100.0
    }
}

/// Reach for one funnel step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCount {
    pub step: FunnelStep,
    pub users: usize,
    /// Share of the first step's users (0-100)
    pub percent_of_initial: f64,
    /// Share of the previous step's users; 100 for a non-empty first step.
    /// Exceeds 100 when the raw data skips the previous step.
    pub conversion_rate: f64,
    pub drop_off_rate: f64,
}

/// Non-null reach of every step, in funnel order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelCounts {
    pub steps: Vec<StepCount>,
}

impl FunnelCounts {
    /// Count non-null step fields across `rows`
    pub fn from_rows(rows: &[&UserRecord]) -> Self {
        let mut counts = [0usize; 4];
        for record in rows {
            for step in FunnelStep::ALL {
                if record.reached(step) {
                    counts[step.index()] += 1;
                }
            }
        }
        Self::from_counts(counts)
    }

    /// Derive percentages from raw counts in funnel order
    pub fn from_counts(counts: [usize; 4]) -> Self {
        let initial = counts[0];
        let mut previous = initial;
        let steps = FunnelStep::ALL
            .iter()
            .map(|&step| {
                let users = counts[step.index()];
                let conversion = conversion_rate(users, previous);
                let drop_off_rate = if previous == 0 { 0.0 } else { 100.0 - conversion };
                previous = users;
                StepCount {
                    step,
                    users,
                    percent_of_initial: conversion_rate(users, initial),
                    conversion_rate: conversion,
                    drop_off_rate,
                }
            })
            .collect();
        Self { steps }
    }

    /// Raw counts in funnel order
    pub fn counts(&self) -> [usize; 4] {
        let mut out = [0usize; 4];
        for step in &self.steps {
            out[step.step.index()] = step.users;
        }
        out
    }

    pub fn users(&self, step: FunnelStep) -> usize {
        self.counts()[step.index()]
    }
}

/// Users matching each step marker and the three conversion cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionMetrics {
    pub home_users: usize,
    pub payment_users: usize,
    pub confirmation_users: usize,
    pub home_to_confirmation: f64,
    pub home_to_payment: f64,
    pub payment_to_confirmation: f64,
}

impl ConversionMetrics {
    pub fn from_rows(rows: &[&UserRecord], markers: &StepMarkers) -> Self {
        let home_users = marker_reach(rows, FunnelStep::Homepage, markers);
        let payment_users = marker_reach(rows, FunnelStep::Payment, markers);
        let confirmation_users = marker_reach(rows, FunnelStep::Confirmation, markers);

        Self {
            home_users,
            payment_users,
            confirmation_users,
            home_to_confirmation: conversion_rate(confirmation_users, home_users),
            home_to_payment: conversion_rate(payment_users, home_users),
            payment_to_confirmation: conversion_rate(confirmation_users, payment_users),
        }
    }
}

/// Distinct users whose step field equals that step's marker exactly
pub fn marker_reach(rows: &[&UserRecord], step: FunnelStep, markers: &StepMarkers) -> usize {
    let marker = markers.marker(step);
    rows.iter()
        .filter(|r| r.step(step) == Some(marker))
        .map(|r| r.user_id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Funnel counts for one dimension value (`None` = missing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelSlice {
    pub value: Option<String>,
    pub counts: FunnelCounts,
}

/// Independent funnels, one per distinct value of a dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicedFunnel {
    pub dimension: Dimension,
    pub slices: Vec<FunnelSlice>,
}

impl SlicedFunnel {
    /// Slices follow first appearance in `rows`; the missing slice comes last
    pub fn from_rows(rows: &[&UserRecord], dimension: Dimension) -> Self {
        let slices = distinct_values(rows.iter().copied(), dimension, true)
            .into_iter()
            .map(|value| {
                let members: Vec<&UserRecord> = rows
                    .iter()
                    .copied()
                    .filter(|r| r.dimension(dimension) == value.as_deref())
                    .collect();
                FunnelSlice {
                    value,
                    counts: FunnelCounts::from_rows(&members),
                }
            })
            .collect();
        Self { dimension, slices }
    }

    pub fn slice(&self, value: Option<&str>) -> Option<&FunnelSlice> {
        self.slices.iter().find(|s| s.value.as_deref() == value)
    }
}

/// Everything the funnel view shows for one filter selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelAnalysis {
    pub title: String,
    pub users: usize,
    pub overall: FunnelCounts,
    pub metrics: ConversionMetrics,
    pub by_gender: SlicedFunnel,
    pub by_device: SlicedFunnel,
}

/// Filter the merged table and compute the full funnel view
pub fn analyze_funnel(
    table: &MergedTable,
    filters: &FilterSet,
    markers: &StepMarkers,
) -> FunnelAnalysis {
    let rows = filters.apply(table);
    analyze_rows(&rows, markers)
}

/// Compute the funnel view over already-filtered rows
pub fn analyze_rows(rows: &[&UserRecord], markers: &StepMarkers) -> FunnelAnalysis {
    let overall = FunnelCounts::from_rows(rows);
    tracing::debug!(counts = ?overall.counts(), "computed overall funnel");

    FunnelAnalysis {
        title: OVERALL_TITLE.to_string(),
        users: rows.len(),
        metrics: ConversionMetrics::from_rows(rows, markers),
        by_gender: SlicedFunnel::from_rows(rows, Dimension::Gender),
        by_device: SlicedFunnel::from_rows(rows, Dimension::Device),
        overall,
    }
}
