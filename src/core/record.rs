//! Per-user records produced by the merge
//!
//! A [`UserRecord`] is one row of the merged table: the user identifier, the
//! categorical dimensions used for slicing and filtering, and one presence
//! field per funnel step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stage of the user journey, in funnel order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FunnelStep {
    Homepage,
    Search,
    Payment,
    Confirmation,
}

impl FunnelStep {
    /// All steps in their fixed order
    pub const ALL: [FunnelStep; 4] = [
        FunnelStep::Homepage,
        FunnelStep::Search,
        FunnelStep::Payment,
        FunnelStep::Confirmation,
    ];

    /// Column name the step's presence field takes in the merged table
    pub fn name(&self) -> &'static str {
        match self {
            FunnelStep::Homepage => "Homepage",
            FunnelStep::Search => "Search",
            FunnelStep::Payment => "Payment",
            FunnelStep::Confirmation => "Confirmation",
        }
    }

    /// Position of the step in the funnel (0-based)
    pub fn index(self) -> usize {
        match self {
            FunnelStep::Homepage => 0,
            FunnelStep::Search => 1,
            FunnelStep::Payment => 2,
            FunnelStep::Confirmation => 3,
        }
    }

    /// Look up a step by its merged-table column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl std::fmt::Display for FunnelStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A categorical attribute a user can be sliced or filtered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Gender,
    Device,
    Variant,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Gender, Dimension::Device, Dimension::Variant];
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Gender => write!(f, "gender"),
            Dimension::Device => write!(f, "device"),
            Dimension::Variant => write!(f, "variant"),
        }
    }
}

/// One row of the merged table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Step marker per funnel step, `None` when the step was never reached
    pub steps: [Option<String>; 4],

    /// Remaining source columns (e.g. `date`), keyed by column name.
    /// Absent keys are null.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            gender: None,
            device: None,
            variant: None,
            steps: [None, None, None, None],
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style setter used heavily by tests and fixtures
    pub fn with_dimension(mut self, dimension: Dimension, value: &str) -> Self {
        self.set_dimension(dimension, Some(value.to_string()));
        self
    }

    /// Builder-style setter for a step marker
    pub fn with_step(mut self, step: FunnelStep, marker: &str) -> Self {
        self.set_step(step, Some(marker.to_string()));
        self
    }

    pub fn step(&self, step: FunnelStep) -> Option<&str> {
        self.steps[step.index()].as_deref()
    }

    /// Whether the step field is non-null
    pub fn reached(&self, step: FunnelStep) -> bool {
        self.steps[step.index()].is_some()
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Gender => self.gender.as_deref(),
            Dimension::Device => self.device.as_deref(),
            Dimension::Variant => self.variant.as_deref(),
        }
    }

    /// Overwrite a dimension; a null never erases a value already carried
    pub fn set_dimension(&mut self, dimension: Dimension, value: Option<String>) {
        let Some(value) = value else { return };
        let slot = match dimension {
            Dimension::Gender => &mut self.gender,
            Dimension::Device => &mut self.device,
            Dimension::Variant => &mut self.variant,
        };
        *slot = Some(value);
    }

    /// Overwrite a step marker; a null never erases a recorded step
    pub fn set_step(&mut self, step: FunnelStep, marker: Option<String>) {
        if let Some(marker) = marker {
            self.steps[step.index()] = Some(marker);
        }
    }

    /// Overwrite an extra attribute; a null never erases a carried value
    pub fn set_extra(&mut self, column: &str, value: Option<String>) {
        if let Some(value) = value {
            self.extra.insert(column.to_string(), value);
        }
    }
}
