//! Core module - loading, merging and the funnel/A/B computations

pub mod ab;
pub mod config;
pub mod filter;
pub mod funnel;
pub mod loader;
pub mod merge;
pub mod record;
pub mod report;
pub mod significance;
pub mod table;

pub use ab::{AbAnalysis, ConversionRow, SegmentedConversion, VariantCount};
pub use config::{ConfigError, FunnelConfig};
pub use filter::{FilterSet, Selection};
pub use funnel::{ConversionMetrics, FunnelAnalysis, FunnelCounts, SlicedFunnel};
pub use loader::{LoadError, SourceTables};
pub use merge::{DuplicateKeyError, MergedTable};
pub use record::{Dimension, FunnelStep, UserRecord};
pub use report::{AnalysisError, AnalysisReport, SignificanceOutcome};
pub use significance::{ChiSquareTest, ContingencyTable, InsufficientDataError, Verdict};
pub use table::SourceTable;
