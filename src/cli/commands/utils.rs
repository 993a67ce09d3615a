//! Shared utilities for CLI commands

use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::config::FunnelConfig;
use crate::core::loader::SourceTables;
use crate::core::merge::MergedTable;
use crate::core::report;

/// Config, raw sources and merged table for one invocation
pub struct Workspace {
    pub config: FunnelConfig,
    pub sources: SourceTables,
    pub merged: MergedTable,
}

impl Workspace {
    /// Resolve the config and load and merge the tables in the data directory
    pub fn load(global: &GlobalOpts) -> Result<Self> {
        let config =
            FunnelConfig::discover(global.config.as_deref(), &global.data_dir).into_diagnostic()?;
        let (sources, merged) = report::load_merged(&global.data_dir, &config).into_diagnostic()?;
        Ok(Self {
            config,
            sources,
            merged,
        })
    }
}
