//! Source table loading and cleaning
//!
//! Reads the user table and the four step tables, drops artifact index
//! columns and renames each step table's `page` column to the step name.

use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::FunnelConfig;
use crate::core::record::FunnelStep;
use crate::core::table::SourceTable;

/// Name the user attribute table goes by in diagnostics
pub const USERS_TABLE: &str = "users";

/// Errors raised while loading source tables
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Source table '{table}' not found at {}", path.display())]
    Missing { table: String, path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {} as CSV: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Table '{table}' has no '{column}' column")]
    MissingColumn { table: String, column: String },

    #[error("Table '{table}' row {row} has no '{column}' value")]
    MissingKey {
        table: String,
        column: String,
        row: usize,
    },
}

/// The five cleaned source tables
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub users: SourceTable,
    steps: [SourceTable; 4],
}

impl SourceTables {
    /// Clean raw tables and check the columns the merge depends on.
    ///
    /// `steps` must be given in funnel order.
    pub fn new(
        users: SourceTable,
        steps: [SourceTable; 4],
        config: &FunnelConfig,
    ) -> Result<Self, LoadError> {
        let prefix = &config.index_column_prefix;
        let columns = &config.columns;

        let users = users.drop_index_columns(prefix);
        for column in [
            &columns.user_id,
            &columns.gender,
            &columns.device,
            &columns.variant,
        ] {
            require_column(&users, column)?;
        }
        require_keys(&users, &columns.user_id)?;

        let [homepage, search, payment, confirmation] = steps;
        let steps = [
            clean_step_table(homepage, FunnelStep::Homepage, config)?,
            clean_step_table(search, FunnelStep::Search, config)?,
            clean_step_table(payment, FunnelStep::Payment, config)?,
            clean_step_table(confirmation, FunnelStep::Confirmation, config)?,
        ];

        Ok(Self { users, steps })
    }

    pub fn step(&self, step: FunnelStep) -> &SourceTable {
        &self.steps[step.index()]
    }

    /// All tables in join order: users first, then steps in funnel order
    pub fn in_join_order(&self) -> impl Iterator<Item = &SourceTable> {
        std::iter::once(&self.users).chain(self.steps.iter())
    }
}

/// Load and clean the five source tables from a data directory
pub fn load_sources(data_dir: &Path, config: &FunnelConfig) -> Result<SourceTables, LoadError> {
    let users_path = config.source_path(data_dir, &config.sources.users);
    let users = read_table(USERS_TABLE, &users_path)?;

    let read_step = |step: FunnelStep| {
        let path = config.source_path(data_dir, config.sources.step(step));
        read_table(step.name(), &path)
    };
    let steps = [
        read_step(FunnelStep::Homepage)?,
        read_step(FunnelStep::Search)?,
        read_step(FunnelStep::Payment)?,
        read_step(FunnelStep::Confirmation)?,
    ];

    let sources = SourceTables::new(users, steps, config)?;
    tracing::info!(
        users = sources.users.len(),
        homepage = sources.step(FunnelStep::Homepage).len(),
        search = sources.step(FunnelStep::Search).len(),
        payment = sources.step(FunnelStep::Payment).len(),
        confirmation = sources.step(FunnelStep::Confirmation).len(),
        "loaded source tables"
    );
    Ok(sources)
}

/// Read one CSV file into a [`SourceTable`]
pub fn read_table(table: &str, path: &Path) -> Result<SourceTable, LoadError> {
    if !path.is_file() {
        return Err(LoadError::Missing {
            table: table.to_string(),
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(table, path = %path.display(), "reading source table");
    SourceTable::from_reader(table, file).map_err(|source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Drop index columns and rename `page` to the step name
pub fn clean_step_table(
    table: SourceTable,
    step: FunnelStep,
    config: &FunnelConfig,
) -> Result<SourceTable, LoadError> {
    let mut table = table.drop_index_columns(&config.index_column_prefix);
    require_column(&table, &config.columns.user_id)?;
    if !table.rename_column(&config.columns.page, step.name()) {
        return Err(LoadError::MissingColumn {
            table: table.name().to_string(),
            column: config.columns.page.clone(),
        });
    }
    require_keys(&table, &config.columns.user_id)?;
    Ok(table)
}

fn require_column(table: &SourceTable, column: &str) -> Result<(), LoadError> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(LoadError::MissingColumn {
            table: table.name().to_string(),
            column: column.to_string(),
        })
    }
}

fn require_keys(table: &SourceTable, key: &str) -> Result<(), LoadError> {
    let idx = table
        .column_index(key)
        .ok_or_else(|| LoadError::MissingColumn {
            table: table.name().to_string(),
            column: key.to_string(),
        })?;

    match table.rows().iter().position(|row| row[idx].is_none()) {
        // +2: 1-based numbering plus the header line
        Some(row) => Err(LoadError::MissingKey {
            table: table.name().to_string(),
            column: key.to_string(),
            row: row + 2,
        }),
        None => Ok(()),
    }
}
