//! Configuration for source tables, column names, step markers and the
//! significance test
//!
//! Configuration is a YAML document. Lookup order:
//! 1. an explicit `--config` path
//! 2. `funnelkit.yaml` in the data directory
//! 3. `config.yaml` in the user config directory
//! 4. built-in defaults

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::record::FunnelStep;

/// File name looked up in the data directory
pub const CONFIG_FILE_NAME: &str = "funnelkit.yaml";

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunnelConfig {
    /// File names of the five source tables
    pub sources: SourceFiles,

    /// Column names inside the source tables
    pub columns: ColumnConfig,

    /// Expected `page` label of each step table
    pub markers: StepMarkers,

    pub significance: SignificanceConfig,

    /// Headers starting with this prefix (or empty headers) are index
    /// artifacts and get dropped on load
    pub index_column_prefix: String,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            sources: SourceFiles::default(),
            columns: ColumnConfig::default(),
            markers: StepMarkers::default(),
            significance: SignificanceConfig::default(),
            index_column_prefix: "Unnamed".to_string(),
        }
    }
}

/// Source table file names, relative to the data directory unless absolute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceFiles {
    pub users: PathBuf,
    pub homepage: PathBuf,
    pub search: PathBuf,
    pub payment: PathBuf,
    pub confirmation: PathBuf,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            users: PathBuf::from("user_table.csv"),
            homepage: PathBuf::from("home_page_table.csv"),
            search: PathBuf::from("search_page_table.csv"),
            payment: PathBuf::from("payment_page_table.csv"),
            confirmation: PathBuf::from("payment_confirmation_table.csv"),
        }
    }
}

impl SourceFiles {
    pub fn step(&self, step: FunnelStep) -> &Path {
        match step {
            FunnelStep::Homepage => &self.homepage,
            FunnelStep::Search => &self.search,
            FunnelStep::Payment => &self.payment,
            FunnelStep::Confirmation => &self.confirmation,
        }
    }
}

/// Column names used by the source tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnConfig {
    pub user_id: String,
    pub gender: String,
    pub device: String,
    pub variant: String,
    /// Generic step column in each step table, renamed to the step name
    pub page: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            user_id: "user_id".to_string(),
            gender: "sex".to_string(),
            device: "device".to_string(),
            variant: "version".to_string(),
            page: "page".to_string(),
        }
    }
}

/// Marker label each step table records in its `page` column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepMarkers {
    pub homepage: String,
    pub search: String,
    pub payment: String,
    pub confirmation: String,
}

impl Default for StepMarkers {
    fn default() -> Self {
        Self {
            homepage: "home_page".to_string(),
            search: "search_page".to_string(),
            payment: "payment_page".to_string(),
            confirmation: "payment_confirmation_page".to_string(),
        }
    }
}

impl StepMarkers {
    pub fn marker(&self, step: FunnelStep) -> &str {
        match step {
            FunnelStep::Homepage => &self.homepage,
            FunnelStep::Search => &self.search,
            FunnelStep::Payment => &self.payment,
            FunnelStep::Confirmation => &self.confirmation,
        }
    }
}

/// Chi-square test settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignificanceConfig {
    /// p-values strictly below this are significant
    pub alpha: f64,

    /// Apply Yates' continuity correction when degrees of freedom = 1
    pub yates_correction: bool,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            yates_correction: true,
        }
    }
}

impl FunnelConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self, String> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: FunnelConfig = serde_yml::from_str(contents).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration using the lookup order described in the module docs
    pub fn discover(explicit: Option<&Path>, data_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "loading explicit config");
            return Self::load(path);
        }

        let local = data_dir.join(CONFIG_FILE_NAME);
        if local.is_file() {
            tracing::debug!(path = %local.display(), "loading data directory config");
            return Self::load(&local);
        }

        if let Some(user) = user_config_path().filter(|p| p.is_file()) {
            tracing::debug!(path = %user.display(), "loading user config");
            return Self::load(&user);
        }

        Ok(Self::default())
    }

    /// Resolve a source file against the data directory
    pub fn source_path(&self, data_dir: &Path, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            data_dir.join(file)
        }
    }

    fn validate(&self) -> Result<(), String> {
        let alpha = self.significance.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(format!(
                "significance.alpha must be between 0 and 1, got {}",
                alpha
            ));
        }
        if self.columns.user_id.is_empty() {
            return Err("columns.user_id must not be empty".to_string());
        }
        Ok(())
    }
}

/// Per-user config file location (e.g. `~/.config/funnelkit/config.yaml`)
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "funnelkit").map(|dirs| dirs.config_dir().join("config.yaml"))
}
