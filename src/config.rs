//! Host configuration, loaded from a TOML file.
//!
//! Every section is optional; missing keys take the library defaults.
//!
//! ```toml
//! synonyms_file = "/etc/anvisa-scout/synonyms.json"
//!
//! [search]
//! product_term = "dipirona"
//! status = "both"
//! exclusion_terms = ["paracetamol"]
//!
//! [run]
//! strategy_pause_ms = 3000
//!
//! [output]
//! records_path = "dipirona.jsonl"
//! ```

use std::path::{Path, PathBuf};

use registry_search::{DriverConfig, FormLocators, RunConfig, SearchInput, TablePolicy};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

/// Directory name used under the platform config dir.
const APP_DIR: &str = "anvisa-scout";

/// Full host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// JSON synonym tables replacing the built-in ones, with built-in fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synonyms_file: Option<PathBuf>,
    /// Default search request; CLI flags override individual fields.
    pub search: SearchInput,
    pub run: RunConfig,
    pub driver: DriverConfig,
    pub locators: FormLocators,
    pub table: TablePolicy,
    pub output: OutputConfig,
}

/// Where records and the report are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON Lines file; one record per line, appended as found.
    pub records_path: PathBuf,
    /// Pretty-printed JSON report, overwritten on every run.
    pub report_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records_path: PathBuf::from("anvisa_records.jsonl"),
            report_path: PathBuf::from("anvisa_report.json"),
        }
    }
}

impl ScoutConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScoutError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ScoutError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path` if given, else the default location if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file cannot be loaded, or if
    /// the default file exists but is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_config_path();
                if default.is_file() {
                    tracing::debug!(path = %default.display(), "loading default config");
                    Self::from_file(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Search`] for invalid run or driver settings, or
    /// [`ScoutError::Config`] for unusable locators, table policy or output paths.
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;
        self.driver.validate()?;
        if self.locators.product_term.is_empty() {
            return Err(ScoutError::Config(
                "locators.product_term needs at least one selector".into(),
            ));
        }
        if self.locators.submit.is_empty() && self.locators.keypress_target.trim().is_empty() {
            return Err(ScoutError::Config(
                "locators need a submit selector or a keypress_target".into(),
            ));
        }
        if self.table.min_data_cells == 0 {
            return Err(ScoutError::Config("table.min_data_cells must be at least 1".into()));
        }
        if self.output.records_path.as_os_str().is_empty()
            || self.output.report_path.as_os_str().is_empty()
        {
            return Err(ScoutError::Config("output paths must not be empty".into()));
        }
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/anvisa-scout/config.toml`.
    ///
    /// Override the directory with `ANVISA_SCOUT_CONFIG_DIR`.
    pub fn default_config_path() -> PathBuf {
        if let Some(dir) = std::env::var_os("ANVISA_SCOUT_CONFIG_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        dirs::config_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("/tmp/anvisa-scout-config"))
            .join("config.toml")
    }
}
