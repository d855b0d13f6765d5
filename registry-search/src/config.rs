//! Run and driver configuration with sensible defaults.
//!
//! [`RunConfig`] controls pacing and timeouts of the orchestrator;
//! [`DriverConfig`] controls the HTTP-backed page driver. The defaults are
//! tuned for polite, strictly sequential use of the registry.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Default label stamped on every record's provenance.
pub const DEFAULT_SOURCE_LABEL: &str = "ANVISA - Consultas Medicamentos";

/// Default registry search form.
pub const DEFAULT_SEARCH_URL: &str = "https://consultas.anvisa.gov.br/#/medicamentos/";

/// Pacing and timeout settings for a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Fixed pause between strategies, in milliseconds.
    pub strategy_pause_ms: u64,
    /// Fixed pause between detail-page fetches, in milliseconds.
    pub detail_pause_ms: u64,
    /// Per-candidate timeout when resolving the product-term field.
    pub field_timeout_ms: u64,
    /// Per-candidate timeout for submit controls and optional controls.
    pub control_timeout_ms: u64,
    /// Upper bound on waiting for the page to settle.
    pub settle_timeout_ms: u64,
    /// Extra pause after a submission has settled, before extraction.
    pub post_submit_pause_ms: u64,
    /// Pause after resetting to a clean search form.
    pub form_reset_pause_ms: u64,
    /// Timeout for opening one detail page.
    pub detail_timeout_ms: u64,
    /// Source label attached to every record.
    pub source_label: String,
    /// Ask the driver for a diagnostic capture when the run hits a fatal error.
    pub capture_on_fatal: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy_pause_ms: 2000,
            detail_pause_ms: 1000,
            field_timeout_ms: 5000,
            control_timeout_ms: 3000,
            settle_timeout_ms: 30_000,
            post_submit_pause_ms: 5000,
            form_reset_pause_ms: 2000,
            detail_timeout_ms: 30_000,
            source_label: DEFAULT_SOURCE_LABEL.to_string(),
            capture_on_fatal: true,
        }
    }
}

impl RunConfig {
    /// Configuration with every pause set to zero; timeouts keep their defaults.
    pub fn without_pauses() -> Self {
        Self {
            strategy_pause_ms: 0,
            detail_pause_ms: 0,
            post_submit_pause_ms: 0,
            form_reset_pause_ms: 0,
            ..Default::default()
        }
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - every timeout must be greater than 0
    /// - `source_label` must not be blank
    pub fn validate(&self) -> Result<(), SearchError> {
        let timeouts = [
            ("field_timeout_ms", self.field_timeout_ms),
            ("control_timeout_ms", self.control_timeout_ms),
            ("settle_timeout_ms", self.settle_timeout_ms),
            ("detail_timeout_ms", self.detail_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(SearchError::Config(format!("{name} must be greater than 0")));
            }
        }
        if self.source_label.trim().is_empty() {
            return Err(SearchError::Config("source_label must not be empty".into()));
        }
        Ok(())
    }

    pub fn strategy_pause(&self) -> Duration {
        Duration::from_millis(self.strategy_pause_ms)
    }

    pub fn detail_pause(&self) -> Duration {
        Duration::from_millis(self.detail_pause_ms)
    }

    pub fn field_timeout(&self) -> Duration {
        Duration::from_millis(self.field_timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn post_submit_pause(&self) -> Duration {
        Duration::from_millis(self.post_submit_pause_ms)
    }

    pub fn form_reset_pause(&self) -> Duration {
        Duration::from_millis(self.form_reset_pause_ms)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_millis(self.detail_timeout_ms)
    }
}

/// Settings for [`crate::driver::HtmlFormDriver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// URL of the search form.
    pub search_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent string. If `None`, one is picked from a built-in
    /// list of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// How long to wait for a page to settle after navigation, in milliseconds.
    pub settle_delay_ms: u64,
    /// Directory for HTML snapshots taken as diagnostic captures.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            timeout_seconds: 60,
            user_agent: None,
            settle_delay_ms: 500,
            diagnostics_dir: None,
        }
    }
}

impl DriverConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        url::Url::parse(&self.search_url)
            .map_err(|e| SearchError::Config(format!("search_url is not a valid URL: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_config_has_sensible_values() {
        let config = RunConfig::default();
        assert_eq!(config.strategy_pause_ms, 2000);
        assert_eq!(config.detail_pause_ms, 1000);
        assert_eq!(config.field_timeout_ms, 5000);
        assert_eq!(config.control_timeout_ms, 3000);
        assert_eq!(config.source_label, DEFAULT_SOURCE_LABEL);
        assert!(config.capture_on_fatal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn without_pauses_zeroes_only_pauses() {
        let config = RunConfig::without_pauses();
        assert_eq!(config.strategy_pause(), Duration::ZERO);
        assert_eq!(config.detail_pause(), Duration::ZERO);
        assert_eq!(config.post_submit_pause(), Duration::ZERO);
        assert_eq!(config.form_reset_pause(), Duration::ZERO);
        assert_eq!(config.field_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = RunConfig {
            settle_timeout_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("settle_timeout_ms"));
    }

    #[test]
    fn blank_source_label_rejected() {
        let config = RunConfig {
            source_label: "  ".into(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source_label"));
    }

    #[test]
    fn default_driver_config_is_valid() {
        let config = DriverConfig::default();
        assert_eq!(config.search_url, DEFAULT_SEARCH_URL);
        assert!(config.user_agent.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_search_url_rejected() {
        let config = DriverConfig {
            search_url: "not a url".into(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search_url"));
    }

    #[test]
    fn run_config_partial_json_uses_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"strategy_pause_ms": 10}"#).expect("deserialize");
        assert_eq!(config.strategy_pause_ms, 10);
        assert_eq!(config.detail_pause_ms, 1000);
    }
}
