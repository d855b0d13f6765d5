//! anvisa-scout: multi-strategy search of the ANVISA drug-product registry.
//!
//! The search pipeline itself lives in the `registry-search` crate. This
//! crate is the host around it:
//! - **Configuration**: one TOML file ([`ScoutConfig`]) covering the request,
//!   pacing, the page driver, form locators and output paths
//! - **Output**: [`JsonLinesSink`] streams records to a JSON Lines file and
//!   writes the final report as pretty JSON
//! - **Wiring**: [`app::execute`] builds the driver, sink and strategies from
//!   the configuration and runs the search

pub mod app;
pub mod config;
pub mod error;
pub mod output;

pub use app::{execute, plan, RunOutcome};
pub use config::{OutputConfig, ScoutConfig};
pub use error::{Result, ScoutError};
pub use output::JsonLinesSink;
