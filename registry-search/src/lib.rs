//! # registry-search
//!
//! Multi-strategy search of a public drug-product registry.
//!
//! A single request is submitted several times under different
//! formulations of the product term (direct, chemical name, active
//! ingredient, broad, plus caller-supplied alternatives). Every results
//! table is turned into records, filtered against exclusion terms, and
//! consolidated across strategies so each distinct row appears once,
//! attributed to the first strategy that found it. Records can then be
//! enriched from their detail pages.
//!
//! ## Design
//!
//! - Strategies run strictly one after another against one page session
//! - Page access goes through the [`PageDriver`] trait; [`HtmlFormDriver`]
//!   is the bundled HTTP implementation
//! - Records stream to a [`RecordSink`] as soon as they are consolidated
//! - Failures are isolated: a failed strategy or detail page is counted or
//!   attached to its record, and the run still reports
//!
//! Only a missing product term aborts a run.

pub mod config;
pub mod driver;
pub mod error;
pub mod exclusion;
pub mod extract;
pub mod http;
pub mod locator;
pub mod orchestrator;
pub mod page;
pub mod params;
pub mod sink;
pub mod strategy;
pub mod types;

pub use config::{DriverConfig, RunConfig};
pub use driver::HtmlFormDriver;
pub use error::{Result, SearchError};
pub use orchestrator::{Orchestrator, QualityTier, RunMetrics, RunReport};
pub use page::{FormLocators, PageDriver, TablePolicy};
pub use params::{SearchInput, SearchParameters};
pub use sink::{MemorySink, RecordSink};
pub use strategy::{generate_strategies, generate_strategies_with, Strategy, StrategyKind};
pub use types::Record;

/// Validate `input` and run a full search with default policies.
///
/// # Errors
///
/// Returns [`SearchError::Validation`] if the product term is missing, or
/// [`SearchError::Config`] if `config` is invalid. Nothing else escapes:
/// strategy and detail failures end up in the report.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> registry_search::Result<()> {
/// use registry_search::{DriverConfig, HtmlFormDriver, MemorySink, RunConfig, SearchInput};
///
/// let driver = HtmlFormDriver::new(DriverConfig::default())?;
/// let mut sink = MemorySink::new();
/// let report = registry_search::run_search(
///     &SearchInput::for_term("dipirona"),
///     driver,
///     &mut sink,
///     RunConfig::default(),
/// )
/// .await?;
/// for record in &report.records {
///     println!("{:.1} {}", record.weight(), record.row.full_text);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_search<P: PageDriver, S: RecordSink>(
    input: &SearchInput,
    driver: P,
    sink: S,
    config: RunConfig,
) -> Result<RunReport> {
    let params = input.normalize()?;
    let orchestrator = Orchestrator::new(driver, sink, params)?.with_run_config(config)?;
    Ok(orchestrator.run().await)
}
