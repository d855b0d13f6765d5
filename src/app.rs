//! Wiring between the host configuration and the search pipeline.

use registry_search::strategy::{BuiltinSynonyms, FileSynonyms, SynonymProvider};
use registry_search::{
    generate_strategies_with, HtmlFormDriver, Orchestrator, RunReport, SearchParameters, Strategy,
};

use crate::config::ScoutConfig;
use crate::error::Result;
use crate::output::JsonLinesSink;

/// Synonym source selected by the configuration.
///
/// # Errors
///
/// Returns an error if `synonyms_file` is set but cannot be read or parsed.
pub fn synonym_provider(config: &ScoutConfig) -> Result<Box<dyn SynonymProvider>> {
    match &config.synonyms_file {
        Some(path) => {
            let provider = FileSynonyms::from_path(path)?.with_builtin_fallback();
            tracing::info!(path = %path.display(), "using synonym file");
            Ok(Box::new(provider))
        }
        None => Ok(Box::new(BuiltinSynonyms)),
    }
}

/// Normalised parameters and the strategies a run would execute.
///
/// Touches nothing but the synonym file.
///
/// # Errors
///
/// Returns an error if the product term is missing or the synonym file is unusable.
pub fn plan(config: &ScoutConfig) -> Result<(SearchParameters, Vec<Strategy>)> {
    let params = config.search.normalize()?;
    let synonyms = synonym_provider(config)?;
    let strategies = generate_strategies_with(&params, synonyms.as_ref());
    Ok((params, strategies))
}

/// What a finished run left behind.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    /// Records appended to the records file by this run.
    pub records_written: usize,
}

/// Run a full search against the live registry, streaming records to the
/// configured output files.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the request fails
/// validation, or the output files cannot be opened. Failures during the
/// run itself end up in the report.
pub async fn execute(config: &ScoutConfig) -> Result<RunOutcome> {
    config.validate()?;
    let (params, strategies) = plan(config)?;

    let driver = HtmlFormDriver::new(config.driver.clone())?;
    let mut sink = JsonLinesSink::from_config(&config.output)?;

    let report = Orchestrator::new(driver, &mut sink, params)?
        .with_strategies(strategies)
        .with_locators(config.locators.clone())
        .with_table_policy(config.table.clone())
        .with_run_config(config.run.clone())?
        .run()
        .await;

    Ok(RunOutcome {
        report,
        records_written: sink.written(),
    })
}
