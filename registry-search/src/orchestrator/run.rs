//! The run loop: strategies in sequence, then enrichment, then the report.

use std::time::Duration;

use crate::config::RunConfig;
use crate::error::SearchError;
use crate::extract::{extract_records, Extraction};
use crate::locator::{locate, LocatorAction};
use crate::page::{FormLocators, PageDriver, TablePolicy};
use crate::params::{RegularizationType, SearchParameters, StatusFilter};
use crate::sink::RecordSink;
use crate::strategy::{generate_strategies, Strategy};
use crate::types::ExtractedRow;

use super::consolidate::Consolidator;
use super::enrich::{DetailEnricher, DetailRules};
use super::report::{RunMetrics, RunReport};

/// Owns all state for one run: the driver, the sink, the strategies and
/// the policies used to drive the form.
///
/// ```no_run
/// # async fn example() -> registry_search::Result<()> {
/// use registry_search::{HtmlFormDriver, MemorySink, Orchestrator, SearchInput};
///
/// let params = SearchInput::for_term("dipirona").normalize()?;
/// let driver = HtmlFormDriver::new(Default::default())?;
/// let mut sink = MemorySink::new();
/// let report = Orchestrator::new(driver, &mut sink, params)?.run().await;
/// println!("{} records, quality {}", report.total_records, report.quality);
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<P, S> {
    driver: P,
    sink: S,
    params: SearchParameters,
    strategies: Vec<Strategy>,
    locators: FormLocators,
    table_policy: TablePolicy,
    config: RunConfig,
    detail_rules: DetailRules,
}

impl<P: PageDriver, S: RecordSink> Orchestrator<P, S> {
    /// Orchestrator with the built-in strategies, locators, table policy
    /// and detail rules.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the built-in detail patterns fail
    /// to compile.
    pub fn new(driver: P, sink: S, params: SearchParameters) -> Result<Self, SearchError> {
        Ok(Self {
            strategies: generate_strategies(&params),
            driver,
            sink,
            params,
            locators: FormLocators::default(),
            table_policy: TablePolicy::default(),
            config: RunConfig::default(),
            detail_rules: DetailRules::builtin()?,
        })
    }

    /// Replace the generated strategy list.
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_locators(mut self, locators: FormLocators) -> Self {
        self.locators = locators;
        self
    }

    pub fn with_table_policy(mut self, policy: TablePolicy) -> Self {
        self.table_policy = policy;
        self
    }

    pub fn with_detail_rules(mut self, rules: DetailRules) -> Self {
        self.detail_rules = rules;
        self
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` does not validate.
    pub fn with_run_config(mut self, config: RunConfig) -> Result<Self, SearchError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Execute the run. Never fails: every error is absorbed into the
    /// metrics or the affected record.
    pub async fn run(self) -> RunReport {
        let Self {
            mut driver,
            mut sink,
            params,
            strategies,
            locators,
            table_policy,
            config,
            detail_rules,
        } = self;

        let mut metrics = RunMetrics::start();
        let mut consolidator = Consolidator::new(config.source_label.clone());
        tracing::info!(
            term = %params.product_term,
            strategies = strategies.len(),
            "search run started"
        );

        let mut session = Session {
            driver: &mut driver,
            locators: &locators,
            policy: &table_policy,
            config: &config,
        };

        if let Err(err) = session.driver.load_search_form().await {
            tracing::error!(error = %err, "search form unavailable, no strategy can run");
            metrics.errors += 1;
            if config.capture_on_fatal {
                match session.driver.capture_diagnostics("run_fatal").await {
                    Ok(Some(location)) => tracing::info!(location = %location, "diagnostic capture saved"),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "diagnostic capture failed"),
                }
            }
        } else {
            for (index, strategy) in strategies.iter().enumerate() {
                metrics.strategies_executed += 1;
                tracing::info!(
                    strategy = %strategy.kind,
                    term = %strategy.term,
                    step = index + 1,
                    of = strategies.len(),
                    "executing strategy"
                );

                match session.execute(index, strategy).await {
                    Ok(extraction) => {
                        metrics.records_excluded += extraction.excluded;
                        let rows = apply_post_filter(strategy, &params.product_term, extraction.rows);
                        let added = consolidator.absorb(strategy, rows, &mut metrics, &mut sink);
                        tracing::info!(
                            strategy = %strategy.kind,
                            new_records = added,
                            excluded = extraction.excluded,
                            "strategy finished"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(strategy = %strategy.kind, error = %err, "strategy failed");
                        metrics.errors += 1;
                    }
                }

                if index + 1 < strategies.len() {
                    pause(config.strategy_pause()).await;
                }
            }
        }

        if params.include_details && !consolidator.is_empty() {
            let enricher =
                DetailEnricher::new(detail_rules, config.detail_timeout(), config.detail_pause());
            let summary = enricher
                .enrich_all(&mut driver, consolidator.records_mut())
                .await;
            tracing::info!(
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                "detail enrichment finished"
            );
        }

        metrics.finish();
        let mut records = consolidator.into_records();
        records.sort_by(|a, b| b.weight().total_cmp(&a.weight()));

        let report = RunReport::build(params, metrics, &strategies, records);
        if let Err(err) = sink.emit_report(&report) {
            tracing::error!(error = %err, "failed to emit run report");
        }
        tracing::info!(
            records = report.total_records,
            executed = report.metrics.strategies_executed,
            errors = report.metrics.errors,
            quality = %report.quality,
            "search run finished"
        );
        report
    }
}

/// Borrowed view of what a single strategy needs.
struct Session<'a, P> {
    driver: &'a mut P,
    locators: &'a FormLocators,
    policy: &'a TablePolicy,
    config: &'a RunConfig,
}

impl<P: PageDriver> Session<'_, P> {
    async fn execute(&mut self, index: usize, strategy: &Strategy) -> Result<Extraction, SearchError> {
        if index > 0 {
            self.driver.load_search_form().await?;
            pause(self.config.form_reset_pause()).await;
        }

        let field_timeout = self.config.field_timeout();
        let filled = locate(
            &mut *self.driver,
            &self.locators.product_term,
            LocatorAction::Fill(&strategy.term),
            field_timeout,
        )
        .await?;
        if filled.is_none() {
            return Err(SearchError::LocatorNotFound("product term field".into()));
        }

        self.fill_optional(&strategy.parameters).await;

        // A submit control that resolves is clicked exactly once; the key
        // press is only for forms where none resolves.
        let submitted = locate(
            &mut *self.driver,
            &self.locators.submit,
            LocatorAction::Click,
            self.config.control_timeout(),
        )
        .await?;
        if submitted.is_none() {
            tracing::debug!("no submit control resolved, falling back to key press");
            self.driver
                .submit_via_keypress(&self.locators.keypress_target)
                .await?;
        }

        self.driver
            .wait_until_settled(self.config.settle_timeout())
            .await?;
        pause(self.config.post_submit_pause()).await;

        let Some(table) = self.driver.extract_table(self.policy).await? else {
            tracing::info!(strategy = %strategy.kind, "no results for strategy");
            return Ok(Extraction::default());
        };
        let params = &strategy.parameters;
        Ok(extract_records(&table, params.max_results, &params.exclusion_terms))
    }

    /// Best effort: a control that cannot be located is logged and skipped.
    async fn fill_optional(&mut self, params: &SearchParameters) {
        let timeout = self.config.control_timeout();
        let locators = self.locators;

        let regularization = match params.regularization {
            RegularizationType::Registered => &locators.regularization_registered,
            RegularizationType::Notified => &locators.regularization_notified,
        };
        self.optional("regularization", regularization, LocatorAction::Click, timeout)
            .await;

        if let Some(holder) = params.holder_id.as_deref() {
            self.optional("holder_id", &locators.holder_id, LocatorAction::Fill(holder), timeout)
                .await;
        }
        if let Some(date) = params.registration_date.as_deref() {
            self.optional(
                "registration_date",
                &locators.registration_date,
                LocatorAction::Fill(date),
                timeout,
            )
            .await;
        }

        let status = match params.status {
            StatusFilter::Active => Some(&locators.status_active),
            StatusFilter::Inactive => Some(&locators.status_inactive),
            StatusFilter::Both => None,
        };
        if let Some(candidates) = status {
            self.optional("status", candidates, LocatorAction::Click, timeout)
                .await;
        }
    }

    async fn optional(
        &mut self,
        control: &str,
        candidates: &[String],
        action: LocatorAction<'_>,
        timeout: Duration,
    ) {
        match locate(&mut *self.driver, candidates, action, timeout).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::debug!(control, "optional control not found, skipping"),
            Err(err) => tracing::warn!(control, error = %err, "optional control failed, skipping"),
        }
    }
}

/// Drop rows that do not mention the original product term, for
/// strategies flagged for post-filtering.
fn apply_post_filter(
    strategy: &Strategy,
    product_term: &str,
    rows: Vec<ExtractedRow>,
) -> Vec<ExtractedRow> {
    if !strategy.post_filter {
        return rows;
    }
    let needle = product_term.to_lowercase();
    let before = rows.len();
    let kept: Vec<_> = rows
        .into_iter()
        .filter(|row| row.full_text.to_lowercase().contains(&needle))
        .collect();
    if kept.len() < before {
        tracing::debug!(
            strategy = %strategy.kind,
            dropped = before - kept.len(),
            "rows dropped by post-filter"
        );
    }
    kept
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
