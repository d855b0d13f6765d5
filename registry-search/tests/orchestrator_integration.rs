//! Integration tests for the run orchestrator.
//!
//! A scripted in-memory driver stands in for the registry: each submitted
//! product term maps to a canned results table, and failures can be
//! injected per term, per detail page, or on the initial form load.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use registry_search::orchestrator::NOT_AVAILABLE;
use registry_search::params::StatusFilter;
use registry_search::types::{Cell, Table, TableRow};
use registry_search::{
    generate_strategies, FormLocators, MemorySink, Orchestrator, PageDriver, QualityTier,
    RunConfig, SearchError, SearchInput, StrategyKind, TablePolicy,
};

const PRODUCT: &str = "#produto";
const SUBMIT: &str = "#buscar";

#[derive(Default)]
struct ScriptedDriver {
    /// Results table per submitted product term.
    tables: HashMap<String, Table>,
    /// Terms for which the product field "cannot be found".
    missing_field_for: HashSet<String>,
    /// Terms whose extraction fails.
    broken_extraction_for: HashSet<String>,
    /// Detail pages: url -> (title, text).
    details: HashMap<String, (String, String)>,
    fail_initial_load: bool,
    submit_button_missing: bool,
    /// Optional-control selectors that resolve.
    optional_present: HashSet<&'static str>,

    loads: usize,
    term: Option<String>,
    events: Vec<String>,
    opened: usize,
    closed: usize,
    captures: Vec<String>,
    /// Virtual time of every submission and detail fetch attempt.
    submitted_at: Vec<Instant>,
    fetched_at: Vec<Instant>,
}

impl ScriptedDriver {
    fn with_table(mut self, term: &str, table: Table) -> Self {
        self.tables.insert(term.to_string(), table);
        self
    }

    fn with_detail(mut self, url: &str, title: &str, text: &str) -> Self {
        self.details
            .insert(url.to_string(), (title.to_string(), text.to_string()));
        self
    }
}

impl PageDriver for ScriptedDriver {
    type Page = String;

    async fn load_search_form(&mut self) -> Result<(), SearchError> {
        self.loads += 1;
        if self.fail_initial_load && self.loads == 1 {
            return Err(SearchError::Navigation("connection refused".into()));
        }
        self.term = None;
        Ok(())
    }

    async fn resolve(&mut self, selector: &str) -> Result<bool, SearchError> {
        Ok(match selector {
            PRODUCT => true,
            SUBMIT => !self.submit_button_missing,
            other => self.optional_present.contains(other),
        })
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<bool, SearchError> {
        if selector == PRODUCT {
            if self.missing_field_for.contains(value) {
                return Ok(false);
            }
            self.term = Some(value.to_string());
            self.events.push(format!("fill {selector}={value}"));
            return Ok(true);
        }
        let present = self.optional_present.contains(selector);
        if present {
            self.events.push(format!("fill {selector}={value}"));
        }
        Ok(present)
    }

    async fn click(&mut self, selector: &str) -> Result<bool, SearchError> {
        if selector == SUBMIT {
            if self.submit_button_missing {
                return Ok(false);
            }
            self.events.push("submit".into());
            self.submitted_at.push(Instant::now());
            return Ok(true);
        }
        let present = self.optional_present.contains(selector);
        if present {
            self.events.push(format!("click {selector}"));
        }
        Ok(present)
    }

    async fn submit_via_keypress(&mut self, _selector: &str) -> Result<(), SearchError> {
        self.events.push("keypress".into());
        self.submitted_at.push(Instant::now());
        Ok(())
    }

    async fn wait_until_settled(&mut self, _timeout: Duration) -> Result<(), SearchError> {
        Ok(())
    }

    async fn extract_table(&mut self, _policy: &TablePolicy) -> Result<Option<Table>, SearchError> {
        let term = self.term.clone().unwrap_or_default();
        if self.broken_extraction_for.contains(&term) {
            return Err(SearchError::Parse("table markup changed".into()));
        }
        Ok(self.tables.get(&term).cloned())
    }

    async fn open_scoped_page(
        &mut self,
        url: &str,
        _timeout: Duration,
    ) -> Result<String, SearchError> {
        self.fetched_at.push(Instant::now());
        if !self.details.contains_key(url) {
            return Err(SearchError::Timeout(format!("{url} did not load")));
        }
        self.opened += 1;
        Ok(url.to_string())
    }

    async fn close_scoped_page(&mut self, _page: String) {
        self.closed += 1;
    }

    fn rendered_text(&self, page: &String) -> Result<String, SearchError> {
        Ok(self.details[page].1.clone())
    }

    fn page_title(&self, page: &String) -> Result<String, SearchError> {
        Ok(self.details[page].0.clone())
    }

    async fn capture_diagnostics(&mut self, label: &str) -> Result<Option<String>, SearchError> {
        self.captures.push(label.to_string());
        Ok(Some(format!("memory://{label}")))
    }
}

fn locators() -> FormLocators {
    FormLocators {
        product_term: vec![PRODUCT.into()],
        holder_id: vec!["#cnpj".into()],
        registration_date: vec!["#data".into()],
        regularization_registered: vec!["#registrado".into()],
        regularization_notified: vec!["#notificado".into()],
        status_active: vec!["#ativo".into()],
        status_inactive: vec!["#inativo".into()],
        submit: vec![SUBMIT.into()],
        keypress_target: PRODUCT.into(),
    }
}

fn make_table(rows: &[&[&str]]) -> Table {
    Table {
        headers: vec!["Produto".into(), "Empresa".into()],
        rows: rows.iter().map(|cells| TableRow::from_texts(cells.iter().copied())).collect(),
    }
}

fn linked_row(product: &str, company: &str, url: &str) -> TableRow {
    TableRow::new(vec![Cell::with_link(product, url), Cell::text(company)])
}

fn orchestrator<'a>(
    input: SearchInput,
    driver: &'a mut ScriptedDriver,
    sink: &'a mut MemorySink,
) -> Orchestrator<&'a mut ScriptedDriver, &'a mut MemorySink> {
    paced_orchestrator(input, driver, sink, RunConfig::without_pauses())
}

fn paced_orchestrator<'a>(
    input: SearchInput,
    driver: &'a mut ScriptedDriver,
    sink: &'a mut MemorySink,
    config: RunConfig,
) -> Orchestrator<&'a mut ScriptedDriver, &'a mut MemorySink> {
    let params = input.normalize().expect("valid input");
    Orchestrator::new(driver, sink, params)
        .expect("orchestrator")
        .with_locators(locators())
        .with_run_config(config)
        .expect("valid run config")
}

/// Only the strategy and detail pauses, so elapsed virtual time counts them.
fn pacing(strategy_pause_ms: u64, detail_pause_ms: u64) -> RunConfig {
    RunConfig {
        strategy_pause_ms,
        detail_pause_ms,
        ..RunConfig::without_pauses()
    }
}

fn gaps(instants: &[Instant]) -> Vec<Duration> {
    instants.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

fn no_details(term: &str) -> SearchInput {
    SearchInput {
        include_details: Some(false),
        ..SearchInput::for_term(term)
    }
}

#[tokio::test]
async fn duplicate_rows_keep_first_strategy_provenance() {
    let mut driver = ScriptedDriver::default()
        .with_table("dipirona", make_table(&[&["DIPIRONA 500MG", "EMS"], &["DIPIRONA 1G", "MEDLEY"]]))
        .with_table(
            "dipirona sódica",
            make_table(&[&["DIPIRONA  1G", "MEDLEY"], &["DIPIRONA SÓDICA GOTAS", "EMS"]]),
        );
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.total_records, 3);
    assert_eq!(report.metrics.records_found, 3);
    let shared = report
        .records
        .iter()
        .find(|r| r.row.full_text == "DIPIRONA 1G MEDLEY")
        .expect("shared record");
    assert_eq!(shared.provenance.strategy_id, "direct");
    assert_eq!(shared.provenance.term, "dipirona");
    assert!((shared.provenance.weight - 1.0).abs() < f64::EPSILON);

    let gotas = report
        .records
        .iter()
        .find(|r| r.row.full_text.contains("GOTAS"))
        .expect("chemical-name record");
    assert_eq!(gotas.provenance.strategy_id, "chemical_name");
    assert_eq!(gotas.provenance.source, "ANVISA - Consultas Medicamentos");
}

#[tokio::test]
async fn records_stream_in_discovery_order_and_report_is_emitted_once() {
    let mut driver = ScriptedDriver::default()
        .with_table("dipirona", make_table(&[&["A", "1"], &["B", "2"]]))
        .with_table("metamizol", make_table(&[&["C", "3"]]));
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    let streamed: Vec<_> = sink.records.iter().map(|r| r.row.full_text.as_str()).collect();
    assert_eq!(streamed, vec!["A 1", "B 2", "C 3"]);
    assert_eq!(sink.reports.len(), 1);
    assert_eq!(sink.reports[0], report);
}

#[tokio::test]
async fn final_order_is_stable_descending_weight() {
    let params = no_details("dipirona").normalize().expect("valid");
    let mut strategies = generate_strategies(&params);
    strategies.reverse();

    let mut driver = ScriptedDriver::default()
        .with_table("dipirona", make_table(&[&["DIPIRONA D1", "x"], &["DIPIRONA D2", "x"]]))
        .with_table("metamizol", make_table(&[&["M1", "x"], &["M2", "x"]]))
        .with_table("dipirona sódica", make_table(&[&["S1", "x"]]));
    let mut sink = MemorySink::new();

    let report = Orchestrator::new(&mut driver, &mut sink, params)
        .expect("orchestrator")
        .with_strategies(strategies)
        .with_locators(locators())
        .with_run_config(RunConfig::without_pauses())
        .expect("config")
        .run()
        .await;

    // Discovered by broad (D1, D2), ingredient (M1, M2), chemical (S1);
    // direct ran last and found nothing new.
    let streamed: Vec<_> = sink.records.iter().map(|r| r.row.full_text.as_str()).collect();
    assert_eq!(
        streamed,
        vec!["DIPIRONA D1 x", "DIPIRONA D2 x", "M1 x", "M2 x", "S1 x"]
    );

    let ordered: Vec<_> = report.records.iter().map(|r| r.row.full_text.as_str()).collect();
    assert_eq!(
        ordered,
        vec!["S1 x", "M1 x", "M2 x", "DIPIRONA D1 x", "DIPIRONA D2 x"]
    );
    let weights: Vec<f64> = report.records.iter().map(|r| r.weight()).collect();
    assert!(weights.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn strategy_failures_are_isolated_and_counted() {
    let mut driver = ScriptedDriver {
        missing_field_for: HashSet::from(["dipirona sódica".to_string()]),
        broken_extraction_for: HashSet::from(["metamizol".to_string()]),
        ..Default::default()
    }
    .with_table("dipirona", make_table(&[&["DIPIRONA", "EMS"]]));
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.metrics.strategies_executed, 4);
    assert_eq!(report.metrics.errors, 2);
    assert!((report.metrics.success_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(report.quality, QualityTier::Satisfactory);
    assert!(report.complete);
    assert_eq!(report.total_records, 1);
    // Broad strategy ran after the two failures.
    assert!(driver.events.iter().filter(|e| *e == "fill #produto=dipirona").count() >= 2);
}

#[tokio::test]
async fn empty_results_are_not_errors() {
    let mut driver = ScriptedDriver::default()
        .with_table("dipirona", make_table(&[]));
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.total_records, 0);
    assert_eq!(report.metrics.errors, 0);
    assert_eq!(report.quality, QualityTier::Excellent);
    assert!(report.complete);
    assert!((report.metrics.success_rate - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn single_cell_rows_and_exclusions_never_become_records() {
    let mut driver = ScriptedDriver::default().with_table(
        "paracetamol associado",
        make_table(&[
            &["PARACETAMOL ASSOCIADO"],
            &["PARACETAMOL ASSOCIADO", "Associação de analgésicos"],
            &["PARACETAMOL ASSOCIADO 750MG", "EMS"],
        ]),
    );
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("paracetamol associado"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.total_records, 1);
    assert_eq!(report.records[0].row.full_text, "PARACETAMOL ASSOCIADO 750MG EMS");
    // Direct and active-ingredient both submit the unchanged term.
    assert_eq!(report.metrics.records_excluded, 2);
}

#[tokio::test]
async fn broad_strategy_is_post_filtered_on_original_term() {
    let mut driver = ScriptedDriver::default().with_table(
        "dipirona",
        make_table(&[&["DIPIRONA MONOIDRATADA", "EMS"], &["DIPIRONA MAGNÉSICA", "MEDLEY"]]),
    );
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona magnésica"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.total_records, 1);
    assert_eq!(report.records[0].provenance.strategy_id, StrategyKind::Broad.id());
    assert!(report.records[0].row.full_text.contains("MAGNÉSICA"));
}

#[tokio::test]
async fn form_is_reset_before_every_later_strategy() {
    let mut driver = ScriptedDriver::default();
    let mut sink = MemorySink::new();
    let input = SearchInput {
        extra_terms: vec!["metamizol sódico".into()],
        ..no_details("dipirona")
    };

    let report = orchestrator(input, &mut driver, &mut sink).run().await;

    assert_eq!(report.metrics.strategies_executed, 5);
    assert_eq!(driver.loads, 5);
}

#[tokio::test]
async fn keypress_used_when_no_submit_control_resolves() {
    let mut driver = ScriptedDriver {
        submit_button_missing: true,
        ..Default::default()
    };
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.metrics.errors, 0);
    assert_eq!(driver.events.iter().filter(|e| *e == "keypress").count(), 4);
}

#[tokio::test]
async fn optional_controls_are_best_effort() {
    let mut driver = ScriptedDriver {
        optional_present: HashSet::from(["#cnpj", "#notificado"]),
        ..Default::default()
    };
    let mut sink = MemorySink::new();
    let input = SearchInput {
        holder_id: Some("12.345.678/0001-90".into()),
        registration_date: Some("01/02/2020".into()),
        regularization: Some(registry_search::params::RegularizationType::Notified),
        status: Some(StatusFilter::Both),
        ..no_details("dipirona")
    };

    let report = orchestrator(input, &mut driver, &mut sink).run().await;

    assert_eq!(report.metrics.errors, 0);
    assert!(driver.events.contains(&"fill #cnpj=12345678000190".to_string()));
    assert!(driver.events.contains(&"click #notificado".to_string()));
    assert!(!driver.events.iter().any(|e| e.contains("#ativo") || e.contains("#inativo")));
}

#[tokio::test]
async fn detail_failures_stay_on_their_record() {
    let good = "https://registry.example/produto/1";
    let broken = "https://registry.example/produto/2";
    let mut driver = ScriptedDriver::default()
        .with_table(
            "dipirona",
            Table {
                headers: vec!["Produto".into(), "Empresa".into()],
                rows: vec![
                    linked_row("DIPIRONA 500MG", "EMS", good),
                    linked_row("DIPIRONA 1G", "MEDLEY", broken),
                    linked_row("DIPIRONA GOTAS", "NEO", "javascript:abrir(3)"),
                    TableRow::from_texts(["DIPIRONA XAROPE", "PRATI"]),
                ],
            },
        )
        .with_detail(good, "Detalhe DIPIRONA", "Empresa: EMS S/A\nSituação: Válido");
    let mut sink = MemorySink::new();

    let report = orchestrator(SearchInput::for_term("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.total_records, 4);
    assert_eq!(report.metrics.errors, 0);
    assert_eq!(driver.opened, driver.closed);

    let by_text = |needle: &str| {
        report
            .records
            .iter()
            .find(|r| r.row.full_text.contains(needle))
            .expect("record present")
    };

    let ok = by_text("500MG").details.as_ref().expect("enriched");
    assert!(ok.extracted);
    assert_eq!(ok.fields["title"], "Detalhe DIPIRONA");
    assert_eq!(ok.fields["company"], "EMS S/A");
    assert_eq!(ok.fields["status"], "Válido");
    assert_eq!(ok.fields["registry_number"], NOT_AVAILABLE);

    let failed = by_text("1G").details.as_ref().expect("attempted");
    assert!(!failed.extracted);
    assert!(failed.fields.is_empty());
    assert!(failed.error.as_deref().unwrap_or_default().contains("did not load"));

    assert!(by_text("GOTAS").details.is_none());
    assert!(by_text("XAROPE").details.is_none());
}

#[tokio::test(start_paused = true)]
async fn strategies_are_paced_with_no_pause_after_the_last() {
    let mut driver = ScriptedDriver::default()
        .with_table("dipirona", make_table(&[&["DIPIRONA 500MG", "EMS"]]));
    let mut sink = MemorySink::new();

    let started = Instant::now();
    let report = paced_orchestrator(no_details("dipirona"), &mut driver, &mut sink, pacing(2000, 1000))
        .run()
        .await;
    let elapsed = started.elapsed();

    assert_eq!(report.strategies.len(), 4);
    assert_eq!(driver.submitted_at.len(), 4);
    assert_eq!(gaps(&driver.submitted_at), vec![Duration::from_millis(2000); 3]);
    assert_eq!(elapsed, Duration::from_millis(3 * 2000));
}

#[tokio::test(start_paused = true)]
async fn failed_strategy_still_paces_the_next_one() {
    let mut driver = ScriptedDriver {
        broken_extraction_for: ["dipirona".to_string()].into(),
        ..Default::default()
    }
    .with_table("metamizol", make_table(&[&["NOVALGINA", "SANOFI"]]));
    let mut sink = MemorySink::new();

    let started = Instant::now();
    let report = paced_orchestrator(no_details("dipirona"), &mut driver, &mut sink, pacing(2000, 0))
        .run()
        .await;

    assert_eq!(report.metrics.errors, 1);
    assert_eq!(gaps(&driver.submitted_at)[0], Duration::from_millis(2000));
    assert_eq!(started.elapsed(), Duration::from_millis(3 * 2000));
}

#[tokio::test(start_paused = true)]
async fn detail_fetches_are_paced_including_after_a_failure() {
    let first = "https://registry.example/produto/1";
    let broken = "https://registry.example/produto/2";
    let third = "https://registry.example/produto/3";
    let mut driver = ScriptedDriver::default()
        .with_table(
            "dipirona",
            Table {
                headers: vec!["Produto".into(), "Empresa".into()],
                rows: vec![
                    linked_row("DIPIRONA 500MG", "EMS", first),
                    linked_row("DIPIRONA 1G", "MEDLEY", broken),
                    linked_row("DIPIRONA GOTAS", "NEO", third),
                ],
            },
        )
        .with_detail(first, "Detalhe 1", "Empresa: EMS S/A")
        .with_detail(third, "Detalhe 3", "Empresa: NEO QUIMICA");
    let mut sink = MemorySink::new();

    let started = Instant::now();
    let report = paced_orchestrator(
        SearchInput::for_term("dipirona"),
        &mut driver,
        &mut sink,
        pacing(0, 1000),
    )
    .run()
    .await;
    let elapsed = started.elapsed();

    assert_eq!(report.total_records, 3);
    assert_eq!(driver.fetched_at.len(), 3);
    assert_eq!(driver.opened, 2);
    assert_eq!(driver.closed, 2);
    // The broken fetch does not skip the pause before the next one.
    assert_eq!(gaps(&driver.fetched_at), vec![Duration::from_millis(1000); 2]);
    assert_eq!(elapsed, Duration::from_millis(2 * 1000));

    let third_record = report
        .records
        .iter()
        .find(|r| r.row.full_text.contains("GOTAS"))
        .expect("third record");
    assert!(third_record.details.as_ref().is_some_and(|d| d.extracted));
}

#[tokio::test(start_paused = true)]
async fn single_detail_fetch_is_not_paced() {
    let url = "https://registry.example/produto/1";
    let mut driver = ScriptedDriver::default()
        .with_table(
            "dipirona",
            Table {
                headers: vec!["Produto".into(), "Empresa".into()],
                rows: vec![linked_row("DIPIRONA 500MG", "EMS", url)],
            },
        )
        .with_detail(url, "Detalhe", "Empresa: EMS S/A");
    let mut sink = MemorySink::new();

    let started = Instant::now();
    paced_orchestrator(SearchInput::for_term("dipirona"), &mut driver, &mut sink, pacing(0, 1000))
        .run()
        .await;

    assert_eq!(driver.fetched_at.len(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn details_skipped_when_disabled() {
    let url = "https://registry.example/produto/1";
    let mut driver = ScriptedDriver::default()
        .with_table(
            "dipirona",
            Table {
                headers: vec![],
                rows: vec![linked_row("DIPIRONA", "EMS", url)],
            },
        )
        .with_detail(url, "t", "x");
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(driver.opened, 0);
    assert!(report.records[0].details.is_none());
    assert!(report.records[0].row.has_link);
    assert_eq!(report.records[0].row.fields["column_1"], "DIPIRONA");
}

#[tokio::test]
async fn unreachable_form_still_reports() {
    let mut driver = ScriptedDriver {
        fail_initial_load: true,
        ..Default::default()
    }
    .with_table("dipirona", make_table(&[&["DIPIRONA", "EMS"]]));
    let mut sink = MemorySink::new();

    let report = orchestrator(no_details("dipirona"), &mut driver, &mut sink)
        .run()
        .await;

    assert_eq!(report.metrics.strategies_executed, 0);
    assert_eq!(report.metrics.errors, 1);
    assert_eq!(report.metrics.success_rate, 0.0);
    assert!(!report.complete);
    assert_eq!(report.quality, QualityTier::Good);
    assert_eq!(report.total_records, 0);
    assert_eq!(driver.captures, vec!["run_fatal"]);
    assert_eq!(sink.reports.len(), 1);
}

#[tokio::test]
async fn missing_term_is_the_only_fatal_error() {
    let err = SearchInput::default().normalize().expect_err("no term");
    assert!(matches!(err, SearchError::Validation(_)));
}
