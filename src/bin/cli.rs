//! CLI binary for anvisa-scout.

use std::path::PathBuf;

use anvisa_scout::ScoutConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use registry_search::params::{RegularizationType, StatusFilter};
use registry_search::{RunReport, Strategy};
use tracing_subscriber::EnvFilter;

/// Multi-strategy search of the ANVISA drug-product registry.
#[derive(Parser)]
#[command(name = "anvisa-scout", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "ANVISA_SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search the registry, streaming records to the records file.
    Run(RunArgs),

    /// Print the strategies a run would execute, without touching the network.
    Strategies(RequestArgs),

    /// Write a default configuration file.
    InitConfig {
        /// Destination (defaults to the standard config location).
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Request fields; each flag overrides the `[search]` section.
#[derive(Args)]
struct RequestArgs {
    /// Product name, or part of it.
    term: Option<String>,

    #[arg(long, value_enum)]
    regularization: Option<Regularization>,

    /// Holder company CNPJ (14 digits, punctuation allowed).
    #[arg(long)]
    holder_id: Option<String>,

    /// Regularization date, DD/MM/YYYY.
    #[arg(long)]
    date: Option<String>,

    #[arg(long, value_enum)]
    status: Option<Status>,

    /// Alternative term, one custom strategy each. Repeatable.
    #[arg(long = "extra")]
    extra_terms: Vec<String>,

    /// Additional exclusion term. Repeatable.
    #[arg(long = "exclude")]
    exclusion_terms: Vec<String>,

    /// JSON synonym tables used instead of the built-in ones.
    #[arg(long)]
    synonyms: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    request: RequestArgs,

    /// Maximum records kept per strategy.
    #[arg(long)]
    max_results: Option<usize>,

    /// Skip visiting detail pages.
    #[arg(long)]
    no_details: bool,

    /// JSON Lines file records are appended to.
    #[arg(long)]
    records: Option<PathBuf>,

    /// File the report is written to.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Search form URL.
    #[arg(long)]
    search_url: Option<String>,

    /// Directory for HTML snapshots taken when the run cannot start.
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Regularization {
    Registered,
    Notified,
}

#[derive(Clone, Copy, ValueEnum)]
enum Status {
    Active,
    Inactive,
    Both,
}

impl RequestArgs {
    fn apply(self, config: &mut ScoutConfig) {
        let search = &mut config.search;
        if let Some(term) = self.term {
            search.product_term = Some(term);
        }
        if let Some(regularization) = self.regularization {
            search.regularization = Some(match regularization {
                Regularization::Registered => RegularizationType::Registered,
                Regularization::Notified => RegularizationType::Notified,
            });
        }
        if let Some(status) = self.status {
            search.status = Some(match status {
                Status::Active => StatusFilter::Active,
                Status::Inactive => StatusFilter::Inactive,
                Status::Both => StatusFilter::Both,
            });
        }
        if self.holder_id.is_some() {
            search.holder_id = self.holder_id;
        }
        if self.date.is_some() {
            search.registration_date = self.date;
        }
        search.extra_terms.extend(self.extra_terms);
        search.exclusion_terms.extend(self.exclusion_terms);
        if self.synonyms.is_some() {
            config.synonyms_file = self.synonyms;
        }
    }
}

impl RunArgs {
    fn apply(self, config: &mut ScoutConfig) {
        if self.max_results.is_some() {
            config.search.max_results = self.max_results;
        }
        if self.no_details {
            config.search.include_details = Some(false);
        }
        if let Some(records) = self.records {
            config.output.records_path = records;
        }
        if let Some(report) = self.report {
            config.output.report_path = report;
        }
        if let Some(url) = self.search_url {
            config.driver.search_url = url;
        }
        if self.diagnostics_dir.is_some() {
            config.driver.diagnostics_dir = self.diagnostics_dir;
        }
        self.request.apply(config);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the summary only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("anvisa_scout=info,registry_search=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::InitConfig { path, force } => init_config(path, force),
        Command::Run(args) => {
            let mut config = ScoutConfig::load(cli.config.as_deref())?;
            args.apply(&mut config);
            run(config).await
        }
        Command::Strategies(args) => {
            let mut config = ScoutConfig::load(cli.config.as_deref())?;
            args.apply(&mut config);
            list_strategies(&config)
        }
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(ScoutConfig::default_config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    ScoutConfig::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn list_strategies(config: &ScoutConfig) -> anyhow::Result<()> {
    let (params, strategies) = anvisa_scout::plan(config)?;
    println!("Strategies for \"{}\":", params.product_term);
    print_strategies(&strategies);
    println!("Exclusion terms: {}", params.exclusion_terms.join(", "));
    Ok(())
}

fn print_strategies(strategies: &[Strategy]) {
    for (index, strategy) in strategies.iter().enumerate() {
        println!(
            "  {:>2}. {:<18} weight {:.1}  term \"{}\"{}",
            index + 1,
            strategy.id(),
            strategy.weight,
            strategy.term,
            if strategy.post_filter {
                "  (post-filtered)"
            } else {
                ""
            }
        );
    }
}

async fn run(config: ScoutConfig) -> anyhow::Result<()> {
    println!("anvisa-scout v{}", env!("CARGO_PKG_VERSION"));
    let outcome = anvisa_scout::execute(&config).await?;
    print_summary(&outcome.report);
    println!(
        "\n{} records appended to {}",
        outcome.records_written,
        config.output.records_path.display()
    );
    println!("Report written to {}", config.output.report_path.display());
    Ok(())
}

fn print_summary(report: &RunReport) {
    let metrics = &report.metrics;
    println!("\nSearch: \"{}\"", report.parameters.product_term);
    println!(
        "Started {}",
        metrics.started_at.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M:%S")
    );
    println!(
        "Strategies executed: {}/{}  errors: {}  success rate: {:.0}%",
        metrics.strategies_executed,
        report.strategies.len(),
        metrics.errors,
        metrics.success_rate * 100.0
    );
    println!(
        "Records: {}  excluded rows: {}  duration: {:.1}s",
        report.total_records, metrics.records_excluded, metrics.duration_secs
    );
    println!(
        "Complete: {}  quality: {}",
        if report.complete { "yes" } else { "no" },
        report.quality
    );

    for record in report.records.iter().take(10) {
        let details = match &record.details {
            Some(outcome) if outcome.extracted => " [details]",
            Some(_) => " [details failed]",
            None => "",
        };
        println!(
            "  {:.1} {:<18} {}{}",
            record.weight(),
            record.provenance.strategy_id,
            record.row.full_text,
            details
        );
    }
    if report.records.len() > 10 {
        println!("  ... and {} more", report.records.len() - 10);
    }
}
