//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvMarketDataAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::basket::{DEFAULT_MAX_CONCURRENCY, FailureReason};
use crate::domain::comparison::{Comparison, ComparisonRequest, DEFAULT_BENCHMARK, build_comparison};
use crate::domain::config_validation::{
    validate_comparison_config, validate_provider_config, validate_strategy_config,
};
use crate::domain::date_validation::validate_range_against;
use crate::domain::error::CarteiraError;
use crate::domain::instrument::{
    Fundamental, IndicatorKind, InstrumentRecord, TieBreakField, UnknownField,
};
use crate::domain::ranking::PortfolioSelection;
use crate::domain::session::Session;
use crate::domain::strategy::{DEFAULT_PORTFOLIO_SIZE, StrategyRequest, load_snapshot, submit_strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "carteira", about = "Fundamentals-ranked stock portfolio builder")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Strategy flags shared by `select` and `compare`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct StrategyOverrides {
    /// Snapshot date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Profitability indicator: roe, roic or roc
    #[arg(long)]
    pub profitability: Option<String>,
    /// Discount indicator: earning_yield, dividend_yield or p_vp
    #[arg(long)]
    pub discount: Option<String>,
    /// Number of holdings
    #[arg(short = 'n', long)]
    pub size: Option<usize>,
    /// Column used to keep one listing per issuer
    #[arg(long)]
    pub tie_break: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the deduplicated fundamentals snapshot for a date
    Snapshot {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        tie_break: Option<String>,
    },
    /// Rank the snapshot and select a portfolio
    Select {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        strategy: StrategyOverrides,
        /// Write the ranked selection as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare the selected portfolio's cumulative return against a benchmark
    Compare {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        strategy: StrategyOverrides,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        benchmark: Option<String>,
        /// Write the aligned comparison table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the ranked selection as CSV
        #[arg(long)]
        selection_output: Option<PathBuf>,
    },
    /// List the available ranking indicators
    Indicators,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Snapshot {
            config,
            date,
            tie_break,
        } => run_snapshot(config.as_ref(), date, tie_break.as_deref()),
        Command::Select {
            config,
            strategy,
            output,
        } => run_select(config.as_ref(), &strategy, output.as_ref()),
        Command::Compare {
            config,
            strategy,
            start,
            end,
            benchmark,
            output,
            selection_output,
        } => run_compare(
            config.as_ref(),
            &strategy,
            start,
            end,
            benchmark.as_deref(),
            output.as_ref(),
            selection_output.as_ref(),
        ),
        Command::Indicators => {
            init_tracing(None);
            print_indicators();
            ExitCode::SUCCESS
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Loads the INI file when given; otherwise every key takes its default.
pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    let Some(path) = path else {
        return Ok(FileConfigAdapter::empty());
    };
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = CarteiraError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn fail(e: CarteiraError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

fn runtime() -> Result<tokio::runtime::Runtime, CarteiraError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Loads config, installs logging and checks the sections a command uses.
fn prepare(
    config_path: Option<&PathBuf>,
    validators: &[fn(&dyn ConfigPort) -> Result<(), CarteiraError>],
) -> Result<FileConfigAdapter, ExitCode> {
    let adapter = load_config(config_path)?;
    init_tracing(adapter.get_string("log", "level").as_deref());
    if let Some(path) = config_path {
        tracing::info!(path = %path.display(), "config loaded");
    }
    for validate in validators {
        validate(&adapter).map_err(fail)?;
    }
    Ok(adapter)
}

fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> CarteiraError {
    CarteiraError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    flag: Option<NaiveDate>,
) -> Result<NaiveDate, CarteiraError> {
    if let Some(date) = flag {
        return Ok(date);
    }
    if config
        .get_string(section, key)
        .is_none_or(|s| s.trim().is_empty())
    {
        return Err(CarteiraError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        });
    }
    config
        .get_date(section, key)
        .ok_or_else(|| config_invalid(section, key, "invalid date format (expected YYYY-MM-DD)"))
}

fn parse_indicator(name: &str, value: &str) -> Result<Fundamental, CarteiraError> {
    value
        .parse::<Fundamental>()
        .map_err(|e| CarteiraError::invalid_parameter(name, e.to_string()))
}

fn parse_tie_break(value: Option<String>) -> Result<TieBreakField, CarteiraError> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|e: UnknownField| CarteiraError::invalid_parameter("tie_break", e.to_string())),
        None => Ok(TieBreakField::default()),
    }
}

pub fn build_strategy_request(
    config: &dyn ConfigPort,
    overrides: &StrategyOverrides,
) -> Result<StrategyRequest, CarteiraError> {
    let snapshot_date = required_date(config, "strategy", "snapshot_date", overrides.date)?;

    let profitability = overrides
        .profitability
        .clone()
        .or_else(|| config.get_string("strategy", "profitability"))
        .unwrap_or_else(|| Fundamental::Roe.key().to_string());
    let discount = overrides
        .discount
        .clone()
        .or_else(|| config.get_string("strategy", "discount"))
        .unwrap_or_else(|| Fundamental::PVp.key().to_string());

    let size = match overrides.size {
        Some(n) => n,
        None => {
            let n = config.get_int("strategy", "size", DEFAULT_PORTFOLIO_SIZE as i64);
            usize::try_from(n).map_err(|_| {
                CarteiraError::invalid_parameter("portfolio size", format!("{} is negative", n))
            })?
        }
    };

    let tie_break = parse_tie_break(
        overrides
            .tie_break
            .clone()
            .or_else(|| config.get_string("strategy", "tie_break")),
    )?;

    let request = StrategyRequest {
        snapshot_date,
        profitability: parse_indicator("profitability indicator", &profitability)?,
        discount: parse_indicator("discount indicator", &discount)?,
        size,
        tie_break,
    };
    request.validate()?;
    Ok(request)
}

pub fn build_comparison_request(
    config: &dyn ConfigPort,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    benchmark: Option<&str>,
) -> Result<ComparisonRequest, CarteiraError> {
    let start = required_date(config, "comparison", "start_date", start)?;
    let end = required_date(config, "comparison", "end_date", end)?;
    let benchmark = benchmark
        .map(str::to_string)
        .or_else(|| config.get_string("comparison", "benchmark"))
        .unwrap_or_else(|| DEFAULT_BENCHMARK.to_string());
    let max_concurrency = config.get_int(
        "provider",
        "max_concurrency",
        DEFAULT_MAX_CONCURRENCY as i64,
    );
    let max_concurrency = usize::try_from(max_concurrency)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| config_invalid("provider", "max_concurrency", "must be at least 1"))?;

    Ok(ComparisonRequest {
        start,
        end,
        benchmark: benchmark.trim().to_string(),
        max_concurrency,
    })
}

pub fn build_provider(config: &dyn ConfigPort) -> Result<Arc<dyn MarketDataPort>, CarteiraError> {
    let kind = config
        .get_string("provider", "kind")
        .unwrap_or_else(|| "http".to_string());
    match kind.trim() {
        "csv" => {
            let dir = config
                .get_string("provider", "csv_dir")
                .filter(|d| !d.trim().is_empty())
                .ok_or_else(|| CarteiraError::ConfigMissing {
                    section: "provider".to_string(),
                    key: "csv_dir".to_string(),
                })?;
            tracing::info!(%dir, "using csv provider");
            Ok(Arc::new(CsvMarketDataAdapter::new(PathBuf::from(dir.trim()))))
        }
        "http" => {
            #[cfg(feature = "http")]
            {
                use crate::adapters::http_provider_adapter::HttpProviderAdapter;
                Ok(Arc::new(HttpProviderAdapter::from_config(config)?))
            }

            #[cfg(not(feature = "http"))]
            {
                Err(config_invalid(
                    "provider",
                    "kind",
                    "http feature is required for the http provider",
                ))
            }
        }
        other => Err(config_invalid(
            "provider",
            "kind",
            format!("unknown provider kind '{}'", other),
        )),
    }
}

fn fmt_opt(value: Option<f64>, width: usize) -> String {
    match value {
        Some(v) => format!("{:>width$.4}", v),
        None => format!("{:>width$}", "-"),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:>9.2}%", v * 100.0),
        None => format!("{:>10}", "-"),
    }
}

fn print_indicators() {
    for kind in [IndicatorKind::Profitability, IndicatorKind::Discount] {
        let heading = match kind {
            IndicatorKind::Profitability => "Profitability (higher is better)",
            IndicatorKind::Discount => "Discount",
        };
        println!("{heading}");
        for field in Fundamental::ALL.iter().filter(|f| f.kind() == kind) {
            let direction = if field.lower_is_better() {
                "lower is better"
            } else {
                "higher is better"
            };
            println!("  {:<16} {:<16} {}", field.key(), field.label(), direction);
        }
    }
}

fn print_snapshot(records: &[InstrumentRecord]) {
    print!("{:<8} {:<24}", "ticker", "sector");
    for field in Fundamental::COLUMNS {
        print!(" {:>14}", field.key());
    }
    println!(" {:>16}", "volume");
    for r in records {
        print!("{:<8} {:<24}", r.ticker, r.sector);
        for field in Fundamental::COLUMNS {
            print!(" {}", fmt_opt(r.fundamentals.get(field), 14));
        }
        println!(" {}", fmt_opt(r.volume, 16));
    }
}

fn print_selection(selection: &PortfolioSelection) {
    println!(
        "{:>4} {:<8} {:<24} {:>12} {:>12} {:>6} {:>6} {:>6}",
        "pos",
        "ticker",
        "sector",
        selection.profitability.key(),
        selection.discount.key(),
        "rank_p",
        "rank_d",
        "score"
    );
    for h in &selection.holdings {
        let i = &h.instrument;
        println!(
            "{:>4} {:<8} {:<24} {} {} {:>6} {:>6} {:>6}",
            h.position,
            i.ticker,
            i.sector,
            fmt_opt(i.fundamentals.get(selection.profitability), 12),
            fmt_opt(i.fundamentals.get(selection.discount), 12),
            i.rank_profitability,
            i.rank_discount,
            i.combined_score
        );
    }
}

fn print_comparison(comparison: &Comparison) {
    println!("{:<10} {:>10} {:>10}", "date", "portfolio", comparison.benchmark_symbol);
    for row in &comparison.rows {
        println!(
            "{} {} {}",
            row.date,
            fmt_pct(row.portfolio),
            fmt_pct(row.benchmark)
        );
    }

    eprintln!("\n=== Comparison {} to {} ===", comparison.start, comparison.end);
    eprintln!("Portfolio:  {}", fmt_pct(comparison.portfolio.final_return()));
    eprintln!(
        "{:<11} {}",
        format!("{}:", comparison.benchmark_symbol),
        fmt_pct(comparison.benchmark.final_return())
    );
    eprintln!("Excess:     {}", fmt_pct(comparison.excess_return()));
    if !comparison.failures.is_empty() {
        eprintln!("\nSkipped {} ticker(s):", comparison.failures.len());
        for f in &comparison.failures {
            match &f.reason {
                FailureReason::NoData => eprintln!("  {}: no price data", f.ticker),
                FailureReason::Provider(reason) => eprintln!("  {}: {}", f.ticker, reason),
            }
        }
    }
}

fn write_report(
    output: Option<&PathBuf>,
    write: impl FnOnce(&CsvReportAdapter, &Path) -> Result<(), CarteiraError>,
) -> Result<(), CarteiraError> {
    if let Some(path) = output {
        write(&CsvReportAdapter, path)?;
        eprintln!("Report written to: {}", path.display());
    }
    Ok(())
}

pub fn snapshot_pipeline(
    port: &dyn MarketDataPort,
    date: NaiveDate,
    tie_break: TieBreakField,
    today: NaiveDate,
) -> Result<Vec<InstrumentRecord>, CarteiraError> {
    runtime()?.block_on(load_snapshot(port, date, tie_break, today))
}

pub fn select_pipeline(
    port: &dyn MarketDataPort,
    request: &StrategyRequest,
    today: NaiveDate,
) -> Result<PortfolioSelection, CarteiraError> {
    let rt = runtime()?;
    let mut session = Session::new();
    rt.block_on(submit_strategy(port, &mut session, request, today))?;
    let selection = session.selection()?.clone();
    tracing::info!(tickers = ?selection.tickers, "selection generated");
    Ok(selection)
}

/// Runs the strategy, then compares the resulting portfolio with the
/// benchmark. Both steps share one session. The comparison range is checked
/// before any provider request.
pub fn compare_pipeline(
    port: Arc<dyn MarketDataPort>,
    strategy: &StrategyRequest,
    request: &ComparisonRequest,
    today: NaiveDate,
) -> Result<(PortfolioSelection, Comparison), CarteiraError> {
    validate_range_against(request.start, request.end, today)?;
    let rt = runtime()?;
    let mut session = Session::new();
    rt.block_on(submit_strategy(port.as_ref(), &mut session, strategy, today))?;
    let comparison = rt.block_on(build_comparison(Arc::clone(&port), &session, request, today))?;
    let selection = session.selection()?.clone();
    Ok((selection, comparison))
}

fn run_snapshot(
    config_path: Option<&PathBuf>,
    date: Option<NaiveDate>,
    tie_break: Option<&str>,
) -> ExitCode {
    let adapter = match prepare(config_path, &[validate_provider_config, validate_strategy_config]) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = required_date(&adapter, "strategy", "snapshot_date", date).and_then(|date| {
        let tie_break = parse_tie_break(
            tie_break
                .map(str::to_string)
                .or_else(|| adapter.get_string("strategy", "tie_break")),
        )?;
        let port = build_provider(&adapter)?;
        snapshot_pipeline(port.as_ref(), date, tie_break, today())
    });

    match result {
        Ok(records) => {
            print_snapshot(&records);
            eprintln!("{} instruments", records.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_select(
    config_path: Option<&PathBuf>,
    overrides: &StrategyOverrides,
    output: Option<&PathBuf>,
) -> ExitCode {
    let adapter = match prepare(config_path, &[validate_provider_config, validate_strategy_config]) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = build_strategy_request(&adapter, overrides).and_then(|request| {
        let port = build_provider(&adapter)?;
        let selection = select_pipeline(port.as_ref(), &request, today())?;
        write_report(output, |r, p| r.write_selection(&selection, p))?;
        Ok(selection)
    });

    match result {
        Ok(selection) => {
            print_selection(&selection);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_compare(
    config_path: Option<&PathBuf>,
    overrides: &StrategyOverrides,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    benchmark: Option<&str>,
    output: Option<&PathBuf>,
    selection_output: Option<&PathBuf>,
) -> ExitCode {
    let adapter = match prepare(
        config_path,
        &[
            validate_provider_config,
            validate_strategy_config,
            validate_comparison_config,
        ],
    ) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = (|| {
        let strategy = build_strategy_request(&adapter, overrides)?;
        let request = build_comparison_request(&adapter, start, end, benchmark)?;
        let port = build_provider(&adapter)?;
        let (selection, comparison) = compare_pipeline(port, &strategy, &request, today())?;
        write_report(selection_output, |r, p| r.write_selection(&selection, p))?;
        write_report(output, |r, p| r.write_comparison(&comparison, p))?;
        Ok::<_, CarteiraError>((selection, comparison))
    })();

    match result {
        Ok((selection, comparison)) => {
            print_selection(&selection);
            println!();
            print_comparison(&comparison);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
