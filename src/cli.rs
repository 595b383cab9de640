//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::env_config_adapter::EnvConfigAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{Backend, backend, cumulative_base, validate_config};
use crate::domain::cumulative::BaseValue;
use crate::domain::error::AnalyticsError;
use crate::domain::series::{CumulativeIndexPoint, DateRange};
use crate::domain::service;
use crate::domain::volatility::{TRADING_DAYS_PER_YEAR, annualize};
use crate::logging::{LogConfig, init_logging};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

pub type Config = EnvConfigAdapter<FileConfigAdapter>;
pub type SharedPricePort = Arc<dyn PricePort + Send + Sync>;

#[derive(Parser, Debug)]
#[command(
    name = "portfolio-analytics",
    version,
    about = "Portfolio performance analytics over stored daily prices"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print analytics for one portfolio over a date range
    Report {
        #[arg(short, long, required_unless_present = "data_dir")]
        config: Option<PathBuf>,
        /// Directory of <portfolio>.csv files instead of a database
        #[arg(long, conflicts_with = "config")]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        portfolio: String,
        #[arg(short, long)]
        benchmark: Option<String>,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Cumulative index base: `first` or a positive number
        #[arg(long)]
        base: Option<String>,
        #[arg(long, default_value_t = TRADING_DAYS_PER_YEAR)]
        periods_per_year: f64,
    },
    /// Show the stored date range of portfolio(s)
    Info {
        #[arg(short, long, required_unless_present = "data_dir")]
        config: Option<PathBuf>,
        #[arg(long, conflicts_with = "config")]
        data_dir: Option<PathBuf>,
        /// Portfolio to describe; may be repeated. Defaults to every CSV file
        /// when reading from --data-dir.
        #[arg(short, long)]
        portfolio: Vec<String>,
    },
    /// Create the SQLite schema, optionally seeding it from a CSV directory
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        import: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Serve { config } => load_config(&config).and_then(|c| run_serve(&c)),
        Command::Report {
            config,
            data_dir,
            portfolio,
            benchmark,
            start,
            end,
            base,
            periods_per_year,
        } => open_source(config.as_deref(), data_dir).and_then(|(port, default_base)| {
            let base = match base {
                Some(raw) => raw.parse()?,
                None => default_base,
            };
            let request = ReportRequest {
                portfolio,
                benchmark,
                range: DateRange::new(start, end)?,
                base,
                periods_per_year,
            };
            run_report(&*port, &request)
        }),
        Command::Info {
            config,
            data_dir,
            portfolio,
        } => run_info(config.as_deref(), data_dir, portfolio),
        Command::InitDb { config, import } => {
            load_config(&config).and_then(|c| run_init_db(&c, import.as_deref()))
        }
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Loads the INI file, overlays `DB_*` environment variables and installs
/// logging from `[log]`.
pub fn load_config(path: &Path) -> Result<Config, AnalyticsError> {
    let config = EnvConfigAdapter::from_env(FileConfigAdapter::from_file(path)?);
    install_logging(&LogConfig::from_config(&config));
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

fn install_logging(log: &LogConfig) {
    if let Err(e) = init_logging(log) {
        eprintln!("warning: logging not initialised: {e}");
    }
}

/// Repository for the configured backend.
pub fn open_repository(config: &dyn ConfigPort) -> Result<SharedPricePort, AnalyticsError> {
    match backend(config)? {
        Backend::Sqlite => open_sqlite(config),
        Backend::Postgres => open_postgres(config),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<SharedPricePort, AnalyticsError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    Ok(Arc::new(SqliteAdapter::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<SharedPricePort, AnalyticsError> {
    Err(backend_not_built("sqlite"))
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &dyn ConfigPort) -> Result<SharedPricePort, AnalyticsError> {
    use crate::adapters::postgres_adapter::PostgresAdapter;
    Ok(Arc::new(PostgresAdapter::from_config(config)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &dyn ConfigPort) -> Result<SharedPricePort, AnalyticsError> {
    Err(backend_not_built("postgres"))
}

#[allow(dead_code)]
fn backend_not_built(name: &str) -> AnalyticsError {
    AnalyticsError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: format!("this binary was built without the {name} feature"),
    }
}

/// Either the configured database or a CSV directory, plus the default
/// cumulative base.
fn open_source(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
) -> Result<(SharedPricePort, BaseValue), AnalyticsError> {
    match (config_path, data_dir) {
        (_, Some(dir)) => {
            install_logging(&LogConfig::default());
            let port: SharedPricePort = Arc::new(CsvAdapter::new(dir));
            Ok((port, BaseValue::default()))
        }
        (Some(path), None) => {
            let config = load_config(path)?;
            validate_config(&config)?;
            Ok((open_repository(&config)?, cumulative_base(&config)?))
        }
        (None, None) => Err(AnalyticsError::InvalidParameter {
            name: "config".into(),
            reason: "either --config or --data-dir is required".into(),
        }),
    }
}

// Report

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub portfolio: String,
    pub benchmark: Option<String>,
    pub range: DateRange,
    pub base: BaseValue,
    pub periods_per_year: f64,
}

#[derive(Debug)]
pub struct BenchmarkReport {
    pub benchmark_id: String,
    pub tracking_error: Result<f64, AnalyticsError>,
    pub correlation: Result<f64, AnalyticsError>,
}

/// Everything the report command prints. Estimators that cannot run on the
/// window keep their error instead of failing the whole report.
#[derive(Debug)]
pub struct PortfolioReport {
    pub portfolio_id: String,
    pub range: DateRange,
    pub index: Vec<CumulativeIndexPoint>,
    pub total_return: f64,
    pub volatility: Result<f64, AnalyticsError>,
    pub annualized_volatility: Option<f64>,
    pub benchmark: Option<BenchmarkReport>,
}

pub fn build_report(
    port: &dyn PricePort,
    request: &ReportRequest,
) -> Result<PortfolioReport, AnalyticsError> {
    if !(request.periods_per_year.is_finite() && request.periods_per_year > 0.0) {
        return Err(AnalyticsError::InvalidParameter {
            name: "periods_per_year".into(),
            reason: "must be a positive number".into(),
        });
    }

    let (start, end) = (request.range.start(), request.range.end());
    let index = service::cumulative_prices(port, &request.portfolio, start, end, request.base)?;
    let total_return = match (index.first(), index.last()) {
        (Some(first), Some(last)) => last.value / first.value - 1.0,
        _ => 0.0,
    };

    let volatility = service::daily_volatility(port, &request.portfolio, start, end);
    let annualized_volatility = volatility
        .as_ref()
        .ok()
        .map(|v| annualize(*v, request.periods_per_year));

    let benchmark = request.benchmark.as_ref().map(|benchmark_id| BenchmarkReport {
        benchmark_id: benchmark_id.clone(),
        tracking_error: service::tracking_error(port, &request.portfolio, benchmark_id, start, end),
        correlation: service::correlation(port, &request.portfolio, benchmark_id, start, end),
    });

    Ok(PortfolioReport {
        portfolio_id: request.portfolio.clone(),
        range: request.range,
        index,
        total_return,
        volatility,
        annualized_volatility,
        benchmark,
    })
}

struct Metric<'a>(&'a Result<f64, AnalyticsError>);

impl fmt::Display for Metric<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ok(v) => write!(f, "{v:.6}"),
            Err(e) => write!(f, "n/a ({e})"),
        }
    }
}

impl fmt::Display for PortfolioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Portfolio {} over {}", self.portfolio_id, self.range)?;
        writeln!(f, "  observations:      {}", self.index.len())?;
        if let (Some(first), Some(last)) = (self.index.first(), self.index.last()) {
            writeln!(
                f,
                "  index:             {:.4} ({}) -> {:.4} ({})",
                first.value, first.date, last.value, last.date
            )?;
        }
        writeln!(f, "  total return:      {:.4}%", self.total_return * 100.0)?;
        writeln!(f, "  daily volatility:  {}", Metric(&self.volatility))?;
        if let Some(annual) = self.annualized_volatility {
            writeln!(f, "  annualized:        {annual:.6}")?;
        }
        if let Some(bench) = &self.benchmark {
            writeln!(f, "  vs {}:", bench.benchmark_id)?;
            writeln!(f, "    tracking error:  {}", Metric(&bench.tracking_error))?;
            writeln!(f, "    correlation:     {}", Metric(&bench.correlation))?;
        }
        Ok(())
    }
}

fn run_report(port: &dyn PricePort, request: &ReportRequest) -> Result<(), AnalyticsError> {
    let report = build_report(port, request)?;
    print!("{report}");
    Ok(())
}

// Info

fn run_info(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    portfolios: Vec<String>,
) -> Result<(), AnalyticsError> {
    let portfolios = match (&data_dir, portfolios.is_empty()) {
        (Some(dir), true) => CsvAdapter::new(dir.clone()).list_portfolios()?,
        _ => portfolios,
    };
    if portfolios.is_empty() {
        return Err(AnalyticsError::InvalidParameter {
            name: "portfolio".into(),
            reason: "at least one --portfolio is required".into(),
        });
    }

    let (port, _) = open_source(config_path, data_dir)?;
    for id in &portfolios {
        match port.data_range(id) {
            Ok(Some((first, last, count))) => {
                println!("{id}: {count} prices, {first} to {last}");
            }
            Ok(None) => println!("{id}: no data found"),
            Err(e) => eprintln!("error querying {id}: {e}"),
        }
    }
    Ok(())
}

// Validate

fn run_validate(config_path: &Path) -> Result<(), AnalyticsError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;
    validate_config(&config)?;

    let backend = backend(&config)?;
    eprintln!("  backend:          {backend:?}");
    eprintln!("  cumulative base:  {}", cumulative_base(&config)?);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

// Init DB

#[cfg(feature = "sqlite")]
fn run_init_db(config: &Config, import: Option<&Path>) -> Result<(), AnalyticsError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    validate_config(config)?;
    if backend(config)? != Backend::Sqlite {
        return Err(AnalyticsError::ConfigInvalid {
            section: "database".into(),
            key: "backend".into(),
            reason: "init-db only manages the sqlite backend".into(),
        });
    }

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    info!("schema ready");

    if let Some(dir) = import {
        let csv = CsvAdapter::new(dir.to_path_buf());
        for id in csv.list_portfolios()? {
            let points = csv.load_all(&id)?;
            if points.is_empty() {
                warn!(portfolio_id = %id, "skipping empty file");
                continue;
            }
            adapter.insert_prices(&id, &points)?;
            eprintln!("imported {id}: {} prices", points.len());
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_init_db(_config: &Config, _import: Option<&Path>) -> Result<(), AnalyticsError> {
    Err(backend_not_built("sqlite"))
}

// Serve

#[cfg(feature = "web")]
fn run_serve(config: &Config) -> Result<(), AnalyticsError> {
    use crate::adapters::web::{AppState, build_router};
    use crate::domain::config_validation::listen_addr;

    validate_config(config)?;
    let prices = open_repository(config)?;
    let addr = listen_addr(config)?;
    let state = AppState::from_config(prices, config)?;
    let router = build_router(state);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for shutdown signal");
                }
                info!("shutting down");
            })
            .await?;
        Ok::<(), AnalyticsError>(())
    })
}

#[cfg(not(feature = "web"))]
fn run_serve(_config: &Config) -> Result<(), AnalyticsError> {
    Err(AnalyticsError::InvalidParameter {
        name: "serve".into(),
        reason: "this binary was built without the web feature".into(),
    })
}
