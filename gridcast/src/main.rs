use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use gridcast::{
    CatalogVersion, DuplicateKeyPolicy, EngineOptions, ForecastEngine, ForecastQuery,
    JoinStrategy, SourcePaths,
};
use serde::Serialize;

fn parse_batch_size(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|err| format!("invalid batch size '{value}': {err}"))?;
    if parsed == 0 {
        return Err("batch size must be greater than zero".into());
    }
    Ok(parsed)
}

fn parse_strategy(value: &str) -> Result<JoinStrategy, String> {
    value.parse().map_err(|err: gridcast::Error| err.to_string())
}

fn parse_catalog(value: &str) -> Result<CatalogVersion, String> {
    value.parse().map_err(|err: gridcast::Error| err.to_string())
}

fn parse_duplicate_keys(value: &str) -> Result<DuplicateKeyPolicy, String> {
    value.parse().map_err(|err: gridcast::Error| err.to_string())
}

fn main() {
    // Initialize tracing subscriber to respect RUST_LOG environment variable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        tracing::debug!("gridcast failed: {err:?}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

#[derive(Parser)]
#[command(
    name = "gridcast",
    version,
    about = "Query flat forecast tables by period, cell, and region"
)]
struct Cli {
    /// Directory holding preds_001.parquet and preds_001_90_hdi.parquet.
    #[arg(long = "data-dir", env = "GRIDCAST_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    /// Join strategy: eager joins once at load time, lazy per query.
    #[arg(
        long,
        env = "GRIDCAST_STRATEGY",
        default_value = "eager",
        value_parser = parse_strategy
    )]
    strategy: JoinStrategy,
    /// Metric catalog to serve (summary or raw).
    #[arg(long, default_value = "summary", value_parser = parse_catalog)]
    catalog: CatalogVersion,
    /// Rows per decoded source batch.
    #[arg(long = "batch-size", value_name = "ROWS", value_parser = parse_batch_size)]
    batch_size: Option<usize>,
    /// What to do when the secondary table repeats a key (keep-first or reject).
    #[arg(
        long = "duplicate-keys",
        default_value = "keep-first",
        value_parser = parse_duplicate_keys
    )]
    duplicate_keys: DuplicateKeyPolicy,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream matching records as newline-delimited JSON.
    Query(QueryArgs),
    /// List the distinct period ids.
    Periods,
    /// List the distinct cell ids.
    Cells,
    /// List the distinct region ids.
    Regions,
    /// List each cell with its grid position and region.
    Locations,
    /// List the metrics the catalog serves.
    Metrics,
}

#[derive(Args, Clone)]
struct QueryArgs {
    /// Period ids to keep (repeatable or comma-separated).
    #[arg(long = "period", value_name = "ID", value_delimiter = ',')]
    periods: Vec<i64>,
    /// Cell ids to keep.
    #[arg(long = "cell", value_name = "ID", value_delimiter = ',')]
    cells: Vec<i64>,
    /// Region ids to keep.
    #[arg(long = "region", value_name = "ID", value_delimiter = ',')]
    regions: Vec<i64>,
    /// Metrics to return; every catalog metric when omitted.
    #[arg(long = "metric", value_name = "NAME", value_delimiter = ',')]
    metrics: Vec<String>,
}

impl QueryArgs {
    fn to_query(&self) -> ForecastQuery {
        let mut query = ForecastQuery::new();
        if !self.periods.is_empty() {
            query = query.periods(self.periods.iter().copied());
        }
        if !self.cells.is_empty() {
            query = query.cells(self.cells.iter().copied());
        }
        if !self.regions.is_empty() {
            query = query.regions(self.regions.iter().copied());
        }
        if !self.metrics.is_empty() {
            query = query.metrics(self.metrics.iter().cloned());
        }
        query
    }
}

#[derive(Serialize)]
struct MetricInfo<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    metric_type: String,
    catalog: &'a str,
}

fn run() -> gridcast::Result<()> {
    let cli = Cli::parse();
    let mut options = EngineOptions::new()
        .with_strategy(cli.strategy)
        .with_catalog(cli.catalog)
        .with_duplicate_keys(cli.duplicate_keys);
    if let Some(batch_size) = cli.batch_size {
        options = options.with_batch_size(batch_size);
    }

    let engine = ForecastEngine::open(&SourcePaths::from_dir(&cli.data_dir), options)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cli.command {
        Command::Query(args) => {
            let mut written = 0usize;
            for record in engine.query(&args.to_query())? {
                write_line(&mut out, &record?)?;
                written += 1;
            }
            tracing::info!(records = written, "query complete");
        }
        Command::Periods => write_line(&mut out, &engine.distinct_periods()?)?,
        Command::Cells => write_line(&mut out, &engine.distinct_cells()?)?,
        Command::Regions => write_line(&mut out, &engine.distinct_regions()?)?,
        Command::Locations => {
            for location in engine.cell_locations()? {
                write_line(&mut out, &location)?;
            }
        }
        Command::Metrics => {
            let catalog = engine.catalog();
            for metric in catalog.metrics() {
                write_line(
                    &mut out,
                    &MetricInfo {
                        name: metric.name(),
                        metric_type: metric.metric_type().to_string(),
                        catalog: catalog.version(),
                    },
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> gridcast::Result<()> {
    serde_json::to_writer(&mut *out, value).map_err(io::Error::from)?;
    out.write_all(b"\n")?;
    Ok(())
}
