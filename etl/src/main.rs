//! starschema CLI - build star schemas from indicator CSV files
//!
//! ```bash
//! starschema run                          # socio-economic star schema
//! starschema run --sink postgres          # same, into PostgreSQL (DB_* env vars)
//! starschema health                       # vaccination / mortality star schema
//! starschema inspect data/input/x.csv     # encoding, delimiter, headers
//! starschema thresholds                   # effective classification brackets
//! ```
//!
//! Exit codes: 0 success, 1 fatal error, 2 at least one table failed to load.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use starschema::extract::format_delimiter;
use starschema::extract::sources::CATALOGUE;
use starschema::logs::{LogCapture, LogTally};
use starschema::{
    read_csv_file, run_health, run_socioeconomic, CsvSink, DatabaseConfig, EtlConfig, Label,
    PostgresSink, RunSummary, Sink, Thresholds,
};
use std::fs;
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const EXIT_PARTIAL_LOAD: i32 = 2;

/// JSON written by `--summary`: the run summary plus what the run logged.
#[derive(Serialize)]
struct SummaryFile<'a> {
    #[serde(flatten)]
    run: &'a RunSummary,
    log: &'a LogTally,
}

#[derive(Parser)]
#[command(name = "starschema")]
#[command(about = "Build star schemas from HDI, energy, GDP, CO2 and health indicator tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkKind {
    Csv,
    Postgres,
}

#[derive(Args)]
struct RunArgs {
    /// Directory holding the raw CSV sources (default: ETL_INPUT_DIR or data/input)
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Directory for CSV output (default: ETL_OUTPUT_DIR or data/output)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Where to load the tables
    #[arg(long, value_enum, default_value = "csv")]
    sink: SinkKind,

    /// Write the run summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Socio-economic star schema: HDI, energy, GDP, CO2
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Thresholds JSON file (default: ETL_THRESHOLDS or canonical brackets)
        #[arg(short, long)]
        thresholds: Option<PathBuf>,
    },

    /// Health metrics star schema: vaccination and child mortality
    Health {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Show how a CSV file is read
    Inspect {
        /// Input CSV file
        input: PathBuf,
    },

    /// Print the effective classification brackets
    Thresholds {
        /// Thresholds JSON file
        #[arg(short, long)]
        thresholds: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { args, thresholds } => cmd_run(args, thresholds.as_deref()).await,
        Commands::Health { args } => cmd_health(args).await,
        Commands::Inspect { input } => cmd_inspect(&input).map(|_| 0),
        Commands::Thresholds { thresholds } => cmd_thresholds(thresholds.as_deref()).map(|_| 0),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_config(args: &RunArgs, thresholds: Option<&Path>) -> CliResult<EtlConfig> {
    let mut config = EtlConfig::from_env()?;
    if let Some(dir) = &args.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(path) = thresholds {
        config.thresholds = Thresholds::from_file(path)?;
    }
    Ok(config)
}

fn build_sink(kind: SinkKind, config: &EtlConfig) -> CliResult<Sink> {
    Ok(match kind {
        SinkKind::Csv => Sink::Csv(CsvSink::new(&config.output_dir)),
        SinkKind::Postgres => Sink::Postgres(PostgresSink::new(DatabaseConfig::from_env()?)),
    })
}

async fn cmd_run(args: RunArgs, thresholds: Option<&Path>) -> CliResult<i32> {
    let config = build_config(&args, thresholds)?;
    let sink = build_sink(args.sink, &config)?;
    let capture = LogCapture::start();
    let summary = run_socioeconomic(&config, &sink).await?;
    report(&summary, &capture.finish(), args.summary.as_deref())
}

async fn cmd_health(args: RunArgs) -> CliResult<i32> {
    let config = build_config(&args, None)?;
    let sink = build_sink(args.sink, &config)?;
    let capture = LogCapture::start();
    let summary = run_health(&config, &sink).await?;
    report(&summary, &capture.finish(), args.summary.as_deref())
}

fn report(summary: &RunSummary, log: &LogTally, output: Option<&Path>) -> CliResult<i32> {
    eprintln!("\n📊 Run {} ({})", summary.run_id, summary.schema);
    for table in &summary.report.written {
        eprintln!("   ✅ {}: {} rows", table.table, table.rows);
    }
    for table in &summary.report.failed {
        eprintln!("   ❌ {}: {}", table.table, table.error);
    }
    if summary.drops.total() > 0 {
        eprintln!("   Dropped rows: {}", summary.drops.total());
    }
    eprintln!("   Logged: {} warning(s), {} error(s)", log.warnings.len(), log.errors.len());
    if log.missed > 0 {
        eprintln!("   ({} log entries not captured)", log.missed);
    }

    if let Some(path) = output {
        let file = SummaryFile { run: summary, log };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        eprintln!("   💾 Summary saved to: {}", path.display());
    }

    if summary.is_complete() {
        eprintln!("\n✨ Done!");
        Ok(0)
    } else {
        eprintln!("\n⚠️  {} table(s) failed to load", summary.report.failed.len());
        Ok(EXIT_PARTIAL_LOAD)
    }
}

fn cmd_inspect(input: &Path) -> CliResult<()> {
    eprintln!("📄 Inspecting: {}", input.display());

    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let table = read_csv_file(name, input)?;

    eprintln!("   Encoding: {}", table.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(table.delimiter));
    eprintln!("   Rows: {}", table.len());
    eprintln!("   Columns:");
    for (i, header) in table.headers.iter().enumerate() {
        eprintln!("     [{:2}] {}", i + 1, header);
    }

    let matching: Vec<&str> = CATALOGUE
        .iter()
        .filter(|schema| schema.bind(&table).is_ok())
        .map(|schema| schema.key)
        .collect();
    if matching.is_empty() {
        eprintln!("   Source: no known source matches these headers");
    } else {
        eprintln!("   Source: {}", matching.join(", "));
    }
    Ok(())
}

fn cmd_thresholds(path: Option<&Path>) -> CliResult<()> {
    let thresholds = match path {
        Some(path) => Thresholds::from_file(path)?,
        None => EtlConfig::from_env()?.thresholds,
    };

    println!("HDI:");
    for (label, lower, upper) in thresholds.hdi.intervals() {
        println!("  {:<16} [{}, {})", label.as_str(), lower, upper);
    }
    println!("Income (GDP per capita):");
    for (label, lower, upper) in thresholds.income.intervals() {
        println!("  {:<16} [{}, {})", label.as_str(), lower, upper);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use starschema::{DropCounts, LoadReport};

    #[test]
    fn test_summary_file_carries_log_tally() {
        let now = chrono::Utc::now();
        let summary = RunSummary {
            run_id: uuid::Uuid::new_v4(),
            schema: "socioeconomic",
            started_at: now,
            finished_at: now,
            drops: DropCounts::default(),
            report: LoadReport::new("csv"),
        };
        let log = LogTally {
            warnings: vec!["3 rows dropped".to_string()],
            ..LogTally::default()
        };

        let json = serde_json::to_value(SummaryFile { run: &summary, log: &log }).unwrap();
        assert_eq!(json["schema"], "socioeconomic");
        assert!(json["report"].is_object());
        assert_eq!(json["log"]["warnings"][0], "3 rows dropped");
        assert_eq!(json["log"]["errors"].as_array().map(Vec::len), Some(0));
    }
}
