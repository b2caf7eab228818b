//! ScreenLab CLI: screen, inspect and import commands.
//!
//! Commands:
//! - `screen`: run one or more strategies against a data source
//! - `strategies`: list the built-in presets
//! - `show-config`: print a preset as editable TOML
//! - `cohorts`: print the cohort strength table
//! - `import`: copy a CSV directory into a Parquet store
//! - `generate`: write a seeded synthetic universe as CSV

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use screenlab_core::cohort::{CohortConfig, CohortRanker};
use screenlab_core::data::{CsvStore, DataStore, ParquetStore, SyntheticUniverse};
use screenlab_runner::{save_report, Screener, ScreeningReport, StrategyConfig, StrategyPreset};

#[derive(Parser)]
#[command(name = "screenlab", about = "ScreenLab CLI: rule-based equity screening engine")]
struct Cli {
    /// Log filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Csv,
    Parquet,
    Synthetic,
}

/// Where bars come from.
#[derive(Args)]
struct SourceArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Synthetic)]
    source: SourceKind,

    /// Data directory (required for csv and parquet).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Synthetic universe seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Synthetic universe size.
    #[arg(long, default_value_t = 500)]
    instruments: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run strategies and print ranked candidates.
    Screen {
        /// Preset names (see `screenlab strategies`).
        strategies: Vec<String>,

        /// Strategy TOML files, run after the named presets.
        #[arg(long = "config")]
        configs: Vec<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,

        /// Screen as of this date (YYYY-MM-DD). Defaults to the latest bar.
        #[arg(long)]
        as_of: Option<String>,

        /// Write report.json, candidates.csv and rejections.csv under this directory.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Worker threads; overrides the strategy's setting.
        #[arg(long)]
        workers: Option<usize>,

        /// Keep at most this many candidates; overrides the strategy's setting.
        #[arg(long)]
        top: Option<usize>,

        /// Print the full report as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List built-in strategies.
    Strategies,
    /// Print a built-in strategy as TOML.
    ShowConfig {
        name: String,
    },
    /// Print the cohort strength table.
    Cohorts {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long)]
        as_of: Option<String>,

        /// Calendar days of history to load.
        #[arg(long, default_value_t = 10)]
        lookback_days: u32,

        /// Rows to print.
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Import a CSV data directory into a Parquet store.
    Import {
        /// CSV directory with bars.csv, reference.csv and memberships.csv.
        #[arg(long)]
        from: PathBuf,

        /// Parquet store root.
        #[arg(long)]
        to: PathBuf,

        /// First date to import (YYYY-MM-DD). Defaults to 1990-01-01.
        #[arg(long)]
        start: Option<String>,

        /// Last date to import (YYYY-MM-DD). Defaults to the source's latest bar.
        #[arg(long)]
        end: Option<String>,
    },
    /// Write a synthetic universe as a CSV data directory.
    Generate {
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 500)]
        instruments: usize,

        /// Trading days per instrument.
        #[arg(long, default_value_t = 120)]
        days: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Screen {
            strategies,
            configs,
            source,
            as_of,
            export,
            workers,
            top,
            json,
        } => run_screen(strategies, configs, &source, as_of, export, workers, top, json),
        Commands::Strategies => {
            run_strategies();
            Ok(())
        }
        Commands::ShowConfig { name } => run_show_config(&name),
        Commands::Cohorts {
            source,
            as_of,
            lookback_days,
            top,
        } => run_cohorts(&source, as_of, lookback_days, top),
        Commands::Import {
            from,
            to,
            start,
            end,
        } => run_import(&from, &to, start, end),
        Commands::Generate {
            out,
            seed,
            instruments,
            days,
        } => run_generate(&out, seed, instruments, days),
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn open_store(args: &SourceArgs) -> Result<Box<dyn DataStore>> {
    let dir = || {
        args.data_dir
            .as_deref()
            .context("--data-dir is required for csv and parquet sources")
    };
    let store: Box<dyn DataStore> = match args.source {
        SourceKind::Csv => Box::new(CsvStore::open(dir()?)?),
        SourceKind::Parquet => {
            let root = dir()?;
            if !root.exists() {
                bail!("parquet store not found: {}", root.display());
            }
            Box::new(ParquetStore::new(root))
        }
        SourceKind::Synthetic => {
            Box::new(SyntheticUniverse::new(args.seed, args.instruments, 120).build())
        }
    };
    info!(store = store.name(), "data source opened");
    Ok(store)
}

fn preset_names() -> String {
    StrategyPreset::all()
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn preset_config(name: &str) -> Result<StrategyConfig> {
    match StrategyPreset::from_name(name) {
        Some(preset) => Ok(preset.config()),
        None => bail!("unknown strategy '{name}'. Valid: {}", preset_names()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_screen(
    names: Vec<String>,
    config_paths: Vec<PathBuf>,
    source: &SourceArgs,
    as_of: Option<String>,
    export: Option<PathBuf>,
    workers: Option<usize>,
    top: Option<usize>,
    json: bool,
) -> Result<()> {
    if names.is_empty() && config_paths.is_empty() {
        bail!("name at least one strategy or pass --config. Valid: {}", preset_names());
    }
    if top == Some(0) {
        bail!("--top must be at least 1");
    }

    let mut configs = names
        .iter()
        .map(|n| preset_config(n))
        .collect::<Result<Vec<_>>>()?;
    for path in &config_paths {
        configs.push(
            StrategyConfig::from_file(path)
                .with_context(|| format!("failed to load strategy config {}", path.display()))?,
        );
    }

    let as_of = as_of.as_deref().map(parse_date).transpose()?;
    let store = open_store(source)?;
    let screener = Screener::new(store.as_ref()).with_as_of(as_of);

    for mut config in configs {
        if let Some(workers) = workers {
            config.workers = workers.max(1);
        }
        if top.is_some() {
            config.top_n = top;
        }
        let name = config.name.clone();
        let report = screener
            .run_config(config)
            .with_context(|| format!("strategy '{name}' failed"))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        if let Some(dir) = &export {
            let run_dir = save_report(&report, dir)?;
            println!("Report saved to: {}", run_dir.display());
        }
    }
    Ok(())
}

fn run_strategies() {
    println!("{:<24} Description", "Strategy");
    println!("{}", "-".repeat(90));
    for preset in StrategyPreset::all() {
        println!("{:<24} {}", preset.name(), preset.description());
    }
}

fn run_show_config(name: &str) -> Result<()> {
    let config = preset_config(name)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn run_cohorts(source: &SourceArgs, as_of: Option<String>, lookback_days: u32, top: usize) -> Result<()> {
    let as_of = as_of.as_deref().map(parse_date).transpose()?;
    let store = open_store(source)?;
    let ranker = CohortRanker::new(CohortConfig::default());
    let (as_of, table) = Screener::new(store.as_ref())
        .with_as_of(as_of)
        .cohorts(&ranker, lookback_days)?;

    if table.is_empty() {
        println!("No cohort met its minimum membership as of {as_of}.");
        return Ok(());
    }
    println!("Cohorts as of {as_of} ({} ranked)", table.len());
    println!();
    println!(
        "{:>4}  {:<9} {:<24} {:>7} {:>9} {:>9}",
        "Rank", "Kind", "Group", "Members", "Avg Chg%", "Strength"
    );
    println!("{}", "-".repeat(68));
    for e in table.top(top) {
        println!(
            "{:>4}  {:<9} {:<24} {:>7} {:>9.2} {:>9.2}",
            e.rank,
            format!("{:?}", e.group.kind).to_lowercase(),
            e.group.name,
            e.members,
            e.avg_change_pct,
            e.strength
        );
    }
    Ok(())
}

fn run_import(from: &Path, to: &Path, start: Option<String>, end: Option<String>) -> Result<()> {
    let source = CsvStore::open(from)?;
    let start = match start {
        Some(s) => parse_date(&s)?,
        None => NaiveDate::from_ymd_opt(1990, 1, 1).context("invalid default start date")?,
    };
    let end = match end {
        Some(s) => parse_date(&s)?,
        None => match source.latest_date()? {
            Some(d) => d,
            None => bail!("{} holds no bars", from.display()),
        },
    };
    if start > end {
        bail!("--start {start} is after --end {end}");
    }

    let target = ParquetStore::new(to);
    let summary = target.import_from(&source, start, end)?;
    println!(
        "Imported {} instrument(s), {} bar(s) into {}",
        summary.instruments,
        summary.bars,
        to.display()
    );
    for (id, reason) in &summary.skipped {
        println!("  skipped {id}: {reason}");
    }
    Ok(())
}

fn run_generate(out: &Path, seed: u64, instruments: usize, days: usize) -> Result<()> {
    if instruments == 0 || days == 0 {
        bail!("--instruments and --days must be at least 1");
    }
    let store = SyntheticUniverse::new(seed, instruments, days).build();
    CsvStore::save(&store, out)?;
    println!(
        "Wrote {instruments} synthetic instrument(s) x {days} day(s) to {}",
        out.display()
    );
    Ok(())
}

fn print_report(report: &ScreeningReport) {
    let d = &report.diagnostics;
    println!();
    println!("=== {} as of {} ===", report.strategy, report.as_of);
    println!("Config hash:    {}", &report.config_hash.0[..12.min(report.config_hash.0.len())]);
    println!("Dataset hash:   {}", &report.dataset_hash.0[..12.min(report.dataset_hash.0.len())]);
    println!("Min score:      {:.0}", report.min_score);
    println!();

    if report.is_empty() {
        println!("No candidates.");
    } else {
        println!(
            "{:>4}  {:<10} {:<14} {:<14} {:>6} {:>9} {:>7}  Cohort",
            "Rank", "Instrument", "Name", "Industry", "Score", "Close", "Chg%"
        );
        println!("{}", "-".repeat(96));
        for (i, c) in report.candidates.iter().enumerate() {
            let cohort = c
                .cohort
                .as_ref()
                .map(|m| format!("{} (#{}/{})", m.group, m.rank, m.total))
                .unwrap_or_default();
            println!(
                "{:>4}  {:<10} {:<14} {:<14} {:>6.1} {:>9.2} {:>7}  {}",
                i + 1,
                c.instrument,
                truncate(c.name.as_deref().unwrap_or("-"), 14),
                truncate(c.industry.as_deref().unwrap_or("-"), 14),
                c.score,
                c.close(),
                c.change_pct().map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
                cohort
            );
        }
    }

    println!();
    println!("--- Diagnostics ---");
    println!("Universe:         {}", d.universe_size);
    println!("Load failures:    {}", d.load_failures.len());
    println!("Insufficient:     {}", d.insufficient_data);
    println!("No recent bar:    {}", d.no_recent_bar);
    println!("Passed gates:     {}", d.passed_gates);
    println!("Below min score:  {}", d.below_min_score);
    println!("Qualified:        {} ({} truncated)", d.qualified, d.truncated);
    println!();
    println!("{:<28} {:>9} {:>10}", "Gate", "Rejected", "Undefined");
    for t in &d.rejections {
        println!("{:<28} {:>9} {:>10}", t.gate, t.rejected, t.undefined_input);
    }
    for f in d.load_failures.iter().take(10) {
        println!("WARNING: {} not loaded: {}", f.instrument, f.reason);
    }
    if d.load_failures.len() > 10 {
        println!("WARNING: {} more load failure(s)", d.load_failures.len() - 10);
    }
    println!();
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        s.chars().take(width.saturating_sub(1)).chain(['…']).collect()
    }
}
