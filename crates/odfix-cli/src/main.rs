//! odfix - automated repair of order-dependent tests
//!
//! The `odfix` command turns the polluter/cleaner chains found by an upstream
//! detector into minimal patches for each victim test.
//!
//! ## Commands
//!
//! - `repair`: attempt a fix for every victim in a case file
//! - `status`: summarise the results saved by earlier runs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use odfix_core::{
    merge_cases, AggregateResult, BuildTestOracle, EngineConfig, RepairEngine, ResultStore,
    SourceTree, Status, VictimCase, METRICS,
};
use odfix_runner::{CommandOracle, OracleConfig};
use odfix_source::{FsSourceTree, SourceConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "odfix")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated repair of order-dependent tests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file with [engine], [oracle] and [source] tables
    #[arg(short, long, global = true, env = "ODFIX_CONFIG", default_value = "odfix.toml")]
    config: PathBuf,

    /// Output directory for results and patches (overrides [engine].output_dir)
    #[arg(short, long, global = true, env = "ODFIX_OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair the victims listed in a case file
    Repair {
        /// JSON array of victim cases from the upstream detector
        #[arg(long)]
        cases: PathBuf,

        /// Write the best fix for each victim into the sources
        #[arg(long)]
        apply: bool,

        /// Keep copies of the files an applied fix touched
        #[arg(long, requires = "apply")]
        keep_backups: bool,
    },

    /// Summarise saved results
    Status,
}

/// Contents of `odfix.toml`. Every table is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    engine: EngineConfig,
    oracle: OracleConfig,
    source: SourceConfig,
}

impl Settings {
    /// Read `path`, falling back to defaults when it does not exist.
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config file {:?}", path))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RepairOptions {
    apply: bool,
    keep_backups: bool,
}

/// What happened to one victim during `repair`.
#[derive(Debug, Clone)]
struct VictimSummary {
    victim: String,
    status: Status,
    attempts: usize,
    applied: Vec<PathBuf>,
    backups: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    odfix_core::init_tracing(cli.json, level);

    let mut settings = Settings::load(&cli.config)?;
    if let Some(output) = cli.output {
        settings.engine.output_dir = output;
    }

    let result = match cli.command {
        Commands::Repair {
            cases,
            apply,
            keep_backups,
        } => cmd_repair(settings, &cases, RepairOptions { apply, keep_backups }).await,
        Commands::Status => cmd_status(&settings),
    };
    METRICS.flush();
    result
}

fn read_cases(path: &Path) -> Result<Vec<VictimCase>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse cases in {:?}", path))
}

async fn cmd_repair(settings: Settings, cases_path: &Path, options: RepairOptions) -> Result<()> {
    let cases = read_cases(cases_path)?;
    let store = ResultStore::open(settings.engine.results_dir())
        .context("Failed to open result store")?;
    info!("Repairing {} case(s) from {:?}", cases.len(), cases_path);

    let tree = FsSourceTree::new(settings.source);
    let oracle = CommandOracle::new(settings.oracle);
    let mut engine = RepairEngine::new(tree, oracle, settings.engine);
    let summaries = repair_all(&mut engine, &store, cases, options).await?;

    println!();
    for summary in &summaries {
        println!(
            "  {:<28} {} ({} attempt(s))",
            summary.status.label(),
            summary.victim,
            summary.attempts
        );
        for path in &summary.applied {
            println!("      patched {}", path.display());
        }
        for path in &summary.backups {
            println!("      backup  {}", path.display());
        }
    }
    let fixed = summaries.iter().filter(|s| s.status.is_fix()).count();
    println!();
    println!("Summary: {}/{} victims fixed", fixed, summaries.len());
    println!("Results: {}", store.dir().display());
    Ok(())
}

/// Repair each merged case in turn, persisting every result.
async fn repair_all<S: SourceTree, O: BuildTestOracle>(
    engine: &mut RepairEngine<S, O>,
    store: &ResultStore,
    cases: Vec<VictimCase>,
    options: RepairOptions,
) -> Result<Vec<VictimSummary>> {
    let config = engine.config().clone();
    let cases = merge_cases(cases);
    let mut summaries = Vec::with_capacity(cases.len());

    for case in &cases {
        let outcome = engine
            .repair_case(case)
            .await
            .with_context(|| format!("Failed to repair {}", case.victim))?;
        store
            .save(&outcome.result)
            .with_context(|| format!("Failed to save result for {}", case.victim))?;

        let mut applied = Vec::new();
        let mut backups = Vec::new();
        if options.apply {
            if let Some(fix) = outcome.best_fix() {
                let touched = fix
                    .apply(engine.tree_mut(), &config)
                    .with_context(|| format!("Failed to apply fix for {}", case.victim))?;
                if options.keep_backups {
                    backups = touched
                        .write_backups(engine.tree_mut(), &config)
                        .context("Failed to write backups")?;
                }
                applied = touched.paths().cloned().collect();
            }
        }

        summaries.push(VictimSummary {
            victim: case.victim.clone(),
            status: outcome.result.status,
            attempts: outcome.result.records.len(),
            applied,
            backups,
        });
    }
    Ok(summaries)
}

fn load_results(store: &ResultStore) -> Result<Vec<AggregateResult>> {
    store
        .victims()?
        .iter()
        .map(|victim| {
            store
                .load(victim)
                .with_context(|| format!("Failed to load result for {}", victim))
        })
        .collect()
}

/// Number of victims per overall status.
fn status_counts(results: &[AggregateResult]) -> BTreeMap<Status, usize> {
    let mut counts = BTreeMap::new();
    for result in results {
        *counts.entry(result.status).or_insert(0) += 1;
    }
    counts
}

fn cmd_status(settings: &Settings) -> Result<()> {
    let store = ResultStore::open(settings.engine.results_dir())
        .context("Failed to open result store")?;
    let results = load_results(&store)?;
    if results.is_empty() {
        println!("No results in {}", store.dir().display());
        return Ok(());
    }

    for result in &results {
        let best = result
            .best_record()
            .map(|r| r.candidate.as_str())
            .unwrap_or("-");
        println!(
            "  {:<28} {} (best: {}, {:.1}s)",
            result.status.label(),
            result.victim,
            best,
            result.time.elapsed_seconds()
        );
    }

    println!();
    for (status, count) in status_counts(&results).iter().rev() {
        println!("  {:>4}  {}", count, status.label());
    }
    let fixed = results.iter().filter(|r| r.status.is_fix()).count();
    println!();
    println!("Summary: {}/{} victims fixed", fixed, results.len());
    Ok(())
}
