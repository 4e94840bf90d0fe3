use crate::config::{FileConfig, Settings, DEFAULT_CONFIG_FILE};
use crate::output;
use crate::period::Period;
use crate::run::{Coordinator, RunOptions};
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gtally")]
#[command(about = "Aggregate commit history across many git repositories into weekly and yearly totals")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, default_value = ".", help = "Directory to scan for repositories")]
    pub root: PathBuf,

    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE, help = "Path to the JSON config file")]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Log debug output to stderr")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan every selected repository and aggregate its history
    Scan {
        #[arg(long = "period", help = "Period to report: YYYY, YYYYH1, YYYYH2, H1YYYY or H2YYYY (repeatable)")]
        periods: Vec<String>,

        #[arg(short, long, default_value_t = 0, help = "Worker threads (0 = one per core)")]
        jobs: usize,

        #[arg(long, help = "Include merge commits")]
        include_merges: bool,

        #[arg(long, help = "Output as JSON", conflicts_with = "ndjson")]
        json: bool,

        #[arg(long, help = "Output weekly rows as NDJSON")]
        ndjson: bool,
    },
    /// Show which repositories would be scanned and why others are skipped
    Repos {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Scan {
                periods,
                jobs,
                include_merges,
                json,
                ndjson,
            } => scan(&self.common, &periods, jobs, include_merges, json, ndjson),
            Commands::Repos { json } => repos(&self.common, json),
        }
    }
}

/// Loads, completes and validates the configuration. Invalid settings abort
/// before any repository is touched.
pub fn load_settings(common: &CommonArgs, include_merges: bool) -> Result<Settings> {
    let mut config = FileConfig::load(&common.config)
        .with_context(|| format!("Failed to load config from {}", common.config.display()))?;
    if !config.has_identity() {
        config = config.with_inferred_identity();
    }
    config.include_merges |= include_merges;
    config.validate().context("Invalid configuration")
}

fn resolve_root(common: &CommonArgs) -> Result<PathBuf> {
    anyhow::ensure!(common.root.is_dir(), "Scan root {} is not a directory", common.root.display());
    std::fs::canonicalize(&common.root)
        .with_context(|| format!("Failed to resolve scan root {}", common.root.display()))
}

fn parse_periods(specs: &[String]) -> Result<Vec<Period>> {
    if specs.is_empty() {
        return Ok(vec![Period::year(Utc::now().year())?]);
    }
    let mut periods = Vec::with_capacity(specs.len());
    for spec in specs {
        let period = Period::parse(spec).with_context(|| format!("Invalid period '{spec}'"))?;
        if !periods.contains(&period) {
            periods.push(period);
        }
    }
    Ok(periods)
}

fn scan(common: &CommonArgs, periods: &[String], jobs: usize, include_merges: bool, json: bool, ndjson: bool) -> Result<()> {
    let periods = parse_periods(periods)?;
    let settings = load_settings(common, include_merges)?;
    let root = resolve_root(common)?;

    let coordinator = Coordinator::new(settings);
    let report = coordinator
        .run(&RunOptions {
            root,
            periods,
            jobs,
            progress: !(json || ndjson),
        })
        .context("Scan failed")?;

    if json {
        output::output_json(&report)
    } else if ndjson {
        output::output_ndjson(&report)
    } else {
        output::output_summary(&report)
    }
}

fn repos(common: &CommonArgs, json: bool) -> Result<()> {
    let settings = load_settings(common, false)?;
    let root = resolve_root(common)?;
    let selection = Coordinator::new(settings).locate(&root);

    if json {
        output::output_selection_json(&selection)
    } else {
        output::output_selection(&selection)
    }
}
