//! issues-sync - One-directional GitHub to JIRA issue sync
//!
//! Main entry point for the issues-sync CLI.

use clap::{Parser, Subcommand};
use issues_sync::config::{validate_config_result, StateBackend, SyncConfig};
use issues_sync::integrations::{GitHubClient, JiraClient};
use issues_sync::state::{FileStore, InMemoryStore, MappingStore};
use issues_sync::sync::{
    detect_mappings, detect_since, import_mappings, read_mappings_csv, write_mappings_csv,
    EngineOptions, SyncEngine,
};
use issues_sync::SyncError;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

/// Mirror GitHub issues into a JIRA project
#[derive(Parser, Debug)]
#[command(name = "issues-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ./config.toml, then ~/.issues-sync/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mapping state file (overrides system.state_file)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log intended changes without writing to either tracker
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sync pass
    Sync {
        /// Exit with an error when any issue failed to sync
        #[arg(long)]
        strict: bool,

        /// Write Prometheus metrics to this file after the pass
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },

    /// Find existing JIRA issues matching GitHub issues by title
    DetectMappings {
        /// Output CSV file
        #[arg(default_value = "mappings.csv")]
        output: PathBuf,
    },

    /// Seed the mapping state from a CSV produced by detect-mappings
    ImportMappings {
        /// Input CSV file
        input: PathBuf,
    },

    /// Show mapping count and last sync time
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = issues_sync::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> issues_sync::Result<()> {
    let mut config = SyncConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.state_file {
        config.system.state_file = Some(path);
    }
    if cli.dry_run {
        config.system.dry_run = true;
    }

    match cli.command {
        Commands::Sync {
            strict,
            metrics_file,
        } => run_sync(&config, strict, metrics_file.as_deref()).await,
        Commands::DetectMappings { output } => run_detect(&config, &output).await,
        Commands::ImportMappings { input } => run_import(&config, &input),
        Commands::Status => run_status(&config),
    }
}

fn open_store(config: &SyncConfig) -> issues_sync::Result<Box<dyn MappingStore>> {
    match config.system.state_backend {
        StateBackend::File => Ok(Box::new(FileStore::open(config.state_file())?)),
        StateBackend::Memory => {
            tracing::warn!("Using in-memory state, mappings will not be persisted");
            Ok(Box::new(InMemoryStore::new()))
        }
    }
}

async fn run_sync(
    config: &SyncConfig,
    strict: bool,
    metrics_file: Option<&Path>,
) -> issues_sync::Result<()> {
    validate_config_result(config)?;

    let github = GitHubClient::new(&config.github)?;
    let jira = JiraClient::new(&config.jira)?;
    let store = open_store(config)?;

    let options = EngineOptions {
        dry_run: config.system.dry_run,
        advance: config.system.advance_last_sync,
    };
    let mut engine = SyncEngine::new(github, jira, store).with_options(options);

    let result = engine.sync().await;

    if let Some(path) = metrics_file {
        if let Err(e) = issues_sync::metrics::write_metrics_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics");
        }
    }

    let report = result?;

    println!(
        "Synced {} issue(s): {} created, {} updated, {} unchanged, {} source status update(s), {} failed",
        report.fetched,
        report.created,
        report.updated,
        report.unchanged,
        report.reciprocal_updates,
        report.failures.len()
    );
    if config.system.dry_run {
        println!(
            "Dry run: {} would be created, {} would be updated",
            report.would_create, report.would_update
        );
    }
    for failure in &report.failures {
        println!("  failed: {}: {}", failure.source_id, failure.error);
    }

    if strict && report.has_failures() {
        return Err(SyncError::Other(format!(
            "{} issue(s) failed to sync",
            report.failures.len()
        )));
    }

    Ok(())
}

async fn run_detect(config: &SyncConfig, output: &Path) -> issues_sync::Result<()> {
    validate_config_result(config)?;

    let github = GitHubClient::new(&config.github)?;
    let jira = JiraClient::new(&config.jira)?;

    let pairs = detect_mappings(&github, &jira, detect_since()).await?;

    let writer = BufWriter::new(File::create(output)?);
    write_mappings_csv(&pairs, writer)?;

    println!("Wrote {} mapping(s) to {}", pairs.len(), output.display());
    Ok(())
}

fn run_import(config: &SyncConfig, input: &Path) -> issues_sync::Result<()> {
    let reader = BufReader::new(File::open(input)?);
    let pairs = read_mappings_csv(reader)?;

    let mut store = FileStore::open(config.state_file())?;
    let count = import_mappings(&mut store, &pairs)?;

    println!(
        "Imported {} mapping(s) into {} ({} total)",
        count,
        store.path().display(),
        store.len()
    );
    Ok(())
}

fn run_status(config: &SyncConfig) -> issues_sync::Result<()> {
    if config.system.state_backend == StateBackend::Memory {
        println!("State backend: memory (nothing persisted)");
        return Ok(());
    }

    let store = FileStore::open(config.state_file())?;

    println!("State file:     {}", store.path().display());
    println!("Mappings:       {}", store.len());
    println!("Last sync time: {}", store.last_sync_time().to_rfc3339());
    Ok(())
}
