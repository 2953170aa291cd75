//! Pull-Harvest main entry point
//!
//! This is the command-line interface for the Pull-Harvest task manager.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pull_harvest::config::{load_config_with_hash, Config};
use pull_harvest::{ManagerStatus, Task, TaskManager};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pull-Harvest: a resumable GitHub pull request harvester
///
/// Pull-Harvest copies a repository's pull requests, reviews, review comments
/// and users into a local SQLite database. Harvests are split into
/// checkpointed tasks that survive restarts and wait out rate limits.
#[derive(Parser, Debug)]
#[command(name = "pull-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable GitHub pull request harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Schedule a harvest of OWNER/REPOSITORY and run the queue
    Add {
        owner: String,
        repository: String,
    },

    /// Resume pending tasks, waiting out rate limits, until none are left
    Run,

    /// List pending tasks
    Tasks {
        /// Include completed tasks
        #[arg(long)]
        all: bool,

        /// Page of 100 tasks to show
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Print tasks as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    match cli.command {
        Command::Add { owner, repository } => handle_add(&config, &owner, &repository).await,
        Command::Run => handle_run(&config).await,
        Command::Tasks { all, page, json } => handle_tasks(&config, all, page, json),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pull_harvest=info,warn"),
            1 => EnvFilter::new("pull_harvest=debug,info"),
            2 => EnvFilter::new("pull_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `add`: creates the harvest, then keeps driving the queue
async fn handle_add(config: &Config, owner: &str, repository: &str) -> anyhow::Result<()> {
    let mut manager = TaskManager::from_config(config)?;

    if !manager.create_task(owner, repository).await {
        anyhow::bail!("Could not schedule a harvest of {}/{}", owner, repository);
    }
    println!("✓ Harvest of {}/{} scheduled", owner, repository);

    manager.run().await;
    report(&manager.status());
    Ok(())
}

/// Handles `run`: drives pending tasks until the queue is empty
async fn handle_run(config: &Config) -> anyhow::Result<()> {
    let mut manager = TaskManager::from_config(config)?;
    let pending = manager.pending_tasks(1)?;
    tracing::info!("{} pending tasks on the first page", pending.len());

    manager.run().await;
    report(&manager.status());
    Ok(())
}

/// Handles `tasks`: prints one page of the task listing
fn handle_tasks(config: &Config, all: bool, page: u32, json: bool) -> anyhow::Result<()> {
    let manager = TaskManager::from_config(config)?;
    let tasks = if all {
        manager.all_tasks(page)?
    } else {
        manager.pending_tasks(page)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks on page {}", page);
        return Ok(());
    }

    println!(
        "{:>6}  {:<22} {:<30} {:>6} {:>10}  {}",
        "ID", "KIND", "TARGET", "PAGE", "AFTER", "STATE"
    );
    for task in &tasks {
        println!("{}", task_line(task));
    }
    Ok(())
}

fn task_line(task: &Task) -> String {
    let state = if task.is_completed {
        "done"
    } else if task.start_date.is_some() {
        "started"
    } else {
        "pending"
    };
    format!(
        "{:>6}  {:<22} {:<30} {:>6} {:>10}  {}",
        task.id,
        task.kind.to_string(),
        task.target(),
        task.current_page,
        task.last_processed,
        state
    )
}

fn report(status: &ManagerStatus) {
    match status {
        ManagerStatus::Blocked { error } => eprintln!("✗ {}", error),
        other => println!("✓ {}", other),
    }
}
