//! tasktrack: persistent task tracker with natural-language search
//!
//! Tasks are stored as one YAML file each, with finished tasks moved into a
//! `done/` subdirectory. Search embeds the query and ranks every stored task
//! by distance.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tasktrack_embed::{
    CancellationToken, MockEmbedder, OllamaConfig, OllamaEmbedder, SharedEmbedder,
};
use tasktrack_store::{FileTracker, Task, Tracker, TrackerConfig};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::{CONFIG_FILE, Config, DEFAULT_STORE_DIR, TASKTRACK_DIR, default_config_toml};

/// Persistent task tracker with natural-language search
#[derive(Parser, Debug)]
#[command(name = "tasktrack")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .tasktrack directory (default: search for .tasktrack/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Task directory override
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Write logs to .tasktrack/logs/ instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    /// Ollama base URL override
    #[arg(long, global = true, env = "TASKTRACK_OLLAMA_URL")]
    ollama_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new .tasktrack directory with config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Create or update a task under a given id
    Set {
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Mark the task as done
        #[arg(long)]
        done: bool,
    },

    /// Create a task under a generated id
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Mark the task as done
        #[arg(long)]
        done: bool,
    },

    /// Show a task
    Get { id: String },

    /// Delete a task (succeeds if it does not exist)
    Del { id: String },

    /// List tasks
    List {
        /// Only finished tasks
        #[arg(long, conflicts_with = "active")]
        done: bool,
        /// Only unfinished tasks
        #[arg(long)]
        active: bool,
    },

    /// Find tasks matching a natural-language query
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check that the embedding provider is reachable
    Health,
}

impl Commands {
    /// Maps `--done` / `--active` onto the tracker's status filter.
    fn list_filter(done: bool, active: bool) -> Option<bool> {
        match (done, active) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize logging to stderr; stdout carries command output.
fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// Initialize logging to rotating files in .tasktrack/logs/ with daily rotation.
fn init_file_logging(tasktrack_dir: &Path, verbose: bool) {
    let logs_dir = tasktrack_dir.join("logs");

    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        init_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "tasktrack.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the background writer.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(verbose))
        .init();
}

/// Load configuration from an explicit path or by discovery.
///
/// Returns the config and the path to the `.tasktrack` directory (for
/// resolving relative paths).
fn load_config(override_path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = override_path {
        let config_file = if path.is_dir() {
            path.join(CONFIG_FILE)
        } else {
            path.clone()
        };
        let tasktrack_dir = config_file.parent().unwrap_or(path).to_path_buf();
        let config = Config::from_file(&config_file)?;
        return Ok((config, Some(tasktrack_dir)));
    }

    match Config::find_and_load()? {
        Some((config, dir)) => Ok((config, Some(dir))),
        None => Ok((Config::default(), None)),
    }
}

/// Build the embedding provider named in the config.
fn create_embedder(config: &Config, ollama_url: Option<&str>) -> Result<SharedEmbedder> {
    let embedder = &config.embedder;
    match embedder.provider.as_str() {
        "ollama" => {
            let mut ollama = OllamaConfig::new()
                .with_model(&embedder.model)
                .with_timeout(Duration::from_secs(embedder.timeout_secs))
                .with_max_retries(embedder.max_retries);
            if let Some(url) = ollama_url.or(embedder.base_url.as_deref()) {
                ollama = ollama.with_base_url(url);
            }
            Ok(Arc::new(OllamaEmbedder::new(ollama)?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(embedder.dimensions))),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

/// Print a value as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel `token` when the process receives Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
}

/// Create `.tasktrack/` under `root` with a fresh config file.
///
/// Any existing config is never read, so `--force` can replace a broken one.
/// Returns the task directory the new config points at.
fn init_tasktrack_dir(root: &Path, force: bool, store_dir: Option<&Path>) -> Result<PathBuf> {
    let tasktrack_dir = root.join(TASKTRACK_DIR);
    let config_path = tasktrack_dir.join(CONFIG_FILE);

    if config_path.exists() && !force {
        anyhow::bail!(".tasktrack/config.toml already exists. Use --force to overwrite.");
    }

    if !tasktrack_dir.exists() {
        std::fs::create_dir_all(&tasktrack_dir)?;
        info!("Created {}/", tasktrack_dir.display());
    }

    let store_dir = match store_dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => std::env::current_dir()?.join(dir),
        None => PathBuf::from(DEFAULT_STORE_DIR),
    };

    std::fs::write(&config_path, default_config_toml(&store_dir))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!("Created {}", config_path.display());

    let config = Config::from_file(&config_path)?;
    Ok(config.resolve_store_dir(Some(&tasktrack_dir)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        if cli.log_file {
            init_file_logging(Path::new(TASKTRACK_DIR), cli.verbose);
        } else {
            init_logging(cli.verbose);
        }

        let store_dir = init_tasktrack_dir(Path::new("."), force, cli.dir.as_deref())?;
        tasktrack_store::TaskStorage::open(&store_dir).await?;
        info!("Task directory ready at {}", store_dir.display());
        return Ok(());
    }

    let (config, config_dir) = load_config(cli.config.as_ref())?;

    if cli.log_file {
        let dir = config_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(TASKTRACK_DIR));
        init_file_logging(&dir, cli.verbose);
    } else {
        init_logging(cli.verbose);
    }

    match &config_dir {
        Some(dir) => debug!("Found config at {}", dir.display()),
        None => debug!("No .tasktrack/config.toml found, using defaults"),
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("Invalid config: {}", error);
        }
        anyhow::bail!("Configuration has {} error(s)", errors.len());
    }

    let embedder = create_embedder(&config, cli.ollama_url.as_deref())?;

    if let Commands::Health = cli.command {
        embedder
            .health_check()
            .await
            .with_context(|| format!("Embedding provider '{}' is unreachable", embedder.name()))?;
        print_json(&serde_json::json!({
            "provider": embedder.name(),
            "status": "ok",
        }))?;
        return Ok(());
    }

    let store_dir = cli
        .dir
        .clone()
        .unwrap_or_else(|| config.resolve_store_dir(config_dir.as_deref()));

    let mut tracker_config = TrackerConfig::new().with_rank(config.rank_params());
    if let Some(timeout) = config.embed_timeout() {
        tracker_config = tracker_config.with_embed_timeout(timeout);
    }

    let tracker = FileTracker::open(&store_dir, embedder, tracker_config)
        .await
        .with_context(|| format!("Failed to open task directory {}", store_dir.display()))?;
    debug!(dir = %store_dir.display(), "Opened task store");

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    match cli.command {
        Commands::Set {
            id,
            title,
            description,
            done,
        } => {
            let task = Task::new(&id, title, description).with_done(done);
            tracker.set(&id, task.clone(), &cancel).await?;
            print_json(&task)?;
        }

        Commands::Add {
            title,
            description,
            done,
        } => {
            let id = uuid::Uuid::new_v4().to_string();
            let task = Task::new(&id, title, description).with_done(done);
            tracker.set(&id, task.clone(), &cancel).await?;
            print_json(&task)?;
        }

        Commands::Get { id } => {
            let task = tracker.get(&id, &cancel).await?;
            print_json(&task)?;
        }

        Commands::Del { id } => {
            tracker.del(&id, &cancel).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }

        Commands::List { done, active } => {
            let tasks = tracker
                .list(Commands::list_filter(done, active), &cancel)
                .await?;
            print_json(&tasks)?;
        }

        Commands::Search { query, limit } => {
            let results = match limit {
                Some(limit) => {
                    let params = tracker.config().rank.with_limit(limit);
                    tracker.search_with(&query, params, &cancel).await?
                }
                None => tracker.search(&query, &cancel).await?,
            };
            print_json(&results)?;
        }

        Commands::Init { .. } | Commands::Health => {}
    }

    Ok(())
}
