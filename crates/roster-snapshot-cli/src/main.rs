mod commands;
mod config;
mod sources;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roster_snapshot::DownloadId;
use roster_snapshot_store::SnapshotStore;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::sources::DirectoryFetcher;

#[derive(Parser)]
#[command(name = "roster-snapshot")]
#[command(about = "Download provider snapshots into versioned epochs and manage them")]
struct Cli {
    /// Config file (defaults to ~/.config/roster-snapshot/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start a new download and fill it from the configured fixtures
    Sync {
        /// Fixture directory, overriding the config
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
    /// Continue an unpromoted download
    Resume {
        id: i64,
        /// Give exhausted endpoints a fresh retry budget first
        #[arg(long)]
        rearm: bool,
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
    /// List downloads and their states
    Epochs,
    /// Show tracked endpoints for a download
    Entries { id: i64 },
    /// Make a download current
    Promote {
        id: i64,
        /// Accept a download whose required endpoints did not all succeed
        #[arg(long)]
        allow_partial: bool,
    },
    /// Retire an unpromoted download without deleting it
    Discard { id: i64 },
    /// Delete a retired download and everything written under it
    Retire { id: i64 },
    /// Delete discarded downloads and superseded ones beyond the retention count
    Prune {
        /// Retired downloads to keep, overriding the config
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Retire open downloads that were abandoned
    Reap {
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
        /// Delete them as well
        #[arg(long)]
        delete: bool,
    },
    /// Print the current download id
    Current,
    /// Show or change the schema version
    Schema {
        /// Target version; latest when omitted
        #[arg(long)]
        to: Option<usize>,
    },
}

fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("could not determine cache directory")?;
    let dir = base.join("roster-snapshot");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;
    Ok(dir)
}

fn db_path(cli: &Cli, config: &AppConfig) -> Result<PathBuf> {
    match cli.database.as_ref().or(config.database.as_ref()) {
        Some(path) => Ok(path.clone()),
        None => Ok(cache_dir()?.join("snapshot.db")),
    }
}

fn open_store(path: &Path) -> Result<SnapshotStore> {
    SnapshotStore::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn fixture_fetcher(override_dir: Option<PathBuf>, config: &AppConfig) -> Result<DirectoryFetcher> {
    let dir = override_dir
        .or_else(|| config.fixtures.clone())
        .context("no fixture directory configured; pass --fixtures or set `fixtures` in the config")?;
    Ok(DirectoryFetcher::new(dir, config.endpoints.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(cli.config.as_deref());
    let path = db_path(&cli, &config)?;

    match cli.command {
        Command::Schema { to } => commands::schema::run(&path, to),
        Command::Sync { fixtures } => {
            let store = open_store(&path)?;
            let fetcher = fixture_fetcher(fixtures, &config)?;
            commands::sync::run(&store, &fetcher, &config.sync_options()).await
        }
        Command::Resume {
            id,
            rearm,
            fixtures,
        } => {
            let store = open_store(&path)?;
            let fetcher = fixture_fetcher(fixtures, &config)?;
            commands::sync::resume(
                &store,
                DownloadId::new(id),
                &fetcher,
                &config.sync_options(),
                rearm,
            )
            .await
        }
        Command::Epochs => commands::epochs::list(&open_store(&path)?),
        Command::Entries { id } => commands::epochs::entries(&open_store(&path)?, DownloadId::new(id)),
        Command::Promote { id, allow_partial } => {
            let mut policy = config.promotion_policy();
            policy.allow_partial |= allow_partial;
            commands::promote::run(&open_store(&path)?, DownloadId::new(id), &policy)
        }
        Command::Discard { id } => commands::epochs::discard(&open_store(&path)?, DownloadId::new(id)),
        Command::Retire { id } => commands::epochs::retire(&open_store(&path)?, DownloadId::new(id)),
        Command::Prune { keep } => commands::promote::prune(
            &open_store(&path)?,
            keep.unwrap_or(config.promotion.keep_previous),
        ),
        Command::Reap {
            older_than_hours,
            delete,
        } => commands::epochs::reap(&open_store(&path)?, older_than_hours, delete),
        Command::Current => commands::epochs::current(&open_store(&path)?),
    }
}
