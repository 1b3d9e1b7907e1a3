//! wbi - Waldbrandgefahrenindex lookup for Brandenburg districts

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wbi_core::{DocumentCache, IndexConfig, IndexService};

#[derive(Parser)]
#[command(
    name = "wbi",
    version,
    about = "Forest fire danger index (Waldbrandgefahrenindex) for Brandenburg",
    long_about = "Fetches the published forest fire danger index for Brandenburg, keeps it\n\
                  in a local cache for three hours and answers per-district lookups.\n\
                  \n\
                  Examples:\n\
                    wbi                              # List all districts (default)\n\
                    wbi show Barnim                  # Risk level of one district\n\
                    wbi date                         # Publication date of the index\n\
                    wbi refresh                      # Refetch regardless of cache age\n\
                    wbi status                       # Cache location, age and staleness\n\
                    wbi watch --interval 600         # Keep refreshing, log every change\n\
                  \n\
                  Environment Variables:\n\
                    WBI_CONFIG                       # Path to config.toml\n\
                    WBI_SOURCE_URL                   # Override the index URL\n\
                    WBI_CACHE_PATH                   # Override the cache file\n\
                    WBI_CACHE_TTL                    # Cache lifetime in seconds\n\
                    WBI_FORMAT                       # Force output format: json|table\n\
                    WBI_NO_COLOR                     # Disable ANSI colors\n\
                    WBI_LOG / RUST_LOG               # Log filter directives"
)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Config file (default: <config dir>/wbi/config.toml)
    #[arg(long, env = "WBI_CONFIG")]
    config: Option<PathBuf>,

    /// URL of the index document
    #[arg(long, env = "WBI_SOURCE_URL")]
    source_url: Option<String>,

    /// Cache file location
    #[arg(long, env = "WBI_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Cache lifetime in seconds
    #[arg(long, env = "WBI_CACHE_TTL")]
    cache_ttl: Option<u64>,

    /// Force output format (json|table)
    #[arg(long, env = "WBI_FORMAT", value_parser = ["json", "table"])]
    format: Option<String>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "WBI_NO_COLOR")]
    no_color: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// List every district with its risk level (default)
    List,

    /// Show the risk level of one district
    Show {
        /// District name, case-insensitive (default: configured district)
        district: Option<String>,
    },

    /// Print the publication date of the index
    Date,

    /// Refetch the index regardless of cache age
    Refresh,

    /// Show cache and index status
    Status,

    /// Delete the cached document and exit
    ClearCache,

    /// Refresh periodically and log index events until Ctrl-C
    Watch {
        /// Seconds between refresh attempts
        #[arg(long, default_value = "900")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let json = cli.format.as_deref() == Some("json");
    let no_color = cli.no_color;

    match cli.mode.unwrap_or(Mode::List) {
        Mode::List => run_list(config, json, no_color).await?,
        Mode::Show { district } => run_show(config, district, json).await?,
        Mode::Date => run_date(config, json).await?,
        Mode::Refresh => run_refresh(config, json).await?,
        Mode::Status => run_status(config, json).await?,
        Mode::ClearCache => run_clear_cache(config)?,
        Mode::Watch { interval } => run_watch(config, interval).await?,
    }

    Ok(())
}

/// `WBI_LOG` > `RUST_LOG` > verbosity default
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "wbi=info,wbi_core=info"
    } else {
        "wbi=warn,wbi_core=warn"
    };

    let filter = std::env::var("WBI_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Defaults, then the config file, then flags and env vars
fn load_config(cli: &Cli) -> Result<IndexConfig> {
    let path = cli.config.clone().or_else(default_config_path);

    let mut config = match path {
        Some(path) => IndexConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => IndexConfig::default(),
    };

    if let Some(url) = &cli.source_url {
        config.source_url = url.clone();
    }
    if let Some(cache_path) = &cli.cache_path {
        config.cache_path = cache_path.clone();
    }
    if let Some(ttl) = cli.cache_ttl {
        config.cache_ttl_secs = ttl;
    }

    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wbi").join("config.toml"))
}

async fn open_index(config: IndexConfig) -> Result<IndexService> {
    IndexService::from_config(config)
        .await
        .context("Failed to load the forest fire index")
}

async fn run_list(config: IndexConfig, json: bool, no_color: bool) -> Result<()> {
    let index = open_index(config).await?;
    println!("{}", cli::format_index_table(&index.snapshot(), json, no_color));
    Ok(())
}

async fn run_show(config: IndexConfig, district: Option<String>, json: bool) -> Result<()> {
    let query = district.unwrap_or_else(|| config.default_district.clone());
    let index = open_index(config).await?;

    let snapshot = index.snapshot();
    let name = cli::resolve_district(snapshot.districts(), &query)?;
    let risk = snapshot
        .lookup(&name)
        .with_context(|| format!("District {} vanished from the index", name))?;

    println!("{}", cli::format_district(&name, &risk, json));
    Ok(())
}

async fn run_date(config: IndexConfig, json: bool) -> Result<()> {
    let index = open_index(config).await?;
    println!("{}", cli::format_date(index.last_updated().as_deref(), json));
    Ok(())
}

async fn run_refresh(config: IndexConfig, json: bool) -> Result<()> {
    let spinner = (!json).then(|| {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner.set_message(format!("Fetching {}...", config.source_url));
        spinner
    });

    let opened = IndexService::from_config_refreshed(config)
        .await
        .context("Failed to load the forest fire index");

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let (index, report) = opened?;
    println!("{}", cli::format_refresh_report(&report, json));
    if !json {
        println!("{}", cli::format_date(index.last_updated().as_deref(), false));
    }

    Ok(())
}

async fn run_status(config: IndexConfig, json: bool) -> Result<()> {
    let index = open_index(config).await?;
    println!("{}", cli::format_status(&index.status(), json));
    Ok(())
}

fn run_clear_cache(config: IndexConfig) -> Result<()> {
    let cache = DocumentCache::new(config.cache_path);

    let removed = cache
        .clear()
        .with_context(|| format!("Failed to delete {}", cache.path().display()))?;

    if removed {
        println!("✓ Cache cleared: {}", cache.path().display());
    } else {
        println!("Cache not found at: {}", cache.path().display());
        println!("   Nothing to clear.");
    }

    Ok(())
}

async fn run_watch(config: IndexConfig, interval_secs: u64) -> Result<()> {
    anyhow::ensure!(interval_secs > 0, "--interval must be greater than 0");

    let index = open_index(config).await?;
    let mut events = index.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately, initialization already covered it
    ticker.tick().await;

    println!(
        "Watching {} ({} districts, every {}s), Ctrl-C to stop",
        index.config().source_url,
        index.snapshot().len(),
        interval_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = index.refresh().await;
                info!(fetch = ?report.fetch, reloaded = report.reloaded, "Scheduled refresh");
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", cli::format_event(&event)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event consumer lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }

    Ok(())
}
