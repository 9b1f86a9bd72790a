//! bidwatch CLI
//!
//! Runs monitoring cycles over a TOML configuration, once or on an interval.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bidwatch::{
    AppError, Monitor, Result,
    models::{BidItem, Config},
    notify::{BatchSummary, NotificationDispatcher},
    pipeline::{CycleOutcome, LogObserver, RelevanceStats},
    storage::{BidStore, JsonFileStore},
    utils::truncate_chars,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// bidwatch - Tender Announcement Monitor
#[derive(Parser, Debug)]
#[command(
    name = "bidwatch",
    version,
    about = "Watches tender boards for keyword matches and sends notifications"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "bidwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single monitoring cycle
    Run,

    /// Run cycles on an interval until Ctrl-C
    Watch {
        /// Seconds between the end of one cycle and the start of the next
        #[arg(long, default_value_t = 1800)]
        interval_secs: u64,
    },

    /// Validate the configuration file
    Validate,

    /// Show configured sources and store state
    Info,

    /// Forget every seen announcement
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Send a sample notification through every channel
    TestNotify,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn open_store(config: &Config) -> Result<Arc<dyn BidStore>> {
    Ok(Arc::new(JsonFileStore::open(&config.store.path).await?))
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn report(outcome: &CycleOutcome) {
    log::info!(
        "Cycle {} in {}s: {} new, {} re-sent, {} notified",
        outcome.state,
        (outcome.finished_at - outcome.started_at).num_seconds(),
        outcome.new_count,
        outcome.retried_count,
        outcome.notified_count
    );
    if outcome.relevance.checked() {
        report_relevance(&outcome.relevance);
    }
    for failed in &outcome.failed_sources {
        log::warn!("  ✗ {}: {}", failed.name, failed.error);
    }
    for (channel, error) in outcome.dispatch.failures() {
        log::warn!("  ✗ channel {}: {}", channel, error);
    }
}

fn report_relevance(stats: &RelevanceStats) {
    const SHOWN: usize = 5;

    log::info!(
        "Relevance: {} keyword match(es), {} approved, {} rejected",
        stats.keyword_matched,
        stats.approved.len(),
        stats.rejected.len()
    );
    for decision in stats.approved.iter().take(SHOWN) {
        log::info!("  ✓ {} ({})", truncate_chars(&decision.title, 35), decision.reason);
    }
    for decision in stats.rejected.iter().take(SHOWN) {
        log::info!("  ✗ {} ({})", truncate_chars(&decision.title, 35), decision.reason);
    }
    let hidden = stats.approved.len().saturating_sub(SHOWN)
        + stats.rejected.len().saturating_sub(SHOWN);
    if hidden > 0 {
        log::info!("  ... {} more", hidden);
    }
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received; finishing the current step...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run => {
            let config = load_config(&cli.config)?;
            let mut monitor = Monitor::from_config(&config, open_store(&config).await?)?;

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let outcome = monitor.run_cycle(&cancel, &LogObserver).await?;
            report(&outcome);
        }

        Command::Watch { interval_secs } => {
            let config = load_config(&cli.config)?;
            let mut monitor = Monitor::from_config(&config, open_store(&config).await?)?;
            let interval = Duration::from_secs(interval_secs.max(1));

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            loop {
                let outcome = monitor.run_cycle(&cancel, &LogObserver).await?;
                report(&outcome);
                if cancel.is_cancelled() {
                    break;
                }

                log::info!("Next cycle in {}s", interval.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            log::info!("Watch stopped");
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = load_config(&cli.config)?;

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} source(s), {} channel(s))",
                config.sources.len(),
                config.notify.channels.len()
            );
        }

        Command::Info => {
            let config = Config::load_or_default(&cli.config);
            log::info!("Sources:");
            for source in &config.sources {
                log::info!(
                    "  {} {} [{}] {}",
                    if source.enabled { "●" } else { "○" },
                    source.name,
                    source.mode().as_str(),
                    source.url
                );
            }
            let channels: Vec<_> = config.notify.channels.iter().map(|c| c.kind()).collect();
            if channels.is_empty() {
                log::warn!("Channels: none");
            } else {
                log::info!("Channels: {}", channels.join(", "));
            }

            let store = open_store(&config).await?;
            log::info!(
                "Store {}: {} record(s), {} pending",
                config.store.path.display(),
                store.len().await?,
                store.pending().await?.len()
            );
        }

        Command::Clear { yes } => {
            if !yes {
                return Err(AppError::validation(
                    "refusing to clear the store without --yes",
                ));
            }
            let config = Config::load_or_default(&cli.config);
            let removed = open_store(&config).await?.clear_all().await?;
            log::info!("Removed {} record(s)", removed);
        }

        Command::TestNotify => {
            let config = load_config(&cli.config)?;
            let dispatcher = NotificationDispatcher::from_config(&config.notify)?;
            if dispatcher.channel_count() == 0 {
                return Err(AppError::config("no notification channels configured"));
            }

            let sample = BidItem::new(
                "bidwatch test notification",
                "https://example.com/",
                Local::now().date_naive(),
                "bidwatch",
            );
            let summary = BatchSummary::from_items(&[sample], config.notify.sample_limit);
            let report = dispatcher.dispatch_summary(&summary).await;

            for result in &report.results {
                match &result.result {
                    Ok(()) => log::info!("  ✓ {}", result.channel),
                    Err(e) => log::error!("  ✗ {}: {}", result.channel, e),
                }
            }
            if !report.any_success() {
                return Err(AppError::config("every channel failed"));
            }
        }
    }

    Ok(())
}
