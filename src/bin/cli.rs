//! Showtime alerts CLI
//!
//! Local entry point: ingestion, tracking commands and engine runs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use showtime_alerts::{
    error::Result,
    models::{Config, CriterionDraft, CriterionId, Filter},
    pipeline::{self, AlertEngine, EngineOptions},
    services::{Notifier, TrackingCommands, TwilioNotifier},
    storage::{CatalogStore, LocalStorage, TrackingRegistry},
    utils::log as section,
};

/// Showtime alerts - tracks movie showtimes and notifies on new matches
#[derive(Parser, Debug)]
#[command(
    name = "showtime-alerts",
    version,
    about = "Movie showtime alert engine"
)]
struct Cli {
    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory (overrides storage.dir from the config)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a scraped showtime file into the catalog
    Ingest { file: PathBuf },

    /// Register criteria from the static alert feed
    ImportAlerts { file: PathBuf },

    /// Add or update a tracking criterion
    Track {
        #[arg(long)]
        city: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        theatre: Option<String>,
        #[arg(long)]
        format: Option<String>,
        /// Filter token, repeatable (`TIME:EVENING` for a time window)
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Destination address (e.g. whatsapp:+911234567890)
        #[arg(long)]
        to: Option<String>,
        /// Update this criterion instead of matching by city/title/theatre/destination
        #[arg(long)]
        id: Option<CriterionId>,
    },

    /// Show the current patterns of a criterion
    Status { id: CriterionId },

    /// Stop tracking a criterion (kept for history)
    Deactivate { id: CriterionId },

    /// List all criteria
    List,

    /// Run one matching and dispatch pass
    Check {
        /// Evaluate and print messages without sending
        #[arg(long)]
        dry_run: bool,

        /// Ingest this showtime file before checking
        #[arg(long)]
        feed: Option<PathBuf>,
    },

    /// Validate configuration
    Validate,

    /// Show storage summary
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => {
            let dir = cli
                .storage_dir
                .clone()
                .unwrap_or_else(|| Config::default().storage.dir);
            Config::load_or_default(dir.join("config.toml"))
        }
    };

    if let Some(dir) = &cli.storage_dir {
        config.storage.dir = dir.clone();
    }
    config.notifier = config.notifier.with_env_overrides();
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    log::debug!("Using storage at {}", config.storage.dir.display());

    let storage = Arc::new(LocalStorage::new(&config.storage.dir));
    let commands = TrackingCommands::new(storage.clone());

    match cli.command {
        Command::Ingest { file } => {
            let summary = pipeline::ingest_file(storage.as_ref(), &file).await?;
            section::summary(
                "Ingestion",
                &[
                    ("Movies", summary.movies_seen.to_string()),
                    ("Showtimes", summary.showtimes_seen.to_string()),
                    ("New records", summary.upsert.added().to_string()),
                    ("Skipped", summary.skipped.to_string()),
                ],
            );
        }

        Command::ImportAlerts { file } => {
            let outcome = pipeline::import_alert_feed(&commands, &file).await?;
            section::summary(
                "Alert feed",
                &[
                    ("Registered", outcome.registered.len().to_string()),
                    ("Skipped", outcome.skipped.to_string()),
                ],
            );
        }

        Command::Track {
            city,
            title,
            theatre,
            format,
            filters,
            to,
            id,
        } => {
            let draft = CriterionDraft {
                id,
                title_pattern: title,
                theatre_pattern: theatre,
                city,
                format_pattern: format,
                filters: Filter::parse_all(&filters)?,
                destination: to,
                reference_url: None,
            };
            let saved = commands.add_or_update_criterion(draft).await?;
            println!("#{} {}", saved.id, saved.describe());
        }

        Command::Status { id } => {
            let status = commands.get_status(id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Command::Deactivate { id } => {
            let criterion = commands.deactivate(id).await?;
            println!("#{} deactivated: {}", criterion.id, criterion.describe());
        }

        Command::List => {
            let criteria = commands.list().await?;
            section::header(&format!("{} criteria", criteria.len()));
            for c in &criteria {
                let state = if c.active { "active" } else { "inactive" };
                section::sub_item(&format!("#{} [{}] {}", c.id, state, c.describe()));
            }
        }

        Command::Check { dry_run, feed } => {
            let options = EngineOptions {
                dry_run,
                ..EngineOptions::validated(&config)?
            };
            section::header("Showtime check");
            let total = if feed.is_some() { 2 } else { 1 };

            if let Some(feed) = feed {
                section::step(1, total, &format!("Ingesting {}", feed.display()));
                pipeline::ingest_file(storage.as_ref(), &feed).await?;
            }

            section::step(total, total, "Matching criteria");
            let notifier: Option<Arc<dyn Notifier>> = if dry_run {
                None
            } else {
                match TwilioNotifier::new(&config.notifier) {
                    Ok(notifier) => Some(Arc::new(notifier) as Arc<dyn Notifier>),
                    Err(e) => {
                        log::warn!("Notifier unavailable, matches will not be sent: {}", e);
                        None
                    }
                }
            };

            let engine = AlertEngine::new(
                storage.clone(),
                storage.clone(),
                storage.clone(),
                notifier,
                options,
            );
            let report = engine.run().await?;

            section::summary(
                "Run",
                &[
                    ("Checked", report.checked.to_string()),
                    ("Matched", report.matched.to_string()),
                    ("No match", report.no_match.to_string()),
                    ("Sent", report.sent.to_string()),
                    ("Suppressed", report.suppressed.to_string()),
                    ("Skipped", report.skipped.to_string()),
                    ("Failed", report.failed.to_string()),
                ],
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if config.notifier.account_sid.is_none() || config.notifier.auth_token.is_none() {
                log::warn!("Notifier credentials not set; only dry runs will work");
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let counts = storage.counts().await?;
            let criteria = storage.list_criteria().await?;
            let active = criteria.iter().filter(|c| c.active).count();

            section::summary(
                "Storage",
                &[
                    ("Directory", storage.root_dir().display().to_string()),
                    ("Movies", counts.movies.to_string()),
                    ("Theatres", counts.theatres.to_string()),
                    ("Showtimes", counts.showtimes.to_string()),
                    ("Criteria", format!("{} ({} active)", criteria.len(), active)),
                ],
            );
        }
    }

    Ok(())
}

