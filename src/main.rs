use catalog_sync::cache::CacheRead;
use catalog_sync::config::Config;
use catalog_sync::events::{CatalogEvent, EventChannel, SourceKind};
use catalog_sync::logging;
use catalog_sync::submit::{Lead, LeadSender};
use catalog_sync::SourceResolver;
use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "catalog-sync")]
#[command(about = "Load the equipment catalog and submit leads")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/catalog-sync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Directory for the log file (default: $XDG_DATA_HOME/catalog-sync)
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load the catalog through cache, remote endpoint and bundled file
  Load {
    /// Skip the cache freshness check
    #[arg(short, long)]
    force: bool,
  },
  /// Show what the cache currently holds
  Inspect,
  /// Submit a lead read from a JSON file
  SendLead {
    /// JSON file with the lead fields
    file: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let log_dir = match args.log_dir {
    Some(dir) => dir,
    None => logging::default_dir()?,
  };
  let _log_guard = logging::init(&log_dir, &Config::log_filter())?;

  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::Load { force } => load(&config, force).await,
    Command::Inspect => inspect(&config),
    Command::SendLead { file } => send_lead(&config, &file).await,
  }
}

async fn load(config: &Config, force: bool) -> Result<()> {
  let events = EventChannel::new();
  let mut subscription = events.subscribe();
  let resolver = SourceResolver::from_config(config, events)?;

  let resolved = resolver.resolve(force).await?;
  println!(
    "{} items, {} categories (version {:?}) from {}{}",
    resolved.payload.items.len(),
    resolved.payload.categories.len(),
    resolved.payload.last_updated,
    resolved.provenance,
    if resolved.is_cached() { " (cached)" } else { "" }
  );

  // Let the background refresh finish before the process exits
  resolver.settle().await;

  while let Some(event) = subscription.try_next() {
    match event {
      CatalogEvent::SourceResolved {
        source: SourceKind::RemoteFailed,
        message,
      } => println!(
        "remote catalog unavailable: {}",
        message.unwrap_or_default()
      ),
      CatalogEvent::SourceResolved {
        source: SourceKind::Local,
        ..
      } => println!("serving bundled catalog"),
      CatalogEvent::SourceResolved { .. } => {}
      CatalogEvent::CatalogChanged => println!("catalog changed upstream; reload to see it"),
    }
  }

  Ok(())
}

fn inspect(config: &Config) -> Result<()> {
  let resolver = SourceResolver::from_config(config, EventChannel::new())?;
  let store = resolver.store();

  match store.read() {
    CacheRead::Absent => println!("{}: empty", store.key()),
    CacheRead::Corrupt(reason) => println!("{}: corrupt ({})", store.key(), reason),
    CacheRead::Hit(entry) => {
      let age = Utc::now() - entry.fetched_at;
      println!(
        "{}: {} items from {}, version {:?}, {} minutes old ({})",
        store.key(),
        entry.payload.items.len(),
        entry.source,
        entry.payload.last_updated,
        age.num_minutes(),
        if store.is_fresh(&entry) { "fresh" } else { "stale" }
      );
    }
  }

  Ok(())
}

async fn send_lead(config: &Config, file: &Path) -> Result<()> {
  let contents = std::fs::read_to_string(file)
    .map_err(|e| eyre!("Failed to read lead file {}: {}", file.display(), e))?;
  let lead: Lead = serde_json::from_str(&contents)
    .map_err(|e| eyre!("Failed to parse lead file {}: {}", file.display(), e))?;

  let sender = LeadSender::from_config(&config.leads)?;
  let result = sender.submit(lead).await?;

  if result.opaque {
    println!("Lead sent. The endpoint response could not be read; check the endpoint's execution log to confirm delivery.");
  } else {
    println!("Lead sent.");
  }

  Ok(())
}
