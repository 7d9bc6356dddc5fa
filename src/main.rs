//! invsync - Device inventory import
//!
//! Command-line entry point: resolves configuration, opens the store, reads
//! the CSV export and drives one import run. Failures before the row loop
//! (unreadable input, unopenable store) abort the run with no snapshot;
//! per-row failures are handled inside the run and never abort it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invsync::import::source;
use invsync::{run_import, Config, Store};

/// Command-line arguments for invsync
#[derive(Parser, Debug)]
#[command(name = "invsync")]
#[command(about = "Reconcile a device inventory CSV export against the device registry")]
#[command(version)]
struct Args {
    /// Path to the inventory CSV export
    #[arg(short, long, env = "INVSYNC_INPUT")]
    input: PathBuf,

    /// Path to the registry database (overrides config file)
    #[arg(short, long, env = "INVSYNC_DATABASE")]
    database: Option<PathBuf>,

    /// Optional TOML config file (database path, collection-name bindings)
    #[arg(short, long, env = "INVSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting invsync {}", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve(args.database, args.config.as_deref())
        .context("Failed to resolve configuration")?;
    info!("Database: {}", config.database.display());

    // Pre-run setup: any failure here is fatal and writes no snapshot
    let records = source::read_records(&args.input)
        .with_context(|| format!("Failed to read input file {}", args.input.display()))?;

    let store = Store::open(&config.database, config.collections.clone())
        .await
        .context("Failed to open the registry store")?;

    let summary = run_import(&store, &records)
        .await
        .context("Import run failed")?;

    info!(
        update = %summary.doc_id,
        "Run snapshot persisted ({} devices total, {} new, {} changed, {} invalid change attempts, {} skipped, {} errors)",
        summary.total_devices,
        summary.new_devices,
        summary.changed_devices,
        summary.attempted_invalid_changes,
        summary.skipped_rows,
        summary.error_count,
    );

    store.close().await;

    Ok(())
}
