//! Lifelist Indexer - marketplace event ingestion
//!
//! This binary provides:
//! - Historical backfill over the marketplace's paginated event API
//! - Live event ingestion over the marketplace websocket
//! - Identification scoring and the per-season point ledger
//!
//! Note: The HTTP API is provided by the separate `lifelist-api` service

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lifelist-indexer")]
#[command(version, about = "Lifelist indexer for collectible transfer and sale events", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the indexer service (backfill + live stream)
    Run,

    /// Drain the historical event feed once and exit
    Backfill,

    /// Show indexer status and ledger statistics
    Status,

    /// Initialize the database
    InitDb {
        /// Database URL
        #[arg(long, default_value = "sqlite://lifelist.db")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.debug)?;

    info!("Lifelist Indexer starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Execute command
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_indexer(&cli.config).await?,
        Commands::Backfill => run_backfill_once(&cli.config).await?,
        Commands::Status => show_status(&cli.config).await?,
        Commands::InitDb { database_url } => init_database(&database_url).await?,
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("lifelist_indexer=debug,sqlx=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("lifelist_indexer=info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_line_number(true))
        .init();

    Ok(())
}

/// Load config, connect the database, and build the shared processor.
async fn bootstrap(
    config_path: &str,
) -> Result<(
    lifelist_indexer::config::Config,
    lifelist_indexer::storage::Storage,
    lifelist_indexer::ingest::EventProcessor,
)> {
    use lifelist_core::registry::SpeciesRegistry;
    use lifelist_indexer::config::Config;
    use lifelist_indexer::ingest::EventProcessor;
    use lifelist_indexer::storage::Storage;

    let config = Config::from_file(config_path).context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Chain: {} (id {})", config.network.chain, config.network.chain_id);
    info!("  Contract: {}", config.network.contract_address);
    info!("  Season: {}", config.season.active);
    info!("  Database: {}", config.database.url);

    let storage = Storage::new(
        &config.database.url,
        Some(config.database.max_connections),
        Some(config.database.min_connections),
    )
    .await
    .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    info!("Database initialized");

    let registry = SpeciesRegistry::from_dir(&config.registry.species_dir)
        .context("Failed to load species registry")?;
    info!("Species registry loaded ({} tokens)", registry.len());

    let processor = EventProcessor::new(storage.clone(), Arc::new(registry), &config.season);

    Ok((config, storage, processor))
}

/// Main indexer service - runs backfill polling and the live stream
async fn run_indexer(config_path: &str) -> Result<()> {
    use lifelist_indexer::ingest::{BackfillAdapter, StreamAdapter};

    info!("Starting indexer service with config: {}", config_path);

    let (config, storage, processor) = bootstrap(config_path).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn the backfill polling task
    let backfill = BackfillAdapter::new(
        config.backfill.clone(),
        storage.clone(),
        processor.clone(),
    );
    let backfill_shutdown = shutdown_rx.clone();
    let backfill_handle = tokio::spawn(async move { backfill.run(backfill_shutdown).await });

    info!(
        "Backfill adapter started (poll interval: {}s)",
        config.backfill.poll_interval_secs
    );

    // Spawn the live stream task when enabled
    let stream_handle = if config.stream.enabled {
        let stream = StreamAdapter::new(
            config.stream.clone(),
            config.network.clone(),
            processor.clone(),
        );
        let stream_shutdown = shutdown_rx.clone();
        info!("Live stream adapter started");
        Some(tokio::spawn(async move { stream.run(stream_shutdown).await }))
    } else {
        info!("Live stream disabled, relying on backfill polling only");
        None
    };

    info!("Indexer is running. Press Ctrl+C to stop.");
    info!("For API queries, run the lifelist-api service separately.");

    // Wait for either Ctrl+C or task failures
    let result = if let Some(stream_handle) = stream_handle {
        tokio::select! {
            result = backfill_handle => task_exit("Backfill adapter", result),
            result = stream_handle => task_exit("Stream adapter", result),
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received shutdown signal, gracefully shutting down...");
                let _ = shutdown_tx.send(true);
                Ok(())
            }
        }
    } else {
        tokio::select! {
            result = backfill_handle => task_exit("Backfill adapter", result),
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received shutdown signal, gracefully shutting down...");
                let _ = shutdown_tx.send(true);
                Ok(())
            }
        }
    };

    storage.close().await;
    result
}

/// Map a finished adapter task to the service result.
fn task_exit(name: &str, result: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(Ok(())) => {
            warn!("{} exited unexpectedly", name);
            Ok(())
        }
        Ok(Err(e)) => Err(e).with_context(|| format!("{} failed", name)),
        Err(e) => Err(anyhow::anyhow!("{} task panicked: {}", name, e)),
    }
}

/// Drain the historical feed once and exit
async fn run_backfill_once(config_path: &str) -> Result<()> {
    use lifelist_indexer::ingest::BackfillAdapter;

    info!("One-shot backfill triggered");

    let (config, storage, processor) = bootstrap(config_path).await?;

    let backfill = BackfillAdapter::new(config.backfill.clone(), storage.clone(), processor);
    let result = backfill.drain().await;

    storage.close().await;
    result
}

/// Show indexer status and ledger statistics
async fn show_status(config_path: &str) -> Result<()> {
    use lifelist_indexer::config::Config;
    use lifelist_indexer::storage::Storage;

    info!("Checking indexer status");

    // Try to load configuration, fall back to default database ONLY if file doesn't exist
    let (database_url, max_conn, min_conn) = match Config::from_file(config_path) {
        Ok(config) => {
            info!("Using database from config: {}", config.database.url);
            (
                config.database.url,
                Some(config.database.max_connections),
                Some(config.database.min_connections),
            )
        }
        Err(e) => {
            // Walk the error chain because Config::from_file wraps errors with context
            let is_not_found = e.chain().any(|cause| {
                if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                    io_err.kind() == std::io::ErrorKind::NotFound
                } else {
                    false
                }
            });

            if is_not_found {
                info!("Config file not found, using default database: sqlite://lifelist.db");
                ("sqlite://lifelist.db".to_string(), None, None)
            } else {
                return Err(e).context("Failed to load config file");
            }
        }
    };

    let storage = Storage::new(&database_url, max_conn, min_conn)
        .await
        .context("Failed to connect to database")?;

    // Run migrations to ensure schema exists (handles fresh database)
    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    let stats = storage.stats().await?;
    let cursor = storage.get_backfill_cursor("marketplace-events").await?;

    println!("\n=== Lifelist Indexer Status ===\n");
    println!("Ledger Statistics:");
    println!("  Point Records: {}", stats.point_count);
    println!("  Players: {}", stats.player_count);
    println!("  Streak Rows: {}", stats.streak_count);

    println!("\nBackfill:");
    match cursor {
        Some(cursor) => println!("  Resume cursor: {}", cursor),
        None => println!("  Resume cursor: none (drained or never run)"),
    }

    println!();

    storage.close().await;

    Ok(())
}

/// Initialize the database
async fn init_database(database_url: &str) -> Result<()> {
    use lifelist_indexer::storage::Storage;

    info!("Initializing database: {}", database_url);

    let storage = Storage::new(database_url, None, None)
        .await
        .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    storage
        .health_check()
        .await
        .context("Database health check failed")?;

    let stats = storage.stats().await?;
    info!("Database initialized successfully!");
    info!("  Point Records: {}", stats.point_count);
    info!("  Players: {}", stats.player_count);
    info!("  Streak Rows: {}", stats.streak_count);

    storage.close().await;

    Ok(())
}
