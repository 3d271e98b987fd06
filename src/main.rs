//! Tonearm - Main entry point
//!
//! Browser-based music player microservice: serves the embedded player UI,
//! the library/upload API, and the queue/playback engine over HTTP + SSE.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tonearm::api::{self, AppContext};
use tonearm::config::Config;
use tonearm::events::EventBus;
use tonearm::library::LibraryStore;
use tonearm::playback::Player;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tonearm
#[derive(Parser, Debug)]
#[command(name = "tonearm")]
#[command(about = "Browser-based music player service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "TONEARM_PORT")]
    port: u16,

    /// Sqlite database holding track metadata and payloads
    #[arg(short, long, default_value = "tonearm.db", env = "TONEARM_DB")]
    database: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tonearm=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config {
        port: args.port,
        db_path: args.database,
    };

    info!("Starting tonearm on port {}", config.port);
    info!("Database: {}", config.db_path.display());

    // Open storage and make sure the schema exists
    let db = tonearm::db::open(&config.db_path)
        .await
        .context("Failed to open database")?;
    tonearm::db::init_schema(&db)
        .await
        .context("Failed to initialize database schema")?;

    let events = EventBus::new(256);

    // Load the library; a storage failure means an empty library, not a
    // dead server
    let library = LibraryStore::new(db.clone());
    match library.reload().await {
        Ok(count) => info!("Library ready with {} tracks", count),
        Err(e) => warn!("Failed to load library, starting empty: {}", e),
    }

    let player = Arc::new(Player::new(db.clone(), events.clone()));

    let ctx = AppContext {
        library,
        player,
        db,
        events,
    };

    api::run(&config, ctx).await.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
