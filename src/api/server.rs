//! HTTP server setup and routing

use super::{handlers, sse};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::library::LibraryStore;
use crate::playback::Player;
use axum::{
    extract::DefaultBodyLimit,
    response::Html,
    routing::{delete, get, post},
    Router,
};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Maximum accepted upload body (whole multipart request)
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub library: LibraryStore,
    pub player: Arc<Player>,
    pub db: SqlitePool,
    pub events: EventBus,
}

/// Create the API router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Player UI (embedded HTML)
        .route("/", get(|| async { Html(include_str!("player_ui.html")) }))
        // Health check
        .route("/health", get(handlers::health))
        // Library
        .route("/api/songs", get(handlers::list_songs))
        .route("/api/song/:id", get(handlers::get_song))
        .route("/api/upload", post(handlers::upload))
        .route("/api/library/reload", post(handlers::reload_library))
        // Queue management
        .route("/api/player/state", get(handlers::get_state))
        .route("/api/player/enqueue", post(handlers::enqueue))
        .route("/api/player/enqueue_many", post(handlers::enqueue_many))
        .route("/api/player/queue/:index", delete(handlers::dequeue))
        .route("/api/player/queue/clear", post(handlers::clear_queue))
        .route("/api/player/shuffle", post(handlers::shuffle))
        // Playback control
        .route("/api/player/play_now", post(handlers::play_now))
        .route("/api/player/play_all", post(handlers::play_all))
        .route("/api/player/shuffle_all", post(handlers::shuffle_all))
        .route("/api/player/play/:index", post(handlers::play_at_index))
        .route("/api/player/next", post(handlers::next))
        .route("/api/player/previous", post(handlers::previous))
        .route("/api/player/toggle_play", post(handlers::toggle_play))
        .route("/api/player/toggle_repeat", post(handlers::toggle_repeat))
        // Audio element notifications
        .route("/api/player/ended", post(handlers::track_ended))
        .route("/api/player/transport", post(handlers::transport))
        // SSE event stream
        .route("/api/events", get(sse::event_stream))
        // Attach application context
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until shutdown
pub async fn run(config: &Config, ctx: AppContext) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
