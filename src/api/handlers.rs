//! HTTP request handlers
//!
//! JSON endpoints for the library, the play queue, and transport control,
//! plus the multipart upload endpoint.

use crate::api::server::AppContext;
use crate::error::{Error, Result};
use crate::events::PlayerEvent;
use crate::library::Track;
use crate::playback::{PlayerSnapshot, RepeatMode};
use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct SongsResponse {
    success: bool,
    songs: Vec<Track>,
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct SongResponse {
    success: bool,
    id: String,
    name: String,
    audio_base64: String,
    size: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    success: bool,
    uploaded: Vec<String>,
    errors: Vec<UploadError>,
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadError {
    filename: String,
    error: String,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    success: bool,
    count: usize,
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    track_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TracksRequest {
    track_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayBulkRequest {
    /// Optional case-insensitive substring filter on display name
    query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddedResponse {
    added: bool,
}

#[derive(Debug, Serialize)]
pub struct AddedCountResponse {
    added: usize,
}

#[derive(Debug, Serialize)]
pub struct MovedResponse {
    moved: bool,
}

#[derive(Debug, Serialize)]
pub struct PlayingResponse {
    playing: bool,
}

#[derive(Debug, Serialize)]
pub struct RepeatResponse {
    repeat: RepeatMode,
}

#[derive(Debug, Deserialize)]
pub struct TransportRequest {
    playing: bool,
}

// ============================================================================
// Health
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tonearm".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Library
// ============================================================================

/// GET /api/songs - List all tracks in the library
pub async fn list_songs(State(ctx): State<AppContext>) -> Json<SongsResponse> {
    let songs = ctx.library.all().await;
    let count = songs.len();
    Json(SongsResponse {
        success: true,
        songs,
        count,
    })
}

/// GET /api/song/:id - Fetch one track's payload, base64-encoded
pub async fn get_song(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<SongResponse>> {
    let payload = crate::db::tracks::payload(&ctx.db, &id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("song {}", id)))?;

    let name = ctx
        .library
        .get(&id)
        .await
        .map(|t| t.name)
        .unwrap_or_else(|| id.clone());

    Ok(Json(SongResponse {
        success: true,
        id,
        name,
        size: payload.len(),
        audio_base64: BASE64.encode(&payload),
    }))
}

/// POST /api/upload - Multipart MP3 upload
///
/// Files are accepted or rejected individually; one bad file does not sink
/// the batch.
pub async fn upload(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut uploaded = Vec::new();
    let mut errors = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Upload(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        let is_mp3 = filename.to_lowercase().ends_with(".mp3")
            || matches!(field.content_type(), Some("audio/mpeg" | "audio/mp3"));
        if !is_mp3 {
            errors.push(UploadError {
                filename,
                error: "only MP3 files are accepted".to_string(),
            });
            continue;
        }

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                errors.push(UploadError {
                    filename,
                    error: format!("transfer failed: {}", e),
                });
                continue;
            }
        };

        if data.is_empty() {
            errors.push(UploadError {
                filename,
                error: "empty file".to_string(),
            });
            continue;
        }

        let name = match filename.len().checked_sub(4) {
            Some(cut) if filename.as_bytes()[cut..].eq_ignore_ascii_case(b".mp3") => {
                filename[..cut].to_string()
            }
            _ => filename.clone(),
        };
        let track = Track {
            id: format!("song:{}", Uuid::new_v4()),
            name,
            size: data.len() as i64,
            uploaded_at: Utc::now(),
        };

        match ctx.library.add(track, &data).await {
            Ok(()) => uploaded.push(filename),
            Err(e) => {
                warn!("Failed to store upload {}: {}", filename, e);
                errors.push(UploadError {
                    filename,
                    error: e.to_string(),
                });
            }
        }
    }

    if !uploaded.is_empty() {
        ctx.events.emit_lossy(PlayerEvent::LibraryChanged {
            count: ctx.library.len().await,
        });
    }
    info!(
        "Upload batch: {} accepted, {} rejected",
        uploaded.len(),
        errors.len()
    );

    let count = uploaded.len();
    Ok(Json(UploadResponse {
        success: true,
        uploaded,
        errors,
        count,
    }))
}

/// POST /api/library/reload - Re-read the library from storage
pub async fn reload_library(State(ctx): State<AppContext>) -> Result<Json<ReloadResponse>> {
    let count = ctx.library.reload().await?;
    ctx.events
        .emit_lossy(PlayerEvent::LibraryChanged { count });
    Ok(Json(ReloadResponse {
        success: true,
        count,
    }))
}

// ============================================================================
// Queue management
// ============================================================================

/// GET /api/player/state - Full player snapshot
pub async fn get_state(State(ctx): State<AppContext>) -> Json<PlayerSnapshot> {
    Json(ctx.player.snapshot().await)
}

/// POST /api/player/enqueue - Append one track to the queue
pub async fn enqueue(
    State(ctx): State<AppContext>,
    Json(req): Json<TrackRequest>,
) -> Result<Json<AddedResponse>> {
    let track = ctx
        .library
        .get(&req.track_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("track {}", req.track_id)))?;

    let added = ctx.player.enqueue(track).await;
    Ok(Json(AddedResponse { added }))
}

/// POST /api/player/enqueue_many - Batch-enqueue selected tracks
pub async fn enqueue_many(
    State(ctx): State<AppContext>,
    Json(req): Json<TracksRequest>,
) -> Json<AddedCountResponse> {
    let tracks = ctx.library.get_many(&req.track_ids).await;
    let added = ctx.player.enqueue_many(tracks).await;
    Json(AddedCountResponse { added })
}

/// DELETE /api/player/queue/:index - Remove the queue entry at index
///
/// Out-of-bounds indices are a silent no-op.
pub async fn dequeue(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> Json<StatusResponse> {
    let removed = ctx.player.dequeue(index).await;
    Json(StatusResponse {
        status: if removed { "removed" } else { "noop" }.to_string(),
    })
}

/// POST /api/player/queue/clear - Empty the queue and stop playback
pub async fn clear_queue(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.player.clear().await;
    Json(StatusResponse {
        status: "cleared".to_string(),
    })
}

/// POST /api/player/shuffle - Shuffle the queue, current track stays first
pub async fn shuffle(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let changed = ctx.player.shuffle().await;
    Json(StatusResponse {
        status: if changed { "shuffled" } else { "noop" }.to_string(),
    })
}

// ============================================================================
// Playback control
// ============================================================================

/// POST /api/player/play_now - Replace the queue with one track and play
pub async fn play_now(
    State(ctx): State<AppContext>,
    Json(req): Json<TrackRequest>,
) -> Result<Json<StatusResponse>> {
    let track = ctx
        .library
        .get(&req.track_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("track {}", req.track_id)))?;

    ctx.player.play_now(track).await?;
    Ok(Json(StatusResponse {
        status: "playing".to_string(),
    }))
}

/// POST /api/player/play_all - Replace the queue with the (filtered)
/// library and play from the top
pub async fn play_all(
    State(ctx): State<AppContext>,
    req: Option<Json<PlayBulkRequest>>,
) -> Result<Json<StatusResponse>> {
    let tracks = bulk_tracks(&ctx, req).await;
    ctx.player.play_all(tracks).await?;
    Ok(Json(StatusResponse {
        status: "playing".to_string(),
    }))
}

/// POST /api/player/shuffle_all - Like play_all but with a shuffled copy
pub async fn shuffle_all(
    State(ctx): State<AppContext>,
    req: Option<Json<PlayBulkRequest>>,
) -> Result<Json<StatusResponse>> {
    let tracks = bulk_tracks(&ctx, req).await;
    ctx.player.shuffle_all(tracks).await?;
    Ok(Json(StatusResponse {
        status: "playing".to_string(),
    }))
}

async fn bulk_tracks(ctx: &AppContext, req: Option<Json<PlayBulkRequest>>) -> Vec<Track> {
    match req.and_then(|Json(r)| r.query) {
        Some(query) if !query.is_empty() => ctx.library.filter(&query).await,
        _ => ctx.library.all().await,
    }
}

/// POST /api/player/play/:index - Jump to a queue position and play
///
/// Out-of-bounds indices are a silent no-op.
pub async fn play_at_index(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> Result<Json<StatusResponse>> {
    let moved = ctx.player.play_at_index(index).await?;
    Ok(Json(StatusResponse {
        status: if moved { "playing" } else { "noop" }.to_string(),
    }))
}

/// POST /api/player/next - Skip forward
pub async fn next(State(ctx): State<AppContext>) -> Result<Json<MovedResponse>> {
    let moved = ctx.player.next().await?;
    Ok(Json(MovedResponse { moved }))
}

/// POST /api/player/previous - Skip backward (never wraps)
pub async fn previous(State(ctx): State<AppContext>) -> Result<Json<MovedResponse>> {
    let moved = ctx.player.previous().await?;
    Ok(Json(MovedResponse { moved }))
}

/// POST /api/player/toggle_play - Pause if playing, else resume
pub async fn toggle_play(State(ctx): State<AppContext>) -> Json<PlayingResponse> {
    let playing = ctx.player.toggle_play().await;
    Json(PlayingResponse { playing })
}

/// POST /api/player/toggle_repeat - Cycle off -> all -> one -> off
pub async fn toggle_repeat(State(ctx): State<AppContext>) -> Json<RepeatResponse> {
    let repeat = ctx.player.toggle_repeat().await;
    Json(RepeatResponse { repeat })
}

// ============================================================================
// Audio element notifications
// ============================================================================

/// POST /api/player/ended - The loaded track finished playing
pub async fn track_ended(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>> {
    ctx.player.track_ended().await?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// POST /api/player/transport - Actual play/pause state of the audio element
pub async fn transport(
    State(ctx): State<AppContext>,
    Json(req): Json<TransportRequest>,
) -> Json<StatusResponse> {
    ctx.player.transport_changed(req.playing).await;
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}
