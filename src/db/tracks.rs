//! Track queries
//!
//! Metadata queries never pull the payload blob; the blob is fetched only
//! when a client asks for a specific track's audio.

use crate::error::Result;
use crate::library::Track;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// List all track metadata, ordered by upload time then id
pub async fn list(pool: &SqlitePool) -> Result<Vec<Track>> {
    let rows = sqlx::query_as::<_, (String, String, i64, DateTime<Utc>)>(
        r#"
        SELECT id, name, size, uploaded_at
        FROM tracks
        ORDER BY uploaded_at ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, size, uploaded_at)| Track {
            id,
            name,
            size,
            uploaded_at,
        })
        .collect())
}

/// Insert a new track with its payload
pub async fn insert(pool: &SqlitePool, track: &Track, payload: &[u8]) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracks (id, name, size, uploaded_at, data)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&track.id)
    .bind(&track.name)
    .bind(track.size)
    .bind(track.uploaded_at)
    .bind(payload)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a track's payload blob, if present
pub async fn payload(pool: &SqlitePool, id: &str) -> Result<Option<Vec<u8>>> {
    let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT data FROM tracks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(data,)| data))
}

/// Check whether a track id is still present
pub async fn exists(pool: &SqlitePool, id: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tracks WHERE id = ?)")
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(exists)
}
