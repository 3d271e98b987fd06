//! Library store
//!
//! Holds the full set of known tracks, loaded from persistent storage at
//! startup and cached in memory. The cache is replaced wholesale on
//! reload; individual tracks are appended as uploads land.

use crate::db;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A single audio item. Immutable once created; the payload blob stays in
/// the database and is fetched on demand by the payload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier, `song:<uuid>`
    pub id: String,
    /// Display name (upload filename without extension)
    pub name: String,
    /// Payload size in bytes
    pub size: i64,
    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

/// In-memory view over the tracks table
#[derive(Clone)]
pub struct LibraryStore {
    db: SqlitePool,
    cache: Arc<RwLock<Vec<Track>>>,
}

impl LibraryStore {
    /// Create a new library store (empty until `reload` is called)
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            cache: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Replace the cache with the current table contents
    ///
    /// Returns the number of tracks loaded. On failure the cache is left
    /// empty; callers treat that as "empty library", not fatal.
    pub async fn reload(&self) -> Result<usize> {
        let tracks = match db::tracks::list(&self.db).await {
            Ok(tracks) => tracks,
            Err(e) => {
                self.cache.write().await.clear();
                return Err(e);
            }
        };

        let count = tracks.len();
        *self.cache.write().await = tracks;
        info!("Library loaded: {} tracks", count);
        Ok(count)
    }

    /// All tracks, library order
    pub async fn all(&self) -> Vec<Track> {
        self.cache.read().await.clone()
    }

    /// Case-insensitive substring match on display name, order-preserving
    pub async fn filter(&self, query: &str) -> Vec<Track> {
        let needle = query.to_lowercase();
        self.cache
            .read()
            .await
            .iter()
            .filter(|t| t.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Look up a single track by identifier
    pub async fn get(&self, id: &str) -> Option<Track> {
        self.cache.read().await.iter().find(|t| t.id == id).cloned()
    }

    /// Look up several tracks by identifier, preserving input order.
    /// Unknown identifiers are skipped.
    pub async fn get_many(&self, ids: &[String]) -> Vec<Track> {
        let cache = self.cache.read().await;
        ids.iter()
            .filter_map(|id| cache.iter().find(|t| &t.id == id).cloned())
            .collect()
    }

    /// Persist an uploaded track and append it to the cache
    pub async fn add(&self, track: Track, payload: &[u8]) -> Result<()> {
        db::tracks::insert(&self.db, &track, payload).await?;
        self.cache.write().await.push(track.clone());
        debug!("Added track {} ({} bytes)", track.id, track.size);
        Ok(())
    }

    /// Number of tracks in the cache
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> LibraryStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::init_schema(&pool).await.unwrap();
        LibraryStore::new(pool)
    }

    fn track(id: &str, name: &str) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            size: 3,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reload_replaces_cache() {
        let library = setup().await;
        library.add(track("song:1", "First"), b"abc").await.unwrap();
        library.add(track("song:2", "Second"), b"abc").await.unwrap();

        let count = library.reload().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(library.len().await, 2);

        // Reload again: wholesale replacement, not accumulation
        let count = library.reload().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(library.len().await, 2);
    }

    #[tokio::test]
    async fn test_filter_case_insensitive() {
        let library = setup().await;
        library
            .add(track("song:1", "Blue Monday"), b"abc")
            .await
            .unwrap();
        library
            .add(track("song:2", "Bluegrass Jam"), b"abc")
            .await
            .unwrap();
        library
            .add(track("song:3", "Red Rain"), b"abc")
            .await
            .unwrap();

        let hits = library.filter("blue").await;
        assert_eq!(hits.len(), 2);
        // Order-preserving
        assert_eq!(hits[0].name, "Blue Monday");
        assert_eq!(hits[1].name, "Bluegrass Jam");

        assert!(library.filter("MONDAY").await.len() == 1);
        assert!(library.filter("zzz").await.is_empty());
    }

    #[tokio::test]
    async fn test_get_many_preserves_order_and_skips_unknown() {
        let library = setup().await;
        library.add(track("song:1", "A"), b"abc").await.unwrap();
        library.add(track("song:2", "B"), b"abc").await.unwrap();

        let tracks = library
            .get_many(&[
                "song:2".to_string(),
                "song:missing".to_string(),
                "song:1".to_string(),
            ])
            .await;
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "song:2");
        assert_eq!(tracks[1].id, "song:1");
    }
}
