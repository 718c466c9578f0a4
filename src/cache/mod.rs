//! Multi-tier cache: one facade over three specialized stores (§4.3).

pub mod album_year;
pub mod api_response;
pub mod generic;
pub mod policy;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use generic::CacheError;

use crate::domain::{AlbumCacheEntry, CachedApiResult, Track};
use crate::utils::hashing::hash_generic_key;

use album_year::AlbumYearCache;
use api_response::ApiResponseCache;
use generic::GenericCache;
pub use policy::CachePolicy;

const ALL_TRACKS_SNAPSHOT_KEY: &str = "snapshot:all_tracks";

fn artist_snapshot_key(artist: &str) -> String {
    hash_generic_key(&format!("snapshot:artist:{artist}"))
}

pub struct CacheOrchestrator {
    generic: Arc<GenericCache>,
    generic_cache_path: PathBuf,
    album_year: Arc<AlbumYearCache>,
    api_response: Arc<ApiResponseCache>,
    generic_default_ttl: u64,
    negative_result_ttl: u64,
    sweeper: std::sync::Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
}

impl CacheOrchestrator {
    pub fn new(
        album_year_path: impl Into<PathBuf>,
        api_response_path: impl Into<PathBuf>,
        generic_cache_path: impl Into<PathBuf>,
        max_generic_entries: usize,
        generic_default_ttl: u64,
        negative_result_ttl: u64,
    ) -> Self {
        Self {
            generic: Arc::new(GenericCache::new(max_generic_entries)),
            generic_cache_path: generic_cache_path.into(),
            album_year: Arc::new(AlbumYearCache::new(album_year_path)),
            api_response: Arc::new(ApiResponseCache::new(api_response_path)),
            generic_default_ttl,
            negative_result_ttl,
            sweeper: std::sync::Mutex::new(None),
        }
    }

    pub async fn load_from_disk(&self) -> Result<(), CacheError> {
        self.album_year.load().await?;
        self.api_response.load().await?;
        self.generic.load_from_disk(&self.generic_cache_path).await?;
        Ok(())
    }

    pub async fn get_album_year(&self, artist: &str, album: &str) -> Option<AlbumCacheEntry> {
        self.album_year.get(artist, album).await
    }

    pub async fn store_album_year(&self, entry: AlbumCacheEntry) -> Result<(), CacheError> {
        self.album_year.set(entry).await
    }

    pub async fn get_api_result(&self, source: &str, artist: &str, album: &str) -> Option<CachedApiResult> {
        self.api_response.get(source, artist, album).await
    }

    pub async fn store_api_result(&self, result: CachedApiResult) -> Result<(), CacheError> {
        self.api_response.set(result).await
    }

    pub async fn generic_get(&self, key: &str) -> Option<serde_json::Value> {
        self.generic.get(key).await
    }

    pub async fn generic_set(&self, key: &str, value: serde_json::Value, policy: CachePolicy) {
        let ttl = policy.ttl_seconds(self.negative_result_ttl, self.generic_default_ttl);
        self.generic.set(key, value, ttl).await;
    }

    /// Invalidates everything tied to `track`'s album: the all-tracks and
    /// per-artist generic snapshots (current artist, and `original_artist`
    /// when the invalidation follows a rename), the album-year entry, and
    /// every provider's cached result for the album.
    pub async fn invalidate_for_track(&self, track: &Track, original_artist: Option<&str>) -> Result<(), CacheError> {
        self.generic.remove(ALL_TRACKS_SNAPSHOT_KEY).await;
        self.generic.remove(&artist_snapshot_key(track.artist())).await;
        if let Some(original) = original_artist {
            self.generic.remove(&artist_snapshot_key(original)).await;
        }

        self.album_year.invalidate(track.artist(), track.album()).await?;
        self.api_response.invalidate_album(track.artist(), track.album()).await?;
        Ok(())
    }

    /// The Album-Year and API-Response caches persist on every mutation
    /// already; only the Generic Cache batches its writes, so shutdown only
    /// needs to flush that one tier to disk.
    pub async fn save_all_to_disk(&self) -> Result<(), CacheError> {
        self.generic.save_to_disk(&self.generic_cache_path).await
    }

    /// Spawns the Generic Cache's periodic expiry sweep. Cancellable; the
    /// returned guard is awaited during orchestrator shutdown.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let mut guard = self.sweeper.lock().expect("sweeper mutex poisoned");
        if guard.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let child_token = token.clone();
        let generic = Arc::clone(&self.generic);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child_token.cancelled() => break,
                    _ = ticker.tick() => {
                        generic.sweep_expired().await;
                    }
                }
            }
        });

        *guard = Some((handle, token));
    }

    pub async fn shutdown(&self) {
        let pair = self.sweeper.lock().expect("sweeper mutex poisoned").take();
        if let Some((handle, token)) = pair {
            token.cancel();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlbumCacheEntry, CachedApiResult};

    fn orchestrator(dir: &tempfile::TempDir) -> CacheOrchestrator {
        CacheOrchestrator::new(
            dir.path().join("album_years.csv"),
            dir.path().join("api_cache.json"),
            dir.path().join("generic_cache.json"),
            100,
            3600,
            86400,
        )
    }

    #[tokio::test]
    async fn album_year_roundtrips_via_orchestrator() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(&dir);
        orch.store_album_year(AlbumCacheEntry {
            artist: "Radiohead".into(),
            album: "OK Computer".into(),
            year: "1997".into(),
            timestamp: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let got = orch.get_album_year("Radiohead", "OK Computer").await.unwrap();
        assert_eq!(got.year, "1997");
    }

    #[tokio::test]
    async fn invalidate_for_track_clears_album_year_and_api_results() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(&dir);
        orch.store_album_year(AlbumCacheEntry {
            artist: "Radiohead".into(),
            album: "OK Computer".into(),
            year: "1997".into(),
            timestamp: chrono::Utc::now(),
        })
        .await
        .unwrap();
        orch.store_api_result(CachedApiResult {
            artist: "Radiohead".into(),
            album: "OK Computer".into(),
            year: Some("1997".into()),
            source: "musicbrainz".into(),
            timestamp: chrono::Utc::now(),
            ttl: None,
            metadata: serde_json::Value::Null,
            api_response: None,
        })
        .await
        .unwrap();

        let track = crate::domain::Track::new(
            "t1", "Airbag", "Radiohead", "OK Computer", None, None, None, None, None, None, None,
        )
        .unwrap();
        orch.invalidate_for_track(&track, None).await.unwrap();

        assert!(orch.get_album_year("Radiohead", "OK Computer").await.is_none());
        assert!(orch.get_api_result("musicbrainz", "Radiohead", "OK Computer").await.is_none());
    }
}
