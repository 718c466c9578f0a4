//! API-Response cache: one provider's verdict per `(artist, album, source)`
//! triple, persisted as JSON (§4.3.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::cache::generic::CacheError;
use crate::domain::CachedApiResult;
use crate::utils::atomic_file::{read_if_exists, write_atomic};
use crate::utils::hashing::hash_api_key;

pub struct ApiResponseCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, CachedApiResult>>,
}

impl ApiResponseCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(&self) -> Result<(), CacheError> {
        let Some(raw) = read_if_exists(&self.path).await.map_err(|e| CacheError::Io(e.to_string()))? else {
            return Ok(());
        };
        let stored: HashMap<String, CachedApiResult> =
            serde_json::from_str(&raw).map_err(|e| CacheError::Serde(e.to_string()))?;
        *self.entries.lock().await = stored;
        Ok(())
    }

    pub async fn get(&self, source: &str, artist: &str, album: &str) -> Option<CachedApiResult> {
        let key = hash_api_key(source, artist, album);
        let entries = self.entries.lock().await;
        let entry = entries.get(&key)?;

        if entry.artist != artist || entry.album != album || entry.source != source {
            return None;
        }
        if entry.is_expired(Utc::now()) {
            return None;
        }
        Some(entry.clone())
    }

    pub async fn set(&self, result: CachedApiResult) -> Result<(), CacheError> {
        let key = hash_api_key(&result.source, &result.artist, &result.album);
        {
            let mut entries = self.entries.lock().await;
            entries.insert(key, result);
        }
        self.persist().await
    }

    /// Invalidates every provider entry cached for `(artist, album)`, across
    /// all sources — used by `invalidate_for_track` (§4.3.4).
    pub async fn invalidate_album(&self, artist: &str, album: &str) -> Result<(), CacheError> {
        {
            let mut entries = self.entries.lock().await;
            entries.retain(|_, v| !(v.artist == artist && v.album == album));
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<(), CacheError> {
        let entries = self.entries.lock().await;
        let json = serde_json::to_string_pretty(&*entries).map_err(|e| CacheError::Serde(e.to_string()))?;
        write_atomic(&self.path, &json).await.map_err(|e| CacheError::Io(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(artist: &str, album: &str, source: &str, year: Option<&str>) -> CachedApiResult {
        CachedApiResult {
            artist: artist.to_string(),
            album: album.to_string(),
            year: year.map(str::to_string),
            source: source.to_string(),
            timestamp: Utc::now(),
            ttl: None,
            metadata: serde_json::Value::Null,
            api_response: None,
        }
    }

    #[tokio::test]
    async fn roundtrips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_cache.json");

        let cache = ApiResponseCache::new(&path);
        cache
            .set(result("Radiohead", "OK Computer", "musicbrainz", Some("1997")))
            .await
            .unwrap();

        let reloaded = ApiResponseCache::new(&path);
        reloaded.load().await.unwrap();
        let got = reloaded.get("musicbrainz", "Radiohead", "OK Computer").await.unwrap();
        assert_eq!(got.year.as_deref(), Some("1997"));
    }

    #[tokio::test]
    async fn negative_result_is_still_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ApiResponseCache::new(dir.path().join("api_cache.json"));
        cache.set(result("A", "B", "discogs", None)).await.unwrap();

        let got = cache.get("discogs", "A", "B").await.unwrap();
        assert!(got.is_negative());
    }

    #[tokio::test]
    async fn invalidate_album_clears_all_sources() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ApiResponseCache::new(dir.path().join("api_cache.json"));
        cache.set(result("A", "B", "discogs", Some("1999"))).await.unwrap();
        cache.set(result("A", "B", "musicbrainz", Some("1999"))).await.unwrap();

        cache.invalidate_album("A", "B").await.unwrap();
        assert!(cache.get("discogs", "A", "B").await.is_none());
        assert!(cache.get("musicbrainz", "A", "B").await.is_none());
    }
}
