//! Library Client (§4.10): the external contract the core consults for
//! reading and mutating the host music library. Two implementations exist
//! behind this trait in the upstream system (a stable baseline and an
//! optimized bridge); this crate ships the trait and a dry-run wrapper that
//! records intended actions without performing them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::Track;

pub mod file_backed;
pub use file_backed::JsonFileLibraryClient;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LibraryClientError {
    #[error("library operation failed: {0}")]
    Operation(String),
    #[error("track '{0}' not found")]
    NotFound(String),
}

/// Result of a single-property update, as returned by the host library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyUpdate {
    pub old: Option<String>,
    pub new: String,
}

/// Outcome of a `batch_update_tracks` call.
#[derive(Debug, Clone, Default)]
pub struct BatchUpdateResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<Result<PropertyUpdate, String>>,
}

/// One pending mutation: update `property` on `track_id` to `value`.
#[derive(Debug, Clone)]
pub struct TrackUpdate {
    pub track_id: String,
    pub property: String,
    pub value: String,
}

#[async_trait]
pub trait LibraryClient: Send + Sync {
    async fn fetch_all_track_ids(&self) -> Result<Vec<String>, LibraryClientError>;

    async fn fetch_tracks_by_ids(&self, ids: &[String]) -> Result<Vec<Track>, LibraryClientError>;

    async fn fetch_tracks(
        &self,
        artist: Option<&str>,
        offset: Option<usize>,
        limit: Option<usize>,
        min_date_added: Option<DateTime<Utc>>,
    ) -> Result<Vec<Track>, LibraryClientError>;

    async fn update_property(&self, track_id: &str, property: &str, value: &str) -> Result<PropertyUpdate, LibraryClientError>;

    async fn batch_update_tracks(&self, updates: &[TrackUpdate]) -> Result<BatchUpdateResult, LibraryClientError>;
}

/// Wraps any `LibraryClient` and turns every mutation into a recorded,
/// no-op intention — used when `dry_run` is set (§6).
pub struct DryRunLibraryClient<C: LibraryClient> {
    inner: C,
    recorded: tokio::sync::Mutex<Vec<TrackUpdate>>,
}

impl<C: LibraryClient> DryRunLibraryClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner, recorded: tokio::sync::Mutex::new(Vec::new()) }
    }

    pub async fn recorded_updates(&self) -> Vec<TrackUpdate> {
        self.recorded.lock().await.clone()
    }
}

impl Clone for TrackUpdate {
    fn clone(&self) -> Self {
        Self {
            track_id: self.track_id.clone(),
            property: self.property.clone(),
            value: self.value.clone(),
        }
    }
}

#[async_trait]
impl<C: LibraryClient> LibraryClient for DryRunLibraryClient<C> {
    async fn fetch_all_track_ids(&self) -> Result<Vec<String>, LibraryClientError> {
        self.inner.fetch_all_track_ids().await
    }

    async fn fetch_tracks_by_ids(&self, ids: &[String]) -> Result<Vec<Track>, LibraryClientError> {
        self.inner.fetch_tracks_by_ids(ids).await
    }

    async fn fetch_tracks(
        &self,
        artist: Option<&str>,
        offset: Option<usize>,
        limit: Option<usize>,
        min_date_added: Option<DateTime<Utc>>,
    ) -> Result<Vec<Track>, LibraryClientError> {
        self.inner.fetch_tracks(artist, offset, limit, min_date_added).await
    }

    async fn update_property(&self, track_id: &str, property: &str, value: &str) -> Result<PropertyUpdate, LibraryClientError> {
        log::info!("[dry-run] would set {property}={value} on track {track_id}");
        self.recorded.lock().await.push(TrackUpdate {
            track_id: track_id.to_string(),
            property: property.to_string(),
            value: value.to_string(),
        });
        Ok(PropertyUpdate { old: None, new: value.to_string() })
    }

    async fn batch_update_tracks(&self, updates: &[TrackUpdate]) -> Result<BatchUpdateResult, LibraryClientError> {
        let mut recorded = self.recorded.lock().await;
        let mut result = BatchUpdateResult::default();
        for update in updates {
            log::info!("[dry-run] would set {}={} on track {}", update.property, update.value, update.track_id);
            recorded.push(update.clone());
            result.success_count += 1;
            result.results.push(Ok(PropertyUpdate { old: None, new: update.value.clone() }));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLibraryClient {
        update_calls: AtomicUsize,
    }

    #[async_trait]
    impl LibraryClient for FakeLibraryClient {
        async fn fetch_all_track_ids(&self) -> Result<Vec<String>, LibraryClientError> {
            Ok(vec!["1".to_string()])
        }

        async fn fetch_tracks_by_ids(&self, ids: &[String]) -> Result<Vec<Track>, LibraryClientError> {
            Ok(ids
                .iter()
                .map(|id| Track::new(id.clone(), "Song", "Artist", "Album", None, None, None, None, None, None, None).unwrap())
                .collect())
        }

        async fn fetch_tracks(
            &self,
            _artist: Option<&str>,
            _offset: Option<usize>,
            _limit: Option<usize>,
            _min_date_added: Option<DateTime<Utc>>,
        ) -> Result<Vec<Track>, LibraryClientError> {
            Ok(Vec::new())
        }

        async fn update_property(&self, _track_id: &str, _property: &str, _value: &str) -> Result<PropertyUpdate, LibraryClientError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PropertyUpdate { old: Some("1996".to_string()), new: "1997".to_string() })
        }

        async fn batch_update_tracks(&self, _updates: &[TrackUpdate]) -> Result<BatchUpdateResult, LibraryClientError> {
            Ok(BatchUpdateResult::default())
        }
    }

    #[tokio::test]
    async fn dry_run_records_without_calling_inner_update() {
        let fake = FakeLibraryClient { update_calls: AtomicUsize::new(0) };
        let dry_run = DryRunLibraryClient::new(fake);

        dry_run.update_property("t1", "year", "1997").await.unwrap();
        assert_eq!(dry_run.inner.update_calls.load(Ordering::SeqCst), 0);

        let recorded = dry_run.recorded_updates().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].value, "1997");
    }

    #[tokio::test]
    async fn dry_run_passes_through_reads() {
        let fake = FakeLibraryClient { update_calls: AtomicUsize::new(0) };
        let dry_run = DryRunLibraryClient::new(fake);
        let ids = dry_run.fetch_all_track_ids().await.unwrap();
        assert_eq!(ids, vec!["1".to_string()]);
    }
}
