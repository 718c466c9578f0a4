//! Baseline `LibraryClient`: a JSON-file-backed library store.
//!
//! The upstream system backs this trait with a native host bridge (in
//! earlier iterations an AppleScript automation layer, later a helper
//! daemon); both are thin, host-specific collaborators outside this crate's
//! scope (§1). This implementation is the "stable baseline" side of that
//! split: a library held as a single JSON document on disk, read and
//! rewritten with the same write-temp-then-rename discipline as every other
//! store in this crate. It lets the pipeline run end to end against a real
//! `LibraryClient` without assuming a particular host automation layer.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::Track;

use super::{BatchUpdateResult, LibraryClient, LibraryClientError, PropertyUpdate, TrackUpdate};
use crate::utils::atomic_file::{read_if_exists, write_atomic};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredLibrary {
    tracks: Vec<Track>,
}

/// A `LibraryClient` whose entire state is one JSON file. Reads are served
/// from an in-memory copy loaded on first access; every mutation is applied
/// in memory and then flushed back to disk before returning, so a crash
/// mid-run loses at most the update in flight.
pub struct JsonFileLibraryClient {
    path: PathBuf,
    state: Mutex<Option<StoredLibrary>>,
}

impl JsonFileLibraryClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), state: Mutex::new(None) }
    }

    async fn load(&self) -> Result<StoredLibrary, LibraryClientError> {
        let raw = read_if_exists(&self.path)
            .await
            .map_err(|e| LibraryClientError::Operation(e.to_string()))?;
        match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| LibraryClientError::Operation(e.to_string())),
            None => Ok(StoredLibrary::default()),
        }
    }

    async fn persist(&self, library: &StoredLibrary) -> Result<(), LibraryClientError> {
        let serialized = serde_json::to_string_pretty(library).map_err(|e| LibraryClientError::Operation(e.to_string()))?;
        write_atomic(&self.path, &serialized)
            .await
            .map_err(|e| LibraryClientError::Operation(e.to_string()))
    }

    async fn with_state<F, R>(&self, f: F) -> Result<R, LibraryClientError>
    where
        F: FnOnce(&mut StoredLibrary) -> R,
    {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let library = guard.as_mut().expect("state populated above");
        Ok(f(library))
    }
}

#[async_trait]
impl LibraryClient for JsonFileLibraryClient {
    async fn fetch_all_track_ids(&self) -> Result<Vec<String>, LibraryClientError> {
        self.with_state(|library| library.tracks.iter().map(|t| t.id().to_string()).collect()).await
    }

    async fn fetch_tracks_by_ids(&self, ids: &[String]) -> Result<Vec<Track>, LibraryClientError> {
        self.with_state(|library| {
            library
                .tracks
                .iter()
                .filter(|t| ids.iter().any(|id| id == t.id()))
                .cloned()
                .collect()
        })
        .await
    }

    async fn fetch_tracks(
        &self,
        artist: Option<&str>,
        offset: Option<usize>,
        limit: Option<usize>,
        min_date_added: Option<DateTime<Utc>>,
    ) -> Result<Vec<Track>, LibraryClientError> {
        self.with_state(|library| {
            let mut matched: Vec<Track> = library
                .tracks
                .iter()
                .filter(|t| artist.map(|a| t.artist().eq_ignore_ascii_case(a)).unwrap_or(true))
                .filter(|t| {
                    min_date_added
                        .map(|since| t.date_added().map(|d| d.and_utc() >= since).unwrap_or(false))
                        .unwrap_or(true)
                })
                .cloned()
                .collect();

            if let Some(offset) = offset {
                matched = matched.into_iter().skip(offset).collect();
            }
            if let Some(limit) = limit {
                matched.truncate(limit);
            }
            matched
        })
        .await
    }

    async fn update_property(&self, track_id: &str, property: &str, value: &str) -> Result<PropertyUpdate, LibraryClientError> {
        let outcome = self
            .with_state(|library| {
                let track = library.tracks.iter_mut().find(|t| t.id() == track_id);
                track.map(|t| {
                    let old = match property {
                        "year" => t.year().map(str::to_string),
                        "release_year" => t.release_year().map(str::to_string),
                        _ => t.extras().get(property).cloned(),
                    };
                    let updated = if property == "year" {
                        t.clone().with_year(value.to_string())
                    } else {
                        t.clone().with_extra(property.to_string(), value.to_string())
                    };
                    *t = updated;
                    PropertyUpdate { old, new: value.to_string() }
                })
            })
            .await?;

        let update = outcome.ok_or_else(|| LibraryClientError::NotFound(track_id.to_string()))?;

        let snapshot = self.with_state(|library| library.clone()).await?;
        self.persist(&snapshot).await?;
        Ok(update)
    }

    async fn batch_update_tracks(&self, updates: &[TrackUpdate]) -> Result<BatchUpdateResult, LibraryClientError> {
        let mut result = BatchUpdateResult::default();
        for update in updates {
            match self.update_property(&update.track_id, &update.property, &update.value).await {
                Ok(applied) => {
                    result.success_count += 1;
                    result.results.push(Ok(applied));
                }
                Err(err) => {
                    result.failure_count += 1;
                    result.results.push(Err(err.to_string()));
                }
            }
        }
        Ok(result)
    }
}
