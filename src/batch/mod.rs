//! Batch Processor (§4.9): groups tracks by album, runs each group through
//! the Determinator, and applies approved year updates to the library
//! client with bounded retry and progress logging.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::decision::{DecisionError, Determinator, YearDecision};
use crate::domain::change_log::ChangeLogEntry;
use crate::domain::{group_tracks_by_album, AlbumGroup, Track, TrackStatus};
use crate::library::{LibraryClient, LibraryClientError};
use crate::utils::atomic_file::write_atomic;

const MAX_RETRY_DELAY_SECONDS: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("decision error: {0}")]
    Decision(#[from] DecisionError),
}

#[derive(Debug, Clone)]
pub struct BatchProcessorConfig {
    pub batch_size: usize,
    pub delay_between_batches: f64,
    pub adaptive_delay: bool,
    pub library_concurrency: usize,
    pub concurrent_api_calls: usize,
    pub track_retry_attempts: u32,
    pub track_retry_delay: f64,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub enum OutcomeKind {
    Updated { year: String, tracks_changed: usize },
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct AlbumOutcome {
    pub artist: String,
    pub album: String,
    pub decision: OutcomeKind,
}

/// Only subscription tracks are mutable; purchased/prerelease/matched/
/// uploaded/unknown statuses come from sources the library treats as
/// read-only for year edits.
fn is_mutable(track: &Track) -> bool {
    matches!(track.track_status(), Some(TrackStatus::Subscription) | None)
}

/// Thread-safe completion counter, logging every `max(1, total/10)` steps.
struct AlbumProcessingProgress {
    total: usize,
    completed: AtomicUsize,
    log_every: usize,
}

impl AlbumProcessingProgress {
    fn new(total: usize) -> Self {
        Self { total, completed: AtomicUsize::new(0), log_every: (total / 10).max(1) }
    }

    fn record(&self) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if done % self.log_every == 0 || done == self.total {
            log::info!("album processing progress: {done}/{}", self.total);
        }
    }
}

pub struct BatchProcessor<C: LibraryClient> {
    determinator: Arc<Determinator>,
    library: Arc<C>,
    change_log_path: PathBuf,
    config: BatchProcessorConfig,
}

impl<C: LibraryClient + 'static> BatchProcessor<C> {
    pub fn new(
        determinator: Arc<Determinator>,
        library: Arc<C>,
        change_log_path: impl Into<PathBuf>,
        config: BatchProcessorConfig,
    ) -> Self {
        Self { determinator, library, change_log_path: change_log_path.into(), config }
    }

    pub async fn run(&self, tracks: Vec<Track>) -> Result<Vec<AlbumOutcome>, BatchError> {
        let groups = group_tracks_by_album(tracks);
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let sequential = !self.config.adaptive_delay && self.config.library_concurrency == 1;
        if sequential {
            self.run_sequential(groups).await
        } else {
            self.run_concurrent(groups).await
        }
    }

    async fn run_sequential(&self, groups: Vec<AlbumGroup>) -> Result<Vec<AlbumOutcome>, BatchError> {
        let total_batches = groups.len().div_ceil(self.config.batch_size);
        let mut outcomes = Vec::with_capacity(groups.len());

        for (batch_index, batch) in groups.chunks(self.config.batch_size).enumerate() {
            log::info!("processing batch {}/{total_batches}", batch_index + 1);
            for group in batch {
                outcomes.push(
                    process_album(
                        &self.determinator,
                        self.library.as_ref(),
                        &self.change_log_path,
                        group,
                        self.config.force,
                        self.config.track_retry_attempts,
                        self.config.track_retry_delay,
                    )
                    .await,
                );
            }
            if self.config.delay_between_batches > 0.0 {
                log::info!("waiting {}s before next batch", self.config.delay_between_batches);
                tokio::time::sleep(Duration::from_secs_f64(self.config.delay_between_batches)).await;
            }
        }
        Ok(outcomes)
    }

    async fn run_concurrent(&self, groups: Vec<AlbumGroup>) -> Result<Vec<AlbumOutcome>, BatchError> {
        let permits = self.config.library_concurrency.min(self.config.concurrent_api_calls).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let progress = Arc::new(AlbumProcessingProgress::new(groups.len()));
        let outcomes = Arc::new(Mutex::new(Vec::with_capacity(groups.len())));
        let total_batches = groups.len().div_ceil(self.config.batch_size);

        for (batch_index, batch) in groups.chunks(self.config.batch_size).enumerate() {
            log::info!(
                "processing batch {}/{total_batches} (size={}, concurrency={permits})",
                batch_index + 1,
                batch.len()
            );

            let mut tasks = JoinSet::new();
            for group in batch.to_vec() {
                let semaphore = Arc::clone(&semaphore);
                let progress = Arc::clone(&progress);
                let outcomes = Arc::clone(&outcomes);
                let determinator = Arc::clone(&self.determinator);
                let library = Arc::clone(&self.library);
                let change_log_path = self.change_log_path.clone();
                let force = self.config.force;
                let retry_attempts = self.config.track_retry_attempts;
                let retry_delay = self.config.track_retry_delay;

                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed while held");
                    let outcome =
                        process_album(&determinator, library.as_ref(), &change_log_path, &group, force, retry_attempts, retry_delay).await;
                    progress.record();
                    outcomes.lock().await.push(outcome);
                });
            }

            // Structured concurrency: every task in this batch finishes before
            // the next batch's tasks are spawned.
            while tasks.join_next().await.is_some() {}
            log::info!("completed batch {}/{total_batches}", batch_index + 1);
        }

        Ok(outcomes.lock().await.clone())
    }
}

async fn process_album<C: LibraryClient>(
    determinator: &Determinator,
    library: &C,
    change_log_path: &Path,
    group: &AlbumGroup,
    force: bool,
    retry_attempts: u32,
    retry_delay: f64,
) -> AlbumOutcome {
    let artist = group.artist().to_string();
    let album = group.album().to_string();

    let mutable_tracks: Vec<&Track> = group.tracks().iter().filter(|t| is_mutable(t)).collect();
    if mutable_tracks.is_empty() {
        log::debug!("skipping album '{artist} - {album}': no subscription tracks");
        return AlbumOutcome { artist, album, decision: OutcomeKind::Skipped };
    }

    let decision = match determinator.determine_year(group, force).await {
        Ok(d) => d,
        Err(err) => return AlbumOutcome { artist, album, decision: OutcomeKind::Failed(err.to_string()) },
    };

    let year = match decision {
        YearDecision::Skip => return AlbumOutcome { artist, album, decision: OutcomeKind::Skipped },
        YearDecision::Apply(year) => year,
    };

    let targets: Vec<&Track> = mutable_tracks.into_iter().filter(|t| t.year() != Some(year.as_str())).collect();
    if targets.is_empty() {
        log::info!("all tracks for '{artist} - {album}' already have year {year}, skipping update");
        return AlbumOutcome { artist, album, decision: OutcomeKind::Skipped };
    }

    let mut changed = 0usize;
    for track in &targets {
        match update_with_retry(library, track.id(), &year, retry_attempts, retry_delay).await {
            Ok(()) => {
                changed += 1;
                let entry = ChangeLogEntry::year_update(
                    track.id(),
                    artist.clone(),
                    album.clone(),
                    track.name(),
                    track.year().map(str::to_string),
                    year.clone(),
                    chrono::Utc::now(),
                );
                if let Err(err) = append_change_log(change_log_path, &entry).await {
                    log::warn!("failed to append change log entry for track {}: {err}", track.id());
                }
            }
            Err(err) => log::warn!("failed to update track {} after retries: {err}", track.id()),
        }
    }

    if changed == 0 {
        return AlbumOutcome { artist, album, decision: OutcomeKind::Failed("all track updates failed".to_string()) };
    }

    AlbumOutcome { artist, album, decision: OutcomeKind::Updated { year, tracks_changed: changed } }
}

async fn update_with_retry<C: LibraryClient>(
    library: &C,
    track_id: &str,
    year: &str,
    attempts: u32,
    base_delay: f64,
) -> Result<(), LibraryClientError> {
    let mut delay = if base_delay > 0.0 { base_delay.min(MAX_RETRY_DELAY_SECONDS) } else { 1.0 };
    let mut attempt = 0;

    loop {
        match library.update_property(track_id, "year", year).await {
            Ok(_) => return Ok(()),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(err);
                }
                let jitter_range = 0.1 * delay;
                let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
                let sleep_for = (delay + jitter).max(0.0);
                log::warn!("retrying update for track {track_id} (attempt {attempt}/{attempts}) after {sleep_for:.1}s: {err}");
                tokio::time::sleep(Duration::from_secs_f64(sleep_for)).await;
                delay = (delay * 2.0).min(MAX_RETRY_DELAY_SECONDS);
            }
        }
    }
}

async fn append_change_log(path: &Path, entry: &ChangeLogEntry) -> std::io::Result<()> {
    let line = entry.to_jsonl_line().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut existing = crate::utils::atomic_file::read_if_exists(path).await?.unwrap_or_default();
    existing.push_str(&line);
    existing.push('\n');
    write_atomic(path, &existing).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Mutex as StdMutex;

    struct FlakyLibraryClient {
        fail_times: StdAtomicUsize,
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl LibraryClient for FlakyLibraryClient {
        async fn fetch_all_track_ids(&self) -> Result<Vec<String>, LibraryClientError> {
            Ok(Vec::new())
        }
        async fn fetch_tracks_by_ids(&self, _ids: &[String]) -> Result<Vec<Track>, LibraryClientError> {
            Ok(Vec::new())
        }
        async fn fetch_tracks(
            &self,
            _artist: Option<&str>,
            _offset: Option<usize>,
            _limit: Option<usize>,
            _min_date_added: Option<chrono::DateTime<chrono::Utc>>,
        ) -> Result<Vec<Track>, LibraryClientError> {
            Ok(Vec::new())
        }
        async fn update_property(
            &self,
            track_id: &str,
            _property: &str,
            value: &str,
        ) -> Result<crate::library::PropertyUpdate, LibraryClientError> {
            self.calls.lock().unwrap().push(track_id.to_string());
            if self.fail_times.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(LibraryClientError::Operation("transient".to_string()));
            }
            Ok(crate::library::PropertyUpdate { old: None, new: value.to_string() })
        }
        async fn batch_update_tracks(
            &self,
            _updates: &[crate::library::TrackUpdate],
        ) -> Result<crate::library::BatchUpdateResult, LibraryClientError> {
            Ok(crate::library::BatchUpdateResult::default())
        }
    }

    fn track(id: &str, year: Option<&str>, status: Option<TrackStatus>) -> Track {
        Track::new(id, "Song", "Artist", "Album", None, None, year.map(str::to_string), None, None, None, status).unwrap()
    }

    #[tokio::test]
    async fn retries_until_success_within_attempt_budget() {
        let client = FlakyLibraryClient { fail_times: StdAtomicUsize::new(2), calls: StdMutex::new(Vec::new()) };
        update_with_retry(&client, "t1", "1997", 5, 0.01).await.unwrap();
        assert_eq!(client.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_attempts() {
        let client = FlakyLibraryClient { fail_times: StdAtomicUsize::new(10), calls: StdMutex::new(Vec::new()) };
        let result = update_with_retry(&client, "t1", "1997", 3, 0.01).await;
        assert!(result.is_err());
        assert_eq!(client.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn only_subscription_and_unknown_status_are_mutable() {
        assert!(is_mutable(&track("1", None, Some(TrackStatus::Subscription))));
        assert!(is_mutable(&track("1", None, None)));
        assert!(!is_mutable(&track("1", None, Some(TrackStatus::Purchased))));
        assert!(!is_mutable(&track("1", None, Some(TrackStatus::Prerelease))));
    }

    #[tokio::test]
    async fn process_album_skips_when_no_mutable_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(crate::cache::CacheOrchestrator::new(
            dir.path().join("album_years.csv"),
            dir.path().join("api.json"),
            dir.path().join("generic.json"),
            100,
            3600,
            86400,
        ));
        let pending = Arc::new(crate::pending::PendingVerificationStore::new(dir.path().join("pending.csv"), 7, 14));
        let fallback =
            crate::decision::YearFallbackHandler::new(Arc::clone(&pending), crate::utils::config::AlbumTypeDetectionConfig::default(), true, 1950, 5);
        let http = Arc::new(crate::http::HttpRequestExecutor::new(
            reqwest::Client::new(),
            Arc::clone(&cache),
            std::collections::HashMap::new(),
            Vec::new(),
            3,
            1.0,
            30,
            crate::utils::debug_flags::DebugFlags::default(),
        ));
        let mb = Arc::new(crate::providers::musicbrainz::MusicBrainzClient::new(Arc::clone(&http), std::sync::Arc::new(|_, _| 0.0), 2026));
        let resolver = crate::scoring::YearScoreResolver::new(1900, 2026, 70, 10);
        let config_yaml = r#"
music_library_path: /tmp/library
library_concurrency: 4
batch_processing:
  ids_batch_size: 200
  batch_size: 20
year_retrieval:
  preferred_api: musicbrainz
  rate_limits: {}
  processing: {}
  logic: {}
  scoring: {}
caching:
  api_result_cache_path: /tmp/api.json
album_years_cache_file: /tmp/album_years.csv
"#;
        let config: crate::utils::config::Config = serde_yaml::from_str(config_yaml).unwrap();
        let orchestrator = Arc::new(crate::orchestrator::ApiOrchestrator::new(
            std::collections::HashMap::new(),
            mb,
            resolver,
            Arc::clone(&pending),
            &config,
            2026,
        ));
        let determinator = Determinator::new(cache, orchestrator, fallback, pending, 2026, 1, 14);

        let client = FlakyLibraryClient { fail_times: StdAtomicUsize::new(0), calls: StdMutex::new(Vec::new()) };
        let group = AlbumGroup::new("Artist", "Album", vec![track("1", Some("1997"), Some(TrackStatus::Purchased))]);
        let outcome =
            process_album(&determinator, &client, &dir.path().join("changes.jsonl"), &group, false, 3, 0.01).await;

        assert!(matches!(outcome.decision, OutcomeKind::Skipped));
        assert!(client.calls.lock().unwrap().is_empty());
    }
}
