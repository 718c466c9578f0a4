//! Determinator (§4.8.2): combines the Consistency Checker, the Album-Year
//! cache, the API Orchestrator, and the Fallback Handler into the single
//! per-album decision of whether, and to what year, to update.

use std::sync::Arc;

use crate::cache::CacheOrchestrator;
use crate::decision::consistency::YearConsistencyChecker;
use crate::decision::fallback::YearFallbackHandler;
use crate::domain::{AlbumCacheEntry, AlbumGroup, VerificationReason};
use crate::orchestrator::ApiOrchestrator;
use crate::pending::PendingVerificationStore;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DecisionError {
    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),
    #[error("pending store error: {0}")]
    Pending(#[from] crate::pending::PendingStoreError),
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),
}

/// Outcome of a single album's year determination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearDecision {
    Apply(String),
    Skip,
}

pub struct Determinator {
    consistency: YearConsistencyChecker,
    cache: Arc<CacheOrchestrator>,
    orchestrator: Arc<ApiOrchestrator>,
    fallback: YearFallbackHandler,
    pending: Arc<PendingVerificationStore>,
    current_year: i32,
    future_year_threshold: i32,
    prerelease_recheck_days: u32,
}

impl Determinator {
    pub fn new(
        cache: Arc<CacheOrchestrator>,
        orchestrator: Arc<ApiOrchestrator>,
        fallback: YearFallbackHandler,
        pending: Arc<PendingVerificationStore>,
        current_year: i32,
        future_year_threshold: i32,
        prerelease_recheck_days: u32,
    ) -> Self {
        Self {
            consistency: YearConsistencyChecker::new(current_year),
            cache,
            orchestrator,
            fallback,
            pending,
            current_year,
            future_year_threshold,
            prerelease_recheck_days,
        }
    }

    pub async fn determine_year(&self, group: &AlbumGroup, force: bool) -> Result<YearDecision, DecisionError> {
        let artist = group.normalized_artist();
        let album = group.album();
        let tracks = group.tracks();

        if self.check_suspicious_album(artist, album, group).await? {
            return Ok(YearDecision::Skip);
        }
        if self.check_prerelease_status(artist, album, tracks).await? {
            return Ok(YearDecision::Skip);
        }
        if !self.handle_future_years(artist, album, tracks).await? {
            return Ok(YearDecision::Skip);
        }

        if let Some(dominant) = self.consistency.get_dominant_year(tracks) {
            if !force && self.should_skip_album(artist, album, &dominant).await? {
                return Ok(YearDecision::Skip);
            }
            self.cache_year(artist, album, &dominant).await?;
            return Ok(YearDecision::Apply(dominant));
        }

        if let Some(cached) = self.cache.get_album_year(artist, album).await {
            return Ok(YearDecision::Apply(cached.year));
        }

        if let Some(consensus) = self.consistency.get_consensus_release_year(tracks) {
            self.cache_year(artist, album, &consensus).await?;
            return Ok(YearDecision::Apply(consensus));
        }

        let current_library_year = crate::decision::fallback::YearFallbackHandler::get_existing_year_from_tracks(tracks);
        let lookup = self.orchestrator.get_album_year(artist, album, current_library_year.as_deref(), tracks).await?;

        let Some(proposed) = lookup.year else {
            return Ok(YearDecision::Skip);
        };

        let applied = self.fallback.apply_year_fallback(&proposed, tracks, lookup.is_definitive, artist, album).await?;
        match applied {
            Some(year) => {
                self.cache_year(artist, album, &year).await?;
                Ok(YearDecision::Apply(year))
            }
            None => Ok(YearDecision::Skip),
        }
    }

    async fn cache_year(&self, artist: &str, album: &str, year: &str) -> Result<(), DecisionError> {
        self.cache
            .store_album_year(AlbumCacheEntry {
                artist: artist.to_string(),
                album: album.to_string(),
                year: year.to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// Very short album names with wildly disagreeing years are more likely
    /// a metadata-matching error than a real consistency problem.
    async fn check_suspicious_album(&self, artist: &str, album: &str, group: &AlbumGroup) -> Result<bool, DecisionError> {
        if album.trim().chars().count() > 3 {
            return Ok(false);
        }
        let unique_years: std::collections::HashSet<&str> = group.existing_years().into_iter().collect();
        if unique_years.len() < 3 {
            return Ok(false);
        }

        let metadata = serde_json::json!({ "unique_years": unique_years.len(), "album_length": album.trim().chars().count() });
        self.pending
            .mark_for_verification(artist, album, VerificationReason::SuspiciousAlbumName, Some(metadata), None)
            .await?;
        Ok(true)
    }

    async fn check_prerelease_status(&self, artist: &str, album: &str, tracks: &[crate::domain::Track]) -> Result<bool, DecisionError> {
        let is_prerelease = tracks.iter().any(|t| matches!(t.track_status(), Some(s) if s.is_prerelease()));
        if !is_prerelease {
            return Ok(false);
        }
        self.pending
            .mark_for_verification(artist, album, VerificationReason::Prerelease, None, Some(self.prerelease_recheck_days))
            .await?;
        Ok(true)
    }

    /// None of the album's tracks may carry a year far enough in the future
    /// to look like an unreleased/pre-order placeholder. Runs over every
    /// track unconditionally, before any dominant-year candidate is chosen,
    /// since parity/insufficient-share albums still carry real track years.
    async fn handle_future_years(&self, artist: &str, album: &str, tracks: &[crate::domain::Track]) -> Result<bool, DecisionError> {
        let max_future = tracks
            .iter()
            .filter_map(|t| t.year())
            .filter_map(|y| y.parse::<i32>().ok())
            .filter(|y| *y > self.current_year)
            .max();

        let Some(max_future) = max_future else { return Ok(true) };
        if max_future <= self.current_year + self.future_year_threshold {
            return Ok(true);
        }
        self.pending
            .mark_for_verification(artist, album, VerificationReason::Prerelease, None, Some(self.prerelease_recheck_days))
            .await?;
        Ok(false)
    }

    /// When not forced, an album whose cached/dominant year already matches
    /// the library's own year is a no-op write, so skip it.
    async fn should_skip_album(&self, artist: &str, album: &str, candidate_year: &str) -> Result<bool, DecisionError> {
        let cached = self.cache.get_album_year(artist, album).await;
        Ok(cached.is_some_and(|c| c.year == candidate_year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Track;

    fn track(id: &str, year: Option<&str>) -> Track {
        Track::new(id, "Song", "Artist", "Album", None, None, year.map(str::to_string), None, None, None, None).unwrap()
    }

    #[tokio::test]
    async fn should_skip_album_matches_cached_year() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheOrchestrator::new(
            dir.path().join("album_years.csv"),
            dir.path().join("api.json"),
            dir.path().join("generic.json"),
            100,
            3600,
            86400,
        ));
        cache
            .store_album_year(AlbumCacheEntry {
                artist: "Radiohead".into(),
                album: "OK Computer".into(),
                year: "1997".into(),
                timestamp: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let pending = Arc::new(PendingVerificationStore::new(dir.path().join("pending.csv"), 7, 14));
        let fallback = YearFallbackHandler::new(
            Arc::clone(&pending),
            crate::utils::config::AlbumTypeDetectionConfig::default(),
            true,
            1950,
            5,
        );

        // Build an Orchestrator with no providers: unreachable on this path,
        // only wired so Determinator::new has something to hold.
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
        let mb = Arc::new(crate::providers::musicbrainz::MusicBrainzClient::new(
            Arc::clone(&http),
            std::sync::Arc::new(|_, _| 0.0),
            2026,
        ));
        let resolver = crate::scoring::YearScoreResolver::new(1900, 2026, 70, 10);
        let config_yaml = minimal_config_yaml();
        let config: crate::utils::config::Config = serde_yaml::from_str(&config_yaml).unwrap();
        let orchestrator = Arc::new(ApiOrchestrator::new(
            std::collections::HashMap::new(),
            mb,
            resolver,
            Arc::clone(&pending),
            &config,
            2026,
        ));

        let determinator = Determinator::new(Arc::clone(&cache), orchestrator, fallback, pending, 2026, 1, 14);

        assert!(determinator.should_skip_album("Radiohead", "OK Computer", "1997").await.unwrap());
        assert!(!determinator.should_skip_album("Radiohead", "OK Computer", "2005").await.unwrap());

        let tracks = vec![track("1", Some("1997"))];
        assert!(!determinator.check_prerelease_status("Radiohead", "OK Computer", &tracks).await.unwrap());

        // No dominant year here (parity between 2030 and 2031), but a track
        // carries a far-future year; the check must still fire.
        let parity_tracks = vec![track("1", Some("2030")), track("2", Some("2031"))];
        assert!(!determinator.handle_future_years("Radiohead", "OK Computer", &parity_tracks).await.unwrap());

        let ordinary_tracks = vec![track("1", Some("1997")), track("2", Some("1997"))];
        assert!(determinator.handle_future_years("Radiohead", "OK Computer", &ordinary_tracks).await.unwrap());
    }

    fn minimal_config_yaml() -> String {
        r#"
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
"#
        .to_string()
    }
}
