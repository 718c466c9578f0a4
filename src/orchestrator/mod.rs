//! API Orchestrator (§4.7): owns the provider clients and turns an
//! `(artist, album)` pair into a year verdict, with script-aware provider
//! ordering and pending-store side effects.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::domain::{Track, VerificationReason};
use crate::pending::PendingVerificationStore;
use crate::providers::ProviderClient;
use crate::scoring::YearScoreResolver;
use crate::utils::config::{Config, ScriptApiPriority};
use crate::utils::normalizations::normalize_for_matching;
use crate::utils::script::detect_dominant_script;

#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    #[error("year score resolution failed: {0}")]
    Resolution(#[from] crate::scoring::ScoreResolutionError),
    #[error("pending store error: {0}")]
    Pending(#[from] crate::pending::PendingStoreError),
}

/// `(year, is_definitive)` as a struct rather than a tuple, per §9's note
/// that the source's "error-result tuple" should be modeled explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearLookup {
    pub year: Option<String>,
    pub is_definitive: bool,
}

impl YearLookup {
    fn none() -> Self {
        Self { year: None, is_definitive: false }
    }
}

/// Caps fire-and-forget pending-mark jobs spawned off the hot path (§9:
/// "Fire-and-forget tasks... bounded worker pool... drops on overflow").
const MAX_BACKGROUND_TASKS: usize = 100;

const CANONICAL_PROVIDER_ORDER: [&str; 4] = ["musicbrainz", "discogs", "itunes", "lastfm"];

fn order_with_preferred(list: &[String], preferred: &str) -> Vec<String> {
    let mut ordered = Vec::with_capacity(list.len());
    if list.iter().any(|p| p == preferred) {
        ordered.push(preferred.to_string());
    }
    for item in list {
        if item != preferred {
            ordered.push(item.clone());
        }
    }
    ordered
}

pub struct ApiOrchestrator {
    providers: HashMap<String, Arc<dyn ProviderClient>>,
    musicbrainz_context: Arc<crate::providers::musicbrainz::MusicBrainzClient>,
    resolver: YearScoreResolver,
    pending: Arc<PendingVerificationStore>,
    preferred_api: String,
    script_api_priorities: HashMap<String, ScriptApiPriority>,
    background_permits: Arc<Semaphore>,
    current_year: i32,
    future_year_threshold: i32,
    skip_prerelease: bool,
}

impl ApiOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        providers: HashMap<String, Arc<dyn ProviderClient>>,
        musicbrainz_context: Arc<crate::providers::musicbrainz::MusicBrainzClient>,
        resolver: YearScoreResolver,
        pending: Arc<PendingVerificationStore>,
        config: &Config,
        current_year: i32,
    ) -> Self {
        Self {
            providers,
            musicbrainz_context,
            resolver,
            pending,
            preferred_api: config.year_retrieval.preferred_api.clone(),
            script_api_priorities: config.year_retrieval.script_api_priorities.clone(),
            background_permits: Arc::new(Semaphore::new(MAX_BACKGROUND_TASKS)),
            current_year,
            future_year_threshold: config.year_retrieval.processing.future_year_threshold,
            skip_prerelease: config.year_retrieval.processing.skip_prerelease,
        }
    }

    fn canonical_providers(&self) -> Vec<String> {
        let configured: Vec<String> = CANONICAL_PROVIDER_ORDER
            .iter()
            .filter(|name| self.providers.contains_key(**name))
            .map(|s| s.to_string())
            .collect();
        order_with_preferred(&configured, &self.preferred_api)
    }

    async fn query_provider(
        &self,
        name: &str,
        artist_norm: &str,
        album_norm: &str,
        artist_region: Option<&str>,
        artist_activity: Option<(i32, i32)>,
        artist_orig: &str,
        album_orig: &str,
    ) -> Vec<crate::domain::ScoredRelease> {
        let Some(client) = self.providers.get(name) else { return Vec::new() };
        match client
            .get_scored_releases(artist_norm, album_norm, artist_region, artist_activity, artist_orig, album_orig)
            .await
        {
            Ok(releases) => releases,
            Err(err) => {
                log::warn!("provider '{name}' failed for '{artist_orig} - {album_orig}': {err}");
                Vec::new()
            }
        }
    }

    /// Core lookup contract consumed by the Determinator (§4.7).
    pub async fn get_album_year(
        &self,
        artist: &str,
        album: &str,
        current_library_year: Option<&str>,
        tracks: &[Track],
    ) -> Result<YearLookup, OrchestratorError> {
        let artist_norm = normalize_for_matching(artist);
        let album_norm = normalize_for_matching(album);

        let activity = self.musicbrainz_context.get_artist_activity_period(artist).await.ok().flatten();
        let region = self.musicbrainz_context.get_artist_region(artist).await.ok().flatten();
        if let Some((begin, end)) = activity {
            log::debug!("artist '{artist}' active {begin}-{end}");
        }

        let script = detect_dominant_script([artist, album]);

        let releases = if !script.is_latin() {
            self.script_aware_fetch(&script, &artist_norm, &album_norm, region.as_deref(), activity, artist, album)
                .await
        } else {
            self.fan_out_latin(&artist_norm, &album_norm, region.as_deref(), activity, artist, album).await
        };

        let aggregated = self.resolver.aggregate_year_scores(&releases);
        let verdict = match self.resolver.select_best_year(&aggregated) {
            Ok(verdict) => verdict,
            Err(_) => {
                self.mark_pending(artist, album, VerificationReason::NoYearFound, None).await?;
                let fallback = current_library_year.filter(|y| y.parse::<i32>().ok() != Some(self.current_year));
                return Ok(YearLookup { year: fallback.map(str::to_string), is_definitive: false });
            }
        };

        if !self.should_update_album_year(tracks, artist, album).await {
            return Ok(YearLookup::none());
        }

        if verdict.is_definitive {
            self.pending.remove_from_pending(artist, album).await?;
        } else {
            self.mark_pending(artist, album, VerificationReason::NoYearFound, None).await?;
        }

        Ok(YearLookup { year: Some(verdict.year), is_definitive: verdict.is_definitive })
    }

    async fn script_aware_fetch(
        &self,
        script: &crate::utils::script::ScriptType,
        artist_norm: &str,
        album_norm: &str,
        artist_region: Option<&str>,
        artist_activity: Option<(i32, i32)>,
        artist_orig: &str,
        album_orig: &str,
    ) -> Vec<crate::domain::ScoredRelease> {
        let priority = self.script_api_priorities.get(script.config_key());
        let (primary, fallback) = match priority {
            Some(p) => (order_with_preferred(&p.primary, &self.preferred_api), order_with_preferred(&p.fallback, &self.preferred_api)),
            None => (self.canonical_providers(), Vec::new()),
        };

        for name in primary.iter().chain(fallback.iter()) {
            let releases = self
                .query_provider(name, artist_norm, album_norm, artist_region, artist_activity, artist_orig, album_orig)
                .await;
            if !releases.is_empty() {
                return releases;
            }
        }
        Vec::new()
    }

    async fn fan_out_latin(
        &self,
        artist_norm: &str,
        album_norm: &str,
        artist_region: Option<&str>,
        artist_activity: Option<(i32, i32)>,
        artist_orig: &str,
        album_orig: &str,
    ) -> Vec<crate::domain::ScoredRelease> {
        let providers = self.canonical_providers();
        let fetches = providers.iter().map(|name| {
            self.query_provider(name, artist_norm, album_norm, artist_region, artist_activity, artist_orig, album_orig)
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }

    async fn mark_pending(
        &self,
        artist: &str,
        album: &str,
        reason: VerificationReason,
        recheck_days: Option<u32>,
    ) -> Result<(), OrchestratorError> {
        let Ok(permit) = self.background_permits.clone().try_acquire_owned() else {
            log::debug!("background pending-mark queue full, dropping mark for '{artist} - {album}'");
            return Ok(());
        };
        let pending = Arc::clone(&self.pending);
        let artist = artist.to_string();
        let album = album.to_string();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = pending.mark_for_verification(&artist, &album, reason, None, recheck_days).await {
                log::warn!("failed to mark '{artist} - {album}' pending: {err}");
            }
        });
        Ok(())
    }

    /// Gating check (§4.7 step 9): whether an album should be held back
    /// because it looks like an unreleased/pre-release record.
    pub async fn should_update_album_year(&self, tracks: &[Track], artist: &str, album: &str) -> bool {
        if !self.skip_prerelease {
            return true;
        }

        let is_prerelease_status = tracks.iter().any(|t| matches!(t.track_status(), Some(s) if s.is_prerelease()));

        let future_years: Vec<i32> = tracks
            .iter()
            .filter_map(|t| t.year())
            .filter_map(|y| y.parse::<i32>().ok())
            .filter(|y| *y > self.current_year)
            .collect();
        let majority_future = !tracks.is_empty() && future_years.len() * 2 >= tracks.len();
        let max_future = future_years.iter().copied().max();
        let far_future = max_future.is_some_and(|y| y > self.current_year + self.future_year_threshold);

        if is_prerelease_status || (majority_future && far_future) {
            let _ = self.mark_pending(artist, album, VerificationReason::Prerelease, None).await;
            return false;
        }

        true
    }
}
