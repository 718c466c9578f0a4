//! Fallback Handler (§4.8.3): decides whether a non-definitive proposed year
//! should be applied, preserved, or skipped, given the album's existing
//! track years. Ported from the upstream `YearFallbackHandler`'s seven-step
//! decision tree.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::album_type::{detect_album_type, AlbumType, YearHandlingStrategy};
use crate::domain::validators::is_empty_year;
use crate::domain::{Track, VerificationReason};
use crate::pending::{PendingStoreError, PendingVerificationStore};
use crate::utils::config::AlbumTypeDetectionConfig;

pub struct YearFallbackHandler {
    pending: Arc<PendingVerificationStore>,
    album_type_config: AlbumTypeDetectionConfig,
    fallback_enabled: bool,
    absurd_year_threshold: i32,
    year_difference_threshold: i32,
}

impl YearFallbackHandler {
    pub fn new(
        pending: Arc<PendingVerificationStore>,
        album_type_config: AlbumTypeDetectionConfig,
        fallback_enabled: bool,
        absurd_year_threshold: i32,
        year_difference_threshold: i32,
    ) -> Self {
        Self {
            pending,
            album_type_config,
            fallback_enabled,
            absurd_year_threshold,
            year_difference_threshold,
        }
    }

    /// Returns the year to apply, or `None` to skip the update entirely.
    pub async fn apply_year_fallback(
        &self,
        proposed_year: &str,
        album_tracks: &[Track],
        is_definitive: bool,
        artist: &str,
        album: &str,
    ) -> Result<Option<String>, PendingStoreError> {
        if !self.fallback_enabled {
            if !is_definitive {
                self.pending.mark_for_verification(artist, album, VerificationReason::NoYearFound, None, None).await?;
            }
            return Ok(Some(proposed_year.to_string()));
        }

        if is_definitive {
            log::debug!("[fallback] applying {proposed_year} for {artist} - {album} (high confidence)");
            return Ok(Some(proposed_year.to_string()));
        }

        let existing_year = Self::get_existing_year_from_tracks(album_tracks);

        if self.handle_absurd_year(proposed_year, existing_year.as_deref(), artist, album).await? {
            return Ok(None);
        }

        let Some(existing_year) = existing_year else {
            log::debug!("[fallback] applying {proposed_year} for {artist} - {album} (no existing year to preserve)");
            return Ok(Some(proposed_year.to_string()));
        };

        if let Some(result) = self.handle_special_album_type(proposed_year, &existing_year, artist, album).await? {
            return Ok(if result.is_empty() { None } else { Some(result) });
        }

        if self.handle_dramatic_year_change(proposed_year, &existing_year, artist, album).await? {
            return Ok(None);
        }

        log::debug!("[fallback] applying {proposed_year} for {artist} - {album} (low confidence but reasonable change)");
        Ok(Some(proposed_year.to_string()))
    }

    async fn handle_absurd_year(
        &self,
        proposed_year: &str,
        existing_year: Option<&str>,
        artist: &str,
        album: &str,
    ) -> Result<bool, PendingStoreError> {
        let is_absurd = proposed_year.parse::<i32>().is_ok_and(|y| y < self.absurd_year_threshold);

        if is_absurd && existing_year.is_none() {
            let metadata = serde_json::json!({
                "proposed_year": proposed_year,
                "absurd_threshold": self.absurd_year_threshold,
                "confidence": "very_low",
            });
            self.pending
                .mark_for_verification(artist, album, VerificationReason::AbsurdYearNoExisting, Some(metadata), None)
                .await?;
            log::warn!(
                "[fallback] skipping absurd year {proposed_year} for {artist} - {album} (< {} threshold, no existing year)",
                self.absurd_year_threshold
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// Returns `Some("")` to signal skip, `Some(year)` to apply, `None` to
    /// continue to the next rule (album is `Standard`).
    async fn handle_special_album_type(
        &self,
        proposed_year: &str,
        existing_year: &str,
        artist: &str,
        album: &str,
    ) -> Result<Option<String>, PendingStoreError> {
        let album_type = detect_album_type(album, &self.album_type_config);
        if album_type == AlbumType::Standard {
            return Ok(None);
        }

        if let Some(reason) = album_type.pending_reason() {
            let metadata = serde_json::json!({
                "existing_year": existing_year,
                "proposed_year": proposed_year,
                "album_type": format!("{album_type:?}").to_lowercase(),
                "confidence": "low",
            });
            self.pending.mark_for_verification(artist, album, reason, Some(metadata), None).await?;
        }

        match album_type.strategy() {
            YearHandlingStrategy::MarkAndSkip => {
                log::warn!(
                    "[fallback] skipping year update for {artist} - {album} (special album type {album_type:?}). existing: {existing_year}, proposed: {proposed_year}"
                );
                Ok(Some(String::new()))
            }
            YearHandlingStrategy::MarkAndUpdate => {
                log::info!("[fallback] updating year for {artist} - {album} (reissue detected)");
                Ok(Some(proposed_year.to_string()))
            }
            YearHandlingStrategy::Proceed => Ok(None),
        }
    }

    async fn handle_dramatic_year_change(
        &self,
        proposed_year: &str,
        existing_year: &str,
        artist: &str,
        album: &str,
    ) -> Result<bool, PendingStoreError> {
        if !self.is_year_change_dramatic(existing_year, proposed_year) {
            return Ok(false);
        }

        let diff = (existing_year.parse::<i32>().unwrap_or(0) - proposed_year.parse::<i32>().unwrap_or(0)).abs();
        let metadata = serde_json::json!({
            "existing_year": existing_year,
            "proposed_year": proposed_year,
            "year_difference": diff,
            "confidence": "low",
        });
        self.pending
            .mark_for_verification(artist, album, VerificationReason::SuspiciousYearChange, Some(metadata), None)
            .await?;
        log::warn!(
            "[fallback] preserving existing year {existing_year} for {artist} - {album} (dramatic change to {proposed_year}, diff > {})",
            self.year_difference_threshold
        );
        Ok(true)
    }

    /// Most frequently occurring non-empty `year` across the album's tracks.
    pub fn get_existing_year_from_tracks(tracks: &[Track]) -> Option<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for t in tracks {
            if let Some(y) = t.year() {
                if !is_empty_year(Some(y)) {
                    *counts.entry(y).or_default() += 1;
                }
            }
        }
        counts.into_iter().max_by_key(|(_, count)| *count).map(|(y, _)| y.to_string())
    }

    fn is_year_change_dramatic(&self, existing: &str, proposed: &str) -> bool {
        match (existing.parse::<i32>(), proposed.parse::<i32>()) {
            (Ok(e), Ok(p)) => (e - p).abs() > self.year_difference_threshold,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, year: Option<&str>) -> Track {
        Track::new(id, "Song", "Artist", "Album", None, None, year.map(str::to_string), None, None, None, None).unwrap()
    }

    fn handler(pending: Arc<PendingVerificationStore>) -> YearFallbackHandler {
        YearFallbackHandler::new(pending, AlbumTypeDetectionConfig::default(), true, 1950, 5)
    }

    fn store() -> Arc<PendingVerificationStore> {
        Arc::new(PendingVerificationStore::new(std::env::temp_dir().join(format!("fallback-test-{}.csv", std::process::id())), 7, 14))
    }

    #[tokio::test]
    async fn definitive_year_is_always_applied() {
        let h = handler(store());
        let result = h.apply_year_fallback("1997", &[], true, "Radiohead", "OK Computer").await.unwrap();
        assert_eq!(result, Some("1997".to_string()));
    }

    #[tokio::test]
    async fn no_existing_year_applies_proposed() {
        let h = handler(store());
        let tracks = vec![track("1", None)];
        let result = h.apply_year_fallback("1997", &tracks, false, "Radiohead", "OK Computer").await.unwrap();
        assert_eq!(result, Some("1997".to_string()));
    }

    #[tokio::test]
    async fn dramatic_change_preserves_existing() {
        let h = handler(store());
        let tracks = vec![track("1", Some("2018"))];
        let result = h.apply_year_fallback("1998", &tracks, false, "Artist", "Album").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn small_change_applies_proposed() {
        let h = handler(store());
        let tracks = vec![track("1", Some("1998"))];
        let result = h.apply_year_fallback("1999", &tracks, false, "Artist", "Album").await.unwrap();
        assert_eq!(result, Some("1999".to_string()));
    }

    #[tokio::test]
    async fn absurd_year_with_no_existing_is_skipped() {
        let h = handler(store());
        let result = h.apply_year_fallback("1200", &[], false, "Artist", "Ancient Compilation").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn compilation_album_is_marked_and_skipped() {
        let h = handler(store());
        let tracks = vec![track("1", Some("1998"))];
        let result = h.apply_year_fallback("1999", &tracks, false, "Artist", "Greatest Hits").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn reissue_album_is_marked_and_updated() {
        let h = handler(store());
        let tracks = vec![track("1", Some("1998"))];
        let result = h.apply_year_fallback("1999", &tracks, false, "Artist", "Album (Remastered)").await.unwrap();
        assert_eq!(result, Some("1999".to_string()));
    }

    #[tokio::test]
    async fn fallback_disabled_always_applies() {
        let mut h = handler(store());
        h.fallback_enabled = false;
        let tracks = vec![track("1", Some("2018"))];
        let result = h.apply_year_fallback("1998", &tracks, false, "Artist", "Album").await.unwrap();
        assert_eq!(result, Some("1998".to_string()));
    }
}
