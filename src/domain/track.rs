use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::normalizations::normalize_name;

use super::ValidationError;

/// Mirrors the host library's playback/availability state for a track.
/// Unknown values round-trip through `Other` rather than failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Subscription,
    Purchased,
    Prerelease,
    Matched,
    Uploaded,
    Other,
}

impl TrackStatus {
    pub fn is_prerelease(&self) -> bool {
        matches!(self, TrackStatus::Prerelease)
    }

    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "subscription" => TrackStatus::Subscription,
            "purchased" => TrackStatus::Purchased,
            "prerelease" => TrackStatus::Prerelease,
            "matched" => TrackStatus::Matched,
            "uploaded" => TrackStatus::Uploaded,
            _ => TrackStatus::Other,
        }
    }
}

/// Atomic library item. `id` is an opaque, library-assigned string — we never
/// construct or interpret it, only carry it through to `LibraryClient` calls.
///
/// `year` and `release_year` are left as raw, possibly-empty strings rather
/// than parsed integers: the library's own metadata is frequently empty,
/// `"0"`, or otherwise malformed, and normalizing that is the decision
/// engine's job (see [`super::validators::is_empty_year`]), not the domain
/// type's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    id: String,
    name: String,
    artist: String,
    album_artist: Option<String>,
    album: String,
    genre: Option<String>,
    year: Option<String>,
    release_year: Option<String>,
    date_added: Option<NaiveDateTime>,
    last_modified: Option<NaiveDateTime>,
    track_status: Option<TrackStatus>,
    #[serde(default)]
    extras: std::collections::HashMap<String, String>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Track {
    #[allow(clippy::too_many_arguments)]
    pub fn new<S, A>(
        id: S,
        name: A,
        artist: A,
        album: A,
        album_artist: Option<String>,
        genre: Option<String>,
        year: Option<String>,
        release_year: Option<String>,
        date_added: Option<NaiveDateTime>,
        last_modified: Option<NaiveDateTime>,
        track_status: Option<TrackStatus>,
    ) -> Result<Self, ValidationError>
    where
        S: Into<String>,
        A: Into<String>,
    {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::IdIsEmptyString);
        }

        let name = name.into();
        if normalize_name(&name).is_empty() {
            return Err(ValidationError::NameIsEmptyString);
        }

        Ok(Self {
            id,
            name,
            artist: artist.into(),
            album_artist,
            album: album.into(),
            genre,
            year,
            release_year,
            date_added,
            last_modified,
            track_status,
            extras: std::collections::HashMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// Falls back to `artist` when the library has no distinct album-artist
    /// tag, matching how most libraries behave for non-compilation albums.
    pub fn effective_album_artist(&self) -> &str {
        self.album_artist.as_deref().unwrap_or(&self.artist)
    }

    pub fn album_artist(&self) -> Option<&str> {
        self.album_artist.as_deref()
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    pub fn year(&self) -> Option<&str> {
        self.year.as_deref()
    }

    pub fn release_year(&self) -> Option<&str> {
        self.release_year.as_deref()
    }

    pub fn date_added(&self) -> Option<NaiveDateTime> {
        self.date_added
    }

    pub fn last_modified(&self) -> Option<NaiveDateTime> {
        self.last_modified
    }

    pub fn track_status(&self) -> Option<TrackStatus> {
        self.track_status
    }

    pub fn extras(&self) -> &std::collections::HashMap<String, String> {
        &self.extras
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// In-memory reflection of a committed year update. This does not write
    /// through to the host library — only `LibraryClient::update_property`
    /// does that; this exists so a freshly-written track's in-process view
    /// (e.g. change-log construction, batch re-grouping) is consistent
    /// without a round-trip re-fetch.
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }
}
