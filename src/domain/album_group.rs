use super::Track;
use crate::utils::normalizations::normalize_collaboration_artist;

/// Derived grouping of tracks sharing `(album_artist_or_normalized_artist,
/// album)`. Transient — rebuilt from the library on every run, never
/// persisted directly (only decisions derived from it are).
#[derive(Debug, Clone)]
pub struct AlbumGroup {
    artist: String,
    album: String,
    tracks: Vec<Track>,
}

impl AlbumGroup {
    pub fn new(artist: impl Into<String>, album: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
            tracks,
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// The artist of record for this group, with collaboration credits
    /// stripped (e.g. "Drake feat. Rihanna" groups under "Drake").
    pub fn normalized_artist(&self) -> &str {
        normalize_collaboration_artist(&self.artist)
    }

    /// Any track carrying an existing non-empty `year`, used for local
    /// dominance/consistency analysis before any provider is consulted.
    pub fn existing_years(&self) -> Vec<&str> {
        self.tracks
            .iter()
            .filter_map(|t| t.year())
            .filter(|y| !crate::domain::validators::is_empty_year(Some(y)))
            .collect()
    }

    pub fn has_prerelease_track(&self) -> bool {
        self.tracks.iter().any(|t| matches!(t.track_status(), Some(s) if s.is_prerelease()))
    }
}

/// Groups tracks by `(effective album artist, album)`. Artist grouping keys
/// use the raw album-artist/artist field (not the collaboration-normalized
/// one) so two different collaborations on the same nominal artist don't
/// collapse into a single group prematurely; normalization is applied when a
/// group's *provider identity* is decided, not when tracks are bucketed.
pub fn group_tracks_by_album(tracks: Vec<Track>) -> Vec<AlbumGroup> {
    use std::collections::HashMap;

    let mut buckets: HashMap<(String, String), Vec<Track>> = HashMap::new();
    let mut order: Vec<(String, String)> = Vec::new();

    for track in tracks {
        let key = (
            track.effective_album_artist().to_string(),
            track.album().to_string(),
        );
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(track);
    }

    order
        .into_iter()
        .map(|key| {
            let tracks = buckets.remove(&key).unwrap_or_default();
            AlbumGroup::new(key.0, key.1, tracks)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::track::TrackStatus;

    fn track(id: &str, artist: &str, album: &str, year: Option<&str>) -> Track {
        Track::new(
            id,
            "Some Song",
            artist,
            album,
            None,
            None,
            year.map(str::to_string),
            None,
            None,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn groups_by_artist_and_album() {
        let tracks = vec![
            track("1", "Radiohead", "OK Computer", Some("1997")),
            track("2", "Radiohead", "OK Computer", Some("1997")),
            track("3", "Radiohead", "Kid A", Some("2000")),
        ];
        let groups = group_tracks_by_album(tracks);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].track_count(), 2);
        assert_eq!(groups[1].track_count(), 1);
    }

    #[test]
    fn normalized_artist_strips_collaboration_credit() {
        let group = AlbumGroup::new("Drake feat. Rihanna", "Take Care", vec![]);
        assert_eq!(group.normalized_artist(), "Drake");
    }

    #[test]
    fn existing_years_skips_empty_markers() {
        let tracks = vec![
            track("1", "A", "B", Some("0")),
            track("2", "A", "B", Some("1999")),
        ];
        let group = AlbumGroup::new("A", "B", tracks);
        assert_eq!(group.existing_years(), vec!["1999"]);
    }

    #[test]
    fn detects_prerelease_track() {
        let mut t = track("1", "A", "B", None);
        t = Track::new(
            t.id().to_string(),
            t.name().to_string(),
            t.artist().to_string(),
            t.album().to_string(),
            None,
            None,
            None,
            None,
            None,
            None,
            Some(TrackStatus::Prerelease),
        )
        .unwrap();
        let group = AlbumGroup::new("A", "B", vec![t]);
        assert!(group.has_prerelease_track());
    }
}
