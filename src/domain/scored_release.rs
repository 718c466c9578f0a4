use serde::{Deserialize, Serialize};

/// A candidate release returned by a provider, already carrying its score.
/// `year` is kept as a string since providers return varying precision
/// (`"1997"`, `"1997-06-16"`) and only the leading 4 digits are ever trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRelease {
    pub title: String,
    pub year: String,
    pub score: f64,
    pub artist: Option<String>,
    pub album_type: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
    pub format: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub barcode: Option<String>,
    pub disambiguation: Option<String>,
    pub source: String,
    #[serde(default)]
    pub is_reissue: bool,
    /// Whether this candidate was drawn from a MusicBrainz release-group
    /// already confirmed to match the searched artist credit.
    #[serde(default)]
    pub release_group_match: bool,
}

impl ScoredRelease {
    pub fn year_as_i32(&self) -> Option<i32> {
        self.year.get(0..4)?.parse::<i32>().ok()
    }
}
