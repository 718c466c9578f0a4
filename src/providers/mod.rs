//! Provider clients (§4.5): MusicBrainz, Discogs, Last.fm, iTunes.

pub mod discogs;
pub mod itunes;
pub mod lastfm;
pub mod musicbrainz;

use async_trait::async_trait;

use crate::domain::ScoredRelease;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("http executor error: {0}")]
    Http(String),
    #[error("unexpected response shape from {0}")]
    UnexpectedShape(&'static str),
}

/// Coerces a year in various formats (`"1997"`, `"1997-06-16"`,
/// `"1997-06-16T00:00:00Z"`) down to its leading 4 digits, per §4.5.
pub fn coerce_leading_year(raw: &str) -> Option<String> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    (digits.len() == 4).then_some(digits)
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn source_name(&self) -> &'static str;

    #[allow(clippy::too_many_arguments)]
    async fn get_scored_releases(
        &self,
        artist_norm: &str,
        album_norm: &str,
        artist_region: Option<&str>,
        artist_activity: Option<(i32, i32)>,
        artist_orig: &str,
        album_orig: &str,
    ) -> Result<Vec<ScoredRelease>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_full_datetime_to_year() {
        assert_eq!(coerce_leading_year("1997-06-16T00:00:00Z"), Some("1997".to_string()));
    }

    #[test]
    fn coerces_bare_year() {
        assert_eq!(coerce_leading_year("1997"), Some("1997".to_string()));
    }

    #[test]
    fn rejects_non_year_prefix() {
        assert_eq!(coerce_leading_year("unknown"), None);
        assert_eq!(coerce_leading_year("97"), None);
    }
}
