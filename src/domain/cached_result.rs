use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One provider's verdict for an `(artist, album, source)` triple. A
/// "negative" result (`year.is_none()`) is still cached — the whole point of
/// the API-response cache is to avoid re-querying providers that already
/// told us they had nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedApiResult {
    pub artist: String,
    pub album: String,
    pub year: Option<String>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub ttl: Option<i64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub api_response: Option<serde_json::Value>,
}

impl CachedApiResult {
    pub fn is_negative(&self) -> bool {
        self.year.is_none()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            None => false,
            Some(ttl_secs) => {
                let age = now.signed_duration_since(self.timestamp);
                age.num_seconds() >= ttl_secs
            }
        }
    }
}

/// The Album-Year cache's row. One of these exists per `(artist, album)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumCacheEntry {
    pub artist: String,
    pub album: String,
    pub year: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(ttl: Option<i64>, age_secs: i64) -> CachedApiResult {
        CachedApiResult {
            artist: "Radiohead".into(),
            album: "OK Computer".into(),
            year: Some("1997".into()),
            source: "musicbrainz".into(),
            timestamp: Utc::now() - Duration::seconds(age_secs),
            ttl,
            metadata: serde_json::Value::Null,
            api_response: None,
        }
    }

    #[test]
    fn infinite_ttl_never_expires() {
        assert!(!entry(None, 100_000_000).is_expired(Utc::now()));
    }

    #[test]
    fn finite_ttl_expires_past_threshold() {
        assert!(entry(Some(10), 20).is_expired(Utc::now()));
        assert!(!entry(Some(100), 20).is_expired(Utc::now()));
    }

    #[test]
    fn negative_result_has_no_year() {
        let mut e = entry(Some(10), 0);
        e.year = None;
        assert!(e.is_negative());
    }
}
