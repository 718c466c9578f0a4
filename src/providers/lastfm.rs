//! Last.fm three-strategy cascade (§4.5): exact `album.getInfo`, cleaned
//! album name, then `album.search` with tolerant artist matching.

use std::sync::Arc;

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::ScoredRelease;
use crate::http::{HttpRequestExecutor, RequestOptions};
use crate::scoring::{ScoringContext, ScoringFn};
use crate::utils::normalizations::normalize_for_matching;

use super::{coerce_leading_year, ProviderClient, ProviderError};

const BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";
const API_NAME: &str = "lastfm";

fn year_in_text_patterns() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("static pattern"))
}

pub struct LastFmClient {
    http: Arc<HttpRequestExecutor>,
    scoring_fn: ScoringFn,
    current_year: i32,
    api_key: String,
    reissue_keywords: Vec<String>,
}

impl LastFmClient {
    pub fn new(
        http: Arc<HttpRequestExecutor>,
        scoring_fn: ScoringFn,
        current_year: i32,
        api_key: String,
        reissue_keywords: Vec<String>,
    ) -> Self {
        Self {
            http,
            scoring_fn,
            current_year,
            api_key,
            reissue_keywords: reissue_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Splits off content after `:` (subtitle), then iteratively strips any
    /// configured remaster/reissue suffix, e.g.
    /// "OK Computer: Collector's Edition (Remastered)" -> "OK Computer".
    fn clean_album_name(&self, album: &str) -> String {
        let mut cleaned = album.split(':').next().unwrap_or(album).trim().to_string();

        loop {
            let lower = cleaned.to_lowercase();
            let Some(kw) = self.reissue_keywords.iter().find(|kw| lower.contains(kw.as_str())) else {
                break;
            };
            if let Some(idx) = lower.find(kw.as_str()) {
                cleaned = cleaned[..idx].trim().trim_end_matches(['(', '[', '-']).trim().to_string();
            } else {
                break;
            }
            if cleaned.is_empty() {
                break;
            }
        }
        cleaned
    }

    /// Tolerant artist equality: `"X, The"` <-> `"The X"`, trailing `"(N)"`
    /// disambiguation suffix stripped, substring fallback.
    fn artist_tolerant_match(candidate: &str, artist_norm: &str) -> bool {
        let stripped = Regex::new(r"\s*\(\d+\)\s*$").unwrap().replace(candidate, "").to_string();
        let normalized = normalize_for_matching(&stripped);
        if normalized == artist_norm {
            return true;
        }

        if let Some(rest) = normalized.strip_suffix(", the") {
            if normalize_for_matching(&format!("the {rest}")) == artist_norm {
                return true;
            }
        }
        if let Some(rest) = artist_norm.strip_prefix("the ") {
            if normalize_for_matching(&format!("{rest}, the")) == normalized {
                return true;
            }
        }

        normalized.contains(artist_norm) || artist_norm.contains(&normalized)
    }

    async fn call(&self, method: &str, extra: Vec<(String, String)>) -> Result<Option<serde_json::Value>, ProviderError> {
        let mut query = vec![
            ("method".to_string(), method.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
            ("format".to_string(), "json".to_string()),
        ];
        query.extend(extra);
        self.http
            .get_json(API_NAME, BASE_URL, RequestOptions { query, ..Default::default() })
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))
    }

    fn extract_year(&self, album_obj: &serde_json::Value) -> Option<String> {
        if let Some(release_date) = album_obj.get("releasedate").and_then(|v| v.as_str()) {
            if let Some(year) = coerce_leading_year(release_date.trim()) {
                return Some(year);
            }
        }

        if let Some(content) = album_obj
            .get("wiki")
            .and_then(|w| w.get("content"))
            .and_then(|v| v.as_str())
        {
            if let Some(m) = year_in_text_patterns().find(content) {
                return Some(m.as_str().to_string());
            }
        }

        album_obj
            .get("tags")
            .and_then(|t| t.get("tag"))
            .and_then(|v| v.as_array())
            .and_then(|tags| {
                tags.iter()
                    .filter_map(|t| t.get("name").and_then(|v| v.as_str()))
                    .find_map(coerce_leading_year)
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_candidate(
        &self,
        album_obj: &serde_json::Value,
        year: String,
        artist_norm: &str,
        album_norm: &str,
        artist_region: Option<&str>,
        artist_activity: Option<(i32, i32)>,
    ) -> ScoredRelease {
        let title = album_obj.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let mut candidate = ScoredRelease {
            title: title.clone(),
            year,
            score: 0.0,
            artist: album_obj.get("artist").and_then(|v| v.as_str().map(str::to_string).or_else(|| {
                v.get("name").and_then(|n| n.as_str()).map(str::to_string)
            })),
            album_type: None,
            country: None,
            status: Some("official".to_string()),
            format: None,
            label: None,
            catalog_number: None,
            barcode: None,
            disambiguation: None,
            source: API_NAME.to_string(),
            is_reissue: self.reissue_keywords.iter().any(|kw| title.to_lowercase().contains(kw.as_str())),
            release_group_match: false,
        };
        let ctx = ScoringContext {
            artist_norm,
            album_norm,
            artist_region,
            artist_activity,
            current_year: self.current_year,
            is_soundtrack: false,
        };
        candidate.score = (self.scoring_fn)(&candidate, &ctx);
        candidate
    }
}

#[async_trait::async_trait]
impl ProviderClient for LastFmClient {
    fn source_name(&self) -> &'static str {
        API_NAME
    }

    async fn get_scored_releases(
        &self,
        artist_norm: &str,
        album_norm: &str,
        artist_region: Option<&str>,
        artist_activity: Option<(i32, i32)>,
        artist_orig: &str,
        album_orig: &str,
    ) -> Result<Vec<ScoredRelease>, ProviderError> {
        // Strategy 1: exact getInfo.
        let exact = self
            .call(
                "album.getInfo",
                vec![("artist".to_string(), artist_orig.to_string()), ("album".to_string(), album_orig.to_string())],
            )
            .await?;
        if let Some(album_obj) = exact.as_ref().and_then(|b| b.get("album")) {
            if let Some(year) = self.extract_year(album_obj) {
                return Ok(vec![self.build_candidate(album_obj, year, artist_norm, album_norm, artist_region, artist_activity)]);
            }
        }

        // Strategy 2: cleaned album name.
        let cleaned = self.clean_album_name(album_orig);
        if cleaned != album_orig && !cleaned.is_empty() {
            let retry = self
                .call(
                    "album.getInfo",
                    vec![("artist".to_string(), artist_orig.to_string()), ("album".to_string(), cleaned)],
                )
                .await?;
            if let Some(album_obj) = retry.as_ref().and_then(|b| b.get("album")) {
                if let Some(year) = self.extract_year(album_obj) {
                    return Ok(vec![self.build_candidate(album_obj, year, artist_norm, album_norm, artist_region, artist_activity)]);
                }
            }
        }

        // Strategy 3: album.search, filter by tolerant artist match.
        let search = self
            .call("album.search", vec![("album".to_string(), album_orig.to_string())])
            .await?;
        let Some(search) = search else { return Ok(Vec::new()) };

        let hits = search
            .get("results")
            .and_then(|r| r.get("albummatches"))
            .and_then(|a| a.get("album"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut scored = Vec::new();
        for hit in hits {
            let hit_artist = hit.get("artist").and_then(|v| v.as_str()).unwrap_or_default();
            if !Self::artist_tolerant_match(hit_artist, artist_norm) {
                continue;
            }
            if let Some(year) = self.extract_year(&hit) {
                scored.push(self.build_candidate(&hit, year, artist_norm, album_norm, artist_region, artist_activity));
            }
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LastFmClient {
        LastFmClient::new(
            Arc::new(unsafe { std::mem::zeroed() }),
            std::sync::Arc::new(|_, _| 0.0),
            2026,
            "key".to_string(),
            vec!["remaster".to_string(), "deluxe".to_string()],
        )
    }

    #[test]
    fn cleans_subtitle_and_reissue_suffix() {
        let c = client();
        assert_eq!(c.clean_album_name("OK Computer: Collector's Edition"), "OK Computer");
        assert_eq!(c.clean_album_name("OK Computer (Remastered)"), "OK Computer");
    }

    #[test]
    fn tolerant_match_handles_the_suffix() {
        assert!(LastFmClient::artist_tolerant_match("Beatles, The", "the beatles"));
    }

    #[test]
    fn tolerant_match_strips_disambiguation_suffix() {
        assert!(LastFmClient::artist_tolerant_match("Genesis (2)", "genesis"));
    }
}
