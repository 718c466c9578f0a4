//! MusicBrainz release-group search (§4.5): three-tier fielded → broader →
//! album-only query, with artist-activity and region lookups.

use std::sync::Arc;

use futures::future::join_all;

use crate::domain::ScoredRelease;
use crate::http::{HttpRequestExecutor, RequestOptions};
use crate::scoring::{ScoringContext, ScoringFn};
use crate::utils::normalizations::normalize_for_matching;

use super::{coerce_leading_year, ProviderClient, ProviderError};

const BASE_URL: &str = "https://musicbrainz.org/ws/2";
const API_NAME: &str = "musicbrainz";

pub struct MusicBrainzClient {
    http: Arc<HttpRequestExecutor>,
    scoring_fn: ScoringFn,
    current_year: i32,
}

impl MusicBrainzClient {
    pub fn new(http: Arc<HttpRequestExecutor>, scoring_fn: ScoringFn, current_year: i32) -> Self {
        Self { http, scoring_fn, current_year }
    }

    fn lucene_escape(input: &str) -> String {
        let mut out = String::new();
        for c in input.chars() {
            if "+-&|!(){}[]^\"~*?:\\/".contains(c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    async fn search_release_groups(&self, query: &str) -> Result<Vec<serde_json::Value>, ProviderError> {
        let url = format!("{BASE_URL}/release-group");
        let options = RequestOptions {
            query: vec![("query".to_string(), query.to_string()), ("fmt".to_string(), "json".to_string())],
            ..Default::default()
        };
        let body = self
            .http
            .get_json(API_NAME, &url, options)
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let Some(body) = body else { return Ok(Vec::new()) };
        Ok(body
            .get("release-groups")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_releases_for_group(&self, group_id: &str) -> Result<Vec<serde_json::Value>, ProviderError> {
        let url = format!("{BASE_URL}/release");
        let options = RequestOptions {
            query: vec![
                ("release-group".to_string(), group_id.to_string()),
                ("inc".to_string(), "media".to_string()),
                ("fmt".to_string(), "json".to_string()),
            ],
            ..Default::default()
        };
        let body = self
            .http
            .get_json(API_NAME, &url, options)
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let Some(body) = body else { return Ok(Vec::new()) };
        Ok(body.get("releases").and_then(|v| v.as_array()).cloned().unwrap_or_default())
    }

    pub async fn get_artist_activity_period(&self, artist: &str) -> Result<Option<(i32, i32)>, ProviderError> {
        let query = format!("artist:\"{}\"", Self::lucene_escape(artist));
        let url = format!("{BASE_URL}/artist");
        let options = RequestOptions {
            query: vec![("query".to_string(), query), ("fmt".to_string(), "json".to_string())],
            ..Default::default()
        };
        let body = self
            .http
            .get_json(API_NAME, &url, options)
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let Some(body) = body else { return Ok(None) };
        let Some(first) = body.get("artists").and_then(|v| v.as_array()).and_then(|a| a.first()) else {
            return Ok(None);
        };

        let begin = first
            .get("life-span")
            .and_then(|ls| ls.get("begin"))
            .and_then(|v| v.as_str())
            .and_then(coerce_leading_year)
            .and_then(|y| y.parse::<i32>().ok());
        let end = first
            .get("life-span")
            .and_then(|ls| ls.get("end"))
            .and_then(|v| v.as_str())
            .and_then(coerce_leading_year)
            .and_then(|y| y.parse::<i32>().ok());

        match begin {
            Some(begin) => Ok(Some((begin, end.unwrap_or(0)))),
            None => Ok(None),
        }
    }

    pub async fn get_artist_region(&self, artist: &str) -> Result<Option<String>, ProviderError> {
        let query = format!("artist:\"{}\"", Self::lucene_escape(artist));
        let url = format!("{BASE_URL}/artist");
        let options = RequestOptions {
            query: vec![("query".to_string(), query), ("fmt".to_string(), "json".to_string())],
            ..Default::default()
        };
        let body = self
            .http
            .get_json(API_NAME, &url, options)
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let Some(body) = body else { return Ok(None) };
        Ok(body
            .get("artists")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|a| a.get("country"))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    fn release_group_matches_artist(rg: &serde_json::Value, artist_norm: &str) -> bool {
        rg.get("artist-credit")
            .and_then(|v| v.as_array())
            .map(|credits| {
                credits.iter().any(|c| {
                    c.get("name")
                        .or_else(|| c.get("artist").and_then(|a| a.get("name")))
                        .and_then(|v| v.as_str())
                        .map(normalize_for_matching)
                        .is_some_and(|n| n == artist_norm || {
                            c.get("artist")
                                .and_then(|a| a.get("aliases"))
                                .and_then(|v| v.as_array())
                                .is_some_and(|aliases| {
                                    aliases.iter().any(|alias| {
                                        alias
                                            .get("name")
                                            .and_then(|v| v.as_str())
                                            .map(normalize_for_matching)
                                            .is_some_and(|a| a == artist_norm)
                                    })
                                })
                        })
                })
            })
            .unwrap_or(false)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_release(
        &self,
        group: &serde_json::Value,
        release: &serde_json::Value,
        artist_norm: &str,
        album_norm: &str,
        artist_region: Option<&str>,
        artist_activity: Option<(i32, i32)>,
    ) -> Option<ScoredRelease> {
        let title = release
            .get("title")
            .and_then(|v| v.as_str())
            .or_else(|| group.get("title").and_then(|v| v.as_str()))?
            .to_string();

        let year = release
            .get("date")
            .and_then(|v| v.as_str())
            .or_else(|| group.get("first-release-date").and_then(|v| v.as_str()))
            .and_then(coerce_leading_year)?;

        let mut candidate = ScoredRelease {
            title,
            year,
            score: 0.0,
            artist: release
                .get("artist-credit")
                .and_then(|v| v.as_array())
                .and_then(|a| a.first())
                .and_then(|c| c.get("name"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            album_type: group.get("primary-type").and_then(|v| v.as_str()).map(str::to_string),
            country: release.get("country").and_then(|v| v.as_str()).map(str::to_string),
            status: release.get("status").and_then(|v| v.as_str()).map(str::to_string),
            format: release
                .get("media")
                .and_then(|v| v.as_array())
                .and_then(|m| m.first())
                .and_then(|m| m.get("format"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            label: None,
            catalog_number: None,
            barcode: release.get("barcode").and_then(|v| v.as_str()).map(str::to_string),
            disambiguation: release.get("disambiguation").and_then(|v| v.as_str()).map(str::to_string),
            source: API_NAME.to_string(),
            is_reissue: false,
            release_group_match: true,
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
        Some(candidate)
    }
}

#[async_trait::async_trait]
impl ProviderClient for MusicBrainzClient {
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
        let fielded = format!(
            "artist:\"{}\" AND releasegroup:\"{}\"",
            Self::lucene_escape(artist_orig),
            Self::lucene_escape(album_orig)
        );
        let mut groups = self.search_release_groups(&fielded).await?;

        if groups.is_empty() {
            let broad = format!("{artist_orig} {album_orig}");
            let candidates = self.search_release_groups(&broad).await?;
            groups = candidates
                .into_iter()
                .filter(|rg| Self::release_group_matches_artist(rg, artist_norm))
                .collect();
        }

        if groups.is_empty() {
            let candidates = self.search_release_groups(album_orig).await?;
            groups = candidates
                .into_iter()
                .filter(|rg| Self::release_group_matches_artist(rg, artist_norm))
                .collect();
        }

        groups.truncate(3);

        let fetches = groups.iter().map(|group| {
            let group_id = group.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            async move { (group.clone(), self.fetch_releases_for_group(&group_id).await) }
        });
        let results = join_all(fetches).await;

        let mut seen_ids = std::collections::HashSet::new();
        let mut scored = Vec::new();
        for (group, releases) in results {
            let releases = releases?;
            for release in releases {
                let id = release.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                if !seen_ids.insert(id) {
                    continue;
                }
                if let Some(candidate) = self.build_release(&group, &release, artist_norm, album_norm, artist_region, artist_activity) {
                    scored.push(candidate);
                }
            }
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lucene_escape_backslashes_reserved_chars() {
        assert_eq!(MusicBrainzClient::lucene_escape("AC/DC"), "AC\\/DC");
    }

    #[test]
    fn matches_artist_by_credit_name() {
        let rg = serde_json::json!({
            "artist-credit": [{"name": "Radiohead"}]
        });
        assert!(MusicBrainzClient::release_group_matches_artist(&rg, "radiohead"));
        assert!(!MusicBrainzClient::release_group_matches_artist(&rg, "muse"));
    }
}
