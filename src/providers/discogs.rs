//! Discogs search (§4.5): single search query, optional per-result detail
//! fetch to recover a missing year, reissue-keyword detection.

use std::sync::Arc;

use crate::domain::ScoredRelease;
use crate::http::{HttpRequestExecutor, RequestOptions};
use crate::scoring::{ScoringContext, ScoringFn};
use crate::utils::normalizations::normalize_for_matching;

use super::{coerce_leading_year, ProviderClient, ProviderError};

const SEARCH_URL: &str = "https://api.discogs.com/database/search";
const RELEASE_URL: &str = "https://api.discogs.com/releases";
const API_NAME: &str = "discogs";
const MAX_DETAIL_FETCHES: usize = 10;

pub struct DiscogsClient {
    http: Arc<HttpRequestExecutor>,
    scoring_fn: ScoringFn,
    current_year: i32,
    reissue_keywords: Vec<String>,
}

impl DiscogsClient {
    pub fn new(http: Arc<HttpRequestExecutor>, scoring_fn: ScoringFn, current_year: i32, reissue_keywords: Vec<String>) -> Self {
        Self {
            http,
            scoring_fn,
            current_year,
            reissue_keywords: reissue_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn is_reissue_title(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.reissue_keywords.iter().any(|kw| lower.contains(kw.as_str()))
    }

    fn artist_matches(hit_title: &str, artist_norm: &str) -> bool {
        // Discogs search hits title as "Artist - Album"; try the parsed
        // artist segment first, falling back to a substring check.
        if let Some((artist_part, _)) = hit_title.split_once(" - ") {
            if normalize_for_matching(artist_part) == artist_norm {
                return true;
            }
        }
        normalize_for_matching(hit_title).contains(artist_norm)
    }

    async fn fetch_release_year(&self, release_id: u64) -> Option<String> {
        let url = format!("{RELEASE_URL}/{release_id}");
        let body = self.http.get_json(API_NAME, &url, RequestOptions::default()).await.ok()??;
        body.get("released")
            .or_else(|| body.get("year"))
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            .and_then(|raw| coerce_leading_year(&raw))
    }
}

#[async_trait::async_trait]
impl ProviderClient for DiscogsClient {
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
        let options = RequestOptions {
            query: vec![
                ("q".to_string(), format!("{artist_orig} {album_orig}")),
                ("type".to_string(), "release".to_string()),
                ("per_page".to_string(), "25".to_string()),
            ],
            ..Default::default()
        };
        let body = self
            .http
            .get_json(API_NAME, SEARCH_URL, options)
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        let Some(body) = body else { return Ok(Vec::new()) };

        let results = body.get("results").and_then(|v| v.as_array()).cloned().unwrap_or_default();

        let mut scored = Vec::new();
        let mut detail_fetches = 0usize;

        for hit in results {
            let title = hit.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            if !Self::artist_matches(&title, artist_norm) {
                continue;
            }

            let mut year = hit
                .get("year")
                .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
                .and_then(|raw| coerce_leading_year(&raw));

            if year.is_none() && detail_fetches < MAX_DETAIL_FETCHES {
                if let Some(id) = hit.get("id").and_then(|v| v.as_u64()) {
                    detail_fetches += 1;
                    year = self.fetch_release_year(id).await;
                }
            }

            let Some(year) = year else { continue };

            let mut candidate = ScoredRelease {
                title: title.clone(),
                year,
                score: 0.0,
                artist: title.split_once(" - ").map(|(a, _)| a.to_string()),
                album_type: hit.get("type").and_then(|v| v.as_str()).map(str::to_string),
                country: hit.get("country").and_then(|v| v.as_str()).map(str::to_string),
                status: Some("official".to_string()),
                format: hit
                    .get("format")
                    .and_then(|v| v.as_array())
                    .and_then(|f| f.first())
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                label: hit
                    .get("label")
                    .and_then(|v| v.as_array())
                    .and_then(|l| l.first())
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                catalog_number: hit.get("catno").and_then(|v| v.as_str()).map(str::to_string),
                barcode: None,
                disambiguation: None,
                source: API_NAME.to_string(),
                is_reissue: self.is_reissue_title(&title),
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
            scored.push(candidate);
        }

        Ok(scored)
    }
}
