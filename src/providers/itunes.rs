//! iTunes Search API (§4.5): `term`+`country`+`entity=album` lookup. Always
//! reports official/digital releases; no catalog numbers or barcodes.

use std::sync::Arc;

use crate::domain::ScoredRelease;
use crate::http::{HttpRequestExecutor, RequestOptions};
use crate::scoring::{ScoringContext, ScoringFn};
use crate::utils::normalizations::normalize_for_matching;

use super::{coerce_leading_year, ProviderClient, ProviderError};

const SEARCH_URL: &str = "https://itunes.apple.com/search";
const API_NAME: &str = "itunes";
const LIMIT: u32 = 25;

pub struct ITunesClient {
    http: Arc<HttpRequestExecutor>,
    scoring_fn: ScoringFn,
    current_year: i32,
    country: String,
}

impl ITunesClient {
    pub fn new(http: Arc<HttpRequestExecutor>, scoring_fn: ScoringFn, current_year: i32, country: String) -> Self {
        Self { http, scoring_fn, current_year, country }
    }
}

#[async_trait::async_trait]
impl ProviderClient for ITunesClient {
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
                ("term".to_string(), format!("{artist_orig} {album_orig}")),
                ("country".to_string(), self.country.clone()),
                ("entity".to_string(), "album".to_string()),
                ("limit".to_string(), LIMIT.to_string()),
            ],
            ..Default::default()
        };
        let body = self
            .http
            .get_json(API_NAME, SEARCH_URL, options)
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        let Some(body) = body else { return Ok(Vec::new()) };

        let hits = body.get("results").and_then(|v| v.as_array()).cloned().unwrap_or_default();

        let mut scored = Vec::new();
        for hit in hits {
            let artist_name = hit.get("artistName").and_then(|v| v.as_str()).unwrap_or_default();
            if normalize_for_matching(artist_name) != artist_norm {
                continue;
            }

            let title = hit.get("collectionName").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let Some(year) = hit
                .get("releaseDate")
                .and_then(|v| v.as_str())
                .and_then(coerce_leading_year)
            else {
                continue;
            };

            let mut candidate = ScoredRelease {
                title,
                year,
                score: 0.0,
                artist: Some(artist_name.to_string()),
                album_type: hit.get("collectionType").and_then(|v| v.as_str()).map(str::to_string),
                country: Some(self.country.clone()),
                status: Some("official".to_string()),
                format: Some("Digital".to_string()),
                label: hit.get("copyright").and_then(|v| v.as_str()).map(str::to_string),
                catalog_number: None,
                barcode: None,
                disambiguation: None,
                source: API_NAME.to_string(),
                is_reissue: false,
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
