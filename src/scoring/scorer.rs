//! Per-release scoring (§4.6, first half): additive/subtractive terms
//! applied to one candidate release.

use crate::domain::ScoredRelease;
use crate::utils::config::ScoringConfig;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoringError {
    #[error("scoring config term '{0}' must be non-positive, got {1}")]
    PositivePenalty(&'static str, i32),
}

pub struct ScoringContext<'a> {
    pub artist_norm: &'a str,
    pub album_norm: &'a str,
    pub artist_region: Option<&'a str>,
    pub artist_activity: Option<(i32, i32)>,
    pub current_year: i32,
    pub is_soundtrack: bool,
}

pub struct ReleaseScorer<'a> {
    config: &'a ScoringConfig,
    major_market_codes: &'a [String],
}

impl<'a> ReleaseScorer<'a> {
    pub fn new(config: &'a ScoringConfig, major_market_codes: &'a [String]) -> Self {
        Self { config, major_market_codes }
    }

    pub fn score(&self, release: &ScoredRelease, ctx: &ScoringContext<'_>) -> f64 {
        let mut score = *self
            .config
            .base_score
            .get(&release.source)
            .unwrap_or(&0) as f64;

        let release_title_norm = crate::utils::normalizations::normalize_for_matching(&release.title);
        let artist_match = release
            .artist
            .as_deref()
            .map(crate::utils::normalizations::normalize_for_matching)
            .is_some_and(|a| a == ctx.artist_norm);
        let album_match = release_title_norm == ctx.album_norm;

        if artist_match {
            score += self.config.artist_exact_match_bonus as f64;
        }
        if album_match {
            score += self.config.album_exact_match_bonus as f64;
        }
        if artist_match && album_match {
            score += self.config.perfect_match_bonus as f64;
        } else if !album_match {
            if release_title_norm.contains(ctx.album_norm) || ctx.album_norm.contains(&release_title_norm) {
                score += self.config.album_variation_bonus as f64;
                score += self.config.album_substring_penalty as f64;
            } else {
                score += self.config.album_unrelated_penalty as f64;
            }
        }

        if release.release_group_match {
            score += self.config.release_group_match_bonus as f64;
        }

        if let Some(artist) = &release.artist {
            let release_script = crate::utils::script::detect_dominant_script([artist.as_str()]);
            let query_script = crate::utils::script::detect_dominant_script([ctx.artist_norm]);
            if release_script != query_script
                && !matches!(release_script, crate::utils::script::ScriptType::Unknown)
                && !matches!(query_script, crate::utils::script::ScriptType::Unknown)
            {
                score += self.config.cross_script_artist_penalty as f64;
            }
        }

        if let Some(album_type) = &release.album_type {
            let album_type_lower = album_type.to_lowercase();
            match album_type_lower.as_str() {
                "album" => score += self.config.album_type_bonus as f64,
                "ep" | "single" => score += self.config.ep_single_penalty as f64,
                "compilation" | "live" => score += self.config.compilation_live_penalty as f64,
                _ => {}
            }
        }

        if let Some(status) = &release.status {
            match status.to_lowercase().as_str() {
                "official" => score += self.config.status_official_bonus as f64,
                "bootleg" | "promotion" | "promo" => score += self.config.status_bootleg_promo_penalty as f64,
                _ => {}
            }
        }

        if release.is_reissue {
            score += self.config.reissue_penalty as f64;
        }

        if let Some(year) = release.year_as_i32() {
            if let Some((begin, end)) = ctx.artist_activity {
                if year < begin {
                    score += self.config.year_before_activity_penalty as f64;
                    score += self.scaled_year_diff_penalty((begin - year) as f64);
                } else if end > 0 && year > end {
                    score += self.config.year_after_activity_penalty as f64;
                    score += self.scaled_year_diff_penalty((year - end) as f64);
                } else if (year - begin).abs() <= 1 {
                    score += self.config.year_near_activity_start_bonus as f64;
                }
            }
            if year > ctx.current_year {
                score += self.config.future_year_penalty as f64;
            }
        }

        if let Some(country) = &release.country {
            if let Some(region) = ctx.artist_region {
                if country.eq_ignore_ascii_case(region) {
                    score += self.config.artist_region_match_bonus as f64;
                }
            }
            if self.major_market_codes.iter().any(|code| code.eq_ignore_ascii_case(country)) {
                score += self.config.major_market_bonus as f64;
            }
        }

        match release.source.as_str() {
            "musicbrainz" => score += self.config.musicbrainz_source_bonus as f64,
            "discogs" => score += self.config.discogs_source_bonus as f64,
            "itunes" => score += self.config.itunes_source_bonus as f64,
            _ => {}
        }

        if ctx.is_soundtrack {
            score += self.config.soundtrack_compensation as f64;
        }

        score
    }

    /// Additional penalty proportional to distance outside the artist's
    /// activity window, scaled by `year_diff_penalty_scale` and bounded by
    /// `year_diff_penalty_cap` (both non-positive).
    fn scaled_year_diff_penalty(&self, distance: f64) -> f64 {
        let scaled = self.config.year_diff_penalty_scale as f64 * distance;
        scaled.max(self.config.year_diff_penalty_cap as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> ScoringConfig {
        ScoringConfig {
            base_score: HashMap::from([("musicbrainz".to_string(), 50)]),
            artist_exact_match_bonus: 20,
            album_exact_match_bonus: 20,
            perfect_match_bonus: 15,
            album_variation_bonus: 5,
            album_substring_penalty: -5,
            album_unrelated_penalty: -30,
            release_group_match_bonus: 0,
            album_type_bonus: 10,
            ep_single_penalty: -15,
            compilation_live_penalty: -20,
            status_official_bonus: 10,
            status_bootleg_promo_penalty: -25,
            reissue_penalty: -10,
            year_diff_penalty_scale: 0,
            year_diff_penalty_cap: 0,
            year_before_activity_penalty: -15,
            year_after_activity_penalty: -15,
            year_near_activity_start_bonus: 5,
            artist_region_match_bonus: 5,
            major_market_bonus: 0,
            musicbrainz_source_bonus: 5,
            discogs_source_bonus: 3,
            itunes_source_bonus: 1,
            future_year_penalty: -50,
            cross_script_artist_penalty: -10,
            soundtrack_compensation: 0,
        }
    }

    fn no_market_codes() -> Vec<String> {
        Vec::new()
    }

    fn release() -> ScoredRelease {
        ScoredRelease {
            title: "OK Computer".to_string(),
            year: "1997".to_string(),
            score: 0.0,
            artist: Some("Radiohead".to_string()),
            album_type: Some("Album".to_string()),
            country: None,
            status: Some("Official".to_string()),
            format: None,
            label: None,
            catalog_number: None,
            barcode: None,
            disambiguation: None,
            source: "musicbrainz".to_string(),
            is_reissue: false,
            release_group_match: false,
        }
    }

    #[test]
    fn perfect_match_scores_highest() {
        let cfg = config();
        let codes = no_market_codes();
        let scorer = ReleaseScorer::new(&cfg, &codes);
        let ctx = ScoringContext {
            artist_norm: "radiohead",
            album_norm: "ok computer",
            artist_region: None,
            artist_activity: None,
            current_year: 2026,
            is_soundtrack: false,
        };
        let score = scorer.score(&release(), &ctx);
        // 50 base + 20 artist + 20 album + 15 perfect + 10 album-type + 10 status + 5 mb source
        assert_eq!(score, 130.0);
    }

    #[test]
    fn future_year_is_penalized() {
        let cfg = config();
        let codes = no_market_codes();
        let scorer = ReleaseScorer::new(&cfg, &codes);
        let mut r = release();
        r.year = "2099".to_string();
        let ctx = ScoringContext {
            artist_norm: "radiohead",
            album_norm: "ok computer",
            artist_region: None,
            artist_activity: None,
            current_year: 2026,
            is_soundtrack: false,
        };
        let score = scorer.score(&r, &ctx);
        assert!(score < 130.0);
    }

    #[test]
    fn release_group_match_adds_bonus() {
        let mut cfg = config();
        cfg.release_group_match_bonus = 8;
        let codes = no_market_codes();
        let scorer = ReleaseScorer::new(&cfg, &codes);
        let ctx = ScoringContext {
            artist_norm: "radiohead",
            album_norm: "ok computer",
            artist_region: None,
            artist_activity: None,
            current_year: 2026,
            is_soundtrack: false,
        };
        let mut matched = release();
        matched.release_group_match = true;
        let score = scorer.score(&matched, &ctx);
        let baseline = scorer.score(&release(), &ctx);
        assert_eq!(score - baseline, 8.0);
    }

    #[test]
    fn major_market_country_adds_bonus() {
        let mut cfg = config();
        cfg.major_market_bonus = 4;
        let codes = vec!["US".to_string(), "GB".to_string()];
        let scorer = ReleaseScorer::new(&cfg, &codes);
        let ctx = ScoringContext {
            artist_norm: "radiohead",
            album_norm: "ok computer",
            artist_region: None,
            artist_activity: None,
            current_year: 2026,
            is_soundtrack: false,
        };
        let mut r = release();
        r.country = Some("GB".to_string());
        let score = scorer.score(&r, &ctx);
        let mut other = release();
        other.country = Some("FR".to_string());
        let other_score = scorer.score(&other, &ctx);
        assert_eq!(score - other_score, 4.0);
    }

    #[test]
    fn cross_script_artist_name_is_penalized() {
        let cfg = config();
        let codes = no_market_codes();
        let scorer = ReleaseScorer::new(&cfg, &codes);
        // Neither candidate's artist matches "radiohead" exactly, so the
        // match-bonus terms stay equal; only the script comparison differs.
        let ctx = ScoringContext {
            artist_norm: "radiohead",
            album_norm: "ok computer",
            artist_region: None,
            artist_activity: None,
            current_year: 2026,
            is_soundtrack: false,
        };
        let mut same_script = release();
        same_script.artist = Some("Muse".to_string());
        let same_script_score = scorer.score(&same_script, &ctx);

        let mut cross_script = release();
        cross_script.artist = Some("Ленинград".to_string());
        let cross_script_score = scorer.score(&cross_script, &ctx);

        assert_eq!(same_script_score - cross_script_score, 10.0);
    }

    #[test]
    fn year_diff_penalty_scales_with_distance_and_is_capped() {
        let mut cfg = config();
        cfg.year_diff_penalty_scale = -2;
        cfg.year_diff_penalty_cap = -20;
        let codes = no_market_codes();
        let scorer = ReleaseScorer::new(&cfg, &codes);
        let ctx = ScoringContext {
            artist_norm: "radiohead",
            album_norm: "ok computer",
            artist_region: None,
            artist_activity: Some((1985, 2000)),
            current_year: 2026,
            is_soundtrack: false,
        };

        let mut within = release();
        within.year = "1990".to_string();
        let within_score = scorer.score(&within, &ctx);

        // 10 years past activity end: year_after_activity_penalty(-15) plus
        // a scaled penalty of 10 * -2 = -20 (not yet capped).
        let mut just_past = release();
        just_past.year = "2010".to_string();
        let just_past_score = scorer.score(&just_past, &ctx);
        assert_eq!(within_score - just_past_score, 35.0);

        // 20 years past: the scaled penalty would be 20 * -2 = -40, but the
        // cap holds it at -20, so the extra distance costs nothing more.
        let mut way_past = release();
        way_past.year = "2020".to_string();
        let way_past_score = scorer.score(&way_past, &ctx);
        assert_eq!(just_past_score, way_past_score);
    }
}
