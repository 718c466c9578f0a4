//! Consistency Checker (§4.8.1): local, API-free analysis of an album's
//! existing track years — dominant-year majority rule, parity detection,
//! release-year consensus, and anomaly tagging. Ported from the upstream
//! `YearConsistencyChecker`.

use std::collections::HashMap;

use crate::domain::validators::is_empty_year;
use crate::domain::Track;

const TOP_YEARS_COUNT: usize = 2;
const PARITY_THRESHOLD: usize = 1;
const DOMINANCE_MIN_SHARE: f64 = 0.5;

fn is_reasonable_year(year: &str, current_year: i32) -> bool {
    match year.parse::<i32>() {
        Ok(y) => (1900..=current_year + 1).contains(&y),
        Err(_) => false,
    }
}

pub struct YearConsistencyChecker {
    current_year: i32,
    top_years_count: usize,
    parity_threshold: usize,
    dominance_min_share: f64,
}

impl YearConsistencyChecker {
    pub fn new(current_year: i32) -> Self {
        Self {
            current_year,
            top_years_count: TOP_YEARS_COUNT,
            parity_threshold: PARITY_THRESHOLD,
            dominance_min_share: DOMINANCE_MIN_SHARE,
        }
    }

    /// Find the dominant year among ALL tracks in the album, using majority
    /// rule. `"0"` and empty years are excluded from the count entirely, but
    /// still count toward the denominator for dominance/coverage checks.
    pub fn get_dominant_year(&self, tracks: &[Track]) -> Option<String> {
        let years: Vec<String> = tracks
            .iter()
            .filter_map(|t| t.year())
            .filter(|y| !is_empty_year(Some(y)))
            .map(str::to_string)
            .collect();

        if years.is_empty() {
            return None;
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for y in &years {
            *counts.entry(y.clone()).or_default() += 1;
        }
        let total_album_tracks = tracks.len();
        let most_common = most_common(&counts, 1).into_iter().next()?;

        if let Some(result) = self.check_release_year_inconsistency(tracks, &years, &most_common.0) {
            return Some(result);
        }

        if (most_common.1 as f64) >= (total_album_tracks as f64) * self.dominance_min_share {
            log::info!(
                "dominant year {} found ({}/{} tracks)",
                most_common.0,
                most_common.1,
                total_album_tracks
            );
            return Some(most_common.0);
        }

        // Collaboration-album pattern: a single distinct year shared by some
        // tracks, the rest empty — trust it only if that year covers at
        // least `dominance_min_share` of ALL tracks, not just of non-empty ones.
        if counts.len() == 1 {
            let ratio = years.len() as f64 / total_album_tracks as f64;
            if ratio >= self.dominance_min_share {
                log::info!(
                    "using available year {} for tracks without years (collaboration pattern, {:.1}%)",
                    most_common.0,
                    ratio * 100.0
                );
                return Some(most_common.0);
            }
            log::info!(
                "not trusting year {} - only {}/{} tracks have it, rest empty",
                most_common.0,
                years.len(),
                total_album_tracks
            );
        }

        if self.check_year_parity(&counts) {
            return None;
        }

        log::info!(
            "no dominant year (below {:.0}%): {} has {}/{} album tracks",
            self.dominance_min_share * 100.0,
            most_common.0,
            most_common.1,
            total_album_tracks
        );
        None
    }

    fn check_release_year_inconsistency(&self, tracks: &[Track], years: &[String], most_common_year: &str) -> Option<String> {
        let unique_years: std::collections::HashSet<&String> = years.iter().collect();
        if unique_years.len() != 1 {
            return None;
        }

        let release_years: std::collections::HashSet<&str> = tracks
            .iter()
            .filter_map(|t| t.release_year())
            .filter(|y| !y.trim().is_empty())
            .collect();

        if release_years.len() > 1 {
            log::info!(
                "all tracks share year {} but release_year disagrees, using consistent track year",
                most_common_year
            );
            return Some(most_common_year.to_string());
        }
        None
    }

    fn check_year_parity(&self, counts: &HashMap<String, usize>) -> bool {
        let top = most_common(counts, self.top_years_count);
        if top.len() != self.top_years_count {
            return false;
        }
        let diff = top[0].1.abs_diff(top[1].1);
        if diff <= self.parity_threshold {
            log::info!("year parity detected: {} ({}) vs {} ({})", top[0].0, top[0].1, top[1].0, top[1].1);
            return true;
        }
        false
    }

    /// `release_year` if every track that carries one agrees, and the
    /// agreed value looks plausible.
    pub fn get_consensus_release_year(&self, tracks: &[Track]) -> Option<String> {
        let release_years: Vec<&str> = tracks.iter().filter_map(|t| t.release_year()).filter(|y| !y.trim().is_empty()).collect();
        if release_years.is_empty() {
            return None;
        }

        let unique: std::collections::HashSet<&str> = release_years.iter().copied().collect();
        if unique.len() == 1 {
            let year = *unique.iter().next().unwrap();
            if is_reasonable_year(year, self.current_year) {
                log::info!("consensus release_year: {} (all {} tracks agree)", year, release_years.len());
                return Some(year.to_string());
            }
        } else if unique.len() > 1 {
            log::info!("multiple release_years found, no consensus");
        }
        None
    }

    /// Tracks whose `year` disagrees with the dominant year (excluding
    /// empty/"0" placeholders, which are not anomalies, just unset).
    pub fn identify_anomalous_tracks<'a>(&self, tracks: &'a [Track], dominant_year: &str) -> Vec<&'a Track> {
        tracks
            .iter()
            .filter(|t| {
                t.year()
                    .map(|y| !is_empty_year(Some(y)) && y != dominant_year)
                    .unwrap_or(false)
            })
            .inspect(|t| log::info!("track '{}' has anomalous year {:?} (dominant: {dominant_year})", t.name(), t.year()))
            .collect()
    }
}

fn most_common(counts: &HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut items: Vec<(String, usize)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1));
    items.truncate(n);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, year: Option<&str>) -> Track {
        Track::new(id, "Song", "Artist", "Album", None, None, year.map(str::to_string), None, None, None, None).unwrap()
    }

    fn track_with_release_year(id: &str, year: Option<&str>, release_year: Option<&str>) -> Track {
        Track::new(
            id,
            "Song",
            "Artist",
            "Album",
            None,
            None,
            year.map(str::to_string),
            release_year.map(str::to_string),
            None,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn majority_year_is_dominant() {
        let checker = YearConsistencyChecker::new(2026);
        let tracks = vec![track("1", Some("1997")), track("2", Some("1997")), track("3", Some("1998"))];
        assert_eq!(checker.get_dominant_year(&tracks), Some("1997".to_string()));
    }

    #[test]
    fn parity_between_top_two_yields_no_dominant_year() {
        let checker = YearConsistencyChecker::new(2026);
        let tracks = vec![
            track("1", Some("1997")),
            track("2", Some("1997")),
            track("3", Some("1998")),
            track("4", Some("1998")),
        ];
        assert_eq!(checker.get_dominant_year(&tracks), None);
    }

    #[test]
    fn placeholder_years_are_excluded_from_counts() {
        let checker = YearConsistencyChecker::new(2026);
        let tracks = vec![track("1", Some("0")), track("2", Some("")), track("3", Some("1999"))];
        // only one non-empty year out of 3 tracks: 1/3 < 50% dominance share
        assert_eq!(checker.get_dominant_year(&tracks), None);
    }

    #[test]
    fn collaboration_pattern_trusts_sole_year_when_coverage_meets_share() {
        let checker = YearConsistencyChecker::new(2026);
        let tracks = vec![track("1", Some("1999")), track("2", Some("1999")), track("3", None)];
        assert_eq!(checker.get_dominant_year(&tracks), Some("1999".to_string()));
    }

    #[test]
    fn consistent_year_wins_over_disagreeing_release_year() {
        let checker = YearConsistencyChecker::new(2026);
        let tracks = vec![
            track_with_release_year("1", Some("1997"), Some("1997")),
            track_with_release_year("2", Some("1997"), Some("2007")),
        ];
        assert_eq!(checker.get_dominant_year(&tracks), Some("1997".to_string()));
    }

    #[test]
    fn consensus_release_year_requires_full_agreement() {
        let checker = YearConsistencyChecker::new(2026);
        let agree = vec![
            track_with_release_year("1", None, Some("1997")),
            track_with_release_year("2", None, Some("1997")),
        ];
        assert_eq!(checker.get_consensus_release_year(&agree), Some("1997".to_string()));

        let disagree = vec![
            track_with_release_year("1", None, Some("1997")),
            track_with_release_year("2", None, Some("2005")),
        ];
        assert_eq!(checker.get_consensus_release_year(&disagree), None);
    }

    #[test]
    fn anomalous_tracks_exclude_dominant_and_placeholder_years() {
        let checker = YearConsistencyChecker::new(2026);
        let tracks = vec![track("1", Some("1997")), track("2", Some("1998")), track("3", Some("0"))];
        let anomalous = checker.identify_anomalous_tracks(&tracks, "1997");
        assert_eq!(anomalous.len(), 1);
        assert_eq!(anomalous[0].id(), "2");
    }
}
