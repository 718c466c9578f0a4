//! Aggregation & selection (§4.6, second half) — ported from the upstream
//! `YearScoreResolver`: aggregate releases into `year -> [scores]`, pick a
//! winner, decide definitiveness.

use std::collections::HashMap;

use crate::domain::ScoredRelease;
use crate::domain::validators::is_valid_year;

const VERY_HIGH_SCORE_THRESHOLD: i32 = 75;
const MIN_REISSUE_YEAR_DIFFERENCE: i32 = 2;
const MIN_YEAR_GAP_FOR_REISSUE_DETECTION: i32 = 4;
const MAX_SUSPICIOUS_YEAR_DIFFERENCE: i32 = 3;
const MIN_CONFIDENT_SCORE_THRESHOLD: i32 = 85;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoreResolutionError {
    #[error("no releases with a valid year were provided")]
    NoValidYears,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearVerdict {
    pub year: String,
    pub is_definitive: bool,
}

pub struct YearScoreResolver {
    min_valid_year: i32,
    current_year: i32,
    definitive_score_threshold: i32,
    definitive_score_diff: i32,
}

impl YearScoreResolver {
    pub fn new(min_valid_year: i32, current_year: i32, definitive_score_threshold: i32, definitive_score_diff: i32) -> Self {
        Self {
            min_valid_year,
            current_year,
            definitive_score_threshold,
            definitive_score_diff,
        }
    }

    pub fn aggregate_year_scores(&self, releases: &[ScoredRelease]) -> HashMap<String, Vec<i32>> {
        let mut year_scores: HashMap<String, Vec<i32>> = HashMap::new();
        for release in releases {
            let year = &release.year;
            if is_valid_year(year, self.min_valid_year, self.current_year) {
                year_scores.entry(year.clone()).or_default().push(release.score as i32);
            }
        }
        year_scores
    }

    pub fn select_best_year(&self, year_scores: &HashMap<String, Vec<i32>>) -> Result<YearVerdict, ScoreResolutionError> {
        let final_scores = compute_final_year_scores(year_scores);
        let sorted = sort_years_by_score(&final_scores);
        if sorted.is_empty() {
            return Err(ScoreResolutionError::NoValidYears);
        }

        let (mut best_year, mut best_score, mut best_is_future) = self.determine_best_year_candidate(&sorted);

        if sorted.len() == 1 {
            let year_int: i32 = best_year.parse().unwrap_or(0);
            let year_diff = self.current_year - year_int;
            if year_diff > MAX_SUSPICIOUS_YEAR_DIFFERENCE && best_score < MIN_CONFIDENT_SCORE_THRESHOLD {
                return Ok(YearVerdict { year: best_year, is_definitive: false });
            }
            let is_definitive = best_score >= self.definitive_score_threshold;
            return Ok(YearVerdict { year: best_year, is_definitive });
        }

        let has_conflict = self.check_score_conflicts(&sorted, best_is_future);
        let very_high_score = best_score >= VERY_HIGH_SCORE_THRESHOLD;
        let high_score_met = best_score >= self.definitive_score_threshold;
        let is_definitive = high_score_met && !best_is_future && (very_high_score || !has_conflict);

        let _ = (&mut best_year, &mut best_score, &mut best_is_future);
        Ok(YearVerdict { year: best_year, is_definitive })
    }

    fn determine_best_year_candidate(&self, sorted: &[(String, i32)]) -> (String, i32, bool) {
        let (mut best_year, mut best_score) = sorted[0].clone();
        let mut best_is_future = best_year.parse::<i32>().unwrap_or(0) > self.current_year;

        if sorted.len() > 1 && best_is_future {
            let (second_year, second_score) = &sorted[1];
            let second_is_future = second_year.parse::<i32>().unwrap_or(0) > self.current_year;
            let score_diff = best_score - second_score;
            if score_diff < self.definitive_score_diff && !second_is_future {
                best_year = second_year.clone();
                best_score = *second_score;
                best_is_future = false;
            }
        }

        if sorted.len() > 1 && !best_is_future {
            let (adjusted_year, adjusted_score) = self.apply_original_release_preference(sorted, &best_year, best_score);
            best_year = adjusted_year;
            best_score = adjusted_score;
        }

        (best_year, best_score, best_is_future)
    }

    fn apply_original_release_preference(&self, sorted: &[(String, i32)], best_year: &str, best_score: i32) -> (String, i32) {
        let best_year_int: i32 = best_year.parse().unwrap_or(0);
        let all_years: Vec<i32> = sorted.iter().map(|(y, _)| y.parse().unwrap_or(0)).collect();

        let effective_threshold = if all_years.len() > 1 {
            let earliest = *all_years.iter().min().unwrap();
            let latest = *all_years.iter().max().unwrap();
            let gap = latest - earliest;
            if gap > MIN_YEAR_GAP_FOR_REISSUE_DETECTION && best_year_int > earliest {
                self.definitive_score_diff * 2
            } else {
                self.definitive_score_diff
            }
        } else {
            self.definitive_score_diff
        };

        let mut candidates: Vec<(String, i32)> = Vec::new();
        for (candidate_year, candidate_score) in &sorted[1..] {
            let candidate_year_int: i32 = candidate_year.parse().unwrap_or(0);
            let score_diff = best_score - candidate_score;
            let year_diff = best_year_int - candidate_year_int;

            if score_diff <= effective_threshold && year_diff >= MIN_REISSUE_YEAR_DIFFERENCE {
                candidates.push((candidate_year.clone(), *candidate_score));
            }
            if score_diff >= self.definitive_score_diff {
                break;
            }
        }

        if let Some((year, score)) = candidates.into_iter().min_by_key(|(y, _)| y.parse::<i32>().unwrap_or(0)) {
            return (year, score);
        }

        (best_year.to_string(), best_score)
    }

    fn check_score_conflicts(&self, sorted: &[(String, i32)], best_is_future: bool) -> bool {
        if sorted.len() <= 1 {
            return false;
        }
        let (_, best_score) = &sorted[0];
        let (second_year, second_score) = &sorted[1];
        let score_diff = best_score - second_score;

        if score_diff >= self.definitive_score_diff {
            return false;
        }

        let second_is_future = second_year.parse::<i32>().unwrap_or(0) > self.current_year;
        if !best_is_future && second_is_future {
            return false;
        }
        true
    }
}

fn compute_final_year_scores(year_scores: &HashMap<String, Vec<i32>>) -> HashMap<String, i32> {
    year_scores
        .iter()
        .filter_map(|(year, scores)| scores.iter().max().map(|max| (year.clone(), *max)))
        .collect()
}

fn sort_years_by_score(final_scores: &HashMap<String, i32>) -> Vec<(String, i32)> {
    let mut items: Vec<(String, i32)> = final_scores.iter().map(|(y, s)| (y.clone(), *s)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| {
        let ai: i32 = a.0.parse().unwrap_or(0);
        let bi: i32 = b.0.parse().unwrap_or(0);
        ai.cmp(&bi)
    }));
    items
}
