pub mod resolver;
pub mod scorer;

use std::sync::Arc;

use crate::domain::ScoredRelease;

pub use resolver::{ScoreResolutionError, YearScoreResolver, YearVerdict};
pub use scorer::{ReleaseScorer, ScoringContext, ScoringError};

/// The decoupling point named in §9 ("cyclic coupling... decouple via an
/// injected function value"): provider clients call this instead of holding
/// a reference to the orchestrator's scorer directly.
pub type ScoringFn = Arc<dyn for<'a> Fn(&ScoredRelease, &ScoringContext<'a>) -> f64 + Send + Sync>;

pub fn scoring_fn_from_config(config: crate::utils::config::ScoringConfig, major_market_codes: Vec<String>) -> ScoringFn {
    Arc::new(move |release, ctx| ReleaseScorer::new(&config, &major_market_codes).score(release, ctx))
}
