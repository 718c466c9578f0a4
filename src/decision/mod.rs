//! Year Decision Engine (§4.8): the Consistency Checker, Determinator, and
//! Fallback Handler that turn an album's tracks into a year decision.

pub mod consistency;
pub mod determinator;
pub mod fallback;

pub use consistency::YearConsistencyChecker;
pub use determinator::{DecisionError, Determinator, YearDecision};
pub use fallback::YearFallbackHandler;
