//! Year reconciliation core: groups a music library's tracks by album,
//! determines each album's authoritative release year by consulting local
//! consistency, a persistent cache, and a set of external metadata
//! providers, and commits the result back through a `LibraryClient`.

pub mod batch;
pub mod cache;
pub mod cli;
pub mod decision;
pub mod domain;
pub mod http;
pub mod library;
pub mod orchestrator;
pub mod pending;
pub mod providers;
pub mod rate_limiter;
pub mod scoring;
pub mod snapshot;
pub mod utils;
