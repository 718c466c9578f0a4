//! SHA-256 cache-key hashing, formulas per §4.3/§4.4.

use sha2::{Digest, Sha256};

use super::normalizations::normalize_for_matching;

fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Album-Year cache key: `sha256(normalize(artist) + "|" + normalize(album))`.
pub fn hash_album_key(artist: &str, album: &str) -> String {
    hex_digest(&format!(
        "{}|{}",
        normalize_for_matching(artist),
        normalize_for_matching(album)
    ))
}

/// API-response cache key: `sha256(normalize(source) + ":" + normalize(artist) + "|" + normalize(album))`.
pub fn hash_api_key(source: &str, artist: &str, album: &str) -> String {
    hex_digest(&format!(
        "{}:{}|{}",
        normalize_for_matching(source),
        normalize_for_matching(artist),
        normalize_for_matching(album)
    ))
}

/// Generic cache key: hashes a JSON-normalized representation of an
/// arbitrary key. Callers build the already-sorted `serde_json::Value`
/// (e.g. for the HTTP executor's `("api_request", api_name, url, params)`
/// tuple) and pass its canonical string form here.
pub fn hash_generic_key(normalized_json: &str) -> String {
    hex_digest(normalized_json)
}

/// Pending-verification key: `sha256("pending:" + artist + "|" + album)`.
///
/// The upstream Python hashes `"pending:" + track_id` in `hash_service.py`,
/// but every call site in this system (`mark_for_verification`,
/// `is_verification_needed`, `remove_from_pending`) is keyed by
/// `(artist, album)`, matching the explicit invariant in §3 ("keyed by a
/// stable hash of (artist, album)"). We follow the spec text here; see
/// DESIGN.md for the recorded decision.
pub fn hash_pending_key(artist: &str, album: &str) -> String {
    hex_digest(&format!("pending:{artist}|{album}"))
}
