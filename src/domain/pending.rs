use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an album was deferred to the pending-verification queue instead of
/// having its year committed this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    NoYearFound,
    Prerelease,
    SuspiciousYearChange,
    AbsurdYearNoExisting,
    SpecialAlbumCompilation,
    SpecialAlbumSpecial,
    SpecialAlbumReissue,
    SuspiciousAlbumName,
    VeryLowConfidenceNoExisting,
    ImplausibleMatchingYear,
    ImplausibleProposedYear,
}

impl VerificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationReason::NoYearFound => "no_year_found",
            VerificationReason::Prerelease => "prerelease",
            VerificationReason::SuspiciousYearChange => "suspicious_year_change",
            VerificationReason::AbsurdYearNoExisting => "absurd_year_no_existing",
            VerificationReason::SpecialAlbumCompilation => "special_album_compilation",
            VerificationReason::SpecialAlbumSpecial => "special_album_special",
            VerificationReason::SpecialAlbumReissue => "special_album_reissue",
            VerificationReason::SuspiciousAlbumName => "suspicious_album_name",
            VerificationReason::VeryLowConfidenceNoExisting => "very_low_confidence_no_existing",
            VerificationReason::ImplausibleMatchingYear => "implausible_matching_year",
            VerificationReason::ImplausibleProposedYear => "implausible_proposed_year",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "no_year_found" => VerificationReason::NoYearFound,
            "prerelease" => VerificationReason::Prerelease,
            "suspicious_year_change" => VerificationReason::SuspiciousYearChange,
            "absurd_year_no_existing" => VerificationReason::AbsurdYearNoExisting,
            "special_album_compilation" => VerificationReason::SpecialAlbumCompilation,
            "special_album_special" => VerificationReason::SpecialAlbumSpecial,
            "special_album_reissue" => VerificationReason::SpecialAlbumReissue,
            "suspicious_album_name" => VerificationReason::SuspiciousAlbumName,
            "very_low_confidence_no_existing" => VerificationReason::VeryLowConfidenceNoExisting,
            "implausible_matching_year" => VerificationReason::ImplausibleMatchingYear,
            "implausible_proposed_year" => VerificationReason::ImplausibleProposedYear,
            _ => return None,
        })
    }
}

/// A CSV row in the pending-verification store, keyed (externally, by the
/// store) on a hash of `(artist, album)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAlbumEntry {
    pub timestamp: DateTime<Utc>,
    pub artist: String,
    pub album: String,
    pub reason: VerificationReason,
    pub metadata: String,
    pub attempt_count: u32,
}

impl PendingAlbumEntry {
    pub fn recheck_days(&self, default_days: u32) -> u32 {
        serde_json::from_str::<serde_json::Value>(&self.metadata)
            .ok()
            .and_then(|v| v.get("recheck_days").and_then(|n| n.as_u64()))
            .map(|n| n as u32)
            .unwrap_or(default_days)
    }
}
