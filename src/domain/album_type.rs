use crate::domain::pending::VerificationReason;
use crate::utils::config::AlbumTypeDetectionConfig;

/// Classification of an album by its *name*, used by the Fallback Handler to
/// decide whether a non-definitive proposed year should still be written
/// (reissues) or deferred entirely (compilations, specials).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumType {
    Compilation,
    Special,
    Reissue,
    Standard,
}

/// What the Fallback Handler should do once an album has been classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearHandlingStrategy {
    MarkAndSkip,
    MarkAndUpdate,
    Proceed,
}

impl AlbumType {
    pub fn strategy(&self) -> YearHandlingStrategy {
        match self {
            AlbumType::Compilation => YearHandlingStrategy::MarkAndSkip,
            AlbumType::Special => YearHandlingStrategy::MarkAndSkip,
            AlbumType::Reissue => YearHandlingStrategy::MarkAndUpdate,
            AlbumType::Standard => YearHandlingStrategy::Proceed,
        }
    }

    pub fn pending_reason(&self) -> Option<VerificationReason> {
        match self {
            AlbumType::Compilation => Some(VerificationReason::SpecialAlbumCompilation),
            AlbumType::Special => Some(VerificationReason::SpecialAlbumSpecial),
            AlbumType::Reissue => Some(VerificationReason::SpecialAlbumReissue),
            AlbumType::Standard => None,
        }
    }
}

/// Keyword patterns applied when a config section leaves one of the lists
/// empty. These aren't named anywhere in the upstream album-type model we
/// grounded this module on (that file only carried the enum); the actual
/// keyword lists are invented here, drawing on the same remaster/live/deluxe
/// vocabulary used for reissue detection (`reissue_detection.reissue_keywords`)
/// and for album scoring cleanup.
fn default_compilation_patterns() -> Vec<&'static str> {
    vec!["greatest hits", "best of", "the collection", "anthology", "complete hits"]
}

fn default_special_patterns() -> Vec<&'static str> {
    vec!["live at", "live in", "live from", "ep]", "[ep]", "soundtrack", "b-sides", "rarities"]
}

fn default_reissue_patterns() -> Vec<&'static str> {
    vec!["remaster", "remastered", "reissue", "anniversary", "deluxe", "expanded edition"]
}

fn default_soundtrack_patterns() -> Vec<&'static str> {
    vec!["soundtrack", "original motion picture", "ost"]
}

fn matches_any(name_lower: &str, configured: &[String], defaults: &[&str]) -> bool {
    if configured.is_empty() {
        defaults.iter().any(|p| name_lower.contains(p))
    } else {
        configured.iter().any(|p| name_lower.contains(p.to_lowercase().as_str()))
    }
}

/// Classifies an album by name. Compilation is checked before Special before
/// Reissue, since a "Greatest Hits (Remastered)" should be treated as a
/// compilation — the stricter, skip-everything category — rather than a
/// reissue that would still get its year updated.
pub fn detect_album_type(album_name: &str, config: &AlbumTypeDetectionConfig) -> AlbumType {
    let lower = album_name.to_lowercase();

    let compilation_defaults = default_compilation_patterns();
    if matches_any(&lower, &config.compilation_patterns, &compilation_defaults) {
        return AlbumType::Compilation;
    }

    let special_defaults = default_special_patterns();
    if matches_any(&lower, &config.special_patterns, &special_defaults) {
        return AlbumType::Special;
    }

    let reissue_defaults = default_reissue_patterns();
    if matches_any(&lower, &config.reissue_patterns, &reissue_defaults) {
        return AlbumType::Reissue;
    }

    AlbumType::Standard
}

pub fn is_soundtrack(album_name: &str, config: &AlbumTypeDetectionConfig) -> bool {
    let lower = album_name.to_lowercase();
    matches_any(&lower, &config.soundtrack_patterns, &default_soundtrack_patterns())
}

pub fn is_various_artists(artist_name: &str, config: &AlbumTypeDetectionConfig) -> bool {
    let lower = artist_name.to_lowercase();
    if config.various_artists_names.is_empty() {
        lower == "various artists" || lower == "various"
    } else {
        config
            .various_artists_names
            .iter()
            .any(|name| name.to_lowercase() == lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> AlbumTypeDetectionConfig {
        AlbumTypeDetectionConfig::default()
    }

    #[test]
    fn detects_compilation_by_default_pattern() {
        assert_eq!(detect_album_type("Greatest Hits", &empty_config()), AlbumType::Compilation);
    }

    #[test]
    fn detects_reissue_by_default_pattern() {
        assert_eq!(
            detect_album_type("OK Computer (Remastered)", &empty_config()),
            AlbumType::Reissue
        );
    }

    #[test]
    fn standard_album_has_proceed_strategy() {
        assert_eq!(detect_album_type("OK Computer", &empty_config()), AlbumType::Standard);
        assert_eq!(AlbumType::Standard.strategy(), YearHandlingStrategy::Proceed);
    }

    #[test]
    fn compilation_takes_precedence_over_reissue() {
        assert_eq!(
            detect_album_type("Greatest Hits (Remastered)", &empty_config()),
            AlbumType::Compilation
        );
    }

    #[test]
    fn configured_patterns_override_defaults() {
        let config = AlbumTypeDetectionConfig {
            special_patterns: vec!["custom-flag".to_string()],
            ..Default::default()
        };
        assert_eq!(detect_album_type("Album custom-flag", &config), AlbumType::Special);
        assert_eq!(detect_album_type("Live at Wembley", &config), AlbumType::Standard);
    }

    #[test]
    fn recognizes_various_artists_default_names() {
        assert!(is_various_artists("Various Artists", &empty_config()));
        assert!(!is_various_artists("Radiohead", &empty_config()));
    }
}
