use unicode_normalization::UnicodeNormalization;

/// Collaboration separators, tried in order; the first match wins and
/// everything before it is the artist of record for album grouping.
const COLLABORATION_SEPARATORS: [&str; 10] = [
    " & ", " feat. ", " ft. ", " vs. ", " with ", " and ", " x ", " feat ", " ft ", " vs ",
];

/// Case-folds, strips punctuation, and collapses whitespace. Used for
/// display-adjacent normalization (e.g. domain validation) where we still
/// want to keep the string human-legible.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .nfkc()
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalization used for cache keys and cross-provider matching:
/// Unicode-aware case folding, `&` -> `and`, punctuation stripped, whitespace
/// collapsed. Two strings that normalize identically are considered the same
/// artist/album for caching and dominance purposes.
pub fn normalize_for_matching(input: &str) -> String {
    let replaced = input.replace('&', " and ");
    replaced
        .nfkc()
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the primary artist from a collaboration credit by splitting on
/// the first recognized separator and keeping the leading segment.
pub fn normalize_collaboration_artist(artist: &str) -> &str {
    for sep in COLLABORATION_SEPARATORS {
        if let Some((head, _)) = artist.split_once(sep) {
            return head.trim();
        }
    }
    artist.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_matching_normalization() {
        let once = normalize_for_matching("Simon & Garfunkel!!");
        let twice = normalize_for_matching(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn ampersand_becomes_and() {
        assert_eq!(normalize_for_matching("AC/DC & Friends"), "acdc and friends");
    }

    #[test]
    fn collaboration_split() {
        assert_eq!(normalize_collaboration_artist("Drake feat. Rihanna"), "Drake");
        assert_eq!(normalize_collaboration_artist("Daft Punk & Pharrell"), "Daft Punk");
        assert_eq!(normalize_collaboration_artist("Solo Artist"), "Solo Artist");
    }
}
