//! Pure year-validity predicates shared across the decision engine, the
//! scorer, and the cache tier. Kept dependency-free so every caller can use
//! them without pulling in chrono just to ask "is this year plausible".

/// A year is empty when it is absent, blank after trimming, or the literal
/// placeholder `"0"` that Music.app (and friends) use for "no year set".
pub fn is_empty_year(year: Option<&str>) -> bool {
    match year {
        None => true,
        Some(y) => {
            let trimmed = y.trim();
            trimmed.is_empty() || trimmed == "0"
        }
    }
}

/// `true` iff `year` parses as a 4-digit integer within `[min_valid_year, current_year + 1]`.
pub fn is_valid_year(year: &str, min_valid_year: i32, current_year: i32) -> bool {
    let trimmed = year.trim();
    if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match trimmed.parse::<i32>() {
        Ok(y) => y >= min_valid_year && y <= current_year + 1,
        Err(_) => false,
    }
}

/// Coerce a provider's free-form year field (e.g. `"1999-05-01T00:00:00Z"`)
/// down to its leading 4-digit year, if any.
pub fn coerce_leading_year(raw: &str) -> Option<String> {
    let digits: String = raw.chars().take(4).collect();
    if digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}
