//! Dominant-writing-system detection used to pick provider priority for
//! non-Latin artist/album names (see orchestrator §4.7 step 3).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    Latin,
    Cyrillic,
    Cjk,
    Arabic,
    Hebrew,
    Greek,
    Thai,
    Devanagari,
    Mixed,
    Unknown,
}

impl ScriptType {
    /// Config key used to look up `script_api_priorities` entries.
    pub fn config_key(&self) -> &'static str {
        match self {
            ScriptType::Latin => "default",
            ScriptType::Cyrillic => "cyrillic",
            ScriptType::Cjk => "cjk",
            ScriptType::Arabic => "arabic",
            ScriptType::Hebrew => "hebrew",
            ScriptType::Greek => "greek",
            ScriptType::Thai => "thai",
            ScriptType::Devanagari => "devanagari",
            ScriptType::Mixed => "default",
            ScriptType::Unknown => "default",
        }
    }

    pub fn is_latin(&self) -> bool {
        matches!(self, ScriptType::Latin)
    }
}

fn classify_char(c: char) -> Option<ScriptType> {
    match c as u32 {
        0x0041..=0x007A | 0x00C0..=0x024F => Some(ScriptType::Latin),
        0x0400..=0x04FF => Some(ScriptType::Cyrillic),
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0xAC00..=0xD7A3 => Some(ScriptType::Cjk),
        0x0600..=0x06FF => Some(ScriptType::Arabic),
        0x0590..=0x05FF => Some(ScriptType::Hebrew),
        0x0370..=0x03FF => Some(ScriptType::Greek),
        0x0E00..=0x0E7F => Some(ScriptType::Thai),
        0x0900..=0x097F => Some(ScriptType::Devanagari),
        _ => None,
    }
}

/// Detects the dominant script across `inputs`, combined into one classification.
///
/// Counts letters per script family and returns the plurality; if two or more
/// non-trivial families tie, returns `Mixed`. Returns `Unknown` when no
/// alphabetic character could be classified (e.g. purely numeric titles).
pub fn detect_dominant_script<'a>(inputs: impl IntoIterator<Item = &'a str>) -> ScriptType {
    use std::collections::HashMap;

    let mut counts: HashMap<ScriptType, usize> = HashMap::new();
    for input in inputs {
        for c in input.chars().filter(|c| c.is_alphabetic()) {
            if let Some(script) = classify_char(c) {
                *counts.entry(script).or_insert(0) += 1;
            }
        }
    }

    if counts.is_empty() {
        return ScriptType::Unknown;
    }

    let mut ranked: Vec<(ScriptType, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    if ranked.len() > 1 && ranked[0].1 == ranked[1].1 {
        return ScriptType::Mixed;
    }

    ranked[0].0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_latin() {
        assert_eq!(detect_dominant_script(["Radiohead", "OK Computer"]), ScriptType::Latin);
    }

    #[test]
    fn detects_cyrillic() {
        assert_eq!(detect_dominant_script(["Ленинград"]), ScriptType::Cyrillic);
    }

    #[test]
    fn detects_cjk() {
        assert_eq!(detect_dominant_script(["宇多田ヒカル"]), ScriptType::Cjk);
    }

    #[test]
    fn unknown_when_no_letters() {
        assert_eq!(detect_dominant_script(["123", "---"]), ScriptType::Unknown);
    }
}
