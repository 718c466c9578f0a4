use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    YearUpdate,
    MetadataCleaning,
    ArtistRename,
}

/// One row of the append-only change log, persisted as JSONL (one
/// `ChangeLogEntry` per line) so a crashed run leaves a valid prefix of
/// entries rather than a half-written JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub change_type: ChangeType,
    pub track_id: String,
    pub artist: String,
    pub album_name: String,
    pub track_name: String,
    pub old_year: Option<String>,
    pub new_year: Option<String>,
    pub old_track_name: Option<String>,
    pub new_track_name: Option<String>,
    pub old_album_name: Option<String>,
    pub new_album_name: Option<String>,
}

impl ChangeLogEntry {
    pub fn year_update(
        track_id: impl Into<String>,
        artist: impl Into<String>,
        album_name: impl Into<String>,
        track_name: impl Into<String>,
        old_year: Option<String>,
        new_year: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            change_type: ChangeType::YearUpdate,
            track_id: track_id.into(),
            artist: artist.into(),
            album_name: album_name.into(),
            track_name: track_name.into(),
            old_year,
            new_year: Some(new_year.into()),
            old_track_name: None,
            new_track_name: None,
            old_album_name: None,
            new_album_name: None,
        }
    }

    pub fn to_jsonl_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_single_line_json() {
        let entry = ChangeLogEntry::year_update(
            "t1",
            "Radiohead",
            "OK Computer",
            "Airbag",
            Some("1996".into()),
            "1997",
            Utc::now(),
        );
        let line = entry.to_jsonl_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"new_year\":\"1997\""));
    }
}
