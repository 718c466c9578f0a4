//! Durable recheck queue with attempt counters (§4.4).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{PendingAlbumEntry, VerificationReason};
use crate::utils::atomic_file::{read_if_exists, write_atomic};
use crate::utils::hashing::hash_pending_key;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PendingStoreError {
    #[error("i/o error persisting pending store: {0}")]
    Io(String),
}

const HEADER: &str = "artist,album,timestamp,reason,metadata,attempt_count";

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == ',' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

pub struct PendingVerificationStore {
    path: PathBuf,
    timestamp_marker_path: PathBuf,
    default_recheck_days: u32,
    auto_verify_days: u32,
    entries: Mutex<HashMap<String, PendingAlbumEntry>>,
}

impl PendingVerificationStore {
    pub fn new(path: impl Into<PathBuf>, default_recheck_days: u32, auto_verify_days: u32) -> Self {
        let path = path.into();
        let timestamp_marker_path = sibling_marker_path(&path);
        Self {
            path,
            timestamp_marker_path,
            default_recheck_days,
            auto_verify_days,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(&self) -> Result<(), PendingStoreError> {
        let raw = match read_if_exists(&self.path).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(()),
            // Read failures log and return empty rather than raising (§4.4).
            Err(_) => return Ok(()),
        };

        let mut entries = self.entries.lock().await;
        for line in raw.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields = parse_csv_line(line);
            if fields.len() < 6 {
                continue;
            }
            let (artist, album, timestamp, reason, metadata, attempt_count) =
                (&fields[0], &fields[1], &fields[2], &fields[3], &fields[4], &fields[5]);

            let Ok(timestamp) = DateTime::parse_from_str(&format!("{timestamp} +0000"), "%Y-%m-%d %H:%M:%S %z") else {
                continue;
            };
            let Some(reason) = VerificationReason::parse(reason) else { continue };
            let Ok(attempt_count) = attempt_count.parse::<u32>() else { continue };

            let key = hash_pending_key(artist, album);
            entries.insert(
                key,
                PendingAlbumEntry {
                    timestamp: timestamp.with_timezone(&Utc),
                    artist: artist.clone(),
                    album: album.clone(),
                    reason,
                    metadata: metadata.clone(),
                    attempt_count,
                },
            );
        }
        Ok(())
    }

    pub async fn mark_for_verification(
        &self,
        artist: &str,
        album: &str,
        reason: VerificationReason,
        metadata: Option<serde_json::Value>,
        recheck_days: Option<u32>,
    ) -> Result<(), PendingStoreError> {
        let key = hash_pending_key(artist, album);
        let recheck_days = recheck_days.or_else(|| {
            (reason == VerificationReason::Prerelease).then_some(self.default_recheck_days)
        });

        {
            let mut entries = self.entries.lock().await;
            let metadata_json = merge_metadata(
                entries.get(&key).map(|e| e.metadata.as_str()),
                metadata,
                recheck_days,
            );

            entries
                .entry(key)
                .and_modify(|e| {
                    e.attempt_count += 1;
                    e.timestamp = Utc::now();
                    e.reason = reason;
                    e.metadata = metadata_json.clone();
                })
                .or_insert_with(|| PendingAlbumEntry {
                    timestamp: Utc::now(),
                    artist: artist.to_string(),
                    album: album.to_string(),
                    reason,
                    metadata: metadata_json,
                    attempt_count: 1,
                });
        }
        self.persist().await
    }

    pub async fn is_verification_needed(&self, artist: &str, album: &str) -> bool {
        let key = hash_pending_key(artist, album);
        let entries = self.entries.lock().await;
        let Some(entry) = entries.get(&key) else { return false };

        let recheck_days = entry.recheck_days(self.default_recheck_days);
        let due_at = entry.timestamp + chrono::Duration::days(recheck_days as i64);
        Utc::now() >= due_at
    }

    pub async fn remove_from_pending(&self, artist: &str, album: &str) -> Result<(), PendingStoreError> {
        let key = hash_pending_key(artist, album);
        let removed = {
            let mut entries = self.entries.lock().await;
            entries.remove(&key).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(())
    }

    pub async fn get_all_pending_albums(&self) -> Vec<PendingAlbumEntry> {
        self.entries.lock().await.values().cloned().collect()
    }

    pub async fn get_pending_albums_by_reason(&self, reason: VerificationReason) -> Vec<PendingAlbumEntry> {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.reason == reason)
            .cloned()
            .collect()
    }

    pub async fn generate_problematic_albums_report(
        &self,
        report_path: &Path,
        min_attempts: u32,
    ) -> Result<usize, PendingStoreError> {
        let entries = self.entries.lock().await;
        let mut problematic: Vec<&PendingAlbumEntry> =
            entries.values().filter(|e| e.attempt_count >= min_attempts).collect();
        problematic.sort_by(|a, b| b.attempt_count.cmp(&a.attempt_count));

        let mut out = String::from(HEADER);
        out.push('\n');
        for entry in &problematic {
            out.push_str(&format!(
                "{},{},{},{},{},{}\n",
                csv_escape(&entry.artist),
                csv_escape(&entry.album),
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.reason.as_str(),
                csv_escape(&entry.metadata),
                entry.attempt_count,
            ));
        }
        write_atomic(report_path, &out).await.map_err(|e| PendingStoreError::Io(e.to_string()))?;
        Ok(problematic.len())
    }

    pub async fn should_auto_verify(&self) -> bool {
        match read_if_exists(&self.timestamp_marker_path).await {
            Ok(Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(last_epoch) => {
                    let last = DateTime::from_timestamp(last_epoch, 0).unwrap_or_else(Utc::now);
                    Utc::now() >= last + chrono::Duration::days(self.auto_verify_days as i64)
                }
                Err(_) => true,
            },
            Ok(None) => true,
            Err(_) => true,
        }
    }

    pub async fn update_verification_timestamp(&self) -> Result<(), PendingStoreError> {
        write_atomic(&self.timestamp_marker_path, &Utc::now().timestamp().to_string())
            .await
            .map_err(|e| PendingStoreError::Io(e.to_string()))
    }

    async fn persist(&self) -> Result<(), PendingStoreError> {
        let entries = self.entries.lock().await;
        let mut out = String::from(HEADER);
        out.push('\n');
        for entry in entries.values() {
            out.push_str(&format!(
                "{},{},{},{},{},{}\n",
                csv_escape(&entry.artist),
                csv_escape(&entry.album),
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.reason.as_str(),
                csv_escape(&entry.metadata),
                entry.attempt_count,
            ));
        }
        write_atomic(&self.path, &out).await.map_err(|e| PendingStoreError::Io(e.to_string()))
    }
}

fn sibling_marker_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pending".to_string());
    path.with_file_name(format!("{file_name}.last_auto_verify"))
}

fn merge_metadata(existing: Option<&str>, incoming: Option<serde_json::Value>, recheck_days: Option<u32>) -> String {
    let mut merged = existing
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .unwrap_or_else(|| serde_json::json!({}));

    if let Some(serde_json::Value::Object(map)) = incoming {
        if let Some(obj) = merged.as_object_mut() {
            for (k, v) in map {
                obj.insert(k, v);
            }
        }
    }
    if let Some(days) = recheck_days {
        if let Some(obj) = merged.as_object_mut() {
            obj.insert("recheck_days".to_string(), serde_json::json!(days));
        }
    }
    merged.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marking_twice_increments_attempt_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingVerificationStore::new(dir.path().join("pending.csv"), 7, 14);

        store
            .mark_for_verification("Radiohead", "OK Computer", VerificationReason::NoYearFound, None, None)
            .await
            .unwrap();
        store
            .mark_for_verification("Radiohead", "OK Computer", VerificationReason::NoYearFound, None, None)
            .await
            .unwrap();

        let all = store.get_all_pending_albums().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].attempt_count, 2);
    }

    #[tokio::test]
    async fn remove_then_is_not_needed() {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingVerificationStore::new(dir.path().join("pending.csv"), 7, 14);
        store
            .mark_for_verification("A", "B", VerificationReason::NoYearFound, None, None)
            .await
            .unwrap();
        store.remove_from_pending("A", "B").await.unwrap();
        assert!(!store.is_verification_needed("A", "B").await);
    }

    #[tokio::test]
    async fn roundtrips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.csv");
        let store = PendingVerificationStore::new(&path, 7, 14);
        store
            .mark_for_verification("Radiohead", "OK Computer", VerificationReason::SuspiciousYearChange, None, None)
            .await
            .unwrap();

        let reloaded = PendingVerificationStore::new(&path, 7, 14);
        reloaded.load().await.unwrap();
        let all = reloaded.get_all_pending_albums().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].reason, VerificationReason::SuspiciousYearChange);
    }

    #[tokio::test]
    async fn prerelease_reason_defaults_recheck_days() {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingVerificationStore::new(dir.path().join("pending.csv"), 7, 14);
        store
            .mark_for_verification("A", "B", VerificationReason::Prerelease, None, None)
            .await
            .unwrap();

        let all = store.get_all_pending_albums().await;
        assert_eq!(all[0].recheck_days(7), 7);
    }
}
