//! Album-Year cache: CSV-persisted, keyed by a hash of `(artist, album)`
//! (§4.3.2). Exactly one `AlbumCacheEntry` per pair — writing a new one
//! replaces the prior.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::cache::generic::CacheError;
use crate::domain::AlbumCacheEntry;
use crate::utils::atomic_file::{read_if_exists, write_atomic};
use crate::utils::hashing::hash_album_key;

const HEADER: &str = "artist,album,year,timestamp";

struct Row {
    entry: AlbumCacheEntry,
}

pub struct AlbumYearCache {
    path: PathBuf,
    rows: Mutex<HashMap<String, Row>>,
}

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

impl AlbumYearCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(&self) -> Result<(), CacheError> {
        let Some(raw) = read_if_exists(&self.path).await.map_err(|e| CacheError::Io(e.to_string()))? else {
            return Ok(());
        };

        let mut rows = self.rows.lock().await;
        for line in raw.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields = parse_csv_line(line);
            if fields.len() < 4 {
                continue;
            }
            let (artist, album, year, timestamp) = (&fields[0], &fields[1], &fields[2], &fields[3]);
            let Ok(timestamp) = timestamp.parse::<f64>() else { continue };
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(
                timestamp.trunc() as i64,
                ((timestamp.fract()) * 1_000_000_000.0) as u32,
            ) else {
                continue;
            };

            let key = hash_album_key(artist, album);
            rows.insert(
                key,
                Row {
                    entry: AlbumCacheEntry {
                        artist: artist.clone(),
                        album: album.clone(),
                        year: year.clone(),
                        timestamp,
                    },
                },
            );
        }
        Ok(())
    }

    pub async fn get(&self, artist: &str, album: &str) -> Option<AlbumCacheEntry> {
        let key = hash_album_key(artist, album);
        let rows = self.rows.lock().await;
        let row = rows.get(&key)?;

        // Collision guard (P3): a hash match whose stored pair doesn't match
        // the request is treated as a miss, and the stored entry untouched.
        if row.entry.artist != artist || row.entry.album != album {
            return None;
        }
        Some(row.entry.clone())
    }

    pub async fn set(&self, entry: AlbumCacheEntry) -> Result<(), CacheError> {
        let key = hash_album_key(&entry.artist, &entry.album);
        {
            let mut rows = self.rows.lock().await;
            rows.insert(key, Row { entry });
        }
        self.persist().await
    }

    pub async fn invalidate(&self, artist: &str, album: &str) -> Result<(), CacheError> {
        let key = hash_album_key(artist, album);
        {
            let mut rows = self.rows.lock().await;
            rows.remove(&key);
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<(), CacheError> {
        let rows = self.rows.lock().await;
        let mut out = String::from(HEADER);
        out.push('\n');
        for row in rows.values() {
            let ts = row.entry.timestamp.timestamp() as f64
                + row.entry.timestamp.timestamp_subsec_micros() as f64 / 1_000_000.0;
            out.push_str(&format!(
                "{},{},{},{}\n",
                csv_escape(&row.entry.artist),
                csv_escape(&row.entry.album),
                csv_escape(&row.entry.year),
                ts
            ));
        }
        write_atomic(&self.path, &out).await.map_err(|e| CacheError::Io(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(artist: &str, album: &str, year: &str) -> AlbumCacheEntry {
        AlbumCacheEntry {
            artist: artist.to_string(),
            album: album.to_string(),
            year: year.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn roundtrips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("album_years.csv");

        let cache = AlbumYearCache::new(&path);
        cache.set(entry("Radiohead", "OK Computer", "1997")).await.unwrap();

        let reloaded = AlbumYearCache::new(&path);
        reloaded.load().await.unwrap();
        let got = reloaded.get("Radiohead", "OK Computer").await.unwrap();
        assert_eq!(got.year, "1997");
    }

    #[tokio::test]
    async fn one_entry_per_artist_album_pair() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AlbumYearCache::new(dir.path().join("album_years.csv"));
        cache.set(entry("Radiohead", "OK Computer", "1997")).await.unwrap();
        cache.set(entry("Radiohead", "OK Computer", "1998")).await.unwrap();

        let got = cache.get("Radiohead", "OK Computer").await.unwrap();
        assert_eq!(got.year, "1998");
    }
}
