//! In-memory LRU cache with per-entry TTL (§4.3.1). No `moka`/`indexmap`
//! analog exists in the corpus this crate is grounded on, so the structure
//! is hand-rolled: an ordered map plus a heartbeat sweeper, same shape the
//! spec describes for the upstream implementation.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::utils::atomic_file::{read_if_exists, write_atomic};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("i/o error persisting cache: {0}")]
    Io(String),
    #[error("failed to (de)serialize cache entry: {0}")]
    Serde(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: serde_json::Value,
    expires_at: Option<f64>,
}

struct Entry {
    value: serde_json::Value,
    expires_at: Option<SystemTime>,
}

/// Ordered-by-recency map: front is LRU, back is MRU. A plain `Vec` of keys
/// alongside the `HashMap` keeps `get` cheap to reorder without pulling in
/// an external ordered-map crate.
struct Inner {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

pub struct GenericCache {
    max_entries: usize,
    inner: Mutex<Inner>,
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

impl GenericCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    fn touch(order: &mut Vec<String>, key: &str) {
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
        order.push(key.to_string());
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut guard = self.inner.lock().await;
        let expired = match guard.entries.get(key) {
            Some(entry) => matches!(entry.expires_at, Some(exp) if SystemTime::now() >= exp),
            None => return None,
        };
        if expired {
            guard.entries.remove(key);
            guard.order.retain(|k| k != key);
            return None;
        }

        Self::touch(&mut guard.order, key);
        guard.entries.get(key).map(|e| e.value.clone())
    }

    pub async fn set(&self, key: &str, value: serde_json::Value, ttl_seconds: Option<u64>) {
        let mut guard = self.inner.lock().await;
        let expires_at = ttl_seconds.map(|secs| SystemTime::now() + Duration::from_secs(secs));

        if !guard.entries.contains_key(key) && guard.entries.len() >= self.max_entries {
            if let Some(lru_key) = guard.order.first().cloned() {
                guard.entries.remove(&lru_key);
                guard.order.retain(|k| k != &lru_key);
            }
        }

        guard.entries.insert(key.to_string(), Entry { value, expires_at });
        Self::touch(&mut guard.order, key);
    }

    pub async fn remove(&self, key: &str) {
        let mut guard = self.inner.lock().await;
        guard.entries.remove(key);
        guard.order.retain(|k| k != key);
    }

    /// Removes every expired entry. Run periodically by a cancellable
    /// sweeper task owned by the Cache Orchestrator.
    pub async fn sweep_expired(&self) -> usize {
        let mut guard = self.inner.lock().await;
        let now = SystemTime::now();
        let expired_keys: Vec<String> = guard
            .entries
            .iter()
            .filter(|(_, e)| matches!(e.expires_at, Some(exp) if now >= exp))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired_keys {
            guard.entries.remove(key);
            guard.order.retain(|k| k != key);
        }
        expired_keys.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn save_to_disk(&self, path: &Path) -> Result<(), CacheError> {
        let guard = self.inner.lock().await;
        let map: HashMap<&String, StoredEntry> = guard
            .entries
            .iter()
            .map(|(k, e)| {
                (
                    k,
                    StoredEntry {
                        value: e.value.clone(),
                        expires_at: e.expires_at.map(|exp| {
                            exp.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
                        }),
                    },
                )
            })
            .collect();

        let json = serde_json::to_string_pretty(&map).map_err(|e| CacheError::Serde(e.to_string()))?;
        write_atomic(path, &json).await.map_err(|e| CacheError::Io(e.to_string()))
    }

    pub async fn load_from_disk(&self, path: &Path) -> Result<(), CacheError> {
        let Some(raw) = read_if_exists(path).await.map_err(|e| CacheError::Io(e.to_string()))? else {
            return Ok(());
        };
        let stored: HashMap<String, StoredEntry> =
            serde_json::from_str(&raw).map_err(|e| CacheError::Serde(e.to_string()))?;

        let now = now_epoch_secs();
        let mut guard = self.inner.lock().await;
        for (key, entry) in stored {
            if let Some(expires_at) = entry.expires_at {
                if expires_at <= now {
                    continue;
                }
            }
            let expires_at = entry
                .expires_at
                .map(|secs| UNIX_EPOCH + Duration::from_secs_f64(secs));
            guard.order.push(key.clone());
            guard.entries.insert(key, Entry { value: entry.value, expires_at });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn evicts_lru_on_overflow() {
        let cache = GenericCache::new(2);
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        cache.set("c", json!(3), None).await;

        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn get_moves_entry_to_mru() {
        let cache = GenericCache::new(2);
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        cache.get("a").await;
        cache.set("c", json!(3), None).await;

        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_miss() {
        let cache = GenericCache::new(10);
        cache.set("a", json!(1), Some(0)).await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(cache.get("a").await.is_none());
    }

    #[tokio::test]
    async fn roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generic.json");

        let cache = GenericCache::new(10);
        cache.set("a", json!({"year": "1997"}), None).await;
        cache.save_to_disk(&path).await.unwrap();

        let reloaded = GenericCache::new(10);
        reloaded.load_from_disk(&path).await.unwrap();
        assert_eq!(reloaded.get("a").await, Some(json!({"year": "1997"})));
    }
}
