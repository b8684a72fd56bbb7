//! Key/value cache with TTL.
//!
//! Two storages share one interface: an in-process `DashMap` (sharded, so
//! writes to different keys never contend) and a directory of JSON files named
//! by the SHA-256 of the key. Expiry is checked lazily on read; `purge_expired`
//! is available for an optional hygiene sweep.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::options::CacheLocation;

/// A cached value with its insertion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    #[must_use]
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.cached_at + to_chrono(ttl)
    }

    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.cached_at > to_chrono(ttl)
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Hex SHA-256 of a cache key, used as the on-disk file stem.
#[must_use]
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

enum Storage<T> {
    Memory(DashMap<String, CacheEntry<T>>),
    Disk(PathBuf),
}

/// TTL cache owned by one fetcher or scraper instance.
pub struct CacheStore<T> {
    storage: Storage<T>,
    ttl: Duration,
}

impl<T> std::fmt::Debug for CacheStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = match &self.storage {
            Storage::Memory(map) => format!("memory({} entries)", map.len()),
            Storage::Disk(dir) => format!("disk({})", dir.display()),
        };
        f.debug_struct("CacheStore")
            .field("storage", &storage)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl<T> CacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    #[must_use]
    pub fn memory(ttl: Duration) -> Self {
        Self {
            storage: Storage::Memory(DashMap::new()),
            ttl,
        }
    }

    /// Disk-backed cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn disk(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            storage: Storage::Disk(dir.into()),
            ttl,
        }
    }

    /// Build from configuration; disk caches get a `namespace` subdirectory.
    #[must_use]
    pub fn from_location(location: &CacheLocation, namespace: &str, ttl: Duration) -> Self {
        match location {
            CacheLocation::Memory => Self::memory(ttl),
            CacheLocation::Disk(dir) => Self::disk(dir.join(namespace), ttl),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live entry. Expired entries are removed and reported as misses.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let now = Utc::now();
        match &self.storage {
            Storage::Memory(map) => {
                let entry = map.get(key)?.clone();
                if entry.is_expired(self.ttl, now) {
                    // A concurrent put may have replaced the stale entry since the read.
                    if map.remove_if(key, |_, e| e.is_expired(self.ttl, now)).is_some() {
                        debug!(key, "cache entry expired");
                    }
                    return None;
                }
                Some(entry)
            }
            Storage::Disk(dir) => {
                let path = entry_path(dir, key);
                let content = std::fs::read_to_string(&path).ok()?;
                let entry: CacheEntry<T> = match serde_json::from_str(&content) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(key, error = %e, "discarding unreadable cache file");
                        let _ = std::fs::remove_file(&path);
                        return None;
                    }
                };
                if entry.key != key {
                    return None;
                }
                if entry.is_expired(self.ttl, now) {
                    let _ = std::fs::remove_file(&path);
                    debug!(key, "cache entry expired");
                    return None;
                }
                Some(entry)
            }
        }
    }

    /// Store `data` under `key`, replacing any previous entry wholesale.
    pub fn put(&self, key: &str, data: T) -> Result<CacheEntry<T>> {
        self.put_at(key, data, Utc::now())
    }

    pub(crate) fn put_at(&self, key: &str, data: T, cached_at: DateTime<Utc>) -> Result<CacheEntry<T>> {
        let entry = CacheEntry {
            key: key.to_string(),
            data,
            cached_at,
        };
        match &self.storage {
            Storage::Memory(map) => {
                map.insert(key.to_string(), entry.clone());
            }
            Storage::Disk(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| Error::Cache(e.to_string()))?;
                let content = serde_json::to_string(&entry).map_err(|e| Error::Cache(e.to_string()))?;
                let path = entry_path(dir, key);
                let tmp = path.with_extension("json.tmp");
                std::fs::write(&tmp, content).map_err(|e| Error::Cache(e.to_string()))?;
                std::fs::rename(&tmp, &path).map_err(|e| Error::Cache(e.to_string()))?;
            }
        }
        Ok(entry)
    }

    /// Remove one entry. Missing keys are not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        match &self.storage {
            Storage::Memory(map) => {
                map.remove(key);
            }
            Storage::Disk(dir) => {
                let path = entry_path(dir, key);
                if path.exists() {
                    std::fs::remove_file(&path).map_err(|e| Error::Cache(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    /// Remove every entry whose key satisfies `pred`, returning how many went.
    /// Disk entries are matched on the key stored inside each file.
    pub fn remove_where(&self, pred: impl Fn(&str) -> bool) -> Result<usize> {
        match &self.storage {
            Storage::Memory(map) => {
                let before = map.len();
                map.retain(|key, _| !pred(key.as_str()));
                Ok(before.saturating_sub(map.len()))
            }
            Storage::Disk(dir) => {
                let Ok(read_dir) = std::fs::read_dir(dir) else {
                    return Ok(0);
                };
                let mut removed = 0;
                for entry in read_dir.filter_map(std::result::Result::ok) {
                    let path = entry.path();
                    if path.extension().is_none_or(|x| x != "json") {
                        continue;
                    }
                    let matches = std::fs::read_to_string(&path)
                        .ok()
                        .and_then(|c| serde_json::from_str::<StoredKey>(&c).ok())
                        .is_some_and(|k| pred(k.key.as_str()));
                    if matches {
                        std::fs::remove_file(&path).map_err(|e| Error::Cache(e.to_string()))?;
                        removed += 1;
                    }
                }
                Ok(removed)
            }
        }
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        match &self.storage {
            Storage::Memory(map) => map.clear(),
            Storage::Disk(dir) => {
                if dir.exists() {
                    std::fs::remove_dir_all(dir).map_err(|e| Error::Cache(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        match &self.storage {
            Storage::Memory(map) => {
                let before = map.len();
                map.retain(|_, entry| !entry.is_expired(self.ttl, now));
                before.saturating_sub(map.len())
            }
            Storage::Disk(dir) => purge_dir(dir, self.ttl, now),
        }
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Memory(map) => map.len(),
            Storage::Disk(dir) => std::fs::read_dir(dir)
                .map(|rd| {
                    rd.filter_map(std::result::Result::ok)
                        .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
                        .count()
                })
                .unwrap_or(0),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", hash_key(key)))
}

#[derive(Deserialize)]
struct StoredKey {
    key: String,
}

#[derive(Deserialize)]
struct Stamp {
    cached_at: DateTime<Utc>,
}

fn purge_dir(dir: &Path, ttl: Duration, now: DateTime<Utc>) -> usize {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return 0;
    };
    let ttl = to_chrono(ttl);
    let mut removed = 0;
    for entry in read_dir.filter_map(std::result::Result::ok) {
        let path = entry.path();
        if path.extension().is_none_or(|x| x != "json") {
            continue;
        }
        let expired = std::fs::read_to_string(&path)
            .ok()
            .and_then(|c| serde_json::from_str::<Stamp>(&c).ok())
            .is_none_or(|s| now - s.cached_at > ttl);
        if expired && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}
