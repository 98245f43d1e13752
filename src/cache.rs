//! TTL key/value cache backed by a single JSON file.
//!
//! Every `set` rewrites the whole cache file immediately — a durability over
//! performance tradeoff that suits this workload's low write frequency.
//! Expiry is checked lazily on read; there is no background sweep. An expired
//! key is evicted from the in-memory map on read but only leaves the file on
//! the next `set` (an accepted staleness window).
//!
//! Single writer only: two processes sharing one cache path can corrupt state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from loading or persisting the cache file.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("IO error for cache file {path}: {source}")]
    Io {
        /// The cache file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The cache file contents were not a valid entry map.
    #[error("malformed cache file {path}: {source}")]
    Malformed {
        /// The cache file path.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for storage.
    #[error("unserializable cache value for key {key}: {source}")]
    Value {
        /// The offending cache key.
        key: String,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// One cached value with its lifetime bounds (epoch seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value.
    pub value: serde_json::Value,
    /// When the entry was written.
    pub created_at: u64,
    /// The entry is logically absent once `now >= expires_at`.
    pub expires_at: u64,
}

/// Key/value store with per-entry expiry, persisted as a JSON map.
#[derive(Debug)]
pub struct CacheManager {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl CacheManager {
    /// Opens the cache at `path`, loading existing entries when present.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| CacheError::Malformed {
                path: path.clone(),
                source,
            })?
        } else {
            HashMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Returns the live value for `key`, or `default` on miss, expiry, or
    /// type mismatch. Expired keys are evicted from memory only.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str, default: T) -> T {
        let now = epoch_secs();
        let expired = match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => {
                return serde_json::from_value(entry.value.clone()).unwrap_or(default);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(key, "cache entry expired, evicting");
            self.entries.remove(key);
        }
        default
    }

    /// Stores `value` under `key` for `ttl`, rewriting the cache file.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the value cannot be serialized or the file
    /// cannot be written; persistence failures propagate to the caller.
    pub fn set<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Value {
            key: key.to_string(),
            source,
        })?;
        let now = epoch_secs();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl.as_secs(),
            },
        );
        self.flush()
    }

    /// Number of entries currently held in memory (live or not-yet-read).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are held in memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        let body =
            serde_json::to_string_pretty(&self.entries).map_err(|source| CacheError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        std::fs::write(&self.path, body).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
