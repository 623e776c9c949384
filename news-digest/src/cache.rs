use crate::config::MAX_TTL_DAYS;
use crate::types::{DigestError, RawArticle, Result};
use crate::utils::text::normalize;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CACHE_FILE_NAME: &str = "article_cache.json";

/// Deterministic story key: SHA-256 of the normalized title and url.
pub fn fingerprint(article: &RawArticle) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(&article.title).as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize(&article.url).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Retention clamped to what `validate` accepts, so a caller skipping
/// validation cannot overflow the expiry arithmetic.
fn retention(ttl_days: i64) -> Duration {
    let days = ttl_days.clamp(1, MAX_TTL_DAYS);
    if days != ttl_days {
        warn!("cache ttl of {} days out of range, using {}", ttl_days, days);
    }
    Duration::try_days(days).unwrap_or_else(|| Duration::days(1))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub first_seen_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub oldest_first_seen: Option<DateTime<Utc>>,
}

/// TTL-bound fingerprint store persisted as one JSON file.
///
/// The store is handed to the orchestrator, which is its only writer. A store
/// that cannot be read starts empty and remembers why in `load_warning`.
#[derive(Debug)]
pub struct DedupCache {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: BTreeMap<String, CacheEntry>,
    load_warning: Option<String>,
}

impl DedupCache {
    /// Opens `<directory>/article_cache.json`. A missing file is an empty
    /// cache; an unreadable or corrupt one is too, with a warning.
    pub fn open(directory: impl AsRef<Path>, ttl_days: i64) -> Self {
        let path = directory.as_ref().join(CACHE_FILE_NAME);
        let mut cache = Self {
            path: Some(path.clone()),
            ttl: retention(ttl_days),
            entries: BTreeMap::new(),
            load_warning: None,
        };

        if !path.exists() {
            debug!("No cache file at {}, starting empty", path.display());
            return cache;
        }

        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                serde_json::from_str::<BTreeMap<String, CacheEntry>>(&raw).map_err(|e| e.to_string())
            });

        match loaded {
            Ok(entries) => {
                info!("Loaded {} cache entries from {}", entries.len(), path.display());
                cache.entries = entries;
            }
            Err(e) => {
                let message = format!("cache file {} unreadable, starting empty: {}", path.display(), e);
                warn!("{}", message);
                cache.load_warning = Some(message);
            }
        }

        cache
    }

    /// A cache that is never written to disk.
    pub fn in_memory(ttl_days: i64) -> Self {
        Self {
            path: None,
            ttl: retention(ttl_days),
            entries: BTreeMap::new(),
            load_warning: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, fingerprint: &str) -> Option<&CacheEntry> {
        self.entries.get(fingerprint)
    }

    /// True when a live entry exists for the article's fingerprint.
    pub fn is_duplicate(&self, article: &RawArticle, now: DateTime<Utc>) -> bool {
        self.entries
            .get(&fingerprint(article))
            .map(|entry| entry.is_live(now))
            .unwrap_or(false)
    }

    /// Inserts or refreshes the entry; `first_seen_at` survives a refresh of a
    /// live entry.
    pub fn record(&mut self, article: &RawArticle, now: DateTime<Utc>) {
        let key = fingerprint(article);
        let first_seen_at = self
            .entries
            .get(&key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.first_seen_at)
            .unwrap_or(now);

        self.entries.insert(
            key,
            CacheEntry {
                first_seen_at,
                expires_at: now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at >= now);
        let purged = before - self.entries.len();
        if purged > 0 {
            info!("Purged {} expired cache entries", purged);
        }
        purged
    }

    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        CacheStats {
            total: self.entries.len(),
            expired: self.entries.values().filter(|e| !e.is_live(now)).count(),
            oldest_first_seen: self.entries.values().map(|e| e.first_seen_at).min(),
        }
    }

    /// Writes the store atomically: a temp file next to the target, then a
    /// rename over it.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DigestError::Cache(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| DigestError::Cache(format!("cannot write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| DigestError::Cache(format!("cannot replace {}: {}", path.display(), e)))?;

        debug!("Flushed {} cache entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}
