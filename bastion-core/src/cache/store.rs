//! TTL response cache.

use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

use crate::cache::key::CacheKey;
use crate::config::CacheConfig;

#[derive(Debug)]
struct CacheEntry {
    payload: Bytes,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Complete backend responses keyed by request, valid for a fixed TTL.
///
/// Stale entries are removed when read, by [`ResponseCache::purge_expired`], or
/// when the entry cap forces room for a new key. The cap is approximate under
/// concurrent inserts of distinct keys.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    /// Cache holding at most `max_entries` responses for `ttl` each.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: DashMap::new(),
        }
    }

    /// Build a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a fresh payload at the current time.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        self.get_at(key, Instant::now())
    }

    /// Fetch the payload for `key` if it is younger than the TTL at `now`.
    ///
    /// A stale entry is deleted and reported as absent.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<Bytes> {
        {
            let entry = self.entries.get(key)?;
            if entry.is_fresh(now, self.ttl) {
                tracing::debug!(key = %key, "cache hit");
                return Some(entry.payload.clone());
            }
        }

        // Another worker may have refreshed the entry since the read guard was dropped.
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_fresh(now, self.ttl))
            .is_some()
        {
            tracing::debug!(key = %key, "cache entry expired");
        }
        None
    }

    /// Store a complete response at the current time.
    pub fn put(&self, key: CacheKey, payload: Bytes) {
        self.put_at(key, payload, Instant::now());
    }

    /// Store `payload` under `key` as of `now`, replacing any previous entry.
    ///
    /// Empty payloads are ignored.
    pub fn put_at(&self, key: CacheKey, payload: Bytes, now: Instant) {
        if payload.is_empty() {
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room(now);
        }

        self.entries.insert(
            key,
            CacheEntry {
                payload,
                inserted_at: now,
            },
        );
    }

    /// Remove every entry that is stale at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&self, now: Instant) {
        if self.purge_expired(now) > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!(key = %key, "cache full, evicted oldest entry");
        }
    }
}
