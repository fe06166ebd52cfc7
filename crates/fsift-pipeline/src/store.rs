//! Bounded shared state: the duplicate-hash cache and per-session motion history.
//!
//! Both stores are shared across concurrent decisions and guard themselves
//! with a lock scoped to the store, never to the whole pipeline. Critical
//! sections cover only the read-then-write itself; fingerprints are always
//! computed outside the lock.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};
use tracing::debug;

use crate::fingerprint::similarity;

/// One cached frame fingerprint.
#[derive(Debug, Clone)]
pub struct ImageCacheEntry {
    pub fingerprint: String,
    pub inserted_at: DateTime<Utc>,
}

/// Best cache match for a lookup.
#[derive(Debug, Clone)]
pub struct CacheMatch {
    pub similarity: f64,
    pub fingerprint: String,
}

/// Outcome of a combined sweep + lookup + insert.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    /// Best match among entries that survived the sweep, if any.
    pub best: Option<CacheMatch>,
    /// Cache population at lookup time (after sweeping, before insert).
    pub size: usize,
}

/// Global bounded fingerprint cache with age-then-capacity eviction.
///
/// Entries older than the TTL are purged first; if the cache is still at
/// capacity the oldest remaining entries go next. Eviction is never
/// similarity-based. The cache is shared by every session.
#[derive(Debug, Default)]
pub struct HashCache {
    // Insertion-ordered: front is always the oldest entry.
    inner: Mutex<VecDeque<ImageCacheEntry>>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep expired entries, find the best match for `fingerprint`, then
    /// insert it, evicting oldest-first if over capacity. One lock scope so
    /// concurrent lookups of the same frame stay consistent.
    pub fn lookup_and_insert(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
        ttl_minutes: u32,
        max_entries: usize,
    ) -> CacheLookup {
        let mut entries = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        Self::sweep_locked(&mut entries, now, ttl_minutes);

        let best = entries
            .iter()
            .map(|entry| CacheMatch {
                similarity: similarity(fingerprint, &entry.fingerprint),
                fingerprint: entry.fingerprint.clone(),
            })
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity));
        let size = entries.len();

        // Make room before inserting; oldest-first.
        while entries.len() >= max_entries {
            entries.pop_front();
        }
        entries.push_back(ImageCacheEntry {
            fingerprint: fingerprint.to_string(),
            inserted_at: now,
        });

        CacheLookup { best, size }
    }

    /// Purge entries older than the TTL. Bounded single pass.
    pub fn sweep(&self, now: DateTime<Utc>, ttl_minutes: u32) {
        let mut entries = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        Self::sweep_locked(&mut entries, now, ttl_minutes);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "hash cache sweep");
        }
    }

    fn sweep_locked(entries: &mut VecDeque<ImageCacheEntry>, now: DateTime<Utc>, ttl_minutes: u32) {
        let cutoff = now - Duration::minutes(ttl_minutes as i64);
        // Insertion order means expired entries cluster at the front.
        while entries
            .front()
            .is_some_and(|entry| entry.inserted_at < cutoff)
        {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operator reset, e.g. after a configuration change invalidates hashes.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// The previous frame's fingerprint for one session.
#[derive(Debug, Clone)]
pub struct MotionHistoryEntry {
    pub fingerprint: String,
    pub touched_at: DateTime<Utc>,
}

/// Per-session motion baselines. Exactly one live entry per session,
/// overwritten on every call. Independent of the hash cache.
#[derive(Debug, Default)]
pub struct MotionHistory {
    inner: RwLock<HashMap<String, MotionHistoryEntry>>,
}

impl MotionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `fingerprint` as the session's new baseline and return the
    /// previous one, if any. Single write-lock scope for the read-then-write.
    pub fn swap(
        &self,
        session_id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let mut sessions = self.inner.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .insert(
                session_id.to_string(),
                MotionHistoryEntry {
                    fingerprint: fingerprint.to_string(),
                    touched_at: now,
                },
            )
            .map(|previous| previous.fingerprint)
    }

    /// Drop baselines for sessions idle longer than the TTL.
    pub fn sweep(&self, now: DateTime<Utc>, ttl_minutes: u32) {
        let cutoff = now - Duration::minutes(ttl_minutes as i64);
        let mut sessions = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, entry| entry.touched_at >= cutoff);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, remaining = sessions.len(), "motion history sweep");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
