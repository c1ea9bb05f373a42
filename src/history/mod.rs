use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// The bucket key for the current instant: UNIX time truncated to whole
/// seconds (UTC). Two calls within the same calendar second resolve to
/// the same key.
pub fn bucket_key_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The `n` bucket keys of the window ending at `now`, newest first:
/// `now, now - 1, ..., now - (n - 1)`.
pub fn window_keys(now: u64, n: u32) -> Vec<u64> {
    (0..n as u64).map(|i| now.saturating_sub(i)).collect()
}

/// Per-bucket map from path to accumulated request weight
#[derive(Debug, Default)]
pub struct PathCounter {
    counts: DashMap<String, u64>,
}

impl PathCounter {
    /// Create an empty counter table
    pub fn new() -> Self {
        Self {
            counts: DashMap::new(),
        }
    }

    /// Add `weight` to `path`, creating the entry at zero if absent
    ///
    /// Atomic with respect to concurrent callers incrementing the same
    /// or different paths in this bucket.
    pub fn append(&self, path: &str, weight: u64) {
        *self.counts.entry(path.to_string()).or_insert(0) += weight;
    }

    /// The accumulated weight for `path`, or `None` if the path was never
    /// recorded in this bucket
    ///
    /// Absent is distinct from zero: the spike detector skips absent
    /// entries rather than folding them into its min/max.
    pub fn count(&self, path: &str) -> Option<u64> {
        self.counts.get(path).map(|c| *c)
    }

    /// Deep copy of this bucket's counts
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Number of distinct paths recorded in this bucket
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no paths were recorded yet
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Second-aligned history of per-path request counts
///
/// Buckets are created lazily on first access and never merged or
/// renumbered. Counts within a bucket only increase. Without a sweep
/// policy the store grows by one bucket per second that sees traffic,
/// for the life of the process.
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: DashMap<u64, Arc<PathCounter>>,
}

impl BucketStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// The counter table for `key`, created empty on first access
    pub fn bucket(&self, key: u64) -> Arc<PathCounter> {
        self.buckets
            .entry(key)
            .or_insert_with(|| {
                debug!("Creating bucket for second {}", key);
                Arc::new(PathCounter::new())
            })
            .clone()
    }

    /// The count for `path` in bucket `key`, without creating the bucket
    ///
    /// The bucket guard is released before the counter is read, so no
    /// two locks are ever held at once.
    pub fn count(&self, key: u64, path: &str) -> Option<u64> {
        let counter = self.buckets.get(&key).map(|entry| entry.value().clone())?;
        counter.count(path)
    }

    /// Deep copy of the full history
    ///
    /// Each bucket is consistent at the moment it is copied; increments
    /// committing after the copy point may be missed. Writers are only
    /// blocked for the duration of the copy itself.
    pub fn snapshot(&self) -> HashMap<u64, HashMap<String, u64>> {
        let counters: Vec<(u64, Arc<PathCounter>)> = self
            .buckets
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        counters
            .into_iter()
            .map(|(key, counter)| (key, counter.snapshot()))
            .collect()
    }

    /// Remove all buckets with a key older than `cutoff`, returning how
    /// many were removed
    pub fn prune_older_than(&self, cutoff: u64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|key, _| *key >= cutoff);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of buckets currently held
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the store holds no buckets
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
