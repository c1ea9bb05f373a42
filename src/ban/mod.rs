use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Registry of temporarily banned paths
///
/// A path is banned iff an entry exists and its expiry has not yet
/// passed. Expired entries are not proactively purged; only the
/// liveness check matters.
#[derive(Debug, Default)]
pub struct BanRegistry {
    bans: DashMap<String, Instant>,
}

impl BanRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            bans: DashMap::new(),
        }
    }

    /// Ban `path` for `duration` from now
    ///
    /// Unconditionally overwrites any prior ban for the path; durations
    /// are not cumulative.
    pub fn add(&self, path: &str, duration: Duration) {
        info!("Banning path {} for {:?}", path, duration);
        self.bans.insert(path.to_string(), Instant::now() + duration);
    }

    /// Whether `path` is currently banned
    ///
    /// A ban expiring exactly now still counts as active for that
    /// instant. Unknown paths are never banned.
    pub fn is_banned(&self, path: &str) -> bool {
        match self.bans.get(path) {
            Some(expiry) => *expiry >= Instant::now(),
            None => false,
        }
    }

    /// Number of entries held, including expired ones
    pub fn len(&self) -> usize {
        self.bans.len()
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.bans.is_empty()
    }
}
