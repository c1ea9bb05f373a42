use crate::ban::BanRegistry;
use crate::config::{GateConfig, RetentionPolicy};
use crate::detector::SpikeDetector;
use crate::error::Result;
use crate::history::{bucket_key_now, BucketStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The per-request entry point composing history, ban registry and
/// spike detector
///
/// All shared state is owned by the gate itself, so multiple independent
/// gates (e.g. per route group) can coexist and tests can build isolated
/// instances. A gate always has its stores; there is no uninitialized
/// state to guard against at request time.
pub struct Gate {
    store: Arc<BucketStore>,
    bans: Arc<BanRegistry>,
    detector: SpikeDetector,
    config: GateConfig,
}

impl Gate {
    /// Build a gate from a configuration, validating it first
    pub fn new(config: GateConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing spike gate: {}% increase over {}s window, {} request floor, {}s bans",
            config.block_after_percent_increase,
            config.check_last_n_seconds,
            config.enable_check_after_n_requests,
            config.ban_secs
        );

        let store = Arc::new(BucketStore::new());
        let bans = Arc::new(BanRegistry::new());
        let detector = SpikeDetector::new(store.clone(), bans.clone(), &config);

        Ok(Self {
            store,
            bans,
            detector,
            config,
        })
    }

    /// Record one request for `path` in the current-second bucket
    pub fn record(&self, path: &str) {
        self.record_weighted(path, 1);
    }

    /// Record a request for `path` with an explicit weight
    ///
    /// Useful for non-uniform cost accounting, e.g. expensive endpoints
    /// counting as several requests.
    pub fn record_weighted(&self, path: &str, weight: u64) {
        self.store.bucket(bucket_key_now()).append(path, weight);
    }

    /// Allow/deny decision for `path`
    ///
    /// Denies when the path is currently banned, or when the spike
    /// detector trips (which also registers a new ban). Callers map a
    /// deny to a "too many requests" response.
    pub fn is_allowed(&self, path: &str) -> bool {
        if self.bans.is_banned(path) {
            debug!("Path {} is banned", path);
            return false;
        }

        !self.detector.check(path)
    }

    /// Full dump of the request history, for observability and debugging
    pub fn full_history(&self) -> HashMap<u64, HashMap<String, u64>> {
        self.store.snapshot()
    }

    /// Dump of just the in-progress second
    pub fn current_bucket_history(&self) -> HashMap<String, u64> {
        self.store.bucket(bucket_key_now()).snapshot()
    }

    /// The bucket store backing this gate
    pub fn store(&self) -> &Arc<BucketStore> {
        &self.store
    }

    /// The ban registry backing this gate
    pub fn bans(&self) -> &Arc<BanRegistry> {
        &self.bans
    }

    /// The configuration this gate was built with
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Spawn the background retention sweeper for this gate
    ///
    /// Under `RetentionPolicy::Sweep` the task prunes buckets older than
    /// `max_age_secs` once per sweep period and runs until aborted.
    /// Returns `None` under `RetentionPolicy::KeepAll`.
    pub fn spawn_retention_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let RetentionPolicy::Sweep { max_age_secs } = self.config.retention else {
            return None;
        };

        info!("Starting retention sweeper, pruning buckets older than {}s", max_age_secs);

        let gate = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(max_age_secs.max(1)));
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let cutoff = bucket_key_now().saturating_sub(max_age_secs);
                let removed = gate.store.prune_older_than(cutoff);
                if removed > 0 {
                    debug!("Retention sweep removed {} buckets", removed);
                }
            }
        }))
    }
}
