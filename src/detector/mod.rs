use crate::ban::BanRegistry;
use crate::config::GateConfig;
use crate::history::{bucket_key_now, window_keys, BucketStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Self-relative spike detector
///
/// A path whose peak request count within the window is
/// disproportionately larger than its trough (scaled to percent) is
/// suspected of being hammered, independent of absolute traffic volume,
/// as long as the volume clears the minimum-requests floor. The floor
/// keeps near-zero-traffic paths from producing false positives.
pub struct SpikeDetector {
    store: Arc<BucketStore>,
    bans: Arc<BanRegistry>,
    window_secs: u32,
    max_increase_percent: u32,
    min_requests: u64,
    ban_duration: Duration,
}

impl SpikeDetector {
    /// Create a detector reading from `store` and registering bans in `bans`
    pub fn new(store: Arc<BucketStore>, bans: Arc<BanRegistry>, config: &GateConfig) -> Self {
        Self {
            store,
            bans,
            window_secs: config.check_last_n_seconds,
            max_increase_percent: config.block_after_percent_increase,
            min_requests: config.enable_check_after_n_requests,
            ban_duration: config.ban_duration(),
        }
    }

    /// Check `path` against the window ending at the current second
    pub fn check(&self, path: &str) -> bool {
        self.check_at(path, bucket_key_now())
    }

    /// Check `path` against the window of buckets ending at `now_key`
    ///
    /// Returns true when the path tripped the detector; a ban for the
    /// configured duration is registered as a side effect. Each bucket's
    /// counter lock is held only long enough to read a single count.
    pub fn check_at(&self, path: &str, now_key: u64) -> bool {
        let mut smallest = self.min_requests;
        let mut biggest: u64 = 0;

        for key in window_keys(now_key, self.window_secs) {
            let Some(count) = self.store.count(key, path) else {
                // path wasn't requested in this second
                continue;
            };

            if count < smallest {
                smallest = count;
            }
            if count > biggest {
                biggest = count;
            }
        }

        // The check only engages once every observed bucket carries at
        // least the configured floor; an observed count below it pulls
        // the running minimum down and disables the check for this pass.
        if smallest < self.min_requests {
            return false;
        }

        let ratio = (100.0 / smallest as f64) * biggest as f64;
        let blocked = ratio > self.max_increase_percent as f64;

        if blocked {
            warn!(
                "Spike detected for path {}: peak is {:.0}% of trough (limit {}%), banning for {:?}",
                path, ratio, self.max_increase_percent, self.ban_duration
            );
            self.bans.add(path, self.ban_duration);
        }

        blocked
    }
}
