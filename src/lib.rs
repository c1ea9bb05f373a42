//! Per-path request spike detection and temporary banning
//!
//! An in-process, time-bucketed request-rate tracker. Every accepted
//! request is recorded into a one-second bucket keyed by path; a spike
//! detector compares the peak and trough of a path's counts over a
//! sliding window of recent buckets and temporarily bans paths whose
//! peak is disproportionately larger than their trough. This is a
//! self-relative anomaly check, not a fixed-quota limiter: a path is
//! judged against its own recent baseline, independent of absolute
//! traffic volume.
//!
//! # Example
//!
//! ```rust
//! use spikegate::{Gate, GateConfig};
//!
//! let gate = Gate::new(GateConfig::default()).unwrap();
//!
//! // once per accepted request
//! gate.record("/api/users");
//!
//! // before dispatch; map false to a 429 response
//! assert!(gate.is_allowed("/api/users"));
//! ```
//!
//! An axum middleware wiring both calls in front of a router is provided
//! in [`middleware`].

pub mod ban;
pub mod config;
pub mod detector;
pub mod error;
pub mod gate;
pub mod history;
pub mod middleware;

// Re-export commonly used types
pub use ban::BanRegistry;
pub use config::{GateConfig, RetentionPolicy};
pub use detector::SpikeDetector;
pub use error::{Result, SpikegateError};
pub use gate::Gate;
pub use history::{BucketStore, PathCounter};
pub use middleware::{spike_gate_middleware, Skipper, SpikeGateState};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spikegate=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
