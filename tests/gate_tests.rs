use axum::{body::Body, middleware, routing::any, Router};
use http::{Request, StatusCode};
use spikegate::history::bucket_key_now;
use spikegate::{Gate, GateConfig, SpikeGateState};
use std::sync::Arc;
use tower::ServiceExt;

async fn ok_handler() -> &'static str {
    "ok"
}

/// Build a router with the spike gate hooked at the root
fn gated_app(state: SpikeGateState) -> Router {
    Router::new()
        .route("/*path", any(ok_handler))
        .layer(middleware::from_fn_with_state(
            state,
            spikegate::spike_gate_middleware,
        ))
}

fn spike_config() -> GateConfig {
    GateConfig {
        block_after_percent_increase: 200,
        check_last_n_seconds: 5,
        enable_check_after_n_requests: 100,
        ban_secs: 60,
        ..GateConfig::default()
    }
}

/// Seed a peak/trough pattern for `path` across the recent window.
/// The peak is also seeded one second ahead so the decision holds even
/// if the clock rolls over between seeding and the request (the request
/// itself lands in whichever bucket is current).
fn seed_spike(gate: &Gate, path: &str) {
    let now = bucket_key_now();
    gate.store().bucket(now + 1).append(path, 250);
    gate.store().bucket(now).append(path, 250);
    gate.store().bucket(now - 1).append(path, 100);
    gate.store().bucket(now - 2).append(path, 100);
}

#[tokio::test]
async fn test_quiet_traffic_passes_through() {
    let gate = Arc::new(Gate::new(spike_config()).unwrap());
    let app = gated_app(SpikeGateState::new(gate.clone()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // the request was counted
    let total: u64 = gate
        .full_history()
        .values()
        .filter_map(|bucket| bucket.get("/api/users"))
        .sum();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_spiking_path_gets_429_and_stays_banned() {
    let gate = Arc::new(Gate::new(spike_config()).unwrap());
    seed_spike(&gate, "/api/login");

    let app = gated_app(SpikeGateState::new(gate.clone()));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
    assert!(gate.bans().is_banned("/api/login"));

    // the follow-up request is denied by the ban alone
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // other paths are unaffected
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_skipped_requests_are_neither_counted_nor_checked() {
    let gate = Arc::new(Gate::new(spike_config()).unwrap());

    // even a banned path passes when the skipper matches
    gate.bans()
        .add("/health", std::time::Duration::from_secs(60));

    let state = SpikeGateState::new(gate.clone())
        .with_skipper(Arc::new(|req| req.uri().path() == "/health"));
    let app = gated_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // nothing was recorded for the skipped path
    let recorded: u64 = gate
        .full_history()
        .values()
        .filter_map(|bucket| bucket.get("/health"))
        .sum();
    assert_eq!(recorded, 0);
}

#[tokio::test]
async fn test_weighted_recording_feeds_the_detector() {
    let gate = Arc::new(Gate::new(spike_config()).unwrap());

    let now = bucket_key_now();
    gate.store().bucket(now - 1).append("/api/export", 100);
    gate.store().bucket(now - 2).append("/api/export", 100);

    // one expensive request pushes the current second far above baseline
    gate.record_weighted("/api/export", 300);

    assert!(!gate.is_allowed("/api/export"));
}

#[test]
fn test_independent_gates_share_no_state() {
    let a = Gate::new(GateConfig::default()).unwrap();
    let b = Gate::new(GateConfig::default()).unwrap();

    a.record("/x");
    a.bans().add("/x", std::time::Duration::from_secs(60));

    assert!(b.full_history().is_empty());
    assert!(b.is_allowed("/x"));
}

#[test]
fn test_concurrent_recording_loses_no_updates() {
    let gate = Arc::new(Gate::new(GateConfig::default()).unwrap());
    let mut handles = Vec::new();

    for _ in 0..4 {
        let gate = gate.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..500 {
                gate.record("/hot");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // recording may straddle a second boundary; sum across buckets
    let total: u64 = gate
        .full_history()
        .values()
        .filter_map(|bucket| bucket.get("/hot"))
        .sum();
    assert_eq!(total, 2000);
}
