use crate::gate::Gate;
use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

/// Skip predicate: return true to bypass the gate entirely for a request
///
/// Skipped requests are neither counted nor checked, e.g. health checks.
pub type Skipper = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Shared state for the spike gate middleware
#[derive(Clone)]
pub struct SpikeGateState {
    /// The gate making the allow/deny decision
    gate: Arc<Gate>,
    /// Predicate bypassing the gate for selected requests
    skipper: Skipper,
}

impl SpikeGateState {
    /// Create middleware state with the default skipper (never skip)
    pub fn new(gate: Arc<Gate>) -> Self {
        Self {
            gate,
            skipper: Arc::new(|_| false),
        }
    }

    /// Replace the skip predicate
    pub fn with_skipper(mut self, skipper: Skipper) -> Self {
        self.skipper = skipper;
        self
    }

    /// The gate behind this middleware
    pub fn gate(&self) -> &Arc<Gate> {
        &self.gate
    }
}

/// Axum middleware enforcing the spike gate
///
/// Hook once at the root of the router. Requests are recorded first and
/// checked second, so the request that trips a ban is itself counted.
///
/// ```rust,no_run
/// use axum::{middleware, routing::get, Router};
/// use spikegate::{Gate, GateConfig, SpikeGateState};
/// use std::sync::Arc;
///
/// let gate = Arc::new(Gate::new(GateConfig::default()).unwrap());
/// let state = SpikeGateState::new(gate);
/// let app: Router = Router::new()
///     .route("/", get(|| async { "ok" }))
///     .layer(middleware::from_fn_with_state(
///         state,
///         spikegate::spike_gate_middleware,
///     ));
/// ```
pub async fn spike_gate_middleware(
    State(state): State<SpikeGateState>,
    request: Request,
    next: Next,
) -> Response {
    if (state.skipper)(&request) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    state.gate.record(&path);

    if !state.gate.is_allowed(&path) {
        warn!("Denying request to {}", path);
        return too_many_requests(&path, state.gate.config().ban_secs);
    }

    next.run(request).await
}

/// Create a 429 Too Many Requests response for a denied path
fn too_many_requests(path: &str, retry_after_secs: u64) -> Response {
    let body = serde_json::json!({
        "error": "Too many requests",
        "status": 429,
        "path": path,
        "retry_after": retry_after_secs,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body.to_string()).into_response();

    if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        response.headers_mut().insert("Retry-After", value);
    }

    response
}
