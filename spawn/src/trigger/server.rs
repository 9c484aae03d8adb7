//! HTTP surface of the trigger runner: `/health` and `/trigger`, built on
//! `axum` composing routes from a shared `AppState`.
use super::slot::SlotStore;
use super::watchdog::{self, SupervisionConfig};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

pub struct TriggerState {
    pub slots: SlotStore,
    pub secret: String,
    pub max_concurrent: usize,
    pub run_timeout: Duration,
    pub idle_timeout: Duration,
    pub hard_ceiling: Duration,
    pub script_path: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub shutting_down: AtomicBool,
}

pub fn router(state: Arc<TriggerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trigger", post(trigger))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    running: usize,
    max: usize,
    #[serde(rename = "timeoutSec")]
    timeout_sec: u64,
    runs: Vec<super::slot::RunSlot>,
}

async fn health(State(state): State<Arc<TriggerState>>) -> Json<HealthResponse> {
    state.slots.reap_dead();
    Json(HealthResponse {
        status: if state.shutting_down.load(Ordering::SeqCst) { "shutting_down" } else { "ok" },
        running: state.slots.count(),
        max: state.max_concurrent,
        timeout_sec: state.run_timeout.as_secs(),
        runs: state.slots.snapshot(),
    })
}

#[derive(Deserialize, Default)]
pub struct TriggerQuery {
    reason: Option<String>,
}

#[derive(Serialize)]
struct TriggerRejected {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "oldestAgeSec")]
    oldest_age_sec: Option<i64>,
}

async fn trigger(
    State(state): State<Arc<TriggerState>>,
    Query(query): Query<TriggerQuery>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.secret) {
        return (StatusCode::UNAUTHORIZED, Json(TriggerRejected { error: "unauthorized", oldest_age_sec: None }))
            .into_response();
    }
    if state.shutting_down.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(TriggerRejected { error: "shutting_down", oldest_age_sec: None }))
            .into_response();
    }

    state.slots.reap_dead();
    state.slots.reap_timed_out(state.run_timeout);

    if state.slots.count() >= state.max_concurrent {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(TriggerRejected { error: "max_concurrent_reached", oldest_age_sec: state.slots.oldest_age_secs() }),
        )
            .into_response();
    }

    let config = SupervisionConfig { idle_timeout: state.idle_timeout, hard_ceiling: state.hard_ceiling };
    match watchdog::spawn(&state.script_path, state.working_dir.as_deref(), config) {
        Ok(pid) => {
            state.slots.register(pid, query.reason.clone());
            info!(pid, reason = ?query.reason, "triggered workflow cycle");
            Json(HealthResponse {
                status: "ok",
                running: state.slots.count(),
                max: state.max_concurrent,
                timeout_sec: state.run_timeout.as_secs(),
                runs: state.slots.snapshot(),
            })
            .into_response()
        }
        Err(err) => {
            warn!(%err, "failed to spawn workflow cycle");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(TriggerRejected { error: "spawn_failed", oldest_age_sec: None }))
                .into_response()
        }
    }
}

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(token) = header.strip_prefix("Bearer ") else {
        return false;
    };
    // Constant-time compare regardless of length mismatch, mirroring the
    // signed-link verification in the credential self-service subsystem.
    let expected = secret.as_bytes();
    let actual = token.as_bytes();
    expected.len() == actual.len() && bool::from(expected.ct_eq(actual))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(!authorized(&headers, "s3cr3t"));
    }

    #[test]
    fn accepts_matching_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer s3cr3t".parse().unwrap());
        assert!(authorized(&headers, "s3cr3t"));
    }

    #[test]
    fn rejects_wrong_token() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(!authorized(&headers, "s3cr3t"));
    }
}
