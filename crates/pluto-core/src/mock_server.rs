//! Local stand-in for the orchestrator and scheduler HTTP APIs.
//!
//! Answers `/query` with the same keyword classification as the client-side
//! simulation (minus the latency) and keeps one in-memory schedule.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::fallback::{compose, Intent};

/// Longest schedule interval the mock accepts.
pub const MAX_INTERVAL_SECONDS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Default)]
pub struct MockServerOptions {
    /// When set, scheduler routes require `Authorization: Bearer <token>`.
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
struct ScheduleRecord {
    symbol: String,
    interval_seconds: u64,
    started_at: DateTime<Utc>,
}

impl ScheduleRecord {
    /// First run boundary strictly after `now`, or `None` past chrono's range.
    fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let interval = i64::try_from(self.interval_seconds.max(1)).ok()?;
        let elapsed = (now - self.started_at).num_seconds().max(0);
        let periods = elapsed / interval + 1;
        let offset = TimeDelta::try_seconds(periods.checked_mul(interval)?)?;
        self.started_at.checked_add_signed(offset)
    }
}

#[derive(Debug)]
struct MockState {
    token: Option<String>,
    schedule: Mutex<Option<ScheduleRecord>>,
}

#[derive(Deserialize)]
struct QueryBody {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct StartBody {
    symbol: String,
    interval_seconds: u64,
}

pub fn router(options: MockServerOptions) -> Router {
    let state = Arc::new(MockState {
        token: options.token.filter(|t| !t.is_empty()),
        schedule: Mutex::new(None),
    });

    Router::new()
        .route("/query", post(handle_query))
        .route("/schedule/start", post(handle_start))
        .route("/schedule/stop", post(handle_stop))
        .route("/schedule/status", get(handle_status))
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, options: MockServerOptions) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("mock orchestrator listening on http://{}", addr);
    }
    axum::serve(listener, router(options)).await?;
    Ok(())
}

/// Reply text the mock orchestrator sends for `text`.
pub fn server_reply(text: &str) -> String {
    match Intent::classify(text) {
        Intent::Echo => format!("Mock reply from server: received \"{}\"", text),
        intent => compose(intent, text),
    }
}

async fn handle_query(Json(body): Json<QueryBody>) -> Json<serde_json::Value> {
    Json(json!({ "reply": server_reply(&body.text) }))
}

async fn handle_start(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<StartBody>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    if body.interval_seconds == 0 || body.interval_seconds > MAX_INTERVAL_SECONDS {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error": format!("interval_seconds must be between 1 and {}", MAX_INTERVAL_SECONDS),
            })),
        )
            .into_response();
    }

    info!(symbol = %body.symbol, interval_seconds = body.interval_seconds, "mock schedule started");
    let record = ScheduleRecord {
        symbol: body.symbol,
        interval_seconds: body.interval_seconds,
        started_at: Utc::now(),
    };
    let response = status_body(Some(&record), Utc::now());
    *lock(&state) = Some(record);
    Json(response).into_response()
}

async fn handle_stop(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    info!("mock schedule stopped");
    *lock(&state) = None;
    Json(status_body(None, Utc::now())).into_response()
}

async fn handle_status(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let schedule = lock(&state).clone();
    Json(status_body(schedule.as_ref(), Utc::now())).into_response()
}

fn status_body(schedule: Option<&ScheduleRecord>, now: DateTime<Utc>) -> serde_json::Value {
    match schedule {
        Some(record) => json!({
            "ok": true,
            "running": true,
            "symbol": record.symbol,
            "next_run_time": record
                .next_run_after(now)
                .map(|next| next.to_rfc3339_opts(SecondsFormat::Secs, true)),
            "interval_seconds": record.interval_seconds,
        }),
        None => json!({
            "ok": true,
            "running": false,
            "next_run_time": null,
            "interval_seconds": null,
        }),
    }
}

fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.token.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented == Some(expected) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "ok": false, "error": "unauthorized" })),
        )
            .into_response())
    }
}

fn lock(state: &MockState) -> std::sync::MutexGuard<'_, Option<ScheduleRecord>> {
    state.schedule.lock().unwrap_or_else(|e| e.into_inner())
}
