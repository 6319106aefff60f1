use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bme_mux_monitor::history::HistoryStore;
use bme_mux_monitor::scheduler::{PollStats, SchedulerStats};
use bme_mux_monitor::snapshot::Snapshot;
use serde::Serialize;
use serde_json::json;

use crate::host;

const DESCRIPTION: &str = "BME280 Sensor Server via PCA9548 I2C Mux";

const ENDPOINTS: &[(&str, &[&str])] = &[
    ("/", &["GET"]),
    ("/latest", &["GET"]),
    ("/last/{num}", &["GET"]),
];

#[derive(Clone)]
pub struct AppState {
    pub history: HistoryStore,
    pub stats: Arc<SchedulerStats>,
}

#[derive(Serialize)]
struct Endpoint {
    path: &'static str,
    methods: &'static [&'static str],
}

#[derive(Serialize)]
struct RootResponse {
    device_name: String,
    system: String,
    release: String,
    uptime: String,
    status: &'static str,
    description: &'static str,
    endpoints: Vec<Endpoint>,
    poll_stats: PollStats,
}

#[derive(Serialize)]
struct LastResponse {
    count: usize,
    requested: i64,
    readings: Vec<Snapshot>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/latest", get(latest))
        .route("/last/{num}", get(last))
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        device_name: host::hostname(),
        system: host::system(),
        release: host::os_release(),
        uptime: host::uptime(),
        status: "online",
        description: DESCRIPTION,
        endpoints: ENDPOINTS
            .iter()
            .map(|&(path, methods)| Endpoint { path, methods })
            .collect(),
        poll_stats: state.stats.snapshot(),
    })
}

async fn latest(State(state): State<AppState>) -> Response {
    match state.history.latest() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => Json(json!({ "status": "Waiting for sensor data..." })).into_response(),
    }
}

async fn last(State(state): State<AppState>, Path(num): Path<i64>) -> Json<LastResponse> {
    let readings = state.history.last_n(clamp_request(num, state.history.capacity()));

    Json(LastResponse {
        count: readings.len(),
        requested: num,
        readings,
    })
}

fn clamp_request(num: i64, capacity: usize) -> usize {
    usize::try_from(num).unwrap_or(0).clamp(1, capacity.max(1))
}
