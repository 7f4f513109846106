use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tower_http::cors::CorsLayer;

use crate::history::HistoryEntry;
use crate::job::{spawn_job, JobContext, JobGate, JobRequest};
use crate::progress::{ProgressHub, ProgressSink, ProgressState};

#[derive(Clone)]
pub struct AppState {
    pub gate: JobGate,
    pub hub: ProgressHub,
    pub ctx: JobContext,
}

impl AppState {
    pub fn new(ctx: JobContext) -> Self {
        Self {
            gate: JobGate::new(),
            hub: ProgressHub::new(),
            ctx,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/reports", post(start_report))
        .route("/api/progress", get(progress_stream))
        .route("/api/progress/snapshot", get(progress_snapshot))
        .route("/api/history", get(history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartReportReq {
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Presence check only; unusable dates resolve to an empty report downstream.
async fn start_report(State(state): State<AppState>, Json(body): Json<StartReportReq>) -> Response {
    let (Some(start_date), Some(end_date)) = (present(body.start_date), present(body.end_date)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "startDate and endDate are required" })),
        )
            .into_response();
    };

    let req = JobRequest {
        start_date,
        end_date,
    };
    let sink: Arc<dyn ProgressSink> = Arc::new(state.hub.clone());
    match spawn_job(&state.gate, state.ctx.clone(), req, sink) {
        Some(_) => (StatusCode::ACCEPTED, Json(json!({ "status": "started" }))).into_response(),
        None => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "a report job is already running" })),
        )
            .into_response(),
    }
}

async fn progress_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.hub.subscribe();
    let stream = ReceiverStream::new(rx).map(|snap| Event::default().json_data(snap));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn progress_snapshot(State(state): State<AppState>) -> Json<ProgressState> {
    Json(state.hub.snapshot())
}

async fn history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.ctx.emitter.history().read().await)
}
