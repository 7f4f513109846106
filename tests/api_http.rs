// tests/api_http.rs
//
// HTTP-level tests for the report Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET  /health
// - POST /api/reports (400 / 202 / 409)
// - GET  /api/progress (SSE framing)
// - GET  /api/progress/snapshot
// - GET  /api/history

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio_stream::StreamExt as _;
use tower::ServiceExt as _; // for `oneshot`

use award_report::history::{HistoryEntry, HistoryStore};
use award_report::progress::{ProgressSink, ProgressState};
use award_report::ingest::types::{FetchError, FileId, SourceFetcher};
use award_report::report::ReportEmitter;
use award_report::{create_router, AppState, JobContext};

const BODY_LIMIT: usize = 1024 * 1024;

struct NothingFetcher;

#[async_trait]
impl SourceFetcher for NothingFetcher {
    async fn fetch(&self, file: &FileId) -> Result<String, FetchError> {
        Err(FetchError {
            file: file.name.clone(),
            status: Some(404),
        })
    }
    fn name(&self) -> &'static str {
        "nothing"
    }
}

fn test_state(dir: &std::path::Path) -> AppState {
    AppState::new(JobContext {
        fetcher: Arc::new(NothingFetcher),
        emitter: ReportEmitter::new(dir, HistoryStore::new(dir.join("history.json"))),
        file_template: "tender_award_{token}.xml".into(),
    })
}

fn post_report(payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/reports")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /api/reports")
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn router(state: &AppState) -> Router {
    create_router(state.clone())
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(&test_state(dir.path()));

    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn api_report_requires_both_dates() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    for payload in [
        json!({ "startDate": "2024-03-01" }),
        json!({ "endDate": "2024-03-31" }),
        json!({ "startDate": "  ", "endDate": "2024-03-31" }),
        json!({}),
    ] {
        let resp = router(&state)
            .oneshot(post_report(payload.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload {payload}");
        let v = body_json(resp).await;
        assert!(v["error"].as_str().unwrap().contains("required"));
    }
    assert!(!state.gate.is_running());
}

#[tokio::test]
async fn api_report_conflicts_while_a_job_runs() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let _held = state.gate.try_acquire().expect("gate free");

    let resp = router(&state)
        .oneshot(post_report(
            json!({ "startDate": "2024-03-01", "endDate": "2024-03-31" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn api_report_starts_job_and_publishes_progress() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let mut rx = state.hub.subscribe();

    let resp = router(&state)
        .oneshot(post_report(
            json!({ "startDate": "2024-03-01", "endDate": "2024-03-31" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(resp).await, json!({ "status": "started" }));

    // drain until the job reports completion
    let done = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while let Some(snap) = rx.recv().await {
            if snap.complete {
                return snap;
            }
        }
        panic!("progress channel closed before completion");
    })
    .await
    .expect("job finished in time");

    assert!(!done.error, "{}", done.message);
    assert_eq!(done.counts, vec![0, 0]);

    let resp = router(&state)
        .oneshot(
            Request::get("/api/progress/snapshot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let snap = body_json(resp).await;
    assert_eq!(snap["complete"], true);
    assert_eq!(snap["total"], 2);
    assert!(snap["reportFile"].as_str().unwrap().ends_with(".xlsx"));
}

#[tokio::test]
async fn api_history_is_empty_then_lists_runs() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let resp = router(&state)
        .oneshot(Request::get("/api/history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!([]));

    state
        .ctx
        .emitter
        .history()
        .prepend(HistoryEntry {
            file: "20240301_20240302.xlsx".into(),
            json: "20240301_20240302.json".into(),
            summary_count: 3,
            raw_count: 9,
            created: "2024-04-01T00:00:00+00:00".into(),
        })
        .await
        .unwrap();

    let resp = router(&state)
        .oneshot(Request::get("/api/history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let v = body_json(resp).await;
    assert_eq!(v[0]["file"], "20240301_20240302.xlsx");
    assert_eq!(v[0]["summaryCount"], 3);
    assert_eq!(v[0]["rawCount"], 9);
}

#[tokio::test]
async fn api_progress_stream_starts_with_current_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    state.hub.publish(&ProgressState {
        current: 1,
        total: 2,
        percent: 50,
        labels: vec!["2024-03 H1".into()],
        counts: vec![4],
        message: "2024-03 H1: 4 records".into(),
        ..Default::default()
    });

    let resp = router(&state)
        .oneshot(Request::get("/api/progress").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ctype = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(ctype.starts_with("text/event-stream"), "{ctype}");

    // read until the first event terminator
    let mut stream = resp.into_body().into_data_stream();
    let mut buf = String::new();
    let frame = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            buf.push_str(&String::from_utf8_lossy(&chunk.expect("body chunk")));
            if let Some(end) = buf.find("\n\n") {
                return buf[..end].to_string();
            }
        }
        panic!("stream ended before the first event");
    })
    .await
    .expect("first event in time");

    let data = frame
        .lines()
        .find_map(|l| l.strip_prefix("data:"))
        .expect("data line")
        .trim();
    let snap: ProgressState = serde_json::from_str(data).expect("snapshot json");
    assert_eq!(snap.current, 1);
    assert_eq!(snap.percent, 50);
    assert_eq!(snap.counts, vec![4]);
    assert_eq!(snap.message, "2024-03 H1: 4 records");
    assert!(!snap.complete);
}

#[tokio::test]
async fn gate_is_free_once_completion_is_observed() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    for _ in 0..20 {
        let mut rx = state.hub.subscribe();
        // the replayed snapshot belongs to the previous run
        let _ = rx.try_recv();
        let resp = router(&state)
            .oneshot(post_report(
                json!({ "startDate": "2024-03-01", "endDate": "2024-03-31" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        tokio::time::timeout(std::time::Duration::from_secs(10), async {
            while let Some(snap) = rx.recv().await {
                if snap.complete {
                    return;
                }
            }
            panic!("progress channel closed before completion");
        })
        .await
        .expect("job finished in time");

        assert!(!state.gate.is_running());
    }
}
