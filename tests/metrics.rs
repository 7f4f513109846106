// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serial_test::serial;
use tower::ServiceExt;

#[tokio::test]
#[serial]
async fn metrics_endpoint_exposes_job_series() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("METRICS_ENABLED", "1");
    std::env::remove_var("REPORT_CONFIG_PATH");
    std::env::set_var("REPORT_OUTPUT_DIR", dir.path());
    // never contacted: an inverted range resolves to no files
    std::env::set_var("REPORT_PRIMARY_HOST", "http://127.0.0.1:9");

    let app = award_report::app().await.expect("app() builds");

    let state = award_report::run_job(
        &award_report::JobContext::from_config(
            &award_report::ReportConfig::load_default().unwrap(),
        )
        .unwrap(),
        &award_report::JobRequest {
            start_date: "2024-03-31".into(),
            end_date: "2024-03-01".into(),
        },
        std::sync::Arc::new(award_report::progress::RecordingSink::new()),
    )
    .await;
    assert!(state.complete && !state.error, "{}", state.message);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(
        body::to_bytes(resp.into_body(), 1_048_576)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();

    for needle in ["report_jobs_total", "report_job_duration_ms"] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }

    for k in [
        "METRICS_ENABLED",
        "REPORT_OUTPUT_DIR",
        "REPORT_PRIMARY_HOST",
    ] {
        std::env::remove_var(k);
    }
}

#[tokio::test]
#[serial]
async fn metrics_route_absent_when_disabled() {
    std::env::remove_var("METRICS_ENABLED");
    let app = award_report::app().await.expect("app() builds");
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
