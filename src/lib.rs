// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod history;
pub mod ingest;
pub mod job;
pub mod metrics;
pub mod progress;
pub mod report;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::ReportConfig;
pub use crate::job::{run_job, JobContext, JobGate, JobRequest};
pub use crate::progress::{ProgressHub, ProgressState};

use axum::Router;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "award_report=info,warn";

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Build the full in-process app from configuration. `/metrics` is mounted
/// when `METRICS_ENABLED=1`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = ReportConfig::load_default()?;
    let ctx = JobContext::from_config(&cfg)?;
    let mut router = create_router(AppState::new(ctx));

    if std::env::var("METRICS_ENABLED").ok().as_deref() == Some("1") {
        let m = crate::metrics::Metrics::init()?;
        router = router.merge(m.router());
    }
    Ok(router)
}
