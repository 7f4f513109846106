//! # Report Job
//! Admission gate and the sequential pipeline driver.
//!
//! Files are processed strictly one after another. A fetch or parse failure
//! is recorded as a zero-count progress entry and the loop continues; only an
//! emission failure ends the job with `error = true`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::aggregate::Aggregator;
use crate::config::ReportConfig;
use crate::history::HistoryStore;
use crate::ingest::http::HttpFetcher;
use crate::ingest::types::SourceFetcher;
use crate::ingest::{period, process_file};
use crate::progress::{ProgressSink, ProgressState, ProgressTracker, ReportOutcome};
use crate::report::{ReportEmitter, SourcedRecord};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("report_jobs_total", "Report jobs started.");
        describe_counter!(
            "report_job_failures_total",
            "Report jobs that ended with an error."
        );
        describe_histogram!("report_job_duration_ms", "Wall time of a report job in milliseconds.");
    });
}

/// Single-flight guard: at most one job runs process-wide.
#[derive(Debug, Clone, Default)]
pub struct JobGate {
    running: Arc<AtomicBool>,
}

/// Held by the running job; releases the gate on drop, including on panic.
#[derive(Debug)]
pub struct JobPermit {
    running: Arc<AtomicBool>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl JobGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<JobPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub start_date: String,
    pub end_date: String,
}

/// Collaborators a job runs against.
#[derive(Clone)]
pub struct JobContext {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub emitter: ReportEmitter,
    pub file_template: String,
}

impl JobContext {
    pub fn from_config(cfg: &ReportConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::from_config(cfg)?;
        Ok(Self {
            fetcher: Arc::new(fetcher),
            emitter: ReportEmitter::new(&cfg.output_dir, HistoryStore::new(cfg.history_path())),
            file_template: cfg.file_template.clone(),
        })
    }
}

/// Run one job to completion and return the final snapshot.
pub async fn run_job(
    ctx: &JobContext,
    req: &JobRequest,
    sink: Arc<dyn ProgressSink>,
) -> ProgressState {
    drive(ctx, req, sink, None).await
}

/// The permit, when held, is released before the completion snapshot goes
/// out, so an observer that sees `complete` can start the next job.
async fn drive(
    ctx: &JobContext,
    req: &JobRequest,
    sink: Arc<dyn ProgressSink>,
    permit: Option<JobPermit>,
) -> ProgressState {
    ensure_metrics_described();
    counter!("report_jobs_total").increment(1);
    let t0 = Instant::now();

    let mut progress = ProgressTracker::start(sink);
    let files = period::resolve(&req.start_date, &req.end_date, &ctx.file_template);
    tracing::info!(
        start = %req.start_date,
        end = %req.end_date,
        files = files.len(),
        fetcher = ctx.fetcher.name(),
        "report job started"
    );
    progress.set_total(files.len());

    let mut aggregator = Aggregator::new();
    let mut records: Vec<SourcedRecord> = Vec::new();
    let mut tokens: Vec<String> = Vec::new();

    for file in &files {
        let label = file.label();
        match process_file(ctx.fetcher.as_ref(), file).await {
            Ok(batch) => {
                let n = batch.records.len();
                tokens.push(file.token.clone());
                records.extend(batch.records.into_iter().map(|r| SourcedRecord {
                    source_file: file.name.clone(),
                    tender_record: r,
                }));
                aggregator.fold(batch.rows);
                tracing::info!(file = %file.name, records = n, "file processed");
                progress.record_file(&label, n, Some(format!("{label}: {n} records")));
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "file skipped");
                progress.record_file(&label, 0, Some(format!("{label}: {e}")));
            }
        }
    }

    let summary = aggregator.summary();
    let emitted = ctx
        .emitter
        .emit(&records, &summary, aggregator.rows(), &tokens, Utc::now())
        .await;
    drop(permit);

    match emitted {
        Ok(report) => {
            let raw = aggregator.rows().len();
            progress.complete(
                true,
                format!(
                    "Report ready: {} ({} bidders, {} rows)",
                    report.xlsx_file,
                    summary.len(),
                    raw
                ),
                Some(ReportOutcome {
                    report_file: report.xlsx_file,
                    summary_row_count: summary.len(),
                    raw_row_count: raw,
                }),
            );
        }
        Err(e) => {
            counter!("report_job_failures_total").increment(1);
            tracing::error!(error = %format!("{e:#}"), "report job failed");
            progress.complete(false, format!("{e:#}"), None);
        }
    }

    histogram!("report_job_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    progress.state().clone()
}

/// Admit and spawn a job, or `None` when one is already running.
pub fn spawn_job(
    gate: &JobGate,
    ctx: JobContext,
    req: JobRequest,
    sink: Arc<dyn ProgressSink>,
) -> Option<JoinHandle<ProgressState>> {
    let permit = gate.try_acquire()?;
    Some(tokio::spawn(async move {
        drive(&ctx, &req, sink, Some(permit)).await
    }))
}
