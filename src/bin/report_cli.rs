//! One-shot report run from the command line: `report_cli <startDate> <endDate>`.
//! Progress snapshots are logged; exits non-zero when the job ends in error.

use std::process::ExitCode;
use std::sync::Arc;

use award_report::progress::{ProgressSink, ProgressState};
use award_report::{run_job, JobContext, JobRequest, ReportConfig};

struct LogSink;

impl ProgressSink for LogSink {
    fn publish(&self, s: &ProgressState) {
        if s.complete {
            tracing::info!(error = s.error, message = %s.message, "job finished");
        } else if s.current > 0 {
            tracing::info!(current = s.current, total = s.total, percent = s.percent, message = %s.message, "progress");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    award_report::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [start_date, end_date] = args.as_slice() else {
        eprintln!("usage: report_cli <startDate> <endDate>   (dates as YYYY-MM-DD)");
        return ExitCode::from(2);
    };

    let ctx = match ReportConfig::load_default().and_then(|cfg| JobContext::from_config(&cfg)) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("config: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let req = JobRequest {
        start_date: start_date.clone(),
        end_date: end_date.clone(),
    };
    let last = run_job(&ctx, &req, Arc::new(LogSink)).await;

    if last.error {
        ExitCode::FAILURE
    } else {
        println!(
            "{} ({} summary rows, {} raw rows)",
            last.report_file.unwrap_or_default(),
            last.summary_row_count.unwrap_or(0),
            last.raw_row_count.unwrap_or(0)
        );
        ExitCode::SUCCESS
    }
}
