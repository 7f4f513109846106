// src/ingest/mod.rs
pub mod extract;
pub mod http;
pub mod normalize;
pub mod period;
pub mod tree;
pub mod types;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::ingest::normalize::NormalizedRow;
use crate::ingest::tree::{Node, ParseError};
use crate::ingest::types::{FetchError, FileId, SourceFetcher};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "source_fetch_attempts_total",
            "HTTP attempts against source hosts."
        );
        describe_counter!(
            "source_fetch_fallback_total",
            "Files served by the secondary host."
        );
        describe_counter!(
            "source_fetch_failures_total",
            "Files unavailable from every host."
        );
        describe_counter!(
            "tender_records_total",
            "Tender records extracted from source files."
        );
        describe_counter!("source_parse_errors_total", "Source documents that failed to parse.");
        describe_histogram!("source_parse_ms", "Document parse + extract time in milliseconds.");
    });
}

/// Everything pulled out of one source file.
#[derive(Debug, Clone)]
pub struct FileBatch {
    pub file: FileId,
    pub records: Vec<Node>,
    pub rows: Vec<NormalizedRow>,
}

/// Per-file failure; the job records it and moves on.
#[derive(Debug, Error)]
pub enum FileFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
}

/// Parse a fetched document into tender records and their normalized rows.
pub fn extract_batch(file: &FileId, body: &str) -> Result<FileBatch, ParseError> {
    let t0 = std::time::Instant::now();
    let doc = tree::parse_document(body)?;
    let records = extract::extract_tenders(&doc);
    let rows = records
        .iter()
        .map(|r| normalize::normalize(r, &file.name))
        .collect();

    histogram!("source_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("tender_records_total").increment(records.len() as u64);
    Ok(FileBatch {
        file: file.clone(),
        records,
        rows,
    })
}

/// Fetch + parse + extract + normalize for one file.
pub async fn process_file(
    fetcher: &dyn SourceFetcher,
    file: &FileId,
) -> Result<FileBatch, FileFailure> {
    ensure_metrics_described();
    let body = fetcher.fetch(file).await?;
    extract_batch(file, &body).map_err(|e| {
        counter!("source_parse_errors_total").increment(1);
        FileFailure::Parse(e)
    })
}
