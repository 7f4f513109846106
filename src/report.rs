//! # Report Emitter
//! Writes the raw JSON dump and the two-sheet workbook under a shared base
//! name, then prepends a history entry.
//!
//! Base name is `{first}_{last}` over the sorted tokens of the files that were
//! fetched and parsed successfully, so identical inputs overwrite the same two
//! files. With no such tokens the name falls back to the current timestamp.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use tokio::fs;

use crate::aggregate::SummaryRow;
use crate::history::{HistoryEntry, HistoryStore};
use crate::ingest::normalize::NormalizedRow;
use crate::ingest::tree::Node;

pub const SUMMARY_SHEET: &str = "Summary";
pub const RAW_SHEET: &str = "Raw Data";

pub const SUMMARY_HEADERS: [&str; 5] = [
    "Company Name",
    "Award Notice Date",
    "Latest Award Price (M)",
    "Cumulative Awards",
    "Cumulative Amount (M)",
];

pub const RAW_HEADERS: [&str; 8] = [
    "Source File",
    "Tender No",
    "Tender Name",
    "Organization",
    "Bidder",
    "Award Date",
    "Award Price",
    "Award Price (M)",
];

/// One extracted tender paired with the file it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcedRecord {
    pub source_file: String,
    pub tender_record: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmittedReport {
    pub base_name: String,
    pub xlsx_file: String,
    pub json_file: String,
    pub xlsx_path: PathBuf,
    pub json_path: PathBuf,
    pub entry: HistoryEntry,
}

/// `{start}_{end}` from the lexicographically sorted non-empty tokens.
pub fn report_base_name(tokens: &[String], now: DateTime<Utc>) -> String {
    let mut sorted: Vec<&str> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    sorted.sort_unstable();

    match (sorted.first(), sorted.last()) {
        (Some(start), Some(end)) => format!("{start}_{end}"),
        _ => {
            let ts = now.format("%Y%m%d%H%M%S").to_string();
            format!("{ts}_{ts}")
        }
    }
}

fn write_headers(ws: &mut Worksheet, headers: &[&str], bold: &Format) -> Result<(), XlsxError> {
    for (col, h) in headers.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, *h, bold)?;
        ws.set_column_width(col as u16, 18)?;
    }
    ws.set_freeze_panes(1, 0)?;
    Ok(())
}

fn fill_summary(ws: &mut Worksheet, summary: &[SummaryRow], bold: &Format) -> Result<(), XlsxError> {
    ws.set_name(SUMMARY_SHEET)?;
    write_headers(ws, &SUMMARY_HEADERS, bold)?;
    for (i, r) in summary.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_string(row, 0, &r.company_name)?;
        ws.write_string(row, 1, &r.award_notice_date)?;
        ws.write_number(row, 2, r.latest_price_million)?;
        ws.write_number(row, 3, r.cumulative_count as f64)?;
        ws.write_number(row, 4, r.cumulative_sum_million)?;
    }
    Ok(())
}

fn fill_raw(ws: &mut Worksheet, rows: &[NormalizedRow], bold: &Format) -> Result<(), XlsxError> {
    ws.set_name(RAW_SHEET)?;
    write_headers(ws, &RAW_HEADERS, bold)?;
    for (i, r) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_string(row, 0, &r.source_file)?;
        ws.write_string(row, 1, &r.tender_no)?;
        ws.write_string(row, 2, &r.tender_name)?;
        ws.write_string(row, 3, &r.org_name)?;
        ws.write_string(row, 4, &r.bidder_name)?;
        ws.write_string(row, 5, &r.award_date)?;
        ws.write_number(row, 6, r.award_price)?;
        ws.write_number(row, 7, r.award_price_million)?;
    }
    Ok(())
}

/// Render the two-sheet workbook into memory.
pub fn build_workbook(summary: &[SummaryRow], rows: &[NormalizedRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    fill_summary(workbook.add_worksheet(), summary, &bold)?;
    fill_raw(workbook.add_worksheet(), rows, &bold)?;
    workbook.save_to_buffer()
}

#[derive(Debug, Clone)]
pub struct ReportEmitter {
    output_dir: PathBuf,
    history: HistoryStore,
}

impl ReportEmitter {
    pub fn new(output_dir: impl Into<PathBuf>, history: HistoryStore) -> Self {
        Self {
            output_dir: output_dir.into(),
            history,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub async fn emit(
        &self,
        records: &[SourcedRecord],
        summary: &[SummaryRow],
        rows: &[NormalizedRow],
        tokens: &[String],
        now: DateTime<Utc>,
    ) -> Result<EmittedReport> {
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("creating report directory {}", self.output_dir.display()))?;

        let base_name = report_base_name(tokens, now);
        let json_file = format!("{base_name}.json");
        let xlsx_file = format!("{base_name}.xlsx");
        let json_path = self.output_dir.join(&json_file);
        let xlsx_path = self.output_dir.join(&xlsx_file);

        let json = serde_json::to_vec_pretty(records).context("serializing raw records")?;
        fs::write(&json_path, json)
            .await
            .with_context(|| format!("writing {}", json_path.display()))?;

        let book = build_workbook(summary, rows).context("rendering workbook")?;
        fs::write(&xlsx_path, book)
            .await
            .with_context(|| format!("writing {}", xlsx_path.display()))?;

        let entry = HistoryEntry {
            file: xlsx_file.clone(),
            json: json_file.clone(),
            summary_count: summary.len(),
            raw_count: rows.len(),
            created: now.to_rfc3339(),
        };
        self.history
            .prepend(entry.clone())
            .await
            .context("updating report history")?;

        tracing::info!(file = %xlsx_file, summary = summary.len(), raw = rows.len(), "report written");
        Ok(EmittedReport {
            base_name,
            xlsx_file,
            json_file,
            xlsx_path,
            json_path,
            entry,
        })
    }
}
