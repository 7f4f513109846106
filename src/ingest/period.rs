// src/ingest/period.rs
//! Period resolution: date range → biweekly source files overlapping it.

use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate};

use crate::ingest::types::FileId;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parse a calendar date in one of the accepted input formats.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

/// Inclusive interval overlap.
fn overlaps(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// `d` is always the first of its month here.
fn first_of_next_month(d: NaiveDate) -> Option<NaiveDate> {
    d.checked_add_months(Months::new(1))
}

/// Token for one half of a month: `YYYYMM` + `01` | `02`.
pub fn file_token(year: i32, month: u32, second_half: bool) -> String {
    format!(
        "{:04}{:02}{}",
        year,
        month,
        if second_half { "02" } else { "01" }
    )
}

/// Resolve `[start, end]` (raw strings) to the ordered, unique set of source files.
///
/// Unparseable or inverted input yields an empty list.
pub fn resolve(start: &str, end: &str, template: &str) -> Vec<FileId> {
    match (parse_date(start), parse_date(end)) {
        (Some(s), Some(e)) => resolve_dates(s, e, template),
        _ => Vec::new(),
    }
}

pub fn resolve_dates(start: NaiveDate, end: NaiveDate, template: &str) -> Vec<FileId> {
    if start > end {
        return Vec::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    let Some(mut cursor) = NaiveDate::from_ymd_opt(start.year(), start.month(), 1) else {
        return out;
    };

    while cursor <= end {
        let Some(next) = first_of_next_month(cursor) else {
            break;
        };
        let (y, m) = (cursor.year(), cursor.month());
        let mid = cursor.with_day(15).unwrap_or(cursor);
        let second_start = mid.succ_opt().unwrap_or(mid);
        let last = next.pred_opt().unwrap_or(cursor);

        for (h_start, h_end, second) in [(cursor, mid, false), (second_start, last, true)] {
            if overlaps(h_start, h_end, start, end) {
                let token = file_token(y, m, second);
                if seen.insert(token.clone()) {
                    out.push(FileId::new(token, template));
                }
            }
        }

        cursor = next;
    }

    out
}
