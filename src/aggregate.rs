//! # Aggregator
//! Folds normalized rows into the flat raw-row list and a per-bidder summary.
//!
//! Latest award per bidder is chosen by maximum award date, not by processing
//! order. Rows without a date still count toward totals but never move the
//! latest date. Summary figures are rounded to one decimal place.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ingest::normalize::{round_to, NormalizedRow};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

/// Parse an award date as a calendar value; `None` sorts below every real date.
pub fn parse_award_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidderAggregate {
    pub count: u64,
    pub sum_million: f64,
    pub latest_date: String,
    pub latest_price_million: f64,
}

impl BidderAggregate {
    fn absorb(&mut self, row: &NormalizedRow) {
        self.count += 1;
        self.sum_million += row.award_price_million;

        if row.award_date.is_empty() {
            return;
        }
        let newer = self.latest_date.is_empty()
            || parse_award_date(&row.award_date) > parse_award_date(&self.latest_date);
        if newer {
            self.latest_date = row.award_date.clone();
            self.latest_price_million = row.award_price_million;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub company_name: String,
    pub award_notice_date: String,
    pub latest_price_million: f64,
    pub cumulative_count: u64,
    pub cumulative_sum_million: f64,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    rows: Vec<NormalizedRow>,
    bidders: HashMap<String, BidderAggregate>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows (input order kept) and update bidders with a non-empty name.
    pub fn fold<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = NormalizedRow>,
    {
        for row in rows {
            if !row.bidder_name.is_empty() {
                self.bidders
                    .entry(row.bidder_name.clone())
                    .or_default()
                    .absorb(&row);
            }
            self.rows.push(row);
        }
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn bidder(&self, name: &str) -> Option<&BidderAggregate> {
        self.bidders.get(name)
    }

    pub fn bidder_count(&self) -> usize {
        self.bidders.len()
    }

    /// Summary rows sorted by award notice date, newest first.
    /// Order among equal dates is unspecified.
    pub fn summary(&self) -> Vec<SummaryRow> {
        let mut out: Vec<SummaryRow> = self
            .bidders
            .iter()
            .map(|(name, agg)| SummaryRow {
                company_name: name.clone(),
                award_notice_date: agg.latest_date.clone(),
                latest_price_million: round_to(agg.latest_price_million, 1),
                cumulative_count: agg.count,
                cumulative_sum_million: round_to(agg.sum_million, 1),
            })
            .collect();
        out.sort_by(|a, b| {
            parse_award_date(&b.award_notice_date).cmp(&parse_award_date(&a.award_notice_date))
        });
        out
    }
}
