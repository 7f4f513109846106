// src/ingest/normalize.rs
//! Field normalization for tender records.
//!
//! Every field is optional. Lookups try candidate keys in priority order and
//! take the first present, non-null value; anything missing becomes `""` / `0`.

use serde::{Deserialize, Serialize};

use crate::ingest::tree::Node;

pub const BIDDER_LIST_KEY: &str = "bidderList";
pub const BIDDER_NAME_KEY: &str = "bidderName";
pub const AWARD_DATE_KEYS: &[&str] = &["awardNoticeDate", "awardDate"];
pub const TENDER_NO_KEYS: &[&str] = &["tenderNo"];
pub const TENDER_NAME_KEYS: &[&str] = &["tenderName"];
pub const ORG_NAME_KEYS: &[&str] = &["orgName", "organizationName", "procuringEntityName"];
pub const AWARD_PRICE_KEYS: &[&str] = &["awardPrice"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRow {
    pub source_file: String,
    pub tender_no: String,
    pub tender_name: String,
    pub org_name: String,
    pub bidder_name: String,
    pub award_date: String,
    pub award_price: f64,
    pub award_price_million: f64,
}

/// Ordered-fallback lookup over an attribute bag.
pub fn first_present(record: &Node, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| record.get(k))
        .find(|n| !n.is_null())
        .and_then(Node::text)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

pub fn bidder_name(record: &Node) -> String {
    record
        .get(BIDDER_LIST_KEY)
        .and_then(|list| list.get(BIDDER_NAME_KEY))
        .and_then(Node::text)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Strip thousands separators and parse; empty or invalid → 0.
pub fn parse_price(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn price_in_millions(price: f64) -> f64 {
    if price == 0.0 {
        0.0
    } else {
        round_to(price / 1_000_000.0, 6)
    }
}

pub fn normalize(record: &Node, source_file: &str) -> NormalizedRow {
    let award_price = parse_price(&first_present(record, AWARD_PRICE_KEYS));
    NormalizedRow {
        source_file: source_file.to_string(),
        tender_no: first_present(record, TENDER_NO_KEYS),
        tender_name: first_present(record, TENDER_NAME_KEYS),
        org_name: first_present(record, ORG_NAME_KEYS),
        bidder_name: bidder_name(record),
        award_date: first_present(record, AWARD_DATE_KEYS),
        award_price,
        award_price_million: price_in_millions(award_price),
    }
}
