//! history.rs: flat JSON log of report runs, newest first.
//!
//! Reads never fail: a missing, corrupt or non-array file reads as empty and
//! is replaced on the next write.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub file: String,
    pub json: String,
    pub summary_count: usize,
    pub raw_count: usize,
    pub created: String,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Vec<HistoryEntry> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => parse_history(&s),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "history unreadable, treating as empty");
                }
                Vec::new()
            }
        }
    }

    /// Put `entry` at the front and rewrite the whole list. No dedup by file name.
    pub async fn prepend(&self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>> {
        let mut list = self.read().await;
        list.insert(0, entry);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating history directory {}", parent.display()))?;
        }

        let body = serde_json::to_vec_pretty(&list).context("serializing history")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(list)
    }
}

/// Tolerant decode: non-JSON or non-array → empty; malformed entries are skipped.
pub fn parse_history(s: &str) -> Vec<HistoryEntry> {
    match serde_json::from_str::<serde_json::Value>(s) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "history is not valid JSON, treating as empty");
            Vec::new()
        }
    }
}
