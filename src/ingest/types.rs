// src/ingest/types.rs
use std::fmt;

use thiserror::Error;

/// Identifier of one biweekly source document.
///
/// `token` is `YYYYMM` followed by the half marker (`01` = days 1-15, `02` = day 16 onwards);
/// `name` is the token embedded in the configured filename template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FileId {
    pub token: String,
    pub name: String,
}

pub const TOKEN_PLACEHOLDER: &str = "{token}";

impl FileId {
    pub fn new(token: impl Into<String>, template: &str) -> Self {
        let token = token.into();
        let name = template.replace(TOKEN_PLACEHOLDER, &token);
        Self { token, name }
    }

    /// Human label used in progress updates, e.g. `2024-03 H1`.
    pub fn label(&self) -> String {
        let t = self.token.as_str();
        if t.len() != 8 || !t.is_ascii() {
            return t.to_string();
        }
        let half = match &t[6..8] {
            "01" => "H1",
            "02" => "H2",
            other => other,
        };
        format!("{}-{} {}", &t[0..4], &t[4..6], half)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Both hosts exhausted for one file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{file} not available from any host (last status: {})", status_label(.status))]
pub struct FetchError {
    pub file: String,
    pub status: Option<u16>,
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Source of raw document text for a [`FileId`].
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, file: &FileId) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_embeds_token() {
        let id = FileId::new("20240301", "tender_award_{token}.xml");
        assert_eq!(id.name, "tender_award_20240301.xml");
        assert_eq!(id.label(), "2024-03 H1");
        assert_eq!(FileId::new("20241202", "{token}").label(), "2024-12 H2");
    }

    #[test]
    fn fetch_error_reports_missing_status() {
        let e = FetchError {
            file: "a.xml".into(),
            status: None,
        };
        assert_eq!(e.to_string(), "a.xml not available from any host (last status: N/A)");
        let e = FetchError {
            file: "a.xml".into(),
            status: Some(503),
        };
        assert!(e.to_string().ends_with("(last status: 503)"));
    }
}
