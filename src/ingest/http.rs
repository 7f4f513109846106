// src/ingest/http.rs
//! Two-host source fetcher: primary first, secondary on any failure. No retry beyond that.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::{Client, StatusCode};

use crate::config::ReportConfig;
use crate::ingest::types::{FetchError, FileId, SourceFetcher};

/// Some upstream endpoints answer 200 with an HTML error page.
pub fn looks_like_html_error(body: &str) -> bool {
    static RE_HTML: OnceCell<Regex> = OnceCell::new();
    let re = RE_HTML.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:<\?xml[^>]*\?>\s*)?(?:<!doctype\s+html|<html[\s>])")
            .expect("html sniff regex")
    });
    re.is_match(body.trim_start_matches('\u{feff}'))
}

#[derive(Debug)]
enum AttemptError {
    Request(reqwest::Error),
    Status(StatusCode),
    HtmlPage(StatusCode),
}

impl AttemptError {
    fn status(&self) -> Option<u16> {
        match self {
            AttemptError::Request(e) => e.status().map(|s| s.as_u16()),
            AttemptError::Status(s) | AttemptError::HtmlPage(s) => Some(s.as_u16()),
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Request(e) => write!(f, "request failed: {e}"),
            AttemptError::Status(s) => write!(f, "http status {s}"),
            AttemptError::HtmlPage(s) => write!(f, "html error page (status {s})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    hosts: [String; 2],
}

impl HttpFetcher {
    pub fn new(hosts: [String; 2], timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self { client, hosts })
    }

    pub fn from_config(cfg: &ReportConfig) -> anyhow::Result<Self> {
        Self::new(cfg.hosts(), cfg.fetch_timeout())
    }

    pub fn url_for(host: &str, file: &FileId) -> String {
        format!("{}/{}", host.trim_end_matches('/'), file.name)
    }

    async fn attempt(&self, url: &str) -> Result<String, AttemptError> {
        counter!("source_fetch_attempts_total").increment(1);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AttemptError::Request)?;
        let status = resp.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(AttemptError::Status(status));
        }
        let body = resp.text().await.map_err(AttemptError::Request)?;
        if looks_like_html_error(&body) {
            return Err(AttemptError::HtmlPage(status));
        }
        Ok(body)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, file: &FileId) -> Result<String, FetchError> {
        let mut last_status: Option<u16> = None;

        for (i, host) in self.hosts.iter().enumerate() {
            let url = Self::url_for(host, file);
            match self.attempt(&url).await {
                Ok(body) => {
                    if i > 0 {
                        counter!("source_fetch_fallback_total").increment(1);
                        tracing::info!(file = %file.name, %host, "fetched from secondary host");
                    }
                    return Ok(body);
                }
                Err(e) => {
                    if let Some(s) = e.status() {
                        last_status = Some(s);
                    }
                    tracing::warn!(file = %file.name, %host, error = %e, "source fetch attempt failed");
                }
            }
        }

        counter!("source_fetch_failures_total").increment(1);
        Err(FetchError {
            file: file.name.clone(),
            status: last_status,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_sniff() {
        assert!(looks_like_html_error("<!DOCTYPE html><html></html>"));
        assert!(looks_like_html_error("  \n<html lang=\"en\">"));
        assert!(looks_like_html_error("\u{feff}<HTML>"));
        assert!(!looks_like_html_error("<?xml version=\"1.0\"?><response/>"));
        assert!(!looks_like_html_error("<htmlish/>"));
    }

    #[test]
    fn url_joins_host_and_name() {
        let f = FileId::new("20240301", "t_{token}.xml");
        assert_eq!(
            HttpFetcher::url_for("http://h.test/base/", &f),
            "http://h.test/base/t_20240301.xml"
        );
    }
}
