// src/config/report.rs
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::types::TOKEN_PLACEHOLDER;

pub const ENV_CONFIG_PATH: &str = "REPORT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/report.toml";

const ENV_PRIMARY_HOST: &str = "REPORT_PRIMARY_HOST";
const ENV_SECONDARY_HOST: &str = "REPORT_SECONDARY_HOST";
const ENV_OUTPUT_DIR: &str = "REPORT_OUTPUT_DIR";
const ENV_FETCH_TIMEOUT_SECS: &str = "REPORT_FETCH_TIMEOUT_SECS";
const ENV_BIND_ADDR: &str = "REPORT_BIND_ADDR";

fn default_primary_host() -> String {
    "https://data.procurement.example.gov/awards".to_string()
}
fn default_secondary_host() -> String {
    "https://mirror.procurement.example.gov/awards".to_string()
}
fn default_file_template() -> String {
    "tender_award_{token}.xml".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    45
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_history_file() -> String {
    "history.json".to_string()
}
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_primary_host")]
    pub primary_host: String,
    #[serde(default = "default_secondary_host")]
    pub secondary_host: String,
    /// Must contain `{token}`.
    #[serde(default = "default_file_template")]
    pub file_template: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            primary_host: default_primary_host(),
            secondary_host: default_secondary_host(),
            file_template: default_file_template(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            output_dir: default_output_dir(),
            history_file: default_history_file(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl ReportConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading report config from {}", path.display()))?;
        let cfg: ReportConfig = toml::from_str(&data)
            .with_context(|| format!("parsing report config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks, then apply per-field env overrides:
    /// 1) $REPORT_CONFIG_PATH (must exist)
    /// 2) config/report.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from_file(&default_p)?
            } else {
                Self::default()
            }
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var(ENV_PRIMARY_HOST) {
            self.primary_host = v;
        }
        if let Ok(v) = std::env::var(ENV_SECONDARY_HOST) {
            self.secondary_host = v;
        }
        if let Ok(v) = std::env::var(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = std::env::var(ENV_FETCH_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            self.fetch_timeout_secs = v;
        }
        if let Ok(v) = std::env::var(ENV_BIND_ADDR) {
            self.bind_addr = v;
        }
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if !self.file_template.contains(TOKEN_PLACEHOLDER) {
            tracing::warn!(template = %self.file_template, "file template lacks {{token}}, using default");
            self.file_template = default_file_template();
        }
        if self.history_file.trim().is_empty() {
            self.history_file = default_history_file();
        }
        self.primary_host = self.primary_host.trim_end_matches('/').to_string();
        self.secondary_host = self.secondary_host.trim_end_matches('/').to_string();
        self
    }

    pub fn hosts(&self) -> [String; 2] {
        [self.primary_host.clone(), self.secondary_host.clone()]
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(&self.history_file)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid bind address {}", self.bind_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn partial_toml_fills_defaults_and_sanitizes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("report.toml");
        fs::write(
            &p,
            r#"
primary_host = "http://a.test/files/"
file_template = "no-placeholder.xml"
fetch_timeout_secs = 0
"#,
        )
        .unwrap();
        let cfg = ReportConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.primary_host, "http://a.test/files");
        assert_eq!(cfg.file_template, default_file_template());
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(45));
        assert_eq!(cfg.history_path(), PathBuf::from("reports/history.json"));
    }

    #[serial_test::serial]
    #[test]
    fn env_path_and_overrides_take_precedence() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // nothing on disk → defaults
        let cfg = ReportConfig::load_default().unwrap();
        assert_eq!(cfg.fetch_timeout_secs, 45);

        let p = tmp.path().join("custom.toml");
        fs::write(&p, r#"output_dir = "out""#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_SECONDARY_HOST, "http://b.test");
        let cfg = ReportConfig::load_default().unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.secondary_host, "http://b.test");

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(ReportConfig::load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_SECONDARY_HOST);
        env::set_current_dir(&old).unwrap();
    }
}
