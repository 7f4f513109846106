//! Award Report Service: Binary Entrypoint
//! Boots the Axum HTTP server: report trigger, progress stream, history.

use anyhow::Context;
use award_report::ReportConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    award_report::init_tracing();

    let cfg = ReportConfig::load_default()?;
    let addr = cfg.socket_addr()?;
    tracing::info!(
        %addr,
        primary = %cfg.primary_host,
        secondary = %cfg.secondary_host,
        output = %cfg.output_dir.display(),
        "starting award report service"
    );

    let router = award_report::app().await?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, router).await.context("http server")?;
    Ok(())
}
