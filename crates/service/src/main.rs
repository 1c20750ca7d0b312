//! `homematchd`: loads the catalog and index, then serves JSON-lines requests on stdin/stdout.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use core_types::config::load_or_create_config;
use service::{HomeMatch, dispatcher, init_tracing_with_config};

#[derive(Debug, Parser)]
#[command(name = "homematchd", version, about = "HomeMatch listing search daemon (JSON lines on stdio)")]
struct Args {
    /// Config file; defaults to $HOMEMATCH_CONFIG or ./homematch.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let cfg = load_or_create_config(args.config.as_deref())?;
    let _guard = init_tracing_with_config(&cfg.logging)?;

    let app = tokio::task::spawn_blocking({
        let cfg = cfg.clone();
        move || HomeMatch::from_config(&cfg)
    })
    .await
    .context("bootstrap task panicked")?
    .context("failed to initialize catalog or embedding index")?;

    tracing::info!(
        listings = app.catalog().len(),
        fanout = app.fanout(),
        "homematchd ready; reading requests from stdin"
    );

    let sweep_every = Duration::from_secs(cfg.sessions.sweep_interval_secs);
    tokio::select! {
        res = dispatcher::serve(&app, tokio::io::stdin(), tokio::io::stdout(), sweep_every) => res?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received; shutting down"),
    }
    if let Some(metrics) = app.metrics()
        && let Ok(text) = metrics.scrape()
    {
        tracing::debug!(metrics = %text, "final metrics");
    }
    Ok(())
}
