//! Collector — Binary Entrypoint
//! Runs one collection pass: fetch, reconcile, append to history, exit.
//!
//! Usage: `market-dashboard [--now "YYYY-MM-DD HH:MM"] [--config PATH]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use market_dashboard::{config, parse_now, run_default, ENV_NOW};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `DASHBOARD_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("market_dashboard=info,warn"));

    let json = std::env::var("DASHBOARD_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[derive(Debug, Default)]
struct Args {
    now: Option<String>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--now" => args.now = Some(it.next().context("--now needs a value")?),
            "--config" => args.config = Some(it.next().context("--config needs a value")?.into()),
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = parse_args()?;

    let cfg = match &args.config {
        Some(p) => config::load_config_from(p)?,
        None => config::load_config_default()?,
    };

    let now = match args.now.or_else(|| std::env::var(ENV_NOW).ok()) {
        Some(raw) => parse_now(&raw)?,
        None => chrono::Local::now().naive_local(),
    };

    let report = run_default(&cfg, now).await?;
    println!(
        "{}",
        serde_json::to_string(&report.snapshot).context("serializing snapshot")?
    );
    Ok(())
}
