// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod collector;
pub mod config;
pub mod dashboard;
pub mod history;
pub mod metric;
pub mod normalize;
pub mod reconcile;
pub mod sources;
pub mod staleness;

// ---- Re-exports for stable public API ----
pub use crate::collector::{run_once, RunReport};
pub use crate::config::CollectorConfig;
pub use crate::history::{History, HistoryStore, Snapshot};
pub use crate::metric::MetricKey;
pub use crate::reconcile::{resolve, Observation};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

/// Env override for the run's civil time (`YYYY-MM-DD HH:MM`).
pub const ENV_NOW: &str = "DASHBOARD_NOW";

/// Parse a `YYYY-MM-DD HH:MM` override.
pub fn parse_now(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), history::TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid now override {raw:?}, expected YYYY-MM-DD HH:MM"))
}

/// Load config, build the live adapter set, and run once.
pub async fn run_default(cfg: &CollectorConfig, now: NaiveDateTime) -> Result<RunReport> {
    let adapters = sources::default_adapters(cfg)?;
    let store = HistoryStore::new(&cfg.history_path);
    run_once(&adapters, &store, cfg, now).await
}
