//! # Collector run
//! One invocation: read history, fetch every adapter in turn, resolve each
//! metric, append the snapshot, persist, and refresh the dashboard view.
//!
//! Fetch failures and stale data never abort a run. Only persistence can.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;

use crate::config::CollectorConfig;
use crate::dashboard::DashboardView;
use crate::history::{append, HistoryStore, Snapshot};
use crate::metric::MetricKey;
use crate::reconcile::{build_snapshot, Observation, Resolution};
use crate::sources::{fetch, SourceAdapter};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

fn describe_metrics() {
    describe_counter!("collector_runs_total", "Completed collector runs.");
    describe_counter!(
        "collector_stale_total",
        "Successful fetches discarded as stale or zero."
    );
    describe_counter!(
        "collector_inherited_total",
        "Metrics carried over from the previous snapshot."
    );
    describe_counter!(
        "collector_defaulted_total",
        "Metrics resolved to their configured default."
    );
    describe_gauge!(
        "collector_history_len",
        "Snapshots in the history record after the last run."
    );
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: Snapshot,
    pub resolutions: BTreeMap<MetricKey, Resolution>,
    pub history_len: usize,
}

impl RunReport {
    pub fn count(&self, pred: impl Fn(&Resolution) -> bool) -> usize {
        self.resolutions.values().filter(|r| pred(r)).count()
    }
}

/// Fetch every metric from every adapter that supplies it, sequentially.
pub async fn collect_observations(
    adapters: &[Box<dyn SourceAdapter>],
    now: NaiveDateTime,
    timeout: std::time::Duration,
) -> Vec<Observation> {
    let mut out = Vec::new();
    for adapter in adapters {
        for metric in adapter.metrics() {
            out.push(fetch(adapter.as_ref(), metric, now, timeout).await);
        }
    }
    out
}

/// Run once against `store`. Returns an error only when the history (or the
/// dashboard view) cannot be written.
pub async fn run_once(
    adapters: &[Box<dyn SourceAdapter>],
    store: &HistoryStore,
    cfg: &CollectorConfig,
    now: NaiveDateTime,
) -> Result<RunReport> {
    ensure_metrics_described();

    let history = store.load();
    let observations = collect_observations(adapters, now, cfg.fetch_timeout()).await;

    let today = now.date();
    let stale = observations
        .iter()
        .filter(|o| !o.is_failure() && o.usable_value(today).is_none())
        .count();
    if stale > 0 {
        tracing::info!(stale, "discarded stale or zero readings");
    }

    let (snapshot, resolutions) = build_snapshot(&observations, history.last(), &cfg.defaults, now);

    for (metric, how) in &resolutions {
        match how {
            Resolution::Fresh { .. } => {}
            Resolution::Inherited => {
                tracing::warn!(metric = %metric, "no fresh reading, inherited previous value");
            }
            Resolution::Defaulted => {
                tracing::warn!(metric = %metric, "no fresh reading or history, using default");
            }
        }
    }

    let history = append(history, snapshot.clone(), cfg.max_history);
    store
        .save(&history)
        .with_context(|| format!("persisting history to {}", store.path().display()))?;

    if let Some(path) = &cfg.dashboard_path {
        DashboardView::from_snapshot(&snapshot).write_to(path)?;
    }

    let report = RunReport {
        snapshot,
        resolutions,
        history_len: history.len(),
    };

    counter!("collector_runs_total").increment(1);
    counter!("collector_stale_total").increment(stale as u64);
    counter!("collector_inherited_total")
        .increment(report.count(|r| matches!(r, Resolution::Inherited)) as u64);
    counter!("collector_defaulted_total")
        .increment(report.count(|r| matches!(r, Resolution::Defaulted)) as u64);
    gauge!("collector_history_len").set(report.history_len as f64);

    tracing::info!(
        target: "collector",
        fresh = report.count(|r| matches!(r, Resolution::Fresh { .. })),
        inherited = report.count(|r| matches!(r, Resolution::Inherited)),
        defaulted = report.count(|r| matches!(r, Resolution::Defaulted)),
        history_len = report.history_len,
        "snapshot appended"
    );

    Ok(report)
}
