// src/sources/mod.rs
pub mod cnn;
pub mod cycle;
pub mod stooq;
pub mod yahoo;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::time::Duration;

use crate::config::CollectorConfig;
use crate::metric::MetricKey;
use crate::reconcile::Observation;

/// Rank of primary feeds.
pub const RANK_PRIMARY: u32 = 0;
/// Rank of secondary (scraped / tabular) fallbacks.
pub const RANK_SECONDARY: u32 = 1;

/// A successful upstream reading, already in final metric units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub observed_at: NaiveDate,
}

/// One upstream feed for one or more metrics.
///
/// Implementations report failures as `Err`; [`fetch`] is the only caller
/// and turns every error (and timeout) into a failure [`Observation`].
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    /// Static priority, lower wins.
    fn rank(&self) -> u32;
    /// Metrics this adapter can supply.
    fn metrics(&self) -> Vec<MetricKey>;
    async fn fetch_reading(&self, metric: MetricKey, now: NaiveDateTime) -> Result<Reading>;
}

/// Civil date of a feed timestamp in the run's offset, so it compares
/// against the run's local `now` without crossing midnight.
pub fn civil_date<Tz: TimeZone>(ts: DateTime<Tz>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

/// Where an adapter gets its payload from.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Canned payload (tests, offline runs).
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl Mode {
    /// Fetch the raw body, either from the fixture or over HTTP.
    pub async fn body(&self, provider: &'static str) -> Result<String> {
        match self {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { url, client } => client
                .get(url.as_str())
                .send()
                .await
                .with_context(|| format!("{provider} http get()"))?
                .error_for_status()
                .with_context(|| format!("{provider} non-2xx"))?
                .text()
                .await
                .with_context(|| format!("{provider} http .text()")),
        }
    }
}

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collector_fetch_failures_total",
            "Adapter fetches that failed or timed out."
        );
        describe_histogram!("collector_fetch_ms", "Adapter fetch time in milliseconds.");
    });
}

/// Fetch one metric from one adapter. Never fails: errors, timeouts and
/// unsupported metrics all come back as a failure observation.
pub async fn fetch(
    adapter: &dyn SourceAdapter,
    metric: MetricKey,
    now: NaiveDateTime,
    timeout: Duration,
) -> Observation {
    ensure_metrics_described();

    if !adapter.metrics().contains(&metric) {
        return Observation::failed(metric, adapter.rank(), adapter.name());
    }

    let t0 = std::time::Instant::now();
    let res = tokio::time::timeout(timeout, adapter.fetch_reading(metric, now)).await;
    histogram!("collector_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match res {
        Ok(Ok(r)) => Observation::ok(metric, r.value, r.observed_at, adapter.rank(), adapter.name()),
        Ok(Err(e)) => {
            tracing::warn!(error = ?e, provider = adapter.name(), metric = %metric, "provider error");
            counter!("collector_fetch_failures_total").increment(1);
            Observation::failed(metric, adapter.rank(), adapter.name())
        }
        Err(_) => {
            tracing::warn!(
                provider = adapter.name(),
                metric = %metric,
                timeout_ms = timeout.as_millis() as u64,
                "provider timed out"
            );
            counter!("collector_fetch_failures_total").increment(1);
            Observation::failed(metric, adapter.rank(), adapter.name())
        }
    }
}

/// Shared HTTP client for all live adapters.
pub fn http_client(cfg: &CollectorConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(cfg.fetch_timeout())
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .context("building http client")
}

/// The live adapter set: primary + secondary feed per quote-backed metric,
/// the sentiment feed, and the business-cycle table.
pub fn default_adapters(cfg: &CollectorConfig) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let client = http_client(cfg)?;
    let offset = cfg.utc_offset();
    let mut out: Vec<Box<dyn SourceAdapter>> = vec![Box::new(
        cnn::CnnFearGreedProvider::from_url(cnn::DEFAULT_URL, client.clone()).with_offset(offset),
    )];

    for metric in MetricKey::ALL {
        let Some(pair) = cfg.symbols.for_metric(metric) else {
            continue;
        };
        let divisor = (metric == MetricKey::MarketPe).then_some(cfg.eps_denominator);

        if !pair.primary.trim().is_empty() {
            out.push(Box::new(
                yahoo::YahooQuoteProvider::from_symbol(metric, &pair.primary, client.clone())
                    .with_divisor(divisor)
                    .with_offset(offset),
            ));
        }
        if !pair.secondary.trim().is_empty() {
            out.push(Box::new(
                stooq::StooqCsvProvider::from_symbol(metric, &pair.secondary, client.clone())
                    .with_divisor(divisor),
            ));
        }
    }

    out.push(Box::new(cycle::BusinessCycleTable::new(
        cfg.business_cycle.clone(),
    )));
    Ok(out)
}

/// Divide by the configured fixed denominator, if any.
pub(crate) fn derive(value: f64, divisor: Option<f64>) -> Result<f64> {
    match divisor {
        None => Ok(value),
        Some(d) if d.is_finite() && d != 0.0 => Ok(value / d),
        Some(d) => anyhow::bail!("invalid derivation denominator {d}"),
    }
}
