//! # Reconciliation Engine
//! Picks one value per metric per run from (in order):
//! 1. the best fresh, non-zero candidate (lowest `source_rank`, input order on ties),
//! 2. the previous snapshot's value, reused verbatim,
//! 3. the configured default.
//!
//! Pure: no I/O, no clock. The caller supplies "now".

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::history::Snapshot;
use crate::metric::MetricKey;
use crate::normalize::{normalize, round2};
use crate::staleness::is_fresh;

/// One sourced reading of a metric. `value = None` means the fetch failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub metric: MetricKey,
    pub value: Option<f64>,
    pub observed_at: Option<NaiveDate>,
    /// Lower = higher priority. Declared statically by the adapter.
    pub source_rank: u32,
    /// Adapter name, for logs only.
    #[serde(default)]
    pub source: String,
}

impl Observation {
    pub fn ok(
        metric: MetricKey,
        value: f64,
        observed_at: NaiveDate,
        source_rank: u32,
        source: impl Into<String>,
    ) -> Self {
        Self {
            metric,
            value: Some(value),
            observed_at: Some(observed_at),
            source_rank,
            source: source.into(),
        }
    }

    pub fn failed(metric: MetricKey, source_rank: u32, source: impl Into<String>) -> Self {
        Self {
            metric,
            value: None,
            observed_at: None,
            source_rank,
            source: source.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.value.is_none()
    }

    /// Usable value: present, finite, non-zero, dated, and fresh as of `now`.
    /// Zero is never a legitimate reading here.
    pub fn usable_value(&self, today: NaiveDate) -> Option<f64> {
        let v = self.value.filter(|v| v.is_finite() && *v != 0.0)?;
        let at = self.observed_at?;
        is_fresh(at, today, today.weekday()).then_some(v)
    }
}

/// Which path produced a resolved value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Fresh { source: String, rank: u32 },
    Inherited,
    Defaulted,
}

/// Resolve one metric to a single finite value.
pub fn resolve(
    metric: MetricKey,
    candidates: &[Observation],
    last_snapshot: Option<&Snapshot>,
    default: f64,
    now: NaiveDateTime,
) -> f64 {
    resolve_detailed(metric, candidates, last_snapshot, default, now).0
}

/// [`resolve`] plus the path that produced the value.
pub fn resolve_detailed(
    metric: MetricKey,
    candidates: &[Observation],
    last_snapshot: Option<&Snapshot>,
    default: f64,
    now: NaiveDateTime,
) -> (f64, Resolution) {
    let today = now.date();

    // 1) + 2) Lowest rank among usable candidates; `min_by_key` keeps the
    // first of equal keys, so input order breaks ties. Rounded at write time.
    let best = candidates
        .iter()
        .filter(|c| c.metric == metric)
        .filter_map(|c| {
            let v = round2(normalize(c.usable_value(today)?));
            (v != 0.0).then_some((c, v))
        })
        .min_by_key(|(c, _)| c.source_rank);

    if let Some((c, value)) = best {
        return (
            value,
            Resolution::Fresh {
                source: c.source.clone(),
                rank: c.source_rank,
            },
        );
    }

    // 3) Inherit verbatim from the previous snapshot.
    if let Some(prev) = last_snapshot
        .and_then(|s| s.get(metric))
        .filter(|v| v.is_finite())
    {
        return (prev, Resolution::Inherited);
    }

    // 4) First run with nothing usable.
    let value = if default.is_finite() { round2(default) } else { 0.0 };
    (value, Resolution::Defaulted)
}

/// Resolve every tracked metric independently and assemble the run's snapshot.
///
/// `candidates` may hold observations for any metric; each metric only sees
/// its own. `defaults` missing a metric falls back to `0.0`.
pub fn build_snapshot(
    candidates: &[Observation],
    last_snapshot: Option<&Snapshot>,
    defaults: &BTreeMap<MetricKey, f64>,
    now: NaiveDateTime,
) -> (Snapshot, BTreeMap<MetricKey, Resolution>) {
    let mut values = BTreeMap::new();
    let mut provenance = BTreeMap::new();

    for metric in MetricKey::ALL {
        let default = defaults.get(&metric).copied().unwrap_or(0.0);
        let (v, how) = resolve_detailed(metric, candidates, last_snapshot, default, now);
        tracing::debug!(metric = %metric, value = v, resolution = ?how, "resolved");
        values.insert(metric, v);
        provenance.insert(metric, how);
    }

    (Snapshot::new(now, values), provenance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        // Wednesday
        NaiveDate::from_ymd_opt(2024, 3, 13)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn obs(v: f64, days_old: i64, rank: u32, src: &str) -> Observation {
        Observation::ok(
            MetricKey::FxRate,
            v,
            now().date() - Duration::days(days_old),
            rank,
            src,
        )
    }

    #[test]
    fn rank_beats_input_order() {
        let c = vec![obs(31.5, 0, 1, "secondary"), obs(32.123, 0, 0, "primary")];
        let (v, how) = resolve_detailed(MetricKey::FxRate, &c, None, 30.0, now());
        assert_eq!(v, 32.12);
        assert_eq!(
            how,
            Resolution::Fresh {
                source: "primary".into(),
                rank: 0
            }
        );
    }

    #[test]
    fn equal_ranks_take_first_listed() {
        let c = vec![obs(31.5, 0, 0, "a"), obs(32.0, 0, 0, "b")];
        assert_eq!(resolve(MetricKey::FxRate, &c, None, 30.0, now()), 31.5);
    }

    #[test]
    fn zero_stale_and_failed_are_skipped() {
        let c = vec![
            Observation::failed(MetricKey::FxRate, 0, "down"),
            obs(0.0, 0, 0, "zero"),
            obs(33.0, 3, 0, "stale"),
            obs(31.0, 1, 2, "backup"),
        ];
        assert_eq!(resolve(MetricKey::FxRate, &c, None, 30.0, now()), 31.0);
    }

    #[test]
    fn other_metrics_are_ignored() {
        let c = vec![Observation::ok(
            MetricKey::BondYield,
            4.2,
            now().date(),
            0,
            "yield",
        )];
        let (v, how) = resolve_detailed(MetricKey::FxRate, &c, None, 30.0, now());
        assert_eq!(v, 30.0);
        assert_eq!(how, Resolution::Defaulted);
    }

    #[test]
    fn inherits_verbatim_then_defaults() {
        let mut values = BTreeMap::new();
        values.insert(MetricKey::FxRate, 32.456);
        let prev = Snapshot::new(now() - Duration::hours(1), values);

        let (v, how) = resolve_detailed(MetricKey::FxRate, &[], Some(&prev), 30.0, now());
        assert_eq!(v, 32.456);
        assert_eq!(how, Resolution::Inherited);

        let (v, how) = resolve_detailed(MetricKey::BondYield, &[], Some(&prev), 4.0, now());
        assert_eq!(v, 4.0);
        assert_eq!(how, Resolution::Defaulted);
    }

    #[test]
    fn non_finite_default_still_yields_finite() {
        let v = resolve(MetricKey::FxRate, &[], None, f64::NAN, now());
        assert!(v.is_finite());
    }

    #[test]
    fn snapshot_covers_every_metric() {
        let c = vec![obs(32.0, 0, 0, "fx")];
        let (snap, prov) = build_snapshot(&c, None, &BTreeMap::new(), now());
        assert!(snap.is_complete());
        assert_eq!(snap.get(MetricKey::FxRate), Some(32.0));
        assert_eq!(prov.len(), MetricKey::ALL.len());
        assert_eq!(prov[&MetricKey::SentimentScore], Resolution::Defaulted);
    }
}
