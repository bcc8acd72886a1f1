//! # History Store
//! Append-only, length-capped log of resolved snapshots.
//!
//! On disk the history is a JSON array, oldest first; every entry is a flat
//! object of `metric name -> number` plus `"timestamp": "YYYY-MM-DD HH:MM"`.
//! The whole array is rewritten on every run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::metric::MetricKey;

/// Civil-time format for snapshot timestamps (minute precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Fully resolved set of metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "minute_ts")]
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub values: BTreeMap<MetricKey, f64>,
}

impl Snapshot {
    pub fn new(timestamp: NaiveDateTime, values: BTreeMap<MetricKey, f64>) -> Self {
        Self {
            timestamp: truncate_to_minute(timestamp),
            values,
        }
    }

    pub fn get(&self, metric: MetricKey) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    /// True when every tracked metric has a finite value.
    pub fn is_complete(&self) -> bool {
        MetricKey::ALL
            .iter()
            .all(|k| self.get(*k).is_some_and(f64::is_finite))
    }
}

/// Ordered snapshots, oldest first.
pub type History = Vec<Snapshot>;

/// Append `snapshot` and evict from the front until at most `max_len` remain.
pub fn append(mut history: History, snapshot: Snapshot, max_len: usize) -> History {
    history.push(snapshot);
    if history.len() > max_len {
        let excess = history.len() - max_len;
        history.drain(0..excess);
    }
    history
}

/// Flat-file persistence of the history log.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full history. Missing or unreadable records degrade to empty.
    pub fn load(&self) -> History {
        let content = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no history yet, starting empty");
                return History::new();
            }
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "history unreadable, starting empty");
                return History::new();
            }
        };

        let entries = match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Array(entries)) => entries,
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "history is not a json array, starting empty");
                return History::new();
            }
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "history corrupt, starting empty");
                return History::new();
            }
        };

        entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| snapshot_from_entry(i, entry))
            .collect()
    }

    /// Overwrite the record with `history`.
    ///
    /// Writes a sibling temp file and renames it over the target, so a crash
    /// mid-write leaves the previous record intact.
    pub fn save(&self, history: &[Snapshot]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating history dir {}", dir.display()))?;
        }

        let body = serde_json::to_string_pretty(history).context("serializing history")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing history at {}", self.path.display()))?;
        Ok(())
    }
}

/// Rebuild one stored entry. Entries without a usable timestamp are dropped;
/// unknown keys and non-numeric values are dropped from the entry.
fn snapshot_from_entry(index: usize, entry: &serde_json::Value) -> Option<Snapshot> {
    let Some(obj) = entry.as_object() else {
        tracing::warn!(index, "history entry is not an object, skipping");
        return None;
    };

    let timestamp = obj
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|raw| NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok());
    let Some(timestamp) = timestamp else {
        tracing::warn!(index, raw = ?obj.get("timestamp"), "history entry has no valid timestamp, skipping");
        return None;
    };

    let mut values = BTreeMap::new();
    for (key, raw) in obj.iter().filter(|(k, _)| k.as_str() != "timestamp") {
        let Ok(metric) = key.parse::<MetricKey>() else {
            tracing::warn!(index, key = %key, "unknown key in history entry, ignoring");
            continue;
        };
        match raw.as_f64().filter(|v| v.is_finite()) {
            Some(v) => {
                values.insert(metric, v);
            }
            None => tracing::warn!(index, metric = %metric, value = %raw, "non-numeric history value, ignoring"),
        }
    }
    Some(Snapshot::new(timestamp, values))
}

fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    use chrono::Timelike;
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

mod minute_ts {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 13)
            .unwrap()
            .and_hms_opt(h, m, 42)
            .unwrap()
    }

    fn snap(h: u32, gold: f64) -> Snapshot {
        let values = MetricKey::ALL.iter().map(|k| (*k, 1.0)).collect::<BTreeMap<_, _>>();
        let mut s = Snapshot::new(ts(h, 0), values);
        s.values.insert(MetricKey::CommodityPrice, gold);
        s
    }

    #[test]
    fn append_evicts_oldest_first() {
        let h = vec![snap(1, 1.0), snap(2, 2.0), snap(3, 3.0)];
        let out = append(h, snap(4, 4.0), 3);
        let golds: Vec<f64> = out
            .iter()
            .map(|s| s.get(MetricKey::CommodityPrice).unwrap())
            .collect();
        assert_eq!(golds, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn append_below_cap_keeps_everything() {
        let out = append(vec![snap(1, 1.0)], snap(2, 2.0), 10);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn serializes_flat_with_minute_timestamp() {
        let s = snap(9, 2000.0);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["timestamp"], "2024-03-13 09:00");
        assert_eq!(v["commodity_price"], 2000.0);
        assert_eq!(v["business_cycle_score"], 1.0);
        assert!(s.is_complete());
    }

    #[test]
    fn entry_keeps_known_numeric_values_only() {
        let entry = serde_json::json!({
            "timestamp": "2024-03-13 09:00",
            "fx_rate": 32.1,
            "bond_yield": "4.2",
            "note": "x"
        });
        let s = snapshot_from_entry(0, &entry).unwrap();
        assert_eq!(s.get(MetricKey::FxRate), Some(32.1));
        assert_eq!(s.values.len(), 1);

        assert!(snapshot_from_entry(1, &serde_json::json!({"fx_rate": 1})).is_none());
        assert!(snapshot_from_entry(2, &serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn timestamp_drops_seconds() {
        let s = Snapshot::new(ts(9, 15), BTreeMap::new());
        assert_eq!(s.timestamp, ts(9, 15).with_second(0).unwrap());
        assert_eq!(s.timestamp.second(), 0);
    }
}
