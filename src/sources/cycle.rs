//! Business-cycle score from a configured `(effective_from, score)` table.
//!
//! The score is published monthly; the latest row not after the run date
//! applies. The table is authoritative as of the run, so the reading is
//! dated on the run date.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use super::{Reading, SourceAdapter, RANK_PRIMARY};
use crate::config::CycleEntry;
use crate::metric::MetricKey;

pub struct BusinessCycleTable {
    /// Sorted by `effective_from`.
    entries: Vec<CycleEntry>,
}

impl BusinessCycleTable {
    pub fn new(mut entries: Vec<CycleEntry>) -> Self {
        entries.sort_by_key(|e| e.effective_from);
        Self { entries }
    }

    /// Score of the latest entry with `effective_from <= date`.
    pub fn lookup(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.entries.partition_point(|e| e.effective_from <= date);
        idx.checked_sub(1).map(|i| self.entries[i].score)
    }
}

#[async_trait]
impl SourceAdapter for BusinessCycleTable {
    fn name(&self) -> &'static str {
        "business_cycle_table"
    }

    fn rank(&self) -> u32 {
        RANK_PRIMARY
    }

    fn metrics(&self) -> Vec<MetricKey> {
        vec![MetricKey::BusinessCycleScore]
    }

    async fn fetch_reading(&self, _metric: MetricKey, now: NaiveDateTime) -> Result<Reading> {
        let today = now.date();
        let value = self
            .lookup(today)
            .ok_or_else(|| anyhow!("no business-cycle entry on or before {today}"))?;
        Ok(Reading {
            value,
            observed_at: today,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn table() -> BusinessCycleTable {
        BusinessCycleTable::new(vec![
            CycleEntry {
                effective_from: d(2024, 3, 1),
                score: 33.0,
            },
            CycleEntry {
                effective_from: d(2024, 1, 1),
                score: 38.0,
            },
        ])
    }

    #[test]
    fn lookup_picks_latest_not_after() {
        let t = table();
        assert_eq!(t.lookup(d(2023, 12, 31)), None);
        assert_eq!(t.lookup(d(2024, 1, 1)), Some(38.0));
        assert_eq!(t.lookup(d(2024, 2, 29)), Some(38.0));
        assert_eq!(t.lookup(d(2024, 3, 1)), Some(33.0));
        assert_eq!(t.lookup(d(2030, 1, 1)), Some(33.0));
    }

    #[tokio::test]
    async fn reading_is_dated_on_run_day() {
        let now = d(2024, 3, 13).and_hms_opt(8, 0, 0).unwrap();
        let r = table()
            .fetch_reading(MetricKey::BusinessCycleScore, now)
            .await
            .unwrap();
        assert_eq!(r.value, 33.0);
        assert_eq!(r.observed_at, now.date());
    }
}
