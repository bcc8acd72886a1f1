//! # Metric keys
//! The fixed set of indicators tracked per snapshot.
//!
//! Declaration order is the output order: `Ord` is derived, so a
//! `BTreeMap<MetricKey, _>` iterates (and serializes) in this order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    /// Fear & greed style sentiment index (0..100).
    SentimentScore,
    /// Market valuation proxy: index price over a fixed EPS denominator.
    MarketPe,
    /// Benchmark bond yield, in percent.
    BondYield,
    /// FX rate (quote currency per base currency).
    FxRate,
    /// Commodity (gold) spot price.
    CommodityPrice,
    /// Monthly business-cycle monitoring score.
    BusinessCycleScore,
}

impl MetricKey {
    pub const ALL: [MetricKey; 6] = [
        MetricKey::SentimentScore,
        MetricKey::MarketPe,
        MetricKey::BondYield,
        MetricKey::FxRate,
        MetricKey::CommodityPrice,
        MetricKey::BusinessCycleScore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::SentimentScore => "sentiment_score",
            MetricKey::MarketPe => "market_pe",
            MetricKey::BondYield => "bond_yield",
            MetricKey::FxRate => "fx_rate",
            MetricKey::CommodityPrice => "commodity_price",
            MetricKey::BusinessCycleScore => "business_cycle_score",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MetricKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown metric: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_as_str() {
        for k in MetricKey::ALL {
            let json = serde_json::to_string(&k).unwrap();
            assert_eq!(json, format!("\"{}\"", k.as_str()));
            assert_eq!(k.as_str().parse::<MetricKey>().unwrap(), k);
        }
    }

    #[test]
    fn ordering_follows_declaration() {
        let mut shuffled = vec![
            MetricKey::BusinessCycleScore,
            MetricKey::FxRate,
            MetricKey::SentimentScore,
        ];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![
                MetricKey::SentimentScore,
                MetricKey::FxRate,
                MetricKey::BusinessCycleScore
            ]
        );
    }
}
