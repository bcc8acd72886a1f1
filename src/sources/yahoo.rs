//! Chart-API quote adapter (primary feed for quote-backed metrics).
//!
//! Reads `meta.regularMarketPrice` / `meta.regularMarketTime` from the v8
//! chart endpoint. The feed keeps serving the last traded price while the
//! exchange is closed, so the observation date matters downstream.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::Deserialize;

use super::{civil_date, derive, Mode, Reading, SourceAdapter, RANK_PRIMARY};
use crate::metric::MetricKey;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Meta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
}

pub struct YahooQuoteProvider {
    metric: MetricKey,
    symbol: String,
    divisor: Option<f64>,
    mode: Mode,
    offset: FixedOffset,
}

impl YahooQuoteProvider {
    pub fn chart_url(symbol: &str) -> String {
        format!("https://query2.finance.yahoo.com/v8/finance/chart/{symbol}?interval=1d&range=5d")
    }

    pub fn from_symbol(metric: MetricKey, symbol: &str, client: reqwest::Client) -> Self {
        Self {
            metric,
            symbol: symbol.to_string(),
            divisor: None,
            mode: Mode::Http {
                url: Self::chart_url(symbol),
                client,
            },
            offset: Utc.fix(),
        }
    }

    pub fn from_fixture_str(metric: MetricKey, symbol: &str, body: &str) -> Self {
        Self {
            metric,
            symbol: symbol.to_string(),
            divisor: None,
            mode: Mode::Fixture(body.to_string()),
            offset: Utc.fix(),
        }
    }

    /// Report `price / divisor` instead of the raw price.
    pub fn with_divisor(mut self, divisor: Option<f64>) -> Self {
        self.divisor = divisor;
        self
    }

    /// Date the market time in the run's civil offset instead of UTC.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    fn parse_reading(&self, body: &str) -> Result<Reading> {
        let resp: ChartResponse = serde_json::from_str(body)
            .map_err(|e| anyhow!("chart response for {} changed shape: {e}", self.symbol))?;

        let data = match resp.chart.result {
            Some(v) => v.into_iter().next(),
            None => None,
        };
        let Some(data) = data else {
            return Err(match resp.chart.error {
                Some(err) => anyhow!("{}: {} ({})", self.symbol, err.code, err.description),
                None => anyhow!("{}: empty chart result", self.symbol),
            });
        };

        let price = data
            .meta
            .regular_market_price
            .filter(|p| p.is_finite())
            .ok_or_else(|| anyhow!("{}: no market price", self.symbol))?;
        let ts = data
            .meta
            .regular_market_time
            .ok_or_else(|| anyhow!("{}: no market time", self.symbol))?;
        let observed_at = DateTime::from_timestamp(ts, 0)
            .map(|dt| civil_date(dt, self.offset))
            .ok_or_else(|| anyhow!("{}: invalid market time {ts}", self.symbol))?;

        Ok(Reading {
            value: derive(price, self.divisor)?,
            observed_at,
        })
    }
}

#[async_trait]
impl SourceAdapter for YahooQuoteProvider {
    fn name(&self) -> &'static str {
        "yahoo_chart"
    }

    fn rank(&self) -> u32 {
        RANK_PRIMARY
    }

    fn metrics(&self) -> Vec<MetricKey> {
        vec![self.metric]
    }

    async fn fetch_reading(&self, _metric: MetricKey, _now: NaiveDateTime) -> Result<Reading> {
        let body = self.mode.body(self.name()).await?;
        self.parse_reading(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BODY: &str = r#"{"chart":{"result":[{"meta":{"symbol":"GC=F","regularMarketPrice":2174.8,"regularMarketTime":1710374397}}],"error":null}}"#;

    #[test]
    fn reads_price_and_date() {
        let p = YahooQuoteProvider::from_fixture_str(MetricKey::CommodityPrice, "GC=F", BODY);
        let r = p.parse_reading(BODY).unwrap();
        assert_eq!(r.value, 2174.8);
        assert_eq!(r.observed_at, NaiveDate::from_ymd_opt(2024, 3, 13).unwrap());
    }

    #[test]
    fn market_time_is_dated_in_run_offset() {
        // 23:59:57 UTC on the 13th is already the 14th in Taipei.
        let p = YahooQuoteProvider::from_fixture_str(MetricKey::CommodityPrice, "GC=F", BODY)
            .with_offset(FixedOffset::east_opt(8 * 3600).unwrap());
        let r = p.parse_reading(BODY).unwrap();
        assert_eq!(r.observed_at, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
    }

    #[test]
    fn divisor_derives_ratio() {
        let p = YahooQuoteProvider::from_fixture_str(MetricKey::MarketPe, "X", BODY)
            .with_divisor(Some(100.0));
        assert!((p.parse_reading(BODY).unwrap().value - 21.748).abs() < 1e-9);
    }

    #[test]
    fn api_error_is_reported() {
        let p = YahooQuoteProvider::from_fixture_str(MetricKey::FxRate, "BAD", "");
        let err = p
            .parse_reading(r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }
}
