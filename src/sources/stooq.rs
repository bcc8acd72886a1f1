//! Tabular CSV quote feed, used as the secondary source for quote-backed metrics.
//!
//! Format (one data row): `Symbol,Date,Time,Open,High,Low,Close`. Missing
//! cells come back as `N/D`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use super::{derive, Mode, Reading, SourceAdapter, RANK_SECONDARY};
use crate::metric::MetricKey;
use crate::normalize::normalize_str;

pub struct StooqCsvProvider {
    metric: MetricKey,
    symbol: String,
    divisor: Option<f64>,
    mode: Mode,
}

impl StooqCsvProvider {
    pub fn quote_url(symbol: &str) -> String {
        format!("https://stooq.com/q/l/?s={symbol}&f=sd2t2ohlc&h&e=csv")
    }

    pub fn from_symbol(metric: MetricKey, symbol: &str, client: reqwest::Client) -> Self {
        Self {
            metric,
            symbol: symbol.to_ascii_lowercase(),
            divisor: None,
            mode: Mode::Http {
                url: Self::quote_url(&symbol.to_ascii_lowercase()),
                client,
            },
        }
    }

    pub fn from_fixture_str(metric: MetricKey, symbol: &str, body: &str) -> Self {
        Self {
            metric,
            symbol: symbol.to_ascii_lowercase(),
            divisor: None,
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn with_divisor(mut self, divisor: Option<f64>) -> Self {
        self.divisor = divisor;
        self
    }

    fn parse_reading(&self, body: &str) -> Result<Reading> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = rdr.headers().context("reading csv header")?.clone();
        let col = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow!("{}: csv has no {name} column", self.symbol))
        };
        let date_idx = col("Date")?;
        let close_idx = col("Close")?;

        let row = rdr
            .records()
            .next()
            .ok_or_else(|| anyhow!("{}: csv has no data row", self.symbol))?
            .context("reading csv row")?;

        let raw_date = row.get(date_idx).unwrap_or_default();
        let observed_at = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .with_context(|| format!("{}: bad date {raw_date:?}", self.symbol))?;

        let close = normalize_str(row.get(close_idx).unwrap_or_default());
        if close == 0.0 {
            return Err(anyhow!("{}: no close price", self.symbol));
        }

        Ok(Reading {
            value: derive(close, self.divisor)?,
            observed_at,
        })
    }
}

#[async_trait]
impl SourceAdapter for StooqCsvProvider {
    fn name(&self) -> &'static str {
        "stooq_csv"
    }

    fn rank(&self) -> u32 {
        RANK_SECONDARY
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

    #[test]
    fn reads_close_and_date() {
        let body = "Symbol,Date,Time,Open,High,Low,Close\nUSDTWD,2024-03-13,22:59:57,31.52,31.61,31.49,31.574\n";
        let p = StooqCsvProvider::from_fixture_str(MetricKey::FxRate, "USDTWD", body);
        let r = p.parse_reading(body).unwrap();
        assert_eq!(r.value, 31.57);
        assert_eq!(r.observed_at, NaiveDate::from_ymd_opt(2024, 3, 13).unwrap());
    }

    #[test]
    fn missing_data_is_an_error() {
        let body = "Symbol,Date,Time,Open,High,Low,Close\nXAUUSD,N/D,N/D,N/D,N/D,N/D,N/D\n";
        let p = StooqCsvProvider::from_fixture_str(MetricKey::CommodityPrice, "XAUUSD", body);
        assert!(p.parse_reading(body).is_err());

        let body = "Symbol,Date,Time,Open,High,Low,Close\nXAUUSD,2024-03-13,22:00:00,1,1,1,N/D\n";
        assert!(p.parse_reading(body).is_err());
    }
}
