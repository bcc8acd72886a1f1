use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::Deserialize;

use super::{civil_date, Mode, Reading, SourceAdapter, RANK_PRIMARY};
use crate::metric::MetricKey;
use crate::normalize::normalize;

pub const DEFAULT_URL: &str = "https://production.dataviz.cnn.io/index/fearandgreed/graphdata";

#[derive(Debug, Deserialize)]
struct GraphData {
    fear_and_greed: Current,
}

#[derive(Debug, Deserialize)]
struct Current {
    score: Option<serde_json::Value>,
    #[serde(default)]
    rating: Option<String>,
    timestamp: Option<String>,
}

/// Sentiment index from the CNN fear & greed graph feed.
pub struct CnnFearGreedProvider {
    mode: Mode,
    offset: FixedOffset,
}

impl CnnFearGreedProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
            offset: Utc.fix(),
        }
    }

    pub fn from_url(url: &str, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
            offset: Utc.fix(),
        }
    }

    /// Date readings in the run's civil offset instead of UTC.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    fn parse_reading(&self, body: &str) -> Result<Reading> {
        let data: GraphData = serde_json::from_str(body).context("parsing fear & greed json")?;
        let cur = data.fear_and_greed;

        // Score arrives as a number, occasionally as a string.
        let value = match cur.score {
            Some(serde_json::Value::Number(n)) => normalize(n.as_f64()),
            Some(serde_json::Value::String(s)) => normalize(s.as_str()),
            _ => 0.0,
        };
        if value == 0.0 {
            return Err(anyhow!("fear & greed score missing"));
        }

        let ts = cur
            .timestamp
            .as_deref()
            .ok_or_else(|| anyhow!("fear & greed timestamp missing"))?;
        let observed_at = DateTime::parse_from_rfc3339(ts)
            .map(|dt| civil_date(dt, self.offset))
            .with_context(|| format!("bad fear & greed timestamp {ts:?}"))?;

        tracing::debug!(score = value, rating = ?cur.rating, "fear & greed parsed");
        Ok(Reading { value, observed_at })
    }
}

#[async_trait]
impl SourceAdapter for CnnFearGreedProvider {
    fn name(&self) -> &'static str {
        "cnn_fear_greed"
    }

    fn rank(&self) -> u32 {
        RANK_PRIMARY
    }

    fn metrics(&self) -> Vec<MetricKey> {
        vec![MetricKey::SentimentScore]
    }

    async fn fetch_reading(&self, _metric: MetricKey, _now: NaiveDateTime) -> Result<Reading> {
        let body = self.mode.body(self.name()).await?;
        self.parse_reading(&body)
    }
}
