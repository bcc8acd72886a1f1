//! # Dashboard view
//! Latest-state JSON for the dashboard page: the newest snapshot plus
//! human-readable bands for the sentiment index and the business-cycle score.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::history::{Snapshot, TIMESTAMP_FORMAT};
use crate::metric::MetricKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentRating {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentRating {
    /// Fear & greed bands: <25, <45, <=55, <=75, above.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            SentimentRating::ExtremeFear
        } else if score < 45.0 {
            SentimentRating::Fear
        } else if score <= 55.0 {
            SentimentRating::Neutral
        } else if score <= 75.0 {
            SentimentRating::Greed
        } else {
            SentimentRating::ExtremeGreed
        }
    }
}

/// Business-cycle monitoring light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleLight {
    Blue,
    YellowBlue,
    Green,
    YellowRed,
    Red,
}

impl CycleLight {
    /// Bands: 9-16 blue, 17-22 yellow-blue, 23-31 green, 32-37 yellow-red, 38-45 red.
    pub fn from_score(score: f64) -> Self {
        if score <= 16.0 {
            CycleLight::Blue
        } else if score <= 22.0 {
            CycleLight::YellowBlue
        } else if score <= 31.0 {
            CycleLight::Green
        } else if score <= 37.0 {
            CycleLight::YellowRed
        } else {
            CycleLight::Red
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub updated_at: String,
    pub snapshot: Snapshot,
    pub sentiment_rating: Option<SentimentRating>,
    pub cycle_light: Option<CycleLight>,
}

impl DashboardView {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            updated_at: snapshot.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            sentiment_rating: snapshot
                .get(MetricKey::SentimentScore)
                .map(SentimentRating::from_score),
            cycle_light: snapshot
                .get(MetricKey::BusinessCycleScore)
                .map(CycleLight::from_score),
            snapshot: snapshot.clone(),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating dashboard dir {}", dir.display()))?;
        }
        let body = serde_json::to_string_pretty(self).context("serializing dashboard view")?;
        fs::write(path, body).with_context(|| format!("writing dashboard {}", path.display()))
    }
}
