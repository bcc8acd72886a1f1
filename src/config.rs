// src/config.rs
use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::metric::MetricKey;

pub const ENV_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";

fn default_history_path() -> PathBuf {
    PathBuf::from("data/history.json")
}
fn default_dashboard_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/dashboard.json"))
}
fn default_max_history() -> usize {
    500
}
fn default_eps_denominator() -> f64 {
    // Roughly one year of index earnings for the default ^TWII proxy.
    1000.0
}
fn default_fetch_timeout_secs() -> u64 {
    10
}

/// Seed values used when a metric has neither a fresh reading nor history.
pub fn default_seeds() -> BTreeMap<MetricKey, f64> {
    BTreeMap::from([
        (MetricKey::SentimentScore, 50.0),
        (MetricKey::MarketPe, 20.0),
        (MetricKey::BondYield, 4.0),
        (MetricKey::FxRate, 32.0),
        (MetricKey::CommodityPrice, 2000.0),
        (MetricKey::BusinessCycleScore, 25.0),
    ])
}

/// One row of the business-cycle table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEntry {
    pub effective_from: NaiveDate,
    pub score: f64,
}

/// Ticker symbols per quote-backed metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPair {
    /// Chart-API symbol (rank 0).
    pub primary: String,
    /// CSV quote feed symbol (rank 1). Empty disables the secondary source.
    #[serde(default)]
    pub secondary: String,
}

impl SymbolPair {
    fn new(primary: &str, secondary: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbols {
    #[serde(default = "Symbols::default_market")]
    pub market_proxy: SymbolPair,
    #[serde(default = "Symbols::default_bond")]
    pub bond_yield: SymbolPair,
    #[serde(default = "Symbols::default_fx")]
    pub fx_rate: SymbolPair,
    #[serde(default = "Symbols::default_commodity")]
    pub commodity: SymbolPair,
}

impl Symbols {
    fn default_market() -> SymbolPair {
        SymbolPair::new("^TWII", "^twse")
    }
    fn default_bond() -> SymbolPair {
        SymbolPair::new("^TNX", "10usy.b")
    }
    fn default_fx() -> SymbolPair {
        SymbolPair::new("TWD=X", "usdtwd")
    }
    fn default_commodity() -> SymbolPair {
        SymbolPair::new("GC=F", "xauusd")
    }

    /// Symbol pair backing `metric`, if it is quote-backed.
    pub fn for_metric(&self, metric: MetricKey) -> Option<&SymbolPair> {
        match metric {
            MetricKey::MarketPe => Some(&self.market_proxy),
            MetricKey::BondYield => Some(&self.bond_yield),
            MetricKey::FxRate => Some(&self.fx_rate),
            MetricKey::CommodityPrice => Some(&self.commodity),
            MetricKey::SentimentScore | MetricKey::BusinessCycleScore => None,
        }
    }
}

impl Default for Symbols {
    fn default() -> Self {
        Self {
            market_proxy: Self::default_market(),
            bond_yield: Self::default_bond(),
            fx_rate: Self::default_fx(),
            commodity: Self::default_commodity(),
        }
    }
}

/// Run-wide fixed configuration, passed explicitly into the collector and adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    /// Latest-state dashboard view; `None` disables it.
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: Option<PathBuf>,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Fixed EPS used to derive `market_pe` from the market proxy price.
    #[serde(default = "default_eps_denominator")]
    pub eps_denominator: f64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Offset of the run's civil time from UTC, in minutes. Feed timestamps
    /// are dated in this offset. `None` uses the host's local offset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    /// Per-metric seeds; metrics left out keep the built-in seed.
    #[serde(default)]
    pub defaults: BTreeMap<MetricKey, f64>,
    #[serde(default)]
    pub business_cycle: Vec<CycleEntry>,
    #[serde(default)]
    pub symbols: Symbols,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            dashboard_path: default_dashboard_path(),
            max_history: default_max_history(),
            eps_denominator: default_eps_denominator(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            utc_offset_minutes: None,
            defaults: default_seeds(),
            business_cycle: Vec::new(),
            symbols: Symbols::default(),
        }
    }
}

impl CollectorConfig {
    /// Clamp nonsense to defaults and fill in missing seeds.
    fn sanitize(mut self) -> Self {
        if self.max_history == 0 {
            self.max_history = default_max_history();
        }
        if !(self.eps_denominator.is_finite() && self.eps_denominator > 0.0) {
            self.eps_denominator = default_eps_denominator();
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if let Some(m) = self.utc_offset_minutes {
            if FixedOffset::east_opt(m.saturating_mul(60)).is_none() {
                tracing::warn!(utc_offset_minutes = m, "offset out of range, using local offset");
                self.utc_offset_minutes = None;
            }
        }

        let mut seeds = default_seeds();
        for (k, v) in std::mem::take(&mut self.defaults) {
            if v.is_finite() {
                seeds.insert(k, v);
            }
        }
        self.defaults = seeds;

        self.business_cycle.retain(|e| e.score.is_finite());
        self.business_cycle.sort_by_key(|e| e.effective_from);
        self
    }

    /// Offset used to turn feed timestamps into civil dates.
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m.saturating_mul(60)))
            .unwrap_or_else(|| *Local::now().offset())
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<CollectorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load config using env var + fallbacks:
/// 1) $DASHBOARD_CONFIG_PATH
/// 2) config/dashboard.toml
/// 3) config/dashboard.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<CollectorConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/dashboard.toml");
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/dashboard.json");
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(CollectorConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<CollectorConfig> {
    let looks_json = s.trim_start().starts_with('{');
    let parsed = if hint_ext == "json" || (hint_ext != "toml" && looks_json) {
        serde_json::from_str::<CollectorConfig>(s).context("parsing JSON config")?
    } else {
        toml::from_str::<CollectorConfig>(s).context("parsing TOML config")?
    };
    Ok(parsed.sanitize())
}
