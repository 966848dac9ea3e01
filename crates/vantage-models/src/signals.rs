use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Upper bound on pattern tags carried by a signal set.
pub const MAX_PATTERNS: usize = 6;
/// Upper bound on anomaly tags carried by a signal set.
pub const MAX_ANOMALIES: usize = 10;

/// One daily OHLCV bar as written by the data pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Directional reading of a single indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

/// 30-day price trend classification used by the composite scorers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Sideways,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl TrendDirection {
    /// Classify a percentage change over the trend window.
    pub fn from_change_pct(change_pct: Option<f64>) -> Self {
        match change_pct {
            Some(pct) if pct.is_nan() => TrendDirection::NotAvailable,
            Some(pct) if pct > 2.0 => TrendDirection::Uptrend,
            Some(pct) if pct < -2.0 => TrendDirection::Downtrend,
            Some(_) => TrendDirection::Sideways,
            None => TrendDirection::NotAvailable,
        }
    }

    /// Numeric score fed into composite means. `NaN` marks "no opinion".
    pub fn score(&self) -> f64 {
        match self {
            TrendDirection::Uptrend => 1.0,
            TrendDirection::Sideways => 0.5,
            TrendDirection::Downtrend => 0.0,
            TrendDirection::NotAvailable => f64::NAN,
        }
    }
}

/// Signals for one ticker as of its latest bar.
///
/// Produced fresh per analysis run by the indicator engine and never mutated
/// afterwards. Fields that need more history than is available are left as
/// `Neutral` / `NotAvailable` / `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainSignalSet {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub last_close: f64,
    /// SMA20 relative to SMA50.
    pub sma_trend: Bias,
    pub macd_signal: Bias,
    pub rsi: Option<f64>,
    pub rsi_signal: RsiSignal,
    pub stochastic_signal: Bias,
    /// On-balance volume direction over the last 20 bars.
    pub volume_signal: Bias,
    /// Average true range as a percentage of the last close.
    pub atr_pct: Option<f64>,
    pub change_30d_pct: Option<f64>,
    pub trend_30d: TrendDirection,
    pub above_sma50: Option<bool>,
    pub above_sma200: Option<bool>,
    /// 0.0 (calm, constructive) to 1.0 (stretched, bearish, volatile).
    pub composite_risk_score: f64,
    pub patterns: Vec<String>,
    pub anomalies: Vec<String>,
}

/// A ticker that could not be analyzed; the rest of the batch still runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickerFailure {
    pub ticker: String,
    pub error: String,
}
