use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::AgentIdentity;
use crate::signals::{DomainSignalSet, TickerFailure, TrendDirection};

pub const OUTLOOK_SCHEMA_VERSION: u32 = 1;

/// Placeholder used when narration is disabled (no credential / no dispatcher).
pub const NO_SUMMARY: &str = "No summary available.";
/// Placeholder used when a domain had no tickers to analyze.
pub const NO_DATA: &str = "No data available for this domain.";

/// Bullish/bearish/neutral tallies of per-ticker trend readings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrendCounts {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    pub total: usize,
    pub bullish_pct: f64,
    pub bearish_pct: f64,
    pub neutral_pct: f64,
}

/// A ticker singled out as the domain's leader or laggard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extremum {
    pub ticker: String,
    pub score: f64,
}

/// Threshold label derived from a composite score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MarketLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl MarketLabel {
    /// `>= 0.7` Bullish, `<= 0.3` Bearish, otherwise Neutral. `NaN` is Neutral.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            MarketLabel::Bullish
        } else if score <= 0.3 {
            MarketLabel::Bearish
        } else {
            MarketLabel::Neutral
        }
    }
}

/// Regime from the volatility/benchmark rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RiskRegime {
    #[serde(rename = "Risk-On")]
    RiskOn,
    #[serde(rename = "Risk-Off")]
    RiskOff,
    Neutral,
}

/// Which policy produced a domain's risk regime, and what it said.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RegimeCall {
    /// Regime equals the composite-score threshold label.
    CompositeThreshold { label: MarketLabel },
    /// Regime from the absolute volatility level and the benchmark trend.
    VolatilityBenchmark {
        regime: RiskRegime,
        vix: Option<f64>,
        benchmark_trend: TrendDirection,
    },
}

/// Composite reading for an index basket (market and global domains).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositeReading {
    pub score: f64,
    pub label: MarketLabel,
    pub regime: RegimeCall,
    pub trend_scores: Vec<f64>,
    pub vol_score: f64,
    /// `None` when no basket member has enough history.
    pub breadth_50: Option<f64>,
    pub breadth_200: Option<f64>,
}

/// Aggregated view of one domain's tickers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainSummary {
    pub domain: AgentIdentity,
    pub horizon: String,
    pub counts: TrendCounts,
    pub leader: Option<Extremum>,
    pub laggard: Option<Extremum>,
    pub average_risk_score: Option<f64>,
    pub composite: Option<CompositeReading>,
    /// First anomalies across the basket, input order preserved.
    pub anomalies: Vec<String>,
    pub signals: Vec<DomainSignalSet>,
    pub failures: Vec<TickerFailure>,
}

impl DomainSummary {
    /// The "no data" sentinel for a domain with nothing to analyze.
    pub fn empty(domain: AgentIdentity, horizon: &str) -> Self {
        Self {
            domain,
            horizon: horizon.to_string(),
            counts: TrendCounts::default(),
            leader: None,
            laggard: None,
            average_risk_score: None,
            composite: None,
            anomalies: Vec::new(),
            signals: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Risk contribution of this domain to the overall outlook, if any.
    ///
    /// A composite reading wins (inverted, since it scores bullishness);
    /// otherwise the mean per-ticker risk score is used.
    pub fn risk_contribution(&self) -> Option<f64> {
        match &self.composite {
            Some(reading) if !reading.score.is_nan() => Some(1.0 - reading.score),
            _ => self.average_risk_score.filter(|score| !score.is_nan()),
        }
    }
}

/// The dual summary produced for an audience of traders and of laypeople.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Narrative {
    pub technical: String,
    pub plain: String,
}

impl Narrative {
    pub fn new(technical: impl Into<String>, plain: impl Into<String>) -> Self {
        Self {
            technical: technical.into(),
            plain: plain.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(NO_SUMMARY, NO_SUMMARY)
    }

    pub fn no_data() -> Self {
        Self::new(NO_DATA, NO_DATA)
    }

    /// Degraded narrative carrying the failure text.
    pub fn llm_error(message: impl std::fmt::Display) -> Self {
        let text = format!("LLM error: {message}");
        Self::new(text.clone(), text)
    }
}

/// A domain analyzer's full output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainReport {
    pub summary: DomainSummary,
    pub narrative: Narrative,
    /// Set when the whole domain analysis failed and was replaced by a stub.
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl DomainReport {
    pub fn failed(domain: AgentIdentity, horizon: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            summary: DomainSummary::empty(domain, horizon),
            narrative: Narrative::new(
                format!("Analysis failed: {error}"),
                format!("Analysis failed: {error}"),
            ),
            error: Some(error),
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// `>= 0.66` High, `<= 0.33` Low, otherwise Moderate.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.66 {
            RiskLevel::High
        } else if score <= 0.33 {
            RiskLevel::Low
        } else {
            RiskLevel::Moderate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        }
    }
}

/// The chief aggregator's investor-facing result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateOutlook {
    pub id: Uuid,
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub horizon: String,
    pub composite_risk_score: f64,
    pub risk_level: RiskLevel,
    pub domains: Vec<DomainReport>,
    pub llm_technical_summary: String,
    pub llm_plain_summary: String,
    pub processing_time_ms: u64,
}

impl AggregateOutlook {
    pub fn domain(&self, identity: AgentIdentity) -> Option<&DomainReport> {
        self.domains.iter().find(|d| d.summary.domain == identity)
    }
}
