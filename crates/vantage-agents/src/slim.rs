//! Bounded projections of domain results used as LLM input.

use serde::Serialize;
use tracing::warn;
use vantage_models::{
    AgentIdentity, Bias, DomainReport, DomainSignalSet, DomainSummary, Extremum, MarketLabel,
    RegimeCall, RiskLevel, RsiSignal, TrendCounts, TrendDirection,
};

use crate::error::AgentError;

pub const SLIM_PATTERNS: usize = 3;
pub const SLIM_ANOMALIES: usize = 5;
pub const SLIM_FAILURES: usize = 10;
/// Characters of each domain narrative forwarded to the chief.
pub const NARRATIVE_CHARS: usize = 1_200;

/// The wanted per-ticker fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlimSignal {
    pub ticker: String,
    pub sma_trend: Bias,
    pub macd_signal: Bias,
    pub rsi: Option<f64>,
    pub rsi_signal: RsiSignal,
    pub stochastic_signal: Bias,
    pub trend_30d: TrendDirection,
    pub change_30d_pct: Option<f64>,
    pub composite_risk_score: f64,
    pub patterns: Vec<String>,
    pub anomalies: Vec<String>,
}

impl From<&DomainSignalSet> for SlimSignal {
    fn from(signal: &DomainSignalSet) -> Self {
        Self {
            ticker: signal.ticker.clone(),
            sma_trend: signal.sma_trend,
            macd_signal: signal.macd_signal,
            rsi: signal.rsi.map(|v| round_to(v, 1)),
            rsi_signal: signal.rsi_signal,
            stochastic_signal: signal.stochastic_signal,
            trend_30d: signal.trend_30d,
            change_30d_pct: signal.change_30d_pct.map(|v| round_to(v, 2)),
            composite_risk_score: round_to(signal.composite_risk_score, 3),
            patterns: signal.patterns.iter().take(SLIM_PATTERNS).cloned().collect(),
            anomalies: signal.anomalies.iter().take(SLIM_ANOMALIES).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlimComposite {
    pub score: f64,
    pub label: MarketLabel,
    pub regime: RegimeCall,
}

/// A domain summary cut down to what a prompt needs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlimSummary {
    pub domain: AgentIdentity,
    pub horizon: String,
    pub counts: TrendCounts,
    pub leader: Option<Extremum>,
    pub laggard: Option<Extremum>,
    pub average_risk_score: Option<f64>,
    pub composite: Option<SlimComposite>,
    pub anomalies: Vec<String>,
    pub signals: Vec<SlimSignal>,
    /// Trailing signals dropped to respect the byte budget.
    pub signals_truncated: usize,
    pub failed_tickers: Vec<String>,
    /// Failed tickers left out of `failed_tickers`.
    pub failures_truncated: usize,
}

impl SlimSummary {
    /// Project `summary`, dropping trailing signals, then the anomaly sample,
    /// then trailing failed tickers until the JSON form fits in
    /// `budget_bytes`. A projection that cannot fit is an error.
    pub fn within_budget(summary: &DomainSummary, budget_bytes: usize) -> Result<Self, AgentError> {
        let failed_tickers: Vec<String> = summary
            .failures
            .iter()
            .take(SLIM_FAILURES)
            .map(|f| f.ticker.clone())
            .collect();

        let mut slim = Self {
            domain: summary.domain,
            horizon: summary.horizon.clone(),
            counts: summary.counts.clone(),
            leader: summary.leader.clone(),
            laggard: summary.laggard.clone(),
            average_risk_score: summary.average_risk_score.map(|v| round_to(v, 3)),
            composite: summary.composite.as_ref().map(|c| SlimComposite {
                score: round_to(c.score, 4),
                label: c.label,
                regime: c.regime.clone(),
            }),
            anomalies: summary.anomalies.iter().take(SLIM_ANOMALIES).cloned().collect(),
            signals: summary.signals.iter().map(SlimSignal::from).collect(),
            signals_truncated: 0,
            failures_truncated: summary.failures.len() - failed_tickers.len(),
            failed_tickers,
        };

        loop {
            let size = serde_json::to_vec(&slim)?.len();
            if size <= budget_bytes {
                return Ok(slim);
            }

            if slim.signals.pop().is_some() {
                slim.signals_truncated += 1;
            } else if !slim.anomalies.is_empty() {
                slim.anomalies.clear();
            } else if slim.failed_tickers.pop().is_some() {
                slim.failures_truncated += 1;
            } else {
                warn!(
                    domain = %summary.domain,
                    size,
                    budget_bytes,
                    "Slim summary exceeds prompt budget"
                );
                return Err(AgentError::PromptBudget {
                    scope: summary.domain.to_string(),
                    size,
                    budget: budget_bytes,
                });
            }
        }
    }
}

/// JSON input for a domain analyzer's dispatch call.
pub fn domain_payload(summary: &DomainSummary, budget_bytes: usize) -> Result<String, AgentError> {
    Ok(serde_json::to_string(&SlimSummary::within_budget(
        summary,
        budget_bytes,
    )?)?)
}

#[derive(Debug, Serialize)]
struct ChiefDomain<'a> {
    summary: &'a SlimSummary,
    technical_summary: String,
    plain_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChiefPayload<'a> {
    horizon: &'a str,
    composite_risk_score: f64,
    risk_level: RiskLevel,
    domains: Vec<ChiefDomain<'a>>,
}

/// JSON input for the chief's dispatch call, at most `budget_bytes` long.
///
/// Each domain's slim summary gets half of an equal share of the budget.
/// Narratives and error text start clipped to `NARRATIVE_CHARS` and are
/// halved until the whole payload fits.
pub fn chief_payload(
    reports: &[DomainReport],
    horizon: &str,
    composite_risk_score: f64,
    risk_level: RiskLevel,
    budget_bytes: usize,
) -> Result<String, AgentError> {
    let share = budget_bytes / reports.len().max(1);
    let summaries = reports
        .iter()
        .map(|report| SlimSummary::within_budget(&report.summary, share / 2))
        .collect::<Result<Vec<_>, AgentError>>()?;

    let mut narrative_chars = NARRATIVE_CHARS;
    loop {
        let payload = ChiefPayload {
            horizon,
            composite_risk_score: round_to(composite_risk_score, 3),
            risk_level,
            domains: reports
                .iter()
                .zip(&summaries)
                .map(|(report, summary)| ChiefDomain {
                    summary,
                    technical_summary: clip(&report.narrative.technical, narrative_chars),
                    plain_summary: clip(&report.narrative.plain, narrative_chars),
                    error: report.error.as_deref().map(|e| clip(e, narrative_chars)),
                })
                .collect(),
        };

        let json = serde_json::to_string(&payload)?;
        if json.len() <= budget_bytes {
            return Ok(json);
        }
        if narrative_chars == 0 {
            return Err(AgentError::PromptBudget {
                scope: "chief".to_string(),
                size: json.len(),
                budget: budget_bytes,
            });
        }
        narrative_chars /= 2;
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
