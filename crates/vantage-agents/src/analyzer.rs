use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vantage_dispatch::DispatchService;
use vantage_models::{
    AgentIdentity, AnalysisConfig, CompositeReading, DomainReport, DomainSignalSet, DomainSummary,
    Narrative, TickerFailure, TrendDirection,
};

use crate::aggregate::{composite_reading, summarize, CompositePolicy};
use crate::error::AgentError;
use crate::indicators::IndicatorEngine;
use crate::parser::split_narrative;
use crate::slim::domain_payload;
use crate::source::SeriesSource;

/// One analyst of the outlook team. Mockable for testing.
#[async_trait]
pub trait DomainAnalyzer: Send + Sync {
    fn identity(&self) -> AgentIdentity;

    /// Never fails: ticker errors are recorded in the summary and narration
    /// errors degrade the narrative.
    async fn analyze(&self, tickers: &[String], horizon: &str) -> DomainReport;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub volatility_ticker: String,
    pub benchmark_ticker: String,
    pub prompt_budget_bytes: usize,
}

impl From<&AnalysisConfig> for AnalyzerSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            volatility_ticker: config.volatility_ticker.clone(),
            benchmark_ticker: config.benchmark_ticker.clone(),
            prompt_budget_bytes: config.prompt_budget_bytes,
        }
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

/// The composite policy each domain uses, if any.
///
/// The market domain reports the threshold label as its regime; the global
/// domain applies the VIX/benchmark rule.
pub fn composite_policy(identity: AgentIdentity) -> Option<CompositePolicy> {
    match identity {
        AgentIdentity::Market => Some(CompositePolicy::Threshold),
        AgentIdentity::Globals => Some(CompositePolicy::VolatilityBenchmark),
        _ => None,
    }
}

/// Indicator-driven analyzer shared by all five domains.
pub struct SignalAnalyzer {
    identity: AgentIdentity,
    source: Arc<dyn SeriesSource>,
    engine: Arc<dyn IndicatorEngine>,
    narrator: Option<Arc<DispatchService>>,
    settings: AnalyzerSettings,
}

impl SignalAnalyzer {
    pub fn new(
        identity: AgentIdentity,
        source: Arc<dyn SeriesSource>,
        engine: Arc<dyn IndicatorEngine>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            identity,
            source,
            engine,
            narrator: None,
            settings,
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<DispatchService>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    async fn signals_for(&self, ticker: &str) -> Result<DomainSignalSet, AgentError> {
        let bars = self.source.load(ticker).await?;
        self.engine.compute_signals(ticker, &bars)
    }

    async fn collect_signals(&self, tickers: &[String]) -> (Vec<DomainSignalSet>, Vec<TickerFailure>) {
        let mut signals = Vec::with_capacity(tickers.len());
        let mut failures = Vec::new();

        for ticker in tickers {
            match self.signals_for(ticker).await {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    warn!(domain = %self.identity, ticker = %ticker, error = %e, "Ticker skipped");
                    failures.push(TickerFailure {
                        ticker: ticker.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        (signals, failures)
    }

    /// Latest close of the volatility index, if it can be loaded.
    async fn latest_volatility(&self) -> Option<f64> {
        let ticker = &self.settings.volatility_ticker;
        match self.source.load(ticker).await {
            Ok(bars) => bars.last().map(|bar| bar.close),
            Err(e) => {
                warn!(domain = %self.identity, ticker = %ticker, error = %e, "Volatility reading unavailable");
                None
            }
        }
    }

    /// Benchmark 30-day trend, taken from the basket when the benchmark is a
    /// member and computed separately otherwise.
    async fn benchmark_trend(&self, basket: &[DomainSignalSet]) -> TrendDirection {
        let ticker = &self.settings.benchmark_ticker;
        if let Some(member) = basket.iter().find(|s| &s.ticker == ticker) {
            return member.trend_30d;
        }
        match self.signals_for(ticker).await {
            Ok(signal) => signal.trend_30d,
            Err(e) => {
                warn!(domain = %self.identity, ticker = %ticker, error = %e, "Benchmark trend unavailable");
                TrendDirection::NotAvailable
            }
        }
    }

    async fn composite(&self, basket: &[DomainSignalSet]) -> Option<CompositeReading> {
        let policy = composite_policy(self.identity)?;
        if basket.is_empty() {
            return None;
        }

        let vix = self.latest_volatility().await;
        let benchmark_trend = match policy {
            CompositePolicy::VolatilityBenchmark => self.benchmark_trend(basket).await,
            CompositePolicy::Threshold => TrendDirection::NotAvailable,
        };
        Some(composite_reading(basket, vix, benchmark_trend, policy))
    }

    async fn narrate(&self, summary: &DomainSummary, horizon: &str) -> Narrative {
        let Some(narrator) = self.narrator.as_ref().filter(|n| n.can_serve(self.identity)) else {
            debug!(domain = %self.identity, "No LLM configured, using placeholder narrative");
            return Narrative::unavailable();
        };

        let payload = match domain_payload(summary, self.settings.prompt_budget_bytes) {
            Ok(payload) => payload,
            Err(e) => return Narrative::llm_error(e),
        };

        let vars = BTreeMap::from([
            ("horizon".to_string(), horizon.to_string()),
            ("domain".to_string(), self.identity.to_string()),
        ]);

        match narrator.dispatch_as(self.identity, &payload, &vars).await {
            Ok(text) => split_narrative(&text),
            Err(e) => {
                warn!(domain = %self.identity, kind = e.kind(), error = %e, "Narration failed");
                Narrative::llm_error(e)
            }
        }
    }
}

#[async_trait]
impl DomainAnalyzer for SignalAnalyzer {
    fn identity(&self) -> AgentIdentity {
        self.identity
    }

    async fn analyze(&self, tickers: &[String], horizon: &str) -> DomainReport {
        let start = Instant::now();
        info!(domain = %self.identity, tickers = tickers.len(), "Starting domain analysis");

        if tickers.is_empty() {
            return DomainReport {
                summary: DomainSummary::empty(self.identity, horizon),
                narrative: Narrative::no_data(),
                error: None,
                elapsed_ms: start.elapsed().as_millis() as u64,
            };
        }

        let (signals, failures) = self.collect_signals(tickers).await;
        let composite = self.composite(&signals).await;
        let has_signals = !signals.is_empty();
        let summary = summarize(self.identity, horizon, signals, failures, composite);

        let narrative = if has_signals {
            self.narrate(&summary, horizon).await
        } else {
            Narrative::no_data()
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            domain = %self.identity,
            analyzed = summary.signals.len(),
            failed = summary.failures.len(),
            elapsed_ms,
            "Domain analysis complete"
        );

        DomainReport {
            summary,
            narrative,
            error: None,
            elapsed_ms,
        }
    }
}
