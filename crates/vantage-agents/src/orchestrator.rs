use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use vantage_dispatch::DispatchService;
use vantage_models::{AgentIdentity, AggregateOutlook, AnalysisConfig, DomainReport};

use crate::analyzer::{AnalyzerSettings, DomainAnalyzer, SignalAnalyzer};
use crate::chief::ChiefAggregator;
use crate::indicators::IndicatorEngine;
use crate::source::SeriesSource;

/// Runs the domain analyzers concurrently and hands their reports to the chief.
pub struct Orchestrator {
    analyzers: Vec<Arc<dyn DomainAnalyzer>>,
    chief: ChiefAggregator,
    analysis: AnalysisConfig,
}

impl Orchestrator {
    pub fn new(
        analyzers: Vec<Arc<dyn DomainAnalyzer>>,
        chief: ChiefAggregator,
        analysis: AnalysisConfig,
    ) -> Self {
        Self {
            analyzers,
            chief,
            analysis,
        }
    }

    /// The standard team: one [`SignalAnalyzer`] per domain over a shared
    /// source and engine, all narrating through `narrator` when given.
    pub fn standard(
        analysis: AnalysisConfig,
        source: Arc<dyn SeriesSource>,
        engine: Arc<dyn IndicatorEngine>,
        narrator: Option<Arc<DispatchService>>,
    ) -> Self {
        let settings = AnalyzerSettings::from(&analysis);
        let analyzers = AgentIdentity::DOMAINS
            .into_iter()
            .map(|identity| {
                let analyzer =
                    SignalAnalyzer::new(identity, source.clone(), engine.clone(), settings.clone());
                let analyzer = match &narrator {
                    Some(n) => analyzer.with_narrator(n.clone()),
                    None => analyzer,
                };
                Arc::new(analyzer) as Arc<dyn DomainAnalyzer>
            })
            .collect();

        let chief = ChiefAggregator::new(analysis.prompt_budget_bytes);
        let chief = match narrator {
            Some(n) => chief.with_narrator(n),
            None => chief,
        };

        Self::new(analyzers, chief, analysis)
    }

    /// Produce an outlook for `horizon`. A domain whose task panics is
    /// replaced by a failed report; the outlook is always returned.
    pub async fn run(&self, horizon: &str) -> AggregateOutlook {
        let start = Instant::now();
        info!(horizon = %horizon, domains = self.analyzers.len(), "Starting outlook run");

        let handles: Vec<_> = self
            .analyzers
            .iter()
            .map(|analyzer| {
                let analyzer = Arc::clone(analyzer);
                let tickers = self.analysis.tickers_for(analyzer.identity()).to_vec();
                let horizon = horizon.to_string();
                let identity = analyzer.identity();
                let handle =
                    tokio::spawn(async move { analyzer.analyze(&tickers, &horizon).await });
                (identity, handle)
            })
            .collect();

        let mut reports: Vec<DomainReport> = Vec::with_capacity(handles.len());
        for (identity, handle) in handles {
            match handle.await {
                Ok(report) => {
                    if !report.summary.failures.is_empty() {
                        warn!(
                            domain = %identity,
                            failed = report.summary.failures.len(),
                            "Domain finished with ticker failures"
                        );
                    }
                    reports.push(report);
                }
                Err(e) => {
                    error!(domain = %identity, error = %e, "Domain task panicked");
                    reports.push(DomainReport::failed(
                        identity,
                        horizon,
                        format!("domain task panicked: {e}"),
                    ));
                }
            }
        }

        self.chief.aggregate(horizon, reports, start).await
    }
}
