//! Deterministic fixtures for exercising the analyzers without network
//! access: synthetic price series and a scripted LLM provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use vantage_dispatch::{
    Brain, BrainRegistry, CallParams, Credential, DispatchError, DispatchService,
    DispatchSettings, Provider, ProviderError,
};
use vantage_models::{
    AgentIdentity, Bias, DomainSignalSet, PriceBar, ProviderKind, ProviderLimits, RsiSignal,
    TrendDirection,
};

use crate::prompts::default_template;

const BAR_VOLUME: f64 = 1_000_000.0;

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

/// Daily bars on consecutive calendar days from 2025-01-01. Each bar opens
/// at the previous close, so the series has no gaps.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    let mut bars = Vec::with_capacity(closes.len());
    let mut date = start_date();
    let mut previous = closes.first().copied().unwrap_or_default();

    for &close in closes {
        bars.push(PriceBar {
            date,
            open: previous,
            high: previous.max(close) * 1.002,
            low: previous.min(close) * 0.998,
            close,
            volume: BAR_VOLUME,
        });
        previous = close;
        date = date.succ_opt().unwrap_or(date);
    }
    bars
}

/// `n` bars compounding upwards by `pct` (0.01 = 1%) per bar.
pub fn rising_bars(n: usize, start: f64, pct: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..n).map(|i| start * (1.0 + pct).powi(i as i32)).collect();
    bars_from_closes(&closes)
}

/// `n` bars compounding downwards by `pct` per bar.
pub fn falling_bars(n: usize, start: f64, pct: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..n).map(|i| start * (1.0 - pct).powi(i as i32)).collect();
    bars_from_closes(&closes)
}

/// `n` identical bars with `high == low == close`.
pub fn flat_bars(n: usize, price: f64) -> Vec<PriceBar> {
    let mut date = start_date();
    (0..n)
        .map(|_| {
            let bar = PriceBar {
                date,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: BAR_VOLUME,
            };
            date = date.succ_opt().unwrap_or(date);
            bar
        })
        .collect()
}

/// A signal set with every reading neutral, for tweaking in tests.
pub fn signal(ticker: &str) -> DomainSignalSet {
    DomainSignalSet {
        ticker: ticker.to_string(),
        as_of: start_date(),
        last_close: 100.0,
        sma_trend: Bias::Neutral,
        macd_signal: Bias::Neutral,
        rsi: None,
        rsi_signal: RsiSignal::Neutral,
        stochastic_signal: Bias::Neutral,
        volume_signal: Bias::Neutral,
        atr_pct: None,
        change_30d_pct: None,
        trend_30d: TrendDirection::NotAvailable,
        above_sma50: None,
        above_sma200: None,
        composite_risk_score: 0.5,
        patterns: Vec::new(),
        anomalies: Vec::new(),
    }
}

/// What a [`ScriptedProvider`] answers with.
#[derive(Debug, Clone)]
pub enum Script {
    /// The same text for every prompt.
    Reply(String),
    /// The rendered prompt itself.
    Echo,
    /// The same error for every prompt.
    Fail(ProviderError),
}

/// A provider that answers from a script and records every prompt it sees.
pub struct ScriptedProvider {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Replies with both narrative sections filled in.
    pub fn two_part(technical: &str, plain: &str) -> Self {
        Self::new(Script::Reply(format!(
            "Technical Summary\n{technical}\n\nPlain-English Summary\n{plain}\n"
        )))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(Script::Fail(error))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ClaudeCli
    }

    fn requires_credential(&self) -> bool {
        false
    }

    async fn invoke(
        &self,
        _model: &str,
        prompt: &str,
        _credential: Option<&Credential>,
        _params: &CallParams,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Echo => Ok(prompt.to_string()),
            Script::Fail(error) => Err(error.clone()),
        }
    }
}

/// A dispatch service routing every identity to `provider` with the
/// built-in templates.
pub fn scripted_dispatch(
    provider: Arc<ScriptedProvider>,
    settings: DispatchSettings,
) -> Result<Arc<DispatchService>, DispatchError> {
    let registry = AgentIdentity::ALL
        .into_iter()
        .fold(BrainRegistry::new(), |registry, identity| {
            registry.with(Brain {
                identity,
                provider: ProviderKind::ClaudeCli,
                model: "scripted".to_string(),
                credential: None,
                credential_env: None,
                template: default_template(identity).to_string(),
                params: CallParams::default(),
            })
        });

    let limits = [ProviderLimits {
        provider: ProviderKind::ClaudeCli,
        max_concurrent: 2,
        queue_capacity: 16,
    }];

    let providers: Vec<Arc<dyn Provider>> = vec![provider];
    let service = DispatchService::start(settings, registry, &limits, providers)?;
    Ok(Arc::new(service))
}
