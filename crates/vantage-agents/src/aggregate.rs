//! Per-domain statistics and the index-basket composite score.

use vantage_models::{
    AgentIdentity, Bias, CompositeReading, DomainSignalSet, DomainSummary, Extremum, MarketLabel,
    RegimeCall, RiskRegime, RsiSignal, TickerFailure, TrendCounts, TrendDirection,
};

/// Anomalies kept in a domain summary.
pub const ANOMALY_SAMPLE: usize = 5;

/// How a composite reading is turned into a risk regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositePolicy {
    /// Regime is the composite threshold label. Used by the market domain.
    Threshold,
    /// Regime from VIX level and benchmark trend. Used by the global domain.
    VolatilityBenchmark,
}

/// `round(100 * count / total, 1)` with ties to even, and 0 for an empty
/// basket. Computed on integers so ties are exact.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scaled = count * 1_000;
    let (mut tenths, remainder) = (scaled / total, scaled % total);
    if 2 * remainder > total || (2 * remainder == total && tenths % 2 == 1) {
        tenths += 1;
    }
    tenths as f64 / 10.0
}

/// Tally SMA-trend readings into bullish/bearish/neutral.
pub fn tally(signals: &[DomainSignalSet]) -> TrendCounts {
    let mut counts = TrendCounts {
        total: signals.len(),
        ..TrendCounts::default()
    };
    for signal in signals {
        match signal.sma_trend {
            Bias::Bullish => counts.bullish += 1,
            Bias::Bearish => counts.bearish += 1,
            Bias::Neutral => counts.neutral += 1,
        }
    }
    counts.bullish_pct = percentage(counts.bullish, counts.total);
    counts.bearish_pct = percentage(counts.bearish, counts.total);
    counts.neutral_pct = percentage(counts.neutral, counts.total);
    counts
}

/// Sector leadership: +1 bullish SMA trend, +1 bullish MACD, -1 RSI
/// overbought, +1 bullish stochastic.
pub fn leadership_score(signal: &DomainSignalSet) -> f64 {
    let mut score = 0.0;
    if signal.sma_trend == Bias::Bullish {
        score += 1.0;
    }
    if signal.macd_signal == Bias::Bullish {
        score += 1.0;
    }
    if signal.rsi_signal == RsiSignal::Overbought {
        score -= 1.0;
    }
    if signal.stochastic_signal == Bias::Bullish {
        score += 1.0;
    }
    score
}

/// Strength used to rank non-sector tickers: the inverse of their risk.
pub fn strength_score(signal: &DomainSignalSet) -> f64 {
    1.0 - signal.composite_risk_score
}

/// Leader (arg-max) and laggard (arg-min). Ties go to the earliest ticker;
/// `NaN` scores never win.
pub fn extrema(
    signals: &[DomainSignalSet],
    score: impl Fn(&DomainSignalSet) -> f64,
) -> (Option<Extremum>, Option<Extremum>) {
    let mut leader: Option<Extremum> = None;
    let mut laggard: Option<Extremum> = None;

    for signal in signals {
        let value = score(signal);
        if value.is_nan() {
            continue;
        }
        if leader.as_ref().map_or(true, |best| value > best.score) {
            leader = Some(Extremum {
                ticker: signal.ticker.clone(),
                score: value,
            });
        }
        if laggard.as_ref().map_or(true, |worst| value < worst.score) {
            laggard = Some(Extremum {
                ticker: signal.ticker.clone(),
                score: value,
            });
        }
    }

    (leader, laggard)
}

/// `1 - clamp(vix / 40, 0, 1)`, or 0.5 without a reading.
pub fn vol_score(vix: Option<f64>) -> f64 {
    match vix {
        Some(v) if v.is_finite() => 1.0 - (v / 40.0).clamp(0.0, 1.0),
        _ => 0.5,
    }
}

/// Fraction of members with a reading that are above their moving average.
pub fn breadth(readings: impl IntoIterator<Item = Option<bool>>) -> Option<f64> {
    let (above, known) = readings
        .into_iter()
        .flatten()
        .fold((0usize, 0usize), |(above, known), is_above| {
            (above + usize::from(is_above), known + 1)
        });
    (known > 0).then(|| above as f64 / known as f64)
}

/// Mean of trend scores, vol score and both breadth figures, ignoring
/// `NaN`. Nothing usable → 0.5.
pub fn composite_score(
    trend_scores: &[f64],
    vol_score: f64,
    breadth_50: Option<f64>,
    breadth_200: Option<f64>,
) -> f64 {
    let values: Vec<f64> = trend_scores
        .iter()
        .copied()
        .chain([vol_score, breadth_50.unwrap_or(f64::NAN), breadth_200.unwrap_or(f64::NAN)])
        .filter(|v| !v.is_nan())
        .collect();

    if values.is_empty() {
        return 0.5;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Risk-off on VIX >= 25 or a benchmark downtrend; risk-on on VIX <= 15 with
/// a benchmark uptrend; neutral otherwise.
pub fn volatility_benchmark_regime(vix: Option<f64>, benchmark: TrendDirection) -> RiskRegime {
    let vix_high = vix.is_some_and(|v| v >= 25.0);
    let vix_low = vix.is_some_and(|v| v <= 15.0);

    if vix_high || benchmark == TrendDirection::Downtrend {
        RiskRegime::RiskOff
    } else if vix_low && benchmark == TrendDirection::Uptrend {
        RiskRegime::RiskOn
    } else {
        RiskRegime::Neutral
    }
}

/// Score an index basket and attach the regime chosen by `policy`.
pub fn composite_reading(
    basket: &[DomainSignalSet],
    vix: Option<f64>,
    benchmark_trend: TrendDirection,
    policy: CompositePolicy,
) -> CompositeReading {
    let trend_scores: Vec<f64> = basket.iter().map(|s| s.trend_30d.score()).collect();
    let vol_score = vol_score(vix);
    let breadth_50 = breadth(basket.iter().map(|s| s.above_sma50));
    let breadth_200 = breadth(basket.iter().map(|s| s.above_sma200));
    let score = composite_score(&trend_scores, vol_score, breadth_50, breadth_200);
    let label = MarketLabel::from_score(score);

    let regime = match policy {
        CompositePolicy::Threshold => RegimeCall::CompositeThreshold { label },
        CompositePolicy::VolatilityBenchmark => RegimeCall::VolatilityBenchmark {
            regime: volatility_benchmark_regime(vix, benchmark_trend),
            vix,
            benchmark_trend,
        },
    };

    CompositeReading {
        score,
        label,
        regime,
        trend_scores,
        vol_score,
        breadth_50,
        breadth_200,
    }
}

/// Fold a domain's per-ticker signals into its summary.
pub fn summarize(
    domain: AgentIdentity,
    horizon: &str,
    signals: Vec<DomainSignalSet>,
    failures: Vec<TickerFailure>,
    composite: Option<CompositeReading>,
) -> DomainSummary {
    let counts = tally(&signals);
    let (leader, laggard) = if domain == AgentIdentity::Sector {
        extrema(&signals, leadership_score)
    } else {
        extrema(&signals, strength_score)
    };

    let risks: Vec<f64> = signals
        .iter()
        .map(|s| s.composite_risk_score)
        .filter(|r| !r.is_nan())
        .collect();
    let average_risk_score =
        (!risks.is_empty()).then(|| risks.iter().sum::<f64>() / risks.len() as f64);

    let anomalies = signals
        .iter()
        .flat_map(|s| s.anomalies.iter().map(move |a| format!("{}: {a}", s.ticker)))
        .take(ANOMALY_SAMPLE)
        .collect();

    DomainSummary {
        domain,
        horizon: horizon.to_string(),
        counts,
        leader,
        laggard,
        average_risk_score,
        composite,
        anomalies,
        signals,
        failures,
    }
}
