use chrono::Duration;
use ta::indicators::{
    AverageTrueRange, BollingerBands, FastStochastic, MovingAverageConvergenceDivergence,
    OnBalanceVolume, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::{Close, High, Low, Next, Open, Volume};
use vantage_models::signals::{MAX_ANOMALIES, MAX_PATTERNS};
use vantage_models::{Bias, DomainSignalSet, PriceBar, RsiSignal, TrendDirection};

use crate::error::AgentError;

/// Turns a price series into a signal snapshot as of its latest bar.
pub trait IndicatorEngine: Send + Sync {
    fn compute_signals(&self, ticker: &str, bars: &[PriceBar])
        -> Result<DomainSignalSet, AgentError>;
}

/// Default engine built on the `ta` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardIndicators;

const CROSS_LOOKBACK: usize = 5;
const SPIKE_LOOKBACK: usize = 5;
const GAP_LOOKBACK: usize = 20;
const VOLUME_SPIKE_RATIO: f64 = 2.5;
const GAP_PCT: f64 = 3.0;
const SQUEEZE_BANDWIDTH: f64 = 0.04;

struct Bar<'a>(&'a PriceBar);

impl Open for Bar<'_> {
    fn open(&self) -> f64 {
        self.0.open
    }
}

impl High for Bar<'_> {
    fn high(&self) -> f64 {
        self.0.high
    }
}

impl Low for Bar<'_> {
    fn low(&self) -> f64 {
        self.0.low
    }
}

impl Close for Bar<'_> {
    fn close(&self) -> f64 {
        self.0.close
    }
}

impl Volume for Bar<'_> {
    fn volume(&self) -> f64 {
        self.0.volume
    }
}

impl IndicatorEngine for StandardIndicators {
    fn compute_signals(
        &self,
        ticker: &str,
        bars: &[PriceBar],
    ) -> Result<DomainSignalSet, AgentError> {
        let Some(last) = bars.last() else {
            return Err(AgentError::Indicator {
                ticker: ticker.to_string(),
                reason: "empty price series".to_string(),
            });
        };
        let err = |e: ta::errors::TaError| AgentError::Indicator {
            ticker: ticker.to_string(),
            reason: e.to_string(),
        };

        let n = bars.len();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let close = last.close;

        let sma20 = sma_series(&closes, 20).map_err(err)?;
        let sma50 = sma_series(&closes, 50).map_err(err)?;
        let sma200 = sma_series(&closes, 200).map_err(err)?;

        let sma_trend = if n >= 50 {
            compare(sma20[n - 1], sma50[n - 1])
        } else {
            Bias::Neutral
        };

        let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(err)?;
        let macd_out = closes.iter().map(|c| macd.next(*c)).last();
        let macd_signal = match macd_out {
            Some(out) if n >= 35 => compare(out.macd, out.signal),
            _ => Bias::Neutral,
        };

        let mut rsi_ind = RelativeStrengthIndex::new(14).map_err(err)?;
        let rsi = closes
            .iter()
            .map(|c| rsi_ind.next(*c))
            .last()
            .filter(|v| n > 14 && v.is_finite());
        let rsi_signal = match rsi {
            Some(v) if v >= 70.0 => RsiSignal::Overbought,
            Some(v) if v <= 30.0 => RsiSignal::Oversold,
            _ => RsiSignal::Neutral,
        };

        let mut stoch = FastStochastic::new(14).map_err(err)?;
        let k: Vec<f64> = bars.iter().map(|b| stoch.next(&Bar(b))).collect();
        let d = sma_series(&k, 3).map_err(err)?;
        let stochastic_signal = if n >= 16 {
            compare(k[n - 1], d[n - 1])
        } else {
            Bias::Neutral
        };

        let mut obv = OnBalanceVolume::new();
        let obv_values: Vec<f64> = bars.iter().map(|b| obv.next(&Bar(b))).collect();
        let volume_signal = if n > 20 {
            compare(obv_values[n - 1], obv_values[n - 21])
        } else {
            Bias::Neutral
        };

        let mut atr = AverageTrueRange::new(14).map_err(err)?;
        let atr_last = bars.iter().map(|b| atr.next(&Bar(b))).last();
        let atr_pct = atr_last
            .filter(|v| n > 14 && v.is_finite() && close > 0.0)
            .map(|v| v / close * 100.0);

        let change_30d_pct = change_since(bars, Duration::days(30));
        let trend_30d = TrendDirection::from_change_pct(change_30d_pct);

        let above_sma50 = (n >= 50).then(|| close > sma50[n - 1]);
        let above_sma200 = (n >= 200).then(|| close > sma200[n - 1]);

        let mut patterns = Vec::new();
        if n >= 200 + CROSS_LOOKBACK {
            for i in n - CROSS_LOOKBACK..n {
                let before = sma50[i - 1] - sma200[i - 1];
                let after = sma50[i] - sma200[i];
                if before <= 0.0 && after > 0.0 {
                    patterns.push("Golden cross (SMA50 over SMA200)".to_string());
                } else if before >= 0.0 && after < 0.0 {
                    patterns.push("Death cross (SMA50 under SMA200)".to_string());
                }
            }
        }

        if n >= 20 {
            let mut bands = BollingerBands::new(20, 2.0).map_err(err)?;
            if let Some(band) = closes.iter().map(|c| bands.next(*c)).last() {
                if band.average > 0.0 && (band.upper - band.lower) / band.average < SQUEEZE_BANDWIDTH {
                    patterns.push("Bollinger squeeze".to_string());
                }
                if close > band.upper {
                    patterns.push("Close above upper Bollinger band".to_string());
                } else if close < band.lower {
                    patterns.push("Close below lower Bollinger band".to_string());
                }
            }
        }
        patterns.truncate(MAX_PATTERNS);

        let mut anomalies = volume_spikes(bars);
        anomalies.extend(price_gaps(bars));
        anomalies.truncate(MAX_ANOMALIES);

        let composite_risk_score = risk_score(sma_trend, macd_signal, rsi, atr_pct);

        Ok(DomainSignalSet {
            ticker: ticker.to_string(),
            as_of: last.date,
            last_close: close,
            sma_trend,
            macd_signal,
            rsi,
            rsi_signal,
            stochastic_signal,
            volume_signal,
            atr_pct,
            change_30d_pct,
            trend_30d,
            above_sma50,
            above_sma200,
            composite_risk_score,
            patterns,
            anomalies,
        })
    }
}

fn sma_series(values: &[f64], period: usize) -> Result<Vec<f64>, ta::errors::TaError> {
    let mut sma = SimpleMovingAverage::new(period)?;
    Ok(values.iter().map(|v| sma.next(*v)).collect())
}

fn compare(fast: f64, slow: f64) -> Bias {
    if fast > slow {
        Bias::Bullish
    } else if fast < slow {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}

/// Percent change from the last bar at least `window` before the latest one.
fn change_since(bars: &[PriceBar], window: Duration) -> Option<f64> {
    let last = bars.last()?;
    let cutoff = last.date - window;
    let base = bars.iter().rev().find(|b| b.date <= cutoff)?;
    (base.close > 0.0).then(|| (last.close / base.close - 1.0) * 100.0)
}

fn volume_spikes(bars: &[PriceBar]) -> Vec<String> {
    let n = bars.len();
    if n <= 20 {
        return Vec::new();
    }
    let start = n.saturating_sub(SPIKE_LOOKBACK).max(20);
    (start..n)
        .filter_map(|i| {
            let average = bars[i - 20..i].iter().map(|b| b.volume).sum::<f64>() / 20.0;
            let ratio = bars[i].volume / average;
            (average > 0.0 && ratio > VOLUME_SPIKE_RATIO).then(|| {
                format!(
                    "Volume spike on {} ({ratio:.1}x 20-day average)",
                    bars[i].date
                )
            })
        })
        .collect()
}

fn price_gaps(bars: &[PriceBar]) -> Vec<String> {
    let n = bars.len();
    let start = n.saturating_sub(GAP_LOOKBACK).max(1);
    (start..n)
        .filter_map(|i| {
            let previous = bars[i - 1].close;
            if previous <= 0.0 {
                return None;
            }
            let gap_pct = (bars[i].open / previous - 1.0) * 100.0;
            if gap_pct > GAP_PCT {
                Some(format!("Gap up {gap_pct:.1}% on {}", bars[i].date))
            } else if gap_pct < -GAP_PCT {
                Some(format!("Gap down {:.1}% on {}", gap_pct.abs(), bars[i].date))
            } else {
                None
            }
        })
        .collect()
}

fn bias_risk(bias: Bias) -> f64 {
    match bias {
        Bias::Bullish => 0.25,
        Bias::Neutral => 0.5,
        Bias::Bearish => 0.75,
    }
}

/// Mean of four sub-risks in [0, 1]; a missing input counts as 0.5.
fn risk_score(sma_trend: Bias, macd: Bias, rsi: Option<f64>, atr_pct: Option<f64>) -> f64 {
    let rsi_risk = rsi.map(|v| (v / 100.0).clamp(0.0, 1.0)).unwrap_or(0.5);
    let volatility_risk = atr_pct.map(|v| (v / 5.0).clamp(0.0, 1.0)).unwrap_or(0.5);
    (bias_risk(sma_trend) + bias_risk(macd) + rsi_risk + volatility_risk) / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{falling_bars, flat_bars, rising_bars};

    #[test]
    fn rising_series_reads_bullish() {
        let bars = rising_bars(260, 100.0, 0.01);
        let signals = StandardIndicators.compute_signals("AAPL", &bars).unwrap();

        assert_eq!(signals.ticker, "AAPL");
        assert_eq!(signals.as_of, bars[259].date);
        assert_eq!(signals.sma_trend, Bias::Bullish);
        assert_eq!(signals.macd_signal, Bias::Bullish);
        assert_eq!(signals.rsi_signal, RsiSignal::Overbought);
        assert_eq!(signals.trend_30d, TrendDirection::Uptrend);
        assert_eq!(signals.above_sma50, Some(true));
        assert_eq!(signals.above_sma200, Some(true));
        assert!(signals.change_30d_pct.unwrap() > 30.0);
    }

    #[test]
    fn falling_series_reads_bearish() {
        let bars = falling_bars(260, 100.0, 0.01);
        let signals = StandardIndicators.compute_signals("XOM", &bars).unwrap();

        assert_eq!(signals.sma_trend, Bias::Bearish);
        assert_eq!(signals.rsi_signal, RsiSignal::Oversold);
        assert_eq!(signals.trend_30d, TrendDirection::Downtrend);
        assert_eq!(signals.above_sma50, Some(false));
        assert_eq!(signals.above_sma200, Some(false));
    }

    #[test]
    fn short_history_is_neutral_not_an_error() {
        let bars = flat_bars(5, 50.0);
        let signals = StandardIndicators.compute_signals("NEW", &bars).unwrap();

        assert_eq!(signals.sma_trend, Bias::Neutral);
        assert_eq!(signals.macd_signal, Bias::Neutral);
        assert_eq!(signals.rsi, None);
        assert_eq!(signals.atr_pct, None);
        assert_eq!(signals.trend_30d, TrendDirection::NotAvailable);
        assert_eq!(signals.above_sma50, None);
        assert_eq!(signals.composite_risk_score, 0.5);
        assert!(signals.patterns.is_empty());
    }

    #[test]
    fn empty_series_is_an_error() {
        let err = StandardIndicators.compute_signals("NONE", &[]).unwrap_err();
        assert!(matches!(err, AgentError::Indicator { ticker, .. } if ticker == "NONE"));
    }

    #[test]
    fn volume_spike_is_flagged() {
        let mut bars = flat_bars(40, 20.0);
        bars[38].volume *= 10.0;
        let signals = StandardIndicators.compute_signals("SPIKE", &bars).unwrap();

        assert_eq!(signals.anomalies.len(), 1);
        assert!(signals.anomalies[0].starts_with("Volume spike on"));
    }

    #[test]
    fn gap_is_flagged() {
        let mut bars = flat_bars(40, 20.0);
        bars[39].open = 21.0;
        let signals = StandardIndicators.compute_signals("GAP", &bars).unwrap();

        assert_eq!(signals.anomalies, vec![format!("Gap up 5.0% on {}", bars[39].date)]);
    }

    #[test]
    fn risk_score_bounds() {
        assert_eq!(risk_score(Bias::Neutral, Bias::Neutral, None, None), 0.5);
        let calm = risk_score(Bias::Bullish, Bias::Bullish, Some(40.0), Some(0.5));
        let stretched = risk_score(Bias::Bearish, Bias::Bearish, Some(85.0), Some(9.0));
        assert!(calm < 0.5);
        assert!(stretched > 0.75);
        assert!(stretched <= 1.0);
    }

    #[test]
    fn change_uses_calendar_window() {
        let bars = rising_bars(31, 100.0, 0.0);
        assert_eq!(change_since(&bars, Duration::days(30)), Some(0.0));
        assert_eq!(change_since(&bars[1..], Duration::days(30)), None);
    }
}
