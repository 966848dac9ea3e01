use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use vantage_cache::SeriesReader;
use vantage_models::PriceBar;

use crate::error::AgentError;

/// Where analyzers get their daily bars from.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// Bars for `ticker`, oldest first. A ticker with no data is an error.
    async fn load(&self, ticker: &str) -> Result<Arc<Vec<PriceBar>>, AgentError>;
}

#[async_trait]
impl SeriesSource for SeriesReader {
    async fn load(&self, ticker: &str) -> Result<Arc<Vec<PriceBar>>, AgentError> {
        self.bars(ticker)
            .await?
            .ok_or_else(|| AgentError::MissingSeries(ticker.to_string()))
    }
}

/// Fixed in-memory series, for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSeries {
    series: HashMap<String, Arc<Vec<PriceBar>>>,
}

impl StaticSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.insert(ticker, bars);
        self
    }

    pub fn insert(&mut self, ticker: &str, bars: Vec<PriceBar>) {
        self.series.insert(ticker.to_string(), Arc::new(bars));
    }
}

#[async_trait]
impl SeriesSource for StaticSeries {
    async fn load(&self, ticker: &str) -> Result<Arc<Vec<PriceBar>>, AgentError> {
        self.series
            .get(ticker)
            .cloned()
            .ok_or_else(|| AgentError::MissingSeries(ticker.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::flat_bars;
    use std::time::Duration;
    use vantage_cache::SeriesStore;

    #[tokio::test]
    async fn static_series_lookup() {
        let source = StaticSeries::new().with("GC=F", flat_bars(10, 2_000.0));
        assert_eq!(source.load("GC=F").await.unwrap().len(), 10);
        assert!(matches!(
            source.load("SI=F").await,
            Err(AgentError::MissingSeries(t)) if t == "SI=F"
        ));
    }

    #[tokio::test]
    async fn reader_backed_source() {
        let store = SeriesStore::open_in_memory().unwrap();
        store
            .put_series("^N225", &flat_bars(3, 38_000.0), "test", chrono::Duration::hours(1))
            .unwrap();
        let reader = SeriesReader::new(store, 10, Duration::from_secs(60));

        assert_eq!(reader.load("^N225").await.unwrap().len(), 3);
        assert!(matches!(
            reader.load("^HSI").await,
            Err(AgentError::MissingSeries(_))
        ));
    }
}
