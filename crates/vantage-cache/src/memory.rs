use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use vantage_models::PriceBar;

/// In-memory hot layer for decoded price series, keyed by ticker.
///
/// Entries are evicted after the TTL so a refreshed pipeline write is
/// picked up without restarting.
pub struct MemoryCache {
    inner: Cache<String, Arc<Vec<PriceBar>>>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, ticker: &str) -> Option<Arc<Vec<PriceBar>>> {
        self.inner.get(ticker).await
    }

    pub async fn insert(&self, ticker: String, bars: Arc<Vec<PriceBar>>) {
        self.inner.insert(ticker, bars).await;
    }
}
