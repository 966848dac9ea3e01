use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use vantage_models::cache_schema::OutlookHistoryRow;
use vantage_models::PriceBar;

use crate::error::CacheError;
use crate::memory::MemoryCache;
use crate::sqlite::SeriesStore;

/// Read-through series cache: checks moka (hot) → SQLite (shared) → None.
///
/// SQLite hits are promoted to moka. Access to the connection goes through a
/// `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct SeriesReader {
    memory: MemoryCache,
    store: Mutex<SeriesStore>,
}

impl SeriesReader {
    pub fn new(store: SeriesStore, max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, memory_ttl),
            store: Mutex::new(store),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, SeriesStore>, CacheError> {
        self.store
            .lock()
            .map_err(|e| CacheError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    /// Bars for a ticker, oldest first. None when the pipeline has nothing
    /// fresh for it.
    pub async fn bars(&self, ticker: &str) -> Result<Option<Arc<Vec<PriceBar>>>, CacheError> {
        if let Some(bars) = self.memory.get(ticker).await {
            return Ok(Some(bars));
        }

        // TTL filtering happens in the query
        let series = self.store()?.get_series(ticker)?;

        match series {
            Some(bars) => {
                let bars = Arc::new(bars);
                self.memory.insert(ticker.to_string(), bars.clone()).await;
                tracing::debug!(ticker, bars = bars.len(), "Promoted series to hot cache");
                Ok(Some(bars))
            }
            None => Ok(None),
        }
    }

    /// Purge expired series from SQLite. Returns the number of rows removed.
    pub fn expire_stale(&self) -> Result<usize, CacheError> {
        self.store()?.expire_stale()
    }

    pub fn record_outlook(&self, row: &OutlookHistoryRow) -> Result<(), CacheError> {
        self.store()?.record_outlook(row)
    }

    pub fn recent_outlooks(&self, limit: usize) -> Result<Vec<OutlookHistoryRow>, CacheError> {
        self.store()?.recent_outlooks(limit)
    }
}
