use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use vantage_models::cache_schema::{OutlookHistoryRow, SeriesRow, STORE_DDL};
use vantage_models::PriceBar;

use crate::error::CacheError;

/// SQLite access to the shared price-series file.
///
/// The data pipeline owns `price_series`; Vantage reads it and appends to
/// `outlook_history`. WAL mode lets both sides work on the file at once.
pub struct SeriesStore {
    conn: Connection,
}

impl SeriesStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &str) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(STORE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory store with the schema applied. Useful for testing.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(STORE_DDL)?;
        Ok(Self { conn })
    }

    /// Get the series row for a ticker. Returns None if missing or expired.
    pub fn get(&self, ticker: &str) -> Result<Option<SeriesRow>, CacheError> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = self.conn.prepare_cached(
            "SELECT ticker, bars_json, source, created_at, expires_at, updated_at \
             FROM price_series WHERE ticker = ?1 AND expires_at > ?2",
        )?;

        let row = stmt
            .query_row(rusqlite::params![ticker, now], |row| {
                Ok(SeriesRow {
                    ticker: row.get(0)?,
                    bars_json: row.get(1)?,
                    source: row.get(2)?,
                    created_at: row.get(3)?,
                    expires_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })
            .optional()?;

        Ok(row)
    }

    /// Decoded bars for a ticker, oldest first.
    pub fn get_series(&self, ticker: &str) -> Result<Option<Vec<PriceBar>>, CacheError> {
        match self.get(ticker)? {
            Some(row) => {
                let mut bars: Vec<PriceBar> = serde_json::from_str(&row.bars_json)?;
                bars.sort_by_key(|bar| bar.date);
                Ok(Some(bars))
            }
            None => Ok(None),
        }
    }

    /// Replace a ticker's series. In production the data pipeline writes
    /// this table; the method exists for tests, demos and pipeline tooling.
    pub fn put_series(
        &self,
        ticker: &str,
        bars: &[PriceBar],
        source: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if bars.is_empty() {
            return Err(CacheError::InvalidSeries {
                ticker: ticker.to_string(),
                reason: "no bars".to_string(),
            });
        }

        let now = Utc::now();
        let bars_json = serde_json::to_string(bars)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO price_series \
             (ticker, bars_json, source, created_at, expires_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                ticker,
                bars_json,
                source,
                now.to_rfc3339(),
                (now + ttl).to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Delete expired series. Returns the number of rows removed.
    pub fn expire_stale(&self) -> Result<usize, CacheError> {
        let now = Utc::now().to_rfc3339();
        let deleted = self.conn.execute(
            "DELETE FROM price_series WHERE expires_at <= ?1",
            rusqlite::params![now],
        )?;
        Ok(deleted)
    }

    /// Append one top-level run to the history table.
    pub fn record_outlook(&self, row: &OutlookHistoryRow) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO outlook_history \
             (id, generated_at, horizon, composite_risk_score, risk_level, market_label) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                row.id,
                row.generated_at,
                row.horizon,
                row.composite_risk_score,
                row.risk_level,
                row.market_label,
            ],
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_outlooks(&self, limit: usize) -> Result<Vec<OutlookHistoryRow>, CacheError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, generated_at, horizon, composite_risk_score, risk_level, market_label \
             FROM outlook_history ORDER BY generated_at DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok(OutlookHistoryRow {
                    id: row.get(0)?,
                    generated_at: row.get(1)?,
                    horizon: row.get(2)?,
                    composite_risk_score: row.get(3)?,
                    risk_level: row.get(4)?,
                    market_label: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| PriceBar {
                date: start + Duration::days(i as i64),
                open: *close,
                high: close + 1.0,
                low: close - 1.0,
                close: *close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn history_row(id: &str, generated_at: &str, score: f64) -> OutlookHistoryRow {
        OutlookHistoryRow {
            id: id.to_string(),
            generated_at: generated_at.to_string(),
            horizon: "1-3 months".to_string(),
            composite_risk_score: score,
            risk_level: "Moderate".to_string(),
            market_label: Some("Neutral".to_string()),
        }
    }

    #[test]
    fn put_and_get_series() {
        let store = SeriesStore::open_in_memory().unwrap();
        store
            .put_series("SPY", &bars(&[500.0, 502.0, 503.5]), "test", Duration::hours(1))
            .unwrap();

        let series = store.get_series("SPY").unwrap().unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[2].close, 503.5);
    }

    #[test]
    fn get_missing_ticker() {
        let store = SeriesStore::open_in_memory().unwrap();
        assert!(store.get_series("NOPE").unwrap().is_none());
    }

    #[test]
    fn expired_series_is_hidden() {
        let store = SeriesStore::open_in_memory().unwrap();
        store
            .put_series("SPY", &bars(&[500.0]), "test", Duration::seconds(-10))
            .unwrap();

        assert!(store.get("SPY").unwrap().is_none());
        assert_eq!(store.expire_stale().unwrap(), 1);
    }

    #[test]
    fn series_comes_back_sorted_by_date() {
        let store = SeriesStore::open_in_memory().unwrap();
        let mut unordered = bars(&[1.0, 2.0, 3.0]);
        unordered.reverse();
        store
            .put_series("GC=F", &unordered, "test", Duration::hours(1))
            .unwrap();

        let series = store.get_series("GC=F").unwrap().unwrap();
        assert!(series.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn empty_series_is_rejected() {
        let store = SeriesStore::open_in_memory().unwrap();
        let err = store
            .put_series("SPY", &[], "test", Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidSeries { .. }));
    }

    #[test]
    fn history_is_newest_first() {
        let store = SeriesStore::open_in_memory().unwrap();
        store
            .record_outlook(&history_row("a", "2026-03-01T10:00:00+00:00", 0.4))
            .unwrap();
        store
            .record_outlook(&history_row("b", "2026-03-02T10:00:00+00:00", 0.7))
            .unwrap();
        store
            .record_outlook(&history_row("c", "2026-02-27T10:00:00+00:00", 0.2))
            .unwrap();

        let recent = store.recent_outlooks(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "b");
        assert_eq!(recent[1].id, "a");
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.db");
        let path = path.to_str().unwrap();

        {
            let store = SeriesStore::open(path).unwrap();
            store
                .put_series("^GSPC", &bars(&[5000.0, 5010.0]), "test", Duration::hours(1))
                .unwrap();
        }

        let reopened = SeriesStore::open(path).unwrap();
        let series = reopened.get_series("^GSPC").unwrap().unwrap();
        assert_eq!(series.len(), 2);
    }
}
