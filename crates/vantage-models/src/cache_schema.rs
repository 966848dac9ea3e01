/// The SQLite schema shared by the data pipeline (writes `price_series`)
/// and Vantage (reads series, appends `outlook_history`).
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS price_series (
///     ticker      TEXT PRIMARY KEY,
///     bars_json   TEXT NOT NULL,
///     source      TEXT NOT NULL,
///     created_at  TEXT NOT NULL,
///     expires_at  TEXT NOT NULL,
///     updated_at  TEXT NOT NULL
/// );
///
/// CREATE TABLE IF NOT EXISTS outlook_history (
///     id                    TEXT PRIMARY KEY,
///     generated_at          TEXT NOT NULL,
///     horizon               TEXT NOT NULL,
///     composite_risk_score  REAL NOT NULL,
///     risk_level            TEXT NOT NULL,
///     market_label          TEXT
/// );
/// ```
pub const STORE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS price_series (
    ticker      TEXT PRIMARY KEY,
    bars_json   TEXT NOT NULL,
    source      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_series_expires ON price_series(expires_at);
CREATE TABLE IF NOT EXISTS outlook_history (
    id                    TEXT PRIMARY KEY,
    generated_at          TEXT NOT NULL,
    horizon               TEXT NOT NULL,
    composite_risk_score  REAL NOT NULL,
    risk_level            TEXT NOT NULL,
    market_label          TEXT
);
CREATE INDEX IF NOT EXISTS idx_history_generated ON outlook_history(generated_at);
";

/// A raw `price_series` row. `bars_json` is a JSON array of `PriceBar`.
#[derive(Debug, Clone)]
pub struct SeriesRow {
    pub ticker: String,
    pub bars_json: String,
    pub source: String,
    pub created_at: String,
    pub expires_at: String,
    pub updated_at: String,
}

/// One recorded top-level run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlookHistoryRow {
    pub id: String,
    pub generated_at: String,
    pub horizon: String,
    pub composite_risk_score: f64,
    pub risk_level: String,
    pub market_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_creates_both_tables() {
        assert!(STORE_DDL.contains("CREATE TABLE IF NOT EXISTS price_series"));
        assert!(STORE_DDL.contains("CREATE TABLE IF NOT EXISTS outlook_history"));
    }
}
