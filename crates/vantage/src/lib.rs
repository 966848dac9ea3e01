//! Vantage - multi-domain market outlook
//!
//! Five domain analyzers (stock, sector, market, commodities, global macro)
//! turn cached price series into signal summaries, narrate them through a
//! shared LLM dispatch service, and a chief aggregator folds them into one
//! investor-facing outlook.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use vantage::models::VantageConfig;
//! use vantage::agents::{Orchestrator, StandardIndicators};
//! use vantage::cache::{SeriesReader, SeriesStore};
//! use vantage::dispatch::DispatchService;
//! ```

pub use vantage_agents as agents;
pub use vantage_cache as cache;
pub use vantage_dispatch as dispatch;
pub use vantage_models as models;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use vantage_agents::{default_template, Orchestrator, StandardIndicators};
use vantage_cache::{SeriesReader, SeriesStore};
use vantage_dispatch::DispatchService;
use vantage_models::cache_schema::OutlookHistoryRow;
use vantage_models::{
    AgentIdentity, AggregateOutlook, CacheConfig, DispatchConfig, MarketLabel, VantageConfig,
};

/// Read a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<VantageConfig, anyhow::Error> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Open the series store and wrap it in the read-through cache.
pub fn open_reader(config: &CacheConfig) -> Result<Arc<SeriesReader>, anyhow::Error> {
    let store = SeriesStore::open(&config.sqlite_path)
        .with_context(|| format!("Failed to open series store: {}", config.sqlite_path))?;
    Ok(Arc::new(SeriesReader::new(
        store,
        config.memory_max_capacity,
        Duration::from_secs(config.memory_ttl_seconds),
    )))
}

/// Start the dispatch service with the built-in prompt templates.
pub fn build_dispatch(config: &DispatchConfig) -> Result<Arc<DispatchService>, anyhow::Error> {
    let service = DispatchService::from_config(config, default_template)
        .context("Failed to start dispatch service")?;
    Ok(Arc::new(service))
}

/// Build the standard analyzer team over `reader`.
pub fn build_orchestrator(
    config: &VantageConfig,
    reader: Arc<SeriesReader>,
    narrator: Option<Arc<DispatchService>>,
) -> Orchestrator {
    Orchestrator::standard(
        config.analysis.clone(),
        reader,
        Arc::new(StandardIndicators),
        narrator,
    )
}

/// Purge expired series, then append `outlook` to the run history.
/// Returns the number of purged series.
pub fn record_run(reader: &SeriesReader, outlook: &AggregateOutlook) -> Result<usize, anyhow::Error> {
    let purged = reader
        .expire_stale()
        .context("Failed to purge expired series")?;
    reader
        .record_outlook(&history_row(outlook))
        .context("Failed to record outlook")?;
    info!(id = %outlook.id, purged, "Outlook recorded");
    Ok(purged)
}

/// The `outlook_history` row for a finished run.
pub fn history_row(outlook: &AggregateOutlook) -> OutlookHistoryRow {
    let market_label = outlook
        .domain(AgentIdentity::Market)
        .and_then(|report| report.summary.composite.as_ref())
        .map(|composite| label_name(composite.label).to_string());

    OutlookHistoryRow {
        id: outlook.id.to_string(),
        generated_at: outlook.generated_at.to_rfc3339(),
        horizon: outlook.horizon.clone(),
        composite_risk_score: outlook.composite_risk_score,
        risk_level: outlook.risk_level.as_str().to_string(),
        market_label,
    }
}

fn label_name(label: MarketLabel) -> &'static str {
    match label {
        MarketLabel::Bullish => "Bullish",
        MarketLabel::Bearish => "Bearish",
        MarketLabel::Neutral => "Neutral",
    }
}
