pub mod agent;
pub mod cache_schema;
pub mod config;
pub mod outlook;
pub mod signals;

pub use agent::{AgentIdentity, ProviderKind, UnknownName};
pub use cache_schema::{OutlookHistoryRow, SeriesRow};
pub use config::{AnalysisConfig, BrainConfig, CacheConfig, DispatchConfig, ProviderLimits, VantageConfig};
pub use outlook::{
    AggregateOutlook, CompositeReading, DomainReport, DomainSummary, Extremum, MarketLabel,
    Narrative, RegimeCall, RiskLevel, RiskRegime, TrendCounts, NO_DATA, NO_SUMMARY,
    OUTLOOK_SCHEMA_VERSION,
};
pub use signals::{Bias, DomainSignalSet, PriceBar, RsiSignal, TickerFailure, TrendDirection};
