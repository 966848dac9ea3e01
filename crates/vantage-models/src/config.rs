use serde::{Deserialize, Serialize};

use crate::agent::{AgentIdentity, ProviderKind};

/// Top-level configuration for Vantage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VantageConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Configuration for the price-series store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Path to the shared SQLite file (written by the data pipeline).
    pub sqlite_path: String,
    /// Maximum number of series kept in the in-memory moka cache.
    pub memory_max_capacity: u64,
    /// How long a series read stays in memory, in seconds.
    pub memory_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/vantage.db".to_string(),
            memory_max_capacity: 1_000,
            memory_ttl_seconds: 300,
        }
    }
}

/// Configuration for the LLM dispatch layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// How long a caller waits for its result before giving up.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// How long an enqueue may wait on a full provider queue.
    #[serde(default = "default_enqueue_timeout")]
    pub enqueue_timeout_seconds: u64,
    pub providers: Vec<ProviderLimits>,
    pub brains: Vec<BrainConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let brain = |agent, provider, model: &str, credential_env: &str| BrainConfig {
            agent,
            provider,
            model: model.to_string(),
            credential_env: Some(credential_env.to_string()),
            prompt_template: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        };

        Self {
            request_timeout_seconds: default_request_timeout(),
            enqueue_timeout_seconds: default_enqueue_timeout(),
            providers: vec![
                ProviderLimits {
                    provider: ProviderKind::OpenAi,
                    max_concurrent: 4,
                    queue_capacity: 32,
                },
                ProviderLimits {
                    provider: ProviderKind::Gemini,
                    max_concurrent: 2,
                    queue_capacity: 16,
                },
                ProviderLimits {
                    provider: ProviderKind::Claude,
                    max_concurrent: 1,
                    queue_capacity: 16,
                },
            ],
            brains: vec![
                brain(AgentIdentity::Stock, ProviderKind::OpenAi, "gpt-4o-mini", "OPENAI_API_KEY"),
                brain(AgentIdentity::Sector, ProviderKind::OpenAi, "gpt-4o-mini", "OPENAI_API_KEY"),
                brain(AgentIdentity::Market, ProviderKind::Gemini, "gemini-1.5-flash", "GEMINI_API_KEY"),
                brain(
                    AgentIdentity::Commodities,
                    ProviderKind::Gemini,
                    "gemini-1.5-flash",
                    "GEMINI_API_KEY",
                ),
                brain(AgentIdentity::Globals, ProviderKind::OpenAi, "gpt-4o-mini", "OPENAI_API_KEY"),
                brain(
                    AgentIdentity::Chief,
                    ProviderKind::Claude,
                    "claude-sonnet-4-5-20250929",
                    "ANTHROPIC_API_KEY",
                ),
            ],
        }
    }
}

/// Per-provider admission limits. Static for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderLimits {
    pub provider: ProviderKind,
    /// Number of long-lived workers pulling from the provider queue.
    pub max_concurrent: usize,
    /// Pending requests the queue holds before callers get backpressure.
    pub queue_capacity: usize,
}

/// Provider, model and prompt for one agent identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrainConfig {
    pub agent: AgentIdentity,
    pub provider: ProviderKind,
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub credential_env: Option<String>,
    /// MiniJinja template; `{{ input }}` receives the analyzer payload.
    /// Falls back to the built-in template for the agent when absent.
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Which tickers each domain looks at, and the shared analysis knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub horizon: String,
    pub stock: Vec<String>,
    pub sector_peers: Vec<String>,
    pub market_indices: Vec<String>,
    pub commodities: Vec<String>,
    pub global_indices: Vec<String>,
    pub volatility_ticker: String,
    pub benchmark_ticker: String,
    /// Serialized size ceiling for a domain's slim projection.
    pub prompt_budget_bytes: usize,
}

impl AnalysisConfig {
    /// Tickers assigned to a domain. The chief has none of its own.
    pub fn tickers_for(&self, identity: AgentIdentity) -> &[String] {
        match identity {
            AgentIdentity::Stock => &self.stock,
            AgentIdentity::Sector => &self.sector_peers,
            AgentIdentity::Market => &self.market_indices,
            AgentIdentity::Commodities => &self.commodities,
            AgentIdentity::Globals => &self.global_indices,
            AgentIdentity::Chief => &[],
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let tickers = |list: &[&str]| list.iter().map(|t| t.to_string()).collect();
        Self {
            horizon: "1-3 months".to_string(),
            stock: tickers(&["AAPL"]),
            sector_peers: tickers(&["AAPL", "MSFT", "NVDA", "GOOGL", "META"]),
            market_indices: tickers(&["^GSPC", "^IXIC", "^DJI", "^RUT"]),
            commodities: tickers(&["GC=F", "SI=F", "CL=F", "NG=F", "HG=F"]),
            global_indices: tickers(&["^FTSE", "^GDAXI", "^FCHI", "^N225", "^HSI"]),
            volatility_ticker: "^VIX".to_string(),
            benchmark_ticker: "^GSPC".to_string(),
            prompt_budget_bytes: 12_000,
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}
fn default_enqueue_timeout() -> u64 {
    5
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1_200
}
