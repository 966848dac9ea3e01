use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Indicator error for {ticker}: {reason}")]
    Indicator { ticker: String, reason: String },

    #[error("Prompt payload for {scope} needs {size} bytes, budget is {budget}")]
    PromptBudget {
        scope: String,
        size: usize,
        budget: usize,
    },

    #[error("No price series for {0}")]
    MissingSeries(String),

    #[error("Cache error: {0}")]
    Cache(#[from] vantage_cache::CacheError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] vantage_dispatch::DispatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
