use std::time::Duration;

use thiserror::Error;
use vantage_models::ProviderKind;

/// Failure reported by a provider call. Carries the upstream message verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Provider call panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// Every way a `dispatch` call can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Backpressure: {provider} queue is full")]
    Backpressure { provider: ProviderKind },

    #[error("Timed out after {}s waiting for a result", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("{provider} provider error: {source}")]
    Provider {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },

    #[error("Dispatch service is shut down")]
    Shutdown,
}

impl DispatchError {
    /// Short stable name for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Config(_) => "config",
            DispatchError::Template(_) => "template",
            DispatchError::Backpressure { .. } => "backpressure",
            DispatchError::Timeout(_) => "timeout",
            DispatchError::Provider { .. } => "provider",
            DispatchError::Shutdown => "shutdown",
        }
    }
}
