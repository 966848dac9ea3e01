use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Logical role that selects a provider, model and prompt template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AgentIdentity {
    Stock,
    Sector,
    Market,
    Commodities,
    Globals,
    Chief,
}

impl AgentIdentity {
    pub const ALL: [AgentIdentity; 6] = [
        AgentIdentity::Stock,
        AgentIdentity::Sector,
        AgentIdentity::Market,
        AgentIdentity::Commodities,
        AgentIdentity::Globals,
        AgentIdentity::Chief,
    ];

    /// The five domain analyzers, in the order the outlook reports them.
    pub const DOMAINS: [AgentIdentity; 5] = [
        AgentIdentity::Stock,
        AgentIdentity::Sector,
        AgentIdentity::Market,
        AgentIdentity::Commodities,
        AgentIdentity::Globals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentIdentity::Stock => "stock",
            AgentIdentity::Sector => "sector",
            AgentIdentity::Market => "market",
            AgentIdentity::Commodities => "commodities",
            AgentIdentity::Globals => "globals",
            AgentIdentity::Chief => "chief",
        }
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known agent identity or provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name: {}", self.0)
    }
}

impl std::error::Error for UnknownName {}

impl FromStr for AgentIdentity {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentIdentity::ALL
            .into_iter()
            .find(|identity| identity.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// The closed set of LLM vendors the dispatch layer can route to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "claude")]
    Claude,
    /// The local `claude` command-line client.
    #[serde(rename = "claude_cli")]
    ClaudeCli,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
            ProviderKind::ClaudeCli => "claude_cli",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
