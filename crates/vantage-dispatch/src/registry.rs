use std::collections::HashMap;

use vantage_models::{AgentIdentity, BrainConfig, ProviderKind};

use crate::credential::Credential;
use crate::provider::CallParams;

/// Everything the dispatch layer needs to serve one agent identity.
#[derive(Debug, Clone)]
pub struct Brain {
    pub identity: AgentIdentity,
    pub provider: ProviderKind,
    pub model: String,
    pub credential: Option<Credential>,
    /// Name of the variable the credential came from, for error messages.
    pub credential_env: Option<String>,
    pub template: String,
    pub params: CallParams,
}

/// Read-only identity → brain map, built once at start.
#[derive(Debug, Clone, Default)]
pub struct BrainRegistry {
    brains: HashMap<AgentIdentity, Brain>,
}

impl BrainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a brain, replacing any earlier one for the same identity.
    pub fn with(mut self, brain: Brain) -> Self {
        self.brains.insert(brain.identity, brain);
        self
    }

    /// Build from configuration. A brain without a `prompt_template` gets
    /// `default_template(identity)`; credentials are looked up by
    /// `credential_env` through `resolve`.
    pub fn from_configs(
        configs: &[BrainConfig],
        default_template: impl Fn(AgentIdentity) -> &'static str,
        resolve: impl Fn(&str) -> Option<Credential>,
    ) -> Self {
        let brains = configs
            .iter()
            .map(|config| {
                let brain = Brain {
                    identity: config.agent,
                    provider: config.provider,
                    model: config.model.clone(),
                    credential: config.credential_env.as_deref().and_then(&resolve),
                    credential_env: config.credential_env.clone(),
                    template: config
                        .prompt_template
                        .clone()
                        .unwrap_or_else(|| default_template(config.agent).to_string()),
                    params: CallParams {
                        temperature: config.temperature,
                        max_tokens: config.max_tokens,
                    },
                };
                (config.agent, brain)
            })
            .collect();

        Self { brains }
    }

    pub fn get(&self, identity: AgentIdentity) -> Option<&Brain> {
        self.brains.get(&identity)
    }

    pub fn brains(&self) -> impl Iterator<Item = &Brain> {
        self.brains.values()
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_models::DispatchConfig;

    fn fallback(_: AgentIdentity) -> &'static str {
        "default: {{ input }}"
    }

    #[test]
    fn from_default_config() {
        let config = DispatchConfig::default();
        let registry = BrainRegistry::from_configs(&config.brains, fallback, |var| {
            (var == "OPENAI_API_KEY").then(|| Credential::new("sk-test"))
        });

        assert_eq!(registry.len(), AgentIdentity::ALL.len());

        let stock = registry.get(AgentIdentity::Stock).unwrap();
        assert_eq!(stock.provider, ProviderKind::OpenAi);
        assert_eq!(stock.template, "default: {{ input }}");
        assert_eq!(stock.credential.as_ref().map(|c| c.expose()), Some("sk-test"));

        let chief = registry.get(AgentIdentity::Chief).unwrap();
        assert!(chief.credential.is_none());
        assert_eq!(chief.credential_env.as_deref(), Some("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn configured_template_wins() {
        let config = BrainConfig {
            agent: AgentIdentity::Market,
            provider: ProviderKind::ClaudeCli,
            model: "haiku".to_string(),
            credential_env: None,
            prompt_template: Some("custom {{ input }}".to_string()),
            temperature: 0.1,
            max_tokens: 300,
        };
        let registry = BrainRegistry::from_configs(&[config], fallback, |_| None);
        let market = registry.get(AgentIdentity::Market).unwrap();
        assert_eq!(market.template, "custom {{ input }}");
        assert_eq!(market.params.max_tokens, 300);
        assert!(registry.get(AgentIdentity::Stock).is_none());
    }
}
