use async_trait::async_trait;
use vantage_models::ProviderKind;

use crate::credential::Credential;
use crate::error::ProviderError;

/// Sampling parameters passed through to the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CallParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1_200,
        }
    }
}

/// One implementation per `ProviderKind`. Workers share a single instance,
/// so implementations must be safe to call concurrently.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether a call without a credential should be refused before enqueue.
    fn requires_credential(&self) -> bool {
        true
    }

    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&Credential>,
        params: &CallParams,
    ) -> Result<String, ProviderError>;
}
