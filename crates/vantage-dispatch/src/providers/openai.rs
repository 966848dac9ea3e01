use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use vantage_models::ProviderKind;

use super::{require_credential, response_text};
use crate::credential::Credential;
use crate::error::ProviderError;
use crate::provider::{CallParams, Provider};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI chat completions. `OPENAI_API_BASE` points it at any compatible
/// server (Azure, vLLM, LM Studio).
pub struct OpenAiProvider {
    client: Client,
    api_base: String,
}

impl OpenAiProvider {
    pub fn new(client: Client) -> Self {
        let api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string());
        Self { client, api_base }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    #[instrument(skip_all, fields(model = %model))]
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&Credential>,
        params: &CallParams,
    ) -> Result<String, ProviderError> {
        let credential = require_credential(self.kind(), credential)?;
        debug!("Sending request to OpenAI API");

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await?;

        let body = response_text(response).await?;
        extract_text(&body)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Pull the first choice's content out of a chat completions body.
pub fn extract_text(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ProviderError::MalformedResponse("response had no message content".to_string()))
}
