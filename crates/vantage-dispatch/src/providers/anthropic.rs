use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use vantage_models::ProviderKind;

use super::{require_credential, response_text};
use crate::credential::Credential;
use crate::error::ProviderError;
use crate::provider::{CallParams, Provider};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API.
pub struct AnthropicProvider {
    client: Client,
    api_base: String,
}

impl AnthropicProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: ANTHROPIC_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
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
        debug!("Sending request to Anthropic API");

        let request = MessagesRequest {
            model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.api_base))
            .header("x-api-key", credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let body = response_text(response).await?;
        extract_text(&body)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Join the `text` blocks of a messages response.
pub fn extract_text(body: &str) -> Result<String, ProviderError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

    let text: String = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse(
            "response had no text blocks".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "content": [
                {"type": "text", "text": "Technical Summary"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "Plain-English Summary"}
            ],
            "stop_reason": "end_turn"
        }"#;
        assert_eq!(
            extract_text(body).unwrap(),
            "Technical Summary\nPlain-English Summary"
        );
    }

    #[test]
    fn no_text_is_malformed() {
        let body = r#"{"content": []}"#;
        assert!(matches!(
            extract_text(body),
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
