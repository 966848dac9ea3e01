use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use vantage_models::ProviderKind;

use super::{require_credential, response_text};
use crate::credential::Credential;
use crate::error::ProviderError;
use crate::provider::{CallParams, Provider};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent`.
pub struct GeminiProvider {
    client: Client,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
        debug!("Sending request to Gemini API");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/models/{model}:generateContent", self.api_base))
            .header("x-goog-api-key", credential.expose())
            .json(&request)
            .send()
            .await?;

        let body = response_text(response).await?;
        extract_text(&body)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse(
            "response had no candidate text".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts_of_first_candidate() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Technical "}, {"text": "Summary"}]},
                "finishReason": "STOP"
            }]
        }"#;
        assert_eq!(extract_text(body).unwrap(), "Technical Summary");
    }

    #[test]
    fn blocked_prompt_is_malformed() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert!(matches!(
            extract_text(body),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn request_uses_camel_case() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 64,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 64);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }
}
