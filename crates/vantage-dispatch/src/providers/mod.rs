//! Concrete `Provider` implementations, one per `ProviderKind`.

pub mod anthropic;
pub mod claude_cli;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use claude_cli::ClaudeCliProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use vantage_models::ProviderKind;

use crate::credential::Credential;
use crate::error::ProviderError;

/// Map a non-success HTTP status and body to a provider error.
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Authentication(body),
        429 => ProviderError::RateLimited(body),
        _ => ProviderError::Status { status, body },
    }
}

/// Read the body of a response, turning non-success statuses into errors.
pub(crate) async fn response_text(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(status_error(status.as_u16(), body));
    }
    Ok(body)
}

pub(crate) fn require_credential(
    kind: ProviderKind,
    credential: Option<&Credential>,
) -> Result<&Credential, ProviderError> {
    credential.ok_or_else(|| ProviderError::Authentication(format!("no API key supplied for {kind}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(401, "bad key".into()),
            ProviderError::Authentication(m) if m == "bad key"
        ));
        assert!(matches!(status_error(429, "slow".into()), ProviderError::RateLimited(_)));
        assert_eq!(
            status_error(500, "boom".into()).to_string(),
            "HTTP 500: boom"
        );
    }

    #[test]
    fn missing_credential_is_auth_error() {
        let err = require_credential(ProviderKind::Gemini, None).unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }
}
