use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use vantage_models::ProviderKind;

use crate::credential::Credential;
use crate::error::ProviderError;
use crate::provider::{CallParams, Provider};

/// Runs prompts through the locally installed `claude` CLI, which carries
/// its own login. Sampling parameters are not exposed by the CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliProvider {
    program: String,
    timeout: Duration,
}

impl Default for ClaudeCliProvider {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl ClaudeCliProvider {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the CLI is available on the system.
    pub async fn check_available(&self) -> bool {
        match Command::new(&self.program).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Provider for ClaudeCliProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ClaudeCli
    }

    fn requires_credential(&self) -> bool {
        false
    }

    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        _credential: Option<&Credential>,
        _params: &CallParams,
    ) -> Result<String, ProviderError> {
        debug!(model, program = %self.program, "Invoking claude CLI");

        let output = tokio::time::timeout(self.timeout, async {
            Command::new(&self.program)
                .args(["-p", prompt, "--model", model, "--output-format", "text"])
                .kill_on_drop(true)
                .output()
                .await
        })
        .await
        .map_err(|_| ProviderError::Cli(format!("timed out after {}s", self.timeout.as_secs())))?
        .map_err(|e| ProviderError::Cli(format!("Failed to spawn {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "Claude CLI failed");
            return Err(ProviderError::Cli(format!(
                "{} exited {}: {}",
                self.program, output.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(ProviderError::Cli("Claude returned empty response".to_string()));
        }

        Ok(stdout)
    }
}
