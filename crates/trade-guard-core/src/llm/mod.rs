mod openai;
mod settings;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::OpenAiClient;
pub use settings::LlmSettings;

/// Client abstraction for the completion service backing model-based
/// analysis workers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a prompt under the given system instructions, returning
    /// the raw model text. Callers must treat the output as untrusted.
    async fn complete(&self, instructions: &str, prompt: &str) -> Result<String>;
}

/// Placeholder client used when no provider is configured. Returns an
/// empty findings document so model-backed workers report clean.
#[derive(Debug, Default, Clone)]
pub struct NoopLlmClient;

#[async_trait]
impl LlmClient for NoopLlmClient {
    async fn complete(&self, _instructions: &str, _prompt: &str) -> Result<String> {
        Ok(r#"{"findings": []}"#.to_string())
    }
}

/// Build a client from settings by provider name.
pub fn client_from_settings(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>> {
    match settings.provider.to_lowercase().as_str() {
        "noop" => Ok(Arc::new(NoopLlmClient)),
        "openai" => Ok(Arc::new(OpenAiClient::new(settings)?)),
        other => anyhow::bail!("unsupported completion provider `{other}`"),
    }
}
