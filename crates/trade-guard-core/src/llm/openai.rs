use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use super::{LlmClient, LlmSettings};

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("OpenAI API key must be provided via TRADE_GUARD_API_KEY");
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("trade-guard/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(30)))
            .build()
            .context("failed to build completion HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            max_retries: settings.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, instructions: &str, prompt: &str) -> Result<String> {
        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: instructions.to_string(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            let response = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(err).context("failed to call chat completions API");
                    }
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                    attempt += 1;
                    continue;
                }
            };

            if !response.status().is_success() {
                if attempt >= self.max_retries {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    bail!("completion API error ({}): {}", status, body);
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
                attempt += 1;
                continue;
            }

            let completion: ChatResponse = response
                .json()
                .await
                .context("failed to parse completion response")?;
            let content = completion
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content)
                .ok_or_else(|| anyhow!("completion response missing message content"))?;
            return Ok(content);
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn base_settings(url: String) -> LlmSettings {
        LlmSettings {
            provider: "openai".into(),
            api_key: "test-key".into(),
            endpoint: Some(url),
            model: Some("gpt-test".into()),
            timeout_secs: Some(5),
            max_retries: 0,
        }
    }

    #[test]
    fn rejects_blank_api_key() {
        let mut settings = base_settings("http://localhost".into());
        settings.api_key = "  ".into();
        assert!(OpenAiClient::new(&settings).is_err());
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn complete_returns_message_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"choices":[{"message":{"content":"{\"findings\":[]}"}}]}"#);
        });

        let client = OpenAiClient::new(&base_settings(server.base_url())).unwrap();
        let content = client.complete("sys", "prompt").await.unwrap();
        assert_eq!(content, r#"{"findings":[]}"#);
        mock.assert();
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn retries_then_surfaces_api_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(500);
        });

        let mut settings = base_settings(server.base_url());
        settings.max_retries = 1;
        let client = OpenAiClient::new(&settings).unwrap();
        let err = client.complete("sys", "prompt").await.unwrap_err();
        assert!(err.to_string().contains("completion API error"));
        mock.assert_hits(2);
    }
}
