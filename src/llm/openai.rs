//! OpenAI-compatible chat completions provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{http_client, CompletionProvider};
use crate::config::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions provider for OpenAI and compatible gateways
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        Ok(Self {
            client: http_client(config)?,
            endpoint: format!("{base}/chat/completions"),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, system: &str, human: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: human,
                },
            ],
            temperature: self.temperature,
        };

        debug!("Chat completion request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Chat completion request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read chat completion response")?;

        if !status.is_success() {
            anyhow::bail!("Chat completion API returned {status}: {body}");
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse chat completion response:\n{body}"))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .with_context(|| format!("Chat completion returned no content:\n{body}"))?;

        info!("Chat completion received from {}", self.model);
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_provider_endpoint() {
        let config = LlmConfig {
            model: "gpt-4o-mini".to_string(),
            base_url: Some("https://openrouter.ai/api/v1".to_string()),
            ..LlmConfig::default()
        };
        let provider = OpenAiProvider::new(&config, "key".to_string()).unwrap();
        assert_eq!(provider.name(), "OpenAI");
        assert_eq!(provider.endpoint, "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(provider.model, "gpt-4o-mini");
    }

    #[test]
    fn test_openai_provider_default_endpoint() {
        let provider = OpenAiProvider::new(&LlmConfig::default(), "key".to_string()).unwrap();
        assert_eq!(provider.endpoint, "https://api.openai.com/v1/chat/completions");
    }
}
