//! Google Gemini completion provider.
//!
//! Calls the Generative Language API:
//! ```text
//! POST {base_url}/v1beta/models/{model}:generateContent
//! ```
//!
//! See: https://ai.google.dev/api/generate-content

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{http_client, CompletionProvider};
use crate::config::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` provider
pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        Ok(Self {
            client: http_client(config)?,
            endpoint: format!("{base}/v1beta/models/{}:generateContent", config.model),
            api_key,
            temperature: config.temperature,
        })
    }
}

fn request_body<'a>(system: &'a str, human: &'a str, temperature: f32) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part { text: system }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: human }],
        }],
        generation_config: GenerationConfig { temperature },
    }
}

fn response_text(body: &str) -> Result<String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).with_context(|| format!("Failed to parse Gemini response:\n{body}"))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        anyhow::bail!("Gemini returned no text:\n{body}");
    }
    Ok(text)
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn complete(&self, system: &str, human: &str) -> Result<String> {
        debug!("Gemini request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(system, human, self.temperature))
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read Gemini response")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API returned {status}: {body}");
        }

        let text = response_text(&body)?;
        info!("Gemini completion received");
        debug!("Output length: {} bytes", text.len());
        Ok(text)
    }
}
