//! Text-generation collaborators.
//!
//! The self-healing loop only sees [`CodeGenerator`]. The production
//! implementation, [`PromptedGenerator`], fills the generation and repair
//! templates and sends them to a [`CompletionProvider`]:
//! - Gemini: `generateContent` REST endpoint
//! - OpenAI-compatible: `/chat/completions`
//!
//! The provider is selected via `[llm].provider` in crucible.toml.

mod gemini;
#[cfg(test)]
pub(crate) mod mock;
mod openai;
mod prompts;

pub(crate) use gemini::GeminiProvider;
pub(crate) use openai::OpenAiProvider;
pub(crate) use prompts::PromptedGenerator;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::LlmConfig;

/// The collaborator that writes and repairs files.
#[async_trait]
pub(crate) trait CodeGenerator: Send + Sync {
    /// Returns the content of the next file the task still needs.
    async fn generate(&self, task: &str, file_state: &str) -> Result<String>;

    /// Returns the corrected content of one file, given the failing test output.
    async fn repair(&self, file_state: &str, error_output: &str) -> Result<String>;
}

/// A single-shot text completion backend.
#[async_trait]
pub(crate) trait CompletionProvider: Send + Sync {
    /// Returns the provider name for display.
    fn name(&self) -> &'static str;

    async fn complete(&self, system: &str, human: &str) -> Result<String>;
}

/// Supported completion providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    /// Google Gemini.
    #[default]
    Gemini,
    /// Any OpenAI-compatible chat completions API.
    OpenAi,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            _ => anyhow::bail!("Unknown LLM provider: '{s}'. Supported: gemini, openai"),
        }
    }
}

/// Builds the completion provider for `provider` from configuration.
///
/// The API key is read from the environment variable named in
/// `[llm].api_key_env`.
pub(crate) fn build_provider(
    provider: Provider,
    config: &LlmConfig,
) -> Result<Box<dyn CompletionProvider>> {
    let api_key = std::env::var(&config.api_key_env).with_context(|| {
        format!(
            "Missing API key: set the {} environment variable \
             (or change [llm].api_key_env in crucible.toml)",
            config.api_key_env
        )
    })?;

    Ok(match provider {
        Provider::Gemini => Box::new(GeminiProvider::new(config, api_key)?),
        Provider::OpenAi => Box::new(OpenAiProvider::new(config, api_key)?),
    })
}

pub(crate) fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}
